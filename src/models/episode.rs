use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored podcast episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: String,
    pub podcast_name: String,
    pub pub_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Episode built from a feed entry, ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
    pub guid: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: String,
    pub podcast_name: String,
    pub pub_date: DateTime<Utc>,
}
