use serde::{Deserialize, Serialize};

/// A retrieved and parsed feed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Channel title; becomes each episode's podcast name
    pub title: String,
    /// Channel artwork URL
    pub image: Option<String>,
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
}

/// One item of a feed, before date parsing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Source identifier; falls back to the entry link when absent
    pub guid: Option<String>,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Publication date exactly as published
    pub published_at_raw: Option<String>,
}

impl FeedEntry {
    pub fn new<G: Into<String>>(guid: G) -> Self {
        Self {
            guid: Some(guid.into()),
            ..Default::default()
        }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_published<S: Into<String>>(mut self, published: S) -> Self {
        self.published_at_raw = Some(published.into());
        self
    }
}
