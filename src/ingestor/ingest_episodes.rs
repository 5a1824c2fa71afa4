use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::database::repositories::EpisodeSeaOrmRepository;
use crate::errors::{EntryError, RepositoryResult};
use crate::models::{Feed, FeedEntry, NewEpisode};
use crate::utils::datetime::DateTimeParser;

/// An entry that could not be ingested
#[derive(Debug)]
pub struct EntryFailure {
    /// Guid of the entry, when it had one
    pub guid: Option<String>,
    pub error: EntryError,
}

/// Summary of one ingestion pass over a feed
#[derive(Debug, Default)]
pub struct IngestResult {
    pub added: usize,
    pub skipped: usize,
    pub failed: Vec<EntryFailure>,
}

impl IngestResult {
    /// One-line summary stored as the execution detail
    pub fn summary(&self) -> String {
        format!(
            "added={} skipped={} failed={}",
            self.added,
            self.skipped,
            self.failed.len()
        )
    }
}

/// Persists the entries of a feed that are not stored yet, keyed by guid
#[derive(Clone)]
pub struct EpisodeIngester {
    episodes: EpisodeSeaOrmRepository,
    timezone: Tz,
}

impl EpisodeIngester {
    /// `timezone` applies to publication dates that carry no offset
    pub fn new(episodes: EpisodeSeaOrmRepository, timezone: Tz) -> Self {
        Self { episodes, timezone }
    }

    /// Ingest every new entry of `feed` in document order
    ///
    /// Entries are independent: an unparsable date or a failed insert is
    /// recorded in [`IngestResult::failed`] and the batch continues. Only a
    /// failed guid lookup aborts, since dedup can no longer be decided.
    pub async fn ingest(&self, feed: &Feed) -> RepositoryResult<IngestResult> {
        let mut result = IngestResult::default();

        for entry in &feed.entries {
            let Some(guid) = entry
                .guid
                .as_deref()
                .map(str::trim)
                .filter(|guid| !guid.is_empty())
            else {
                warn!(
                    "Skipping entry '{}' from '{}': no guid or link",
                    entry.title, feed.title
                );
                result.failed.push(EntryFailure {
                    guid: None,
                    error: EntryError::MissingGuid,
                });
                continue;
            };

            if self.episodes.find_by_guid(guid).await?.is_some() {
                debug!("Episode '{}' already stored, skipping", guid);
                result.skipped += 1;
                continue;
            }

            let episode = match self.build_episode(feed, entry, guid) {
                Ok(episode) => episode,
                Err(error) => {
                    warn!("Skipping entry from '{}': {}", feed.title, error);
                    result.failed.push(EntryFailure {
                        guid: Some(guid.to_string()),
                        error,
                    });
                    continue;
                }
            };

            match self.episodes.create(episode, Utc::now()).await {
                Ok(stored) => {
                    debug!("Stored episode '{}' ({})", stored.title, stored.guid);
                    result.added += 1;
                }
                // Another writer stored the same guid between lookup and insert
                Err(e) if e.is_unique_violation() => {
                    debug!("Episode '{}' stored concurrently, skipping", guid);
                    result.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to store episode '{}': {}", guid, e);
                    result.failed.push(EntryFailure {
                        guid: Some(guid.to_string()),
                        error: EntryError::Persistence {
                            guid: guid.to_string(),
                            source: e,
                        },
                    });
                }
            }
        }

        info!(
            "Ingested feed '{}': {} added, {} skipped, {} failed",
            feed.title,
            result.added,
            result.skipped,
            result.failed.len()
        );
        Ok(result)
    }

    fn build_episode(
        &self,
        feed: &Feed,
        entry: &FeedEntry,
        guid: &str,
    ) -> Result<NewEpisode, EntryError> {
        let raw_date = entry
            .published_at_raw
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| EntryError::MissingPubDate {
                guid: guid.to_string(),
            })?;

        let pub_date = DateTimeParser::parse_in_timezone(raw_date, self.timezone).map_err(
            |source| EntryError::InvalidPubDate {
                guid: guid.to_string(),
                source,
            },
        )?;

        Ok(NewEpisode {
            guid: guid.to_string(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            link: entry.link.clone(),
            image: feed.image.clone().unwrap_or_default(),
            podcast_name: feed.title.clone(),
            pub_date,
        })
    }
}
