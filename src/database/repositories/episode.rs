//! SeaORM-based Episode repository implementation

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

use crate::entities::{episodes, prelude::Episodes};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Episode, NewEpisode};

/// SeaORM-based repository for Episode operations
#[derive(Clone)]
pub struct EpisodeSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl EpisodeSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Find an episode by its source guid
    pub async fn find_by_guid(&self, guid: &str) -> RepositoryResult<Option<Episode>> {
        let model = Episodes::find()
            .filter(episodes::Column::Guid.eq(guid))
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    /// Insert a new episode; a duplicate guid is reported as a constraint violation
    pub async fn create(
        &self,
        episode: NewEpisode,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Episode> {
        let guid = episode.guid.clone();
        let active_model = episodes::ActiveModel {
            guid: Set(episode.guid),
            title: Set(episode.title),
            description: Set(episode.description),
            link: Set(episode.link),
            image: Set(episode.image),
            podcast_name: Set(episode.podcast_name),
            pub_date: Set(episode.pub_date),
            created_at: Set(now),
            ..Default::default()
        };

        let model = active_model
            .insert(&*self.connection)
            .await
            .map_err(|e| {
                let err = RepositoryError::from(e);
                if err.is_unique_violation() {
                    RepositoryError::constraint_violation(
                        "idx_episodes_guid",
                        format!("episode with guid '{guid}' already exists"),
                    )
                } else {
                    err
                }
            })?;
        Ok(Self::model_to_domain(model))
    }

    /// All episodes in insertion order
    pub async fn find_all(&self) -> RepositoryResult<Vec<Episode>> {
        let models = Episodes::find()
            .order_by_asc(episodes::Column::Id)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    pub async fn count(&self) -> RepositoryResult<u64> {
        Ok(Episodes::find().count(&*self.connection).await?)
    }

    fn model_to_domain(model: episodes::Model) -> Episode {
        Episode {
            id: model.id,
            guid: model.guid,
            title: model.title,
            description: model.description,
            link: model.link,
            image: model.image,
            podcast_name: model.podcast_name,
            pub_date: model.pub_date,
            created_at: model.created_at,
        }
    }
}
