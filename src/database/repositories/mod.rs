//! SeaORM repositories

pub mod episode;
pub mod job_store;

pub use episode::EpisodeSeaOrmRepository;
pub use job_store::JobStoreSeaOrmRepository;
