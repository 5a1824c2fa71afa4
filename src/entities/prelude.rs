pub use super::episodes::Entity as Episodes;
pub use super::job_definitions::Entity as JobDefinitions;
pub use super::job_executions::Entity as JobExecutions;
