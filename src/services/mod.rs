pub mod dispatch;
pub mod export;
pub mod profile_store;
pub mod prompt;
pub mod workflow;
