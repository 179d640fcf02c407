pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod health;
pub mod ip_filter;
pub mod models;
pub mod pool;
pub mod query;
pub mod redis_store;
pub mod server;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;
pub mod webhook;

pub use config::Config;
pub use error::{Result, StarQueryError};
pub use models::RepoRef;
pub use service::StarQuery;
pub use store::{KvStore, MemoryStore};
