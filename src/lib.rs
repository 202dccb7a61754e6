pub mod agent;
pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod data_models;
pub mod error;
pub mod fetch_pool;
pub mod filter;
pub mod merger;
pub mod planner;
pub mod record;

pub use agent::Agent;
pub use data_models::{FilterRecord, Kind, SearchResult};
pub use error::{Error, Result};
pub use record::Record;
