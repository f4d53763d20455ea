#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod indexer;

pub use api::{ApiContext, ApiServer};
pub use config::Config;
pub use indexer::{IndexerClient, TdustBalance};
