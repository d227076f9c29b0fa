pub mod codec;
pub mod config;
pub mod downsample;
pub mod error;
pub mod framer;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod protocol;
pub mod query;
pub mod routes;
pub mod store;
pub mod uplink;

pub use config::Config;
pub use error::{AppError, Result};
