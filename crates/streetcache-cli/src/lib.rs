//! Streetcache front end: a newline-delimited JSON protocol over stdio.

pub mod config;
pub mod error;
pub mod prefetch;
pub mod transport;

pub use config::{resolve_api_key, resolve_store_dir};
pub use error::{CliError, CliResult};
pub use transport::StdioTransport;
