//! Configuration loading and resolution.

use std::path::PathBuf;

use crate::error::{CliError, CliResult};

/// Environment variable holding the Street View API key.
pub const API_KEY_ENV: &str = "STREETVIEW_API_KEY";

/// Environment variable overriding the panorama store directory.
pub const STORE_DIR_ENV: &str = "STREETCACHE_DIR";

/// Resolve the panorama store directory.
///
/// Explicit flag, then `STREETCACHE_DIR`, then `./Cash` if it already exists,
/// then `~/.streetcache/panoramas`.
pub fn resolve_store_dir(explicit: Option<&str>) -> PathBuf {
    store_dir_from(explicit, std::env::var(STORE_DIR_ENV).ok())
}

fn store_dir_from(explicit: Option<&str>, env_dir: Option<String>) -> PathBuf {
    if let Some(dir) = explicit {
        return PathBuf::from(dir);
    }

    if let Some(dir) = env_dir.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    let cwd_store = PathBuf::from("Cash");
    if cwd_store.is_dir() {
        return cwd_store;
    }

    default_store_dir()
}

fn default_store_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".streetcache").join("panoramas")
}

/// Resolve the API key: explicit flag, then `STREETVIEW_API_KEY`.
pub fn resolve_api_key(explicit: Option<&str>) -> CliResult<String> {
    api_key_from(explicit, std::env::var(API_KEY_ENV).ok())
}

fn api_key_from(explicit: Option<&str>, env_key: Option<String>) -> CliResult<String> {
    explicit
        .map(str::to_string)
        .or(env_key)
        .filter(|k| !k.trim().is_empty())
        .ok_or(CliError::MissingApiKey(API_KEY_ENV))
}
