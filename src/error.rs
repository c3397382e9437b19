//! Error types for refgraph.

use thiserror::Error;

use crate::world::ObjectId;

#[derive(Error, Debug)]
pub enum RefGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Cache format error: {0}")]
    CacheFormat(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid search target: {0}")]
    InvalidTarget(String),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Invalid result: {0}")]
    InvalidResult(String),
}

pub type Result<T> = std::result::Result<T, RefGraphError>;
