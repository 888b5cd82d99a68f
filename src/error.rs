use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an [`Error`] was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Connect,
    Extract,
    Encode,
    Upload,
    Purge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Connect => "connect",
            Stage::Extract => "extract",
            Stage::Encode => "encode",
            Stage::Upload => "upload",
            Stage::Purge => "purge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("connecting to {target}")]
    Connect {
        target: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("processing table {table}")]
    Extract {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("writing parquet file {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("uploading to {key}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deleting archived records from {table}")]
    Purge {
        table: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config(_) => Stage::Config,
            Error::Connect { .. } => Stage::Connect,
            Error::Extract { .. } => Stage::Extract,
            Error::Encode { .. } => Stage::Encode,
            Error::Upload { .. } => Stage::Upload,
            Error::Purge { .. } => Stage::Purge,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
