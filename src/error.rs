//! Error types for the recoverable paths.
//!
//! Startup failures (bad config, unreadable table, broker unreachable) are
//! fatal and travel as `anyhow::Error` out of `main`. The two enums below
//! cover the failures that get logged and swallowed instead.

use std::path::PathBuf;
use thiserror::Error;

/// Missing or malformed configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Failure while downloading or unpacking the dataset archive.
///
/// The loader logs these and carries on; the subsequent file read is what
/// decides whether the run can continue.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bad zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure inside one iteration of the publish loop. Never stops the loop.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("cannot sample a row from an empty table")]
    EmptyTable,

    #[error("serializing row: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("broker publish failed: {0}")]
    Broker(#[from] lapin::Error),
}

impl PublishError {
    /// True when the broker link itself is gone. Retrying in a tight loop
    /// will not bring it back.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            PublishError::Broker(e) => matches!(
                e,
                lapin::Error::InvalidChannelState(_)
                    | lapin::Error::InvalidConnectionState(_)
                    | lapin::Error::IOError(_)
                    | lapin::Error::MissingHeartbeatError
            ),
            _ => false,
        }
    }
}
