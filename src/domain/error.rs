//! Typed failures for sources and publishers.
//!
//! Both kinds are recoverable: a source failure costs that source one
//! cycle, a publish failure is retried on the next tick.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one source for one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network error, timeout or non-2xx status.
    #[error("{exchange} transport error: {detail}")]
    Transport {
        exchange: &'static str,
        detail: String,
    },
    /// Payload arrived but is error-flagged or does not match the schema.
    #[error("{exchange} protocol error: {detail}")]
    Protocol {
        exchange: &'static str,
        detail: String,
    },
}

impl SourceError {
    pub fn transport(exchange: &'static str, detail: impl Into<String>) -> Self {
        Self::Transport { exchange, detail: detail.into() }
    }

    pub fn protocol(exchange: &'static str, detail: impl Into<String>) -> Self {
        Self::Protocol { exchange, detail: detail.into() }
    }

    /// Name of the failing source.
    pub const fn exchange(&self) -> &'static str {
        match self {
            Self::Transport { exchange, .. } | Self::Protocol { exchange, .. } => exchange,
        }
    }

    /// Short label used for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Protocol { .. } => "protocol",
        }
    }
}

/// Failure to commit a snapshot.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
