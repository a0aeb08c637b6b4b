use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache commit error: {0}")]
    CacheCommit(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How far an error is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Per-item remote failure: degrade to "no data for this item".
    Recoverable,
    /// Aborts the current batch or crawl.
    Fatal,
}

impl DiscoveryError {
    pub fn severity(&self) -> Severity {
        match self {
            DiscoveryError::Remote(_) => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Recoverable
    }
}
