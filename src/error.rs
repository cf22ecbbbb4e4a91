//! Typed error taxonomy for the ingestion core.
//!
//! Every layer below the race processor raises one of these types rather
//! than `anyhow::Error`, so the processor can classify retryability without
//! string-matching. `anyhow` is reserved for the binary's outermost
//! boundary (`main`).

use thiserror::Error;

/// Transport-level failure talking to the upstream racing API.
#[derive(Debug, Error, Clone)]
#[error("upstream request failed: {message}")]
pub struct UpstreamError {
    pub message: String,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub retryable: bool,
}

impl UpstreamError {
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let retryable = matches!(status, 408 | 429) || status >= 500;
        Self {
            message: format!("upstream returned HTTP {status}"),
            status_code: Some(status),
            response_body: Some(body.into()),
            retryable,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            response_body: None,
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            response_body: None,
            retryable: false,
        }
    }
}

/// Failures from the bulk upsert / time-series write layers.
#[derive(Debug, Error, Clone)]
pub enum WriteLayerError {
    #[error("database write failed: {message}")]
    DatabaseWrite {
        message: String,
        race_id: Option<String>,
        constraint: Option<String>,
        retryable: bool,
    },

    #[error("transaction aborted: {message}")]
    Transaction { message: String },

    #[error("partition {partition_name} for table {table} does not exist (needed for {timestamp})")]
    PartitionNotFound {
        table: String,
        partition_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl WriteLayerError {
    /// Per spec.md §4.4/§4.6: transaction aborts and partition-missing are
    /// always non-retryable at this layer; everything else keeps the
    /// underlying driver classification.
    pub fn retryable(&self) -> bool {
        match self {
            WriteLayerError::DatabaseWrite { retryable, .. } => *retryable,
            WriteLayerError::Transaction { .. } => false,
            WriteLayerError::PartitionNotFound { .. } => false,
        }
    }

    /// Classify a `sqlx::Error` raised inside a bulk-write call.
    ///
    /// Connection loss, deadlocks and serialization failures are
    /// transient; constraint violations on non-nullable/unique keys are
    /// fatal for this batch.
    pub fn from_sqlx(err: &sqlx::Error, race_id: Option<String>) -> Self {
        if let sqlx::Error::Database(db_err) = err {
            let code = db_err.code().map(|c| c.to_string());
            let retryable = matches!(
                code.as_deref(),
                Some("40001") | Some("40P01") | Some("08000") | Some("08003") | Some("08006")
            );
            return WriteLayerError::DatabaseWrite {
                message: db_err.message().to_string(),
                race_id,
                constraint: db_err.constraint().map(|c| c.to_string()),
                retryable,
            };
        }

        let retryable = matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
        );
        WriteLayerError::DatabaseWrite {
            message: err.to_string(),
            race_id,
            constraint: None,
            retryable,
        }
    }
}

/// Raised by the worker pool when a submission can't complete: either the
/// pool is closed (shut down, or rejected while shutting down) or the
/// submitted task panicked before it could send a result. Kept distinct so
/// callers don't mistake a task panic for the pool itself being unhealthy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolClosedError {
    #[error("worker pool is closed")]
    Closed,

    #[error("worker pool task panicked before completing")]
    TaskPanicked,
}

/// The pipeline stage at which a race-processing failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Write => "write",
        }
    }
}

/// Error wrapping performed by the race processor (C6), carrying the
/// partially-populated result so the caller can still log/aggregate
/// metrics before propagating.
#[derive(Debug, Error, Clone)]
#[error("{stage:?} failed for race {race_id}: {message}")]
pub struct ProcessorError {
    pub race_id: String,
    pub stage: Stage,
    pub message: String,
    pub retryable: bool,
}

impl ProcessorError {
    pub fn fetch(race_id: impl Into<String>, source: &UpstreamError) -> Self {
        Self {
            race_id: race_id.into(),
            stage: Stage::Fetch,
            message: source.message.clone(),
            retryable: source.retryable,
        }
    }

    pub fn transform(race_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            race_id: race_id.into(),
            stage: Stage::Transform,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn write(race_id: impl Into<String>, source: &WriteLayerError) -> Self {
        Self {
            race_id: race_id.into(),
            stage: Stage::Write,
            message: source.to_string(),
            retryable: source.retryable(),
        }
    }
}

/// HTTP read-surface error taxonomy (spec.md §7.8). Classification here is
/// observability only, never a stable contract (spec.md §9).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadSurfaceError {
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    #[error("data query error: {0}")]
    DataQuery(String),

    #[error("{0}")]
    Other(String),

    #[error("malformed race id")]
    MalformedId,

    #[error("race not found")]
    NotFound,

    #[error("invalid pool type: {0}")]
    InvalidPoolType(String),
}

impl ReadSurfaceError {
    /// Best-effort classification of an underlying `sqlx::Error` into the
    /// taxonomy above, by inspecting its rendered message. Never used for
    /// control flow, only for the `error`/`details` fields of the 500 body.
    pub fn classify(err: &sqlx::Error) -> Self {
        let text = err.to_string().to_lowercase();
        if text.contains("connection") || text.contains("pool") {
            ReadSurfaceError::DatabaseConnection(err.to_string())
        } else if text.contains("query") || text.contains("filter") || text.contains("syntax") {
            ReadSurfaceError::DataQuery(err.to_string())
        } else {
            ReadSurfaceError::Other(err.to_string())
        }
    }
}
