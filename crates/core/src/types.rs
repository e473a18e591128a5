//! Primitive aliases shared across the workspace.

/// Primary key type for users and jobs (PostgreSQL BIGSERIAL).
pub type DbId = i64;

/// Timestamps are stored and serialized as UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
