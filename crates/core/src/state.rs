//! Job states, job kinds and event types.
//!
//! All three are open integer spaces: a handful of values are predefined and
//! everything at or above the `CUSTOM_SPACE` boundary belongs to the caller.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job. The sole routing dimension on the job side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobState(i32);

impl JobState {
    /// Initial state, assigned at creation.
    pub const PENDING: Self = Self(1);
    /// The job could not be started.
    pub const FAILED_AT_START: Self = Self(2);
    /// Terminal: the job failed.
    pub const FAILED: Self = Self(3);
    /// Terminal: the job completed.
    pub const COMPLETED: Self = Self(4);
    /// First caller-defined state.
    pub const CUSTOM_SPACE: Self = Self(5);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Caller-defined state `n` (offset from [`JobState::CUSTOM_SPACE`]).
    pub const fn custom(n: i32) -> Self {
        Self(Self::CUSTOM_SPACE.0 + n)
    }

    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::FAILED || *self == Self::COMPLETED
    }

    pub fn is_custom(&self) -> bool {
        self.0 >= Self::CUSTOM_SPACE.0
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::PENDING => f.write_str("pending"),
            Self::FAILED_AT_START => f.write_str("failed_at_start"),
            Self::FAILED => f.write_str("failed"),
            Self::COMPLETED => f.write_str("completed"),
            s if s.is_custom() => write!(f, "custom({})", s.0 - Self::CUSTOM_SPACE.0),
            s => write!(f, "reserved({})", s.0),
        }
    }
}

impl From<i32> for JobState {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Caller-defined classification of a job's purpose. Immutable once assigned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKind(i64);

impl JobKind {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for JobKind {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Type of an event. Together with the target job's state it selects a handler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(i32);

impl EventType {
    /// Emitted on the output queue when a job completes.
    pub const COMPLETED: Self = Self(1);
    /// Emitted on the output queue when a job fails.
    pub const FAILED: Self = Self(2);
    /// First caller-defined event type.
    pub const CUSTOM_SPACE: Self = Self(100);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Caller-defined event type `n` (offset from [`EventType::CUSTOM_SPACE`]).
    pub const fn custom(n: i32) -> Self {
        Self(Self::CUSTOM_SPACE.0 + n)
    }

    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    pub fn is_custom(&self) -> bool {
        self.0 >= Self::CUSTOM_SPACE.0
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::COMPLETED => f.write_str("completed"),
            Self::FAILED => f.write_str("failed"),
            t if t.is_custom() => write!(f, "custom({})", t.0 - Self::CUSTOM_SPACE.0),
            t => write!(f, "reserved({})", t.0),
        }
    }
}

impl From<i32> for EventType {
    fn from(value: i32) -> Self {
        Self(value)
    }
}
