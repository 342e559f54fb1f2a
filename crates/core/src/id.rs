//! Time-sortable job identifiers.
//!
//! Layout of a [`JobId`] (most significant bit first):
//!
//! ```text
//! | 1 bit unused | 41 bits millis since EPOCH_MS | 10 bits node | 12 bits sequence |
//! ```
//!
//! IDs from one generator are strictly increasing. IDs from different nodes are
//! unique as long as node ids are unique.

use core::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 2024-01-01T00:00:00Z in unix milliseconds.
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const TIMESTAMP_SHIFT: u32 = NODE_BITS + SEQUENCE_BITS;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Largest node id accepted by [`JobIdGenerator::new`].
pub const MAX_NODE: u16 = (1 << NODE_BITS) - 1;

/// Identifier of a job. Unique for the lifetime of the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Draw a fresh identifier from the process-wide generator (node 0).
    pub fn new() -> Self {
        static GLOBAL: OnceLock<JobIdGenerator> = OnceLock::new();
        GLOBAL.get_or_init(JobIdGenerator::default).next_id()
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Creation time embedded in the identifier (millisecond precision).
    ///
    /// Only meaningful for ids produced by a [`JobIdGenerator`].
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = (self.0 >> TIMESTAMP_SHIFT) + EPOCH_MS;
        Utc.timestamp_millis_opt(i64::try_from(millis).ok()?).single()
    }

    /// Node that generated this identifier.
    pub fn node(&self) -> u16 {
        ((self.0 >> SEQUENCE_BITS) & u64::from(MAX_NODE)) as u16
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for JobId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<JobId> for u64 {
    fn from(value: JobId) -> Self {
        value.0
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<u64>()
            .map_err(|e| CoreError::invalid_id(format!("JobId: {e}")))?;
        Ok(Self(raw))
    }
}

/// Lock-free snowflake-style generator.
///
/// The whole generator state is the last id handed out, so a single
/// compare-and-swap keeps concurrent callers strictly ordered.
#[derive(Debug)]
pub struct JobIdGenerator {
    node: u64,
    last: AtomicU64,
}

impl JobIdGenerator {
    pub fn new(node: u16) -> Result<Self, CoreError> {
        if node > MAX_NODE {
            return Err(CoreError::InvalidNode {
                node,
                max: MAX_NODE,
            });
        }
        Ok(Self {
            node: u64::from(node),
            last: AtomicU64::new(0),
        })
    }

    pub fn node(&self) -> u16 {
        self.node as u16
    }

    pub fn next_id(&self) -> JobId {
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = self.successor(last, now_millis());
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return JobId(next),
                Err(actual) => last = actual,
            }
        }
    }

    fn successor(&self, last: u64, now_ms: u64) -> u64 {
        let last_ts = last >> TIMESTAMP_SHIFT;
        if now_ms > last_ts {
            return (now_ms << TIMESTAMP_SHIFT) | (self.node << SEQUENCE_BITS);
        }

        // Same millisecond or clock went backwards: stay on the logical clock.
        let seq = last & SEQUENCE_MASK;
        if seq < SEQUENCE_MASK {
            last + 1
        } else {
            ((last_ts + 1) << TIMESTAMP_SHIFT) | (self.node << SEQUENCE_BITS)
        }
    }
}

impl Default for JobIdGenerator {
    fn default() -> Self {
        Self {
            node: 0,
            last: AtomicU64::new(0),
        }
    }
}

fn now_millis() -> u64 {
    let ms = Utc::now().timestamp_millis();
    u64::try_from(ms).unwrap_or(0).saturating_sub(EPOCH_MS)
}
