//! Persistence-safe form of a single buff instance.
//!
//! A record stores the time *remaining* rather than the absolute expiry, and
//! is re-anchored to the calendar time at which it is restored.

use serde::{Deserialize, Serialize};

use crate::error::BuffResult;
use crate::instance::BuffInstance;
use crate::registry::BuffRegistry;

/// Serialized buff record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedBuff {
    /// Kind identifier
    pub id: String,
    /// Days left at the time of capture
    pub time_remaining_days: f64,
    /// Opaque variant payload
    pub data: Option<Vec<u8>>,
    /// Ticks received before capture
    pub tick_count: u32,
}

/// Record layout written before the tick counter existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SerializedBuffV1 {
    pub id: String,
    pub time_remaining_days: f64,
    pub data: Option<Vec<u8>>,
}

impl From<SerializedBuffV1> for SerializedBuff {
    fn from(legacy: SerializedBuffV1) -> Self {
        Self {
            id: legacy.id,
            time_remaining_days: legacy.time_remaining_days,
            data: legacy.data,
            tick_count: 0,
        }
    }
}

impl SerializedBuff {
    /// Creates a record by hand.
    #[must_use]
    pub fn new(id: impl Into<String>, time_remaining_days: f64) -> Self {
        Self {
            id: id.into(),
            time_remaining_days,
            data: None,
            tick_count: 0,
        }
    }

    /// Attaches a payload.
    #[must_use]
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    /// Captures `instance` at calendar time `now`.
    pub fn capture(instance: &BuffInstance, now: f64) -> BuffResult<Self> {
        Ok(Self {
            id: instance.kind().to_string(),
            time_remaining_days: instance.remaining_days(now),
            data: instance.buff().serialize()?,
            tick_count: instance.tick_count(),
        })
    }

    /// Rebuilds an unattached instance expiring `time_remaining_days` after
    /// `now`.
    pub fn restore(&self, registry: &BuffRegistry, now: f64) -> BuffResult<BuffInstance> {
        let mut buff = registry.construct(&self.id)?;
        buff.deserialize(self.data.as_deref())?;

        let mut instance =
            BuffInstance::from_boxed(buff).expiring_at(now + self.time_remaining_days);
        instance.set_tick_count(self.tick_count);
        Ok(instance)
    }
}
