//! The buff contract.
//!
//! Every effect kind implements [`Buff`]. The manager owns the instances and
//! calls the lifecycle hooks; buff code reaches back into the manager only
//! through the [`BuffContext`] handed to each hook:
//! - Start / Stack when the buff is applied
//! - Tick on every sweep while it is alive
//! - Expire or Death as terminal events
//! - Leave / Join around a player's absence
//!
//! Requests made through the context (apply, remove, expiry changes) are
//! carried out as soon as the hook returns, before the next hook runs.

use std::any::Any;
use std::fmt;

use buffstuff_common::EntityId;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BuffError, BuffResult};
use crate::instance::BuffInstance;

/// Hours in a game day.
pub const HOURS_PER_DAY: f64 = 24.0;
/// Minutes in a game day.
pub const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Upcast helper so stacked buffs can inspect the instance they replace.
pub trait AsAny {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour of one buff kind.
///
/// All hooks default to no-ops. `serialize` and `deserialize` must agree:
/// whatever `serialize` emits has to restore the same observable state when
/// passed to `deserialize` on a freshly constructed instance of the same kind.
pub trait Buff: AsAny + Send + fmt::Debug {
    /// Stable identifier of this kind. Also the stacking key.
    fn kind(&self) -> &str;

    /// Applied with no active buff of the same kind on the entity.
    fn on_start(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// Applied while `previous` is active; `self` replaces it.
    fn on_stack(&mut self, _previous: &BuffInstance, _ctx: &mut BuffContext<'_>) {}

    /// The sweep found the buff past its expiry. It is detached right after.
    fn on_expire(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// The owning entity died. The buff is dropped right after.
    fn on_death(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// Periodic sweep while the buff is alive.
    fn on_tick(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// The owning player is disconnecting; the buff is serialized next.
    fn on_leave(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// The owning player reconnected and the buff was restored.
    fn on_join(&mut self, _ctx: &mut BuffContext<'_>) {}

    /// Captures variant state. `None` for stateless buffs.
    fn serialize(&self) -> BuffResult<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Restores variant state produced by [`Buff::serialize`].
    fn deserialize(&mut self, _payload: Option<&[u8]>) -> BuffResult<()> {
        Ok(())
    }
}

impl dyn Buff {
    /// Downcasts to a concrete buff type.
    #[must_use]
    pub fn downcast_ref<T: Buff + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts to a concrete buff type, mutably.
    #[must_use]
    pub fn downcast_mut<T: Buff + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Handle identifying one attached buff instance.
///
/// Handles stay valid after the instance is replaced or removed; they simply
/// stop matching anything, so removing through a stale handle is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuffHandle {
    kind: String,
    id: u64,
}

impl BuffHandle {
    pub(crate) fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Kind of the instance.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Process-unique instance id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Mutation requested from inside a hook.
#[derive(Debug)]
pub(crate) enum BuffRequest {
    Apply {
        entity: EntityId,
        instance: BuffInstance,
    },
    Remove {
        entity: EntityId,
        handle: BuffHandle,
    },
    RemoveKind {
        entity: EntityId,
        kind: String,
    },
}

impl BuffRequest {
    /// Entity the request acts on.
    pub(crate) const fn target(&self) -> EntityId {
        match self {
            Self::Apply { entity, .. }
            | Self::Remove { entity, .. }
            | Self::RemoveKind { entity, .. } => *entity,
        }
    }
}

/// View of the manager available to a hook.
#[derive(Debug)]
pub struct BuffContext<'a> {
    entity: EntityId,
    handle: &'a BuffHandle,
    now: f64,
    expire_at: &'a mut f64,
    tick_count: &'a mut u32,
    requests: &'a mut Vec<BuffRequest>,
}

impl<'a> BuffContext<'a> {
    pub(crate) fn new(
        entity: EntityId,
        handle: &'a BuffHandle,
        now: f64,
        expire_at: &'a mut f64,
        tick_count: &'a mut u32,
        requests: &'a mut Vec<BuffRequest>,
    ) -> Self {
        Self {
            entity,
            handle,
            now,
            expire_at,
            tick_count,
            requests,
        }
    }

    /// Entity the buff is attached to.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Handle of the buff receiving the hook.
    #[must_use]
    pub fn handle(&self) -> &BuffHandle {
        self.handle
    }

    /// Current calendar time in days.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks this instance has received, including the current one.
    #[must_use]
    pub fn tick_count(&self) -> u32 {
        *self.tick_count
    }

    /// Overwrites the tick counter, e.g. to carry it over in `on_stack`.
    pub fn set_tick_count(&mut self, tick_count: u32) {
        *self.tick_count = tick_count;
    }

    /// Absolute expiry in calendar days.
    #[must_use]
    pub fn expire_at(&self) -> f64 {
        *self.expire_at
    }

    /// Days left until expiry (may be negative or infinite).
    #[must_use]
    pub fn remaining_days(&self) -> f64 {
        *self.expire_at - self.now
    }

    /// Expire `days` game days from now.
    pub fn set_expiry_in_game_days(&mut self, days: f64) {
        *self.expire_at = self.now + days;
    }

    /// Expire `hours` game hours from now.
    pub fn set_expiry_in_game_hours(&mut self, hours: f64) {
        *self.expire_at = self.now + hours / HOURS_PER_DAY;
    }

    /// Expire `minutes` game minutes from now.
    pub fn set_expiry_in_game_minutes(&mut self, minutes: f64) {
        *self.expire_at = self.now + minutes / MINUTES_PER_DAY;
    }

    /// Never expire.
    pub fn set_expiry_never(&mut self) {
        *self.expire_at = f64::INFINITY;
    }

    /// Expire on the next sweep.
    pub fn set_expiry_immediately(&mut self) {
        *self.expire_at = f64::NEG_INFINITY;
    }

    /// Applies `instance` to `entity` once this hook returns.
    pub fn apply(&mut self, entity: EntityId, instance: BuffInstance) {
        self.requests.push(BuffRequest::Apply { entity, instance });
    }

    /// Removes the instance behind `handle` once this hook returns.
    pub fn remove(&mut self, entity: EntityId, handle: BuffHandle) {
        self.requests.push(BuffRequest::Remove { entity, handle });
    }

    /// Removes whatever instance of `kind` is active on `entity` once this
    /// hook returns.
    pub fn remove_kind(&mut self, entity: EntityId, kind: impl Into<String>) {
        self.requests.push(BuffRequest::RemoveKind {
            entity,
            kind: kind.into(),
        });
    }

    /// Detaches the buff receiving this hook, without further callbacks.
    pub fn remove_self(&mut self) {
        let handle = self.handle.clone();
        self.requests.push(BuffRequest::Remove {
            entity: self.entity,
            handle,
        });
    }
}

/// Encodes a buff payload with bincode.
pub fn encode_payload<T: Serialize>(kind: &str, value: &T) -> BuffResult<Option<Vec<u8>>> {
    bincode::serialize(value)
        .map(Some)
        .map_err(|e| BuffError::payload(kind, e))
}

/// Decodes a payload written by [`encode_payload`]. A missing payload yields
/// `None`, letting the buff keep its defaults.
pub fn decode_payload<T: DeserializeOwned>(
    kind: &str,
    payload: Option<&[u8]>,
) -> BuffResult<Option<T>> {
    payload
        .map(|bytes| bincode::deserialize(bytes).map_err(|e| BuffError::payload(kind, e)))
        .transpose()
}
