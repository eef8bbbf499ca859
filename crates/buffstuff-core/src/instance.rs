//! A buff together with the bookkeeping the manager keeps for it.

use buffstuff_common::EntityId;

use crate::buff::{Buff, BuffContext, BuffHandle, BuffRequest, HOURS_PER_DAY, MINUTES_PER_DAY};

/// Lifecycle hooks dispatched without extra arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    Start,
    Expire,
    Death,
    Tick,
    Leave,
    Join,
}

/// One buff instance: the variant object, its absolute expiry, its tick
/// counter and the entity it is attached to.
///
/// Instances are created by application code (or by the registry during
/// restoration) and handed to the manager by value, so an instance can only
/// ever be attached to one entity.
#[derive(Debug)]
pub struct BuffInstance {
    buff: Box<dyn Buff>,
    expire_at: f64,
    tick_count: u32,
    owner: Option<EntityId>,
    handle: Option<BuffHandle>,
}

impl BuffInstance {
    /// Wraps a buff that never expires until told otherwise.
    #[must_use]
    pub fn new(buff: impl Buff + 'static) -> Self {
        Self::from_boxed(Box::new(buff))
    }

    /// Wraps an already boxed buff.
    #[must_use]
    pub fn from_boxed(buff: Box<dyn Buff>) -> Self {
        Self {
            buff,
            expire_at: f64::INFINITY,
            tick_count: 0,
            owner: None,
            handle: None,
        }
    }

    /// Sets the absolute expiry in calendar days.
    #[must_use]
    pub fn expiring_at(mut self, expire_at: f64) -> Self {
        self.expire_at = expire_at;
        self
    }

    /// Expires `days` after `now`.
    #[must_use]
    pub fn expiring_in_game_days(self, now: f64, days: f64) -> Self {
        self.expiring_at(now + days)
    }

    /// Expires `hours` after `now`.
    #[must_use]
    pub fn expiring_in_game_hours(self, now: f64, hours: f64) -> Self {
        self.expiring_at(now + hours / HOURS_PER_DAY)
    }

    /// Expires `minutes` after `now`.
    #[must_use]
    pub fn expiring_in_game_minutes(self, now: f64, minutes: f64) -> Self {
        self.expiring_at(now + minutes / MINUTES_PER_DAY)
    }

    /// Stable kind identifier of the wrapped buff.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.buff.kind()
    }

    /// Absolute expiry in calendar days (`INFINITY` = never, `NEG_INFINITY` =
    /// next sweep).
    #[must_use]
    pub const fn expire_at(&self) -> f64 {
        self.expire_at
    }

    /// Days left at `now`.
    #[must_use]
    pub fn remaining_days(&self, now: f64) -> f64 {
        self.expire_at - now
    }

    /// Whether the sweep at `now` treats this buff as expired.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        self.expire_at < now
    }

    /// Ticks received so far.
    #[must_use]
    pub const fn tick_count(&self) -> u32 {
        self.tick_count
    }

    /// Entity this instance is attached to, if any.
    #[must_use]
    pub const fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// Handle assigned when the instance was attached.
    #[must_use]
    pub const fn handle(&self) -> Option<&BuffHandle> {
        self.handle.as_ref()
    }

    /// The wrapped buff.
    #[must_use]
    pub fn buff(&self) -> &dyn Buff {
        self.buff.as_ref()
    }

    /// Downcasts the wrapped buff.
    #[must_use]
    pub fn downcast_ref<T: Buff + 'static>(&self) -> Option<&T> {
        self.buff.as_ref().downcast_ref::<T>()
    }

    pub(crate) fn set_tick_count(&mut self, tick_count: u32) {
        self.tick_count = tick_count;
    }

    pub(crate) fn instance_id(&self) -> Option<u64> {
        self.handle.as_ref().map(BuffHandle::id)
    }

    /// Binds the instance to `entity`. Only the manager calls this.
    pub(crate) fn attach(&mut self, entity: EntityId, id: u64) -> BuffHandle {
        let handle = BuffHandle::new(self.buff.kind(), id);
        self.owner = Some(entity);
        self.handle = Some(handle.clone());
        handle
    }

    /// Runs `hook` on the wrapped buff.
    pub(crate) fn dispatch(&mut self, hook: Hook, now: f64, requests: &mut Vec<BuffRequest>) {
        if hook == Hook::Tick {
            self.tick_count = self.tick_count.saturating_add(1);
        }
        let (Some(entity), Some(handle)) = (self.owner, self.handle.as_ref()) else {
            return;
        };
        let mut ctx = BuffContext::new(
            entity,
            handle,
            now,
            &mut self.expire_at,
            &mut self.tick_count,
            requests,
        );
        let buff = self.buff.as_mut();
        match hook {
            Hook::Start => buff.on_start(&mut ctx),
            Hook::Expire => buff.on_expire(&mut ctx),
            Hook::Death => buff.on_death(&mut ctx),
            Hook::Tick => buff.on_tick(&mut ctx),
            Hook::Leave => buff.on_leave(&mut ctx),
            Hook::Join => buff.on_join(&mut ctx),
        }
    }

    /// Runs `on_stack` with the instance being replaced.
    pub(crate) fn dispatch_stack(
        &mut self,
        previous: &BuffInstance,
        now: f64,
        requests: &mut Vec<BuffRequest>,
    ) {
        let (Some(entity), Some(handle)) = (self.owner, self.handle.as_ref()) else {
            return;
        };
        let mut ctx = BuffContext::new(
            entity,
            handle,
            now,
            &mut self.expire_at,
            &mut self.tick_count,
            requests,
        );
        self.buff.on_stack(previous, &mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Marker {
        ticks_seen: Vec<u32>,
    }

    impl Buff for Marker {
        fn kind(&self) -> &str {
            "marker"
        }

        fn on_tick(&mut self, ctx: &mut BuffContext<'_>) {
            self.ticks_seen.push(ctx.tick_count());
        }
    }

    #[test]
    fn test_new_instance_never_expires() {
        let instance = BuffInstance::new(Marker::default());
        assert_eq!(instance.expire_at(), f64::INFINITY);
        assert!(!instance.is_expired(1.0e12));
        assert!(instance.owner().is_none());
        assert!(instance.handle().is_none());
    }

    #[test]
    fn test_relative_expiry_builders() {
        let days = BuffInstance::new(Marker::default()).expiring_in_game_days(10.0, 2.0);
        assert_eq!(days.expire_at(), 12.0);

        let hours = BuffInstance::new(Marker::default()).expiring_in_game_hours(10.0, 6.0);
        assert!((hours.expire_at() - 10.25).abs() < 1e-9);

        let minutes = BuffInstance::new(Marker::default()).expiring_in_game_minutes(0.0, 720.0);
        assert!((minutes.expire_at() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_infinity_expires_at_any_time() {
        let instance = BuffInstance::new(Marker::default()).expiring_at(f64::NEG_INFINITY);
        assert!(instance.is_expired(0.0));
        assert!(instance.is_expired(-1.0e12));
    }

    #[test]
    fn test_expiry_is_strict() {
        let instance = BuffInstance::new(Marker::default()).expiring_at(12.0);
        assert!(!instance.is_expired(12.0));
        assert!(instance.is_expired(12.000_001));
    }

    #[test]
    fn test_unattached_dispatch_is_ignored_but_counts_ticks() {
        let mut instance = BuffInstance::new(Marker::default());
        let mut requests = Vec::new();
        instance.dispatch(Hook::Tick, 0.0, &mut requests);
        assert_eq!(instance.tick_count(), 1);
        let marker = instance.downcast_ref::<Marker>().expect("marker");
        assert!(marker.ticks_seen.is_empty());
    }

    #[test]
    fn test_attached_dispatch_reaches_buff() {
        let mut instance = BuffInstance::new(Marker::default());
        let handle = instance.attach(EntityId::from_raw(3), 42);
        assert_eq!(handle.kind(), "marker");
        assert_eq!(instance.owner(), Some(EntityId::from_raw(3)));

        let mut requests = Vec::new();
        instance.dispatch(Hook::Tick, 0.0, &mut requests);
        instance.dispatch(Hook::Tick, 0.0, &mut requests);
        let marker = instance.downcast_ref::<Marker>().expect("marker");
        assert_eq!(marker.ticks_seen, vec![1, 2]);
    }
}
