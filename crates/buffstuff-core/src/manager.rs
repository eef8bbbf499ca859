//! Buff manager.
//!
//! Owns every live buff, keyed by entity and then by kind, plus the
//! serialized buffs of players who are offline. All state is mutated from
//! the host's simulation step: apply/remove calls, the periodic sweep, and
//! the player/entity lifecycle events.
//!
//! Hooks never touch the tables directly. Anything a hook asks for through
//! its [`BuffContext`](crate::buff::BuffContext) is executed right after the
//! hook returns, so a sweep never observes a table that changed under it.

use std::collections::BTreeMap;

use ahash::AHashMap;
use buffstuff_common::{EntityId, PlayerRef, PlayerUid};
use tracing::{debug, info, warn};

use crate::buff::{Buff, BuffHandle, BuffRequest};
use crate::calendar::Calendar;
use crate::config::BuffConfig;
use crate::error::{BuffError, BuffResult};
use crate::events::{BuffEvent, DespawnReason, EventFeed};
use crate::instance::{BuffInstance, Hook};
use crate::record::SerializedBuff;
use crate::registry::{BuffRegistry, RegistryPhase};
use crate::snapshot::{decode_snapshot, encode_snapshot, InactiveBuffs};
use crate::store::SaveStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Buffs that received `on_tick`
    pub ticked: usize,
    /// Buffs that expired and were detached
    pub expired: usize,
}

/// Tracks active and inactive buffs and drives their lifecycle.
#[derive(Debug)]
pub struct BuffManager {
    config: BuffConfig,
    calendar: Box<dyn Calendar>,
    registry: BuffRegistry,
    active: AHashMap<EntityId, BTreeMap<String, BuffInstance>>,
    inactive: InactiveBuffs,
    online_players: AHashMap<EntityId, PlayerUid>,
    online_by_uid: AHashMap<PlayerUid, EntityId>,
    next_instance_id: u64,
    tick_accumulator_ms: f64,
}

impl BuffManager {
    /// Creates a manager reading time from `calendar`. Call
    /// [`initialize`](Self::initialize) before registering kinds.
    pub fn new(config: BuffConfig, calendar: impl Calendar + 'static) -> Self {
        Self {
            config,
            calendar: Box::new(calendar),
            registry: BuffRegistry::new(),
            active: AHashMap::new(),
            inactive: InactiveBuffs::new(),
            online_players: AHashMap::new(),
            online_by_uid: AHashMap::new(),
            next_instance_id: 1,
            tick_accumulator_ms: 0.0,
        }
    }

    /// Resets all state and opens the registration window.
    pub fn initialize(&mut self) {
        self.registry.begin_registration();
        self.active.clear();
        self.inactive.clear();
        self.online_players.clear();
        self.online_by_uid.clear();
        self.tick_accumulator_ms = 0.0;
        info!(
            "Buff manager initialized (sweep every {} ms, save key {})",
            self.config.tick_interval_ms,
            self.config.save_key()
        );
    }

    /// Registers a buff kind. Only valid between `initialize()` and the first
    /// apply, sweep or join.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> BuffResult<()>
    where
        F: Fn() -> Box<dyn Buff> + Send + Sync + 'static,
    {
        self.registry.register(kind, factory)
    }

    /// Registers `T` under the kind its default value reports.
    pub fn register_default<T>(&mut self) -> BuffResult<()>
    where
        T: Buff + Default + 'static,
    {
        self.registry.register_default::<T>()
    }

    /// The kind registry.
    #[must_use]
    pub fn registry(&self) -> &BuffRegistry {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BuffConfig {
        &self.config
    }

    /// Current calendar time in days.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.calendar.total_days()
    }

    /// Leaves the registration phase on first use.
    fn ensure_running(&mut self) -> BuffResult<()> {
        if self.registry.phase() == RegistryPhase::Uninitialized {
            return Err(BuffError::NotInitialized);
        }
        self.registry.seal();
        Ok(())
    }

    fn attach(&mut self, entity: EntityId, instance: &mut BuffInstance) -> BuffHandle {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        instance.attach(entity, id)
    }

    // ------------------------------------------------------------------
    // Apply / remove
    // ------------------------------------------------------------------

    /// Attaches `instance` to `entity`.
    ///
    /// Calls `on_stack` with the instance it replaces if one of the same kind
    /// is active, `on_start` otherwise. The new instance always wins.
    pub fn apply(&mut self, entity: EntityId, mut instance: BuffInstance) -> BuffResult<BuffHandle> {
        self.ensure_running()?;
        let kind = instance.kind().to_string();
        if !self.registry.contains(&kind) {
            return Err(BuffError::UnknownKind(kind));
        }

        let handle = self.attach(entity, &mut instance);
        let now = self.now();
        let mut requests = Vec::new();

        let slot = self.active.entry(entity).or_default();
        match slot.remove(&kind) {
            Some(previous) => {
                debug!("Stacking {kind} on {entity}");
                instance.dispatch_stack(&previous, now, &mut requests);
            },
            None => {
                debug!("Starting {kind} on {entity}");
                instance.dispatch(Hook::Start, now, &mut requests);
            },
        }
        slot.insert(kind, instance);

        self.run_requests(requests);
        Ok(handle)
    }

    /// Detaches the instance behind `handle` without any callback.
    ///
    /// Returns false when the handle is stale (already removed or replaced).
    pub fn remove(&mut self, entity: EntityId, handle: &BuffHandle) -> bool {
        self.detach(entity, handle.kind(), handle.id()).is_some()
    }

    /// Detaches whatever instance of `kind` is active on `entity`, without
    /// any callback.
    pub fn remove_kind(&mut self, entity: EntityId, kind: &str) -> bool {
        let Some(id) = self
            .active
            .get(&entity)
            .and_then(|slot| slot.get(kind))
            .and_then(BuffInstance::instance_id)
        else {
            return false;
        };
        self.detach(entity, kind, id).is_some()
    }

    fn detach(&mut self, entity: EntityId, kind: &str, id: u64) -> Option<BuffInstance> {
        let slot = self.active.get_mut(&entity)?;
        if slot.get(kind).and_then(BuffInstance::instance_id) != Some(id) {
            return None;
        }
        let removed = slot.remove(kind);
        if slot.is_empty() {
            self.active.remove(&entity);
        }
        removed
    }

    /// Drops `entity` from the online index. The uid keeps pointing at a
    /// newer entity if the player rejoined elsewhere.
    fn forget_online(&mut self, entity: EntityId) -> Option<PlayerUid> {
        let uid = self.online_players.remove(&entity)?;
        if self.online_by_uid.get(&uid) == Some(&entity) {
            self.online_by_uid.remove(&uid);
        }
        Some(uid)
    }

    fn live_mut(&mut self, entity: EntityId, kind: &str, id: u64) -> Option<&mut BuffInstance> {
        self.active
            .get_mut(&entity)?
            .get_mut(kind)
            .filter(|instance| instance.instance_id() == Some(id))
    }

    fn run_requests(&mut self, requests: Vec<BuffRequest>) {
        for request in requests {
            match request {
                BuffRequest::Apply { entity, instance } => {
                    let kind = instance.kind().to_string();
                    if let Err(e) = self.apply(entity, instance) {
                        warn!("Buff-requested apply of {kind} on {entity} failed: {e}");
                    }
                },
                BuffRequest::Remove { entity, handle } => {
                    self.remove(entity, &handle);
                },
                BuffRequest::RemoveKind { entity, kind } => {
                    self.remove_kind(entity, &kind);
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // Sweep
    // ------------------------------------------------------------------

    /// Feeds a simulation step. Sweeps once the accumulated time reaches the
    /// configured interval.
    pub fn on_game_tick(&mut self, dt: f32) -> BuffResult<Option<SweepReport>> {
        self.tick_accumulator_ms += f64::from(dt.max(0.0)) * 1000.0;
        let interval = self.config.tick_interval_ms.max(1) as f64;
        if self.tick_accumulator_ms < interval {
            return Ok(None);
        }
        self.tick_accumulator_ms %= interval;
        self.sweep().map(Some)
    }

    /// Expires or ticks every active buff.
    ///
    /// The (entity, kind, instance) triples are captured up front. Instances
    /// that were removed or replaced by an earlier hook in the same pass are
    /// skipped; instances added during the pass wait for the next one.
    pub fn sweep(&mut self) -> BuffResult<SweepReport> {
        self.ensure_running()?;
        let now = self.now();
        let mut report = SweepReport::default();

        let mut entities: Vec<EntityId> = self.active.keys().copied().collect();
        entities.sort_unstable();
        let pass: Vec<(EntityId, Vec<(String, u64)>)> = entities
            .into_iter()
            .filter_map(|entity| {
                let slot = self.active.get(&entity)?;
                let buffs = slot
                    .iter()
                    .filter_map(|(kind, instance)| Some((kind.clone(), instance.instance_id()?)))
                    .collect();
                Some((entity, buffs))
            })
            .collect();

        for (entity, buffs) in pass {
            for (kind, id) in buffs {
                let mut requests = Vec::new();
                let Some(instance) = self.live_mut(entity, &kind, id) else {
                    continue;
                };

                if instance.is_expired(now) {
                    instance.dispatch(Hook::Expire, now, &mut requests);
                    self.detach(entity, &kind, id);
                    report.expired += 1;
                    debug!("Buff {kind} expired on {entity}");
                } else {
                    instance.dispatch(Hook::Tick, now, &mut requests);
                    report.ticked += 1;
                }

                self.run_requests(requests);
            }
        }

        Ok(report)
    }

    // ------------------------------------------------------------------
    // Lifecycle events
    // ------------------------------------------------------------------

    /// Restores a reconnecting player's buffs onto their new entity.
    ///
    /// Records whose kind is no longer registered, or whose payload fails to
    /// decode, are logged and discarded; the rest are restored. Returns the
    /// number of buffs restored.
    pub fn on_player_join(&mut self, player: &PlayerRef) -> BuffResult<usize> {
        self.ensure_running()?;
        self.online_players.insert(player.entity, player.uid.clone());
        if let Some(previous) = self.online_by_uid.insert(player.uid.clone(), player.entity) {
            if previous != player.entity {
                warn!(
                    "Player {} joined as {} while still online as {previous}",
                    player.uid, player.entity
                );
            }
        }

        let Some(records) = self.inactive.remove(&player.uid) else {
            return Ok(0);
        };
        let now = self.now();

        let mut restored = Vec::with_capacity(records.len());
        for record in &records {
            match record.restore(&self.registry, now) {
                Ok(mut instance) => {
                    let handle = self.attach(player.entity, &mut instance);
                    let slot = self.active.entry(player.entity).or_default();
                    if slot.insert(handle.kind().to_string(), instance).is_some() {
                        debug!("Restored {} replaced a live instance on {}", handle.kind(), player.entity);
                    }
                    restored.push(handle);
                },
                Err(e) => {
                    warn!("Dropping buff {} for player {}: {e}", record.id, player.uid);
                },
            }
        }

        // A later record of the same kind replaces an earlier one.
        let mut requests = Vec::new();
        let mut live = 0;
        for handle in &restored {
            if let Some(instance) = self.live_mut(player.entity, handle.kind(), handle.id()) {
                instance.dispatch(Hook::Join, now, &mut requests);
                live += 1;
            }
        }

        info!(
            "Restored {live}/{} buffs for player {}",
            records.len(),
            player.uid
        );
        self.run_requests(requests);
        Ok(live)
    }

    /// Suspends a disconnecting player's buffs into the inactive store.
    /// Returns the number of records stored.
    ///
    /// The entity's row is gone once this returns. Requests `on_leave` makes
    /// against the leaving entity itself are discarded.
    pub fn on_player_leave(&mut self, player: &PlayerRef) -> usize {
        self.forget_online(player.entity);
        let Some(mut buffs) = self.active.remove(&player.entity) else {
            return 0;
        };
        let now = self.now();

        let mut requests = Vec::new();
        for instance in buffs.values_mut() {
            instance.dispatch(Hook::Leave, now, &mut requests);
        }

        let records = capture_all(buffs.values(), now, &player.uid);
        let stored = records.len();
        if !records.is_empty() {
            self.inactive.insert(player.uid.clone(), records);
        }
        info!("Suspended {stored} buffs for player {}", player.uid);

        let before = requests.len();
        requests.retain(|request| request.target() != player.entity);
        if requests.len() < before {
            warn!(
                "Discarded {} on_leave requests against departing {}",
                before - requests.len(),
                player.entity
            );
        }
        self.run_requests(requests);
        stored
    }

    /// Runs `on_death` on every buff of `entity`, then drops them all.
    /// Returns the number of buffs cleared.
    pub fn on_entity_death(&mut self, entity: EntityId) -> usize {
        let Some(mut buffs) = self.active.remove(&entity) else {
            return 0;
        };
        let now = self.now();

        let mut requests = Vec::new();
        for instance in buffs.values_mut() {
            instance.dispatch(Hook::Death, now, &mut requests);
        }
        let cleared = buffs.len();
        drop(buffs);
        debug!("Cleared {cleared} buffs on death of {entity}");

        self.run_requests(requests);
        cleared
    }

    /// Drops every buff of a despawned entity, without callbacks.
    pub fn on_entity_despawn(&mut self, entity: EntityId, reason: DespawnReason) -> usize {
        if let Some(uid) = self.forget_online(entity) {
            debug!("Player {uid} despawned ({reason:?}) without leaving");
        }
        let dropped = self.active.remove(&entity).map_or(0, |buffs| buffs.len());
        if dropped > 0 {
            debug!("Dropped {dropped} buffs on despawn of {entity} ({reason:?})");
        }
        dropped
    }

    /// Dispatches one host event.
    pub fn handle_event(&mut self, event: BuffEvent) {
        match event {
            BuffEvent::Tick { dt } => {
                if let Err(e) = self.on_game_tick(dt) {
                    warn!("Buff sweep skipped: {e}");
                }
            },
            BuffEvent::PlayerJoined(player) => {
                if let Err(e) = self.on_player_join(&player) {
                    warn!("Could not restore buffs for {}: {e}", player.uid);
                }
            },
            BuffEvent::PlayerLeft(player) => {
                self.on_player_leave(&player);
            },
            BuffEvent::PlayerDied(player) => {
                self.on_entity_death(player.entity);
            },
            BuffEvent::EntityDespawned { entity, reason } => {
                self.on_entity_despawn(entity, reason);
            },
        }
    }

    /// Drains `feed` and dispatches its events in order. Returns the number
    /// of events handled.
    pub fn pump(&mut self, feed: &EventFeed) -> usize {
        let events = feed.drain();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    // ------------------------------------------------------------------
    // World save / load
    // ------------------------------------------------------------------

    /// Point-in-time export: the inactive store plus the serialized active
    /// buffs of every online player. Live state is left untouched.
    ///
    /// A player online under two entities is exported from the one that
    /// joined last.
    #[must_use]
    pub fn snapshot(&self) -> InactiveBuffs {
        let now = self.now();
        let mut snapshot = self.inactive.clone();
        for (uid, entity) in &self.online_by_uid {
            if let Some(buffs) = self.active.get(entity) {
                let records = capture_all(buffs.values(), now, uid);
                if !records.is_empty() {
                    snapshot.insert(uid.clone(), records);
                }
            }
        }
        snapshot
    }

    /// Writes [`snapshot`](Self::snapshot) to the save store.
    pub fn save_world(&self, store: &mut dyn SaveStore) -> BuffResult<()> {
        let snapshot = self.snapshot();
        let bytes = encode_snapshot(&snapshot)?;
        let key = self.config.save_key();
        info!(
            "Saving buffs for {} players ({} bytes) under {key}",
            snapshot.len(),
            bytes.len()
        );
        store.set_named_blob(&key, bytes)?;
        Ok(())
    }

    /// Replaces the inactive store with the snapshot in the save store.
    ///
    /// Returns false when the save has no snapshot, in which case nothing
    /// changes. Nothing is restored onto entities until players join.
    pub fn load_world(&mut self, store: &dyn SaveStore) -> BuffResult<bool> {
        let key = self.config.save_key();
        let Some(bytes) = store.get_named_blob(&key)? else {
            info!("No saved buffs under {key}");
            return Ok(false);
        };
        let snapshot = decode_snapshot(&bytes)?;
        self.restore_snapshot(snapshot);
        Ok(true)
    }

    /// Replaces the inactive store wholesale.
    pub fn restore_snapshot(&mut self, snapshot: InactiveBuffs) {
        info!("Loaded inactive buffs for {} players", snapshot.len());
        self.inactive = snapshot;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Kinds active on `entity`, sorted.
    #[must_use]
    pub fn active_kinds(&self, entity: EntityId) -> Vec<&str> {
        self.active
            .get(&entity)
            .map(|slot| slot.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `entity` has an active buff of `kind`.
    #[must_use]
    pub fn has_buff(&self, entity: EntityId, kind: &str) -> bool {
        self.get(entity, kind).is_some()
    }

    /// The active instance of `kind` on `entity`.
    #[must_use]
    pub fn get(&self, entity: EntityId, kind: &str) -> Option<&BuffInstance> {
        self.active.get(&entity)?.get(kind)
    }

    /// Days left on the active instance of `kind` on `entity`.
    #[must_use]
    pub fn remaining_days(&self, entity: EntityId, kind: &str) -> Option<f64> {
        let now = self.now();
        self.get(entity, kind).map(|instance| instance.remaining_days(now))
    }

    /// Number of active buffs on `entity`.
    #[must_use]
    pub fn active_buff_count(&self, entity: EntityId) -> usize {
        self.active.get(&entity).map_or(0, BTreeMap::len)
    }

    /// Number of entities with at least one active buff.
    #[must_use]
    pub fn active_entity_count(&self) -> usize {
        self.active.len()
    }

    /// Whether `entity` has an entry in the active table.
    #[must_use]
    pub fn is_tracking(&self, entity: EntityId) -> bool {
        self.active.contains_key(&entity)
    }

    /// Serialized buffs waiting for `uid` to reconnect.
    #[must_use]
    pub fn inactive_records(&self, uid: &PlayerUid) -> Option<&[SerializedBuff]> {
        self.inactive.get(uid).map(Vec::as_slice)
    }

    /// Number of offline players with suspended buffs.
    #[must_use]
    pub fn inactive_player_count(&self) -> usize {
        self.inactive.len()
    }

    /// Whether `entity` belongs to a player who joined and has not left.
    #[must_use]
    pub fn is_online_player(&self, entity: EntityId) -> bool {
        self.online_players.contains_key(&entity)
    }
}

/// Serializes `instances`, logging and skipping any that fail.
fn capture_all<'a>(
    instances: impl Iterator<Item = &'a BuffInstance>,
    now: f64,
    uid: &PlayerUid,
) -> Vec<SerializedBuff> {
    instances
        .filter_map(|instance| match SerializedBuff::capture(instance, now) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Could not serialize {} for player {uid}: {e}", instance.kind());
                None
            },
        })
        .collect()
}
