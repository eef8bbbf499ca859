//! Buff kinds shared by the unit and scenario tests.

#![cfg(test)]

use std::sync::Arc;

use buffstuff_common::EntityId;
use parking_lot::Mutex;

use crate::buff::{decode_payload, encode_payload, Buff, BuffContext};
use crate::error::BuffResult;
use crate::instance::BuffInstance;

/// Shared record of hook calls, formatted as `kind:label:hook`.
pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

/// Empties `log` and returns what it held.
pub(crate) fn take(log: &EventLog) -> Vec<String> {
    std::mem::take(&mut *log.lock())
}

/// Buff that logs every hook. Its label and tick counter survive
/// serialization.
#[derive(Debug)]
pub(crate) struct Recorder {
    kind: &'static str,
    pub label: String,
    pub ticks: u32,
    log: EventLog,
}

impl Recorder {
    pub(crate) fn new(kind: &'static str, label: &str, log: &EventLog) -> Self {
        Self {
            kind,
            label: label.to_string(),
            ticks: 0,
            log: Arc::clone(log),
        }
    }

    /// Factory producing blank recorders labelled `restored`.
    pub(crate) fn factory(
        kind: &'static str,
        log: &EventLog,
    ) -> impl Fn() -> Box<dyn Buff> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || Box::new(Recorder::new(kind, "restored", &log)) as Box<dyn Buff>
    }

    fn note(&self, hook: &str) {
        self.log
            .lock()
            .push(format!("{}:{}:{hook}", self.kind, self.label));
    }
}

impl Buff for Recorder {
    fn kind(&self) -> &str {
        self.kind
    }

    fn on_start(&mut self, _ctx: &mut BuffContext<'_>) {
        self.note("start");
    }

    fn on_stack(&mut self, previous: &BuffInstance, _ctx: &mut BuffContext<'_>) {
        let from = previous
            .downcast_ref::<Recorder>()
            .map_or("?", |p| p.label.as_str());
        self.note(&format!("stack<-{from}"));
    }

    fn on_expire(&mut self, _ctx: &mut BuffContext<'_>) {
        self.note("expire");
    }

    fn on_death(&mut self, _ctx: &mut BuffContext<'_>) {
        self.note("death");
    }

    fn on_tick(&mut self, _ctx: &mut BuffContext<'_>) {
        self.ticks += 1;
        self.note("tick");
    }

    fn on_leave(&mut self, _ctx: &mut BuffContext<'_>) {
        self.note("leave");
    }

    fn on_join(&mut self, _ctx: &mut BuffContext<'_>) {
        self.note("join");
    }

    fn serialize(&self) -> BuffResult<Option<Vec<u8>>> {
        encode_payload(self.kind, &(&self.label, self.ticks))
    }

    fn deserialize(&mut self, payload: Option<&[u8]>) -> BuffResult<()> {
        if let Some((label, ticks)) = decode_payload::<(String, u32)>(self.kind, payload)? {
            self.label = label;
            self.ticks = ticks;
        }
        Ok(())
    }
}

/// On tick, strips `poison` from its own entity.
#[derive(Debug, Default)]
pub(crate) struct Cleanser;

impl Buff for Cleanser {
    fn kind(&self) -> &str {
        "cleanser"
    }

    fn on_tick(&mut self, ctx: &mut BuffContext<'_>) {
        let entity = ctx.entity();
        ctx.remove_kind(entity, "poison");
    }
}

/// On tick, poisons `target` and removes itself.
#[derive(Debug)]
pub(crate) struct Spreader {
    target: EntityId,
    log: EventLog,
}

impl Spreader {
    pub(crate) fn new(target: EntityId, log: &EventLog) -> Self {
        Self {
            target,
            log: Arc::clone(log),
        }
    }

    pub(crate) fn factory(log: &EventLog) -> impl Fn() -> Box<dyn Buff> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || Box::new(Spreader::new(EntityId::NULL, &log)) as Box<dyn Buff>
    }
}

impl Buff for Spreader {
    fn kind(&self) -> &str {
        "spreader"
    }

    fn on_tick(&mut self, ctx: &mut BuffContext<'_>) {
        if self.target.is_valid() {
            let poison = BuffInstance::new(Recorder::new("poison", "spread", &self.log));
            ctx.apply(self.target, poison);
        }
        ctx.remove_self();
    }
}

/// On expiry, re-applies itself for one more day with a bumped generation.
#[derive(Debug, Default)]
pub(crate) struct Renewer {
    pub generation: u32,
}

impl Buff for Renewer {
    fn kind(&self) -> &str {
        "renewer"
    }

    fn on_expire(&mut self, ctx: &mut BuffContext<'_>) {
        let next = Renewer {
            generation: self.generation + 1,
        };
        let instance = BuffInstance::new(next).expiring_in_game_days(ctx.now(), 1.0);
        ctx.apply(ctx.entity(), instance);
    }
}

/// Asks to be expired as soon as it starts.
#[derive(Debug, Default)]
pub(crate) struct Fleeting;

impl Buff for Fleeting {
    fn kind(&self) -> &str {
        "fleeting"
    }

    fn on_start(&mut self, ctx: &mut BuffContext<'_>) {
        ctx.set_expiry_immediately();
    }
}

/// Keeps the replaced instance's tick counter when stacked.
#[derive(Debug, Default)]
pub(crate) struct Tally;

impl Buff for Tally {
    fn kind(&self) -> &str {
        "tally"
    }

    fn on_stack(&mut self, previous: &BuffInstance, ctx: &mut BuffContext<'_>) {
        ctx.set_tick_count(previous.tick_count());
    }
}

/// On leave, tries to leave a never-expiring haste behind on its own entity
/// and hands one to `friend`.
#[derive(Debug)]
pub(crate) struct Grace {
    friend: EntityId,
    log: EventLog,
}

impl Grace {
    pub(crate) fn new(friend: EntityId, log: &EventLog) -> Self {
        Self {
            friend,
            log: Arc::clone(log),
        }
    }

    pub(crate) fn factory(log: &EventLog) -> impl Fn() -> Box<dyn Buff> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || Box::new(Grace::new(EntityId::NULL, &log)) as Box<dyn Buff>
    }
}

impl Buff for Grace {
    fn kind(&self) -> &str {
        "grace"
    }

    fn on_leave(&mut self, ctx: &mut BuffContext<'_>) {
        let own = BuffInstance::new(Recorder::new("haste", "left", &self.log));
        ctx.apply(ctx.entity(), own);
        if self.friend.is_valid() {
            let gift = BuffInstance::new(Recorder::new("haste", "gift", &self.log));
            ctx.apply(self.friend, gift);
        }
    }
}
