//! Buff kinds shipped with the reference host.

use buffstuff_common::EntityId;
use buffstuff_core::{
    decode_payload, encode_payload, Buff, BuffContext, BuffInstance, BuffManager, BuffResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Upper bound on stacked shield absorption.
const MAX_SHIELD_ABSORB: u32 = 500;

/// Damage over time. Stacking keeps the later expiry and the damage dealt so
/// far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poison {
    /// Damage per sweep
    pub damage_per_tick: f32,
    /// Damage dealt so far
    pub total_damage: f32,
}

impl Default for Poison {
    fn default() -> Self {
        Self {
            damage_per_tick: 1.0,
            total_damage: 0.0,
        }
    }
}

impl Buff for Poison {
    fn kind(&self) -> &str {
        "poison"
    }

    fn on_stack(&mut self, previous: &BuffInstance, ctx: &mut BuffContext<'_>) {
        if let Some(old) = previous.downcast_ref::<Poison>() {
            self.total_damage += old.total_damage;
        }
        if previous.expire_at() > ctx.expire_at() {
            ctx.set_expiry_in_game_days(previous.remaining_days(ctx.now()));
        }
    }

    fn on_tick(&mut self, ctx: &mut BuffContext<'_>) {
        self.total_damage += self.damage_per_tick;
        debug!("{} takes {} poison damage", ctx.entity(), self.damage_per_tick);
    }

    fn on_expire(&mut self, ctx: &mut BuffContext<'_>) {
        info!("Poison wore off {} after {} damage", ctx.entity(), self.total_damage);
    }

    fn serialize(&self) -> BuffResult<Option<Vec<u8>>> {
        encode_payload(self.kind(), self)
    }

    fn deserialize(&mut self, payload: Option<&[u8]>) -> BuffResult<()> {
        if let Some(state) = decode_payload(self.kind(), payload)? {
            *self = state;
        }
        Ok(())
    }
}

/// Damage absorption. Stacking adds the absorption left on the replaced
/// shield.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shield {
    /// Damage the shield can still absorb
    pub absorb: u32,
}

impl Buff for Shield {
    fn kind(&self) -> &str {
        "shield"
    }

    fn on_stack(&mut self, previous: &BuffInstance, _ctx: &mut BuffContext<'_>) {
        if let Some(old) = previous.downcast_ref::<Shield>() {
            self.absorb = (self.absorb + old.absorb).min(MAX_SHIELD_ABSORB);
        }
    }

    fn on_join(&mut self, ctx: &mut BuffContext<'_>) {
        debug!(
            "Shield on {} resumes with {} absorb, {:.2} days left",
            ctx.entity(),
            self.absorb,
            ctx.remaining_days()
        );
    }

    fn serialize(&self) -> BuffResult<Option<Vec<u8>>> {
        encode_payload(self.kind(), &self.absorb)
    }

    fn deserialize(&mut self, payload: Option<&[u8]>) -> BuffResult<()> {
        if let Some(absorb) = decode_payload(self.kind(), payload)? {
            self.absorb = absorb;
        }
        Ok(())
    }
}

/// Movement speed bonus. Falls off on death.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Haste {
    /// Speed multiplier
    pub multiplier: f32,
}

impl Default for Haste {
    fn default() -> Self {
        Self { multiplier: 1.5 }
    }
}

impl Buff for Haste {
    fn kind(&self) -> &str {
        "haste"
    }

    fn on_start(&mut self, ctx: &mut BuffContext<'_>) {
        debug!("{} hastened x{}", ctx.entity(), self.multiplier);
    }

    fn on_death(&mut self, ctx: &mut BuffContext<'_>) {
        debug!("Haste lost on death of {}", ctx.entity());
    }

    fn serialize(&self) -> BuffResult<Option<Vec<u8>>> {
        encode_payload(self.kind(), &self.multiplier)
    }

    fn deserialize(&mut self, payload: Option<&[u8]>) -> BuffResult<()> {
        if let Some(multiplier) = decode_payload(self.kind(), payload)? {
            self.multiplier = multiplier;
        }
        Ok(())
    }
}

/// Registers every kind this host ships.
pub fn register_all(manager: &mut BuffManager) -> BuffResult<()> {
    manager.register_default::<Poison>()?;
    manager.register_default::<Shield>()?;
    manager.register_default::<Haste>()?;
    info!("Registered {} buff kinds", manager.registry().len());
    Ok(())
}

/// Buffs handed to a player on first connect.
pub fn starter_kit(now: f64) -> Vec<BuffInstance> {
    vec![
        BuffInstance::new(Poison::default()).expiring_in_game_days(now, 2.0),
        BuffInstance::new(Shield { absorb: 100 }).expiring_in_game_days(now, 10.0),
        BuffInstance::new(Haste::default()).expiring_in_game_hours(now, 6.0),
    ]
}

/// Applies [`starter_kit`] to `entity`.
pub fn grant_starter_kit(manager: &mut BuffManager, entity: EntityId) -> BuffResult<usize> {
    let kit = starter_kit(manager.now());
    let count = kit.len();
    for instance in kit {
        manager.apply(entity, instance)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffstuff_common::PlayerRef;
    use buffstuff_core::{BuffConfig, GameCalendar};

    fn manager_at(days: f64) -> (BuffManager, GameCalendar) {
        let calendar = GameCalendar::starting_at_days(days);
        let mut manager = BuffManager::new(BuffConfig::default(), calendar.clone());
        manager.initialize();
        register_all(&mut manager).expect("register plugins");
        (manager, calendar)
    }

    #[test]
    fn test_register_all_twice_is_a_configuration_error() {
        let (mut manager, _) = manager_at(0.0);
        let err = register_all(&mut manager).expect_err("duplicate");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_starter_kit_expiries() {
        let (mut manager, _) = manager_at(4.0);
        let entity = EntityId::from_raw(1);
        assert_eq!(grant_starter_kit(&mut manager, entity).expect("kit"), 3);

        assert_eq!(manager.active_kinds(entity), vec!["haste", "poison", "shield"]);
        assert_eq!(manager.get(entity, "poison").map(BuffInstance::expire_at), Some(6.0));
        assert_eq!(manager.get(entity, "shield").map(BuffInstance::expire_at), Some(14.0));
        assert_eq!(manager.get(entity, "haste").map(BuffInstance::expire_at), Some(4.25));
    }

    #[test]
    fn test_shield_stacks_absorb_with_cap() {
        let (mut manager, _) = manager_at(0.0);
        let entity = EntityId::from_raw(2);
        manager
            .apply(entity, BuffInstance::new(Shield { absorb: 300 }))
            .expect("first");
        manager
            .apply(entity, BuffInstance::new(Shield { absorb: 150 }))
            .expect("second");
        let shield = manager.get(entity, "shield").and_then(|b| b.downcast_ref::<Shield>());
        assert_eq!(shield, Some(&Shield { absorb: 450 }));

        manager
            .apply(entity, BuffInstance::new(Shield { absorb: 150 }))
            .expect("third");
        let shield = manager.get(entity, "shield").and_then(|b| b.downcast_ref::<Shield>());
        assert_eq!(shield, Some(&Shield { absorb: MAX_SHIELD_ABSORB }));
    }

    #[test]
    fn test_poison_stack_keeps_later_expiry_and_damage() {
        let (mut manager, calendar) = manager_at(0.0);
        let entity = EntityId::from_raw(3);
        manager
            .apply(entity, BuffInstance::new(Poison::default()).expiring_at(5.0))
            .expect("first");
        calendar.set_total_days(1.0);
        manager.sweep().expect("sweep");

        manager
            .apply(entity, BuffInstance::new(Poison::default()).expiring_at(2.0))
            .expect("second");
        let poison = manager.get(entity, "poison").expect("poison");
        assert_eq!(poison.expire_at(), 5.0);
        assert_eq!(poison.downcast_ref::<Poison>().map(|p| p.total_damage), Some(1.0));
    }

    #[test]
    fn test_plugin_state_survives_reconnect() {
        let (mut manager, calendar) = manager_at(0.0);
        let player = PlayerRef::new(EntityId::from_raw(4), "pat");
        manager.on_player_join(&player).expect("join");
        grant_starter_kit(&mut manager, player.entity).expect("kit");
        manager.sweep().expect("sweep");
        manager.sweep().expect("sweep");

        manager.on_player_leave(&player);
        calendar.advance_days(1.0);
        let back = PlayerRef::new(EntityId::from_raw(5), "pat");
        assert_eq!(manager.on_player_join(&back).expect("rejoin"), 3);

        let poison = manager
            .get(back.entity, "poison")
            .and_then(|b| b.downcast_ref::<Poison>())
            .cloned();
        assert_eq!(
            poison,
            Some(Poison {
                damage_per_tick: 1.0,
                total_damage: 2.0
            })
        );
        let shield = manager.get(back.entity, "shield").expect("shield");
        assert_eq!(shield.expire_at(), 11.0);
        assert_eq!(shield.tick_count(), 2);
    }
}
