//! Scripted server session.
//!
//! Plays one short life of a server: players connect and receive buffs, the
//! world runs, one player disconnects, the world is saved and the server
//! restarts from that save, the player reconnects and the world runs again.

use std::path::PathBuf;

use anyhow::{Context, Result};
use buffstuff_common::{EntityId, PlayerRef};
use buffstuff_core::{
    BuffEvent, BuffManager, Calendar, EventFeed, FileSaveStore, GameCalendar, SweepReport,
};
use serde::Serialize;
use tracing::info;

use crate::config::HostConfig;
use crate::plugins;

/// Final state of one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    /// Stable identity
    pub uid: String,
    /// Buff kinds active at shutdown
    pub kinds: Vec<String>,
}

/// What happened during the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Sweeps performed across both boots
    pub sweeps: usize,
    /// Buff ticks across all sweeps
    pub ticked: usize,
    /// Buffs that expired
    pub expired: usize,
    /// Buffs restored when the disconnected player came back
    pub restored_on_rejoin: usize,
    /// Calendar day at shutdown
    pub final_day: f64,
    /// Where the world save was written
    pub save_path: PathBuf,
    /// Per-player outcome
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Default)]
struct Totals {
    sweeps: usize,
    ticked: usize,
    expired: usize,
}

impl Totals {
    fn record(&mut self, report: SweepReport) {
        self.sweeps += 1;
        self.ticked += report.ticked;
        self.expired += report.expired;
    }
}

fn boot(config: &HostConfig, calendar: &GameCalendar) -> Result<BuffManager> {
    let mut manager = BuffManager::new(config.buffs.clone(), calendar.clone());
    manager.initialize();
    plugins::register_all(&mut manager).context("registering buff kinds")?;
    Ok(manager)
}

/// Advances the calendar and feeds one tick per frame.
fn run_phase(
    config: &HostConfig,
    calendar: &GameCalendar,
    manager: &mut BuffManager,
    totals: &mut Totals,
) -> Result<()> {
    let dt = config.session.frame_dt;
    for _ in 0..config.session.frames_per_phase {
        calendar.advance(dt);
        if let Some(report) = manager.on_game_tick(dt)? {
            totals.record(report);
        }
    }
    Ok(())
}

/// Runs the scripted session.
pub fn run(config: &HostConfig) -> Result<SessionSummary> {
    let session = &config.session;
    let calendar = GameCalendar::starting_at_days(session.start_day);
    calendar.set_time_scale(session.real_seconds_per_game_minute);
    let feed = EventFeed::default();
    let mut store = FileSaveStore::new(&config.save_dir);
    let mut totals = Totals::default();

    // First boot: everyone connects and gets the starter kit.
    let mut manager = boot(config, &calendar)?;
    let players: Vec<PlayerRef> = session
        .players
        .iter()
        .map(|uid| PlayerRef::new(EntityId::new(), uid.as_str()))
        .collect();
    for player in &players {
        feed.publish(BuffEvent::PlayerJoined(player.clone()));
    }
    manager.pump(&feed);
    for player in &players {
        plugins::grant_starter_kit(&mut manager, player.entity)
            .with_context(|| format!("granting starter kit to {}", player.uid))?;
    }
    run_phase(config, &calendar, &mut manager, &mut totals)?;

    // The first player disconnects, then the world is saved.
    let leaver = players.first().cloned();
    if let Some(player) = &leaver {
        feed.publish(BuffEvent::PlayerLeft(player.clone()));
        manager.pump(&feed);
    }
    manager
        .save_world(&mut store)
        .context("saving world buffs")?;
    info!("World saved at day {:.2}", calendar.total_days());

    // Restart from the save. Players still online reconnect with new
    // entities, the leaver a little later.
    let mut manager = boot(config, &calendar)?;
    manager.load_world(&store).context("loading world buffs")?;

    let mut online: Vec<PlayerRef> = players
        .iter()
        .skip(1)
        .map(|player| PlayerRef::new(EntityId::new(), player.uid.clone()))
        .collect();
    for player in &online {
        feed.publish(BuffEvent::PlayerJoined(player.clone()));
    }
    manager.pump(&feed);
    run_phase(config, &calendar, &mut manager, &mut totals)?;

    let mut restored_on_rejoin = 0;
    if let Some(player) = leaver {
        let rejoined = PlayerRef::new(EntityId::new(), player.uid);
        restored_on_rejoin = manager.on_player_join(&rejoined)?;
        online.insert(0, rejoined);
    }
    run_phase(config, &calendar, &mut manager, &mut totals)?;
    manager
        .save_world(&mut store)
        .context("saving world buffs")?;

    let summary = SessionSummary {
        sweeps: totals.sweeps,
        ticked: totals.ticked,
        expired: totals.expired,
        restored_on_rejoin,
        final_day: manager.now(),
        save_path: config.save_dir.clone(),
        players: online
            .iter()
            .map(|player| PlayerSummary {
                uid: player.uid.to_string(),
                kinds: manager
                    .active_kinds(player.entity)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect(),
    };
    info!(
        "Session finished: {} sweeps, {} expired, {} restored on rejoin",
        summary.sweeps, summary.expired, summary.restored_on_rejoin
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffstuff_common::PlayerUid;
    use buffstuff_core::{decode_snapshot, SaveStore};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> HostConfig {
        let mut config = HostConfig::default();
        config.save_dir = dir.path().join("world");
        config
    }

    #[test]
    fn test_default_session() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = config_in(&temp_dir);
        let summary = run(&config).expect("session");

        // 240 frames of 0.25 s per phase, one sweep per frame.
        assert_eq!(summary.sweeps, 720);
        assert_eq!(summary.players.len(), 2);

        // Haste and poison ran out before alice left; her shield was
        // suspended while she was away and outlives bob's.
        assert_eq!(summary.restored_on_rejoin, 1);
        assert_eq!(summary.expired, 5);
        assert_eq!(summary.players[0].uid, "alice");
        assert_eq!(summary.players[0].kinds, vec!["shield"]);
        assert!(summary.players[1].kinds.is_empty());

        // 25 game minutes per frame over 720 frames = 12.5 days.
        assert!((summary.final_day - 13.5).abs() < 1e-3);
    }

    #[test]
    fn test_session_writes_snapshot() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = config_in(&temp_dir);
        config.session.frames_per_phase = 4;
        let summary = run(&config).expect("session");

        // Short session: nothing expires, everyone keeps the full kit.
        assert_eq!(summary.expired, 0);
        for player in &summary.players {
            assert_eq!(player.kinds, vec!["haste", "poison", "shield"]);
        }

        let store = FileSaveStore::new(&config.save_dir);
        let blob = store
            .get_named_blob(&config.buffs.save_key())
            .expect("read save")
            .expect("save exists");
        let snapshot = decode_snapshot(&blob).expect("decode");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&PlayerUid::new("alice")].len(), 3);
    }

    #[test]
    fn test_session_without_players() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = config_in(&temp_dir);
        config.session.players.clear();
        config.session.frames_per_phase = 8;

        let summary = run(&config).expect("session");
        assert_eq!(summary.restored_on_rejoin, 0);
        assert!(summary.players.is_empty());
        assert_eq!(summary.ticked, 0);
    }
}
