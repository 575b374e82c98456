use crate::core::config::RaceConfig;
use crate::core::race::RaceEngine;
use crate::interfaces::presentation::{RaceMessage, MAX_SNAPSHOT_FREQUENCY};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::RaceSetup;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sends messages to a live front-end. A receiver that went away is reported once; the race goes
/// on regardless, dropped snapshots do not affect the simulation.
struct Outbox<'a> {
    tx: &'a Sender<RaceMessage>,
    dropped: bool,
}

impl<'a> Outbox<'a> {
    fn send(&mut self, msg: RaceMessage) {
        if self.tx.send(msg).is_err() && !self.dropped {
            warn!("Receiver disconnected, dropping further race messages");
            self.dropped = true;
        }
    }
}

/// build_engine creates a race engine from the setup and moves it into the countdown.
///
/// * `config` - Custom configuration, replaces the duration bucket of the setup if given
pub fn build_engine(setup: &RaceSetup, config: Option<&RaceConfig>) -> anyhow::Result<RaceEngine> {
    let base_config = config.cloned().unwrap_or_default();
    let mut engine = match setup.seed {
        Some(seed) => RaceEngine::with_seed(base_config, seed),
        None => RaceEngine::new(base_config),
    };

    match (setup.duration_secs, config) {
        (Some(secs), None) => {
            engine.choose_duration(secs)?;
        }
        (Some(secs), Some(_)) => {
            warn!("Ignoring duration {}s, a custom race config is used", secs)
        }
        _ => (),
    }

    for name in setup.entrants.iter() {
        engine
            .register_entrant(name)
            .context(format!("Failed to register entrant \"{}\"!", name))?;
    }
    if let Some(selection) = &setup.win_selection {
        engine.choose_win_selection(selection.to_owned())?;
    }
    engine.complete_setup()?;

    Ok(engine)
}

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the result for post-processing.
///
/// * `timestep_size` - (s) Simulated time per tick
/// * `tx` - If set, the race runs in real-time and snapshots, events and the result are sent
/// through the channel
/// * `realtime_factor` - Speed-up of the real-time mode
pub fn handle_race(
    setup: &RaceSetup,
    config: Option<&RaceConfig>,
    timestep_size: f64,
    tx: Option<&Sender<RaceMessage>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    anyhow::ensure!(
        (0.001..=1.0).contains(&timestep_size),
        "Timestep size {}s is outside of [0.001, 1.0]!",
        timestep_size
    );
    anyhow::ensure!(
        realtime_factor > 0.0,
        "Real-time factor must be positive!"
    );

    let mut engine = build_engine(setup, config)?;
    let timestep_ms = timestep_size * 1000.0;
    let mut now = 0.0;
    engine.start_race(now)?;

    // check if sender was inserted -> in that case use real-time simulation
    let result = match tx {
        None => loop {
            now += timestep_ms;
            let report = engine
                .tick(now)
                .context("Race stopped before it was finished!")?;
            for event in report.events.iter() {
                debug!("{}: {}", event.name, event.description);
            }
            if let Some(result) = report.result {
                break result;
            }
        },
        Some(tx) => {
            let mut outbox = Outbox { tx, dropped: false };
            let mut t_last_snapshot = f64::NEG_INFINITY;

            loop {
                let t_start = Instant::now();
                now += timestep_ms;
                let report = engine
                    .tick(now)
                    .context("Race stopped before it was finished!")?;

                for event in report.events.into_iter() {
                    outbox.send(RaceMessage::Event {
                        session_id: engine.session_id(),
                        notice: event,
                    });
                }

                if now >= t_last_snapshot + 1000.0 / MAX_SNAPSHOT_FREQUENCY - 1.0
                    || report.result.is_some()
                {
                    outbox.send(RaceMessage::Tick(report.snapshot));
                    t_last_snapshot = now;
                }

                if let Some(result) = report.result {
                    outbox.send(RaceMessage::Finished(result.clone()));
                    break result;
                }

                // sleep until time step is finished in real-time as well (calculation in ms)
                let t_sleep = (timestep_ms / realtime_factor) as i64
                    - t_start.elapsed().as_millis() as i64;

                if t_sleep > 0 {
                    sleep(Duration::from_millis(t_sleep as u64));
                } else if t_sleep < 0 {
                    warn!("Could not keep up with real-time!")
                }
            }
        }
    };

    info!(
        "Session {} done, {} events fired",
        result.session_id,
        result.events.len()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race::{RaceStatus, WinSelection};

    fn setup(seed: u64) -> RaceSetup {
        RaceSetup {
            entrants: vec!["Ann".to_owned(), "Ben".to_owned(), "Cy".to_owned()],
            duration_secs: Some(20),
            win_selection: Some(WinSelection::Single { rank: 1 }),
            seed: Some(seed),
        }
    }

    #[test]
    fn headless_race_returns_a_result() {
        let result = handle_race(&setup(4), None, 0.05, None, 1.0).unwrap();

        assert_eq!(result.full_ranking.len(), 3);
        assert_eq!(result.winners.len(), 1);
        assert_eq!(result.winners[0].place, 3);
        assert_eq!(result.duration_ms, 20_000.0);
    }

    #[test]
    fn build_engine_applies_the_setup() {
        let engine = build_engine(&setup(1), None).unwrap();
        assert_eq!(engine.status(), RaceStatus::Countdown);
        assert_eq!(engine.config().duration_ms, 20_000.0);
        assert_eq!(engine.racers().len(), 3);

        let custom = RaceConfig::for_bucket(crate::core::config::DurationBucket::Medium);
        let engine = build_engine(&setup(1), Some(&custom)).unwrap();
        assert_eq!(engine.config(), &custom);
    }

    #[test]
    fn invalid_setups_are_reported() {
        let mut lonely = setup(1);
        lonely.entrants.truncate(1);
        assert!(build_engine(&lonely, None).is_err());

        assert!(handle_race(&setup(1), None, 2.0, None, 1.0).is_err());
    }

    #[test]
    fn live_race_streams_snapshots_and_the_result() {
        let (tx, rx) = flume::unbounded();
        let result = handle_race(&setup(8), None, 0.1, Some(&tx), 1_000.0).unwrap();
        drop(tx);

        let messages: Vec<RaceMessage> = rx.try_iter().collect();
        assert!(messages.iter().all(|m| m.session_id() == result.session_id));
        assert!(messages
            .iter()
            .any(|m| matches!(m, RaceMessage::Tick(_))));
        assert!(matches!(messages.last(), Some(RaceMessage::Finished(_))));

        let events = messages
            .iter()
            .filter(|m| matches!(m, RaceMessage::Event { .. }))
            .count();
        assert_eq!(events, result.events.len());
    }

    #[test]
    fn live_race_survives_a_vanished_receiver() {
        let (tx, rx) = flume::unbounded();
        drop(rx);
        assert!(handle_race(&setup(2), None, 0.1, Some(&tx), 1_000.0).is_ok());
    }
}
