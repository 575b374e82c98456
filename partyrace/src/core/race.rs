use crate::core::catchup::Standings;
use crate::core::config::{RaceConfig, DEFAULT_LOSER_RANK, MAX_PLAYERS, MIN_PLAYERS};
use crate::core::errors::{ConfigurationError, SetupValidationError};
use crate::core::events::EventScheduler;
use crate::core::racer::Racer;
use crate::core::spacing::{PushOvertakeSpacing, SpacingController};
use crate::interfaces::presentation::{EventNotice, RaceSnapshot, RacerSnapshot, StatusFlags};
use crate::post::race_result::{RaceResult, RankingEntry, Winner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RaceStatus {
    Setup,
    Countdown,
    Running,
    Finished,
}

/// Rule that picks the "winners" (usually the ones buying coffee) from the final ranking.
///
/// `Single` counts from the back of the field, i.e. rank 1 is last place. `Multi` counts from the
/// front, i.e. rank 1 is the race winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinSelection {
    Single { rank: u32 },
    Multi { ranks: Vec<u32> },
}

impl Default for WinSelection {
    fn default() -> Self {
        WinSelection::Single {
            rank: DEFAULT_LOSER_RANK,
        }
    }
}

impl WinSelection {
    pub fn validate(&self) -> Result<(), SetupValidationError> {
        match self {
            WinSelection::Single { rank } if *rank == 0 => Err(SetupValidationError::NoWinSelection),
            WinSelection::Multi { ranks } if ranks.is_empty() => {
                Err(SetupValidationError::NoWinSelection)
            }
            _ => Ok(()),
        }
    }
}

/// State of one race, from registration to the final ranking.
///
/// * `id` - Session identity, changes on every reset
/// * `entrants` - Registered display names in entry order
/// * `racers` - Created from `entrants` when the setup is completed
/// * `started_at` - (ms) Host clock value passed to `start_race`
/// * `last_tick` - (ms) Host clock value of the last tick
#[derive(Debug, Clone)]
pub struct RaceSession {
    pub id: u64,
    pub entrants: Vec<String>,
    pub racers: Vec<Racer>,
    pub started_at: Option<f64>,
    pub last_tick: Option<f64>,
    pub running: bool,
    pub win_selection: WinSelection,
}

impl RaceSession {
    fn new(id: u64) -> RaceSession {
        RaceSession {
            id,
            entrants: Vec::new(),
            racers: Vec::new(),
            started_at: None,
            last_tick: None,
            running: false,
            win_selection: WinSelection::default(),
        }
    }
}

/// Output of a single tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: RaceSnapshot,
    pub events: Vec<EventNotice>,
    pub result: Option<RaceResult>,
}

/// Drives a race through `Setup -> Countdown -> Running -> Finished`.
///
/// The engine owns all racers and its random number generator. Time is passed in from outside
/// as a millisecond clock; everything inside runs on the race-relative clock derived from it, so
/// status effects and events expire or fire only inside `tick`.
pub struct RaceEngine {
    config: RaceConfig,
    status: RaceStatus,
    session: RaceSession,
    scheduler: EventScheduler,
    spacing: Box<dyn SpacingController + Send>,
    rng: StdRng,
    elapsed_ms: f64,
    fired_events: Vec<EventNotice>,
    result: Option<RaceResult>,
}

impl RaceEngine {
    pub fn new(config: RaceConfig) -> RaceEngine {
        RaceEngine::with_rng(config, StdRng::from_entropy())
    }

    /// Creates an engine whose races are fully reproducible for a given seed.
    pub fn with_seed(config: RaceConfig, seed: u64) -> RaceEngine {
        RaceEngine::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: RaceConfig, rng: StdRng) -> RaceEngine {
        RaceEngine {
            spacing: Box::new(PushOvertakeSpacing::new(config.overlap)),
            scheduler: EventScheduler::default(),
            config,
            status: RaceStatus::Setup,
            session: RaceSession::new(1),
            rng,
            elapsed_ms: 0.0,
            fired_events: Vec::new(),
            result: None,
        }
    }

    /// Replaces the spacing strategy. It keeps being used for every race of this engine and
    /// follows later duration changes through `SpacingController::configure`.
    pub fn with_spacing(mut self, mut spacing: Box<dyn SpacingController + Send>) -> RaceEngine {
        spacing.configure(self.config.overlap);
        self.spacing = spacing;
        self
    }

    // ---------------------------------------------------------------------------------------------
    // SETUP ---------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Registers an entrant and returns its racer id.
    pub fn register_entrant(&mut self, display_name: &str) -> Result<u32, SetupValidationError> {
        self.require_status(RaceStatus::Setup, "register an entrant")?;

        let name = display_name.trim();
        if name.is_empty() {
            return Err(SetupValidationError::EmptyName);
        }
        if self.session.entrants.len() >= MAX_PLAYERS {
            return Err(SetupValidationError::TooManyEntrants { max: MAX_PLAYERS });
        }

        self.session.entrants.push(name.to_owned());
        Ok(self.session.entrants.len() as u32 - 1)
    }

    /// Switches to the configuration of a duration bucket. An unknown duration falls back to the
    /// default bucket and hands back the warning.
    pub fn choose_duration(
        &mut self,
        secs: u32,
    ) -> Result<Option<ConfigurationError>, SetupValidationError> {
        self.require_status(RaceStatus::Setup, "choose the duration")?;

        let (config, warning) = RaceConfig::for_duration_secs(secs);
        self.spacing.configure(config.overlap);
        self.config = config;
        Ok(warning)
    }

    pub fn choose_win_selection(
        &mut self,
        selection: WinSelection,
    ) -> Result<(), SetupValidationError> {
        self.require_status(RaceStatus::Setup, "choose the win selection")?;
        selection.validate()?;
        self.session.win_selection = selection;
        Ok(())
    }

    /// Validates the setup and creates the racers. Moves the race into the countdown.
    pub fn complete_setup(&mut self) -> Result<(), SetupValidationError> {
        self.require_status(RaceStatus::Setup, "complete the setup")?;

        if self.session.entrants.len() < MIN_PLAYERS {
            return Err(SetupValidationError::InsufficientEntrants {
                got: self.session.entrants.len(),
                min: MIN_PLAYERS,
            });
        }
        self.session.win_selection.validate()?;

        let config = &self.config;
        let rng = &mut self.rng;
        self.session.racers = self
            .session
            .entrants
            .iter()
            .enumerate()
            .map(|(id, name)| Racer::new(id as u32, name, config, &mut *rng))
            .collect();

        self.status = RaceStatus::Countdown;
        info!(
            "Setup of session {} complete: {} entrants, {:.0}s race",
            self.session.id,
            self.session.racers.len(),
            self.config.duration_ms / 1000.0
        );
        Ok(())
    }

    /// Starts the race once the countdown is over. `now` is the host clock in ms.
    pub fn start_race(&mut self, now: f64) -> Result<(), SetupValidationError> {
        self.require_status(RaceStatus::Countdown, "start the race")?;

        self.session.started_at = Some(now);
        self.session.last_tick = Some(now);
        self.session.running = true;
        self.scheduler.arm(&self.config.event_times_ms);
        self.spacing.reset();
        self.elapsed_ms = 0.0;
        self.fired_events.clear();
        self.result = None;
        self.status = RaceStatus::Running;

        info!("Race of session {} started", self.session.id);
        Ok(())
    }

    fn require_status(
        &self,
        expected: RaceStatus,
        action: &'static str,
    ) -> Result<(), SetupValidationError> {
        if self.status != expected {
            return Err(SetupValidationError::InvalidTransition {
                action,
                state: self.status,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// tick advances the race to host time `now` (ms). Returns None if the race is not running.
    ///
    /// Order within a tick: expire status effects, fire due events, advance all racers on a
    /// ranking taken before anyone moved, resolve spacing (skipped if a progress-reassigning
    /// event fired), build the snapshot, check for the end of the race.
    pub fn tick(&mut self, now: f64) -> Option<TickReport> {
        if self.status != RaceStatus::Running || !self.session.running {
            return None;
        }
        let started_at = self.session.started_at?;

        // the host clock must not run backwards
        let elapsed = (now - started_at).max(self.elapsed_ms);
        let delta = elapsed - self.elapsed_ms;
        self.elapsed_ms = elapsed;
        self.session.last_tick = Some(now);

        for racer in self.session.racers.iter_mut() {
            racer.refresh_status(elapsed);
        }

        let events = self.scheduler.fire_due(
            elapsed,
            &mut self.session.racers,
            &self.config,
            &mut self.rng,
        );

        let standings = Standings::of(&self.session.racers);
        for racer in self.session.racers.iter_mut() {
            if racer.advance(delta, &standings, elapsed, &self.config, &mut self.rng) {
                debug!(
                    "{} crossed the finish line after {:.0}ms",
                    racer.display_name, elapsed
                );
            }
        }

        self.resolve_spacing(&events, elapsed);

        let snapshot = self.snapshot();
        self.fired_events.extend(events.iter().cloned());

        let all_finished = self.session.racers.iter().all(|r| r.is_finished());
        let result = if elapsed >= self.config.duration_ms || all_finished {
            Some(self.finish_race(elapsed))
        } else {
            None
        };

        Some(TickReport {
            snapshot,
            events,
            result,
        })
    }

    /// Events that reassign progress already placed every racer, the spacing pass sits out the
    /// tick they fired in.
    fn resolve_spacing(&mut self, events: &[EventNotice], now: f64) {
        if events.iter().any(|e| e.kind.bypasses_spacing()) {
            debug!("spacing skipped at {:.0}ms", now);
            return;
        }
        self.spacing.resolve(&mut self.session.racers, now);
    }

    fn finish_race(&mut self, now: f64) -> RaceResult {
        for racer in self.session.racers.iter_mut() {
            if !racer.is_finished() {
                racer.force_finish(now + (1.0 - racer.progress()) * 1000.0);
            }
        }

        let racers = &self.session.racers;
        let ranking = final_ranking_order(racers);

        let full_ranking: Vec<RankingEntry> = ranking
            .iter()
            .enumerate()
            .map(|(pos, &idx)| RankingEntry {
                place: pos + 1,
                racer_id: racers[idx].id,
                display_name: racers[idx].display_name.to_owned(),
                finished: racers[idx].progress() >= 1.0,
                progress: racers[idx].progress(),
                finish_time_ms: racers[idx].finish_time(),
            })
            .collect();

        let selection = &self.session.win_selection;
        let winners: Vec<Winner> = select_winners(ranking.len(), selection)
            .into_iter()
            .map(|pos| Winner {
                racer_id: full_ranking[pos].racer_id,
                display_name: full_ranking[pos].display_name.to_owned(),
                place: pos + 1,
                rank_label: rank_label(selection, pos, ranking.len()),
            })
            .collect();

        let result = RaceResult {
            session_id: self.session.id,
            duration_ms: self.config.duration_ms,
            elapsed_ms: now,
            win_selection: selection.to_owned(),
            winners,
            full_ranking,
            events: self.fired_events.to_owned(),
        };

        self.session.running = false;
        self.status = RaceStatus::Finished;
        self.result = Some(result.clone());

        let names: Vec<&str> = result.winners.iter().map(|w| w.display_name.as_str()).collect();
        info!(
            "Race of session {} finished after {:.0}ms, picked: {}",
            self.session.id,
            now,
            names.join(", ")
        );

        result
    }

    // ---------------------------------------------------------------------------------------------
    // SESSION CONTROL -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Stops ticking. The race keeps its current state.
    pub fn stop(&mut self) {
        if self.session.running {
            info!("Race of session {} stopped", self.session.id);
        }
        self.session.running = false;
    }

    /// Drops the current session and returns to the setup with a fresh session id.
    pub fn reset(&mut self) {
        self.session = RaceSession::new(self.session.id + 1);
        self.status = RaceStatus::Setup;
        self.scheduler.reset();
        self.spacing.reset();
        self.elapsed_ms = 0.0;
        self.fired_events.clear();
        self.result = None;
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Current view of the race, ordered like the leaderboard.
    pub fn snapshot(&self) -> RaceSnapshot {
        let now = self.elapsed_ms;
        let racers = &self.session.racers;

        let entries = final_ranking_order(racers)
            .into_iter()
            .enumerate()
            .map(|(pos, idx)| {
                let racer = &racers[idx];
                RacerSnapshot {
                    id: racer.id,
                    display_name: racer.display_name.to_owned(),
                    position: pos + 1,
                    progress: racer.progress(),
                    status: StatusFlags {
                        stunned: racer.status().is_stunned(now),
                        boosted: racer.status().is_boosted(now),
                        reversed: racer.status().is_reversed(now),
                    },
                    finished: racer.is_finished(),
                }
            })
            .collect();

        RaceSnapshot {
            session_id: self.session.id,
            elapsed_ms: now,
            time_left_ms: (self.config.duration_ms - now).max(0.0),
            racers: entries,
        }
    }

    pub fn result(&self) -> Option<&RaceResult> {
        self.result.as_ref()
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn racers(&self) -> &[Racer] {
        &self.session.racers
    }

    pub fn session(&self) -> &RaceSession {
        &self.session
    }

    pub fn session_id(&self) -> u64 {
        self.session.id
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn is_running(&self) -> bool {
        self.status == RaceStatus::Running && self.session.running
    }
}

/// final_ranking_order returns racer indices in leaderboard order: finished racers by finish time,
/// then active racers by progress. Ties keep the entry order.
pub fn final_ranking_order(racers: &[Racer]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..racers.len()).collect();

    // sort_by is stable
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&racers[a], &racers[b]);
        match (ra.finish_time(), rb.finish_time()) {
            (Some(ta), Some(tb)) => ta.partial_cmp(&tb).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => rb
                .progress()
                .partial_cmp(&ra.progress())
                .unwrap_or(Ordering::Equal),
        }
    });

    order
}

/// select_winners returns the 0-based positions in the final ranking picked by `selection`.
///
/// * `field_size` - Number of racers in the final ranking
///
/// A single rank beyond the field size selects the race winner. Multi ranks outside the field are
/// skipped, duplicates are picked once.
pub fn select_winners(field_size: usize, selection: &WinSelection) -> Vec<usize> {
    if field_size == 0 {
        return Vec::new();
    }

    match selection {
        WinSelection::Single { rank } => {
            vec![field_size.saturating_sub((*rank).max(1) as usize)]
        }
        WinSelection::Multi { ranks } => {
            let mut picked: Vec<usize> = Vec::with_capacity(ranks.len());
            for &rank in ranks.iter() {
                let rank = rank as usize;
                if rank >= 1 && rank <= field_size && !picked.contains(&(rank - 1)) {
                    picked.push(rank - 1);
                }
            }
            picked
        }
    }
}

/// Label shown next to a picked racer, e.g. "last place" or "3rd".
pub fn rank_label(selection: &WinSelection, pos: usize, field_size: usize) -> String {
    let place = pos + 1;

    match selection {
        WinSelection::Single { .. } => {
            let from_last = field_size - pos;
            if from_last <= 1 {
                "last place".to_owned()
            } else {
                format!("{} from last", ordinal(from_last))
            }
        }
        WinSelection::Multi { .. } => {
            if place == field_size && place > 1 {
                "last place".to_owned()
            } else {
                ordinal(place)
            }
        }
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DurationBucket, OverlapPars};
    use crate::core::events::EventKind;
    use crate::core::racer::tests::{racer_at, with_base_speed};
    use approx::assert_relative_eq;
    use std::sync::atomic::{self, AtomicUsize};
    use std::sync::Arc;

    const TICK_MS: f64 = 16.0;

    fn engine_with(names: &[&str], seed: u64) -> RaceEngine {
        let mut engine = RaceEngine::with_seed(RaceConfig::default(), seed);
        for name in names {
            engine.register_entrant(name).unwrap();
        }
        engine
    }

    /// Spacing that only counts how often the engine calls it.
    #[derive(Default)]
    struct CountingSpacing {
        resolves: Arc<AtomicUsize>,
        configures: Arc<AtomicUsize>,
    }

    impl SpacingController for CountingSpacing {
        fn resolve(&mut self, _racers: &mut [Racer], _now: f64) {
            self.resolves.fetch_add(1, atomic::Ordering::SeqCst);
        }

        fn configure(&mut self, _pars: OverlapPars) {
            self.configures.fetch_add(1, atomic::Ordering::SeqCst);
        }

        fn reset(&mut self) {}
    }

    fn notice(kind: EventKind, at_ms: f64) -> EventNotice {
        EventNotice {
            kind,
            name: kind.name().to_owned(),
            description: kind.description().to_owned(),
            affected_racer_ids: vec![0, 1],
            at_ms,
        }
    }

    fn run_to_end(engine: &mut RaceEngine, start: f64) -> RaceResult {
        engine.start_race(start).unwrap();
        let mut now = start;
        loop {
            now += TICK_MS;
            let report = engine.tick(now).expect("race stopped unexpectedly");
            if let Some(result) = report.result {
                return result;
            }
            assert!(now - start < 200_000.0, "race never ended");
        }
    }

    /// Racers A, B, C, D finishing in this order.
    fn finished_field() -> Vec<Racer> {
        let config = RaceConfig::default();
        let mut racers: Vec<Racer> = ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut racer = racer_at(i as u32, 0.5, &config);
                racer.display_name = name.to_string();
                racer
            })
            .collect();
        // finish times given out of entry order on purpose
        racers[2].force_finish(3_000.0);
        racers[0].force_finish(1_000.0);
        racers[3].force_finish(4_000.0);
        racers[1].force_finish(2_000.0);
        racers
    }

    fn picked_names(racers: &[Racer], selection: &WinSelection) -> Vec<String> {
        let ranking = final_ranking_order(racers);
        select_winners(ranking.len(), selection)
            .into_iter()
            .map(|pos| racers[ranking[pos]].display_name.to_owned())
            .collect()
    }

    #[test]
    fn single_rank_one_picks_last_place() {
        let racers = finished_field();
        assert_eq!(
            picked_names(&racers, &WinSelection::Single { rank: 1 }),
            vec!["D"]
        );
        assert_eq!(
            picked_names(&racers, &WinSelection::Single { rank: 2 }),
            vec!["C"]
        );
        // beyond the field: clamped to the winner
        assert_eq!(
            picked_names(&racers, &WinSelection::Single { rank: 9 }),
            vec!["A"]
        );
    }

    #[test]
    fn multi_ranks_count_from_the_front() {
        let racers = finished_field();
        assert_eq!(
            picked_names(&racers, &WinSelection::Multi { ranks: vec![1, 4] }),
            vec!["A", "D"]
        );
        assert_eq!(
            picked_names(&racers, &WinSelection::Multi { ranks: vec![0, 2, 2, 7] }),
            vec!["B"]
        );
    }

    #[test]
    fn final_ranking_puts_finishers_first_then_progress() {
        let config = RaceConfig::default();
        let mut racers = vec![
            racer_at(0, 0.4, &config),
            racer_at(1, 0.7, &config),
            racer_at(2, 0.4, &config),
            racer_at(3, 0.2, &config),
        ];
        racers[3].force_finish(500.0);

        assert_eq!(final_ranking_order(&racers), vec![3, 1, 0, 2]);
    }

    #[test]
    fn rank_labels() {
        let single = WinSelection::Single { rank: 1 };
        let multi = WinSelection::Multi { ranks: vec![1] };

        assert_eq!(rank_label(&single, 3, 4), "last place");
        assert_eq!(rank_label(&single, 2, 4), "2nd from last");
        assert_eq!(rank_label(&single, 0, 4), "4th from last");
        assert_eq!(rank_label(&multi, 0, 4), "1st");
        assert_eq!(rank_label(&multi, 2, 4), "3rd");
        assert_eq!(rank_label(&multi, 3, 4), "last place");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn setup_needs_at_least_two_entrants() {
        let mut engine = engine_with(&["Alice"], 1);
        assert_eq!(
            engine.complete_setup(),
            Err(SetupValidationError::InsufficientEntrants { got: 1, min: 2 })
        );
        assert_eq!(engine.status(), RaceStatus::Setup);

        engine.register_entrant("Bob").unwrap();
        assert_eq!(engine.complete_setup(), Ok(()));
        assert_eq!(engine.status(), RaceStatus::Countdown);
        assert_eq!(engine.racers().len(), 2);
    }

    #[test]
    fn registration_rejects_blank_names_and_overfull_fields() {
        let mut engine = RaceEngine::with_seed(RaceConfig::default(), 1);
        assert_eq!(
            engine.register_entrant("   "),
            Err(SetupValidationError::EmptyName)
        );
        for i in 0..MAX_PLAYERS {
            assert_eq!(engine.register_entrant(&format!("P{}", i)), Ok(i as u32));
        }
        assert_eq!(
            engine.register_entrant("one too many"),
            Err(SetupValidationError::TooManyEntrants { max: MAX_PLAYERS })
        );
    }

    #[test]
    fn empty_multi_selection_is_rejected() {
        let mut engine = engine_with(&["A", "B", "C"], 1);
        assert_eq!(
            engine.choose_win_selection(WinSelection::Multi { ranks: vec![] }),
            Err(SetupValidationError::NoWinSelection)
        );
        engine.session.win_selection = WinSelection::Multi { ranks: vec![] };
        assert_eq!(
            engine.complete_setup(),
            Err(SetupValidationError::NoWinSelection)
        );
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let mut engine = engine_with(&["A", "B"], 1);
        assert!(matches!(
            engine.start_race(0.0),
            Err(SetupValidationError::InvalidTransition {
                state: RaceStatus::Setup,
                ..
            })
        ));
        assert!(engine.tick(100.0).is_none());

        engine.complete_setup().unwrap();
        assert!(engine.register_entrant("C").is_err());
        assert!(engine.choose_duration(20).is_err());
    }

    #[test]
    fn unknown_duration_falls_back_without_failing_the_setup() {
        let mut engine = engine_with(&["A", "B"], 1);
        let warning = engine.choose_duration(45).unwrap();
        assert!(matches!(
            warning,
            Some(ConfigurationError::UnknownDuration { requested_secs: 45, .. })
        ));
        assert_eq!(engine.config(), &RaceConfig::default());

        assert_eq!(engine.choose_duration(20), Ok(None));
        assert_eq!(
            engine.config(),
            &RaceConfig::for_bucket(DurationBucket::Short)
        );
    }

    #[test]
    fn a_full_race_ends_with_a_complete_ranking() {
        let mut engine = engine_with(&["A", "B", "C", "D", "E"], 7);
        engine.choose_duration(20).unwrap();
        engine
            .choose_win_selection(WinSelection::Multi { ranks: vec![1, 5] })
            .unwrap();
        engine.complete_setup().unwrap();
        let result = run_to_end(&mut engine, 5_000.0);

        assert_eq!(engine.status(), RaceStatus::Finished);
        assert!(!engine.is_running());
        assert!(result.elapsed_ms <= engine.config().duration_ms + TICK_MS);
        assert_eq!(result.full_ranking.len(), 5);
        assert_eq!(result.winners.len(), 2);
        assert_eq!(result.winners[0].rank_label, "1st");
        assert_eq!(result.winners[1].rank_label, "last place");
        assert!(engine.racers().iter().all(|r| r.is_finished()));
        assert!(result
            .full_ranking
            .windows(2)
            .all(|w| w[0].finish_time_ms <= w[1].finish_time_ms));
        assert!(!result.events.is_empty());
        assert!(result.events.len() <= engine.config().event_times_ms.len());
        assert!(engine.tick(1_000_000.0).is_none());
    }

    #[test]
    fn seeded_races_are_reproducible() {
        let run = |seed| {
            let mut engine = engine_with(&["A", "B", "C"], seed);
            engine.complete_setup().unwrap();
            run_to_end(&mut engine, 0.0)
                .full_ranking
                .iter()
                .map(|e| (e.racer_id, e.progress))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn snapshots_follow_the_leaderboard() {
        let mut engine = engine_with(&["A", "B", "C"], 5);
        engine.complete_setup().unwrap();
        engine.start_race(0.0).unwrap();

        let mut now = 0.0;
        for _ in 0..200 {
            now += TICK_MS;
            let report = engine.tick(now).unwrap();
            let snapshot = report.snapshot;

            assert_eq!(snapshot.session_id, engine.session_id());
            assert!(snapshot.time_left_ms <= engine.config().duration_ms);
            for (i, entry) in snapshot.racers.iter().enumerate() {
                assert_eq!(entry.position, i + 1);
                assert!(entry.progress >= 0.0);
            }
            for w in snapshot.racers.windows(2) {
                if !w[0].finished && !w[1].finished {
                    assert!(w[0].progress >= w[1].progress);
                }
            }
        }
    }

    #[test]
    fn stop_halts_ticking_and_reset_starts_a_new_session() {
        let mut engine = engine_with(&["A", "B"], 2);
        engine.complete_setup().unwrap();
        engine.start_race(0.0).unwrap();
        assert!(engine.tick(100.0).is_some());

        engine.stop();
        assert!(engine.tick(200.0).is_none());
        assert!(!engine.is_running());

        let old_id = engine.session_id();
        engine.reset();
        assert_ne!(engine.session_id(), old_id);
        assert_eq!(engine.status(), RaceStatus::Setup);
        assert!(engine.racers().is_empty());
        assert!(engine.session().entrants.is_empty());
        assert!(engine.result().is_none());
    }

    #[test]
    fn custom_spacing_survives_choosing_the_duration() {
        let spacing = CountingSpacing::default();
        let resolves = spacing.resolves.clone();
        let configures = spacing.configures.clone();

        let mut engine =
            RaceEngine::with_seed(RaceConfig::default(), 4).with_spacing(Box::new(spacing));
        for name in ["A", "B", "C"] {
            engine.register_entrant(name).unwrap();
        }
        engine.choose_duration(20).unwrap();
        engine.complete_setup().unwrap();
        engine.start_race(0.0).unwrap();
        for k in 1..=9 {
            engine.tick(k as f64 * TICK_MS).unwrap();
        }

        assert_eq!(resolves.load(atomic::Ordering::SeqCst), 9);
        assert_eq!(configures.load(atomic::Ordering::SeqCst), 2);
        assert_eq!(engine.config().duration_ms, 20_000.0);
    }

    #[test]
    fn progress_reassigning_events_skip_spacing_for_their_tick() {
        let mut config = RaceConfig::default();
        config.event_times_ms = (1..=6).map(|k| k as f64 * TICK_MS).collect();
        let spacing = CountingSpacing::default();
        let resolves = spacing.resolves.clone();

        let mut engine = RaceEngine::with_seed(config, 21).with_spacing(Box::new(spacing));
        for name in ["A", "B", "C"] {
            engine.register_entrant(name).unwrap();
        }
        engine.complete_setup().unwrap();
        engine.start_race(0.0).unwrap();

        // six slots drain the whole catalogue, so shuffle and swap fire exactly once each
        let mut skipped_ticks = 0;
        for k in 1..=6 {
            let before = resolves.load(atomic::Ordering::SeqCst);
            let report = engine.tick(k as f64 * TICK_MS).unwrap();
            assert_eq!(report.events.len(), 1);

            let calls = resolves.load(atomic::Ordering::SeqCst) - before;
            if report.events[0].kind.bypasses_spacing() {
                assert_eq!(calls, 0, "{:?} tick ran spacing", report.events[0].kind);
                skipped_ticks += 1;
            } else {
                assert_eq!(calls, 1);
            }
        }
        assert_eq!(skipped_ticks, 2);
    }

    #[test]
    fn close_racers_are_left_in_place_after_shuffle_or_swap() {
        let config = RaceConfig::default();
        let mut engine = engine_with(&["A", "B"], 3);
        engine.complete_setup().unwrap();
        engine.session.racers = vec![
            with_base_speed(racer_at(0, 0.500, &config), 0.02),
            with_base_speed(racer_at(1, 0.505, &config), 0.02),
        ];

        for kind in [EventKind::Shuffle, EventKind::SwapExtremes] {
            engine.resolve_spacing(&[notice(kind, 100.0)], 100.0);
            assert_relative_eq!(engine.racers()[0].progress(), 0.500);
            assert_relative_eq!(engine.racers()[1].progress(), 0.505);
        }

        engine.resolve_spacing(&[notice(EventKind::BackBoost, 100.0)], 100.0);
        assert!(engine.racers()[0].progress() < 0.500);
        assert!(engine.racers()[1].progress() > 0.505);
    }
}
