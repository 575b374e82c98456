use crate::core::catchup::{catchup_multiplier, Standings};
use crate::core::config::{RaceConfig, SkillDurations, SpeedPars};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

const BOOST_MULTIPLIER: f64 = 2.8;
const REVERSE_MULTIPLIER: f64 = -1.2;
const OVERTAKE_MULTIPLIER: f64 = 2.0;

/// Timed status effects. Each entry holds the race time (ms) until which the effect is active.
/// Applying an effect again overwrites the timestamp, effects never stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusEffects {
    pub stunned_until: Option<f64>,
    pub boosted_until: Option<f64>,
    pub reversed_until: Option<f64>,
}

impl StatusEffects {
    pub fn is_stunned(&self, now: f64) -> bool {
        active_at(self.stunned_until, now)
    }

    pub fn is_boosted(&self, now: f64) -> bool {
        active_at(self.boosted_until, now)
    }

    pub fn is_reversed(&self, now: f64) -> bool {
        active_at(self.reversed_until, now)
    }

    pub fn any_active(&self, now: f64) -> bool {
        self.is_stunned(now) || self.is_boosted(now) || self.is_reversed(now)
    }

    fn expire(&mut self, now: f64) {
        for until in [
            &mut self.stunned_until,
            &mut self.boosted_until,
            &mut self.reversed_until,
        ] {
            if !active_at(*until, now) {
                *until = None;
            }
        }
    }
}

fn active_at(until: Option<f64>, now: f64) -> bool {
    until.map_or(false, |t| now < t)
}

/// State of an overtaking maneuver. While active the racer runs at double speed until its
/// progress passes `target_progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Overtake {
    pub active: bool,
    pub started_at: f64,
    pub target_progress: f64,
}

/// A single entrant of the race.
///
/// Progress is the cumulative fraction of the lap (1.0 = finished). It never drops below zero and
/// is frozen once the racer finished; all writes go through `set_progress`.
#[derive(Debug, Clone)]
pub struct Racer {
    pub id: u32,
    pub display_name: String,
    progress: f64,
    base_speed: f64,
    personal_multiplier: f64,
    consistency_factor: f64,
    random_speed_multiplier: f64,
    last_resample: Option<f64>,
    status: StatusEffects,
    overlap_exempt: bool,
    overtake: Overtake,
    finish_time: Option<f64>,
    skills: SkillDurations,
}

impl Racer {
    pub fn new<R: Rng + ?Sized>(
        id: u32,
        display_name: &str,
        config: &RaceConfig,
        rng: &mut R,
    ) -> Racer {
        Racer {
            id,
            display_name: display_name.to_owned(),
            progress: 0.0,
            base_speed: sample_base_speed(&config.speed, rng),
            personal_multiplier: Uniform::new_inclusive(0.8, 1.2).sample(rng),
            consistency_factor: rng.gen::<f64>(),
            random_speed_multiplier: 1.0,
            last_resample: None,
            status: StatusEffects::default(),
            overlap_exempt: false,
            overtake: Overtake::default(),
            finish_time: None,
            skills: config.skills,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // SIMULATION STEP -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// advance integrates the racer over one tick. Returns true if the racer crossed the finish
    /// line during this call.
    ///
    /// * `delta_ms` - (ms) Tick length
    /// * `standings` - Ranking snapshot taken at the beginning of the tick
    /// * `now` - (ms) Current race time
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        delta_ms: f64,
        standings: &Standings,
        now: f64,
        config: &RaceConfig,
        rng: &mut R,
    ) -> bool {
        self.refresh_status(now);

        if self.is_finished() || self.status.is_stunned(now) {
            return false;
        }

        let resample_due = self
            .last_resample
            .map_or(true, |t| now - t >= config.speed.random_interval_ms);
        if resample_due {
            self.resample_speed(standings, &config.speed, rng);
            self.last_resample = Some(now);
        }

        let speed = self.effective_speed(standings, now, config);
        let crossed = self.set_progress(self.progress + speed * delta_ms / 1000.0, now);

        if self.overtake.active && self.progress > self.overtake.target_progress {
            self.overtake = Overtake::default();
        }

        crossed
    }

    /// effective_speed returns the current speed in progress per second, combining base speed,
    /// catch-up, status effects, the random variance layer and an active overtake.
    pub fn effective_speed(&self, standings: &Standings, now: f64, config: &RaceConfig) -> f64 {
        if self.is_finished() || self.status.is_stunned(now) {
            return 0.0;
        }

        let catchup = match standings.rank_of(self.id) {
            Some(rank) => {
                let leader = standings.leader_progress().unwrap_or(self.progress);
                catchup_multiplier(
                    &config.catchup,
                    rank,
                    standings.total_active(),
                    leader - self.progress,
                    standings.spread(),
                )
            }
            None => 1.0,
        };

        let mut status = 1.0;
        if self.status.is_boosted(now) {
            status *= BOOST_MULTIPLIER;
        }
        if self.status.is_reversed(now) {
            status *= REVERSE_MULTIPLIER;
        }

        let overtake = if self.overtake.active {
            OVERTAKE_MULTIPLIER
        } else {
            1.0
        };

        self.base_speed * catchup * status * self.random_speed_multiplier * overtake
    }

    /// Draws a new base speed and the cosmetic variance multiplier. The variance layer favours the
    /// back of the field slightly and is independent of the catch-up model.
    fn resample_speed<R: Rng + ?Sized>(
        &mut self,
        standings: &Standings,
        speed_pars: &SpeedPars,
        rng: &mut R,
    ) {
        self.base_speed = sample_base_speed(speed_pars, rng);

        let stability = if self.consistency_factor > 0.7 { 1.2 } else { 0.8 };
        let mut multiplier =
            Uniform::new_inclusive(0.8, 1.2).sample(rng) * self.personal_multiplier * stability;

        if let Some(rank) = standings.rank_of(self.id) {
            let total = standings.total_active();
            multiplier *= if rank == total {
                1.2
            } else if rank == 1 {
                0.9
            } else if rank + 1 == total {
                1.1
            } else if rank == 2 {
                0.95
            } else {
                1.0
            };
        }

        self.random_speed_multiplier = multiplier;
    }

    // ---------------------------------------------------------------------------------------------
    // STATUS EFFECTS ------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn apply_stun(&mut self, now: f64, duration_ms: Option<f64>) {
        let until = now + duration_ms.unwrap_or(self.skills.stun_ms);
        self.apply_effect(now, |s| s.stunned_until = Some(until));
    }

    pub fn apply_boost(&mut self, now: f64, duration_ms: Option<f64>) {
        let until = now + duration_ms.unwrap_or(self.skills.boost_ms);
        self.apply_effect(now, |s| s.boosted_until = Some(until));
    }

    pub fn apply_reverse(&mut self, now: f64, duration_ms: Option<f64>) {
        let until = now + duration_ms.unwrap_or(self.skills.reverse_ms);
        self.apply_effect(now, |s| s.reversed_until = Some(until));
    }

    fn apply_effect<F: FnOnce(&mut StatusEffects)>(&mut self, now: f64, set: F) {
        if self.is_finished() {
            return;
        }
        set(&mut self.status);
        self.refresh_status(now);
    }

    /// Drops expired effects and recomputes the spacing exemption.
    pub fn refresh_status(&mut self, now: f64) {
        self.status.expire(now);
        self.overlap_exempt = self.status.any_active(now);
    }

    // ---------------------------------------------------------------------------------------------
    // STATE CHANGES USED BY OTHER COMPONENTS ------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Writes progress, clamped at zero. Reaching the line finishes the racer at `now`, so an
    /// active racer never sits at or beyond 1.0. Ignored once the racer finished.
    ///
    /// Returns true if this write crossed the finish line.
    pub(crate) fn set_progress(&mut self, progress: f64, now: f64) -> bool {
        if self.is_finished() {
            return false;
        }
        self.progress = progress.max(0.0);
        if self.progress >= 1.0 {
            self.mark_finished(now);
            return true;
        }
        false
    }

    pub(crate) fn begin_overtake(&mut self, now: f64, target_progress: f64) {
        self.overtake = Overtake {
            active: true,
            started_at: now,
            target_progress,
        };
    }

    pub(crate) fn cancel_overtake(&mut self) {
        self.overtake = Overtake::default();
    }

    /// Marks a racer that did not reach the line as finished with a synthetic finish time.
    pub(crate) fn force_finish(&mut self, finish_time: f64) {
        self.mark_finished(finish_time);
    }

    fn mark_finished(&mut self, finish_time: f64) {
        if self.finish_time.is_none() {
            self.finish_time = Some(finish_time);
            self.overtake = Overtake::default();
        }
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn base_speed(&self) -> f64 {
        self.base_speed
    }

    pub fn status(&self) -> &StatusEffects {
        &self.status
    }

    pub fn is_overlap_exempt(&self) -> bool {
        self.overlap_exempt
    }

    pub fn overtake(&self) -> &Overtake {
        &self.overtake
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }
}

/// Draws a base speed from a personal band covering 70-130 % of the speed range width, placed at
/// a random offset inside the range.
fn sample_base_speed<R: Rng + ?Sized>(pars: &SpeedPars, rng: &mut R) -> f64 {
    let range = pars.max - pars.min;
    let personal_range = (range * Uniform::new_inclusive(0.7, 1.3).sample(rng)).min(range);
    let personal_min = pars.min + rng.gen::<f64>() * (range - personal_range);

    personal_min + rng.gen::<f64>() * personal_range
}
