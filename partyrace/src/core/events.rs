use crate::core::catchup::Standings;
use crate::core::config::RaceConfig;
use crate::core::racer::Racer;
use crate::interfaces::presentation::EventNotice;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Catalogue of random race events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Stun the top two, optionally boost everybody else.
    FrontStun,
    /// Stun the front half, boost the rest.
    BroadStun,
    /// Boost the last two.
    BackBoost,
    /// Boost the bottom half.
    BackBoostWide,
    /// Randomly permute the progress values of all active racers.
    Shuffle,
    /// Exchange progress between first and last.
    SwapExtremes,
}

impl EventKind {
    pub const CATALOGUE: [EventKind; 6] = [
        EventKind::FrontStun,
        EventKind::BroadStun,
        EventKind::BackBoost,
        EventKind::BackBoostWide,
        EventKind::Shuffle,
        EventKind::SwapExtremes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::FrontStun => "Big Bang!",
            EventKind::BroadStun => "Lightning Strike!",
            EventKind::BackBoost => "Turbo Booster!",
            EventKind::BackBoostWide => "Awakening!",
            EventKind::Shuffle => "Total Chaos!",
            EventKind::SwapExtremes => "Snipe!",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EventKind::FrontStun => "The top two get stunned!",
            EventKind::BroadStun => "The front half is paralysed!",
            EventKind::BackBoost => "The back two speed up!",
            EventKind::BackBoostWide => "The bottom half wakes up!",
            EventKind::Shuffle => "Every position gets scrambled!",
            EventKind::SwapExtremes => "First and last trade places!",
        }
    }

    /// True for events that reassign progress directly. Spacing is skipped for the tick they
    /// fire in.
    pub fn bypasses_spacing(self) -> bool {
        matches!(self, EventKind::Shuffle | EventKind::SwapExtremes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventPhase {
    Pending,
    Fired,
    Consumed,
}

/// One slot of the race schedule. `kind` is filled in when the slot fires; it stays None if the
/// slot was skipped because fewer than two racers were still active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub at_ms: f64,
    pub phase: EventPhase,
    pub kind: Option<EventKind>,
}

/// Fires catalogue events at the scheduled race times.
///
/// Events are drawn without replacement: every catalogue entry is used once before any entry
/// repeats, then the cycle starts over.
#[derive(Debug, Clone, Default)]
pub struct EventScheduler {
    schedule: Vec<ScheduledEvent>,
    used: Vec<EventKind>,
}

impl EventScheduler {
    pub fn new(event_times_ms: &[f64]) -> EventScheduler {
        let mut scheduler = EventScheduler::default();
        scheduler.arm(event_times_ms);
        scheduler
    }

    /// Replaces the schedule and clears the used-set, e.g. at race start.
    pub fn arm(&mut self, event_times_ms: &[f64]) {
        self.schedule = event_times_ms
            .iter()
            .map(|&at_ms| ScheduledEvent {
                at_ms,
                phase: EventPhase::Pending,
                kind: None,
            })
            .collect();
        self.used.clear();
    }

    pub fn reset(&mut self) {
        self.schedule.clear();
        self.used.clear();
    }

    pub fn schedule(&self) -> &[ScheduledEvent] {
        &self.schedule
    }

    /// Draws the next event uniformly from the entries not used yet in the current cycle.
    pub fn draw_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EventKind {
        if self.used.len() >= EventKind::CATALOGUE.len() {
            self.used.clear();
        }

        let available: Vec<EventKind> = EventKind::CATALOGUE
            .iter()
            .copied()
            .filter(|kind| !self.used.contains(kind))
            .collect();

        // available is never empty after the reset above
        let kind = available
            .choose(rng)
            .copied()
            .unwrap_or(EventKind::CATALOGUE[0]);
        self.used.push(kind);
        kind
    }

    /// Fires every pending slot whose time has come. Returns the notices of the events that were
    /// actually applied.
    pub fn fire_due<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        racers: &mut [Racer],
        config: &RaceConfig,
        rng: &mut R,
    ) -> Vec<EventNotice> {
        let mut notices = Vec::new();

        for idx in 0..self.schedule.len() {
            if self.schedule[idx].phase != EventPhase::Pending || self.schedule[idx].at_ms > now {
                continue;
            }
            self.schedule[idx].phase = EventPhase::Fired;

            if let Some(notice) = self.trigger(now, racers, config, rng) {
                self.schedule[idx].kind = Some(notice.kind);
                notices.push(notice);
            } else {
                debug!(
                    "skipped event slot at {:.0}ms, fewer than two active racers",
                    self.schedule[idx].at_ms
                );
            }

            self.schedule[idx].phase = EventPhase::Consumed;
        }

        notices
    }

    /// Draws and applies the next event right away. Nothing happens (and nothing is drawn) if
    /// fewer than two racers are still active.
    pub fn trigger<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        racers: &mut [Racer],
        config: &RaceConfig,
        rng: &mut R,
    ) -> Option<EventNotice> {
        let standings = Standings::of(racers);
        if standings.total_active() < 2 {
            return None;
        }

        let kind = self.draw_next(rng);
        let affected = apply_event(kind, &standings, racers, now, config, rng);
        debug!("event {:?} at {:.0}ms affects {:?}", kind, now, affected);

        Some(EventNotice {
            kind,
            name: kind.name().to_owned(),
            description: kind.description().to_owned(),
            affected_racer_ids: affected,
            at_ms: now,
        })
    }
}

/// Applies an event to the active racers and returns the ids of the racers it affected.
///
/// Stun events list the stunned racers first, followed by the racers boosted in return.
pub fn apply_event<R: Rng + ?Sized>(
    kind: EventKind,
    standings: &Standings,
    racers: &mut [Racer],
    now: f64,
    config: &RaceConfig,
    rng: &mut R,
) -> Vec<u32> {
    let ranked: Vec<u32> = standings.ids().collect();
    let n = ranked.len();
    let skills = &config.skills;

    match kind {
        EventKind::FrontStun => {
            let (front, rest) = ranked.split_at(n.min(2));
            for_each_racer(racers, front, |r| r.apply_stun(now, Some(skills.stun_ms)));
            if !config.boost_rest_on_stun {
                return front.to_vec();
            }
            for_each_racer(racers, rest, |r| r.apply_boost(now, Some(skills.short_boost_ms)));
            ranked
        }
        EventKind::BroadStun => {
            let (front, rest) = ranked.split_at((n + 1) / 2);
            for_each_racer(racers, front, |r| r.apply_stun(now, Some(skills.stun_ms)));
            for_each_racer(racers, rest, |r| r.apply_boost(now, Some(skills.short_boost_ms)));
            ranked
        }
        EventKind::BackBoost => {
            let back = &ranked[n.saturating_sub(2)..];
            for_each_racer(racers, back, |r| r.apply_boost(now, Some(skills.boost_ms)));
            back.to_vec()
        }
        EventKind::BackBoostWide => {
            let back = &ranked[n - (n + 1) / 2..];
            for_each_racer(racers, back, |r| r.apply_boost(now, Some(skills.boost_ms)));
            back.to_vec()
        }
        EventKind::Shuffle => {
            let active: Vec<usize> = (0..racers.len())
                .filter(|&i| !racers[i].is_finished())
                .collect();
            let mut progresses: Vec<f64> = active.iter().map(|&i| racers[i].progress()).collect();
            progresses.shuffle(rng);

            for (&i, &progress) in active.iter().zip(progresses.iter()) {
                racers[i].set_progress(progress, now);
                racers[i].cancel_overtake();
            }
            active.iter().map(|&i| racers[i].id).collect()
        }
        EventKind::SwapExtremes => {
            let (first_id, last_id) = match (ranked.first(), ranked.last()) {
                (Some(&first), Some(&last)) if first != last => (first, last),
                _ => return Vec::new(),
            };
            let first_idx = racers.iter().position(|r| r.id == first_id);
            let last_idx = racers.iter().position(|r| r.id == last_id);

            if let (Some(first_idx), Some(last_idx)) = (first_idx, last_idx) {
                let first_progress = racers[first_idx].progress();
                let last_progress = racers[last_idx].progress();
                racers[first_idx].set_progress(last_progress, now);
                racers[last_idx].set_progress(first_progress, now);
                racers[first_idx].cancel_overtake();
                racers[last_idx].cancel_overtake();
            }
            vec![first_id, last_id]
        }
    }
}

fn for_each_racer<F: FnMut(&mut Racer)>(racers: &mut [Racer], ids: &[u32], mut f: F) {
    for racer in racers.iter_mut().filter(|r| ids.contains(&r.id)) {
        f(racer);
    }
}
