use crate::core::config::CatchupPars;
use crate::core::racer::Racer;
use helpers::general::{argsort, SortOrder};

/// Ranking snapshot of the active (non-finished) racers, taken once per tick.
///
/// Racers are sorted by progress in descending order. Equal progress keeps the entry order so the
/// ranking does not flicker between ticks.
#[derive(Debug, Clone, Default)]
pub struct Standings {
    order: Vec<(u32, f64)>,
}

impl Standings {
    pub fn of(racers: &[Racer]) -> Standings {
        let active: Vec<&Racer> = racers.iter().filter(|r| !r.is_finished()).collect();
        let progresses: Vec<f64> = active.iter().map(|r| r.progress()).collect();

        let order = argsort(&progresses, SortOrder::Descending)
            .into_iter()
            .map(|idx| (active[idx].id, progresses[idx]))
            .collect();

        Standings { order }
    }

    /// Ids of the active racers, leader first.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.order.iter().map(|&(id, _)| id)
    }

    /// 1-based rank of an active racer.
    pub fn rank_of(&self, id: u32) -> Option<usize> {
        self.order.iter().position(|&(r_id, _)| r_id == id).map(|p| p + 1)
    }

    pub fn total_active(&self) -> usize {
        self.order.len()
    }

    pub fn leader_progress(&self) -> Option<f64> {
        self.order.first().map(|&(_, p)| p)
    }

    pub fn last_progress(&self) -> Option<f64> {
        self.order.last().map(|&(_, p)| p)
    }

    /// Progress distance between the leader and the last active racer.
    pub fn spread(&self) -> f64 {
        match (self.leader_progress(), self.last_progress()) {
            (Some(first), Some(last)) => first - last,
            _ => 0.0,
        }
    }
}

/// catchup_multiplier returns the speed multiplier of the catch-up model.
///
/// * `rank` - 1-based rank among the active racers
/// * `total_active` - Number of active racers
/// * `leader_gap` - Progress gap between this racer and the leader
/// * `trailing_gap` - Progress gap between the leader and the last active racer
///
/// The last racer is boosted once it trails the leader by at least `min_gap_for_catchup`. The
/// leader is slowed down once the last racer trails it by that much. Everyone else is unaffected.
pub fn catchup_multiplier(
    pars: &CatchupPars,
    rank: usize,
    total_active: usize,
    leader_gap: f64,
    trailing_gap: f64,
) -> f64 {
    if total_active < 2 {
        return 1.0;
    }

    if rank == total_active && leader_gap >= pars.min_gap_for_catchup {
        pars.last_place_boost
    } else if rank == 1 && trailing_gap >= pars.min_gap_for_catchup {
        pars.leader_penalty
    } else {
        1.0
    }
}
