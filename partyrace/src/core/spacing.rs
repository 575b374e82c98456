use crate::core::config::OverlapPars;
use crate::core::racer::Racer;
use std::collections::HashMap;
use tracing::debug;

/// Keeps racers from visually stacking on the track. Called once per tick after all racers
/// advanced.
pub trait SpacingController {
    fn resolve(&mut self, racers: &mut [Racer], now: f64);

    /// Takes over the overlap parameters of a newly chosen race config.
    fn configure(&mut self, pars: OverlapPars);

    /// Forgets all per-race state.
    fn reset(&mut self);
}

/// Push-apart spacing with timed overtakes.
///
/// Two racers closer than `push_distance` are either pushed apart symmetrically or, if the back
/// racer is genuinely faster and its cooldown has elapsed, the back racer starts an overtake.
/// Cooldowns are tracked here per racer id, not on the racer.
#[derive(Debug, Clone)]
pub struct PushOvertakeSpacing {
    pars: OverlapPars,
    cooldowns: HashMap<u32, f64>,
}

impl PushOvertakeSpacing {
    pub fn new(pars: OverlapPars) -> PushOvertakeSpacing {
        PushOvertakeSpacing {
            pars,
            cooldowns: HashMap::new(),
        }
    }

    fn cooldown_elapsed(&self, id: u32, now: f64) -> bool {
        self.cooldowns.get(&id).map_or(true, |&until| now >= until)
    }

    fn takes_part(racer: &Racer) -> bool {
        !racer.is_finished() && !racer.is_overlap_exempt() && !racer.overtake().active
    }
}

impl SpacingController for PushOvertakeSpacing {
    fn resolve(&mut self, racers: &mut [Racer], now: f64) {
        if !self.pars.enabled {
            return;
        }

        self.cooldowns.retain(|_, until| *until > now);

        // pairwise scan, the field is small
        for i in 0..racers.len() {
            for j in (i + 1)..racers.len() {
                if !Self::takes_part(&racers[i]) || !Self::takes_part(&racers[j]) {
                    continue;
                }

                let gap = (racers[i].progress() - racers[j].progress()).abs();
                if gap >= self.pars.push_distance {
                    continue;
                }

                // on equal progress the earlier entrant counts as the front racer
                let (idx_front, idx_back) = if racers[j].progress() > racers[i].progress() {
                    (j, i)
                } else {
                    (i, j)
                };

                let back_faster = racers[idx_back].base_speed() > racers[idx_front].base_speed();
                let back_id = racers[idx_back].id;

                if back_faster && self.cooldown_elapsed(back_id, now) {
                    let target =
                        racers[idx_front].progress() + self.pars.overtake_boost_distance;
                    racers[idx_back].begin_overtake(now, target);
                    self.cooldowns
                        .insert(back_id, now + self.pars.overtake_cooldown_ms);
                    debug!(
                        "racer {} starts overtaking racer {} (target progress {:.3})",
                        back_id, racers[idx_front].id, target
                    );
                } else {
                    let front = racers[idx_front].progress() + self.pars.push_force;
                    let back = racers[idx_back].progress() - self.pars.push_force;
                    if racers[idx_front].set_progress(front, now) {
                        debug!("racer {} pushed across the line", racers[idx_front].id);
                    }
                    racers[idx_back].set_progress(back, now);
                }
            }
        }
    }

    fn configure(&mut self, pars: OverlapPars) {
        self.pars = pars;
        self.cooldowns.clear();
    }

    fn reset(&mut self) {
        self.cooldowns.clear();
    }
}
