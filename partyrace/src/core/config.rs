use crate::core::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;
pub const DEFAULT_PLAYERS: usize = 3;
pub const DEFAULT_LOSER_RANK: u32 = 1;

/// Reference duration all baseline values below are tuned for.
pub const BASELINE_DURATION_MS: f64 = 60_000.0;

const BASELINE_EVENT_TIMES_MS: [f64; 10] = [
    10_000.0, 20_000.0, 25_000.0, 30_000.0, 35_000.0, 40_000.0, 44_000.0, 48_000.0, 52_000.0,
    56_000.0,
];
const BASELINE_SPEED_MIN: f64 = 0.015;
const BASELINE_SPEED_MAX: f64 = 0.025;
const BASELINE_RANDOM_INTERVAL_MS: f64 = 2_000.0;
const BASELINE_LAST_PLACE_BOOST: f64 = 1.25;
const BASELINE_LEADER_PENALTY: f64 = 0.94;
const MIN_GAP_FOR_CATCHUP: f64 = 0.25;
const CATCHUP_SCALING: f64 = 0.25;
const MIN_LEADER_PENALTY: f64 = 0.5;

/// Race length the user can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationBucket {
    Short,
    Medium,
    Long,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 3] = [
        DurationBucket::Short,
        DurationBucket::Medium,
        DurationBucket::Long,
    ];

    pub fn secs(self) -> u32 {
        match self {
            DurationBucket::Short => 20,
            DurationBucket::Medium => 40,
            DurationBucket::Long => 60,
        }
    }

    pub fn from_secs(secs: u32) -> Option<DurationBucket> {
        DurationBucket::ALL.iter().copied().find(|b| b.secs() == secs)
    }
}

impl Default for DurationBucket {
    fn default() -> Self {
        DurationBucket::Long
    }
}

/// * `min` - (progress/s) Lower bound of the base speed
/// * `max` - (progress/s) Upper bound of the base speed
/// * `random_interval_ms` - (ms) Interval between base speed resamples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPars {
    pub min: f64,
    pub max: f64,
    pub random_interval_ms: f64,
}

/// * `last_place_boost` - Multiplier for the last active racer (>= 1)
/// * `leader_penalty` - Multiplier for the leader (<= 1)
/// * `min_gap_for_catchup` - (progress) Gap to the leader (or, for the leader, to the last
/// racer) from which on the adjustment applies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchupPars {
    pub last_place_boost: f64,
    pub leader_penalty: f64,
    pub min_gap_for_catchup: f64,
}

/// * `push_distance` - (progress) Distance below which two racers count as overlapping
/// * `push_force` - (progress) Separation applied to both racers per tick when pushing
/// * `overtake_boost_distance` - (progress) How far past the front racer an overtake ends
/// * `overtake_cooldown_ms` - (ms) Minimum time between two overtakes of the same racer
/// * `enabled` - Switches the whole spacing logic on or off
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapPars {
    pub push_distance: f64,
    pub push_force: f64,
    pub overtake_boost_distance: f64,
    pub overtake_cooldown_ms: f64,
    pub enabled: bool,
}

/// * `stun_ms` - (ms) Stun duration used by the stun events
/// * `boost_ms` - (ms) Boost duration used by the boost events
/// * `short_boost_ms` - (ms) Boost handed to the non-stunned racers by the stun events
/// * `reverse_ms` - (ms) Default reverse duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillDurations {
    pub stun_ms: f64,
    pub boost_ms: f64,
    pub short_boost_ms: f64,
    pub reverse_ms: f64,
}

/// Fully resolved parameter set of one race. Built once from a duration bucket and handed to the
/// race engine, nothing modifies it afterwards.
///
/// * `duration_ms` - (ms) Total race length
/// * `event_times_ms` - (ms) Race-relative offsets at which a random event fires (strictly
/// increasing, below `duration_ms`)
/// * `speed` - Base speed parameters
/// * `catchup` - Catch-up model parameters
/// * `overlap` - Spacing controller parameters
/// * `skills` - Status effect durations
/// * `boost_rest_on_stun` - If set, the front-stun event boosts every racer it did not stun
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    pub duration_ms: f64,
    pub event_times_ms: Vec<f64>,
    pub speed: SpeedPars,
    pub catchup: CatchupPars,
    pub overlap: OverlapPars,
    pub skills: SkillDurations,
    pub boost_rest_on_stun: bool,
}

impl RaceConfig {
    /// Builds the configuration for a duration bucket by scaling the 60 s baseline. Shorter races
    /// run faster, fire events and expire effects sooner and use a stronger catch-up.
    pub fn for_bucket(bucket: DurationBucket) -> RaceConfig {
        let duration_ms = bucket.secs() as f64 * 1000.0;
        let ratio = duration_ms / BASELINE_DURATION_MS;
        let scale_time = |t: f64| (t * ratio).round();

        let event_times_ms = BASELINE_EVENT_TIMES_MS
            .iter()
            .map(|&t| scale_time(t))
            .filter(|&t| t < duration_ms)
            .collect();

        let strength = 1.0 + (1.0 / ratio - 1.0) * CATCHUP_SCALING;

        RaceConfig {
            duration_ms,
            event_times_ms,
            speed: SpeedPars {
                min: BASELINE_SPEED_MIN / ratio,
                max: BASELINE_SPEED_MAX / ratio,
                random_interval_ms: scale_time(BASELINE_RANDOM_INTERVAL_MS),
            },
            catchup: CatchupPars {
                last_place_boost: 1.0 + (BASELINE_LAST_PLACE_BOOST - 1.0) * strength,
                leader_penalty: (1.0 - (1.0 - BASELINE_LEADER_PENALTY) * strength)
                    .max(MIN_LEADER_PENALTY),
                min_gap_for_catchup: MIN_GAP_FOR_CATCHUP,
            },
            overlap: OverlapPars {
                push_distance: 0.02,
                push_force: 0.0005,
                overtake_boost_distance: 0.04,
                overtake_cooldown_ms: scale_time(3_000.0),
                enabled: true,
            },
            skills: SkillDurations {
                stun_ms: scale_time(3_000.0),
                boost_ms: scale_time(5_000.0),
                short_boost_ms: scale_time(3_000.0),
                reverse_ms: scale_time(4_000.0),
            },
            boost_rest_on_stun: true,
        }
    }

    /// Resolves a requested duration in seconds. Unknown durations fall back to the default
    /// bucket; the returned error is only a warning signal and has already been logged.
    pub fn for_duration_secs(secs: u32) -> (RaceConfig, Option<ConfigurationError>) {
        match DurationBucket::from_secs(secs) {
            Some(bucket) => (RaceConfig::for_bucket(bucket), None),
            None => {
                let fallback = DurationBucket::default();
                let err = ConfigurationError::UnknownDuration {
                    requested_secs: secs,
                    fallback_secs: fallback.secs(),
                };
                warn!("{}", err);
                (RaceConfig::for_bucket(fallback), Some(err))
            }
        }
    }

    /// Checks the invariants of a configuration, e.g. one loaded from a file.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field: &'static str, reason: &str| {
            Err(ConfigurationError::InvalidValue {
                field,
                reason: reason.to_owned(),
            })
        };

        if !(self.duration_ms > 0.0) {
            return invalid("duration_ms", "must be positive");
        }
        if self.speed.min < 0.0 || self.speed.max < 0.0 {
            return invalid("speed", "speeds must not be negative");
        }
        if self.speed.min > self.speed.max {
            return invalid("speed", "min must not exceed max");
        }
        if self.speed.random_interval_ms < 0.0 {
            return invalid("speed.random_interval_ms", "must not be negative");
        }
        if self.catchup.last_place_boost < 1.0 {
            return invalid("catchup.last_place_boost", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.catchup.leader_penalty) {
            return invalid("catchup.leader_penalty", "must be within [0, 1]");
        }
        if self.catchup.min_gap_for_catchup < 0.0 {
            return invalid("catchup.min_gap_for_catchup", "must not be negative");
        }

        let o = &self.overlap;
        if o.push_distance < 0.0
            || o.push_force < 0.0
            || o.overtake_boost_distance < 0.0
            || o.overtake_cooldown_ms < 0.0
        {
            return invalid("overlap", "values must not be negative");
        }

        let s = &self.skills;
        if s.stun_ms < 0.0 || s.boost_ms < 0.0 || s.short_boost_ms < 0.0 || s.reverse_ms < 0.0 {
            return invalid("skills", "durations must not be negative");
        }

        if self.event_times_ms.iter().any(|&t| t < 0.0 || t >= self.duration_ms) {
            return invalid("event_times_ms", "offsets must lie within [0, duration_ms)");
        }
        if self.event_times_ms.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("event_times_ms", "offsets must be strictly increasing");
        }

        Ok(())
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig::for_bucket(DurationBucket::default())
    }
}
