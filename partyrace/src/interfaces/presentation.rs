use crate::core::events::EventKind;
use crate::post::race_result::RaceResult;
use serde::Serialize;

/// Upper bound for snapshots per second of race time sent in real-time mode.
pub const MAX_SNAPSHOT_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFlags {
    pub stunned: bool,
    pub boosted: bool,
    pub reversed: bool,
}

/// * `position` - 1-based leaderboard position
/// * `progress` - Fraction of the lap, >= 1 once finished
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerSnapshot {
    pub id: u32,
    pub display_name: String,
    pub position: usize,
    pub progress: f64,
    pub status: StatusFlags,
    pub finished: bool,
}

/// Read-only view of a race after a tick. Racers are ordered like the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSnapshot {
    pub session_id: u64,
    pub elapsed_ms: f64,
    pub time_left_ms: f64,
    pub racers: Vec<RacerSnapshot>,
}

/// Notification about a fired event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventNotice {
    pub kind: EventKind,
    pub name: String,
    pub description: String,
    pub affected_racer_ids: Vec<u32>,
    pub at_ms: f64,
}

/// Everything the simulation thread sends to a live front-end.
#[derive(Debug, Clone, Serialize)]
pub enum RaceMessage {
    Tick(RaceSnapshot),
    Event { session_id: u64, notice: EventNotice },
    Finished(RaceResult),
}

impl RaceMessage {
    pub fn session_id(&self) -> u64 {
        match self {
            RaceMessage::Tick(snapshot) => snapshot.session_id,
            RaceMessage::Event { session_id, .. } => *session_id,
            RaceMessage::Finished(result) => result.session_id,
        }
    }
}
