use crate::core::race::WinSelection;
use crate::interfaces::presentation::EventNotice;
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// A racer picked by the win selection rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Winner {
    pub racer_id: u32,
    pub display_name: String,
    pub place: usize,
    pub rank_label: String,
}

/// * `place` - 1-based place in the final ranking
/// * `finished` - True if the racer actually crossed the line before the race ended
/// * `finish_time_ms` - (ms) Race time at the finish, synthetic for racers that did not finish
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub place: usize,
    pub racer_id: u32,
    pub display_name: String,
    pub finished: bool,
    pub progress: f64,
    pub finish_time_ms: Option<f64>,
}

/// RaceResult contains everything the presentation layer needs after the race.
#[derive(Debug, Clone, Serialize)]
pub struct RaceResult {
    pub session_id: u64,
    pub duration_ms: f64,
    pub elapsed_ms: f64,
    pub win_selection: WinSelection,
    pub winners: Vec<Winner>,
    pub full_ranking: Vec<RankingEntry>,
    pub events: Vec<EventNotice>,
}

impl RaceResult {
    pub fn winner_ids(&self) -> Vec<u32> {
        self.winners.iter().map(|w| w.racer_id).collect()
    }

    /// format_ranking renders the final ranking, the fired events and the picked racers as text.
    pub fn format_ranking(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();

        writeln!(&mut out, "RESULT: Final ranking")?;
        for entry in self.full_ranking.iter() {
            let time = match entry.finish_time_ms {
                Some(t) => format!("{:8.3}s", t / 1000.0),
                None => "       -".to_owned(),
            };
            writeln!(
                &mut out,
                "{:2}. {:<16} {} progress {:5.3}{}",
                entry.place,
                entry.display_name,
                time,
                entry.progress,
                if entry.finished { "" } else { " (did not finish)" }
            )?;
        }

        if !self.events.is_empty() {
            writeln!(&mut out, "RESULT: Events")?;
            for event in self.events.iter() {
                writeln!(
                    &mut out,
                    "{:8.3}s {:<18} affected {:?}",
                    event.at_ms / 1000.0,
                    event.name,
                    event.affected_racer_ids
                )?;
            }
        }

        writeln!(&mut out, "RESULT: Picked")?;
        for winner in self.winners.iter() {
            writeln!(
                &mut out,
                "{} ({}, place {})",
                winner.display_name, winner.rank_label, winner.place
            )?;
        }

        Ok(out)
    }

    /// print_ranking prints the final ranking to the console output.
    pub fn print_ranking(&self) -> anyhow::Result<()> {
        print!("{}", self.format_ranking()?);
        Ok(())
    }

    /// write_ranking_csv writes the final ranking as CSV, one row per racer.
    pub fn write_ranking_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path).context(format!(
            "Failed to create ranking file {}!",
            path.display()
        ))?;

        for entry in self.full_ranking.iter() {
            writer.serialize(entry)?;
        }
        writer
            .flush()
            .context(format!("Failed to write ranking file {}!", path.display()))?;

        Ok(())
    }
}
