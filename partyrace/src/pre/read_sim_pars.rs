use crate::core::config::{RaceConfig, DEFAULT_PLAYERS};
use crate::core::race::WinSelection;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// RaceSetup holds everything the setup screen would collect.
///
/// * `entrants` - Display names in entry order
/// * `duration_secs` - (s) Requested duration bucket, the default bucket if not set
/// * `win_selection` - Rule picking the winners, last place if not set
/// * `seed` - Seed for a reproducible race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSetup {
    pub entrants: Vec<String>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub win_selection: Option<WinSelection>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RaceSetup {
    /// Setup with `DEFAULT_PLAYERS` generically named entrants.
    pub fn with_default_entrants() -> RaceSetup {
        let names: Vec<String> = (1..=DEFAULT_PLAYERS)
            .map(|i| format!("Player {}", i))
            .collect();
        RaceSetup::from_entrants(&names)
    }

    pub fn from_entrants<S: AsRef<str>>(entrants: &[S]) -> RaceSetup {
        RaceSetup {
            entrants: entrants.iter().map(|e| e.as_ref().to_owned()).collect(),
            duration_secs: None,
            win_selection: None,
            seed: None,
        }
    }
}

fn read_json<T: DeserializeOwned>(filepath: &Path, what: &str) -> anyhow::Result<T> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open {} {}!", what, filepath.display()))?;
    let pars = serde_json::from_reader(&fh)
        .context(format!("Failed to parse {} {}!", what, filepath.display()))?;
    Ok(pars)
}

/// read_race_setup reads the JSON file and decodes it into a race setup.
pub fn read_race_setup(filepath: &Path) -> anyhow::Result<RaceSetup> {
    read_json(filepath, "race setup file")
}

/// read_race_config reads a complete race configuration from a JSON file and checks it.
pub fn read_race_config(filepath: &Path) -> anyhow::Result<RaceConfig> {
    let config: RaceConfig = read_json(filepath, "race config file")?;
    config.validate().context(format!(
        "Race config file {} is invalid!",
        filepath.display()
    ))?;
    Ok(config)
}
