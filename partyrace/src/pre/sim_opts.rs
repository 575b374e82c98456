use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "partyrace",
    about = "A party race that decides who buys the coffee"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Run the race in real-time and show a live leaderboard
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (ignored in live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the race setup file (OPTIONAL: if not set, entrants are taken from --entrants)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set path to a custom race config file (OPTIONAL: overrides the duration bucket)
    #[clap(short, long)]
    pub config_path: Option<PathBuf>,

    /// Comma separated entrant names, used if no setup file is given (OPTIONAL: if not set,
    /// three players "Player 1" to "Player 3" race)
    #[clap(short, long, value_delimiter = ',')]
    pub entrants: Vec<String>,

    /// Set race duration in seconds (20, 40 or 60)
    #[clap(long)]
    pub duration: Option<u32>,

    /// Pick the racer at this rank counted from the back (1 = last place)
    #[clap(long)]
    pub loser_rank: Option<u32>,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.05")]
    pub timestep_size: f64,

    /// Set seed for a reproducible race
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Write the final ranking of the (first) race to this CSV file
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}
