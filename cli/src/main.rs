use clap::Parser;
use partyrace::core::config::RaceConfig;
use partyrace::core::handle_race::handle_race;
use partyrace::core::race::WinSelection;
use partyrace::interfaces::presentation::{RaceMessage, RaceSnapshot};
use partyrace::post::race_result::RaceResult;
use partyrace::pre::read_sim_pars::{read_race_config, read_race_setup, RaceSetup};
use partyrace::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Combines the setup file (or the entrant list) with the command line overrides.
fn build_setup(sim_opts: &SimOpts) -> anyhow::Result<RaceSetup> {
    let mut setup = if let Some(parfile_path) = &sim_opts.parfile_path {
        info!("Reading race setup from {}", parfile_path.display());
        read_race_setup(parfile_path)?
    } else if sim_opts.entrants.is_empty() {
        RaceSetup::with_default_entrants()
    } else {
        RaceSetup::from_entrants(&sim_opts.entrants)
    };

    if let Some(duration) = sim_opts.duration {
        setup.duration_secs = Some(duration);
    }
    if let Some(rank) = sim_opts.loser_rank {
        setup.win_selection = Some(WinSelection::Single { rank });
    }
    if let Some(seed) = sim_opts.seed {
        setup.seed = Some(seed);
    }

    Ok(setup)
}

fn format_leaderboard(snapshot: &RaceSnapshot) -> String {
    let entries: Vec<String> = snapshot
        .racers
        .iter()
        .map(|r| {
            let flag = if r.finished {
                " (finished)"
            } else if r.status.stunned {
                " (stunned)"
            } else if r.status.reversed {
                " (reversed)"
            } else if r.status.boosted {
                " (boosted)"
            } else {
                ""
            };
            format!(
                "{}. {} {:5.1}%{}",
                r.position,
                r.display_name,
                r.progress.min(1.0) * 100.0,
                flag
            )
        })
        .collect();

    format!(
        "{:5.1}s left | {}",
        snapshot.time_left_ms / 1000.0,
        entries.join(" | ")
    )
}

/// Runs one race in real-time on a separate thread and prints what arrives through the channel.
fn run_live(
    setup: &RaceSetup,
    config: Option<&RaceConfig>,
    sim_opts: &SimOpts,
) -> anyhow::Result<RaceResult> {
    // countdown belongs to the front-end, the race starts on GO
    for count in ["3", "2", "1", "GO!"] {
        println!("{}", count);
        thread::sleep(Duration::from_secs_f64(1.0 / sim_opts.realtime_factor.max(0.001)));
    }

    let (tx, rx) = flume::unbounded();
    let setup_thread = setup.clone();
    let config_thread = config.cloned();
    let timestep_size = sim_opts.timestep_size;
    let realtime_factor = sim_opts.realtime_factor;

    let sim_thread = thread::spawn(move || {
        handle_race(
            &setup_thread,
            config_thread.as_ref(),
            timestep_size,
            Some(&tx),
            realtime_factor,
        )
    });

    let mut session_id = None;
    let mut t_last_print = f64::NEG_INFINITY;

    for msg in rx.iter() {
        // only the session of the first message is shown
        if *session_id.get_or_insert(msg.session_id()) != msg.session_id() {
            warn!("Discarding message of stale session {}", msg.session_id());
            continue;
        }

        match msg {
            RaceMessage::Tick(snapshot) => {
                if snapshot.elapsed_ms >= t_last_print + 1000.0 || snapshot.time_left_ms <= 0.0 {
                    println!("{}", format_leaderboard(&snapshot));
                    t_last_print = snapshot.elapsed_ms;
                }
            }
            RaceMessage::Event { notice, .. } => {
                println!(">>> {} {}", notice.name, notice.description);
            }
            RaceMessage::Finished(_) => break,
        }
    }

    sim_thread
        .join()
        .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))?
}

/// Runs independent races in parallel and counts how often each entrant was picked.
fn run_batch(
    setup: &RaceSetup,
    config: Option<&RaceConfig>,
    sim_opts: &SimOpts,
) -> anyhow::Result<Vec<RaceResult>> {
    let results = (0..sim_opts.no_sim_runs)
        .into_par_iter()
        .map(|run| {
            let mut setup_run = setup.clone();
            setup_run.seed = setup.seed.map(|seed| seed.wrapping_add(run as u64));
            handle_race(&setup_run, config, sim_opts.timestep_size, None, 1.0)
        })
        .collect::<anyhow::Result<Vec<RaceResult>>>()?;

    let mut tally: HashMap<&str, u32> = HashMap::new();
    for result in results.iter() {
        for winner in result.winners.iter() {
            *tally.entry(winner.display_name.as_str()).or_insert(0) += 1;
        }
    }

    println!("RESULT: Picked in {} races", results.len());
    for name in setup.entrants.iter() {
        let count = tally.get(name.trim()).copied().unwrap_or(0);
        println!(
            "{:<16} {:5} ({:5.1}%)",
            name.trim(),
            count,
            100.0 * count as f64 / results.len().max(1) as f64
        );
    }

    Ok(results)
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();
    init_logging(sim_opts.debug);

    anyhow::ensure!(
        (0.001..=1.0).contains(&sim_opts.timestep_size),
        "Timestep size must be in the range [0.001, 1.0]!"
    );

    let setup = build_setup(&sim_opts)?;
    let config = match &sim_opts.config_path {
        Some(config_path) => {
            info!("Reading race config from {}", config_path.display());
            Some(read_race_config(config_path)?)
        }
        None => None,
    };

    info!(
        "Racing {} with a time step size of {:.3}s",
        setup.entrants.join(", "),
        sim_opts.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let t_start = Instant::now();

    let result = if sim_opts.live {
        if sim_opts.no_sim_runs > 1 {
            warn!("Live mode runs a single race, ignoring --no-sim-runs");
        }
        run_live(&setup, config.as_ref(), &sim_opts)?
    } else if sim_opts.no_sim_runs > 1 {
        let mut results = run_batch(&setup, config.as_ref(), &sim_opts)?;
        info!("Execution time: {}ms", t_start.elapsed().as_millis());
        results.swap_remove(0)
    } else {
        let result = handle_race(&setup, config.as_ref(), sim_opts.timestep_size, None, 1.0)?;
        info!("Execution time: {}ms", t_start.elapsed().as_millis());
        result
    };

    // POST-PROCESSING -----------------------------------------------------------------------------
    result.print_ranking()?;

    if let Some(output) = &sim_opts.output {
        result.write_ranking_csv(output)?;
        info!("Final ranking written to {}", output.display());
    }

    Ok(())
}
