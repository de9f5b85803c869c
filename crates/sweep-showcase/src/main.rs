//! Runs and plots parameter sweeps of the `scheduler_comparison_qd_dense` ns-3 script.

mod plots;
mod sets;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ns3_frontend::{BuildProfile, Ns3Campaign};
use sweep_core::{check_stderr, metrics::param, Campaign, ParamSpace, RunId};

use crate::plots::{Layout, Normalization, Plotter};
use crate::sets::{Baseline, ParamSet, Sweep};

#[derive(Debug, Parser)]
#[command(about = "Parameter sweeps of an ns-3 scheduler comparison")]
struct Args {
    /// Root of the ns-3 tree
    #[arg(long, default_value = ".")]
    ns3_dir: PathBuf,
    /// Name of the campaign, e.g. a commit hash
    #[arg(long)]
    campaign_name: String,
    /// Script in the `scratch` directory
    #[arg(long, default_value = "scheduler_comparison_qd_dense")]
    script: String,
    /// Maximum number of simulations running at once
    #[arg(long, default_value_t = 1)]
    cores: usize,
    /// Number of runs of every parameter assignment
    #[arg(long, default_value_t = 5)]
    num_runs: usize,
    #[arg(long, default_value = "optimized")]
    profile: BuildProfile,
    /// Configure and build ns-3 first
    #[arg(long)]
    build: bool,
    /// Delete and run again simulations that wrote to stderr
    #[arg(long)]
    remove_broken: bool,
    #[command(flatten)]
    base: Baseline,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the missing simulations of a parameter set
    Run {
        #[arg(long, value_enum)]
        param_set: ParamSet,
    },
    /// Run a parameter set and plot its metrics
    Plot {
        #[arg(long, value_enum)]
        param_set: ParamSet,
    },
    /// Sweep the number of stations at a fixed application rate
    FixedAppRate {
        #[arg(long, default_value = "100Mbps")]
        app_rate: String,
    },
    /// Run and plot a parameter space read from a JSON or Dhall file
    Custom {
        #[arg(long)]
        params: PathBuf,
        /// Dimension on the x axis of line plots
        #[arg(long)]
        x: String,
        /// Dimension of the line plot series
        #[arg(long)]
        hue: String,
        /// Draw bar plots once for every value of this dimension
        #[arg(long)]
        for_each: String,
        #[arg(long)]
        xlabel: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let campaign_dir = args
        .ns3_dir
        .join("campaigns")
        .join(format!("{}-{}", args.script, args.campaign_name));
    let campaign = Ns3Campaign::builder()
        .ns3_dir(args.ns3_dir.clone())
        .script(args.script.clone())
        .campaign_dir(campaign_dir.clone())
        .profile(args.profile)
        .max_parallel(args.cores)
        .skip_configuration(!args.build)
        .build();
    campaign.setup()?;
    campaign.build()?;
    let img_dir = campaign_dir.join("img");
    let plotter = Plotter::new(&campaign, args.num_runs);

    match &args.command {
        Command::Run { param_set } => {
            log::info!("Running {} with {} core(s)", param_set.name(), args.cores);
            let sweep = param_set.sweep(&args.base)?;
            run(&campaign, &sweep.space, args.num_runs, args.remove_broken)?;
        }
        Command::Plot { param_set } => {
            log::info!("Running {} with {} core(s)", param_set.name(), args.cores);
            let sweep = param_set.sweep(&args.base)?;
            run(&campaign, &sweep.space, args.num_runs, args.remove_broken)?;
            let layout = Layout {
                img_dir: img_dir.join(param_set.name()),
                subdir: None,
            };
            plotter.plot_all(&sweep, Normalization::MCS, &layout)?;
        }
        Command::FixedAppRate { app_rate } => {
            for (smart_start, access_cbap) in sets::ACCESS_SETTINGS {
                log::info!(
                    "Running appRate={app_rate}, smartStart={smart_start}, \
                     accessCbapIfAllocated={access_cbap} with {} core(s)",
                    args.cores
                );
                let sweep = sets::fixed_app_rate(&args.base, app_rate, smart_start, access_cbap)?;
                run(&campaign, &sweep.space, args.num_runs, args.remove_broken)?;
                let layout = Layout {
                    img_dir: img_dir.join(app_rate),
                    subdir: Some(format!("smartStart_{smart_start}_cbap_{access_cbap}")),
                };
                plotter.plot_all(&sweep, Normalization::APP_RATE, &layout)?;
            }
        }
        Command::Custom {
            params,
            x,
            hue,
            for_each,
            xlabel,
        } => {
            let space = sweep_utils::read_param_space(params)?;
            let norm = if space.get(param::APP_RATE).is_some() {
                Normalization::APP_RATE
            } else {
                Normalization::MCS
            };
            let name = params
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_owned());
            let sweep = Sweep::new(space, x, hue, xlabel.as_deref().unwrap_or(x), for_each);
            run(&campaign, &sweep.space, args.num_runs, args.remove_broken)?;
            let layout = Layout {
                img_dir: img_dir.join(name),
                subdir: None,
            };
            plotter.plot_all(&sweep, norm, &layout)?;
        }
    }
    Ok(())
}

/// Runs the missing simulations of `space`, then flags the runs that wrote to stderr. With
/// `remove_broken`, flagged runs are deleted and simulated again.
fn run(
    campaign: &Ns3Campaign,
    space: &ParamSpace,
    runs: usize,
    remove_broken: bool,
) -> anyhow::Result<()> {
    campaign.run_missing_simulations(space, runs)?;
    let broken = broken_runs(campaign, space, runs)?;
    if broken.is_empty() {
        return Ok(());
    }
    if !remove_broken {
        log::warn!(
            "{} simulations wrote to stderr, pass --remove-broken to run them again",
            broken.len()
        );
        return Ok(());
    }
    campaign.remove_runs(&broken)?;
    campaign.run_missing_simulations(space, runs)?;
    Ok(())
}

fn broken_runs<C: Campaign>(
    campaign: &C,
    space: &ParamSpace,
    runs: usize,
) -> anyhow::Result<Vec<RunId>> {
    let mut broken = Vec::new();
    for params in space.assignments() {
        let results = campaign.get_results(&params, runs)?;
        broken.extend(results.iter().filter_map(check_stderr));
    }
    Ok(broken)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let args = Args::parse_from([
            "sweep-showcase",
            "--campaign-name",
            "abc123",
            "--cores",
            "8",
            "--profile",
            "debug",
            "plot",
            "--param-set",
            "onoff-stdev",
        ]);
        assert_eq!(args.cores, 8);
        assert_eq!(args.num_runs, 5);
        assert_eq!(args.profile, BuildProfile::Debug);
        assert!(matches!(
            args.command,
            Command::Plot {
                param_set: ParamSet::OnoffStdev
            }
        ));

        let args = Args::parse_from([
            "sweep-showcase",
            "--campaign-name",
            "abc123",
            "fixed-app-rate",
        ]);
        assert!(matches!(
            args.command,
            Command::FixedAppRate { app_rate } if app_rate == "100Mbps"
        ));
    }
}
