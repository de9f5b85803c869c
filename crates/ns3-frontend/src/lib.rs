//! A directory-backed simulation campaign running a compiled ns-3 script.
//!
//! This crate is tightly coupled to the layout of an ns-3 tree built with `waf`: the script is
//! expected at `build/<profile>/scratch/ns3-dev-<script>-<profile>` and its libraries at
//! `build/<profile>/lib`.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use chrono::{DateTime, Utc};
use derivative::Derivative;
use indicatif::ProgressBar;
use rayon::prelude::*;
use rustc_hash::FxHasher;
use sweep_core::{
    trace, Campaign, CampaignError, ParamAssignment, ParamSpace, RunId, RunMeta, RunResult,
    RNG_RUN,
};

const CAMPAIGN_FILE: &str = "campaign.json";
const RUN_FILE: &str = "run.json";
const DATA_DIR: &str = "data";

/// A campaign of ns-3 simulations stored under a directory.
///
/// Every run lives in `<campaign_dir>/data/<run-id>/`, where the run ID is a hash of its
/// parameters (including `RngRun`). A run counts as done once its `run.json` exists, so
/// interrupted runs are executed again.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Ns3Campaign {
    /// The root of the ns-3 source tree.
    #[builder(setter(into))]
    pub ns3_dir: PathBuf,
    /// The name of the script in `scratch/`.
    #[builder(setter(into))]
    pub script: String,
    /// The directory holding the campaign's results.
    #[builder(setter(into))]
    pub campaign_dir: PathBuf,
    /// The ns-3 build profile.
    #[builder(default)]
    pub profile: BuildProfile,
    /// The maximum number of simulations running at once.
    #[builder(default = num_cpus::get())]
    pub max_parallel: usize,
    /// Whether to skip configuring and building ns-3.
    #[builder(default)]
    pub skip_configuration: bool,
    /// Whether to wipe an existing campaign directory that belongs to another script.
    #[builder(default)]
    pub overwrite: bool,
}

impl Ns3Campaign {
    /// Prepares the campaign directory, recording which ns-3 tree and script it belongs to.
    ///
    /// This routine fails if the directory holds a campaign for another script or ns-3 tree,
    /// unless `overwrite` is set, in which case the old campaign is deleted.
    pub fn setup(&self) -> Result<(), Error> {
        let info_path = self.campaign_dir.join(CAMPAIGN_FILE);
        if info_path.exists() {
            let info: CampaignInfo = serde_json::from_str(&fs::read_to_string(&info_path)?)?;
            if info.script == self.script && info.ns3_dir == self.ns3_dir {
                log::info!(
                    "Reusing campaign in {} (created {})",
                    self.campaign_dir.display(),
                    info.created
                );
                return Ok(());
            }
            if !self.overwrite {
                return Err(Error::Mismatch {
                    dir: self.campaign_dir.clone(),
                    script: info.script,
                });
            }
            log::warn!("Overwriting campaign in {}", self.campaign_dir.display());
            fs::remove_dir_all(&self.campaign_dir)?;
        }
        fs::create_dir_all(self.campaign_dir.join(DATA_DIR))?;
        let info = CampaignInfo {
            ns3_dir: self.ns3_dir.clone(),
            script: self.script.clone(),
            created: Utc::now(),
        };
        fs::write(info_path, serde_json::to_string_pretty(&info)?)?;
        Ok(())
    }

    /// Configures and builds ns-3 with `waf`, unless `skip_configuration` is set.
    pub fn build(&self) -> Result<(), Error> {
        if self.skip_configuration {
            return Ok(());
        }
        let ns3_dir = &self.ns3_dir;
        let profile = self.profile.as_str();
        let configure_args = vec![
            format!("--build-profile={profile}"),
            format!("--out=build/{profile}"),
            "--disable-werror".to_owned(),
        ];
        log::info!("Building ns-3 in {}", ns3_dir.display());
        cmd_lib::run_cmd! {
            cd ${ns3_dir};
            python3 waf configure $[configure_args] > /dev/null;
            python3 waf build > /dev/null
        }
        .map_err(Error::Build)
    }

    /// Deletes runs so that the next call to
    /// [`run_missing_simulations`](Campaign::run_missing_simulations) executes them again.
    pub fn remove_runs(&self, ids: &[RunId]) -> Result<(), Error> {
        for id in ids {
            let dir = self.run_dir(id);
            if dir.exists() {
                log::info!("Removing run {id}");
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    fn program(&self) -> PathBuf {
        let profile = self.profile.as_str();
        self.ns3_dir
            .join("build")
            .join(profile)
            .join("scratch")
            .join(format!("ns3-dev-{}-{profile}", self.script))
    }

    fn lib_dir(&self) -> PathBuf {
        self.ns3_dir
            .join("build")
            .join(self.profile.as_str())
            .join("lib")
    }

    fn run_dir(&self, id: &RunId) -> PathBuf {
        self.campaign_dir.join(DATA_DIR).join(id.as_str())
    }

    fn is_done(&self, id: &RunId) -> bool {
        self.run_dir(id).join(RUN_FILE).exists()
    }

    fn missing_runs(&self, space: &ParamSpace, runs: usize) -> Vec<PendingRun> {
        space
            .assignments()
            .into_iter()
            .flat_map(|params| (0..runs).map(move |rep| PendingRun::new(&params, rep)))
            .filter(|run| !self.is_done(&run.id))
            .collect()
    }

    fn execute(&self, run: &PendingRun) -> Result<(), Error> {
        let dir = self.run_dir(&run.id);
        fs::create_dir_all(&dir)?;
        let dir = fs::canonicalize(dir)?;
        let program = fs::canonicalize(self.program())?;

        let start = Utc::now();
        let timer = Instant::now();
        let output = Command::new(program)
            .args(cmdline_args(&run.params))
            .current_dir(&dir)
            .env("LD_LIBRARY_PATH", self.lib_dir())
            .output()?;
        let elapsed = timer.elapsed();

        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            stderr.push_str(&format!("simulation exited with {}\n", output.status));
        }
        fs::write(dir.join(trace::STDOUT), &output.stdout)?;
        fs::write(dir.join(trace::STDERR), stderr)?;

        // The run is only complete once this file exists.
        let info = RunInfo {
            id: run.id.clone(),
            params: run.params.clone(),
            repetition: run.repetition,
            start,
            elapsed_secs: elapsed.as_secs_f64(),
        };
        fs::write(dir.join(RUN_FILE), serde_json::to_string_pretty(&info)?)?;
        Ok(())
    }

    fn load(&self, id: &RunId) -> Result<RunResult, Error> {
        let dir = self.run_dir(id);
        let info: RunInfo = serde_json::from_str(&fs::read_to_string(dir.join(RUN_FILE))?)?;
        let mut output = BTreeMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == RUN_FILE || !entry.file_type()?.is_file() {
                continue;
            }
            output.insert(name, fs::read_to_string(entry.path())?);
        }
        let meta = RunMeta {
            id: info.id,
            repetition: info.repetition,
        };
        Ok(RunResult::new(meta, info.params, output))
    }

    fn try_run_missing(&self, space: &ParamSpace, runs: usize) -> Result<(), Error> {
        let missing = self.missing_runs(space, runs);
        let total = space.nr_assignments() * runs;
        log::info!("{} of {total} runs missing", missing.len());
        if missing.is_empty() {
            return Ok(());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()?;
        let bar = ProgressBar::new(missing.len() as u64);
        let (s, r) = crossbeam_channel::unbounded();
        pool.install(|| {
            missing.par_iter().try_for_each_with(s, |s, run| {
                self.execute(run)?;
                bar.inc(1);
                s.send(run.id.clone()).unwrap(); // the channel should never become disconnected
                Result::<(), Error>::Ok(())
            })
        })?;
        bar.finish_and_clear();
        log::info!("Finished {} runs", r.iter().count());
        Ok(())
    }

    fn try_get_results(
        &self,
        params: &ParamAssignment,
        runs: usize,
    ) -> Result<Vec<RunResult>, Error> {
        (0..runs)
            .map(|rep| PendingRun::new(params, rep).id)
            .take_while(|id| self.is_done(id))
            .map(|id| self.load(&id))
            .collect()
    }
}

impl Campaign for Ns3Campaign {
    fn run_missing_simulations(
        &self,
        space: &ParamSpace,
        runs: usize,
    ) -> Result<(), CampaignError> {
        Ok(self.try_run_missing(space, runs)?)
    }

    fn get_results(
        &self,
        params: &ParamAssignment,
        runs: usize,
    ) -> Result<Vec<RunResult>, CampaignError> {
        Ok(self.try_get_results(params, runs)?)
    }
}

#[derive(Debug)]
struct PendingRun {
    id: RunId,
    params: ParamAssignment,
    repetition: usize,
}

impl PendingRun {
    fn new(params: &ParamAssignment, repetition: usize) -> Self {
        let params = params.clone().with(RNG_RUN, repetition);
        Self {
            id: run_id(&params),
            params,
            repetition,
        }
    }
}

/// A stable identifier for the parameters of a run.
fn run_id(params: &ParamAssignment) -> RunId {
    let mut hasher = FxHasher::default();
    for (name, value) in params.iter() {
        hasher.write(name.as_bytes());
        hasher.write_u8(0);
        hasher.write(value.to_string().as_bytes());
        hasher.write_u8(0);
    }
    RunId::new(format!("{:016x}", hasher.finish()))
}

/// The command line arguments passing `params` to an ns-3 script.
fn cmdline_args(params: &ParamAssignment) -> Vec<String> {
    params
        .iter()
        .map(|(name, value)| format!("--{name}={value}"))
        .collect()
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CampaignInfo {
    ns3_dir: PathBuf,
    script: String,
    created: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct RunInfo {
    id: RunId,
    params: ParamAssignment,
    repetition: usize,
    start: DateTime<Utc>,
    elapsed_secs: f64,
}

/// An ns-3 build profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    /// Debug build.
    Debug,
    /// Release build with assertions and logging.
    Release,
    /// Optimized build.
    #[derivative(Default)]
    Optimized,
}

impl BuildProfile {
    /// The profile name used by `waf`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildProfile::Debug => "debug",
            BuildProfile::Release => "release",
            BuildProfile::Optimized => "optimized",
        }
    }
}

impl std::str::FromStr for BuildProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildProfile::Debug),
            "release" => Ok(BuildProfile::Release),
            "optimized" => Ok(BuildProfile::Optimized),
            _ => Err(Error::UnknownProfile(s.to_owned())),
        }
    }
}

/// The error type for [`Ns3Campaign`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The campaign directory belongs to another campaign.
    #[error("{dir} holds a campaign for script `{script}`")]
    Mismatch {
        /// The campaign directory.
        dir: PathBuf,
        /// The script of the existing campaign.
        script: String,
    },

    /// No build profile has the given name.
    #[error("unknown build profile `{0}`")]
    UnknownProfile(String),

    /// Configuring or building ns-3 failed.
    #[error("failed to build ns-3")]
    Build(#[source] std::io::Error),

    /// The worker pool could not be created.
    #[error("failed to create worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Error reading or writing campaign metadata.
    #[error("malformed campaign metadata")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Error> for CampaignError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => CampaignError::Io(e),
            e => CampaignError::Backend(Box::new(e)),
        }
    }
}

/// Returns whether `dir` looks like the root of an ns-3 tree.
pub fn is_ns3_tree(dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    dir.join("waf").is_file() && dir.join("scratch").is_dir()
}
