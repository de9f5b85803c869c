//! Results of individual simulation runs.

use std::collections::BTreeMap;

use crate::ident::RunId;
use crate::params::ParamAssignment;
use crate::trace;

/// Identifies a run within its campaign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RunMeta {
    /// The run ID.
    pub id: RunId,
    /// The repetition index, which is also the run's random stream.
    pub repetition: usize,
}

/// The output of one run: the parameters it ran with and its artifacts by name.
///
/// Run results are produced by a [`Campaign`](crate::Campaign) and only read afterwards.
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct RunResult {
    /// Run metadata.
    pub meta: RunMeta,
    /// The parameter assignment, including the repetition's random stream.
    pub params: ParamAssignment,
    /// Artifact name to content.
    pub output: BTreeMap<String, String>,
}

impl RunResult {
    /// Returns the content of an artifact.
    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.output.get(name).map(String::as_str)
    }

    /// Adds or replaces an artifact.
    pub fn with_artifact(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.output.insert(name.into(), content.into());
        self
    }
}

/// Returns the ID of the run if the simulator wrote anything to its standard error stream.
pub fn check_stderr(run: &RunResult) -> Option<RunId> {
    match run.artifact(trace::STDERR) {
        Some(stderr) if !stderr.is_empty() => {
            log::warn!("invalid simulation: {}", run.meta.id);
            Some(run.meta.id.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stderr: Option<&str>) -> RunResult {
        let mut output = BTreeMap::new();
        output.insert(trace::STDOUT.to_owned(), "done\n".to_owned());
        if let Some(stderr) = stderr {
            output.insert(trace::STDERR.to_owned(), stderr.to_owned());
        }
        let meta = RunMeta {
            id: RunId::new("r0"),
            repetition: 0,
        };
        RunResult::new(meta, ParamAssignment::default(), output)
    }

    #[test]
    fn clean_runs_pass() {
        assert_eq!(check_stderr(&run(None)), None);
        assert_eq!(check_stderr(&run(Some(""))), None);
    }

    #[test]
    fn stderr_output_flags_run() {
        let flagged = check_stderr(&run(Some("assert failed: m_txop != 0\n")));
        assert_eq!(flagged, Some(RunId::new("r0")));
    }
}
