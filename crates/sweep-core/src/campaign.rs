//! The interface to whatever executes simulations and stores their results.

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

use crate::aggregate::{MetricArray, METRICS_DIM};
use crate::ident::RunId;
use crate::metrics::{MetricError, MetricReducer, MetricValue};
use crate::params::{Dim, ParamAssignment, ParamSpace, ParamValue, RUNS_DIM};
use crate::run::RunResult;

/// An interface for simulation campaigns. A campaign runs simulations for parameter assignments
/// and keeps their results, so that each (assignment, repetition) pair is simulated once.
pub trait Campaign {
    /// Runs every repetition `0..runs` of every assignment in `space` that has no result yet.
    /// Blocks until all of them have finished.
    fn run_missing_simulations(&self, space: &ParamSpace, runs: usize)
        -> Result<(), CampaignError>;

    /// Returns the results of repetitions `0..runs` of `params`, ordered by repetition.
    fn get_results(
        &self,
        params: &ParamAssignment,
        runs: usize,
    ) -> Result<Vec<RunResult>, CampaignError>;

    /// Evaluates `reducer` on every repetition of every assignment in `space`.
    ///
    /// The resulting array has one dimension per parameter of `space`, in declaration order,
    /// followed by the `runs` dimension and, for vector metrics, the `metrics` dimension.
    /// Assignments are evaluated in parallel. Any reducer failure aborts the whole evaluation.
    fn get_results_as_array<R>(
        &self,
        space: &ParamSpace,
        reducer: &R,
        runs: usize,
    ) -> Result<MetricArray, CampaignError>
    where
        Self: Sync,
        R: MetricReducer + Sync + ?Sized,
    {
        let assignments = space.assignments();
        log::info!(
            "Computing {} over {} parameter assignments",
            reducer.name(),
            assignments.len()
        );
        let values = assignments
            .par_iter()
            .map(|params| {
                let results = self.get_results(params, runs)?;
                if results.len() != runs {
                    return Err(CampaignError::NotRun {
                        params: params.clone(),
                        expected: runs,
                        got: results.len(),
                    });
                }
                results
                    .iter()
                    .map(|run| {
                        let value = reducer.compute(run).map_err(|source| CampaignError::Metric {
                            run: run.meta.id.clone(),
                            reducer: reducer.name().to_owned(),
                            source,
                        })?;
                        Ok((run.meta.id.clone(), value))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut dims = space.dims();
        dims.push(Dim::new(
            RUNS_DIM.to_owned(),
            (0..runs).map(ParamValue::from).collect(),
        ));
        let first = values.iter().flatten().map(|(_, v)| v).next();
        let vector_len = match first {
            Some(MetricValue::Vector(v)) => Some(v.len()),
            _ => None,
        };
        if let Some(len) = vector_len {
            let labels = reducer.labels(len);
            dims.push(Dim::new(
                METRICS_DIM.to_owned(),
                labels.into_iter().map(ParamValue::from).collect(),
            ));
        }

        let mut data = Vec::new();
        for (id, value) in values.into_iter().flatten() {
            match (&value, vector_len) {
                (MetricValue::Scalar(_), None) => {}
                (MetricValue::Vector(v), Some(len)) if v.len() == len => {}
                _ => {
                    return Err(CampaignError::Shape {
                        run: id,
                        expected: vector_len,
                        got: (!value.is_scalar()).then(|| value.as_slice().len()),
                    })
                }
            }
            data.extend_from_slice(value.as_slice());
        }
        let shape = dims.iter().map(Dim::len).collect::<Vec<_>>();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), data)?;
        Ok(MetricArray::new(dims, data)?)
    }
}

impl<T: Campaign + ?Sized> Campaign for &T {
    fn run_missing_simulations(
        &self,
        space: &ParamSpace,
        runs: usize,
    ) -> Result<(), CampaignError> {
        (**self).run_missing_simulations(space, runs)
    }

    fn get_results(
        &self,
        params: &ParamAssignment,
        runs: usize,
    ) -> Result<Vec<RunResult>, CampaignError> {
        (**self).get_results(params, runs)
    }
}

/// Errors produced by campaigns.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// A reducer failed on the artifacts of a run.
    #[error("failed to compute {reducer} for run {run}")]
    Metric {
        /// The run whose artifacts are malformed.
        run: RunId,
        /// The reducer name.
        reducer: String,
        /// The underlying error.
        #[source]
        source: MetricError,
    },

    /// A reducer returned values of different shapes for different runs. `None` stands for a
    /// scalar.
    #[error("run {run} has metric length {got:?}, expected {expected:?}")]
    Shape {
        /// The offending run.
        run: RunId,
        /// The length of the first vector result.
        expected: Option<usize>,
        /// The length of this run's result.
        got: Option<usize>,
    },

    /// Results were requested for runs that have not been simulated.
    #[error("{params} has {got} of {expected} runs")]
    NotRun {
        /// The parameter assignment.
        params: ParamAssignment,
        /// The number of requested runs.
        expected: usize,
        /// The number of available runs.
        got: usize,
    },

    /// The metric array could not be assembled.
    #[error(transparent)]
    Array(#[from] ndarray::ShapeError),

    /// The metric array has inconsistent dimensions.
    #[error(transparent)]
    Aggregate(#[from] crate::aggregate::AggregateError),

    /// Error while reading or writing the campaign's storage.
    #[error("campaign I/O error")]
    Io(#[from] std::io::Error),

    /// Error specific to a campaign implementation.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}
