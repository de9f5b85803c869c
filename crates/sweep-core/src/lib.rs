#![warn(unreachable_pub, missing_debug_implementations)]

//! The core sweep library. This crate defines [parameter spaces](ParamSpace), the
//! [interface to simulation campaigns](Campaign), the [reducers](metrics) that turn the
//! artifacts of a run into metrics, and the [aggregation](MetricArray::reduce_runs) of metrics
//! over repeated runs.

#[macro_use]
mod ident;

mod aggregate;
mod campaign;
mod params;
mod run;

pub mod mcs;
pub mod metrics;
pub mod table;
pub mod trace;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{AggregateError, Aggregated, MetricArray, METRICS_DIM};
pub use campaign::{Campaign, CampaignError};
pub use ident::{EntityId, RunId};
pub use metrics::{MetricError, MetricReducer, MetricValue};
pub use params::{
    Dim, ParamAssignment, ParamEntry, ParamError, ParamSpace, ParamValue, RNG_RUN, RUNS_DIM,
};
pub use run::{check_stderr, RunMeta, RunResult};
