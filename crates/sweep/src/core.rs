//! Core sweep data structures, traits, and routines. A [Campaign] runs the simulations of a
//! [ParamSpace], and [Campaign::get_results_as_array()] reduces every run to a metric with a
//! [MetricReducer].

pub use sweep_core::*;
