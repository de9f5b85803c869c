//! `sweep` runs parameter-sweep campaigns of ns-3 simulations and turns the CSV traces of every
//! run into metrics such as throughput, delay and fairness. Metrics are aggregated over repeated
//! runs into a mean and a 95% confidence interval, and plotted against the swept parameters.

#![warn(unreachable_pub, missing_docs)]

pub mod core;

/// Campaigns backed by a compiled ns-3 script.
pub mod ns3 {
    pub use ns3_frontend::*;
}

/// Line and grouped bar plots of aggregated metrics.
pub mod plot {
    pub use sweep_plot::*;
}

/// Reading sweeps from files.
pub mod utils {
    pub use sweep_utils::*;
}
