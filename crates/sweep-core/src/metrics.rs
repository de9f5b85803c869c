//! Reducers that fold the artifacts of one run into a metric value.
//!
//! Every reducer reads the packet trace of a run (and, for fairness, its scheduling trace) and
//! produces either a scalar or one value per network entity. Empty traces never fail: throughput
//! of nothing is zero, while delay statistics become NaN and are reported with a warning.

use statrs::statistics::Statistics;

use crate::ident::EntityId;
use crate::mcs;
use crate::params::{ParamAssignment, ParamError};
use crate::run::RunResult;
use crate::table::TableError;
use crate::trace::{self, PacketTrace};
use crate::units;

/// Simulator parameters read by the reducers.
pub mod param {
    /// Number of stations associated with the AP.
    pub const NUM_STAS: &str = "numStas";
    /// Simulated time in seconds.
    pub const SIMULATION_TIME: &str = "simulationTime";
    /// Beacon interval duration in microseconds.
    pub const BI_DURATION_US: &str = "biDurationUs";
    /// Modulation and coding scheme, e.g. `DMG_MCS4`.
    pub const PHY_MODE: &str = "phyMode";
    /// Offered traffic as a fraction of the PHY rate.
    pub const NORM_OFFERED_TRAFFIC: &str = "normOfferedTraffic";
    /// Per-station application data rate, e.g. `100Mbps`.
    pub const APP_RATE: &str = "appRate";
    /// Service period allocation period; 0 means contention-based access only.
    pub const ALLOCATION_PERIOD: &str = "allocationPeriod";
}

/// The result of a reducer for one run.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// A single value.
    Scalar(f64),
    /// One value per entity.
    Vector(Vec<f64>),
}

impl MetricValue {
    /// The values, a scalar being a sequence of length one.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            MetricValue::Scalar(x) => std::slice::from_ref(x),
            MetricValue::Vector(v) => v,
        }
    }

    /// Whether this is a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(self, MetricValue::Scalar(_))
    }
}

/// An interface for computing a metric from the artifacts of a single run.
pub trait MetricReducer {
    /// The name of the metric, used for logging and output files.
    fn name(&self) -> &str;

    /// Labels the entries of a vector metric of length `len`.
    fn labels(&self, len: usize) -> Vec<String> {
        (0..len).map(|i| i.to_string()).collect()
    }

    /// Computes the metric for one run.
    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError>;
}

impl<T: MetricReducer + ?Sized> MetricReducer for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn labels(&self, len: usize) -> Vec<String> {
        (**self).labels(len)
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        (**self).compute(run)
    }
}

impl<T: MetricReducer + ?Sized> MetricReducer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn labels(&self, len: usize) -> Vec<String> {
        (**self).labels(len)
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        (**self).compute(run)
    }
}

/// The time window over which throughput is measured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ThroughputWindow {
    /// The whole simulation.
    #[default]
    Full,
    /// The simulation minus the first beacon interval. Packets transmitted during the first
    /// beacon interval are ignored.
    SkipFirstBi,
}

impl ThroughputWindow {
    /// Average throughput of `trace` in Mbps.
    pub fn throughput_mbps(
        self,
        trace: &PacketTrace,
        params: &ParamAssignment,
    ) -> Result<f64, MetricError> {
        if trace.is_empty() {
            return Ok(0.0);
        }
        let sim_time = params.float(param::SIMULATION_TIME)?;
        let (bytes, duration) = match self {
            ThroughputWindow::Full => (trace.total_bytes(), sim_time),
            ThroughputWindow::SkipFirstBi => {
                let bi = units::Microsecs::new(params.count(param::BI_DURATION_US)? as u64);
                let warmup = bi.into_secs();
                (trace.sent_after(warmup).total_bytes(), sim_time - warmup)
            }
        };
        Ok(bytes * 8.0 / 1e6 / duration)
    }
}

/// How the offered load of the network is derived, for normalizing throughput.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OfferedRate {
    /// A share of the PHY rate of `phyMode`, split evenly among stations and scaled by
    /// `normOfferedTraffic`.
    #[default]
    Mcs,
    /// The fixed application rate `appRate` of every station.
    AppRate,
}

impl OfferedRate {
    /// Total offered load in Mbps.
    pub fn aggregate_mbps(self, params: &ParamAssignment) -> Result<f64, MetricError> {
        let num_stas = params.count(param::NUM_STAS)?;
        let per_sta = match self {
            OfferedRate::Mcs => sta_data_rate_mbps(
                num_stas,
                params.str(param::PHY_MODE)?,
                params.float(param::NORM_OFFERED_TRAFFIC)?,
            )?,
            OfferedRate::AppRate => {
                let rate = params.str(param::APP_RATE)?;
                units::parse_data_rate(rate)
                    .ok_or_else(|| MetricError::BadDataRate(rate.to_owned()))?
                    .into_mbps()
            }
        };
        Ok(num_stas as f64 * per_sta)
    }
}

/// The rate offered by each of `num_stas` stations in Mbps.
pub fn sta_data_rate_mbps(
    num_stas: usize,
    phy_mode: &str,
    norm_offered_traffic: f64,
) -> Result<f64, MetricError> {
    let phy_rate =
        mcs::phy_rate(phy_mode).ok_or_else(|| MetricError::UnknownMcs(phy_mode.to_owned()))?;
    Ok(norm_offered_traffic * phy_rate.into_mbps() / num_stas as f64)
}

/// Jain's fairness index, `mean(xx)^2 / mean(xx^2)`.
pub fn jain_fairness(xx: &[f64]) -> f64 {
    let n = xx.len() as f64;
    let mean = xx.iter().sum::<f64>() / n;
    let mean_sq = xx.iter().map(|x| x * x).sum::<f64>() / n;
    mean * mean / mean_sq
}

fn packet_trace(run: &RunResult) -> Result<PacketTrace, MetricError> {
    let text = run
        .artifact(trace::PACKETS_TRACE)
        .ok_or_else(|| MetricError::MissingArtifact(trace::PACKETS_TRACE.to_owned()))?;
    Ok(PacketTrace::parse(text)?)
}

fn entities(params: &ParamAssignment) -> Result<impl Iterator<Item = EntityId>, MetricError> {
    let num_stas = params.count(param::NUM_STAS)?;
    Ok((0..=num_stas).map(EntityId::new))
}

fn entity_labels(len: usize) -> Vec<String> {
    (0..len)
        .map(|i| match i {
            0 => "AP".to_owned(),
            i => format!("STA {i}"),
        })
        .collect()
}

fn mean_delay_ms(trace: &PacketTrace) -> f64 {
    if trace.is_empty() {
        return f64::NAN;
    }
    trace.delays_ms().mean()
}

/// Aggregate throughput in Mbps.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct AggrThroughput {
    window: ThroughputWindow,
}

impl MetricReducer for AggrThroughput {
    fn name(&self) -> &str {
        "aggr_thr_mbps"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        let thr = self.window.throughput_mbps(&trace, &run.params)?;
        Ok(MetricValue::Scalar(thr))
    }
}

/// Aggregate throughput divided by the offered load. The ratio is not clamped and can exceed 1.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct NormAggrThroughput {
    window: ThroughputWindow,
    offered: OfferedRate,
}

impl MetricReducer for NormAggrThroughput {
    fn name(&self) -> &str {
        "norm_aggr_thr"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        let thr = self.window.throughput_mbps(&trace, &run.params)?;
        let offered = self.offered.aggregate_mbps(&run.params)?;
        Ok(MetricValue::Scalar(thr / offered))
    }
}

/// Mean end-to-end delay in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvgDelay;

impl MetricReducer for AvgDelay {
    fn name(&self) -> &str {
        "avg_aggr_delay_ms"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        if trace.is_empty() {
            log::warn!("no packets for {}", run.meta.id);
        }
        Ok(MetricValue::Scalar(mean_delay_ms(&trace)))
    }
}

/// Sample standard deviation of the end-to-end delay in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelayStdDev;

impl MetricReducer for DelayStdDev {
    fn name(&self) -> &str {
        "std_aggr_delay_ms"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        if trace.is_empty() {
            log::warn!("no packets for {}", run.meta.id);
            return Ok(MetricValue::Scalar(f64::NAN));
        }
        Ok(MetricValue::Scalar(trace.delays_ms().std_dev()))
    }
}

/// Mean absolute difference between the delays of successive packets, in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvgDelayVariation;

impl MetricReducer for AvgDelayVariation {
    fn name(&self) -> &str {
        "avg_delay_variation_ms"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        if trace.len() < 2 {
            log::warn!("no packets for {}", run.meta.id);
            return Ok(MetricValue::Scalar(f64::NAN));
        }
        let variation = trace
            .delays_ms()
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .collect::<Vec<_>>()
            .mean();
        Ok(MetricValue::Scalar(variation))
    }
}

/// Throughput of the AP and of every station, in Mbps.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct PerEntityThroughput {
    window: ThroughputWindow,
}

impl PerEntityThroughput {
    fn values(&self, trace: &PacketTrace, params: &ParamAssignment) -> Result<Vec<f64>, MetricError> {
        entities(params)?
            .map(|e| self.window.throughput_mbps(&trace.from_entity(e), params))
            .collect()
    }
}

impl MetricReducer for PerEntityThroughput {
    fn name(&self) -> &str {
        "user_thr_mbps"
    }

    fn labels(&self, len: usize) -> Vec<String> {
        entity_labels(len)
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        Ok(MetricValue::Vector(self.values(&trace, &run.params)?))
    }
}

/// Mean delay of the AP and of every station, in milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerEntityDelay;

impl MetricReducer for PerEntityDelay {
    fn name(&self) -> &str {
        "user_avg_delay_ms"
    }

    fn labels(&self, len: usize) -> Vec<String> {
        entity_labels(len)
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        let delays = entities(&run.params)?
            .map(|e| mean_delay_ms(&trace.from_entity(e)))
            .collect::<Vec<_>>();
        if delays.iter().any(|d| d.is_nan()) {
            log::warn!("nan delay for {}", run.meta.id);
        }
        Ok(MetricValue::Vector(delays))
    }
}

/// Jain's fairness index of the per-station throughput.
///
/// With contention-based access only (`allocationPeriod` 0), every station counts. Otherwise only
/// the stations that were granted a service period, according to the scheduling trace, count.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct JainFairness {
    window: ThroughputWindow,
}

impl MetricReducer for JainFairness {
    fn name(&self) -> &str {
        "jain_fairness"
    }

    fn compute(&self, run: &RunResult) -> Result<MetricValue, MetricError> {
        let trace = packet_trace(run)?;
        let user_thr = PerEntityThroughput::new(self.window).values(&trace, &run.params)?;
        let stas = if run.params.int(param::ALLOCATION_PERIOD)? == 0 {
            (1..user_thr.len()).map(EntityId::new).collect::<Vec<_>>()
        } else {
            let text = run
                .artifact(trace::SP_TRACE)
                .ok_or_else(|| MetricError::MissingArtifact(trace::SP_TRACE.to_owned()))?;
            trace::scheduled_stations(text)?.into_iter().collect()
        };
        let thr = stas
            .into_iter()
            .map(|sta| {
                user_thr
                    .get(sta.inner())
                    .copied()
                    .ok_or(MetricError::EntityOutOfRange(sta))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MetricValue::Scalar(jain_fairness(&thr)))
    }
}

/// Errors produced while computing a metric. Each of them means the run's artifacts or
/// parameters are malformed.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// An artifact could not be parsed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A parameter is missing or has the wrong type.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// The run did not produce an artifact.
    #[error("missing artifact `{0}`")]
    MissingArtifact(String),

    /// The modulation and coding scheme is not known.
    #[error("unknown MCS `{0}`")]
    UnknownMcs(String),

    /// A data rate could not be parsed.
    #[error("string `{0}` is not a valid data rate")]
    BadDataRate(String),

    /// The scheduling trace names an entity that does not exist.
    #[error("entity {0} is out of range")]
    EntityOutOfRange(EntityId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn params(num_stas: i64, allocation_period: i64) -> ParamAssignment {
        ParamAssignment::default()
            .with(param::NUM_STAS, num_stas)
            .with(param::SIMULATION_TIME, 2.0)
            .with(param::BI_DURATION_US, 102_400_i64)
            .with(param::PHY_MODE, "DMG_MCS4")
            .with(param::NORM_OFFERED_TRAFFIC, 0.5)
            .with(param::APP_RATE, "100Mbps")
            .with(param::ALLOCATION_PERIOD, allocation_period)
    }

    // Two stations sending 1000-byte packets. STA 1 sends three times as much as STA 2.
    fn two_stations() -> String {
        testing::packets_csv(&[
            (1, 50_000_000, 51_000_000, 1000),
            (1, 200_000_000, 202_000_000, 1000),
            (2, 300_000_000, 304_000_000, 1000),
            (1, 400_000_000, 401_000_000, 1000),
        ])
    }

    fn scalar(value: MetricValue) -> f64 {
        match value {
            MetricValue::Scalar(x) => x,
            MetricValue::Vector(v) => panic!("expected a scalar, got {v:?}"),
        }
    }

    fn vector(value: MetricValue) -> Vec<f64> {
        match value {
            MetricValue::Vector(v) => v,
            MetricValue::Scalar(x) => panic!("expected a vector, got {x}"),
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn jain_fairness_bounds() {
        assert_eq!(jain_fairness(&[3.5; 7]), 1.0);
        assert_eq!(jain_fairness(&[1.0, 0.0, 0.0, 0.0]), 0.25);
        assert!(jain_fairness(&[]).is_nan());
    }

    #[test]
    fn empty_trace_policies() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), "");
        assert_eq!(scalar(AggrThroughput::default().compute(&run)?), 0.0);
        assert_eq!(scalar(NormAggrThroughput::default().compute(&run)?), 0.0);
        assert!(scalar(AvgDelay.compute(&run)?).is_nan());
        assert!(scalar(DelayStdDev.compute(&run)?).is_nan());
        assert!(scalar(AvgDelayVariation.compute(&run)?).is_nan());
        assert_eq!(
            vector(PerEntityThroughput::default().compute(&run)?),
            vec![0.0; 3]
        );
        assert!(vector(PerEntityDelay.compute(&run)?).iter().all(|d| d.is_nan()));
        Ok(())
    }

    #[test]
    fn delay_variation_needs_two_packets() -> anyhow::Result<()> {
        // A lone data row is discarded by the parser.
        let csv = testing::packets_csv(&[(1, 0, 1_000_000, 10)]);
        let run = testing::run_with_packets(params(1, 0), &csv);
        assert!(scalar(AvgDelayVariation.compute(&run)?).is_nan());

        let csv = testing::packets_csv(&[(1, 0, 1_000_000, 10), (1, 0, 4_000_000, 10)]);
        let run = testing::run_with_packets(params(1, 0), &csv);
        assert_close(scalar(AvgDelayVariation.compute(&run)?), 3.0);
        Ok(())
    }

    #[test]
    fn aggregate_metrics() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), &two_stations());
        // 4000 bytes over 2 seconds.
        assert_close(scalar(AggrThroughput::default().compute(&run)?), 0.016);
        // Delays are 1, 2, 4, 1 ms.
        assert_close(scalar(AvgDelay.compute(&run)?), 2.0);
        assert_close(scalar(DelayStdDev.compute(&run)?), 2.0_f64.sqrt());
        assert_close(scalar(AvgDelayVariation.compute(&run)?), 2.0);
        Ok(())
    }

    #[test]
    fn skip_first_bi_window() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), &two_stations());
        let thr = scalar(AggrThroughput::new(ThroughputWindow::SkipFirstBi).compute(&run)?);
        // The first packet is sent before the end of the first beacon interval.
        assert_close(thr, 3000.0 * 8.0 / 1e6 / (2.0 - 0.1024));

        let negative = params(2, 0).with(param::BI_DURATION_US, -1_i64);
        let run = testing::run_with_packets(negative, &two_stations());
        assert!(matches!(
            AggrThroughput::new(ThroughputWindow::SkipFirstBi).compute(&run),
            Err(MetricError::Param(ParamError::Negative { .. }))
        ));
        Ok(())
    }

    #[test]
    fn per_entity_throughput_sums_to_aggregate() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), &two_stations());
        let user = vector(PerEntityThroughput::default().compute(&run)?);
        assert_eq!(user.len(), 3);
        assert_eq!(user[0], 0.0);
        let total = scalar(AggrThroughput::default().compute(&run)?);
        assert_close(user.iter().sum(), total);
        assert_close(user[1], 3.0 * user[2]);
        Ok(())
    }

    #[test]
    fn per_entity_delay() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), &two_stations());
        let delays = vector(PerEntityDelay.compute(&run)?);
        assert!(delays[0].is_nan());
        assert_close(delays[1], 4.0 / 3.0);
        assert_close(delays[2], 4.0);
        assert_eq!(PerEntityDelay.labels(3), vec!["AP", "STA 1", "STA 2"]);
        Ok(())
    }

    #[test]
    fn normalized_throughput() -> anyhow::Result<()> {
        let run = testing::run_with_packets(params(2, 0), &two_stations());
        // Offered: 0.5 * 1155 Mbps in total.
        let norm = scalar(NormAggrThroughput::default().compute(&run)?);
        assert_close(norm, 0.016 / 577.5);
        // Offered: 2 * 100 Mbps.
        let reducer = NormAggrThroughput::new(ThroughputWindow::Full, OfferedRate::AppRate);
        let norm = scalar(reducer.compute(&run)?);
        assert_close(norm, 0.016 / 200.0);
        Ok(())
    }

    #[test]
    fn bad_offered_rate_fails() {
        let bad_mcs = params(2, 0).with(param::PHY_MODE, "DMG_MCS99");
        let run = testing::run_with_packets(bad_mcs, &two_stations());
        assert!(matches!(
            NormAggrThroughput::default().compute(&run),
            Err(MetricError::UnknownMcs(_))
        ));

        let bad_rate = params(2, 0).with(param::APP_RATE, "fast");
        let run = testing::run_with_packets(bad_rate, &two_stations());
        let reducer = NormAggrThroughput::new(ThroughputWindow::Full, OfferedRate::AppRate);
        assert!(matches!(reducer.compute(&run), Err(MetricError::BadDataRate(_))));
    }

    #[test]
    fn fairness_over_all_stations_without_allocation() -> anyhow::Result<()> {
        // The scheduling trace is ignored in contention-only mode.
        let run = testing::run_with_packets(params(2, 0), &two_stations())
            .with_artifact(trace::SP_TRACE, "SrcNodeId,Timestamp_ns,isStart\n1,0,1\n1,5,0\n");
        let jain = scalar(JainFairness::default().compute(&run)?);
        // Throughputs 3x and x.
        assert_close(jain, 0.8);
        Ok(())
    }

    #[test]
    fn fairness_over_scheduled_stations() -> anyhow::Result<()> {
        let sp = "SrcNodeId,Timestamp_ns,isStart\n0,0,1\n1,10,1\n255,20,1\n";
        let run = testing::run_with_packets(params(2, 1), &two_stations())
            .with_artifact(trace::SP_TRACE, sp);
        assert_eq!(scalar(JainFairness::default().compute(&run)?), 1.0);

        let run = testing::run_with_packets(params(2, 1), &two_stations());
        assert!(matches!(
            JainFairness::default().compute(&run),
            Err(MetricError::MissingArtifact(_))
        ));
        Ok(())
    }

    #[test]
    fn fairness_rejects_unknown_stations() {
        let sp = "SrcNodeId,Timestamp_ns,isStart\n1,10,1\n7,20,1\n";
        let run = testing::run_with_packets(params(2, 1), &two_stations())
            .with_artifact(trace::SP_TRACE, sp);
        assert!(matches!(
            JainFairness::default().compute(&run),
            Err(MetricError::EntityOutOfRange(id)) if id == EntityId::new(7)
        ));
    }

    #[test]
    fn malformed_trace_fails() {
        let csv = "SrcNodeId,TxTimestamp_ns,RxTimestamp_ns,PktSize_B\n1,0,1,x\n1,0,1,2\n";
        let run = testing::run_with_packets(params(2, 0), csv);
        assert!(matches!(
            AggrThroughput::default().compute(&run),
            Err(MetricError::Table(TableError::NotNumeric { .. }))
        ));
        let mut run = run;
        run.output.clear();
        assert!(matches!(
            AvgDelay.compute(&run),
            Err(MetricError::MissingArtifact(_))
        ));
    }
}
