//! The parameter sets of the scheduler comparison campaign.

use clap::ArgAction;
use sweep_core::metrics::param;
use sweep_core::{mcs, ParamEntry, ParamError, ParamSpace, ParamValue};
use sweep_plot::Scale;

const APPLICATION_TYPE: &str = "applicationType";
const SOCKET_TYPE: &str = "socketType";
const MPDU_AGGREGATION_SIZE: &str = "mpduAggregationSize";
const ACCESS_CBAP_IF_ALLOCATED: &str = "accessCbapIfAllocated";
const ONOFF_PERIOD_MEAN: &str = "onoffPeriodMean";
const ONOFF_PERIOD_STDEV: &str = "onoffPeriodStdev";
const SMART_START: &str = "smartStart";

/// 0 is contention-based access only, `n > 0` a service period every BI/n.
const ALLOCATION_PERIODS: [i64; 2] = [0, 1];
const ALL_ALLOCATION_PERIODS: [i64; 5] = [0, 1, 2, 3, 4];
const NORM_LOADS: [f64; 11] = [0.01, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// The baseline value of every simulation parameter. Parameter sets sweep some of them.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct Baseline {
    #[arg(long, default_value = "onoff")]
    pub(crate) application_type: String,
    #[arg(long, default_value_t = 0.75)]
    pub(crate) norm_offered_traffic: f64,
    #[arg(long, default_value = "ns3::UdpSocketFactory")]
    pub(crate) socket_type: String,
    /// A-MPDU aggregation size [B]
    #[arg(long, default_value_t = 262143)]
    pub(crate) mpdu_aggregation_size: i64,
    #[arg(long, default_value = "DMG_MCS4")]
    pub(crate) phy_mode: String,
    /// Simulation time [s]
    #[arg(long, default_value_t = 10.0)]
    pub(crate) simulation_time: f64,
    #[arg(long, default_value_t = 4)]
    pub(crate) num_stas: i64,
    /// Keep allocated stations off the contention-based access periods
    #[arg(long = "dont-access-cbap-if-allocated", action = ArgAction::SetFalse)]
    pub(crate) access_cbap_if_allocated: bool,
    /// Beacon interval [us]
    #[arg(long, default_value_t = 102400)]
    pub(crate) bi_duration_us: i64,
    /// Mean period of on-off applications [s]
    #[arg(long, default_value_t = 0.1024)]
    pub(crate) onoff_period_mean: f64,
    /// Standard deviation of the period of on-off applications [s]
    #[arg(long, default_value_t = 0.0)]
    pub(crate) onoff_period_stdev: f64,
    #[arg(long = "smart-start-off", action = ArgAction::SetFalse)]
    pub(crate) smart_start: bool,
}

impl Baseline {
    /// The baseline space, loaded through `normOfferedTraffic`.
    pub(crate) fn space(&self) -> Result<ParamSpace, ParamError> {
        self.space_with_load(
            param::NORM_OFFERED_TRAFFIC,
            ParamEntry::single(self.norm_offered_traffic),
        )
    }

    /// The baseline space, loaded through the given parameter.
    pub(crate) fn space_with_load(
        &self,
        load: &str,
        entry: ParamEntry,
    ) -> Result<ParamSpace, ParamError> {
        ParamSpace::from_entries([
            (APPLICATION_TYPE, ParamEntry::single(self.application_type.as_str())),
            (load, entry),
            (SOCKET_TYPE, ParamEntry::single(self.socket_type.as_str())),
            (MPDU_AGGREGATION_SIZE, ParamEntry::single(self.mpdu_aggregation_size)),
            (param::PHY_MODE, ParamEntry::single(self.phy_mode.as_str())),
            (param::SIMULATION_TIME, ParamEntry::single(self.simulation_time)),
            (param::NUM_STAS, ParamEntry::single(self.num_stas)),
            (param::ALLOCATION_PERIOD, ParamEntry::list(ALLOCATION_PERIODS)),
            (ACCESS_CBAP_IF_ALLOCATED, ParamEntry::single(self.access_cbap_if_allocated)),
            (param::BI_DURATION_US, ParamEntry::single(self.bi_duration_us)),
            (ONOFF_PERIOD_MEAN, ParamEntry::single(self.onoff_period_mean)),
            (ONOFF_PERIOD_STDEV, ParamEntry::single(self.onoff_period_stdev)),
            (SMART_START, ParamEntry::single(self.smart_start)),
        ])
    }
}

/// A swept parameter space together with how to plot it.
#[derive(Debug, Clone)]
pub(crate) struct Sweep {
    pub(crate) space: ParamSpace,
    /// The dimension on the x axis of line plots.
    pub(crate) x: String,
    /// The x axis positions, one per coordinate of `x`.
    pub(crate) x_values: Vec<ParamValue>,
    pub(crate) xlabel: String,
    pub(crate) xscale: Scale,
    /// The dimension of the line plot series.
    pub(crate) hue: String,
    /// Bar plots are drawn once for every value of this dimension.
    pub(crate) for_each: String,
    /// Names the bar plot folders after a derived quantity instead of `for_each`.
    pub(crate) alias: Option<(String, Vec<ParamValue>)>,
}

impl Sweep {
    /// A sweep plotted against the coordinates of `x`.
    pub(crate) fn new(space: ParamSpace, x: &str, hue: &str, xlabel: &str, for_each: &str) -> Self {
        let x_values = space
            .get(x)
            .map(|entry| entry.values().to_vec())
            .unwrap_or_default();
        Self {
            space,
            x: x.to_owned(),
            x_values,
            xlabel: xlabel.to_owned(),
            xscale: Scale::Linear,
            hue: hue.to_owned(),
            for_each: for_each.to_owned(),
            alias: None,
        }
    }

    /// The names of the bar plot folders, one per value of `for_each`, paired with those values.
    pub(crate) fn bar_folders(&self) -> Vec<(String, ParamValue)> {
        let values = self
            .space
            .get(&self.for_each)
            .map(|e| e.values().to_vec())
            .unwrap_or_default();
        let (name, aliases) = match &self.alias {
            Some((name, aliases)) => (name.as_str(), aliases.clone()),
            None => (self.for_each.as_str(), values.clone()),
        };
        values
            .into_iter()
            .zip(aliases)
            .map(|(value, alias)| (format!("{name}_{alias}_bars"), value))
            .collect()
    }
}

/// The predefined sweeps of the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ParamSet {
    /// Constant bit rate traffic over the normalized offered load
    Basic,
    /// On-off traffic over the normalized offered load
    Onoff,
    /// On-off traffic over the deviation of its period
    OnoffStdev,
    /// Several applications over the allocation period
    SpPeriodicity,
    /// On-off traffic over the ratio of its period to the beacon interval
    OnoffPeriodicity,
    /// On-off traffic over the modulation and coding scheme
    Mcs,
    /// On-off traffic over the number of stations
    NumStas,
    /// On-off traffic with and without smart start
    SmartStart,
    /// On-off traffic with and without contention-based access for allocated stations
    AccessCbapIfAllocated,
}

impl ParamSet {
    /// The name of the set on the command line, also used for its output directory.
    pub(crate) fn name(self) -> String {
        clap::ValueEnum::to_possible_value(&self)
            .map(|v| v.get_name().to_owned())
            .unwrap_or_default()
    }

    pub(crate) fn sweep(self, base: &Baseline) -> Result<Sweep, ParamError> {
        let mut space = base.space()?;
        if !matches!(self, ParamSet::Basic | ParamSet::SpPeriodicity) {
            space.set(APPLICATION_TYPE, ParamEntry::single("onoff"))?;
        }
        let by_load = "Aggr. Offered Rate / PHY Rate";
        let sweep = match self {
            ParamSet::Basic => {
                space.set(APPLICATION_TYPE, ParamEntry::single("constant"))?;
                space.set(param::ALLOCATION_PERIOD, ParamEntry::list(ALL_ALLOCATION_PERIODS))?;
                space.set(param::NORM_OFFERED_TRAFFIC, ParamEntry::list(NORM_LOADS))?;
                Sweep::new(
                    space,
                    param::NORM_OFFERED_TRAFFIC,
                    param::ALLOCATION_PERIOD,
                    by_load,
                    param::NORM_OFFERED_TRAFFIC,
                )
            }
            ParamSet::Onoff => {
                space.set(param::NORM_OFFERED_TRAFFIC, ParamEntry::list(NORM_LOADS))?;
                Sweep::new(
                    space,
                    param::NORM_OFFERED_TRAFFIC,
                    param::ALLOCATION_PERIOD,
                    by_load,
                    param::NORM_OFFERED_TRAFFIC,
                )
            }
            ParamSet::OnoffStdev => {
                let ratios = [0.0, 1e-3, 2e-3, 5e-3, 1e-2, 2e-2, 5e-2, 10e-2, 20e-2];
                let stdevs = ratios.map(|r| r * base.onoff_period_mean);
                space.set(ONOFF_PERIOD_STDEV, ParamEntry::list(stdevs))?;
                let ratios = ratios.map(ParamValue::from).to_vec();
                let mut sweep = Sweep::new(
                    space,
                    ONOFF_PERIOD_STDEV,
                    param::ALLOCATION_PERIOD,
                    "Period Deviation Ratio",
                    ONOFF_PERIOD_STDEV,
                );
                sweep.x_values = ratios.clone();
                sweep.xscale = Scale::Log;
                sweep.alias = Some(("onOffPeriodDeviationRatio".to_owned(), ratios));
                sweep
            }
            ParamSet::SpPeriodicity => {
                let apps = ["constant", "onoff", "crazyTaxi", "fourElements"];
                let fps30 = 1.0 / 30.0;
                space.set(APPLICATION_TYPE, ParamEntry::list(apps))?;
                space.set(param::ALLOCATION_PERIOD, ParamEntry::list(ALL_ALLOCATION_PERIODS))?;
                space.set(ONOFF_PERIOD_MEAN, ParamEntry::single(fps30))?;
                space.set(ONOFF_PERIOD_STDEV, ParamEntry::single(0.1 * fps30))?;
                Sweep::new(
                    space,
                    param::ALLOCATION_PERIOD,
                    APPLICATION_TYPE,
                    "Allocation period (BI/n, 0=CBAP)",
                    APPLICATION_TYPE,
                )
            }
            ParamSet::OnoffPeriodicity => {
                let ratios = [
                    1.0,
                    1.75 * 0.5,
                    1.5 * 0.5,
                    1.25 * 0.5,
                    1.1 * 0.5,
                    0.5,
                    0.5 / 1.1,
                    0.5 / 1.25,
                    0.5 / 1.5,
                    0.5 / 1.75,
                    1.0 / 4.0,
                ];
                let bi_secs = base.bi_duration_us as f64 / 1e6;
                space.set(param::ALLOCATION_PERIOD, ParamEntry::list([0_i64, 2]))?;
                space.set(ONOFF_PERIOD_MEAN, ParamEntry::list(ratios.map(|r| r * bi_secs)))?;
                let mut sweep = Sweep::new(
                    space,
                    ONOFF_PERIOD_MEAN,
                    param::ALLOCATION_PERIOD,
                    "OnOff App mean period (BI^-1)",
                    param::ALLOCATION_PERIOD,
                );
                sweep.x_values = ratios.map(ParamValue::from).to_vec();
                sweep
            }
            ParamSet::Mcs => {
                space.set(param::PHY_MODE, ParamEntry::list(mcs::schemes()))?;
                Sweep::new(
                    space,
                    param::PHY_MODE,
                    param::ALLOCATION_PERIOD,
                    "MCS",
                    param::PHY_MODE,
                )
            }
            ParamSet::NumStas => {
                space.set(param::NUM_STAS, ParamEntry::list([2_i64, 4, 6, 8, 10]))?;
                Sweep::new(
                    space,
                    param::NUM_STAS,
                    param::ALLOCATION_PERIOD,
                    param::NUM_STAS,
                    param::NUM_STAS,
                )
            }
            ParamSet::SmartStart => {
                space.set(SMART_START, ParamEntry::list([true, false]))?;
                Sweep::new(
                    space,
                    SMART_START,
                    param::ALLOCATION_PERIOD,
                    SMART_START,
                    param::ALLOCATION_PERIOD,
                )
            }
            ParamSet::AccessCbapIfAllocated => {
                space.set(ACCESS_CBAP_IF_ALLOCATED, ParamEntry::list([true, false]))?;
                Sweep::new(
                    space,
                    ACCESS_CBAP_IF_ALLOCATED,
                    param::ALLOCATION_PERIOD,
                    ACCESS_CBAP_IF_ALLOCATED,
                    param::ALLOCATION_PERIOD,
                )
            }
        };
        Ok(sweep)
    }
}

/// The three channel access settings compared at a fixed application rate, as
/// `(smartStart, accessCbapIfAllocated)`.
pub(crate) const ACCESS_SETTINGS: [(bool, bool); 3] = [(true, true), (false, true), (false, false)];

/// Sweeps the number of stations at a fixed application rate per station.
pub(crate) fn fixed_app_rate(
    base: &Baseline,
    app_rate: &str,
    smart_start: bool,
    access_cbap: bool,
) -> Result<Sweep, ParamError> {
    let mut space = base.space_with_load(param::APP_RATE, ParamEntry::single(app_rate))?;
    space.set(param::NUM_STAS, ParamEntry::list(1_i64..=10))?;
    space.set(SMART_START, ParamEntry::single(smart_start))?;
    space.set(ACCESS_CBAP_IF_ALLOCATED, ParamEntry::single(access_cbap))?;
    Ok(Sweep::new(
        space,
        param::NUM_STAS,
        param::ALLOCATION_PERIOD,
        param::NUM_STAS,
        param::NUM_STAS,
    ))
}
