//! Renders the metrics of a sweep.

use std::path::{Path, PathBuf};

use anyhow::Context;
use sweep_core::metrics::{
    param, AggrThroughput, AvgDelay, AvgDelayVariation, DelayStdDev, JainFairness,
    NormAggrThroughput, OfferedRate, PerEntityDelay, PerEntityThroughput, ThroughputWindow,
};
use sweep_core::{Aggregated, Campaign, MetricReducer, ParamEntry, ParamSpace, METRICS_DIM};
use sweep_plot::{BarPlot, LinePlot};

use crate::sets::Sweep;

/// How throughput is measured and normalized.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Normalization {
    pub(crate) window: ThroughputWindow,
    pub(crate) offered: OfferedRate,
}

impl Normalization {
    /// Full-length throughput relative to a share of the PHY rate.
    pub(crate) const MCS: Self = Self {
        window: ThroughputWindow::Full,
        offered: OfferedRate::Mcs,
    };

    /// Throughput after the first beacon interval relative to the application rate.
    pub(crate) const APP_RATE: Self = Self {
        window: ThroughputWindow::SkipFirstBi,
        offered: OfferedRate::AppRate,
    };
}

/// Where the plots of a sweep go.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    /// The root image directory. Bar plot folders are created here.
    pub(crate) img_dir: PathBuf,
    /// A subdirectory for line plots and within every bar plot folder.
    pub(crate) subdir: Option<String>,
}

impl Layout {
    fn line_dir(&self) -> PathBuf {
        match &self.subdir {
            Some(sub) => self.img_dir.join(sub),
            None => self.img_dir.clone(),
        }
    }

    fn bar_dir(&self, folder: &str) -> PathBuf {
        let dir = self.img_dir.join(folder);
        match &self.subdir {
            Some(sub) => dir.join(sub),
            None => dir,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Plotter<'a, C> {
    campaign: &'a C,
    runs: usize,
}

impl<'a, C: Campaign + Sync> Plotter<'a, C> {
    pub(crate) fn new(campaign: &'a C, runs: usize) -> Self {
        Self { campaign, runs }
    }

    /// Draws every line and bar plot of `sweep`.
    pub(crate) fn plot_all(
        &self,
        sweep: &Sweep,
        norm: Normalization,
        layout: &Layout,
    ) -> anyhow::Result<()> {
        let dir = layout.line_dir();
        let Normalization { window, offered } = norm;
        let (thr_name, with_aggr_thr) = match offered {
            OfferedRate::Mcs => ("thr", false),
            OfferedRate::AppRate => ("norm_thr", true),
        };
        self.line(
            sweep,
            &NormAggrThroughput::new(window, offered),
            "Aggr. Throughput / Aggr. Offered Rate",
            None,
            &dir,
            thr_name,
        )?;
        if with_aggr_thr {
            self.line(
                sweep,
                &AggrThroughput::new(window),
                "Aggregated Throughput [Mbps]",
                None,
                &dir,
                "aggr_thr",
            )?;
        }
        self.line(sweep, &AvgDelay, "Avg delay [ms]", None, &dir, "avg_delay")?;
        self.line(
            sweep,
            &AvgDelay,
            "Avg delay [ms]",
            Some((0.0, 100.0)),
            &dir,
            "avg_delay_100ms",
        )?;
        self.line(sweep, &DelayStdDev, "Delay stdev [ms]", None, &dir, "delay_stdev")?;
        self.line(
            sweep,
            &AvgDelayVariation,
            "Avg delay variation [ms]",
            None,
            &dir,
            "avg_delay_variation",
        )?;
        self.line(
            sweep,
            &JainFairness::new(window),
            "Jain's Fairness Index",
            None,
            &dir,
            "jain_fairness",
        )?;

        self.bars(
            sweep,
            &PerEntityThroughput::new(window),
            "Throughput [Mbps]",
            layout,
            "user_thr",
        )?;
        self.bars(sweep, &PerEntityDelay, "Avg delay [ms]", layout, "user_delay")?;
        Ok(())
    }

    fn aggregate<R>(&self, space: &ParamSpace, reducer: &R) -> anyhow::Result<Aggregated>
    where
        R: MetricReducer + Sync,
    {
        let agg = self
            .campaign
            .get_results_as_array(space, reducer, self.runs)?
            .reduce_runs()?;
        Ok(agg)
    }

    fn line<R>(
        &self,
        sweep: &Sweep,
        reducer: &R,
        ylabel: &str,
        ylim: Option<(f64, f64)>,
        dir: &Path,
        name: &str,
    ) -> anyhow::Result<()>
    where
        R: MetricReducer + Sync,
    {
        log::info!("Plotting (line): {}", reducer.name());
        let agg = self.aggregate(&sweep.space, reducer)?;
        let plot = LinePlot::builder()
            .x(sweep.x.as_str())
            .x_values(sweep.x_values.clone())
            .hue(sweep.hue.as_str())
            .xlabel(sweep.xlabel.as_str())
            .ylabel(ylabel)
            .ylim(ylim)
            .xscale(sweep.xscale)
            .build()
            .render(&agg)
            .with_context(|| format!("failed to plot {name}"))?;
        sweep_plot::write_plot(&plot, dir, name)?;
        sweep_plot::write_table(&agg, dir, name)?;
        Ok(())
    }

    /// Draws one grouped bar plot for every value of the sweep's `for_each` dimension.
    fn bars<R>(
        &self,
        sweep: &Sweep,
        reducer: &R,
        ylabel: &str,
        layout: &Layout,
        name: &str,
    ) -> anyhow::Result<()>
    where
        R: MetricReducer + Sync,
    {
        for (folder, value) in sweep.bar_folders() {
            let mut space = sweep.space.clone();
            space.set(&sweep.for_each, ParamEntry::single(value))?;
            let single_num_stas = space
                .get(param::NUM_STAS)
                .map_or(false, |e| e.values().len() == 1);
            anyhow::ensure!(
                single_num_stas,
                "cannot plot bar metric over a list of {}",
                param::NUM_STAS
            );

            log::info!("Plotting (bar): {}", reducer.name());
            let agg = self.aggregate(&space, reducer)?;
            let ticks: Vec<String> = agg
                .dim(METRICS_DIM)
                .map(|d| d.coords.iter().map(ToString::to_string).collect())
                .unwrap_or_default();
            let group = sweep_plot::group_dim(&agg)?;
            let series = sweep_plot::bar_groups(&agg, &group)?;
            let plot = BarPlot::builder()
                .xlabel("Node ID")
                .ylabel(ylabel)
                .ticks(ticks)
                .build()
                .render(&series)?;
            let dir = layout.bar_dir(&folder);
            sweep_plot::write_plot(&plot, &dir, name)?;
            sweep_plot::write_table(&agg, &dir, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_dirs() {
        let flat = Layout {
            img_dir: PathBuf::from("img/onoff"),
            subdir: None,
        };
        assert_eq!(flat.line_dir(), Path::new("img/onoff"));
        assert_eq!(
            flat.bar_dir("numStas_4_bars"),
            Path::new("img/onoff/numStas_4_bars")
        );
        let nested = Layout {
            img_dir: PathBuf::from("img/100Mbps"),
            subdir: Some("smartStart_true_cbap_true".to_owned()),
        };
        assert_eq!(
            nested.line_dir(),
            Path::new("img/100Mbps/smartStart_true_cbap_true")
        );
        assert_eq!(
            nested.bar_dir("numStas_4_bars"),
            Path::new("img/100Mbps/numStas_4_bars/smartStart_true_cbap_true")
        );
    }
}
