//! Grouped bar plots of vector metrics.

use plotly::common::{ErrorData, ErrorType, Title};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot};
use sweep_core::{Aggregated, METRICS_DIM};
use typed_builder::TypedBuilder;

use crate::PlotError;

/// One named series of a grouped bar plot: a value and an error per tick.
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct BarSeries {
    /// The legend entry.
    pub name: String,
    /// The bar heights.
    pub values: Vec<f64>,
    /// The symmetric error of each bar.
    pub errors: Vec<f64>,
}

/// A grouped bar plot: every tick gets one bar per series.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BarPlot {
    #[builder(default, setter(strip_option, into))]
    title: Option<String>,
    #[builder(setter(into))]
    xlabel: String,
    #[builder(setter(into))]
    ylabel: String,
    /// The tick labels along the x axis.
    ticks: Vec<String>,
}

impl BarPlot {
    /// Renders the given series. Every series must have one value and one error per tick.
    pub fn render(&self, series: &[BarSeries]) -> Result<Plot, PlotError> {
        let mut plot = Plot::new();
        for s in series {
            for got in [s.values.len(), s.errors.len()] {
                if got != self.ticks.len() {
                    return Err(PlotError::SeriesLength {
                        name: s.name.clone(),
                        expected: self.ticks.len(),
                        got,
                    });
                }
            }
            let trace = Bar::new(self.ticks.clone(), s.values.clone())
                .name(&s.name)
                .error_y(ErrorData::new(ErrorType::Data).array(s.errors.clone()));
            plot.add_trace(trace);
        }
        let mut layout = Layout::new()
            .bar_mode(BarMode::Group)
            .x_axis(Axis::new().title(Title::with_text(&self.xlabel)))
            .y_axis(Axis::new().title(Title::with_text(&self.ylabel)).show_grid(true));
        if let Some(title) = &self.title {
            layout = layout.title(Title::with_text(title));
        }
        plot.set_layout(layout);
        Ok(plot)
    }
}

/// The one dimension of a vector metric, besides `metrics`, that has more than one coordinate.
pub fn group_dim(agg: &Aggregated) -> Result<String, PlotError> {
    let swept = agg
        .dims()
        .iter()
        .filter(|d| d.name != METRICS_DIM && d.len() > 1)
        .map(|d| d.name.clone())
        .collect::<Vec<_>>();
    match <[String; 1]>::try_from(swept) {
        Ok([group]) => Ok(group),
        Err(swept) => Err(PlotError::GroupDims(swept)),
    }
}

/// Splits an aggregated vector metric into one bar series per coordinate of `group`, named
/// `<group>=<value>`.
///
/// Dimensions of size one are fixed first. Apart from the `metrics` dimension, `group` must then
/// be the only dimension left.
pub fn bar_groups(agg: &Aggregated, group: &str) -> Result<Vec<BarSeries>, PlotError> {
    if agg.dim(METRICS_DIM).is_none() {
        return Err(PlotError::MissingDim(METRICS_DIM.to_owned()));
    }
    let mut fixed = agg.clone();
    for dim in agg.dims() {
        if dim.name != group && dim.name != METRICS_DIM && dim.len() == 1 {
            fixed = fixed.select(&dim.name, &dim.coords[0])?;
        }
    }
    let rest = fixed
        .dims()
        .iter()
        .filter(|d| d.name != METRICS_DIM)
        .map(|d| d.name.clone())
        .collect::<Vec<_>>();
    if rest != [group] {
        return Err(PlotError::GroupDims(rest));
    }
    let values = fixed.dim(group).map(|d| d.coords.clone()).unwrap_or_default();
    values
        .iter()
        .map(|value| {
            let (mean, ci95) = fixed.clone().select(group, value)?.series()?;
            Ok(BarSeries::new(format!("{group}={value}"), mean, ci95))
        })
        .collect()
}
