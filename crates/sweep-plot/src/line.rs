//! Line plots with error bars.

use plotly::common::{ErrorData, ErrorType, Mode, Title};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};
use serde::Serialize;
use sweep_core::{Aggregated, ParamValue};
use typed_builder::TypedBuilder;

use crate::{keep_dims, Coords, PlotError, Scale};

/// A line plot of an aggregated scalar metric against one swept dimension, with one series per
/// value of an optional hue dimension. Every point carries its 95% confidence interval as a
/// symmetric error bar.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LinePlot {
    /// The dimension on the x axis.
    #[builder(setter(into))]
    x: String,
    /// Replaces the coordinates of the x dimension on the axis, one value per coordinate.
    #[builder(default, setter(strip_option))]
    x_values: Option<Vec<ParamValue>>,
    /// The dimension whose values become separate series.
    #[builder(default, setter(strip_option, into))]
    hue: Option<String>,
    #[builder(default, setter(strip_option, into))]
    title: Option<String>,
    #[builder(setter(into))]
    xlabel: String,
    #[builder(setter(into))]
    ylabel: String,
    /// The y range, `(low, high)`.
    #[builder(default)]
    ylim: Option<(f64, f64)>,
    #[builder(default)]
    xscale: Scale,
    #[builder(default)]
    yscale: Scale,
}

impl LinePlot {
    /// Renders `agg`, which must have the x dimension, the hue dimension if there is one, and no
    /// other dimension of size greater than one.
    pub fn render(&self, agg: &Aggregated) -> Result<Plot, PlotError> {
        let mut keep = vec![self.x.as_str()];
        keep.extend(self.hue.as_deref());
        let agg = keep_dims(agg, &keep)?;
        let dim = agg
            .dim(&self.x)
            .ok_or_else(|| PlotError::MissingDim(self.x.clone()))?;
        let x = match &self.x_values {
            Some(values) if values.len() != dim.len() => {
                return Err(PlotError::XValues {
                    dim: self.x.clone(),
                    expected: dim.len(),
                    got: values.len(),
                })
            }
            Some(values) => Coords::of(values),
            None => Coords::of(&dim.coords),
        };

        let mut plot = Plot::new();
        match &self.hue {
            Some(hue) => {
                let values = agg
                    .dim(hue)
                    .ok_or_else(|| PlotError::MissingDim(hue.clone()))?
                    .coords
                    .clone();
                for value in values {
                    let (mean, ci95) = agg.clone().select(hue, &value)?.series()?;
                    plot.add_trace(line(&x, mean, ci95, Some(format!("{hue}={value}"))));
                }
            }
            None => {
                let (mean, ci95) = agg.series()?;
                plot.add_trace(line(&x, mean, ci95, None));
            }
        }
        plot.set_layout(self.layout());
        Ok(plot)
    }

    fn layout(&self) -> Layout {
        let x_axis = Axis::new()
            .title(Title::with_text(&self.xlabel))
            .type_(self.xscale.into())
            .show_grid(true);
        let mut y_axis = Axis::new()
            .title(Title::with_text(&self.ylabel))
            .type_(self.yscale.into())
            .show_grid(true);
        if let Some((lo, hi)) = self.ylim {
            // Log axes take their range in decades.
            let range = match self.yscale {
                Scale::Linear => vec![lo, hi],
                Scale::Log => vec![lo.log10(), hi.log10()],
            };
            y_axis = y_axis.range(range);
        }
        let mut layout = Layout::new().x_axis(x_axis).y_axis(y_axis);
        if let Some(title) = &self.title {
            layout = layout.title(Title::with_text(title));
        }
        layout
    }
}

fn line(
    x: &Coords,
    mean: Vec<f64>,
    ci95: Vec<f64>,
    name: Option<String>,
) -> Box<dyn plotly::Trace> {
    match x {
        Coords::Numeric(x) => scatter(x.clone(), mean, ci95, name),
        Coords::Labels(x) => scatter(x.clone(), mean, ci95, name),
    }
}

fn scatter<X>(
    x: Vec<X>,
    mean: Vec<f64>,
    ci95: Vec<f64>,
    name: Option<String>,
) -> Box<dyn plotly::Trace>
where
    X: Serialize + Clone + 'static,
{
    let trace = Scatter::new(x, mean)
        .mode(Mode::LinesMarkers)
        .error_y(ErrorData::new(ErrorType::Data).array(ci95));
    match name {
        Some(name) => trace.name(&name),
        None => trace.show_legend(false),
    }
}

#[cfg(test)]
mod tests {
    use sweep_core::Dim;

    use super::*;
    use crate::testing::aggregated;

    fn thr() -> Aggregated {
        aggregated(
            vec![
                Dim::new("numStas".to_owned(), vec![2_i64.into(), 4_i64.into(), 8_i64.into()]),
                Dim::new("allocationPeriod".to_owned(), vec![0_i64.into(), 1_i64.into()]),
                Dim::new("phyMode".to_owned(), vec!["DMG_MCS4".into()]),
            ],
            vec![10.0, 11.0, 20.0, 21.0, 30.0, 31.0],
        )
    }

    #[test]
    fn one_trace_per_hue_value() -> anyhow::Result<()> {
        let plot = LinePlot::builder()
            .x("numStas")
            .hue("allocationPeriod")
            .xlabel("Number of STAs")
            .ylabel("Throughput [Mbps]")
            .ylim(Some((0.0, 100.0)))
            .build()
            .render(&thr())?;
        let json: serde_json::Value = serde_json::from_str(&plot.to_json())?;
        let traces = json["data"].as_array().unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0]["name"], "allocationPeriod=0");
        assert_eq!(traces[1]["name"], "allocationPeriod=1");
        assert_eq!(traces[0]["y"], serde_json::json!([10.0, 20.0, 30.0]));
        assert_eq!(traces[1]["y"], serde_json::json!([11.0, 21.0, 31.0]));
        assert_eq!(traces[0]["error_y"]["array"], serde_json::json!([0.0, 0.0, 0.0]));
        assert_eq!(json["layout"]["yaxis"]["range"], serde_json::json!([0.0, 100.0]));
        assert_eq!(json["layout"]["xaxis"]["title"]["text"], "Number of STAs");
        assert_eq!(json["layout"]["yaxis"]["title"]["text"], "Throughput [Mbps]");
        Ok(())
    }

    #[test]
    fn x_values_replace_coords() -> anyhow::Result<()> {
        let builder = || {
            LinePlot::builder()
                .x("numStas")
                .hue("allocationPeriod")
                .xlabel("STAs")
                .ylabel("Throughput [Mbps]")
        };
        let plot = builder()
            .x_values(vec!["two".into(), "four".into(), "eight".into()])
            .build()
            .render(&thr())?;
        let json: serde_json::Value = serde_json::from_str(&plot.to_json())?;
        assert_eq!(json["data"][1]["x"], serde_json::json!(["two", "four", "eight"]));
        let res = builder()
            .x_values(vec![1.0.into()])
            .build()
            .render(&thr());
        assert!(matches!(
            res,
            Err(PlotError::XValues { expected: 3, got: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn without_hue_needs_one_dim() {
        let res = LinePlot::builder()
            .x("numStas")
            .xlabel("Number of STAs")
            .ylabel("Throughput [Mbps]")
            .build()
            .render(&thr());
        assert!(matches!(
            res,
            Err(PlotError::ExtraDims(d)) if d == vec!["allocationPeriod".to_owned()]
        ));
    }

    #[test]
    fn log_range_is_in_decades() -> anyhow::Result<()> {
        let plot = LinePlot::builder()
            .x("numStas")
            .hue("allocationPeriod")
            .xlabel("Number of STAs")
            .ylabel("Delay [ms]")
            .ylim(Some((1.0, 100.0)))
            .xscale(Scale::Log)
            .yscale(Scale::Log)
            .build()
            .render(&thr())?;
        let json: serde_json::Value = serde_json::from_str(&plot.to_json())?;
        assert_eq!(json["layout"]["xaxis"]["type"], "log");
        assert_eq!(json["layout"]["yaxis"]["range"], serde_json::json!([0.0, 2.0]));
        Ok(())
    }
}
