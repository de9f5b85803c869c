//! This crate renders [aggregated metrics](sweep_core::Aggregated) as line and grouped bar
//! charts. Every chart is written as an HTML page together with a JSON description of the chart.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use plotly::layout::AxisType;
use plotly::Plot;
use sweep_core::{AggregateError, Aggregated, ParamValue};

pub mod bar;
pub mod line;

pub use crate::bar::{bar_groups, group_dim, BarPlot, BarSeries};
pub use crate::line::LinePlot;

/// The scale of an axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Linear scale.
    #[default]
    Linear,
    /// Logarithmic scale.
    Log,
}

impl From<Scale> for AxisType {
    fn from(scale: Scale) -> Self {
        match scale {
            Scale::Linear => AxisType::Linear,
            Scale::Log => AxisType::Log,
        }
    }
}

/// Writes `<dir>/<name>.html` and the chart description `<dir>/<name>.json`, returning the path
/// of the HTML file.
pub fn write_plot(plot: &Plot, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf, PlotError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let html = dir.join(format!("{name}.html"));
    log::debug!("Writing {}", html.display());
    plot.write_html(&html);
    fs::write(dir.join(format!("{name}.json")), plot.to_json())?;
    Ok(html)
}

/// Writes the aggregate as CSV to `<dir>/<name>.csv`.
pub fn write_table(agg: &Aggregated, dir: impl AsRef<Path>, name: &str) -> Result<(), PlotError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let file = fs::File::create(dir.join(format!("{name}.csv")))?;
    agg.write_csv(file)?;
    Ok(())
}

/// Fixes every dimension of size one that is not in `keep`, and checks that exactly the `keep`
/// dimensions remain.
fn keep_dims(agg: &Aggregated, keep: &[&str]) -> Result<Aggregated, PlotError> {
    let mut out = agg.clone();
    let mut extra = Vec::new();
    for dim in agg.dims() {
        if keep.contains(&dim.name.as_str()) {
            continue;
        }
        match dim.coords.as_slice() {
            [only] => out = out.select(&dim.name, only)?,
            _ => extra.push(dim.name.clone()),
        }
    }
    if !extra.is_empty() {
        return Err(PlotError::ExtraDims(extra));
    }
    if let Some(missing) = keep.iter().find(|&&k| out.dim(k).is_none()) {
        return Err(PlotError::MissingDim((*missing).to_owned()));
    }
    Ok(out)
}

/// Coordinates of a dimension as plot coordinates.
#[derive(Debug, Clone, PartialEq)]
enum Coords {
    Numeric(Vec<f64>),
    Labels(Vec<String>),
}

impl Coords {
    fn of(values: &[ParamValue]) -> Self {
        match values.iter().map(ParamValue::as_f64).collect() {
            Some(numbers) => Coords::Numeric(numbers),
            None => Coords::Labels(values.iter().map(ToString::to_string).collect()),
        }
    }
}

/// Errors produced while rendering plots.
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    /// The aggregate lacks a dimension the plot needs.
    #[error("missing dimension `{0}`")]
    MissingDim(String),

    /// The aggregate has swept dimensions the plot cannot show.
    #[error("cannot plot over dimensions {0:?}")]
    ExtraDims(Vec<String>),

    /// A bar plot needs exactly one dimension to group by.
    #[error("expected exactly one group dimension, got {0:?}")]
    GroupDims(Vec<String>),

    /// A series does not have one value per tick.
    #[error("series `{name}` has {got} values for {expected} ticks")]
    SeriesLength {
        /// The series name.
        name: String,
        /// The number of ticks.
        expected: usize,
        /// The number of values.
        got: usize,
    },

    /// Replacement x values do not match the x dimension.
    #[error("{got} x values for dimension `{dim}` of length {expected}")]
    XValues {
        /// The x dimension.
        dim: String,
        /// The length of the dimension.
        expected: usize,
        /// The number of replacement values.
        got: usize,
    },

    /// The aggregate could not be sliced or exported.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}


#[cfg(test)]
mod tests {
    use sweep_core::Dim;

    use super::*;
    use crate::testing::aggregated;

    #[test]
    fn singletons_are_fixed() -> anyhow::Result<()> {
        let agg = aggregated(
            vec![
                Dim::new("numStas".to_owned(), vec![4_i64.into()]),
                Dim::new("mcs".to_owned(), vec!["DMG_MCS1".into(), "DMG_MCS4".into()]),
            ],
            vec![1.0, 2.0],
        );
        let kept = keep_dims(&agg, &["mcs"])?;
        assert_eq!(kept.dims().len(), 1);
        assert!(matches!(
            keep_dims(&agg, &["numStas"]),
            Err(PlotError::ExtraDims(d)) if d == vec!["mcs".to_owned()]
        ));
        assert!(matches!(
            keep_dims(&agg, &["mcs", "smartStart"]),
            Err(PlotError::MissingDim(_))
        ));
        Ok(())
    }

    #[test]
    fn coords_prefer_numbers() {
        assert_eq!(
            Coords::of(&[ParamValue::from(1_i64), ParamValue::from(2.5)]),
            Coords::Numeric(vec![1.0, 2.5])
        );
        assert_eq!(
            Coords::of(&[ParamValue::from(true), ParamValue::from(false)]),
            Coords::Labels(vec!["true".to_owned(), "false".to_owned()])
        );
    }

    #[test]
    fn writes_html_json_and_csv() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let agg = aggregated(
            vec![Dim::new("numStas".to_owned(), vec![2_i64.into(), 4_i64.into()])],
            vec![1.0, 2.0],
        );
        let plot = LinePlot::builder()
            .x("numStas")
            .xlabel("Number of STAs")
            .ylabel("Throughput [Mbps]")
            .build()
            .render(&agg)?;
        let html = write_plot(&plot, dir.path().join("img"), "thr")?;
        write_table(&agg, dir.path().join("img"), "thr")?;
        assert!(html.ends_with("img/thr.html"));
        assert!(html.exists());
        let json = fs::read_to_string(dir.path().join("img/thr.json"))?;
        assert!(json.contains("Throughput [Mbps]"));
        let csv = fs::read_to_string(dir.path().join("img/thr.csv"))?;
        insta::assert_snapshot!(csv, @r###"
        numStas,mean,ci95
        2,1,0
        4,2,0
        "###);
        Ok(())
    }
}
