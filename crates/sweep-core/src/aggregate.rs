//! Metric arrays indexed by parameter values, and their reduction over repetitions.

use std::io;

use ndarray::{ArrayD, Axis};
use statrs::statistics::Statistics;

use crate::params::{Dim, ParamValue, RUNS_DIM};

/// The name of the dimension indexing the entries of a vector metric.
pub const METRICS_DIM: &str = "metrics";

/// The z-score of a two-sided 95% confidence interval.
const Z_95: f64 = 1.96;

/// Metric values with one named dimension per parameter.
///
/// INVARIANT: `dims[i].len() == data.shape()[i]` for every `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricArray {
    dims: Vec<Dim>,
    data: ArrayD<f64>,
}

impl MetricArray {
    /// Creates a new metric array, checking that the dimensions match the data.
    pub fn new(dims: Vec<Dim>, data: ArrayD<f64>) -> Result<Self, AggregateError> {
        check_shape(&dims, &data)?;
        Ok(Self { dims, data })
    }

    /// The dimensions, in axis order.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// The raw values.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Reduces the `runs` dimension to its mean and 95% confidence half-width,
    /// `1.96 * std / sqrt(runs)` with the population standard deviation.
    ///
    /// NaN values propagate: a combination with an undefined repetition has an undefined mean.
    pub fn reduce_runs(&self) -> Result<Aggregated, AggregateError> {
        let axis = axis_of(&self.dims, RUNS_DIM)?;
        let runs = self.dims[axis].len();
        let mean = self.data.map_axis(Axis(axis), |lane| lane.iter().mean());
        let ci95 = self.data.map_axis(Axis(axis), |lane| {
            Z_95 * lane.iter().population_std_dev() / (runs as f64).sqrt()
        });
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Aggregated {
            dims,
            mean,
            ci95,
            runs,
        })
    }
}

/// The mean and 95% confidence half-width of a metric over repetitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregated {
    dims: Vec<Dim>,
    mean: ArrayD<f64>,
    ci95: ArrayD<f64>,
    runs: usize,
}

impl Aggregated {
    /// The remaining dimensions, in axis order.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Looks up a dimension by name.
    pub fn dim(&self, name: &str) -> Option<&Dim> {
        self.dims.iter().find(|d| d.name == name)
    }

    /// Mean over repetitions.
    pub fn mean(&self) -> &ArrayD<f64> {
        &self.mean
    }

    /// 95% confidence half-width.
    pub fn ci95(&self) -> &ArrayD<f64> {
        &self.ci95
    }

    /// The number of repetitions reduced.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Drops every dimension of size one.
    pub fn squeeze(mut self) -> Self {
        for axis in (0..self.dims.len()).rev() {
            if self.dims[axis].len() == 1 {
                self.drop_axis(axis, 0);
            }
        }
        self
    }

    /// Keeps only the slice where dimension `name` equals `value`, dropping that dimension.
    pub fn select(mut self, name: &str, value: &ParamValue) -> Result<Self, AggregateError> {
        let axis = axis_of(&self.dims, name)?;
        let index = self.dims[axis]
            .position(value)
            .ok_or_else(|| AggregateError::UnknownCoord {
                dim: name.to_owned(),
                value: value.to_string(),
            })?;
        self.drop_axis(axis, index);
        Ok(self)
    }

    /// The means and half-widths of a one-dimensional aggregate.
    pub fn series(&self) -> Result<(Vec<f64>, Vec<f64>), AggregateError> {
        if self.dims.len() != 1 {
            return Err(AggregateError::NotOneDim(
                self.dims.iter().map(|d| d.name.clone()).collect(),
            ));
        }
        Ok((self.mean.iter().copied().collect(), self.ci95.iter().copied().collect()))
    }

    /// Writes the aggregate as CSV in long format: one column per dimension holding its
    /// coordinate, then `mean` and `ci95`, one row per element.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), AggregateError> {
        let mut wtr = csv::Writer::from_writer(writer);
        let header = self
            .dims
            .iter()
            .map(|d| d.name.as_str())
            .chain(["mean", "ci95"]);
        wtr.write_record(header)?;
        for ((idx, mean), ci95) in self.mean.indexed_iter().zip(self.ci95.iter()) {
            let mut record = self
                .dims
                .iter()
                .enumerate()
                .map(|(axis, dim)| dim.coords[idx[axis]].to_string())
                .collect::<Vec<_>>();
            record.push(mean.to_string());
            record.push(ci95.to_string());
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn drop_axis(&mut self, axis: usize, index: usize) {
        self.mean = self.mean.index_axis(Axis(axis), index).to_owned();
        self.ci95 = self.ci95.index_axis(Axis(axis), index).to_owned();
        self.dims.remove(axis);
    }
}

fn axis_of(dims: &[Dim], name: &str) -> Result<usize, AggregateError> {
    dims.iter()
        .position(|d| d.name == name)
        .ok_or_else(|| AggregateError::UnknownDim(name.to_owned()))
}

fn check_shape(dims: &[Dim], data: &ArrayD<f64>) -> Result<(), AggregateError> {
    let expected = dims.iter().map(Dim::len).collect::<Vec<_>>();
    if expected != data.shape() {
        return Err(AggregateError::Shape {
            expected,
            got: data.shape().to_vec(),
        });
    }
    Ok(())
}

/// Errors produced by metric arrays.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// No dimension has the given name.
    #[error("unknown dimension `{0}`")]
    UnknownDim(String),

    /// A dimension has no such coordinate.
    #[error("dimension `{dim}` has no coordinate {value}")]
    UnknownCoord {
        /// The dimension name.
        dim: String,
        /// The missing coordinate.
        value: String,
    },

    /// The dimensions do not match the shape of the data.
    #[error("dimensions of lengths {expected:?} do not match data of shape {got:?}")]
    Shape {
        /// Lengths of the dimensions.
        expected: Vec<usize>,
        /// Shape of the data.
        got: Vec<usize>,
    },

    /// A one-dimensional aggregate was expected.
    #[error("expected a single dimension, got {0:?}")]
    NotOneDim(Vec<String>),

    /// Error while writing CSV.
    #[error("failed to write CSV")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use ndarray::{array, IxDyn};

    use super::*;

    fn runs_dim(n: usize) -> Dim {
        Dim::new(RUNS_DIM.to_owned(), (0..n).map(ParamValue::from).collect())
    }

    fn array_2x5() -> MetricArray {
        let dims = vec![
            Dim::new("allocationPeriod".to_owned(), vec![0_i64.into(), 1_i64.into()]),
            runs_dim(5),
        ];
        let data = array![[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 2.0, f64::NAN, 2.0, 2.0]].into_dyn();
        MetricArray::new(dims, data).unwrap()
    }

    #[test]
    fn mismatched_shape_rejected() {
        let data = ArrayD::zeros(IxDyn(&[2, 4]));
        let dims = vec![Dim::new("x".to_owned(), vec![1_i64.into(), 2_i64.into()]), runs_dim(5)];
        assert!(matches!(
            MetricArray::new(dims, data),
            Err(AggregateError::Shape { .. })
        ));
    }

    #[test]
    fn mean_and_ci95() -> anyhow::Result<()> {
        let agg = array_2x5().reduce_runs()?;
        assert_eq!(agg.runs(), 5);
        assert_eq!(agg.dims().len(), 1);
        assert_eq!(agg.mean()[[0]], 3.0);
        let expected = 1.96 * 2.0_f64.sqrt() / 5.0_f64.sqrt();
        assert!((agg.ci95()[[0]] - expected).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn nan_propagates() -> anyhow::Result<()> {
        let agg = array_2x5().reduce_runs()?;
        assert!(agg.mean()[[1]].is_nan());
        assert!(agg.ci95()[[1]].is_nan());
        Ok(())
    }

    #[test]
    fn missing_runs_dim() {
        let dims = vec![Dim::new("x".to_owned(), vec![1_i64.into()])];
        let array = MetricArray::new(dims, ArrayD::zeros(IxDyn(&[1]))).unwrap();
        assert!(matches!(
            array.reduce_runs(),
            Err(AggregateError::UnknownDim(d)) if d == RUNS_DIM
        ));
    }

    #[test]
    fn squeeze_and_select() -> anyhow::Result<()> {
        let dims = vec![
            Dim::new("simulationTime".to_owned(), vec![10.0.into()]),
            Dim::new("numStas".to_owned(), vec![2_i64.into(), 4_i64.into()]),
            Dim::new("smartStart".to_owned(), vec![false.into(), true.into()]),
            runs_dim(1),
        ];
        let data = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 1]), vec![1.0, 2.0, 3.0, 4.0])?;
        let agg = MetricArray::new(dims, data)?.reduce_runs()?.squeeze();
        let names = agg.dims().iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["numStas", "smartStart"]);

        let (mean, ci95) = agg.clone().select("smartStart", &true.into())?.series()?;
        assert_eq!(mean, vec![2.0, 4.0]);
        assert_eq!(ci95, vec![0.0, 0.0]);

        assert!(matches!(
            agg.clone().select("smartStart", &ParamValue::from("maybe")),
            Err(AggregateError::UnknownCoord { .. })
        ));
        assert!(matches!(agg.series(), Err(AggregateError::NotOneDim(_))));
        Ok(())
    }

    #[test]
    fn csv_export() -> anyhow::Result<()> {
        let dims = vec![
            Dim::new("appRate".to_owned(), vec!["50Mbps".into(), "100Mbps".into()]),
            Dim::new("smartStart".to_owned(), vec![false.into(), true.into()]),
            runs_dim(2),
        ];
        let data = array![[[4.0, 4.0], [6.0, 6.0]], [[f64::NAN, 1.0], [0.5, 0.5]]].into_dyn();
        let agg = MetricArray::new(dims, data)?.reduce_runs()?;
        let mut buf = Vec::new();
        agg.write_csv(&mut buf)?;
        insta::assert_snapshot!(String::from_utf8(buf)?, @r###"
        appRate,smartStart,mean,ci95
        50Mbps,false,4,0
        50Mbps,true,6,0
        100Mbps,false,NaN,NaN
        100Mbps,true,0.5,0
        "###);
        Ok(())
    }
}
