//! Parsing of delimited text artifacts into typed tables.
//!
//! The simulator writes every trace as a header line followed by one line per record, without
//! quoting. [`parse_table`] turns such a blob into a [`Table`] whose columns are either text or
//! numeric.

use std::collections::BTreeSet;

/// Which columns to convert from text to numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NumericCols {
    /// Every column.
    #[default]
    All,
    /// Only the named columns.
    Named(BTreeSet<String>),
}

impl NumericCols {
    /// Converts only the given columns.
    pub fn named<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        NumericCols::Named(names.into_iter().map(Into::into).collect())
    }

    fn contains(&self, name: &str) -> bool {
        match self {
            NumericCols::All => true,
            NumericCols::Named(names) => names.contains(name),
        }
    }
}

/// Options for [`parse_table`].
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ParseOpts {
    /// The column delimiter.
    #[builder(default = b',')]
    pub col_sep: u8,
    /// The row delimiter.
    #[builder(default = b'\n')]
    pub row_sep: u8,
    /// Explicit column names. If absent, the first row is the header.
    #[builder(default, setter(strip_option))]
    pub columns: Option<Vec<String>>,
    /// The columns to convert to numbers.
    #[builder(default)]
    pub numeric: NumericCols,
}

impl Default for ParseOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Unconverted text.
    Text(Vec<String>),
    /// Numeric values.
    Numeric(Vec<f64>),
}

impl Column {
    /// The number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    /// Whether the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rows of named columns parsed from one artifact.
///
/// INVARIANT: every column has `nr_rows` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    nr_rows: usize,
}

impl Table {
    /// A table with the given columns and no rows. Columns selected by `numeric` are numeric.
    pub fn empty(names: Vec<String>, numeric: &NumericCols) -> Self {
        let columns = names
            .iter()
            .map(|name| {
                if numeric.contains(name) {
                    Column::Numeric(Vec::new())
                } else {
                    Column::Text(Vec::new())
                }
            })
            .collect();
        Self {
            names,
            columns,
            nr_rows: 0,
        }
    }

    /// Column names, in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.nr_rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.nr_rows == 0
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| TableError::MissingColumn(name.to_owned()))
    }

    /// Looks up a numeric column by name.
    pub fn numeric(&self, name: &str) -> Result<&[f64], TableError> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Text(_) => Err(TableError::NotNumericColumn(name.to_owned())),
        }
    }

    /// Looks up a text column by name.
    pub fn text(&self, name: &str) -> Result<&[String], TableError> {
        match self.column(name)? {
            Column::Text(values) => Ok(values),
            Column::Numeric(_) => Err(TableError::NotTextColumn(name.to_owned())),
        }
    }

    /// Keeps the rows whose entry in `mask` is `true`.
    ///
    /// # Panics
    ///
    /// Panics if `mask` does not have one entry per row.
    pub fn filter_rows(&self, mask: &[bool]) -> Table {
        assert_eq!(mask.len(), self.nr_rows, "mask length must match row count");
        fn keep<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter_map(|(v, &m)| m.then(|| v.clone()))
                .collect()
        }
        let columns = self
            .columns
            .iter()
            .map(|c| match c {
                Column::Text(v) => Column::Text(keep(v, mask)),
                Column::Numeric(v) => Column::Numeric(keep(v, mask)),
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
            nr_rows: mask.iter().filter(|&&m| m).count(),
        }
    }

    /// Keeps the rows whose value in the numeric column `name` satisfies `pred`.
    pub fn filter_by(&self, name: &str, pred: impl Fn(f64) -> bool) -> Result<Table, TableError> {
        let mask = self.numeric(name)?.iter().map(|&v| pred(v)).collect::<Vec<_>>();
        Ok(self.filter_rows(&mask))
    }
}

/// Parses delimited text into a [`Table`].
///
/// Trailing row delimiters are ignored. Without explicit column names, the first row is the
/// header. A table is only populated if more than one data row remains; otherwise it has the
/// resolved columns and zero rows, so that header-only or single stray lines are never taken as
/// data.
///
/// This routine fails on ragged rows and on values that cannot be converted to numbers.
pub fn parse_table(text: &str, opts: &ParseOpts) -> Result<Table, TableError> {
    let mut data = text.as_bytes();
    while let [rest @ .., last] = data {
        if *last != opts.row_sep {
            break;
        }
        data = rest;
    }
    let explicit = opts.columns.clone();
    if data.is_empty() {
        return Ok(Table::empty(explicit.unwrap_or_default(), &opts.numeric));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(opts.col_sep)
        .terminator(csv::Terminator::Any(opts.row_sep))
        .quoting(false)
        .flexible(true)
        .from_reader(data);
    let mut rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let names = match explicit {
        Some(names) => names,
        None => match rows.next() {
            Some(header) => header.iter().map(str::to_owned).collect(),
            None => Vec::new(),
        },
    };
    let rows = rows.collect::<Vec<_>>();
    if rows.len() <= 1 {
        return Ok(Table::empty(names, &opts.numeric));
    }

    for (i, row) in rows.iter().enumerate() {
        if row.len() != names.len() {
            return Err(TableError::RaggedRow {
                row: i,
                expected: names.len(),
                got: row.len(),
            });
        }
    }
    if let NumericCols::Named(wanted) = &opts.numeric {
        if let Some(missing) = wanted.iter().find(|w| !names.contains(w)) {
            return Err(TableError::MissingColumn(missing.clone()));
        }
    }

    let columns = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values = rows.iter().map(|row| &row[j]);
            if !opts.numeric.contains(name) {
                return Ok(Column::Text(values.map(str::to_owned).collect()));
            }
            values
                .enumerate()
                .map(|(i, v)| {
                    v.trim().parse::<f64>().map_err(|_| TableError::NotNumeric {
                        column: name.clone(),
                        row: i,
                        value: v.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::Numeric)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table {
        names,
        columns,
        nr_rows: rows.len(),
    })
}

/// Errors produced by malformed artifacts.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A required column is absent.
    #[error("missing column `{0}`")]
    MissingColumn(String),

    /// A column that should be numeric holds text.
    #[error("column `{0}` is not numeric")]
    NotNumericColumn(String),

    /// A column that should hold text is numeric.
    #[error("column `{0}` is not a text column")]
    NotTextColumn(String),

    /// A value of a numeric column could not be converted.
    #[error("non-numeric value {value:?} in column `{column}` (data row {row})")]
    NotNumeric {
        /// The column name.
        column: String,
        /// The data row index.
        row: usize,
        /// The offending value.
        value: String,
    },

    /// A row has a different number of fields than the header.
    #[error("data row {row} has {got} fields, expected {expected}")]
    RaggedRow {
        /// The data row index.
        row: usize,
        /// The number of columns.
        expected: usize,
        /// The number of fields in the row.
        got: usize,
    },

    /// The delimited text could not be read.
    #[error("failed to read delimited text")]
    Csv(#[from] csv::Error),
}
