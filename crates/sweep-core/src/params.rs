//! This module defines parameter spaces ([`ParamSpace`]), which describe the parameter
//! combinations explored by a campaign, and parameter assignments ([`ParamAssignment`]), the
//! concrete values a single simulation runs with.

use std::fmt;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// The name of the dimension indexing repetitions of the same parameter assignment.
pub const RUNS_DIM: &str = "runs";

/// The simulator parameter selecting the random stream of a repetition.
pub const RNG_RUN: &str = "RngRun";

/// A single simulation parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean flag.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(OrderedFloat<f64>),
    /// A string, e.g. an ns-3 type name or a data rate.
    Str(String),
}

impl ParamValue {
    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Int(i) => Some(i as f64),
            ParamValue::Float(f) => Some(f.into_inner()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{}", x.into_inner()),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<usize> for ParamValue {
    fn from(i: usize) -> Self {
        ParamValue::Int(i as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(OrderedFloat(x))
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

/// A parameter in a [`ParamSpace`]: either fixed to one value or swept over several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamEntry {
    /// The parameter is swept over all listed values.
    List(Vec<ParamValue>),
    /// The parameter is fixed.
    Single(ParamValue),
}

impl ParamEntry {
    /// A fixed parameter.
    pub fn single(value: impl Into<ParamValue>) -> Self {
        ParamEntry::Single(value.into())
    }

    /// A swept parameter.
    pub fn list<T: Into<ParamValue>>(values: impl IntoIterator<Item = T>) -> Self {
        ParamEntry::List(values.into_iter().map(Into::into).collect())
    }

    /// The candidate values of this parameter, in order.
    pub fn values(&self) -> &[ParamValue] {
        match self {
            ParamEntry::List(values) => values,
            ParamEntry::Single(value) => std::slice::from_ref(value),
        }
    }
}

/// A named dimension of a parameter space or metric array, together with its coordinates.
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct Dim {
    /// The dimension name.
    pub name: String,
    /// The coordinate of each index along the dimension.
    pub coords: Vec<ParamValue>,
}

impl Dim {
    /// The number of coordinates.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the dimension has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Returns the index of `value`, if it is a coordinate of this dimension.
    pub fn position(&self, value: &ParamValue) -> Option<usize> {
        self.coords.iter().position(|c| c == value)
    }
}

/// An ordered mapping from parameter names to fixed or swept values. The cartesian product of
/// all entries is the set of parameter assignments a campaign explores.
///
/// Parameter names are unique. The declaration order is kept so that enumeration is
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSpace {
    entries: Vec<(String, ParamEntry)>,
}

impl ParamSpace {
    /// Creates an empty parameter space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a parameter space from `(name, entry)` pairs, rejecting duplicate names.
    pub fn from_entries<S: Into<String>>(
        entries: impl IntoIterator<Item = (S, ParamEntry)>,
    ) -> Result<Self, ParamError> {
        let mut space = Self::new();
        for (name, entry) in entries {
            space.push(name, entry)?;
        }
        Ok(space)
    }

    /// Appends a parameter.
    pub fn push(&mut self, name: impl Into<String>, entry: ParamEntry) -> Result<(), ParamError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ParamError::DuplicateName(name));
        }
        self.entries.push((name, entry));
        Ok(())
    }

    /// Replaces the entry of an existing parameter, keeping its position.
    pub fn set(&mut self, name: &str, entry: ParamEntry) -> Result<(), ParamError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ParamError::UnknownName(name.to_owned()))?;
        slot.1 = entry;
        Ok(())
    }

    /// Returns the entry of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamEntry> {
        self.entries
            .iter()
            .find_map(|(n, e)| (n == name).then_some(e))
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    delegate::delegate! {
        to self.entries {
            /// The number of parameters.
            pub fn len(&self) -> usize;

            /// Whether the space has no parameters.
            pub fn is_empty(&self) -> bool;

            /// Iterates over `(name, entry)` pairs in declaration order.
            pub fn iter(&self) -> std::slice::Iter<'_, (String, ParamEntry)>;
        }
    }

    /// One dimension per parameter, in declaration order. Fixed parameters form dimensions of
    /// size 1.
    pub fn dims(&self) -> Vec<Dim> {
        self.entries
            .iter()
            .map(|(name, entry)| Dim::new(name.clone(), entry.values().to_vec()))
            .collect()
    }

    /// The number of parameter assignments in the space.
    pub fn nr_assignments(&self) -> usize {
        self.entries.iter().map(|(_, e)| e.values().len()).product()
    }

    /// Enumerates the cartesian product of all entries in row-major order (the last declared
    /// parameter varies fastest).
    pub fn assignments(&self) -> Vec<ParamAssignment> {
        if self.entries.is_empty() {
            return vec![ParamAssignment::default()];
        }
        self.entries
            .iter()
            .map(|(_, entry)| entry.values().iter().cloned())
            .multi_cartesian_product()
            .map(|values| {
                let pairs = self
                    .entries
                    .iter()
                    .map(|(name, _)| name.clone())
                    .zip(values)
                    .collect();
                ParamAssignment { pairs }
            })
            .collect()
    }
}

impl Serialize for ParamSpace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamSpace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpaceVisitor;

        impl<'de> Visitor<'de> for SpaceVisitor {
            type Value = ParamSpace;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from parameter names to values or lists of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut space = ParamSpace::new();
                while let Some((name, entry)) = access.next_entry::<String, ParamEntry>()? {
                    space.push(name, entry).map_err(serde::de::Error::custom)?;
                }
                Ok(space)
            }
        }

        deserializer.deserialize_map(SpaceVisitor)
    }
}

/// The concrete parameter values of one simulation, in the order of the space it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParamAssignment {
    pairs: Vec<(String, ParamValue)>,
}

impl ParamAssignment {
    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.pairs
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Returns a copy with `name` set to `value`, replacing an existing value in place or
    /// appending otherwise.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        let value = value.into();
        match self.pairs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((name.to_owned(), value)),
        }
        self
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ParamError> {
        self.get(name)
            .ok_or_else(|| ParamError::Missing(name.to_owned()))
    }

    fn wrong_type(name: &str, expected: &'static str, got: &ParamValue) -> ParamError {
        ParamError::WrongType {
            name: name.to_owned(),
            expected,
            got: got.kind(),
        }
    }

    /// Reads an integer parameter.
    pub fn int(&self, name: &str) -> Result<i64, ParamError> {
        match self.require(name)? {
            ParamValue::Int(i) => Ok(*i),
            other => Err(Self::wrong_type(name, "int", other)),
        }
    }

    /// Reads a non-negative integer parameter.
    pub fn count(&self, name: &str) -> Result<usize, ParamError> {
        let value = self.int(name)?;
        usize::try_from(value).map_err(|_| ParamError::Negative {
            name: name.to_owned(),
            value,
        })
    }

    /// Reads a numeric parameter. Integers are widened.
    pub fn float(&self, name: &str) -> Result<f64, ParamError> {
        let value = self.require(name)?;
        value
            .as_f64()
            .ok_or_else(|| Self::wrong_type(name, "float", value))
    }

    /// Reads a string parameter.
    pub fn str(&self, name: &str) -> Result<&str, ParamError> {
        match self.require(name)? {
            ParamValue::Str(s) => Ok(s),
            other => Err(Self::wrong_type(name, "string", other)),
        }
    }

    /// Reads a boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool, ParamError> {
        match self.require(name)? {
            ParamValue::Bool(b) => Ok(*b),
            other => Err(Self::wrong_type(name, "bool", other)),
        }
    }
}

impl fmt::Display for ParamAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.pairs.iter().map(|(n, v)| format!("{n}={v}")).join(", ");
        write!(f, "{{{s}}}")
    }
}

impl FromIterator<(String, ParamValue)> for ParamAssignment {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |acc, (n, v)| acc.with(&n, v))
    }
}

impl Serialize for ParamAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (name, value) in &self.pairs {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParamAssignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AssignmentVisitor;

        impl<'de> Visitor<'de> for AssignmentVisitor {
            type Value = ParamAssignment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::new();
                while let Some(pair) = access.next_entry::<String, ParamValue>()? {
                    pairs.push(pair);
                }
                Ok(pairs.into_iter().collect())
            }
        }

        deserializer.deserialize_map(AssignmentVisitor)
    }
}

/// Parameter space and parameter lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// A parameter was declared twice.
    #[error("duplicate parameter `{0}`")]
    DuplicateName(String),

    /// A parameter to be replaced does not exist.
    #[error("unknown parameter `{0}`")]
    UnknownName(String),

    /// A parameter required by a computation is not part of the assignment.
    #[error("missing parameter `{0}`")]
    Missing(String),

    /// A parameter has an unexpected type.
    #[error("parameter `{name}` should be of type {expected}, got {got}")]
    WrongType {
        /// The parameter name.
        name: String,
        /// The expected type.
        expected: &'static str,
        /// The actual type.
        got: &'static str,
    },

    /// A count parameter is negative.
    #[error("parameter `{name}` must be non-negative, got {value}")]
    Negative {
        /// The parameter name.
        name: String,
        /// The offending value.
        value: i64,
    },
}
