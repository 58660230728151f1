//! Decoded simulation results.
//!
//! A run produces two containers keyed identically by plot name and then by
//! vector name: one holding the data, one holding the unit/type tags. Both
//! keep the order in which the engine enumerated them.

use std::ops::Index;

use indexmap::IndexMap;
use num_complex::Complex64;

use crate::decode::DecodeError;
use crate::units::VectorType;

/// Data of one result vector.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorData {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl VectorData {
    pub fn len(&self) -> usize {
        match self {
            VectorData::Real(v) => v.len(),
            VectorData::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, VectorData::Complex(_))
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            VectorData::Real(v) => Some(v),
            VectorData::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&[Complex64]> {
        match self {
            VectorData::Complex(v) => Some(v),
            VectorData::Real(_) => None,
        }
    }

    /// Widen to complex values; real data gets a zero imaginary part.
    pub fn to_complex(&self) -> Vec<Complex64> {
        match self {
            VectorData::Real(v) => v.iter().map(|&re| Complex64::new(re, 0.0)).collect(),
            VectorData::Complex(v) => v.clone(),
        }
    }

    /// First element as a scalar, the usual shape of operating point results.
    pub fn scalar(&self) -> Option<Complex64> {
        match self {
            VectorData::Real(v) => v.first().map(|&re| Complex64::new(re, 0.0)),
            VectorData::Complex(v) => v.first().copied(),
        }
    }
}

/// One named plot: vector name -> `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot<T> {
    vectors: IndexMap<String, T>,
}

impl<T> Default for Plot<T> {
    fn default() -> Self {
        Self {
            vectors: IndexMap::new(),
        }
    }
}

impl<T> Plot<T> {
    pub fn get(&self, vector: &str) -> Option<&T> {
        self.vectors.get(vector)
    }

    pub fn contains(&self, vector: &str) -> bool {
        self.vectors.contains_key(vector)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub(crate) fn insert(&mut self, vector: String, value: T) {
        self.vectors.insert(vector, value);
    }
}

impl Plot<VectorData> {
    /// Real data of `vector`, if present and real.
    pub fn real(&self, vector: &str) -> Option<&[f64]> {
        self.get(vector).and_then(VectorData::as_real)
    }

    /// Complex data of `vector`, if present and complex.
    pub fn complex(&self, vector: &str) -> Option<&[Complex64]> {
        self.get(vector).and_then(VectorData::as_complex)
    }
}

impl<T> Index<&str> for Plot<T> {
    type Output = T;

    fn index(&self, vector: &str) -> &T {
        match self.vectors.get(vector) {
            Some(v) => v,
            None => panic!("no vector named '{}' in plot", vector),
        }
    }
}

/// Plot name -> [`Plot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    plots: IndexMap<String, Plot<T>>,
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self {
            plots: IndexMap::new(),
        }
    }
}

impl<T> Dataset<T> {
    pub fn plot(&self, name: &str) -> Option<&Plot<T>> {
        self.plots.get(name)
    }

    /// Shorthand for `plot(plot).and_then(|p| p.get(vector))`.
    pub fn get(&self, plot: &str, vector: &str) -> Option<&T> {
        self.plot(plot).and_then(|p| p.get(vector))
    }

    pub fn plot_names(&self) -> impl Iterator<Item = &str> {
        self.plots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Plot<T>)> {
        self.plots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    /// Get or create the named plot.
    pub(crate) fn plot_mut(&mut self, name: &str) -> &mut Plot<T> {
        self.plots.entry(name.to_string()).or_default()
    }
}

impl<T> Index<&str> for Dataset<T> {
    type Output = Plot<T>;

    fn index(&self, plot: &str) -> &Plot<T> {
        match self.plots.get(plot) {
            Some(p) => p,
            None => panic!("no plot named '{}'", plot),
        }
    }
}

/// A vector the decoder could not read.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedVector {
    pub plot: String,
    pub vector: String,
    pub reason: DecodeError,
}

/// Everything decoded from the engine after a run.
#[derive(Debug, Clone, Default)]
pub struct Results {
    /// Vector values.
    pub data: Dataset<VectorData>,
    /// Unit/type tags, keyed like `data`.
    pub units: Dataset<VectorType>,
    /// Vectors left out because their metadata could not be decoded.
    pub skipped: Vec<SkippedVector>,
}

impl Results {
    pub fn into_parts(self) -> (Dataset<VectorData>, Dataset<VectorType>) {
        (self.data, self.units)
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
