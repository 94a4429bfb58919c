//! Dynamic knot values.
//!
//! Nodes in the graph are dynamically typed: every knot carries a
//! [`Value`], and each node reports the [`ValueType`] of the knots it
//! emits.  Type inference runs once, at node construction, so evaluation
//! never discovers a type error that construction could have caught;
//! only *shape* drift inside vector- and matrix-valued streams is left
//! to runtime.

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ndarray::{Array1, Array2};
use num::ToPrimitive;
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::time::Timestamp;

/// A single observed value.
///
/// Floats are wrapped in [`OrderedFloat`] so values can participate in
/// operator keys, which require `Eq + Hash`.  Vectors and matrices are
/// reference-counted: blocks and windows clone values freely.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Time(Timestamp),
    Vector(Arc<Array1<f64>>),
    Matrix(Arc<Array2<f64>>),
}

impl Value {
    pub fn float(x: f64) -> Self {
        Self::Float(OrderedFloat(x))
    }

    pub fn vector(xs: impl Into<Array1<f64>>) -> Self {
        Self::Vector(Arc::new(xs.into()))
    }

    pub fn matrix(m: Array2<f64>) -> Self {
        Self::Matrix(Arc::new(m))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Time(_) => ValueType::Time,
            Self::Vector(_) => ValueType::Vector,
            Self::Matrix(_) => ValueType::Matrix,
        }
    }

    /// Numeric view of the value, promoting integers.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Int(i) => i
                .to_f64()
                .ok_or_else(|| Error::Evaluation(format!("integer {i} not representable as f64"))),
            Self::Float(f) => Ok(f.into_inner()),
            other => Err(Error::TypeMismatch {
                expected: "numeric value",
                actual: other.value_type(),
            }),
        }
    }

    pub fn as_vector(&self) -> Result<&Array1<f64>> {
        match self {
            Self::Vector(v) => Ok(v),
            other => Err(Error::TypeMismatch {
                expected: "vector value",
                actual: other.value_type(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.hash(state),
            Self::Time(t) => t.hash(state),
            Self::Vector(v) => {
                v.len().hash(state);
                for x in v.iter() {
                    x.to_bits().hash(state);
                }
            }
            Self::Matrix(m) => {
                m.dim().hash(state);
                for x in m.iter() {
                    x.to_bits().hash(state);
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Vector(v) => write!(f, "{v}"),
            Self::Matrix(m) => write!(f, "{m}"),
        }
    }
}

/// The type of value a node emits, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Time,
    Vector,
    Matrix,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Result type of an arithmetic operation over two operands,
    /// promoting `Int` to `Float` when mixed.
    pub fn promote(self, other: Self) -> Result<Self> {
        match (self, other) {
            (Self::Int, Self::Int) => Ok(Self::Int),
            (a, b) if a.is_numeric() && b.is_numeric() => Ok(Self::Float),
            (Self::Vector, Self::Vector) => Ok(Self::Vector),
            (Self::Matrix, Self::Matrix) => Ok(Self::Matrix),
            (a, b) => Err(Error::TypeMismatch {
                expected: "matching numeric operands",
                actual: if a.is_numeric() || a == Self::Vector || a == Self::Matrix {
                    b
                } else {
                    a
                },
            }),
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Time => "time",
            Self::Vector => "vector",
            Self::Matrix => "matrix",
        };
        f.write_str(name)
    }
}
