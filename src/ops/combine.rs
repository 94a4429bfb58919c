//! Associative per-event data wrappers behind the statistical operators.
//!
//! Every statistic is expressed as a [`Combiner`]: a way to lift one
//! event into a `Data` summary, an associative merge of two summaries,
//! and an extraction of the summary into an output value.  The same
//! combiner then works unchanged in inception, fixed-count window and
//! time-window settings.
//!
//! The merge formulas are the pairwise (Chan et al.) generalisations of
//! Welford's updates, which stay numerically stable when summaries of
//! very different sizes are pooled.

use ndarray::{Array1, Array2};
use ordered_float::OrderedFloat;

use crate::algebra;
use crate::error::{Error, Result};
use crate::ops::traits::CombKey;
use crate::value::{Value, ValueType};

/// An associative statistic over per-event summaries.
pub trait Combiner: Send + Sync + Clone + 'static {
    type Data: Clone + Send + 'static;

    fn name(&self) -> &'static str;

    fn key(&self) -> CombKey;

    /// Number of values consumed per event: 1 for unary statistics,
    /// 2 for cross statistics such as covariance.
    fn arity(&self) -> usize {
        1
    }

    /// Construction-time output type inference.
    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType>;

    /// Lift one event into a summary.
    fn wrap(&self, xs: &[&Value]) -> Result<Self::Data>;

    /// Associative merge; `a` precedes `b` in event order.
    fn combine(&self, a: &Self::Data, b: &Self::Data) -> Result<Self::Data>;

    /// Map a summary to the emitted value.
    fn extract(&self, data: &Self::Data) -> Result<Value>;

    /// Per-step emission predicate; `true` means unfiltered.
    fn should_tick(&self, _data: &Self::Data) -> bool {
        true
    }
}

fn scalar_input(name: &'static str, inputs: &[ValueType]) -> Result<()> {
    for &t in inputs {
        if !t.is_numeric() {
            return Err(Error::TypeMismatch {
                expected: name,
                actual: t,
            });
        }
    }
    Ok(())
}

fn one_scalar(xs: &[&Value]) -> Result<f64> {
    xs[0].as_f64()
}

// ---------------------------------------------------------------- Sum

/// Running sum; identity wrap, `+` combine.
#[derive(Clone)]
pub struct Sum;

impl Combiner for Sum {
    type Data = Value;

    fn name(&self) -> &'static str {
        "sum"
    }

    fn key(&self) -> CombKey {
        CombKey::Sum
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        match inputs[0] {
            t @ (ValueType::Int | ValueType::Float | ValueType::Vector | ValueType::Matrix) => {
                Ok(t)
            }
            t => Err(Error::TypeMismatch {
                expected: "summable value",
                actual: t,
            }),
        }
    }

    fn wrap(&self, xs: &[&Value]) -> Result<Value> {
        Ok(xs[0].clone())
    }

    fn combine(&self, a: &Value, b: &Value) -> Result<Value> {
        algebra::add(a, b)
    }

    fn extract(&self, data: &Value) -> Result<Value> {
        Ok(data.clone())
    }
}

// --------------------------------------------------------------- Prod

/// Running product; identity wrap, `*` combine.
#[derive(Clone)]
pub struct Prod;

impl Combiner for Prod {
    type Data = Value;

    fn name(&self) -> &'static str {
        "prod"
    }

    fn key(&self) -> CombKey {
        CombKey::Prod
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        match inputs[0] {
            t @ (ValueType::Int | ValueType::Float | ValueType::Vector | ValueType::Matrix) => {
                Ok(t)
            }
            t => Err(Error::TypeMismatch {
                expected: "multipliable value",
                actual: t,
            }),
        }
    }

    fn wrap(&self, xs: &[&Value]) -> Result<Value> {
        Ok(xs[0].clone())
    }

    fn combine(&self, a: &Value, b: &Value) -> Result<Value> {
        algebra::mul(a, b)
    }

    fn extract(&self, data: &Value) -> Result<Value> {
        Ok(data.clone())
    }
}

// -------------------------------------------------------------- Count

/// Knot counter; ignores input values entirely.
#[derive(Clone)]
pub struct Count;

impl Combiner for Count {
    type Data = i64;

    fn name(&self) -> &'static str {
        "count"
    }

    fn key(&self) -> CombKey {
        CombKey::Count
    }

    fn output_type(&self, _inputs: &[ValueType]) -> Result<ValueType> {
        Ok(ValueType::Int)
    }

    fn wrap(&self, _xs: &[&Value]) -> Result<i64> {
        Ok(1)
    }

    fn combine(&self, a: &i64, b: &i64) -> Result<i64> {
        Ok(a + b)
    }

    fn extract(&self, data: &i64) -> Result<Value> {
        Ok(Value::Int(*data))
    }
}

// --------------------------------------------------------------- Mean

#[derive(Clone)]
pub struct MeanData {
    n: f64,
    mean: Value,
}

/// Running mean over scalars or vectors.
#[derive(Clone)]
pub struct Mean;

impl Combiner for Mean {
    type Data = MeanData;

    fn name(&self) -> &'static str {
        "mean"
    }

    fn key(&self) -> CombKey {
        CombKey::Mean
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        match inputs[0] {
            ValueType::Int | ValueType::Float => Ok(ValueType::Float),
            ValueType::Vector => Ok(ValueType::Vector),
            t => Err(Error::TypeMismatch {
                expected: "numeric or vector value",
                actual: t,
            }),
        }
    }

    fn wrap(&self, xs: &[&Value]) -> Result<MeanData> {
        let mean = match xs[0] {
            v @ Value::Vector(_) => v.clone(),
            other => Value::float(other.as_f64()?),
        };
        Ok(MeanData { n: 1.0, mean })
    }

    fn combine(&self, a: &MeanData, b: &MeanData) -> Result<MeanData> {
        Ok(MeanData {
            n: a.n + b.n,
            mean: algebra::weighted_mean(&a.mean, a.n, &b.mean, b.n)?,
        })
    }

    fn extract(&self, data: &MeanData) -> Result<Value> {
        Ok(data.mean.clone())
    }
}

// ---------------------------------------------------------------- Var

#[derive(Clone, Copy)]
pub struct VarData {
    n: f64,
    mean: f64,
    m2: f64,
}

/// Running variance (generalised Welford).  Ticks once two observations
/// have been seen.
#[derive(Clone)]
pub struct Var {
    pub corrected: bool,
}

impl Combiner for Var {
    type Data = VarData;

    fn name(&self) -> &'static str {
        "var"
    }

    fn key(&self) -> CombKey {
        CombKey::Var {
            corrected: self.corrected,
        }
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        scalar_input("numeric value", inputs)?;
        Ok(ValueType::Float)
    }

    fn wrap(&self, xs: &[&Value]) -> Result<VarData> {
        Ok(VarData {
            n: 1.0,
            mean: one_scalar(xs)?,
            m2: 0.0,
        })
    }

    fn combine(&self, a: &VarData, b: &VarData) -> Result<VarData> {
        let n = a.n + b.n;
        let delta = b.mean - a.mean;
        Ok(VarData {
            n,
            mean: a.mean + delta * b.n / n,
            m2: a.m2 + b.m2 + delta * delta * a.n * b.n / n,
        })
    }

    fn extract(&self, data: &VarData) -> Result<Value> {
        let denom = if self.corrected { data.n - 1.0 } else { data.n };
        Ok(Value::float(data.m2 / denom))
    }

    fn should_tick(&self, data: &VarData) -> bool {
        data.n > 1.0
    }
}

// ---------------------------------------------------------------- Cov

#[derive(Clone, Copy)]
pub struct CovData {
    n: f64,
    mean_x: f64,
    mean_y: f64,
    c: f64,
}

/// Running covariance of an aligned pair of scalar streams.
///
/// The cross-moment merge is the symmetric pairwise form
/// `c = ca + cb + δx·δy·na·nb/n`, which equals the one-sided
/// `ca + cb + nb·(μxb − μxa)·(μyb − μy)` update after substituting the
/// pooled mean.
#[derive(Clone)]
pub struct Cov {
    pub corrected: bool,
}

impl Combiner for Cov {
    type Data = CovData;

    fn name(&self) -> &'static str {
        "cov"
    }

    fn key(&self) -> CombKey {
        CombKey::Cov {
            corrected: self.corrected,
        }
    }

    fn arity(&self) -> usize {
        2
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        scalar_input("numeric value", inputs)?;
        Ok(ValueType::Float)
    }

    fn wrap(&self, xs: &[&Value]) -> Result<CovData> {
        Ok(CovData {
            n: 1.0,
            mean_x: xs[0].as_f64()?,
            mean_y: xs[1].as_f64()?,
            c: 0.0,
        })
    }

    fn combine(&self, a: &CovData, b: &CovData) -> Result<CovData> {
        let n = a.n + b.n;
        let dx = b.mean_x - a.mean_x;
        let dy = b.mean_y - a.mean_y;
        Ok(CovData {
            n,
            mean_x: a.mean_x + dx * b.n / n,
            mean_y: a.mean_y + dy * b.n / n,
            c: a.c + b.c + dx * dy * a.n * b.n / n,
        })
    }

    fn extract(&self, data: &CovData) -> Result<Value> {
        let denom = if self.corrected { data.n - 1.0 } else { data.n };
        Ok(Value::float(data.c / denom))
    }

    fn should_tick(&self, data: &CovData) -> bool {
        data.n > 1.0
    }
}

// --------------------------------------------------------- CovMatrix

#[derive(Clone)]
pub struct CovMatrixData {
    n: f64,
    mean: Array1<f64>,
    c: Array2<f64>,
}

/// Running covariance matrix of a vector-valued stream.
///
/// With `dim: None` the dimension is pinned by the first event; a fixed
/// `dim` is enforced from the first event on.  Drift either way is a
/// shape error.
#[derive(Clone)]
pub struct CovMatrix {
    pub corrected: bool,
    pub dim: Option<usize>,
}

impl Combiner for CovMatrix {
    type Data = CovMatrixData;

    fn name(&self) -> &'static str {
        "cov_matrix"
    }

    fn key(&self) -> CombKey {
        CombKey::CovMatrix {
            corrected: self.corrected,
            dim: self.dim,
        }
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        match inputs[0] {
            ValueType::Vector => Ok(ValueType::Matrix),
            t => Err(Error::TypeMismatch {
                expected: "vector value",
                actual: t,
            }),
        }
    }

    fn wrap(&self, xs: &[&Value]) -> Result<CovMatrixData> {
        let x = xs[0].as_vector()?;
        let d = x.len();
        if let Some(expected) = self.dim {
            if d != expected {
                return Err(Error::ShapeMismatch(format!(
                    "cov_matrix expects dimension {expected}, got {d}"
                )));
            }
        }
        Ok(CovMatrixData {
            n: 1.0,
            mean: x.clone(),
            c: Array2::zeros((d, d)),
        })
    }

    fn combine(&self, a: &CovMatrixData, b: &CovMatrixData) -> Result<CovMatrixData> {
        if a.mean.len() != b.mean.len() {
            return Err(Error::ShapeMismatch(format!(
                "cov_matrix input dimension changed from {} to {}",
                a.mean.len(),
                b.mean.len()
            )));
        }
        let n = a.n + b.n;
        let delta = &b.mean - &a.mean;
        Ok(CovMatrixData {
            n,
            mean: &a.mean + &(&delta * (b.n / n)),
            c: &a.c + &b.c + &(algebra::outer(&delta, &delta) * (a.n * b.n / n)),
        })
    }

    fn extract(&self, data: &CovMatrixData) -> Result<Value> {
        let denom = if self.corrected { data.n - 1.0 } else { data.n };
        Ok(Value::matrix(&data.c / denom))
    }

    fn should_tick(&self, data: &CovMatrixData) -> bool {
        data.n > 1.0
    }
}

// ---------------------------------------------------------------- Ema

#[derive(Clone, Copy)]
pub struct EmaData {
    weighted_sum: f64,
    weighted_count: f64,
    events: u32,
}

/// Bias-corrected exponential moving average.
///
/// Per event, `weighted_sum := x + (1-α)·weighted_sum` and
/// `weighted_count := 1 + (1-α)·weighted_count`; the emitted value is
/// their ratio.  The merge decays the older summary by `(1-α)` per
/// event in the newer one, which keeps the fold associative, but the
/// statistic is not *window*-associative (removal is undefined), so it
/// is only offered from inception.
#[derive(Clone)]
pub struct Ema {
    alpha: f64,
}

impl Ema {
    /// Smoothing factor `alpha`, validated to lie strictly in (0, 1).
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Error::invalid(format!("ema alpha must lie in (0, 1), got {alpha}"));
        }
        Ok(Self { alpha })
    }

    /// Effective window length `w_eff > 1`, mapped to
    /// `alpha = 2 / (w_eff + 1)`.
    pub fn with_effective_window(w_eff: f64) -> Result<Self> {
        if !(w_eff > 1.0) {
            return Error::invalid(format!(
                "ema effective window must exceed 1, got {w_eff}"
            ));
        }
        Self::new(2.0 / (w_eff + 1.0))
    }
}

impl Combiner for Ema {
    type Data = EmaData;

    fn name(&self) -> &'static str {
        "ema"
    }

    fn key(&self) -> CombKey {
        CombKey::Ema {
            alpha: OrderedFloat(self.alpha),
        }
    }

    fn output_type(&self, inputs: &[ValueType]) -> Result<ValueType> {
        scalar_input("numeric value", inputs)?;
        Ok(ValueType::Float)
    }

    fn wrap(&self, xs: &[&Value]) -> Result<EmaData> {
        Ok(EmaData {
            weighted_sum: one_scalar(xs)?,
            weighted_count: 1.0,
            events: 1,
        })
    }

    fn combine(&self, a: &EmaData, b: &EmaData) -> Result<EmaData> {
        let decay = (1.0 - self.alpha).powi(b.events as i32);
        Ok(EmaData {
            weighted_sum: b.weighted_sum + decay * a.weighted_sum,
            weighted_count: b.weighted_count + decay * a.weighted_count,
            events: a.events + b.events,
        })
    }

    fn extract(&self, data: &EmaData) -> Result<Value> {
        Ok(Value::float(data.weighted_sum / data.weighted_count))
    }
}
