//! Arithmetic over dynamic values.
//!
//! Every operation is total over the types admitted by construction-time
//! inference; what remains fallible at evaluation time is integer
//! overflow and shape drift between vector or matrix operands.  Integer
//! pairs stay integers (except division, which is true division and
//! always produces a float); mixed numeric pairs promote to float;
//! vectors and matrices combine elementwise.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::value::Value;

fn shape_err<T>(op: &str, a: usize, b: usize) -> Result<T> {
    Err(Error::ShapeMismatch(format!(
        "{op}: operand lengths {a} and {b} differ"
    )))
}

fn checked_int(op: &str, r: Option<i64>) -> Result<Value> {
    r.map(Value::Int)
        .ok_or_else(|| Error::Evaluation(format!("integer overflow in {op}")))
}

fn zip_vectors(
    op: &str,
    a: &Array1<f64>,
    b: &Array1<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if a.len() != b.len() {
        return shape_err(op, a.len(), b.len());
    }
    let mut out = a.clone();
    out.zip_mut_with(b, |x, &y| *x = f(*x, y));
    Ok(Value::Vector(out.into()))
}

fn zip_matrices(
    op: &str,
    a: &Array2<f64>,
    b: &Array2<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if a.dim() != b.dim() {
        return Err(Error::ShapeMismatch(format!(
            "{op}: operand shapes {:?} and {:?} differ",
            a.dim(),
            b.dim()
        )));
    }
    let mut out = a.clone();
    out.zip_mut_with(b, |x, &y| *x = f(*x, y));
    Ok(Value::Matrix(out.into()))
}

fn binop(
    op: &str,
    a: &Value,
    b: &Value,
    int_f: impl Fn(i64, i64) -> Option<i64>,
    float_f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => checked_int(op, int_f(*x, *y)),
        (Value::Vector(x), Value::Vector(y)) => zip_vectors(op, x, y, float_f),
        (Value::Matrix(x), Value::Matrix(y)) => zip_matrices(op, x, y, float_f),
        _ => Ok(Value::float(float_f(a.as_f64()?, b.as_f64()?))),
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value> {
    binop("add", a, b, i64::checked_add, |x, y| x + y)
}

pub fn sub(a: &Value, b: &Value) -> Result<Value> {
    binop("sub", a, b, i64::checked_sub, |x, y| x - y)
}

pub fn mul(a: &Value, b: &Value) -> Result<Value> {
    binop("mul", a, b, i64::checked_mul, |x, y| x * y)
}

/// True division: always float-valued, IEEE semantics for zero divisors.
pub fn div(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Vector(x), Value::Vector(y)) => zip_vectors("div", x, y, |x, y| x / y),
        (Value::Matrix(x), Value::Matrix(y)) => zip_matrices("div", x, y, |x, y| x / y),
        _ => Ok(Value::float(a.as_f64()? / b.as_f64()?)),
    }
}

pub fn min(a: &Value, b: &Value) -> Result<Value> {
    binop("min", a, b, |x, y| Some(x.min(y)), f64::min)
}

pub fn max(a: &Value, b: &Value) -> Result<Value> {
    binop("max", a, b, |x, y| Some(x.max(y)), f64::max)
}

fn map_unary(
    a: &Value,
    int_f: impl Fn(i64) -> Option<Value>,
    float_f: impl Fn(f64) -> f64,
) -> Result<Value> {
    match a {
        Value::Int(x) => {
            int_f(*x).ok_or_else(|| Error::Evaluation("integer overflow in unary map".to_owned()))
        }
        Value::Vector(v) => Ok(Value::Vector(v.mapv(float_f).into())),
        Value::Matrix(m) => Ok(Value::Matrix(m.mapv(float_f).into())),
        _ => Ok(Value::float(float_f(a.as_f64()?))),
    }
}

pub fn neg(a: &Value) -> Result<Value> {
    map_unary(a, |x| x.checked_neg().map(Value::Int), |x| -x)
}

pub fn abs(a: &Value) -> Result<Value> {
    map_unary(a, |x| x.checked_abs().map(Value::Int), f64::abs)
}

pub fn ln(a: &Value) -> Result<Value> {
    map_unary(a, |x| Some(Value::float((x as f64).ln())), f64::ln)
}

pub fn exp(a: &Value) -> Result<Value> {
    map_unary(a, |x| Some(Value::float((x as f64).exp())), f64::exp)
}

pub fn sqrt(a: &Value) -> Result<Value> {
    map_unary(a, |x| Some(Value::float((x as f64).sqrt())), f64::sqrt)
}

/// Scale a numeric or vector value by a float factor.
pub fn scale(a: &Value, factor: f64) -> Result<Value> {
    match a {
        Value::Vector(v) => Ok(Value::Vector(v.mapv(|x| x * factor).into())),
        Value::Matrix(m) => Ok(Value::Matrix(m.mapv(|x| x * factor).into())),
        _ => Ok(Value::float(a.as_f64()? * factor)),
    }
}

/// Pooled mean of two already-averaged groups of sizes `na` and `nb`.
pub fn weighted_mean(a: &Value, na: f64, b: &Value, nb: f64) -> Result<Value> {
    let n = na + nb;
    add(&scale(a, na / n)?, &scale(b, nb / n)?)
}

/// Outer product of two vectors, for cross-moment matrices.
pub fn outer(x: &Array1<f64>, y: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::zeros((x.len(), y.len()));
    for (i, &xi) in x.iter().enumerate() {
        for (j, &yj) in y.iter().enumerate() {
            out[(i, j)] = xi * yj;
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_pairs_stay_integers() {
        assert_eq!(add(&Value::Int(2), &Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(mul(&Value::Int(2), &Value::Int(3)).unwrap(), Value::Int(6));
        assert_eq!(
            div(&Value::Int(1), &Value::Int(2)).unwrap(),
            Value::float(0.5)
        );
    }

    #[test]
    fn mixed_pairs_promote() {
        assert_eq!(
            add(&Value::Int(2), &Value::float(0.5)).unwrap(),
            Value::float(2.5)
        );
    }

    #[test]
    fn overflow_is_an_evaluation_failure() {
        let r = add(&Value::Int(i64::MAX), &Value::Int(1));
        assert!(matches!(r, Err(Error::Evaluation(_))));
    }

    #[test]
    fn vector_shape_drift_rejected() {
        let a = Value::vector(vec![1.0, 2.0]);
        let b = Value::vector(vec![1.0, 2.0, 3.0]);
        assert!(matches!(add(&a, &b), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn elementwise_vectors() {
        let a = Value::vector(vec![1.0, 2.0]);
        let b = Value::vector(vec![10.0, 20.0]);
        assert_eq!(add(&a, &b).unwrap(), Value::vector(vec![11.0, 22.0]));
        assert_eq!(max(&a, &b).unwrap(), b);
    }

    #[test]
    fn pooled_mean() {
        let m = weighted_mean(&Value::float(2.0), 1.0, &Value::float(4.0), 1.0).unwrap();
        assert_eq!(m, Value::float(3.0));
        let m = weighted_mean(&Value::float(1.0), 3.0, &Value::float(5.0), 1.0).unwrap();
        assert_eq!(m, Value::float(2.0));
    }

    #[test]
    fn outer_product() {
        let x = Array1::from(vec![1.0, 2.0]);
        let y = Array1::from(vec![3.0, 4.0]);
        let o = outer(&x, &y);
        assert_eq!(o[(0, 0)], 3.0);
        assert_eq!(o[(1, 0)], 6.0);
        assert_eq!(o[(1, 1)], 8.0);
    }
}
