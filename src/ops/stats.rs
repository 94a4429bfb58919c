//! User-facing statistics constructors.
//!
//! Each statistic is one combiner wired into the inception, fixed-count
//! window or time-window operator.  Constructors fold or reject constant
//! inputs up front: the running sum, product or mean of a constant *is*
//! that constant, while dispersion statistics over only-constant inputs
//! are meaningless and fail loudly.

use std::sync::Arc;

use crate::align::Alignment;
use crate::error::{Error, Result};
use crate::graph::{obtain_node, Node};
use crate::ops::arith::{binary, BinaryFunc};
use crate::ops::combine::{Combiner, Cov, CovMatrix, Ema, Mean, Prod, Sum, Var};
use crate::ops::inception::Inception;
use crate::ops::schedule::coalign;
use crate::ops::twindow::TimeWindow;
use crate::ops::window::Window;
use crate::time::Duration;

fn inception<C: Combiner>(parents: Vec<Node>, comb: C) -> Result<Node> {
    obtain_node(parents, Arc::new(Inception::new(comb)))
}

fn window<C: Combiner>(parents: Vec<Node>, comb: C, len: usize, emit_early: bool) -> Result<Node> {
    obtain_node(parents, Arc::new(Window::new(comb, len, emit_early)))
}

fn twindow<C: Combiner>(
    parents: Vec<Node>,
    comb: C,
    span: Duration,
    emit_early: bool,
) -> Result<Node> {
    if !span.is_positive() {
        return Error::invalid(format!("time window span must be positive, got {span}"));
    }
    obtain_node(parents, Arc::new(TimeWindow::new(comb, span, emit_early)))
}

fn reject_constant(x: &Node, what: &str) -> Result<()> {
    if x.constant_value().is_some() {
        return Error::invalid(format!("{what} of a constant is undefined"));
    }
    Ok(())
}

// ---------------------------------------------------------- inception

/// Running sum of `x`.  The sum of a constant is the constant.
pub fn sum(x: &Node) -> Result<Node> {
    if x.constant_value().is_some() {
        return Ok(x.clone());
    }
    inception(vec![x.clone()], Sum)
}

/// Running product of `x`.  The product of a constant is the constant.
pub fn prod(x: &Node) -> Result<Node> {
    if x.constant_value().is_some() {
        return Ok(x.clone());
    }
    inception(vec![x.clone()], Prod)
}

/// Running mean of `x`.  The mean of a constant is the constant.
pub fn mean(x: &Node) -> Result<Node> {
    if x.constant_value().is_some() {
        return Ok(x.clone());
    }
    inception(vec![x.clone()], Mean)
}

/// Running variance of `x`; first tick after two observations.
pub fn var(x: &Node, corrected: bool) -> Result<Node> {
    reject_constant(x, "variance")?;
    inception(vec![x.clone()], Var { corrected })
}

/// Running standard deviation of `x`.
pub fn std(x: &Node, corrected: bool) -> Result<Node> {
    var(x, corrected)?.sqrt()
}

/// Bias-corrected exponential moving average with smoothing `alpha`.
pub fn ema(x: &Node, alpha: f64) -> Result<Node> {
    inception(vec![x.clone()], Ema::new(alpha)?)
}

/// EMA parameterised by effective window length `w_eff > 1`.
pub fn ema_weff(x: &Node, w_eff: f64) -> Result<Node> {
    inception(vec![x.clone()], Ema::with_effective_window(w_eff)?)
}

/// Running covariance of `x` and `y`, coaligned under UNION once.
pub fn cov(x: &Node, y: &Node, corrected: bool) -> Result<Node> {
    if x.constant_value().is_some() && y.constant_value().is_some() {
        return Error::invalid("covariance of constants is undefined");
    }
    let aligned = coalign(&[x.clone(), y.clone()], Alignment::Union)?;
    inception(aligned, Cov { corrected })
}

/// Running correlation of `x` and `y`.
///
/// Composed as `cov(x, y) / (std(x) · std(y))` over one shared
/// coalignment, so every correlation entry point goes through this
/// definition.
pub fn cor(x: &Node, y: &Node) -> Result<Node> {
    if x.constant_value().is_some() && y.constant_value().is_some() {
        return Error::invalid("correlation of constants is undefined");
    }
    let aligned = coalign(&[x.clone(), y.clone()], Alignment::Union)?;
    let c = inception(aligned.clone(), Cov { corrected: true })?;
    let sx = std(&aligned[0], true)?;
    let sy = std(&aligned[1], true)?;
    let denom = binary(&sx, &sy, BinaryFunc::Mul, Alignment::Union)?;
    binary(&c, &denom, BinaryFunc::Div, Alignment::Union)
}

/// Running covariance matrix of a vector-valued `x`; the dimension is
/// pinned by the first observation.
pub fn cov_matrix(x: &Node, corrected: bool) -> Result<Node> {
    reject_constant(x, "covariance matrix")?;
    inception(vec![x.clone()], CovMatrix { corrected, dim: None })
}

/// Covariance matrix with a fixed input dimension, enforced from the
/// first observation on.
pub fn cov_matrix_fixed(x: &Node, dim: usize, corrected: bool) -> Result<Node> {
    if dim == 0 {
        return Error::invalid("covariance matrix dimension must be at least 1");
    }
    reject_constant(x, "covariance matrix")?;
    inception(
        vec![x.clone()],
        CovMatrix {
            corrected,
            dim: Some(dim),
        },
    )
}

// ------------------------------------------------- fixed-count window

fn check_window(len: usize, floor: usize, what: &str) -> Result<()> {
    if len < floor {
        return Error::invalid(format!("{what} window must hold at least {floor}, got {len}"));
    }
    Ok(())
}

/// Sum of the last `len` knots of `x`.
pub fn sum_window(x: &Node, len: usize, emit_early: bool) -> Result<Node> {
    check_window(len, 1, "sum")?;
    window(vec![x.clone()], Sum, len, emit_early)
}

/// Product of the last `len` knots of `x`.
pub fn prod_window(x: &Node, len: usize, emit_early: bool) -> Result<Node> {
    check_window(len, 1, "prod")?;
    window(vec![x.clone()], Prod, len, emit_early)
}

/// Mean of the last `len` knots of `x`.
pub fn mean_window(x: &Node, len: usize, emit_early: bool) -> Result<Node> {
    check_window(len, 1, "mean")?;
    window(vec![x.clone()], Mean, len, emit_early)
}

/// Variance of the last `len` knots of `x`; `len` must be at least 2.
pub fn var_window(x: &Node, len: usize, corrected: bool, emit_early: bool) -> Result<Node> {
    check_window(len, 2, "var")?;
    reject_constant(x, "variance")?;
    window(vec![x.clone()], Var { corrected }, len, emit_early)
}

/// Covariance over the last `len` aligned pairs of `x` and `y`.
pub fn cov_window(
    x: &Node,
    y: &Node,
    len: usize,
    corrected: bool,
    emit_early: bool,
) -> Result<Node> {
    check_window(len, 2, "cov")?;
    if x.constant_value().is_some() && y.constant_value().is_some() {
        return Error::invalid("covariance of constants is undefined");
    }
    let aligned = coalign(&[x.clone(), y.clone()], Alignment::Union)?;
    window(aligned, Cov { corrected }, len, emit_early)
}

/// Correlation over the last `len` aligned pairs, routed through the
/// correlation definition.
pub fn cor_window(x: &Node, y: &Node, len: usize, emit_early: bool) -> Result<Node> {
    check_window(len, 2, "cor")?;
    if x.constant_value().is_some() && y.constant_value().is_some() {
        return Error::invalid("correlation of constants is undefined");
    }
    let aligned = coalign(&[x.clone(), y.clone()], Alignment::Union)?;
    let c = window(aligned.clone(), Cov { corrected: true }, len, emit_early)?;
    let sx = window(
        vec![aligned[0].clone()],
        Var { corrected: true },
        len,
        emit_early,
    )?
    .sqrt()?;
    let sy = window(
        vec![aligned[1].clone()],
        Var { corrected: true },
        len,
        emit_early,
    )?
    .sqrt()?;
    let denom = binary(&sx, &sy, BinaryFunc::Mul, Alignment::Union)?;
    binary(&c, &denom, BinaryFunc::Div, Alignment::Union)
}

/// Covariance matrix over the last `len` vector knots of `x`.
pub fn cov_matrix_window(
    x: &Node,
    len: usize,
    corrected: bool,
    emit_early: bool,
) -> Result<Node> {
    check_window(len, 2, "cov_matrix")?;
    reject_constant(x, "covariance matrix")?;
    window(vec![x.clone()], CovMatrix { corrected, dim: None }, len, emit_early)
}

// -------------------------------------------------------- time window

/// Sum of `x`'s knots younger than `span`.
pub fn sum_twindow(x: &Node, span: Duration, emit_early: bool) -> Result<Node> {
    twindow(vec![x.clone()], Sum, span, emit_early)
}

/// Mean of `x`'s knots younger than `span`.
pub fn mean_twindow(x: &Node, span: Duration, emit_early: bool) -> Result<Node> {
    twindow(vec![x.clone()], Mean, span, emit_early)
}

/// Variance of `x`'s knots younger than `span`.
pub fn var_twindow(x: &Node, span: Duration, corrected: bool, emit_early: bool) -> Result<Node> {
    reject_constant(x, "variance")?;
    twindow(vec![x.clone()], Var { corrected }, span, emit_early)
}

/// Covariance of aligned pairs younger than `span`.
pub fn cov_twindow(
    x: &Node,
    y: &Node,
    span: Duration,
    corrected: bool,
    emit_early: bool,
) -> Result<Node> {
    if x.constant_value().is_some() && y.constant_value().is_some() {
        return Error::invalid("covariance of constants is undefined");
    }
    let aligned = coalign(&[x.clone(), y.clone()], Alignment::Union)?;
    twindow(aligned, Cov { corrected }, span, emit_early)
}

impl Node {
    /// See [`sum`].
    pub fn sum(&self) -> Result<Node> {
        sum(self)
    }

    /// See [`prod`].
    pub fn prod(&self) -> Result<Node> {
        prod(self)
    }

    /// See [`mean`].
    pub fn mean(&self) -> Result<Node> {
        mean(self)
    }

    /// See [`var`].
    pub fn var(&self, corrected: bool) -> Result<Node> {
        var(self, corrected)
    }

    /// See [`std`].
    pub fn std(&self, corrected: bool) -> Result<Node> {
        std(self, corrected)
    }

    /// See [`ema`].
    pub fn ema(&self, alpha: f64) -> Result<Node> {
        ema(self, alpha)
    }

    /// See [`sum_window`].
    pub fn sum_window(&self, len: usize, emit_early: bool) -> Result<Node> {
        sum_window(self, len, emit_early)
    }

    /// See [`mean_window`].
    pub fn mean_window(&self, len: usize, emit_early: bool) -> Result<Node> {
        mean_window(self, len, emit_early)
    }

    /// See [`var_window`].
    pub fn var_window(&self, len: usize, corrected: bool, emit_early: bool) -> Result<Node> {
        var_window(self, len, corrected, emit_early)
    }

    /// See [`sum_twindow`].
    pub fn sum_twindow(&self, span: Duration, emit_early: bool) -> Result<Node> {
        sum_twindow(self, span, emit_early)
    }

    /// See [`mean_twindow`].
    pub fn mean_twindow(&self, span: Duration, emit_early: bool) -> Result<Node> {
        mean_twindow(self, span, emit_early)
    }

    /// See [`var_twindow`].
    pub fn var_twindow(&self, span: Duration, corrected: bool, emit_early: bool) -> Result<Node> {
        var_twindow(self, span, corrected, emit_early)
    }

    /// See [`cov_matrix`].
    pub fn cov_matrix(&self, corrected: bool) -> Result<Node> {
        cov_matrix(self, corrected)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::Block;
    use crate::eval::evaluate;
    use crate::graph::IdentityMap;
    use crate::ops::source::{constant, data_node};
    use crate::time::Timestamp;
    use crate::value::Value;

    fn t(d: u32) -> Timestamp {
        Timestamp::from_ymd(2000, 1, d).unwrap()
    }

    fn floats(xs: &[(u32, f64)]) -> Node {
        data_node(xs.iter().map(|&(d, x)| (t(d), Value::float(x))).collect()).unwrap()
    }

    #[test]
    fn statistics_of_constants_fold_or_fail() {
        IdentityMap::scoped(|| {
            let c = constant(Value::float(3.0)).unwrap();
            assert_eq!(sum(&c).unwrap(), c);
            assert_eq!(prod(&c).unwrap(), c);
            assert_eq!(mean(&c).unwrap(), c);
            assert!(var(&c, true).is_err());
            assert!(cov(&c, &c, true).is_err());
            assert!(cor(&c, &c).is_err());
        });
    }

    #[test]
    fn running_mean_and_var() {
        IdentityMap::scoped(|| {
            let x = floats(&[(1, 2.0), (2, 4.0), (3, 6.0)]);

            let m = evaluate(&mean(&x).unwrap(), t(1), t(10)).unwrap();
            assert_eq!(
                m,
                Block::new(vec![
                    (t(1), Value::float(2.0)),
                    (t(2), Value::float(3.0)),
                    (t(3), Value::float(4.0)),
                ])
                .unwrap()
            );

            let v = evaluate(&var(&x, true).unwrap(), t(1), t(10)).unwrap();
            assert_eq!(
                v,
                Block::new(vec![
                    (t(2), Value::float(2.0)),
                    (t(3), Value::float(4.0)),
                ])
                .unwrap()
            );
        });
    }

    #[test]
    fn cov_handles_disjoint_schedules() {
        IdentityMap::scoped(|| {
            // y ticks between x's ticks; UNION coalignment pairs each
            // tick with the other side's latched value.
            let x = floats(&[(1, 1.0), (3, 3.0)]);
            let y = floats(&[(2, 2.0), (4, 4.0)]);
            let c = cov(&x, &y, false).unwrap();
            let out = evaluate(&c, t(1), t(10)).unwrap();
            // Aligned pairs: (1,2) at d2, (3,2) at d3, (3,4) at d4.
            assert_eq!(out.times(), &[t(3), t(4)]);
            let xs = [1.0, 3.0, 3.0];
            let ys = [2.0, 2.0, 4.0];
            let mx = xs.iter().sum::<f64>() / 3.0;
            let my = ys.iter().sum::<f64>() / 3.0;
            let expected = xs
                .iter()
                .zip(&ys)
                .map(|(a, b)| (a - mx) * (b - my))
                .sum::<f64>()
                / 3.0;
            let got = out.values()[1].as_f64().unwrap();
            assert!((got - expected).abs() < 1e-12);
        });
    }

    #[test]
    fn cor_of_a_series_with_itself_is_one() {
        IdentityMap::scoped(|| {
            let x = floats(&[(1, 1.0), (2, 3.0), (3, 2.0), (4, 5.0)]);
            let r = cor(&x, &x).unwrap();
            let out = evaluate(&r, t(1), t(10)).unwrap();
            assert!(!out.is_empty());
            for (_, v) in out.iter() {
                assert!((v.as_f64().unwrap() - 1.0).abs() < 1e-12);
            }
        });
    }

    #[test]
    fn cor_is_symmetric_in_value_and_shares_the_coalignment() {
        IdentityMap::scoped(|| {
            let x = floats(&[(1, 1.0), (2, 3.0), (3, 2.0)]);
            let y = floats(&[(1, 2.0), (2, 1.0), (3, 4.0)]);
            let xy = cor(&x, &y).unwrap();
            let yx = cor(&y, &x).unwrap();
            // Argument order is not canonicalised, so these are distinct
            // nodes, but the canonical coalignment makes them share the
            // std subgraphs and they agree numerically.
            assert_ne!(xy, yx);
            assert_eq!(
                evaluate(&xy, t(1), t(10)).unwrap(),
                evaluate(&yx, t(1), t(10)).unwrap()
            );
        });
    }

    #[test]
    fn window_parameters_validated() {
        IdentityMap::scoped(|| {
            let x = floats(&[(1, 1.0), (2, 2.0)]);
            assert!(var_window(&x, 1, true, false).is_err());
            assert!(sum_window(&x, 0, false).is_err());
            assert!(sum_twindow(&x, Duration::millis(0), false).is_err());
            assert!(var_window(&x, 2, true, false).is_ok());
        });
    }

    #[test]
    fn ema_converges_to_constant_input() {
        IdentityMap::scoped(|| {
            let xs: Vec<(u32, f64)> = (1..=8).map(|d| (d, 7.0)).collect();
            let x = floats(&xs);
            let e = ema(&x, 0.3).unwrap();
            let out = evaluate(&e, t(1), t(10)).unwrap();
            assert_eq!(out.len(), 8);
            // Bias correction makes the EMA exact on constant streams.
            for (_, v) in out.iter() {
                assert!((v.as_f64().unwrap() - 7.0).abs() < 1e-12);
            }
        });
    }

    #[test]
    fn cov_matrix_over_vector_stream() {
        IdentityMap::scoped(|| {
            let x = data_node(vec![
                (t(1), Value::vector(vec![1.0, 2.0])),
                (t(2), Value::vector(vec![3.0, 0.0])),
                (t(3), Value::vector(vec![5.0, 4.0])),
            ])
            .unwrap();

            let m = cov_matrix(&x, true).unwrap();
            let out = evaluate(&m, t(1), t(10)).unwrap();
            assert_eq!(out.times(), &[t(2), t(3)]);
            let last = match out.get(1).unwrap().1 {
                Value::Matrix(m) => m.clone(),
                other => panic!("expected matrix, got {other}"),
            };
            // Sample covariance of [(1,3,5), (2,0,4)].
            assert!((last[(0, 0)] - 4.0).abs() < 1e-12);
            assert!((last[(0, 1)] - 2.0).abs() < 1e-12);
            assert!((last[(1, 0)] - 2.0).abs() < 1e-12);
            assert!((last[(1, 1)] - 4.0).abs() < 1e-12);

            // A fixed-dimension variant rejects mismatched vectors at
            // the first event.
            let fixed = cov_matrix_fixed(&x, 3, true).unwrap();
            assert!(matches!(
                evaluate(&fixed, t(1), t(10)),
                Err(Error::ShapeMismatch(_))
            ));
            assert!(cov_matrix_fixed(&x, 0, true).is_err());
        });
    }

    #[test]
    fn windowed_mean_slides() {
        IdentityMap::scoped(|| {
            let x = floats(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
            let m = mean_window(&x, 2, false).unwrap();
            let out = evaluate(&m, t(1), t(10)).unwrap();
            assert_eq!(
                out,
                Block::new(vec![
                    (t(2), Value::float(1.5)),
                    (t(3), Value::float(2.5)),
                    (t(4), Value::float(3.5)),
                ])
                .unwrap()
            );
        });
    }
}
