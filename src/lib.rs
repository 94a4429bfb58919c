//! Lazy time-series computation over a deduplicated operator graph.
//!
//! Users compose [`Node`]s (constants, data blocks, arithmetic,
//! alignment, lags, windows, statistics) into a DAG.  Nothing runs at
//! composition time; [`evaluate`] materialises a node's output over a
//! half-open interval as a [`Block`] of `(time, value)` knots.
//!
//! Structurally equal nodes are the same node: every constructor goes
//! through a process-wide identity map, so a diamond built twice is one
//! diamond, evaluated once per call.
//!
//! # Examples
//!
//! ```
//! use knotwork::{evaluate, ops::source::data_node, Timestamp, Value};
//!
//! let t = |d| Timestamp::from_ymd(2024, 1, d).unwrap();
//! let x = data_node(vec![(t(1), Value::float(2.0)), (t(2), Value::float(4.0))]).unwrap();
//! let y = data_node(vec![(t(2), Value::float(10.0))]).unwrap();
//!
//! // `+` aligns the operands under UNION: ticks pair with the other
//! // side's most recent value.
//! let total = &x + &y;
//! let block = evaluate(&total, t(1), t(9)).unwrap();
//! assert_eq!(block.values(), &[Value::float(14.0)]);
//!
//! let running = x.mean().unwrap();
//! let block = evaluate(&running, t(1), t(9)).unwrap();
//! assert_eq!(block.values(), &[Value::float(2.0), Value::float(3.0)]);
//! ```

pub mod algebra;
pub mod align;
mod block;
mod error;
mod eval;
pub mod graph;
mod maybe;
pub mod ops;
mod time;
mod value;

pub use align::{AlignState, Alignment};
pub use block::Block;
pub use error::{Error, Result};
pub use eval::{evaluate, EvaluationState};
pub use graph::{ancestors, obtain_node, topological, IdentityMap, Node, NodeId};
pub use maybe::Maybe;
pub use ops::arith::{binary, binary_with_initial, map, max, min, BinaryFunc, UnaryFunc};
pub use ops::schedule::{
    active_count, align, coalign, count_knots, first_knot, history, lag, throttle,
};
pub use ops::source::{constant, data, data_node, iterdates, pulse, random_uniform};
pub use ops::stats::{
    cor, cor_window, cov, cov_matrix, cov_matrix_fixed, cov_matrix_window, cov_twindow,
    cov_window, ema, ema_weff, mean, mean_twindow, mean_window, prod, prod_window, std, sum,
    sum_twindow, sum_window, var, var_twindow, var_window,
};
pub use time::{Duration, Timestamp};
pub use value::{Value, ValueType};
