//! The operator interface.
//!
//! Operators are the polymorphic carriers of node behaviour.  They are
//! immutable; all mutable scratch lives in per-evaluation state created
//! by [`Op::init_state`].  Each operator carries a pure [`OpKey`] used by
//! the identity map: equal keys mean the operators are interchangeable.

use std::any::Any;
use std::borrow::Cow;

use ordered_float::OrderedFloat;

use crate::align::Alignment;
use crate::block::Block;
use crate::error::Result;
use crate::time::{Duration, Timestamp};
use crate::value::{Value, ValueType};

/// Per-node mutable state for one evaluation.  Owned by the evaluation's
/// [`EvaluationState`](crate::eval::EvaluationState) container and
/// dropped when `evaluate` returns.
pub type OpState = Box<dyn Any + Send>;

/// Behaviour of a node.
///
/// `run` is invoked exactly once per evaluation, over the full interval,
/// after all parents have produced their blocks.  No operator may block
/// or suspend.
pub trait Op: Send + Sync + 'static {
    fn name(&self) -> Cow<'static, str>;

    /// Structural identity for deduplication.  Must be pure and
    /// immutable; operators holding a random source key on its seed.
    fn key(&self) -> OpKey;

    /// Infer the output value type, failing construction on
    /// incompatible parents.
    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType>;

    /// Fresh per-evaluation state for this operator.
    fn init_state(&self) -> OpState;

    /// Produce this node's block for `[start, end)` from the parents'
    /// already-materialised blocks.
    fn run(
        &self,
        state: &mut OpState,
        start: Timestamp,
        end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block>;

    /// Returns `true` if every input tick produces an output tick.
    fn always_ticks(&self) -> bool {
        false
    }

    /// Returns `true` if the computation never consults knot times,
    /// which permits scheduling shortcuts.
    fn time_agnostic(&self) -> bool {
        false
    }

    /// Returns `true` if the output does not depend on input values
    /// (only on the input tick schedule).
    fn value_agnostic(&self) -> bool {
        false
    }

    /// Constant sources report their value here so constructors can
    /// fold constant subgraphs.
    fn constant_value(&self) -> Option<&Value> {
        None
    }
}

/// Structural operator identity.
///
/// Keys combine with parent identities to form the interning key, so two
/// operator instances with equal keys must compute the same function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    Constant(Value),
    Data(Block),
    Pulse { period: Duration },
    IterDates,
    RandomUniform { seed: u64 },
    Binary {
        func: crate::ops::arith::BinaryFunc,
        alignment: Alignment,
        initial_x: Option<Value>,
        initial_y: Option<Value>,
    },
    Map { func: crate::ops::arith::UnaryFunc },
    Inception { comb: CombKey },
    Window { comb: CombKey, len: usize, emit_early: bool },
    TimeWindow { comb: CombKey, span: Duration, emit_early: bool },
    Align,
    Schedule { alignment: Alignment },
    Lag { k: usize },
    Throttle { n: usize },
    FirstKnot,
    History { len: usize },
}

/// Identity of a statistical combiner, including the parameters that
/// change its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombKey {
    Sum,
    Prod,
    Count,
    Mean,
    Var { corrected: bool },
    Cov { corrected: bool },
    CovMatrix { corrected: bool, dim: Option<usize> },
    Ema { alpha: OrderedFloat<f64> },
}

/// Downcast per-evaluation state to the operator's concrete state type.
///
/// A mismatch is a scheduler bug, not a data error, and panics.
pub(crate) fn state_of<T: 'static>(state: &mut OpState) -> &mut T {
    state
        .downcast_mut::<T>()
        .unwrap_or_else(|| panic!("operator state has unexpected type"))
}

/// The single parent block of a unary operator.
pub(crate) fn unary_input<'a>(parents: &[&'a Block]) -> &'a Block {
    match parents {
        &[p] => p,
        other => panic!("unary operator got {} parents", other.len()),
    }
}

/// The two parent blocks of a binary operator.
pub(crate) fn binary_inputs<'a>(parents: &[&'a Block]) -> (&'a Block, &'a Block) {
    match parents {
        &[x, y] => (x, y),
        other => panic!("binary operator got {} parents", other.len()),
    }
}
