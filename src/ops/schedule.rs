//! Operators over tick schedules: resampling, delaying, thinning.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::align::{merge, AlignState, Alignment};
use crate::block::{Block, BlockBuilder};
use crate::error::{Error, Result};
use crate::graph::{obtain_node, Node};
use crate::ops::arith::{binary, BinaryFunc};
use crate::ops::combine::Count;
use crate::ops::inception::Inception;
use crate::ops::source::constant;
use crate::ops::traits::{binary_inputs, state_of, unary_input, Op, OpKey, OpState};
use crate::time::Timestamp;
use crate::value::{Value, ValueType};

// -------------------------------------------------------------- align

struct AlignOp;

impl Op for AlignOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("align")
    }

    fn key(&self) -> OpKey {
        OpKey::Align
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        Ok(parents[0])
    }

    fn init_state(&self) -> OpState {
        Box::new(AlignState::new())
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let align = state_of::<AlignState>(state);
        let (values, schedule) = binary_inputs(parents);
        // A left-merge with the schedule driving: one output knot per
        // schedule tick, carrying the latched value.
        let pairs = merge(schedule, values, Alignment::Left, align);
        let mut out = BlockBuilder::with_capacity(pairs.len());
        for (t, _, v) in pairs {
            out.push(t, v);
        }
        Ok(out.finish())
    }

    fn always_ticks(&self) -> bool {
        false
    }
}

/// Sample `x` on `schedule`'s ticks: each output knot carries the most
/// recent `x` value.  Ticks before `x` has a value are suppressed.
pub fn align(x: &Node, schedule: &Node) -> Result<Node> {
    obtain_node(vec![x.clone(), schedule.clone()], Arc::new(AlignOp))
}

// ----------------------------------------------------------- schedule

struct ScheduleOp {
    alignment: Alignment,
}

impl Op for ScheduleOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("schedule")
    }

    fn key(&self) -> OpKey {
        OpKey::Schedule {
            alignment: self.alignment,
        }
    }

    fn output_type(&self, _parents: &[ValueType]) -> Result<ValueType> {
        Ok(ValueType::Bool)
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let (x, y) = binary_inputs(parents);
        let (xt, yt) = (x.times(), y.times());
        let mut out = BlockBuilder::default();
        let (mut i, mut j) = (0, 0);

        // Joint tick times only; no value latching involved.
        while i < xt.len() || j < yt.len() {
            let x_ticks = i < xt.len() && (j >= yt.len() || xt[i] <= yt[j]);
            let y_ticks = j < yt.len() && (i >= xt.len() || yt[j] <= xt[i]);
            let t = if x_ticks { xt[i] } else { yt[j] };
            i += x_ticks as usize;
            j += y_ticks as usize;

            let emit = match self.alignment {
                Alignment::Union => true,
                Alignment::Intersect => x_ticks && y_ticks,
                Alignment::Left => x_ticks,
            };
            if emit {
                out.push(t, Value::Bool(true));
            }
        }
        Ok(out.finish())
    }

    fn value_agnostic(&self) -> bool {
        true
    }
}

fn joint_schedule(x: &Node, y: &Node, alignment: Alignment) -> Result<Node> {
    obtain_node(
        vec![x.clone(), y.clone()],
        Arc::new(ScheduleOp { alignment }),
    )
}

/// Align every input onto one joint tick schedule, returning the aligned
/// nodes in the original input order.
///
/// Inputs are canonicalised by interned id before folding the joint
/// schedule, so repeated `coalign` calls over the same set, in any
/// order, share all intermediate nodes.  Under LEFT the first input is
/// pinned: the joint schedule is exactly its own.
pub fn coalign(nodes: &[Node], alignment: Alignment) -> Result<Vec<Node>> {
    let Some((first, rest)) = nodes.split_first() else {
        return Error::invalid("coalign needs at least one input");
    };
    if rest.is_empty() {
        return Ok(vec![first.clone()]);
    }

    let mut ordered: Vec<&Node> = match alignment {
        Alignment::Left => {
            let mut tail: Vec<&Node> = rest.iter().collect();
            tail.sort_by_key(|n| n.id());
            let mut v = vec![first];
            v.extend(tail);
            v
        }
        _ => {
            let mut v: Vec<&Node> = nodes.iter().collect();
            v.sort_by_key(|n| n.id());
            v
        }
    };
    ordered.dedup_by_key(|n| n.id());

    let mut acc = ordered[0].clone();
    for &node in &ordered[1..] {
        acc = joint_schedule(&acc, node, alignment)?;
    }

    nodes.iter().map(|node| align(node, &acc)).collect()
}

// --------------------------------------------------------- first_knot

struct FirstKnotOp;

struct FirstKnotState {
    emitted: bool,
}

impl Op for FirstKnotOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("first_knot")
    }

    fn key(&self) -> OpKey {
        OpKey::FirstKnot
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        Ok(parents[0])
    }

    fn init_state(&self) -> OpState {
        Box::new(FirstKnotState { emitted: false })
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let state = state_of::<FirstKnotState>(state);
        let input = unary_input(parents);
        let mut out = BlockBuilder::with_capacity(1);
        if !state.emitted {
            if let Some((t, v)) = input.first() {
                out.push(t, v.clone());
                state.emitted = true;
            }
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

/// Emit only `x`'s first tick, then stay silent forever.
pub fn first_knot(x: &Node) -> Result<Node> {
    obtain_node(vec![x.clone()], Arc::new(FirstKnotOp))
}

// ----------------------------------------------------------- throttle

struct ThrottleOp {
    n: usize,
}

struct ThrottleState {
    seen: usize,
}

impl Op for ThrottleOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(format!("throttle[{}]", self.n))
    }

    fn key(&self) -> OpKey {
        OpKey::Throttle { n: self.n }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        Ok(parents[0])
    }

    fn init_state(&self) -> OpState {
        Box::new(ThrottleState { seen: 0 })
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let state = state_of::<ThrottleState>(state);
        let input = unary_input(parents);
        let mut out = BlockBuilder::default();
        for (t, v) in input.iter() {
            if state.seen % self.n == 0 {
                out.push(t, v.clone());
            }
            state.seen += 1;
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

/// Keep every `n`-th knot of `x`, starting with the first.  `n == 1`
/// is the identity and returns `x` itself.
pub fn throttle(x: &Node, n: usize) -> Result<Node> {
    if n == 0 {
        return Error::invalid("throttle step must be at least 1");
    }
    if n == 1 {
        return Ok(x.clone());
    }
    obtain_node(vec![x.clone()], Arc::new(ThrottleOp { n }))
}

// ---------------------------------------------------------------- lag

struct LagOp {
    k: usize,
}

struct LagState {
    pending: VecDeque<Value>,
}

impl Op for LagOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(format!("lag[{}]", self.k))
    }

    fn key(&self) -> OpKey {
        OpKey::Lag { k: self.k }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        Ok(parents[0])
    }

    fn init_state(&self) -> OpState {
        Box::new(LagState {
            pending: VecDeque::new(),
        })
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let state = state_of::<LagState>(state);
        let input = unary_input(parents);
        let mut out = BlockBuilder::default();
        for (t, v) in input.iter() {
            state.pending.push_back(v.clone());
            if state.pending.len() > self.k {
                let lagged = state.pending.pop_front().expect("non-empty after push");
                out.push(t, lagged);
            }
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

/// Emit, on `x`'s tick schedule, the value from `k` ticks ago.  The
/// first `k` ticks are silent.  A lagged constant is the constant, and
/// `k == 0` is the identity.
pub fn lag(x: &Node, k: usize) -> Result<Node> {
    if x.constant_value().is_some() || k == 0 {
        return Ok(x.clone());
    }
    obtain_node(vec![x.clone()], Arc::new(LagOp { k }))
}

// ------------------------------------------------------------ history

struct HistoryOp {
    len: usize,
}

struct HistoryState {
    recent: VecDeque<f64>,
}

impl Op for HistoryOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(format!("history[{}]", self.len))
    }

    fn key(&self) -> OpKey {
        OpKey::History { len: self.len }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        match parents[0] {
            ValueType::Int | ValueType::Float => Ok(ValueType::Vector),
            t => Err(Error::TypeMismatch {
                expected: "numeric value",
                actual: t,
            }),
        }
    }

    fn init_state(&self) -> OpState {
        Box::new(HistoryState {
            recent: VecDeque::new(),
        })
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let state = state_of::<HistoryState>(state);
        let input = unary_input(parents);
        let mut out = BlockBuilder::default();
        for (t, v) in input.iter() {
            if state.recent.len() == self.len {
                state.recent.pop_front();
            }
            state.recent.push_back(v.as_f64()?);
            if state.recent.len() == self.len {
                let xs: Vec<f64> = state.recent.iter().copied().collect();
                out.push(t, Value::vector(xs));
            }
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

/// Emit the last `len` values of `x` as a vector, oldest first, once
/// `len` values have been seen.
pub fn history(x: &Node, len: usize) -> Result<Node> {
    if len == 0 {
        return Error::invalid("history length must be at least 1");
    }
    obtain_node(vec![x.clone()], Arc::new(HistoryOp { len }))
}

// -------------------------------------------------- counting helpers

/// Running count of `x`'s knots.
pub fn count_knots(x: &Node) -> Result<Node> {
    obtain_node(vec![x.clone()], Arc::new(Inception::new(Count)))
}

/// How many of the inputs have ticked at least once: the UNION sum over
/// `align(1, first_knot(input))` terms.
pub fn active_count(nodes: &[Node]) -> Result<Node> {
    if nodes.is_empty() {
        return Error::invalid("active_count needs at least one input");
    }
    let one = constant(Value::Int(1))?;
    let mut acc: Option<Node> = None;
    for node in nodes {
        let term = align(&one, &first_knot(node)?)?;
        acc = Some(match acc {
            None => term,
            Some(sum) => binary(&sum, &term, BinaryFunc::Add, Alignment::Union)?,
        });
    }
    Ok(acc.expect("at least one input"))
}

impl Node {
    /// See [`lag`].
    pub fn lag(&self, k: usize) -> Result<Node> {
        lag(self, k)
    }

    /// See [`throttle`].
    pub fn throttle(&self, n: usize) -> Result<Node> {
        throttle(self, n)
    }

    /// See [`first_knot`].
    pub fn first_knot(&self) -> Result<Node> {
        first_knot(self)
    }

    /// See [`count_knots`].
    pub fn count_knots(&self) -> Result<Node> {
        count_knots(self)
    }

    /// See [`history`].
    pub fn history(&self, len: usize) -> Result<Node> {
        history(self, len)
    }
}
