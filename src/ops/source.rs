//! Source operators: nodes with no parents that inject knots into the
//! graph, plus the seeded noise operator.
//!
//! File-backed sources are external collaborators and not part of the
//! engine; a literal [`Block`] source covers their contract in tests.

use std::borrow::Cow;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::block::{Block, BlockBuilder};
use crate::error::{Error, Result};
use crate::graph::{obtain_node, Node};
use crate::ops::traits::{state_of, unary_input, Op, OpKey, OpState};
use crate::time::{Duration, Timestamp};
use crate::value::{Value, ValueType};

// ----------------------------------------------------------- constant

struct ConstantOp {
    value: Value,
}

impl Op for ConstantOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("constant")
    }

    fn key(&self) -> OpKey {
        OpKey::Constant(self.value.clone())
    }

    fn output_type(&self, _parents: &[ValueType]) -> Result<ValueType> {
        Ok(self.value.value_type())
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        start: Timestamp,
        end: Timestamp,
        _parents: &[&Block],
    ) -> Result<Block> {
        let mut out = BlockBuilder::with_capacity(1);
        if start < end {
            out.push(start, self.value.clone());
        }
        Ok(out.finish())
    }

    fn value_agnostic(&self) -> bool {
        true
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }
}

/// A node that ticks once, at the start of the evaluation interval,
/// with a fixed value.
pub fn constant(value: impl Into<Value>) -> Result<Node> {
    obtain_node(
        Vec::new(),
        Arc::new(ConstantOp {
            value: value.into(),
        }),
    )
}

// --------------------------------------------------------------- data

struct DataOp {
    block: Block,
    value_type: ValueType,
}

impl Op for DataOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("data")
    }

    fn key(&self) -> OpKey {
        OpKey::Data(self.block.clone())
    }

    fn output_type(&self, _parents: &[ValueType]) -> Result<ValueType> {
        Ok(self.value_type)
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        start: Timestamp,
        end: Timestamp,
        _parents: &[&Block],
    ) -> Result<Block> {
        let mut out = BlockBuilder::with_capacity(self.block.len());
        for (t, v) in self.block.iter() {
            if t >= start && t < end {
                out.push(t, v.clone());
            }
        }
        Ok(out.finish())
    }
}

/// A node replaying a literal block; knots outside the evaluation
/// interval are dropped.  The block must be non-empty and homogeneously
/// typed so the node's value type can be inferred.
pub fn data(block: Block) -> Result<Node> {
    let Some((_, first)) = block.first() else {
        return Error::invalid("data node needs a non-empty block to infer its value type");
    };
    let value_type = first.value_type();
    if let Some(bad) = block.values().iter().find(|v| v.value_type() != value_type) {
        return Err(Error::TypeMismatch {
            expected: "homogeneous block values",
            actual: bad.value_type(),
        });
    }
    obtain_node(Vec::new(), Arc::new(DataOp { block, value_type }))
}

/// Convenience wrapper: build the block from knots, then a data node.
pub fn data_node(knots: Vec<(Timestamp, Value)>) -> Result<Node> {
    data(Block::new(knots)?)
}

// -------------------------------------------------------------- pulse

struct PulseOp {
    period: Duration,
}

impl Op for PulseOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("pulse")
    }

    fn key(&self) -> OpKey {
        OpKey::Pulse {
            period: self.period,
        }
    }

    fn output_type(&self, _parents: &[ValueType]) -> Result<ValueType> {
        Ok(ValueType::Float)
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        start: Timestamp,
        end: Timestamp,
        _parents: &[&Block],
    ) -> Result<Block> {
        let mut out = BlockBuilder::default();
        let mut t = start;
        while t < end {
            out.push(t, Value::float(1.0));
            t += self.period;
        }
        Ok(out.finish())
    }

    fn value_agnostic(&self) -> bool {
        true
    }
}

/// A clock ticking `1.0` every `period`, anchored at the interval start.
pub fn pulse(period: Duration) -> Result<Node> {
    if !period.is_positive() {
        return Error::invalid(format!("pulse period must be positive, got {period}"));
    }
    obtain_node(Vec::new(), Arc::new(PulseOp { period }))
}

// ---------------------------------------------------------- iterdates

struct IterDatesOp;

impl Op for IterDatesOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("iterdates")
    }

    fn key(&self) -> OpKey {
        OpKey::IterDates
    }

    fn output_type(&self, _parents: &[ValueType]) -> Result<ValueType> {
        Ok(ValueType::Time)
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        start: Timestamp,
        end: Timestamp,
        _parents: &[&Block],
    ) -> Result<Block> {
        let mut out = BlockBuilder::default();
        let mut t = start.floor_to_day();
        if t < start {
            t += Duration::DAY;
        }
        while t < end {
            out.push(t, Value::Time(t));
            t += Duration::DAY;
        }
        Ok(out.finish())
    }
}

/// A calendar source ticking at every midnight inside the interval,
/// carrying the date itself as its value.
pub fn iterdates() -> Result<Node> {
    obtain_node(Vec::new(), Arc::new(IterDatesOp))
}

// ------------------------------------------------------------- random

struct RandomUniformOp {
    seed: u64,
}

impl Op for RandomUniformOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("random_uniform")
    }

    fn key(&self) -> OpKey {
        OpKey::RandomUniform { seed: self.seed }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        debug_assert_eq!(parents.len(), 1);
        Ok(ValueType::Float)
    }

    fn init_state(&self) -> OpState {
        // The operator's own seed is part of its identity and never
        // advances; each evaluation draws from a fresh clone.
        Box::new(StdRng::seed_from_u64(self.seed))
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let rng = state_of::<StdRng>(state);
        let input = unary_input(parents);
        let mut out = BlockBuilder::with_capacity(input.len());
        for (t, _) in input.iter() {
            out.push(t, Value::float(rng.gen::<f64>()));
        }
        Ok(out.finish())
    }

    fn value_agnostic(&self) -> bool {
        true
    }
}

/// Uniform `[0, 1)` noise on `schedule`'s ticks, ignoring its values.
/// Evaluations are reproducible: the seed is fixed in the node identity.
pub fn random_uniform(schedule: &Node, seed: u64) -> Result<Node> {
    obtain_node(vec![schedule.clone()], Arc::new(RandomUniformOp { seed }))
}
