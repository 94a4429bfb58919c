//! Accumulation from the beginning of an evaluation.

use std::borrow::Cow;

use crate::align::{merge, AlignState, Alignment};
use crate::block::{Block, BlockBuilder};
use crate::error::Result;
use crate::maybe::Maybe;
use crate::ops::combine::Combiner;
use crate::ops::traits::{binary_inputs, state_of, unary_input, Op, OpKey, OpState};
use crate::time::Timestamp;
use crate::value::{Value, ValueType};

/// One accumulation event: a tick time plus one value per input.
pub(crate) type Event = (Timestamp, Vec<Value>);

/// Collect the event stream driving an accumulator.
///
/// Unary accumulators consume their parent's knots directly.  Binary
/// accumulators run over parents that were coaligned at construction,
/// so pairing them is an intersect-merge; the latch state exists only
/// to reuse the merge plumbing.
pub(crate) fn events(arity: usize, parents: &[&Block], align: &mut AlignState) -> Vec<Event> {
    match arity {
        1 => unary_input(parents)
            .iter()
            .map(|(t, v)| (t, vec![v.clone()]))
            .collect(),
        2 => {
            let (x, y) = binary_inputs(parents);
            merge(x, y, Alignment::Intersect, align)
                .into_iter()
                .map(|(t, xv, yv)| (t, vec![xv, yv]))
                .collect()
        }
        other => panic!("combiner arity {other} not supported"),
    }
}

/// Inception operator: folds the combiner over every event since the
/// start of the evaluation interval, never forgetting.
pub struct Inception<C> {
    comb: C,
}

impl<C: Combiner> Inception<C> {
    pub fn new(comb: C) -> Self {
        Self { comb }
    }
}

struct InceptionState<C: Combiner> {
    data: Option<C::Data>,
    align: AlignState,
}

impl<C: Combiner> Op for Inception<C> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(self.comb.name())
    }

    fn key(&self) -> OpKey {
        OpKey::Inception {
            comb: self.comb.key(),
        }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        self.comb.output_type(parents)
    }

    fn init_state(&self) -> OpState {
        Box::new(InceptionState::<C> {
            data: None,
            align: AlignState::new(),
        })
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let state = state_of::<InceptionState<C>>(state);
        let events = events(self.comb.arity(), parents, &mut state.align);
        let mut out = BlockBuilder::with_capacity(events.len());

        for (t, values) in events {
            let refs: Vec<&Value> = values.iter().collect();
            let wrapped = self.comb.wrap(&refs)?;
            let data = match state.data.take() {
                None => wrapped,
                Some(acc) => self.comb.combine(&acc, &wrapped)?,
            };

            let step = if self.always_ticks() || self.comb.should_tick(&data) {
                Maybe::Tick(self.comb.extract(&data)?)
            } else {
                Maybe::Quiet
            };
            if let Maybe::Tick(value) = step {
                out.push(t, value);
            }
            state.data = Some(data);
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}
