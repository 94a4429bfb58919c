//! Fixed-count windows with O(1) amortised associative folds.

use std::borrow::Cow;

use crate::align::AlignState;
use crate::block::{Block, BlockBuilder};
use crate::error::Result;
use crate::maybe::Maybe;
use crate::ops::combine::Combiner;
use crate::ops::inception::events;
use crate::ops::traits::{state_of, Op, OpKey, OpState};
use crate::time::Timestamp;
use crate::value::{Value, ValueType};

/// A bounded queue of combiner summaries whose overall fold is always
/// available without rescanning.
///
/// The classic two-stack trick: pushes fold into `back`, evictions pop
/// from `front`, and `front` entries carry the fold of themselves and
/// everything younger within the front segment:
///
/// ```text
///          front (oldest on top)        back (arrival order)
///        ┌──────────────────────┐     ┌─────────────────────┐
/// evict ◄│ d3·d4·d5, d4·d5, d5  │     │ d6, d7   back_fold =│◄ push
///        └──────────────────────┘     │          d6·d7      │
///                                     └─────────────────────┘
///                value() = (d3·d4·d5) · (d6·d7)
/// ```
///
/// Each element is folded O(1) amortised times, so non-invertible
/// combiners (min-like or variance summaries) cost the same as
/// invertible ones.
pub(crate) struct FixedWindowFold<C: Combiner> {
    capacity: usize,
    // (element, fold of element and everything younger in front)
    front: Vec<(C::Data, C::Data)>,
    back: Vec<C::Data>,
    back_fold: Option<C::Data>,
}

impl<C: Combiner> FixedWindowFold<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            front: Vec::new(),
            back: Vec::new(),
            back_fold: None,
        }
    }

    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    /// Whether the retained count has reached the configured window.
    pub fn full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Push one summary, evicting the oldest when at capacity.
    pub fn update(&mut self, comb: &C, data: C::Data) -> Result<()> {
        if self.full() {
            self.pop_oldest(comb)?;
        }
        self.back_fold = Some(match self.back_fold.take() {
            None => data.clone(),
            Some(fold) => comb.combine(&fold, &data)?,
        });
        self.back.push(data);
        Ok(())
    }

    fn pop_oldest(&mut self, comb: &C) -> Result<()> {
        if self.front.is_empty() {
            // Refill: drain `back` newest-first so each front entry can
            // extend the fold of everything younger than itself.
            while let Some(data) = self.back.pop() {
                let fold = match self.front.last() {
                    None => data.clone(),
                    Some((_, younger)) => comb.combine(&data, younger)?,
                };
                self.front.push((data, fold));
            }
            self.back_fold = None;
        }
        self.front.pop();
        Ok(())
    }

    /// The fold of all retained summaries, oldest-first.
    pub fn value(&self, comb: &C) -> Result<Option<C::Data>> {
        match (self.front.last(), &self.back_fold) {
            (Some((_, f)), Some(b)) => Ok(Some(comb.combine(f, b)?)),
            (Some((_, f)), None) => Ok(Some(f.clone())),
            (None, Some(b)) => Ok(Some(b.clone())),
            (None, None) => Ok(None),
        }
    }
}

/// Fixed-count windowed accumulation operator.
pub struct Window<C> {
    comb: C,
    len: usize,
    emit_early: bool,
}

impl<C: Combiner> Window<C> {
    pub fn new(comb: C, len: usize, emit_early: bool) -> Self {
        Self {
            comb,
            len,
            emit_early,
        }
    }
}

struct WindowState<C: Combiner> {
    fold: FixedWindowFold<C>,
    align: AlignState,
}

impl<C: Combiner> Op for Window<C> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(format!("{}[{}]", self.comb.name(), self.len))
    }

    fn key(&self) -> OpKey {
        OpKey::Window {
            comb: self.comb.key(),
            len: self.len,
            emit_early: self.emit_early,
        }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        self.comb.output_type(parents)
    }

    fn init_state(&self) -> OpState {
        Box::new(WindowState::<C> {
            fold: FixedWindowFold::new(self.len),
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
        let state = state_of::<WindowState<C>>(state);
        let events = events(self.comb.arity(), parents, &mut state.align);
        let mut out = BlockBuilder::with_capacity(events.len());

        for (t, values) in events {
            let refs: Vec<&Value> = values.iter().collect();
            state.fold.update(&self.comb, self.comb.wrap(&refs)?)?;

            let step = self.step(&state.fold)?;
            if let Maybe::Tick(value) = step {
                out.push(t, value);
            }
        }
        Ok(out.finish())
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

impl<C: Combiner> Window<C> {
    fn step(&self, fold: &FixedWindowFold<C>) -> Result<Maybe<Value>> {
        if !(self.emit_early || fold.full()) && !self.always_ticks() {
            return Ok(Maybe::Quiet);
        }
        let data = fold
            .value(&self.comb)?
            .expect("window value exists right after an update");
        if self.always_ticks() || self.comb.should_tick(&data) {
            Ok(Maybe::Tick(self.comb.extract(&data)?))
        } else {
            Ok(Maybe::Quiet)
        }
    }
}
