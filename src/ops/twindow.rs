//! Time-duration windows.
//!
//! Same contract as the fixed-count window, but retention is by age: a
//! knot at `t_old` stays while `t_now - t_old < span`.  Eviction happens
//! in arrival order, so the two-stack fold carries timestamps alongside
//! summaries.  The window is *full* from the first tick whose distance
//! to the very first input reaches the span, and stays full thereafter.

use std::borrow::Cow;

use crate::align::AlignState;
use crate::block::{Block, BlockBuilder};
use crate::error::Result;
use crate::maybe::Maybe;
use crate::ops::combine::Combiner;
use crate::ops::inception::events;
use crate::ops::traits::{state_of, Op, OpKey, OpState};
use crate::time::{Duration, Timestamp};
use crate::value::{Value, ValueType};

struct TimeWindowFold<C: Combiner> {
    span: Duration,
    // (time, element, fold of element and everything younger in front)
    front: Vec<(Timestamp, C::Data, C::Data)>,
    back: Vec<(Timestamp, C::Data)>,
    back_fold: Option<C::Data>,
    first_input: Option<Timestamp>,
    matured: bool,
}

impl<C: Combiner> TimeWindowFold<C> {
    fn new(span: Duration) -> Self {
        Self {
            span,
            front: Vec::new(),
            back: Vec::new(),
            back_fold: None,
            first_input: None,
            matured: false,
        }
    }

    fn full(&self) -> bool {
        self.matured
    }

    fn oldest_time(&self) -> Option<Timestamp> {
        self.front
            .last()
            .map(|(t, _, _)| *t)
            .or_else(|| self.back.first().map(|(t, _)| *t))
    }

    fn update(&mut self, comb: &C, now: Timestamp, data: C::Data) -> Result<()> {
        let first = *self.first_input.get_or_insert(now);
        if now - first >= self.span {
            self.matured = true;
        }

        while self.oldest_time().is_some_and(|t| now - t >= self.span) {
            self.pop_oldest(comb)?;
        }

        self.back_fold = Some(match self.back_fold.take() {
            None => data.clone(),
            Some(fold) => comb.combine(&fold, &data)?,
        });
        self.back.push((now, data));
        Ok(())
    }

    fn pop_oldest(&mut self, comb: &C) -> Result<()> {
        if self.front.is_empty() {
            while let Some((t, data)) = self.back.pop() {
                let fold = match self.front.last() {
                    None => data.clone(),
                    Some((_, _, younger)) => comb.combine(&data, younger)?,
                };
                self.front.push((t, data, fold));
            }
            self.back_fold = None;
        }
        self.front.pop();
        Ok(())
    }

    fn value(&self, comb: &C) -> Result<Option<C::Data>> {
        match (self.front.last(), &self.back_fold) {
            (Some((_, _, f)), Some(b)) => Ok(Some(comb.combine(f, b)?)),
            (Some((_, _, f)), None) => Ok(Some(f.clone())),
            (None, Some(b)) => Ok(Some(b.clone())),
            (None, None) => Ok(None),
        }
    }
}

/// Time-windowed accumulation operator.
pub struct TimeWindow<C> {
    comb: C,
    span: Duration,
    emit_early: bool,
}

impl<C: Combiner> TimeWindow<C> {
    pub fn new(comb: C, span: Duration, emit_early: bool) -> Self {
        Self {
            comb,
            span,
            emit_early,
        }
    }
}

struct TimeWindowState<C: Combiner> {
    fold: TimeWindowFold<C>,
    align: AlignState,
}

impl<C: Combiner> Op for TimeWindow<C> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(format!("{}[{}]", self.comb.name(), self.span))
    }

    fn key(&self) -> OpKey {
        OpKey::TimeWindow {
            comb: self.comb.key(),
            span: self.span,
            emit_early: self.emit_early,
        }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        self.comb.output_type(parents)
    }

    fn init_state(&self) -> OpState {
        Box::new(TimeWindowState::<C> {
            fold: TimeWindowFold::new(self.span),
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
        let state = state_of::<TimeWindowState<C>>(state);
        let events = events(self.comb.arity(), parents, &mut state.align);
        let mut out = BlockBuilder::with_capacity(events.len());

        for (t, values) in events {
            let refs: Vec<&Value> = values.iter().collect();
            state.fold.update(&self.comb, t, self.comb.wrap(&refs)?)?;

            if !(self.emit_early || state.fold.full()) {
                continue;
            }
            let data = state
                .fold
                .value(&self.comb)?
                .expect("window value exists right after an update");
            let step = if self.comb.should_tick(&data) {
                Maybe::Tick(self.comb.extract(&data)?)
            } else {
                Maybe::Quiet
            };
            if let Maybe::Tick(value) = step {
                out.push(t, value);
            }
        }
        Ok(out.finish())
    }
}
