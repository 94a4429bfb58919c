//! Time-ordered batches of knots.
//!
//! A [`Block`] is the only boundary data type of the engine: sources
//! produce them, operators consume and produce them, and `evaluate`
//! returns one.  Knot times within a block are strictly increasing;
//! empty blocks are valid and common (an operator that never ticks over
//! an interval emits one).

use std::fmt::{self, Debug};
use std::sync::Arc;

use itertools::izip;

use crate::error::{Error, Result};
use crate::time::Timestamp;
use crate::value::Value;

/// An immutable, columnar batch of `(time, value)` knots.
///
/// Clones are cheap: both columns are reference-counted.  Blocks hash by
/// content so a literal-block source can serve as an operator key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Block {
    times: Arc<Vec<Timestamp>>,
    values: Arc<Vec<Value>>,
}

impl Block {
    /// An empty block.
    pub fn empty() -> Self {
        Self {
            times: Arc::new(Vec::new()),
            values: Arc::new(Vec::new()),
        }
    }

    /// Build a block from knots, validating the ordering invariant.
    pub fn new(knots: Vec<(Timestamp, Value)>) -> Result<Self> {
        let (times, values) = knots.into_iter().unzip();
        Self::from_columns(times, values)
    }

    /// Build a block from separate time and value columns, validating
    /// that the columns have equal length and strictly increasing times.
    pub fn from_columns(times: Vec<Timestamp>, values: Vec<Value>) -> Result<Self> {
        if times.len() != values.len() {
            return Error::invalid(format!(
                "block columns disagree: {} times, {} values",
                times.len(),
                values.len()
            ));
        }
        if let Some(w) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Error::invalid(format!(
                "block times not strictly increasing: {} then {}",
                w[0], w[1]
            ));
        }
        Ok(Self::from_columns_unchecked(times, values))
    }

    /// Trusted construction path for operators that emit in order.
    pub(crate) fn from_columns_unchecked(times: Vec<Timestamp>, values: Vec<Value>) -> Self {
        Self {
            times: Arc::new(times),
            values: Arc::new(values),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The first knot, if any.
    pub fn first(&self) -> Option<(Timestamp, &Value)> {
        self.get(0)
    }

    pub fn get(&self, index: usize) -> Option<(Timestamp, &Value)> {
        Some((*self.times.get(index)?, self.values.get(index)?))
    }

    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &Value)> + '_ {
        izip!(self.times.iter().copied(), self.values.iter())
    }

    /// Verify the ordering invariant, for blocks received from sources
    /// the engine does not control.
    pub(crate) fn check_monotonic(&self, origin: &str) -> Result<()> {
        match self.times.windows(2).find(|w| w[0] >= w[1]) {
            None => Ok(()),
            Some(w) => Err(Error::InternalInvariant(format!(
                "{origin} emitted non-monotonic knot times: {} then {}",
                w[0], w[1]
            ))),
        }
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(t, v)| (t.to_string(), v.to_string())))
            .finish()
    }
}

/// Accumulates knots emitted in ascending order by an operator run.
#[derive(Default)]
pub(crate) struct BlockBuilder {
    times: Vec<Timestamp>,
    values: Vec<Value>,
}

impl BlockBuilder {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            times: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, time: Timestamp, value: Value) {
        self.times.push(time);
        self.values.push(value);
    }

    pub fn finish(self) -> Block {
        Block::from_columns_unchecked(self.times, self.values)
    }
}
