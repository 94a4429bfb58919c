//! Merging two irregularly-sampled streams onto one tick schedule.
//!
//! Given two blocks covering the same evaluation interval, the merger
//! walks both time columns with two pointers and decides, per distinct
//! timestamp, whether the pair ticks and which values it carries:
//!
//! ```text
//! X:  ──x────x────x─────────x──►
//! Y:  ───────y────y────y───────►
//!
//! UNION      ticks at every x or y, latching the silent side
//! INTERSECT  ticks only where x and y coincide
//! LEFT       ticks exactly where x ticks, pairing the latest y
//! ```
//!
//! Equal timestamps count as one simultaneous tick.  Each side's most
//! recent value is latched in [`AlignState`], which lives in
//! per-evaluation operator state, so a merge picks up where the previous
//! block of the same evaluation left off.

use crate::block::Block;
use crate::time::Timestamp;
use crate::value::Value;

/// Policy governing when a two-input operator emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Alignment {
    /// Tick whenever either input ticks, once both sides have a value.
    #[default]
    Union,
    /// Tick only when both inputs tick simultaneously.
    Intersect,
    /// Tick exactly when the left input ticks, pairing the most recent
    /// right value; left ticks before the right side has one are
    /// suppressed.
    Left,
}

/// Per-side latches threaded through an evaluation.
///
/// The merger is *primed* once both latches hold a value; `initial`
/// bootstraps either side so emission may begin before that side's
/// first knot.
#[derive(Debug, Clone, Default)]
pub struct AlignState {
    x: Option<Value>,
    y: Option<Value>,
}

impl AlignState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstrap one or both sides with an initial value.
    pub fn with_initial(x0: Option<Value>, y0: Option<Value>) -> Self {
        Self { x: x0, y: y0 }
    }

    pub fn primed(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

/// Merge one block per side under the given alignment, updating latches.
///
/// Returns the emitted `(time, x value, y value)` triples in strictly
/// ascending time order.
pub fn merge(
    x: &Block,
    y: &Block,
    alignment: Alignment,
    state: &mut AlignState,
) -> Vec<(Timestamp, Value, Value)> {
    let mut out = Vec::new();
    let (xt, xv) = (x.times(), x.values());
    let (yt, yv) = (y.times(), y.values());
    let (mut i, mut j) = (0, 0);

    while i < xt.len() || j < yt.len() {
        // Pick the earlier side; equal times advance both at once.
        let x_ticks = i < xt.len() && (j >= yt.len() || xt[i] <= yt[j]);
        let y_ticks = j < yt.len() && (i >= xt.len() || yt[j] <= xt[i]);

        let t = if x_ticks { xt[i] } else { yt[j] };
        if x_ticks {
            state.x = Some(xv[i].clone());
            i += 1;
        }
        if y_ticks {
            state.y = Some(yv[j].clone());
            j += 1;
        }

        let emit = match alignment {
            Alignment::Union => state.primed(),
            Alignment::Intersect => x_ticks && y_ticks,
            Alignment::Left => x_ticks && state.y.is_some(),
        };
        if emit {
            let (Some(xl), Some(yl)) = (&state.x, &state.y) else {
                // Intersect emits only when both sides just ticked, so
                // both latches are set on every emitting branch.
                unreachable!("emitting unprimed alignment");
            };
            out.push((t, xl.clone(), yl.clone()));
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::Timestamp;

    fn t(d: u32) -> Timestamp {
        Timestamp::from_ymd(2000, 1, d).unwrap()
    }

    fn iv(x: i64) -> Value {
        Value::Int(x)
    }

    fn block(knots: &[(u32, i64)]) -> Block {
        Block::new(knots.iter().map(|&(d, v)| (t(d), iv(v))).collect()).unwrap()
    }

    fn x_block() -> Block {
        block(&[(1, 1), (2, 2), (3, 3), (4, 4)])
    }

    fn y_block() -> Block {
        block(&[(2, 5), (3, 6), (5, 8)])
    }

    #[test]
    fn union_latches_the_silent_side() {
        let mut state = AlignState::new();
        let merged = merge(&x_block(), &y_block(), Alignment::Union, &mut state);
        let expected = vec![
            (t(2), iv(2), iv(5)),
            (t(3), iv(3), iv(6)),
            (t(4), iv(4), iv(6)),
            (t(5), iv(4), iv(8)),
        ];
        assert_eq!(merged, expected);
    }

    #[test]
    fn intersect_requires_simultaneous_ticks() {
        let mut state = AlignState::new();
        let merged = merge(&x_block(), &y_block(), Alignment::Intersect, &mut state);
        assert_eq!(merged, vec![(t(2), iv(2), iv(5)), (t(3), iv(3), iv(6))]);
    }

    #[test]
    fn left_follows_the_left_schedule() {
        let mut state = AlignState::new();
        let merged = merge(&x_block(), &y_block(), Alignment::Left, &mut state);
        let expected = vec![
            (t(2), iv(2), iv(5)),
            (t(3), iv(3), iv(6)),
            (t(4), iv(4), iv(6)),
        ];
        assert_eq!(merged, expected);
    }

    #[test]
    fn bootstrap_starts_emission_early() {
        let mut state = AlignState::with_initial(None, Some(iv(0)));
        let merged = merge(&x_block(), &y_block(), Alignment::Union, &mut state);
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[0], (t(1), iv(1), iv(0)));

        let mut state = AlignState::with_initial(None, Some(iv(0)));
        let merged = merge(&x_block(), &y_block(), Alignment::Left, &mut state);
        assert_eq!(merged[0], (t(1), iv(1), iv(0)));
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn latches_survive_across_blocks() {
        let mut state = AlignState::new();
        let first = merge(&block(&[(1, 1)]), &block(&[(2, 5)]), Alignment::Union, &mut state);
        assert_eq!(first, vec![(t(2), iv(1), iv(5))]);

        // The next block pair of the same evaluation continues from the
        // latched values.
        let second = merge(&block(&[(3, 3)]), &Block::empty(), Alignment::Union, &mut state);
        assert_eq!(second, vec![(t(3), iv(3), iv(5))]);
    }

    #[test]
    fn empty_sides() {
        let mut state = AlignState::new();
        assert!(merge(&Block::empty(), &Block::empty(), Alignment::Union, &mut state).is_empty());
        assert!(merge(&x_block(), &Block::empty(), Alignment::Union, &mut state).is_empty());
        let left = merge(&x_block(), &Block::empty(), Alignment::Left, &mut state);
        assert!(left.is_empty());
    }
}
