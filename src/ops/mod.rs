//! Operators: the behaviour carried by graph nodes.
//!
//! The framework layer ([`traits`], [`inception`], [`window`],
//! [`twindow`]) turns per-event combiners into node operators; the
//! library layer ([`source`], [`arith`], [`schedule`], [`stats`])
//! exposes the user-facing constructors on top of it.

pub mod arith;
pub mod combine;
pub mod inception;
pub mod schedule;
pub mod source;
pub mod stats;
pub mod traits;
pub mod twindow;
pub mod window;

pub use traits::{CombKey, Op, OpKey, OpState};
