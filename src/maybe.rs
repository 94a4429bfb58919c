//! Tick-or-quiet step results.
//!
//! An operator step either emits a knot or stays silent.  This is kept
//! distinct from `Option` so that a step whose *payload* is optional
//! cannot be confused with a step that did not tick.

/// Outcome of one operator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maybe<T> {
    /// Emit a knot carrying `T` at the current time.
    Tick(T),
    /// No knot this step.
    Quiet,
}

impl<T> Maybe<T> {
    pub fn is_tick(&self) -> bool {
        matches!(self, Self::Tick(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Maybe<U> {
        match self {
            Self::Tick(v) => Maybe::Tick(f(v)),
            Self::Quiet => Maybe::Quiet,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Tick(v) => Some(v),
            Self::Quiet => None,
        }
    }
}

impl<T> From<Option<T>> for Maybe<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Self::Tick(v),
            None => Self::Quiet,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn discriminants() {
        assert!(Maybe::Tick(1).is_tick());
        assert!(!Maybe::<i32>::Quiet.is_tick());
        assert_eq!(Maybe::Tick(2).map(|x| x * 2), Maybe::Tick(4));
        assert_eq!(Maybe::<i32>::Quiet.into_option(), None);
    }
}
