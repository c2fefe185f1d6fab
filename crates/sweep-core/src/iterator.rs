//! Odometer-style iteration over the sweep space.
//!
//! Each axis is a digit whose radix is the axis length. Digit 0 is the
//! fastest-varying axis. [`SweepIterator::advance`] increments digit 0 and
//! carries on overflow; [`SweepIterator::skip`] pins the skip axis and every
//! faster axis to their last values so that the following advance carries
//! straight into the next-slower axis.
//!
//! The iterator holds only the radices. Positions are plain [`SweepState`]
//! values passed in and returned, so the caller owns the position.
//!
//! ```rust
//! use sweep_core::iterator::{Step, SweepIterator};
//!
//! let sweep = SweepIterator::new(vec![14, 3]).unwrap();
//! let mut state = sweep.start();
//! for _ in 0..5 {
//!     state = match sweep.advance(state) {
//!         Step::Next(next) => next,
//!         Step::Done => unreachable!(),
//!     };
//! }
//! assert_eq!(state.digits(), &[5, 0]);
//!
//! // Abandon the remaining throughput values of the first group.
//! let Step::Next(state) = sweep.skip_and_advance(state, 0).unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(state.digits(), &[0, 1]);
//! ```

use crate::error::{Result, SweepError};
use crate::spec::TestSpecification;
use serde::{Deserialize, Serialize};

/// Position in the sweep: one digit per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepState {
    digits: Vec<usize>,
}

impl SweepState {
    /// Build a state from raw digits. Range checks happen in the iterator and
    /// in [`TestSpecification::decode`].
    pub fn from_digits(digits: Vec<usize>) -> Self {
        Self { digits }
    }

    pub fn digits(&self) -> &[usize] {
        &self.digits
    }

    pub fn digit(&self, axis: usize) -> Option<usize> {
        self.digits.get(axis).copied()
    }
}

/// Outcome of moving the odometer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Next(SweepState),
    /// The carry propagated past the slowest axis.
    Done,
}

impl Step {
    pub fn into_state(self) -> Option<SweepState> {
        match self {
            Step::Next(state) => Some(state),
            Step::Done => None,
        }
    }
}

/// Mixed-radix counter over the axes of a specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepIterator {
    radices: Vec<usize>,
    total: usize,
}

impl SweepIterator {
    pub fn new(radices: Vec<usize>) -> Result<Self> {
        if radices.is_empty() {
            return Err(SweepError::Config(
                "sweep needs at least one axis".to_string(),
            ));
        }
        if let Some(axis) = radices.iter().position(|&r| r == 0) {
            return Err(SweepError::Config(format!("axis {axis} has no values")));
        }
        let total = radices
            .iter()
            .try_fold(1usize, |acc, &r| acc.checked_mul(r))
            .ok_or_else(|| SweepError::Config("sweep space size overflows usize".to_string()))?;

        Ok(Self { radices, total })
    }

    pub fn from_spec(spec: &TestSpecification) -> Result<Self> {
        Self::new(spec.radices())
    }

    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    /// Product of all axis lengths.
    pub fn total_combinations(&self) -> usize {
        self.total
    }

    /// The all-zero state.
    pub fn start(&self) -> SweepState {
        SweepState::from_digits(vec![0; self.radices.len()])
    }

    fn is_valid(&self, state: &SweepState) -> bool {
        state.digits.len() == self.radices.len()
            && state
                .digits
                .iter()
                .zip(&self.radices)
                .all(|(&d, &r)| d < r)
    }

    fn check(&self, state: &SweepState) -> Result<()> {
        if self.is_valid(state) {
            Ok(())
        } else {
            Err(SweepError::Config(format!(
                "sweep state {:?} does not fit radices {:?}",
                state.digits, self.radices
            )))
        }
    }

    /// Increment digit 0, carrying into slower digits on overflow.
    pub fn advance(&self, mut state: SweepState) -> Step {
        for (digit, &radix) in state.digits.iter_mut().zip(&self.radices) {
            *digit += 1;
            if *digit < radix {
                return Step::Next(state);
            }
            *digit = 0;
        }
        Step::Done
    }

    /// Pin `axis` and every faster axis to their last values, so the next
    /// advance overflows all of them and increments axis `axis + 1`.
    pub fn skip(&self, mut state: SweepState, axis: usize) -> Result<SweepState> {
        self.check(&state)?;
        if axis >= self.radices.len() {
            return Err(SweepError::Config(format!(
                "skip axis {axis} out of range ({} axes)",
                self.radices.len()
            )));
        }
        for (digit, &radix) in state.digits[..=axis].iter_mut().zip(&self.radices) {
            *digit = radix - 1;
        }
        Ok(state)
    }

    /// `skip` followed by `advance`.
    pub fn skip_and_advance(&self, state: SweepState, axis: usize) -> Result<Step> {
        let pinned = self.skip(state, axis)?;
        Ok(self.advance(pinned))
    }

    /// Number of combinations a skip at `state` would bypass: the distance
    /// in enumeration order from `state` to its pinned form.
    pub fn elided_by_skip(&self, state: &SweepState, axis: usize) -> usize {
        match self.skip(state.clone(), axis) {
            Ok(pinned) => self.flat_index(&pinned) - self.flat_index(state),
            Err(_) => 0,
        }
    }

    /// Mixed-radix value of the state: its position in full enumeration order.
    pub fn flat_index(&self, state: &SweepState) -> usize {
        let mut index = 0;
        let mut weight = 1;
        for (&digit, &radix) in state.digits.iter().zip(&self.radices) {
            index += digit * weight;
            weight *= radix;
        }
        index
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn state_at(&self, mut flat_index: usize) -> Option<SweepState> {
        if flat_index >= self.total {
            return None;
        }
        let digits = self
            .radices
            .iter()
            .map(|&radix| {
                let digit = flat_index % radix;
                flat_index /= radix;
                digit
            })
            .collect();
        Some(SweepState::from_digits(digits))
    }

    /// Flat index of the state with `axis` removed. States that differ only
    /// in `axis` share a series index.
    pub fn series_index(&self, state: &SweepState, axis: usize) -> usize {
        let mut index = 0;
        let mut weight = 1;
        for (i, (&digit, &radix)) in state.digits.iter().zip(&self.radices).enumerate() {
            if i == axis {
                continue;
            }
            index += digit * weight;
            weight *= radix;
        }
        index
    }

    /// Every state in full enumeration order.
    pub fn iter(&self) -> States<'_> {
        States {
            sweep: self,
            next: Some(self.start()),
        }
    }
}

/// Iterator over all states of a [`SweepIterator`].
#[derive(Debug, Clone)]
pub struct States<'a> {
    sweep: &'a SweepIterator,
    next: Option<SweepState>,
}

impl Iterator for States<'_> {
    type Item = SweepState;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = self.sweep.advance(current.clone()).into_state();
        Some(current)
    }
}
