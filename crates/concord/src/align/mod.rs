//! Pairwise walker over two begin-sorted span lists.
//!
//! The walker visits pairs of elements so that every mutually overlapping
//! `(a, b)` pair becomes the current pair at least once, including stacked
//! and fully nested spans, without assuming equal cardinality or one-to-one
//! correspondence. Callers inspect [`DualListAligner::current`] between
//! steps and filter for the overlap relation they care about.

use crate::error::{ConcordError, Result};

/// A `(begin, end)` offset pair, half-open.
pub type Interval = (usize, usize);

/// Overlap-aware walker over two sorted interval lists.
///
/// The B side only ever moves forward. The A side moves forward while its
/// upcoming elements can still overlap the current B element and is rewound
/// when a B advance slides the window backward relative to A, re-exposing A
/// elements that overlap the new B. Rewinding never crosses the position
/// reached at the previous B advance, nor any prefix whose elements all end
/// at or before the new B's begin.
pub struct DualListAligner<'a> {
    a: &'a [Interval],
    b: &'a [Interval],
    /// Running maximum of `a[..=i].1`; bounds how far a rewind must go.
    max_end_a: Vec<usize>,
    a_idx: usize,
    b_idx: usize,
    /// A position at the most recent B advance; rewinds stop here.
    floor: usize,
    ignored: Vec<bool>,
    done: bool,
}

impl<'a> DualListAligner<'a> {
    /// Create a walker over two non-empty, begin-sorted interval lists.
    pub fn new(a: &'a [Interval], b: &'a [Interval]) -> Result<Self> {
        if a.is_empty() {
            return Err(ConcordError::EmptyInput("aligner list A is empty".into()));
        }
        if b.is_empty() {
            return Err(ConcordError::EmptyInput("aligner list B is empty".into()));
        }
        if a.windows(2).any(|w| w[0].0 > w[1].0) {
            return Err(ConcordError::UnsortedInput(
                "aligner list A is not sorted by begin offset".into(),
            ));
        }
        if b.windows(2).any(|w| w[0].0 > w[1].0) {
            return Err(ConcordError::UnsortedInput(
                "aligner list B is not sorted by begin offset".into(),
            ));
        }

        let mut max_end_a = Vec::with_capacity(a.len());
        let mut max = 0;
        for &(_, end) in a {
            max = max.max(end);
            max_end_a.push(max);
        }

        Ok(Self {
            a,
            b,
            max_end_a,
            a_idx: 0,
            b_idx: 0,
            floor: 0,
            ignored: vec![false; a.len()],
            done: false,
        })
    }

    /// True while [`current`](Self::current) yields a pair.
    pub fn has_next(&self) -> bool {
        !self.done
    }

    /// The current `(a, b)` pair.
    pub fn current(&self) -> (Interval, Interval) {
        (self.a[self.a_idx], self.b[self.b_idx])
    }

    /// Indices of the current pair in the input lists.
    pub fn current_indices(&self) -> (usize, usize) {
        (self.a_idx, self.b_idx)
    }

    /// Mark the current A element so it is never revisited after a rewind.
    pub fn ignore_a(&mut self) {
        self.ignored[self.a_idx] = true;
    }

    /// Advance exactly one side.
    ///
    /// Errors with [`ConcordError::AlignerExhausted`] when called after
    /// `has_next` turned false.
    pub fn step(&mut self) -> Result<()> {
        if self.done {
            return Err(ConcordError::AlignerExhausted);
        }

        let can_a = self.a_idx + 1 < self.a.len();
        let can_b = self.b_idx + 1 < self.b.len();
        let cur_a = self.a[self.a_idx];
        let cur_b = self.b[self.b_idx];

        // Prefer A while the upcoming A element can still belong to the
        // current B's window, or the current A is already fully inside it.
        let prefer_a = match self.a.get(self.a_idx + 1) {
            Some(next_a) => next_a.0 < cur_b.1 || cur_a.1 <= cur_b.1,
            None => false,
        };

        if prefer_a && can_a {
            self.a_idx += 1;
        } else if can_b {
            self.advance_b();
        } else {
            self.done = true;
        }
        Ok(())
    }

    fn advance_b(&mut self) {
        self.b_idx += 1;
        let new_b = self.b[self.b_idx];

        // The window slid backward relative to A: re-expose A elements that
        // overlap the new B, back to the previous B-advance position at most.
        while self.a_idx > self.floor && self.max_end_a[self.a_idx - 1] > new_b.0 {
            self.a_idx -= 1;
        }
        while self.ignored[self.a_idx] && self.a_idx + 1 < self.a.len() {
            self.a_idx += 1;
        }
        self.floor = self.a_idx;
    }
}
