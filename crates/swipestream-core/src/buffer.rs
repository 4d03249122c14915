//! Randomized, non-repeating selection buffer.
//!
//! The buffer turns a fixed candidate id list into a lazy stream where no id
//! is delivered twice until every candidate has been delivered once (a
//! "pass"), at which point a new full pass begins. A small lookahead pool
//! lets consumers pre-fetch supporting data for upcoming items.
//!
//! Selection is true sampling-without-replacement: the ids still unused in
//! the current pass are kept as an explicit working set of candidate indices
//! and drawn with `swap_remove`, so a valid draw is guaranteed whenever any
//! unused id exists. There is no retry loop and no attempt cap.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::error::BufferError;

/// Default lookahead pool size.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Non-repeating randomized id stream with bounded lookahead.
///
/// All mutation happens under one internal lock, so the buffer can be shared
/// by reference between the decision flow and a pre-fetcher.
#[derive(Debug)]
pub struct SelectionBuffer {
    candidates: Vec<String>,
    pool_size: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Candidate indices not yet drawn in the current pass.
    unused: Vec<usize>,
    /// Drawn indices waiting to become current, head first.
    pool: VecDeque<usize>,
    /// Completed-pass counter, starting at 0 for the first pass.
    pass: u64,
    rng: Pcg64,
}

impl SelectionBuffer {
    /// Build a buffer over `candidates` with a lookahead pool of `pool_size`.
    ///
    /// # Errors
    /// Returns `EmptyCandidateSet` if `candidates` is empty.
    pub fn new(candidates: Vec<String>, pool_size: usize) -> Result<Self, BufferError> {
        Self::with_rng(candidates, pool_size, Pcg64::from_entropy())
    }

    /// Deterministic variant for reproducible sequences.
    pub fn with_seed(
        candidates: Vec<String>,
        pool_size: usize,
        seed: u64,
    ) -> Result<Self, BufferError> {
        Self::with_rng(candidates, pool_size, Pcg64::seed_from_u64(seed))
    }

    fn with_rng(candidates: Vec<String>, pool_size: usize, rng: Pcg64) -> Result<Self, BufferError> {
        if candidates.is_empty() {
            return Err(BufferError::EmptyCandidateSet);
        }
        let pool_size = pool_size.max(1);
        let buffer = Self {
            inner: Mutex::new(Inner {
                unused: (0..candidates.len()).collect(),
                pool: VecDeque::with_capacity(pool_size),
                pass: 0,
                rng,
            }),
            candidates,
            pool_size,
        };
        {
            let mut inner = buffer.inner.lock().unwrap();
            buffer.fill_pool(&mut inner);
        }
        Ok(buffer)
    }

    /// The id at the head of the pool.
    ///
    /// # Errors
    /// Returns `Exhausted` if the pool is empty, which cannot happen for a
    /// successfully constructed buffer.
    pub fn current(&self) -> Result<String, BufferError> {
        let inner = self.inner.lock().unwrap();
        inner
            .pool
            .front()
            .map(|&index| self.candidates[index].clone())
            .ok_or(BufferError::Exhausted)
    }

    /// Drop the head of the pool and top the pool back up.
    pub fn advance(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.pool.pop_front();
        self.fill_pool(&mut inner);
    }

    /// Snapshot of the pooled ids, head first. Intended for pre-fetching.
    pub fn lookahead(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .pool
            .iter()
            .map(|&index| self.candidates[index].clone())
            .collect()
    }

    /// How many passes have been completed so far.
    pub fn pass(&self) -> u64 {
        self.inner.lock().unwrap().pass
    }

    /// Number of candidate ids the buffer draws from.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn fill_pool(&self, inner: &mut Inner) {
        while inner.pool.len() < self.pool_size {
            let index = Self::draw(inner, self.candidates.len());
            inner.pool.push_back(index);
        }
    }

    /// Draw one index uniformly from the unused working set, resetting the
    /// pass first if the set is empty.
    fn draw(inner: &mut Inner, candidate_count: usize) -> usize {
        if inner.unused.is_empty() {
            inner.unused.extend(0..candidate_count);
            inner.pass += 1;
        }
        let position = inner.rng.gen_range(0..inner.unused.len());
        inner.unused.swap_remove(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("id-{i}")).collect()
    }

    /// Deliver `n` ids by reading current and advancing.
    fn drain(buffer: &SelectionBuffer, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| {
                let id = buffer.current().unwrap();
                buffer.advance();
                id
            })
            .collect()
    }

    #[test]
    fn empty_candidate_set_is_fatal() {
        assert_eq!(
            SelectionBuffer::new(Vec::new(), 4).unwrap_err(),
            BufferError::EmptyCandidateSet
        );
    }

    #[test]
    fn first_pass_is_a_permutation() {
        let buffer = SelectionBuffer::with_seed(ids(25), 4, 7).unwrap();
        let seen = drain(&buffer, 25);
        let distinct: HashSet<_> = seen.iter().cloned().collect();
        assert_eq!(distinct.len(), 25);
        assert_eq!(distinct, ids(25).into_iter().collect());
    }

    #[test]
    fn every_pass_repeats_the_full_set() {
        let buffer = SelectionBuffer::with_seed(ids(10), 3, 42).unwrap();
        let first: HashSet<_> = drain(&buffer, 10).into_iter().collect();
        let second: HashSet<_> = drain(&buffer, 10).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
    }

    #[test]
    fn advancing_n_times_never_exhausts() {
        let buffer = SelectionBuffer::with_seed(ids(6), 2, 3).unwrap();
        for _ in 0..6 {
            assert!(buffer.current().is_ok());
            buffer.advance();
        }
        // Wraps into the next pass instead of running dry.
        assert!(buffer.current().is_ok());
    }

    #[test]
    fn three_candidates_pool_of_two() {
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let buffer = SelectionBuffer::with_seed(candidates.clone(), 2, 99).unwrap();

        let pool = buffer.lookahead();
        assert_eq!(pool.len(), 2);
        assert!(pool.iter().all(|id| candidates.contains(id)));
        assert_ne!(pool[0], pool[1]);
        assert_eq!(buffer.current().unwrap(), pool[0]);

        let seen: HashSet<_> = drain(&buffer, 3).into_iter().collect();
        assert_eq!(seen, candidates.into_iter().collect());
    }

    #[test]
    fn pool_larger_than_candidate_set_still_cycles() {
        let buffer = SelectionBuffer::with_seed(ids(2), 5, 1).unwrap();
        let seen: HashSet<_> = drain(&buffer, 2).into_iter().collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn pass_counter_tracks_resets() {
        let buffer = SelectionBuffer::with_seed(ids(3), 1, 5).unwrap();
        assert_eq!(buffer.pass(), 0);
        drain(&buffer, 3);
        // The pool has pre-drawn from the next pass by now.
        assert_eq!(buffer.pass(), 1);
    }

    proptest! {
        /// For any candidate set of size n, the first n delivered ids are a
        /// permutation of the set, for any pool size and seed.
        #[test]
        fn no_repeat_before_exhaustion(n in 1usize..40, pool in 1usize..8, seed in any::<u64>()) {
            let candidates = ids(n);
            let buffer = SelectionBuffer::with_seed(candidates.clone(), pool, seed).unwrap();
            let seen = drain(&buffer, n);
            let distinct: HashSet<_> = seen.into_iter().collect();
            prop_assert_eq!(distinct, candidates.into_iter().collect::<HashSet<_>>());
        }
    }
}
