//! Versioned snapshot lock.
//!
//! A seqlock-style primitive for publishing a small multi-field value from a
//! single writer to any number of readers without a mutex. The writer bumps
//! a version counter to odd, stores the payload words, and bumps back to
//! even; a reader copies *all* words first and only then validates that the
//! version did not move. A failed validation discards the copy and retries
//! with [`backoff`].
//!
//! The payload is held as 64-bit atomic words, so a torn read can only ever
//! produce a copy that fails validation — it is never handed to the caller.
//! This is the sanctioned way for runner state to reach other threads; it is
//! only appropriate for values whose intermediate torn copies cannot steer
//! control flow (the copy-then-validate discipline guarantees they never
//! escape).

use crate::util::backoff::backoff;
use std::sync::atomic::{fence, AtomicU64, Ordering};

/// A value that can be packed into a fixed number of 64-bit words.
pub trait Snapshot: Copy {
    /// Number of words in the packed form.
    const WIDTH: usize;

    /// Stores the packed form into `words` (all stores `Relaxed`; the lock
    /// provides the fencing).
    fn store(&self, words: &[AtomicU64]);

    /// Loads the packed form from `words` (all loads `Relaxed`).
    fn load(words: &[AtomicU64]) -> Self;
}

/// Single-writer, many-reader snapshot cell.
#[derive(Debug)]
pub struct VersionedSnapshotLock<T: Snapshot> {
    version: AtomicU64,
    words: Box<[AtomicU64]>,
    _marker: core::marker::PhantomData<T>,
}

impl<T: Snapshot> VersionedSnapshotLock<T> {
    /// Creates a lock holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let words: Box<[AtomicU64]> = (0..T::WIDTH).map(|_| AtomicU64::new(0)).collect();
        initial.store(&words);
        Self {
            version: AtomicU64::new(0),
            words,
            _marker: core::marker::PhantomData,
        }
    }

    /// Publishes a new value.
    ///
    /// Must only be called from one thread at a time (single writer). The
    /// runner that owns the lock is that writer.
    pub fn publish(&self, value: T) {
        let version = self.version.load(Ordering::Relaxed);
        // Odd version marks the write in progress.
        self.version
            .store(version.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        value.store(&self.words);
        self.version
            .store(version.wrapping_add(2), Ordering::Release);
    }

    /// Attempts one snapshot read; `None` if a write raced the copy.
    #[must_use]
    pub fn try_read(&self) -> Option<T> {
        let before = self.version.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let value = T::load(&self.words);
        fence(Ordering::Acquire);
        let after = self.version.load(Ordering::Relaxed);
        (before == after).then_some(value)
    }

    /// Reads a consistent snapshot, retrying with backoff until one
    /// validates.
    #[must_use]
    pub fn read(&self) -> T {
        let mut iteration = 0;
        loop {
            if let Some(value) = self.try_read() {
                return value;
            }
            backoff(iteration);
            iteration = iteration.saturating_add(1);
        }
    }
}
