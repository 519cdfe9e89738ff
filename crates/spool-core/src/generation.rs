//! Monotonic generation tokens used to discard stale asynchronous results.
//!
//! Every mutable field that spawns asynchronous work (source, title, poster)
//! owns a [`GenerationCounter`]. Work is tagged with the generation current at
//! spawn time and its result is applied only if that generation is still the
//! latest one when the result arrives.

/// Token identifying one issued asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value, mostly useful for logging.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing [`Generation`] tokens for a single field.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    /// Start a counter with no operation issued yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Invalidate every previously issued token and return a fresh one.
    pub const fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    /// Latest token issued by this counter.
    #[must_use]
    pub const fn current(&self) -> Generation {
        Generation(self.current)
    }

    /// Whether `generation` is still the latest issued token.
    #[must_use]
    pub const fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_invalidates_older_tokens() {
        let mut counter = GenerationCounter::new();
        let first = counter.advance();
        assert!(counter.is_current(first));

        let second = counter.advance();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
        assert!(second > first);
        assert_eq!(counter.current(), second);
    }
}
