use crate::context::Context;
use crate::random::{RandomSource, SharedRng};
use crate::retrier::Retrier;
use std::sync::Arc;
use std::time::Duration;

/// random perturbation of each backoff wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    #[default]
    None,
    /// adds a draw from `[0, magnitude)` to the nominal delay
    Lengthen(Duration),
    /// subtracts a draw from `[0, magnitude)`, never going below zero
    Shorten(Duration),
}

/// Shape of an exponential backoff.
///
/// The first attempt is never delayed. Each later attempt waits the current delay
/// (plus jitter), after which the delay doubles up to `max_delay`.
///
/// A policy does not change once retrying starts and can be shared by any number of
/// [`Retrier`]s at once; they only share its random source.
#[derive(Debug, Clone)]
pub struct Policy {
    min_delay: Duration,
    max_delay: Duration,
    max_count: u32,
    jitter: Jitter,
    random: Arc<dyn RandomSource>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_count: 0,
            jitter: Jitter::None,
            random: Arc::new(SharedRng::new()),
        }
    }
}

impl Policy {
    /// no delay, no jitter, unbounded attempts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// first delay, zero means retry immediately
    #[must_use]
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// ceiling for the doubling delay, anything below `min_delay` means `min_delay`
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// total number of attempts including the first, zero means unbounded
    #[must_use]
    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    #[must_use]
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    #[must_use]
    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// the ceiling actually applied: `max(max_delay, min_delay)`
    #[must_use]
    pub fn effective_max_delay(&self) -> Duration {
        self.max_delay.max(self.min_delay)
    }

    /// Begin a sequence of attempts bound to `ctx`.
    #[must_use]
    pub fn start(&self, ctx: Context) -> Retrier<'_> {
        Retrier::new(ctx, self, self.effective_max_delay())
    }

    /// `nominal` perturbed by one jitter draw
    #[must_use]
    pub fn jittered(&self, nominal: Duration) -> Duration {
        match self.jitter {
            Jitter::None => nominal,
            Jitter::Lengthen(magnitude) => nominal.saturating_add(self.draw(magnitude)),
            Jitter::Shorten(magnitude) => nominal.saturating_sub(self.draw(magnitude)),
        }
    }

    fn draw(&self, magnitude: Duration) -> Duration {
        let bound = u64::try_from(magnitude.as_nanos()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.random.below(bound))
    }
}
