//! randomness for jitter
//! a policy may be shared by many retriers at once, so the source behind it has to be
//! usable from several tasks; it is injected rather than global so tests can pin it

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait RandomSource: Send + Sync + fmt::Debug {
    /// a value drawn uniformly from `[0, bound)`
    /// `bound` is never zero
    fn below(&self, bound: u64) -> u64;
}

/// seeded on first draw and then guarded by a lock
#[derive(Default)]
pub struct SharedRng {
    rng: OnceLock<Mutex<StdRng>>,
}

impl SharedRng {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn seeded() -> StdRng {
        StdRng::from_rng(OsRng).unwrap_or_else(|err| {
            tracing::debug!(%err, "entropy unavailable, seeding jitter from the clock");
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |since| since.as_nanos() as u64);
            StdRng::seed_from_u64(nanos)
        })
    }
}

impl fmt::Debug for SharedRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRng")
            .field("seeded", &self.rng.get().is_some())
            .finish()
    }
}

impl RandomSource for SharedRng {
    fn below(&self, bound: u64) -> u64 {
        let mut rng = self
            .rng
            .get_or_init(|| Mutex::new(Self::seeded()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..bound)
    }
}

/// always draws the same value, clamped under the bound
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct Fixed(pub u64);

#[cfg(test)]
impl RandomSource for Fixed {
    fn below(&self, bound: u64) -> u64 {
        self.0.min(bound - 1)
    }
}
