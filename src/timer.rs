//! backoff timer owned by a single retrier
//! the same `Sleep` is reset between attempts instead of being reallocated,
//! and an armed timer that does not fire is dropped from the timer wheel when its guard goes away

use crate::context::deadline_after;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::Sleep;

#[derive(Debug, Default)]
pub(crate) struct ReusableTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ReusableTimer {
    pub(crate) fn arm(&mut self, duration: Duration) -> Armed<'_> {
        let deadline = deadline_after(duration);
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(tokio::time::sleep_until(deadline))),
        }
        Armed {
            slot: &mut self.sleep,
            fired: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self) -> bool {
        self.sleep.is_some()
    }
}

/// an armed timer, released on drop unless it fired
#[derive(Debug)]
pub(crate) struct Armed<'a> {
    slot: &'a mut Option<Pin<Box<Sleep>>>,
    fired: bool,
}

impl Armed<'_> {
    pub(crate) async fn fired(&mut self) {
        if let Some(sleep) = self.slot.as_mut() {
            sleep.as_mut().await;
        }
        self.fired = true;
    }
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        if !self.fired {
            self.slot.take();
        }
    }
}
