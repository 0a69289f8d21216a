use crate::context::Context;
use crate::error::ContextError;
use crate::policy::Policy;
use crate::timer::ReusableTimer;
use std::time::Duration;
use tokio::time::Instant;

/// One sequence of attempts under a [`Policy`].
///
/// Drive it strictly sequentially: call [`should_continue`](Self::should_continue)
/// before every attempt and stop as soon as it returns `false`.
/// ```text
/// let mut retrier = policy.start(ctx);
/// while retrier.should_continue().await {
///     // one attempt
/// }
/// ```
#[derive(Debug)]
pub struct Retrier<'p> {
    ctx: Context,
    policy: &'p Policy,
    count: u64,
    delay: Duration,
    max_delay: Duration,
    timer: ReusableTimer,
    err: Option<ContextError>,
}

impl<'p> Retrier<'p> {
    pub(crate) fn new(ctx: Context, policy: &'p Policy, max_delay: Duration) -> Self {
        Self {
            ctx,
            policy,
            count: 0,
            delay: policy.min_delay(),
            max_delay,
            timer: ReusableTimer::default(),
            err: None,
        }
    }

    /// Whether another attempt should be made, waiting out the backoff first.
    ///
    /// The first call always returns `true` without waiting. Later calls return `false`
    /// once the attempt budget is spent, or when the context is (or becomes) done while
    /// waiting; in that case [`err`](Self::err) reports why.
    pub async fn should_continue(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count == 1 {
            return true;
        }

        let max_count = self.policy.max_count();
        if max_count > 0 && self.count > u64::from(max_count) {
            tracing::debug!(attempts = max_count, "retry attempts exhausted");
            return false;
        }

        let wait = self.policy.jittered(self.delay);
        tracing::debug!(attempt = self.count, ?wait, "backing off before retry");
        if let Err(err) = self.sleep_context(wait).await {
            tracing::debug!(attempt = self.count, %err, "backoff interrupted");
            self.err = Some(err);
            return false;
        }

        self.delay = self.delay.saturating_mul(2).min(self.max_delay);
        true
    }

    /// the context error that ended the last wait, if any
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        self.err
    }

    /// number of times [`should_continue`](Self::should_continue) has been called
    #[must_use]
    pub fn attempt(&self) -> u64 {
        self.count
    }

    /// Sleep for `duration` unless the context ends first.
    /// A wait that would run past the context deadline fails up front without sleeping.
    async fn sleep_context(&mut self, duration: Duration) -> Result<(), ContextError> {
        if let Some(err) = self.ctx.err() {
            return Err(err);
        }
        if duration.is_zero() {
            return Ok(());
        }
        if let Some(deadline) = self.ctx.deadline() {
            if deadline.saturating_duration_since(Instant::now()) < duration {
                return Err(ContextError::DeadlineExceeded);
            }
        }

        let ctx = &self.ctx;
        let mut armed = self.timer.arm(duration);
        let outcome = tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            () = armed.fired() => Ok(()),
        };
        outcome
    }
}
