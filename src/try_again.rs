//! when an operation can fail in ways that a later attempt may fix, try repeatedly until
//!     - success
//!     - an error that says it is permanent
//!     - the policy runs out of attempts
//!     - the context is cancelled or its deadline would pass during the backoff

use crate::context::Context;
use crate::error::BoxError;
use crate::policy::Policy;
use crate::retryable::{classify, unmark, Disposition};
use std::future::Future;

/// Run `action` under `policy` until it succeeds or retrying stops.
///
/// See [`repeatedly_try_value`] for how failures are treated.
pub async fn repeatedly_try<E, OneTryFun, Fut>(
    ctx: Context,
    policy: &Policy,
    action: OneTryFun,
) -> Result<(), BoxError>
where
    E: Into<BoxError>,
    OneTryFun: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    repeatedly_try_value(ctx, policy, action).await
}

/// Run `action` under `policy` and return the first value it succeeds with.
///
/// - an error marked with [`mark_permanent`](crate::mark_permanent) stops at once and is
///   returned without its mark
/// - an error marked with [`mark_temporary`](crate::mark_temporary) is always retried
/// - an unmarked error whose [`Classified`](crate::Classified) capability answers
///   "not temporary" stops at once and is returned as is
/// - anything else is retried
///
/// When retrying stops because the context ended, the context error is returned in
/// place of the last action error; when the attempt budget runs out, the last action
/// error is returned.
pub async fn repeatedly_try_value<SuccessType, E, OneTryFun, Fut>(
    ctx: Context,
    policy: &Policy,
    mut action: OneTryFun,
) -> Result<SuccessType, BoxError>
where
    E: Into<BoxError>,
    OneTryFun: FnMut() -> Fut,
    Fut: Future<Output = Result<SuccessType, E>>,
{
    let mut retrier = policy.start(ctx);
    let first = retrier.should_continue().await;
    debug_assert!(first, "the first attempt is never delayed or refused");
    loop {
        let err: BoxError = match action().await {
            Ok(value) => return Ok(value),
            Err(err) => err.into(),
        };

        let disposition = classify(&*err);
        if !disposition.should_retry() {
            tracing::debug!(attempt = retrier.attempt(), ?disposition, %err, "not retrying");
            return Err(match disposition {
                Disposition::Permanent => unmark(err),
                _ => err,
            });
        }
        tracing::debug!(attempt = retrier.attempt(), %err, "attempt failed");

        if !retrier.should_continue().await {
            return Err(match retrier.err() {
                Some(ctx_err) => ctx_err.into(),
                None => unmark(err),
            });
        }
    }
}

impl Policy {
    /// Method form of [`repeatedly_try`].
    pub async fn repeatedly_try<E, OneTryFun, Fut>(
        &self,
        ctx: Context,
        action: OneTryFun,
    ) -> Result<(), BoxError>
    where
        E: Into<BoxError>,
        OneTryFun: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        repeatedly_try(ctx, self, action).await
    }
}

#[cfg(test)]
mod test {
    use super::{repeatedly_try, repeatedly_try_value};
    use crate::context::Context;
    use crate::error::{BoxError, ContextError};
    use crate::policy::Policy;
    use crate::retryable::{mark_permanent, mark_temporary, Classified, Temporary};
    use http::StatusCode;
    use std::error::Error;
    use std::fmt;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("error {0}")]
    struct Numbered(usize);

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("HTTP {0}")]
    struct RetryingStatusCode(StatusCode);

    impl Temporary for RetryingStatusCode {
        fn is_temporary(&self) -> bool {
            self.0 == StatusCode::TOO_MANY_REQUESTS || self.0.is_server_error()
        }
    }

    #[derive(Debug)]
    struct Fetching {
        source: BoxError,
    }

    impl fmt::Display for Fetching {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "some error: {}", self.source)
        }
    }

    impl Error for Fetching {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&*self.source)
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        init_tracing();
        let policy = Policy::new().with_max_count(3);
        let mut count = 0;
        let err = repeatedly_try(Context::background(), &policy, || {
            count += 1;
            let n = count;
            async move { Err::<(), _>(Numbered(n)) }
        })
        .await
        .expect_err("every attempt fails");
        assert_eq!(err.downcast_ref::<Numbered>(), Some(&Numbered(3)));
        assert_eq!(count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let policy = Policy::new();
        let mut count = 0;
        let value = repeatedly_try_value(Context::background(), &policy, || {
            count += 1;
            let n = count;
            async move {
                if n < 3 {
                    Err(Numbered(n))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .expect("third attempt succeeds");
        assert_eq!(value, 42);
        assert_eq!(count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_stops_and_unmarks() {
        let policy = Policy::new().with_max_count(10);
        let mut count = 0;
        let err = repeatedly_try_value(Context::background(), &policy, || {
            count += 1;
            async { Err::<u8, _>(mark_permanent(Numbered(7))) }
        })
        .await
        .expect_err("permanent error");
        assert_eq!(count, 1);
        assert_eq!(err.downcast_ref::<Numbered>(), Some(&Numbered(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn wrapped_permanent_stops_but_keeps_wrapper() {
        let policy = Policy::new().with_max_count(10);
        let mut count = 0;
        let err = repeatedly_try_value(Context::background(), &policy, || {
            count += 1;
            async {
                Err::<u8, _>(Fetching {
                    source: mark_permanent(Numbered(7)).into(),
                })
            }
        })
        .await
        .expect_err("permanent error");
        assert_eq!(count, 1);
        assert!(err.downcast_ref::<Fetching>().is_some());
        let found = std::iter::successors(Some(&*err as &(dyn Error + 'static)), |&e| e.source())
            .any(|e| e.downcast_ref::<Numbered>() == Some(&Numbered(7)));
        assert!(found, "original error reachable through the chain");
    }

    #[tokio::test(start_paused = true)]
    async fn temporary_runs_to_exhaustion_and_unmarks() {
        let policy = Policy::new().with_max_count(10);
        let mut count = 0;
        let err = repeatedly_try_value(Context::background(), &policy, || {
            count += 1;
            async { Err::<u8, _>(mark_temporary(Numbered(1))) }
        })
        .await
        .expect_err("temporary error");
        assert_eq!(count, 10);
        assert_eq!(err.downcast_ref::<Numbered>(), Some(&Numbered(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn capability_stops_on_not_temporary() {
        let policy = Policy::new();
        let mut count = 0;
        let err = repeatedly_try(Context::background(), &policy, || {
            count += 1;
            let status = if count < 3 {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::NOT_FOUND
            };
            async move { Err::<(), _>(Classified::new(RetryingStatusCode(status))) }
        })
        .await
        .expect_err("404 is permanent");
        assert_eq!(count, 3);
        let classified = err
            .downcast_ref::<Classified>()
            .expect("returned as is, not unwrapped");
        assert_eq!(
            classified.downcast_ref::<RetryingStatusCode>(),
            Some(&RetryingStatusCode(StatusCode::NOT_FOUND))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn temporary_mark_overrides_capability() {
        let policy = Policy::new().with_max_count(4);
        let mut count = 0;
        let err = repeatedly_try(Context::background(), &policy, || {
            count += 1;
            async {
                Err::<(), _>(mark_temporary(Classified::new(RetryingStatusCode(
                    StatusCode::NOT_FOUND,
                ))))
            }
        })
        .await
        .expect_err("exhausted");
        assert_eq!(count, 4);
        assert!(err.downcast_ref::<Classified>().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_before_first_backoff() {
        let policy = Policy::new().with_min_delay(Duration::from_secs(2));
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let mut count = 0;
        let start = Instant::now();
        let err = repeatedly_try_value(ctx, &policy, || {
            count += 1;
            async { Err::<u8, _>(Numbered(0)) }
        })
        .await
        .expect_err("deadline");
        assert_eq!(count, 1);
        assert_eq!(
            err.downcast_ref::<ContextError>(),
            Some(&ContextError::DeadlineExceeded)
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_beats_action_error() {
        let policy = Policy::new()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60))
            .with_max_count(5);
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });
        let mut count = 0;
        let start = Instant::now();
        let err = repeatedly_try(ctx, &policy, || {
            count += 1;
            async { Err::<(), _>(mark_temporary(Numbered(0))) }
        })
        .await
        .expect_err("cancelled");
        assert_eq!(
            err.downcast_ref::<ContextError>(),
            Some(&ContextError::Cancelled)
        );
        // attempts run at 0s and 1s, the cancel lands inside the 2s wait before the third
        assert_eq!(count, 2);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_still_gets_one_attempt() {
        let policy = Policy::new().with_min_delay(Duration::from_secs(1));
        let ctx = Context::background();
        ctx.cancel();
        let mut count = 0;
        let err = repeatedly_try(ctx, &policy, || {
            count += 1;
            async { Err::<(), _>(Numbered(0)) }
        })
        .await
        .expect_err("cancelled");
        assert_eq!(count, 1);
        assert_eq!(
            err.downcast_ref::<ContextError>(),
            Some(&ContextError::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sequence_is_observed() {
        let policy = Policy::new()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4))
            .with_max_count(6);
        let start = Instant::now();
        let mut seen = Vec::new();
        let _ = repeatedly_try(Context::background(), &policy, || {
            seen.push(start.elapsed().as_secs());
            async { Err::<(), _>(Numbered(0)) }
        })
        .await;
        assert_eq!(seen, vec![0, 1, 3, 7, 11, 15]);
    }

    #[tokio::test(start_paused = true)]
    async fn method_form_matches() {
        let policy = Policy::new().with_max_count(2);
        let mut count = 0;
        let err = policy
            .repeatedly_try(Context::background(), || {
                count += 1;
                let n = count;
                async move { Err::<(), _>(Numbered(n)) }
            })
            .await
            .expect_err("exhausted");
        assert_eq!(count, 2);
        assert_eq!(err.to_string(), "error 2");
    }
}
