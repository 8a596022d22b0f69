//! Caller-side retry loop around [`AddressResolver::resolve`].
//!
//! The resolver never sleeps; this scheduler re-invokes it with exponential
//! backoff while it reports [`AddressError::NotYetAvailable`], bounded by
//! the launch config's SSH timeout, an optional attempt cap and an optional
//! cancellation token.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::launch::LaunchConfig;
use crate::provider::ProviderQuery;
use crate::resolver::{AddressError, AddressResolver, ResolvedAddress};
use crate::state::PipelineState;

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Broad category of a resolution failure, for diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureCause {
    /// The provider refused the floating IP association.
    Allocation,
    /// No address appeared before the budget ran out.
    Timeout,
    /// The provider API failed while refreshing the instance.
    ProviderApi,
    /// The wait was cancelled externally.
    Cancelled,
    /// There was no instance to resolve.
    MissingInstance,
}

/// Reasons the scheduler gave up on resolving an address.
#[derive(Debug, Error)]
pub enum ResolveFailure<E>
where
    E: std::error::Error + 'static,
{
    /// The deadline or attempt budget was exhausted.
    #[error(
        "could not determine a reachable address for instance {instance_id}: \
         timed out after {attempts} attempts"
    )]
    DeadlineExceeded {
        /// Instance being resolved.
        instance_id: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The cancellation token fired.
    #[error(
        "could not determine a reachable address for instance {instance_id}: \
         cancelled after {attempts} attempts"
    )]
    Cancelled {
        /// Instance being resolved.
        instance_id: String,
        /// Attempts made before cancellation.
        attempts: u32,
    },
    /// An attempt failed in a way retrying cannot fix.
    #[error("could not determine a reachable address after {attempts} attempts: {source}")]
    Fatal {
        /// Attempts made, including the failing one.
        attempts: u32,
        /// Failure reported by the resolver.
        #[source]
        source: AddressError<E>,
    },
}

impl<E> ResolveFailure<E>
where
    E: std::error::Error + 'static,
{
    /// Classifies the failure.
    #[must_use]
    pub const fn cause(&self) -> FailureCause {
        match self {
            Self::DeadlineExceeded { .. } => FailureCause::Timeout,
            Self::Cancelled { .. } => FailureCause::Cancelled,
            Self::Fatal { source, .. } => match source {
                AddressError::AllocationFailed { .. } => FailureCause::Allocation,
                AddressError::ProviderQuery { .. } => FailureCause::ProviderApi,
                AddressError::MissingInstance => FailureCause::MissingInstance,
                AddressError::NotYetAvailable { .. } => FailureCause::Timeout,
            },
        }
    }

    /// Number of resolution attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::DeadlineExceeded { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::Fatal { attempts, .. } => *attempts,
        }
    }
}

/// Retry policy for address resolution.
#[derive(Clone, Debug)]
pub struct ResolveScheduler {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    cancel: Option<CancellationToken>,
}

impl Default for ResolveScheduler {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
            max_attempts: None,
            cancel: None,
        }
    }
}

impl ResolveScheduler {
    /// Creates a scheduler with the default backoff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the delay before the second attempt.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Overrides the cap on the delay between attempts.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Stops after `attempts` attempts even when time remains.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Stops early when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves an address, retrying while none is available yet.
    ///
    /// The overall deadline is `config.ssh_timeout()` measured from the
    /// call. At least one attempt is always made.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveFailure::DeadlineExceeded`] when the budget runs
    /// out, [`ResolveFailure::Cancelled`] when the token fires and
    /// [`ResolveFailure::Fatal`] for non-retryable resolver errors.
    pub async fn run<P>(
        &self,
        resolver: &AddressResolver,
        state: &mut PipelineState,
        config: &LaunchConfig,
        provider: &P,
    ) -> Result<ResolvedAddress, ResolveFailure<P::Error>>
    where
        P: ProviderQuery + Sync,
    {
        let deadline = Instant::now().checked_add(config.ssh_timeout());
        let mut delay = self.initial_delay;
        let mut attempts: u32 = 0;

        loop {
            if self.is_cancelled() {
                return Err(ResolveFailure::Cancelled {
                    instance_id: instance_id(state),
                    attempts,
                });
            }

            attempts = attempts.saturating_add(1);
            match resolver.resolve(state, config, provider).await {
                Ok(address) => {
                    info!(%address, attempts, "instance address resolved");
                    return Ok(address);
                }
                Err(err) if err.is_retryable() => {
                    debug!(attempt = attempts, error = %err, "address not available yet");
                }
                Err(err) => {
                    warn!(attempt = attempts, error = %err, "address resolution failed");
                    return Err(ResolveFailure::Fatal {
                        attempts,
                        source: err,
                    });
                }
            }

            let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
            if out_of_attempts || remaining.is_some_and(|left| left.is_zero()) {
                warn!(attempts, "gave up waiting for an instance address");
                return Err(ResolveFailure::DeadlineExceeded {
                    instance_id: instance_id(state),
                    attempts,
                });
            }

            let pause = remaining.map_or(delay, |left| delay.min(left));
            if !self.pause(pause).await {
                return Err(ResolveFailure::Cancelled {
                    instance_id: instance_id(state),
                    attempts,
                });
            }
            delay = delay.saturating_mul(2).min(self.max_delay);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleeps for `duration`; returns `false` when cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                () = sleep(duration) => true,
                () = token.cancelled() => false,
            },
            None => {
                sleep(duration).await;
                true
            }
        }
    }
}

fn instance_id(state: &PipelineState) -> String {
    state
        .instance()
        .map(|instance| instance.id.clone())
        .unwrap_or_default()
}
