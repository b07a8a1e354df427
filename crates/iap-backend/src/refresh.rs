//! Single-flight credential renewal with bounded retries
//!
//! At most one renewal cycle runs per process. Callers that hit an
//! unauthorized response while a cycle is in flight attach as waiters and
//! are all resumed with the same outcome when the cycle resolves. A cycle
//! makes up to `max_retry_count` refresh attempts with exponential backoff
//! between them, re-reading the stored refresh token on every attempt, then
//! falls back to re-registration with the device identity. Only a failed
//! registration is terminal.
//!
//! The new credential pair is persisted before any waiter resumes, so a
//! waiter that observes success can immediately re-read a valid token.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use iap_auth::{Credential, CredentialStore, RegisterRequest, TokenPair};

/// Transport for the two renewal endpoints.
///
/// Implemented by `BackendClient` over the real backend; kept as a trait so
/// renewal logic is testable against scripted outcomes. Neither operation
/// may enter the refresh flow itself.
pub trait RenewalTransport: Send + Sync {
    /// `POST /users/refresh` with the refresh token as bearer.
    fn refresh_credential<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = iap_auth::Result<TokenPair>> + Send + 'a>>;

    /// `POST /users/register` with the device identity.
    fn register_identity<'a>(
        &'a self,
        request: &'a RegisterRequest,
    ) -> Pin<Box<dyn Future<Output = iap_auth::Result<TokenPair>> + Send + 'a>>;
}

/// Retry schedule for refresh attempts.
///
/// A transiently failed attempt `i` (0-indexed) is followed by a sleep of
/// `base_delay * 2^i` before the next attempt; nothing sleeps after the
/// last attempt. The schedule is deterministic, no jitter. A rejected
/// token skips the remaining attempts entirely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retry_count: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Terminal result of one renewal cycle, broadcast to every waiter.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new pair was persisted to the store before this was sent.
    Refreshed(Credential),
    /// Refresh and re-registration both failed; the session is dead until
    /// the application re-onboards.
    Failed(String),
}

/// Cycle state plus the waiter list, guarded by one mutex so that
/// "check running / register waiter" is a single atomic step.
enum CycleState {
    Idle,
    Running {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Coordinates credential renewal across all in-flight requests.
pub struct RefreshCoordinator {
    transport: Arc<dyn RenewalTransport>,
    store: Arc<dyn CredentialStore>,
    policy: RetryPolicy,
    state: Mutex<CycleState>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn RenewalTransport>,
        store: Arc<dyn CredentialStore>,
        policy: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            policy,
            state: Mutex::new(CycleState::Idle),
        })
    }

    /// Wait for a usable credential, starting a renewal cycle if none is
    /// running.
    ///
    /// The cycle executes on a detached task: a caller dropped mid-wait
    /// detaches from its waiter slot without stopping the cycle for the
    /// others.
    pub async fn ensure_valid_credential(self: &Arc<Self>) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();

        let start_cycle = {
            let mut state = self.state.lock().await;
            match &mut *state {
                CycleState::Running { waiters } => {
                    waiters.push(tx);
                    debug!(waiters = waiters.len(), "renewal already running, queued");
                    false
                }
                CycleState::Idle => {
                    *state = CycleState::Running { waiters: vec![tx] };
                    true
                }
            }
        };

        if start_cycle {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = coordinator.run_cycle().await;
                coordinator.resolve(outcome).await;
            });
        }

        match rx.await {
            Ok(outcome) => outcome,
            // Sender only disappears if the runtime tears the cycle task down
            Err(_) => RefreshOutcome::Failed("renewal cycle was torn down".into()),
        }
    }

    /// Resume every waiter with the cycle's outcome and return to `Idle`.
    async fn resolve(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, CycleState::Idle) {
                CycleState::Running { waiters } => waiters,
                CycleState::Idle => Vec::new(),
            }
        };
        debug!(waiters = waiters.len(), "renewal cycle resolved");
        for waiter in waiters {
            // A detached waiter just misses the broadcast
            let _ = waiter.send(outcome.clone());
        }
    }

    /// One renewal cycle: bounded refresh attempts, then registration.
    async fn run_cycle(&self) -> RefreshOutcome {
        metrics::counter!("iap_renewal_cycles_total").increment(1);

        for attempt in 0..self.policy.max_retry_count {
            // Re-read each attempt: a pair written while we were backing off
            // supersedes the one this cycle started with
            let refresh_token = match self.store.credential().await {
                Some(credential) if !credential.refresh_token.is_empty() => {
                    credential.refresh_token
                }
                _ => {
                    info!("no refresh token stored, registering directly");
                    return self.reregister().await;
                }
            };

            match self.transport.refresh_credential(&refresh_token).await {
                Ok(pair) => {
                    let credential = Credential::new(pair.access_token, pair.refresh_token);
                    if let Err(e) = self.store.set_credential(credential.clone()).await {
                        warn!(error = %e, "failed to persist refreshed credential");
                        return RefreshOutcome::Failed(format!(
                            "persisting refreshed credential: {e}"
                        ));
                    }
                    info!(attempt, "token refresh succeeded");
                    return RefreshOutcome::Refreshed(credential);
                }
                Err(iap_auth::Error::RefreshRejected(msg)) => {
                    warn!(attempt, error = %msg, "refresh token rejected, registering");
                    metrics::counter!("iap_refresh_rejected_total").increment(1);
                    return self.reregister().await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "refresh attempt failed");
                    metrics::counter!("iap_refresh_retries_total").increment(1);
                    if attempt + 1 < self.policy.max_retry_count {
                        let delay = self.policy.backoff(attempt);
                        debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "backing off before next refresh attempt"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        info!("refresh attempts exhausted, registering");
        self.reregister().await
    }

    /// Rebuild the credential from the device identity.
    async fn reregister(&self) -> RefreshOutcome {
        metrics::counter!("iap_registrations_total").increment(1);

        let Some(identity) = self.store.identity().await else {
            warn!("cannot register: no device identity stored");
            return RefreshOutcome::Failed("no device identity stored".into());
        };

        let request = RegisterRequest {
            user_id: identity.device_id.clone(),
            sdk_key: identity.registration_key.clone(),
        };

        match self.transport.register_identity(&request).await {
            Ok(pair) => {
                let credential = Credential::new(pair.access_token, pair.refresh_token);
                if let Err(e) = self.store.set_credential(credential.clone()).await {
                    warn!(error = %e, "failed to persist registered credential");
                    return RefreshOutcome::Failed(format!(
                        "persisting registered credential: {e}"
                    ));
                }
                info!(device_id = %identity.device_id, "re-registration succeeded");
                RefreshOutcome::Refreshed(credential)
            }
            Err(e) => {
                warn!(device_id = %identity.device_id, error = %e, "re-registration failed");
                RefreshOutcome::Failed(format!("registration failed: {e}"))
            }
        }
    }
}
