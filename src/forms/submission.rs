//! Single-flight wrapper around an asynchronous form action.
//!
//! The executor owns the submission state machine
//! (`Idle -> Pending -> Succeeded | Failed`). Under the default policy a submit
//! that arrives while another attempt is pending is dropped without invoking the
//! action; under `Queue` it waits for the in-flight attempt to finish first.

use async_trait::async_trait;
use std::{fmt, future::Future, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, instrument, warn};

use super::schema::TypedValues;

/// Side-effecting action run for a validated form.
#[async_trait]
pub trait SubmitAction: Send + Sync + 'static {
    type Output: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn run(&self, values: TypedValues) -> Result<Self::Output, Self::Error>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitPolicy {
    #[default]
    IgnoreWhilePending,
    Queue,
}

pub enum SubmissionState<T, E> {
    Idle,
    Pending,
    Succeeded(Arc<T>),
    Failed(Arc<E>),
}

impl<T, E> SubmissionState<T, E> {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn output(&self) -> Option<&T> {
        match self {
            Self::Succeeded(output) => Some(output),
            _ => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&E> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl<T, E> Clone for SubmissionState<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Pending => Self::Pending,
            Self::Succeeded(output) => Self::Succeeded(Arc::clone(output)),
            Self::Failed(reason) => Self::Failed(Arc::clone(reason)),
        }
    }
}

impl<T, E: fmt::Display> fmt::Debug for SubmissionState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Pending => f.write_str("Pending"),
            Self::Succeeded(_) => f.write_str("Succeeded"),
            Self::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// What happened to one `submit` call.
pub enum SubmitOutcome<T, E> {
    /// Another attempt was pending; the action was not invoked.
    Ignored,
    /// The action ran; carries the terminal state of this attempt.
    Completed(SubmissionState<T, E>),
}

impl<T, E> SubmitOutcome<T, E> {
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    #[must_use]
    pub fn into_state(self) -> Option<SubmissionState<T, E>> {
        match self {
            Self::Ignored => None,
            Self::Completed(state) => Some(state),
        }
    }
}

type State<A> = SubmissionState<<A as SubmitAction>::Output, <A as SubmitAction>::Error>;

pub struct SubmissionExecutor<A: SubmitAction> {
    action: Arc<A>,
    policy: SubmitPolicy,
    flight: Arc<Mutex<()>>,
    state: Arc<watch::Sender<State<A>>>,
}

impl<A: SubmitAction> Clone for SubmissionExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            action: Arc::clone(&self.action),
            policy: self.policy,
            flight: Arc::clone(&self.flight),
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: SubmitAction> SubmissionExecutor<A> {
    #[must_use]
    pub fn new(action: A) -> Self {
        Self::with_policy(action, SubmitPolicy::default())
    }

    #[must_use]
    pub fn with_policy(action: A, policy: SubmitPolicy) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            action: Arc::new(action),
            policy,
            flight: Arc::new(Mutex::new(())),
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn policy(&self) -> SubmitPolicy {
        self.policy
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> State<A> {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<State<A>> {
        self.state.subscribe()
    }

    /// Starts a submission attempt.
    ///
    /// Under `IgnoreWhilePending` the flight slot is claimed and the state moves
    /// to `Pending` before this returns, so a second call made before the first
    /// future resolves is ignored even if neither future has been polled yet.
    pub fn submit(
        &self,
        values: TypedValues,
    ) -> impl Future<Output = SubmitOutcome<A::Output, A::Error>> + Send + use<A> {
        let claimed = match self.policy {
            SubmitPolicy::IgnoreWhilePending => Some(self.try_begin()),
            SubmitPolicy::Queue => None,
        };
        let executor = self.clone();

        async move {
            let flight = match claimed {
                Some(Some(flight)) => flight,
                Some(None) => {
                    debug!("submission ignored: another attempt is pending");
                    return SubmitOutcome::Ignored;
                }
                None => executor.begin_queued().await,
            };
            SubmitOutcome::Completed(executor.run(flight, values).await)
        }
    }

    fn try_begin(&self) -> Option<InFlight<A>> {
        let permit = Arc::clone(&self.flight).try_lock_owned().ok()?;
        Some(self.enter(permit))
    }

    async fn begin_queued(&self) -> InFlight<A> {
        let permit = Arc::clone(&self.flight).lock_owned().await;
        self.enter(permit)
    }

    fn enter(&self, permit: OwnedMutexGuard<()>) -> InFlight<A> {
        self.state.send_replace(SubmissionState::Pending);
        InFlight {
            _permit: permit,
            state: Arc::clone(&self.state),
            settled: false,
        }
    }

    #[instrument(skip_all)]
    async fn run(&self, mut flight: InFlight<A>, values: TypedValues) -> State<A> {
        let next = match self.action.run(values).await {
            Ok(output) => SubmissionState::Succeeded(Arc::new(output)),
            Err(err) => {
                warn!("submission failed: {err}");
                SubmissionState::Failed(Arc::new(err))
            }
        };
        flight.settle(next.clone());
        next
    }
}

/// Holds the flight slot for one attempt. Dropping it unsettled (the submit
/// future was abandoned) puts the executor back to `Idle`.
struct InFlight<A: SubmitAction> {
    _permit: OwnedMutexGuard<()>,
    state: Arc<watch::Sender<State<A>>>,
    settled: bool,
}

impl<A: SubmitAction> InFlight<A> {
    fn settle(&mut self, next: State<A>) {
        self.state.send_replace(next);
        self.settled = true;
    }
}

impl<A: SubmitAction> Drop for InFlight<A> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_replace(SubmissionState::Idle);
        }
    }
}
