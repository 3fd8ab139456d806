//! ConnectionSupervisor: the single-session state machine.
//!
//! The supervisor owns at most one live transport connection and moves the
//! session through these states:
//!
//! ```text
//!                start()             Opened
//! Disconnected ──────────► Connecting ──────► Connected
//!      ▲                      │  ▲                │
//!      │    LoggedOut /       │  │ Transient      │
//!      └──── give up ─────────┘  └── (retry) ─────┘
//! ```
//!
//! # Serialisation
//!
//! Every transition happens while holding one `tokio::sync::Mutex`.  That
//! covers caller-driven operations (`start`, `disconnect`, `reset`) as well as
//! transport events and credential saves, which reach the supervisor through
//! a single driver task.  Reads never take the lock: the supervisor publishes
//! a [`SessionSnapshot`] on a `watch` channel after every transition.
//!
//! # Event flow
//!
//! ```text
//! Transport ──events──► pump task (per handle) ──┐
//!                                                ├──► driver task ──► lock ──► transition
//! retry timer ──────────────────────────────────-┘
//! ```
//!
//! Each pump tags its events with the [`SessionHandle`] it was started for.
//! Events whose handle is no longer current are dropped, so a released
//! connection can never change state or write credentials.
//!
//! # Reconnects
//!
//! A transient close releases the handle and schedules one retry after an
//! exponential back-off ([`ReconnectPolicy`]).  Each external lifecycle call
//! bumps an epoch counter; a retry timer that fires under an older epoch
//! abandons itself.
//!
//! # Cancellation
//!
//! `start`, `disconnect` and `reset` run on their own task and the caller
//! only awaits its result.  A caller that stops waiting (a dropped HTTP
//! request, a timeout, shutdown) cannot interrupt a transition halfway.
//! Transport opens and logouts are bounded by deadlines so a silent upstream
//! cannot hold the lock forever, and file-system work runs on the blocking
//! pool.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use relay_core::{
    CloseReason, ConnectionState, PairingArtifact, Recipient, SendReceipt, SessionHandle,
    SessionSnapshot, TransportEvent, DEFAULT_ADDRESS_SUFFIX,
};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::errors::SessionError;
use crate::infrastructure::pairing_display::PairingDisplay;
use crate::infrastructure::storage::credential_store::{
    CredentialSaver, CredentialStore, StorageError,
};
use crate::infrastructure::transport::{
    Transport, TransportConnection, TransportError, TransportSession,
};

// ── Policy and options ────────────────────────────────────────────────────────

/// Bounds on automatic reconnection after a transient close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive transient failures tolerated before giving up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// A policy that retries without waiting.  Useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Back-off before retry number `attempt` (1-based):
    /// `initial_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Construction-time settings for a [`ConnectionSupervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub policy: ReconnectPolicy,
    /// Appended to normalised phone numbers: `digits@<suffix>`.
    pub address_suffix: String,
    /// Deadline for `Transport::open`; expiry fails the attempt.
    pub connect_timeout: Duration,
    /// Deadline for `TransportSession::logout`; expiry counts as a failed
    /// logout.
    pub logout_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
            connect_timeout: Duration::from_secs(30),
            logout_timeout: Duration::from_secs(10),
        }
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// Result of a successful [`ConnectionSupervisor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The session was already connected; nothing changed.
    AlreadyConnected,
    /// A connection attempt is already live; nothing changed.
    AlreadyConnecting,
    /// A new connection attempt was opened.
    Started(ConnectionState),
}

impl StartOutcome {
    /// Status string reported to API callers.
    pub fn status(&self) -> &'static str {
        match self {
            StartOutcome::AlreadyConnected => "already connected",
            StartOutcome::AlreadyConnecting => ConnectionState::Connecting.as_str(),
            StartOutcome::Started(state) => state.as_str(),
        }
    }
}

/// Result of [`ConnectionSupervisor::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// There was no live connection.
    AlreadyDisconnected,
    /// The live connection was released and logged out.
    Disconnected,
}

impl DisconnectOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            DisconnectOutcome::AlreadyDisconnected => "already disconnected",
            DisconnectOutcome::Disconnected => "disconnected",
        }
    }
}

// ── Internal state ────────────────────────────────────────────────────────────

/// Everything bound to one opened transport connection.  Dropping it
/// releases the connection.
struct LiveSession {
    handle: SessionHandle,
    session: Arc<dyn TransportSession>,
    saver: CredentialSaver,
    pump: JoinHandle<()>,
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

struct Inner {
    state: ConnectionState,
    live: Option<LiveSession>,
    pairing: Option<PairingArtifact>,
    /// Bumped by every caller-driven lifecycle operation.
    epoch: u64,
    transient_failures: u32,
}

impl Inner {
    fn is_current(&self, handle: SessionHandle) -> bool {
        self.live.as_ref().is_some_and(|live| live.handle == handle)
    }
}

enum DriverMessage {
    Event {
        handle: SessionHandle,
        event: TransportEvent,
    },
    StreamEnded {
        handle: SessionHandle,
    },
    RetryDue {
        epoch: u64,
    },
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Owns the session lifecycle.  Construct with [`ConnectionSupervisor::new`]
/// inside a Tokio runtime and share the returned `Arc`.
pub struct ConnectionSupervisor {
    inner: Mutex<Inner>,
    snapshot: watch::Sender<SessionSnapshot>,
    store: CredentialStore,
    transport: Arc<dyn Transport>,
    display: Arc<dyn PairingDisplay>,
    policy: ReconnectPolicy,
    address_suffix: String,
    connect_timeout: Duration,
    logout_timeout: Duration,
    driver: mpsc::UnboundedSender<DriverMessage>,
}

impl ConnectionSupervisor {
    /// Creates a disconnected supervisor and spawns its driver task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        store: CredentialStore,
        transport: Arc<dyn Transport>,
        display: Arc<dyn PairingDisplay>,
        options: SupervisorOptions,
    ) -> Arc<Self> {
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(SessionSnapshot::default());

        let supervisor = Arc::new(Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                live: None,
                pairing: None,
                epoch: 0,
                transient_failures: 0,
            }),
            snapshot,
            store,
            transport,
            display,
            policy: options.policy,
            address_suffix: options.address_suffix,
            connect_timeout: options.connect_timeout,
            logout_timeout: options.logout_timeout,
            driver: driver_tx,
        });

        tokio::spawn(run_driver(Arc::downgrade(&supervisor), driver_rx));
        supervisor
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn status(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    pub fn pairing_artifact(&self) -> Option<PairingArtifact> {
        self.snapshot.borrow().pairing.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Opens a connection unless one is already live.
    ///
    /// With `force_new` the session is reset first (logout, credentials
    /// deleted), so the new connection always starts a fresh pairing.
    ///
    /// # Errors
    ///
    /// [`SessionError::Storage`] if credentials cannot be loaded or cleared,
    /// [`SessionError::Connect`] if the transport cannot be opened within
    /// the connect timeout.  Either way the state is left at `disconnected`.
    pub async fn start(self: &Arc<Self>, force_new: bool) -> Result<StartOutcome, SessionError> {
        let this = Arc::clone(self);
        detach(async move { this.start_exclusive(force_new).await }).await
    }

    /// Releases the live connection, if any, and logs it out.
    ///
    /// # Errors
    ///
    /// [`SessionError::Logout`] if the network does not acknowledge the
    /// logout.  The state is `disconnected` by then.
    pub async fn disconnect(self: &Arc<Self>) -> Result<DisconnectOutcome, SessionError> {
        let this = Arc::clone(self);
        detach(async move {
            let mut inner = this.inner.lock().await;
            inner.epoch += 1;
            this.disconnect_locked(&mut inner).await
        })
        .await
    }

    /// Disconnects and deletes every persisted credential.  A failed logout
    /// is logged and does not stop the wipe.
    ///
    /// # Errors
    ///
    /// [`SessionError::Storage`] if the session directory cannot be cleared.
    pub async fn reset(self: &Arc<Self>) -> Result<(), SessionError> {
        let this = Arc::clone(self);
        detach(async move {
            let mut inner = this.inner.lock().await;
            inner.epoch += 1;
            this.reset_locked(&mut inner).await
        })
        .await
    }

    /// Sends a text message through the live connection.
    ///
    /// The lock is held only long enough to check the state; the caller then
    /// waits for the transport's acknowledgement with no timeout.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotConnected`] unless connected,
    /// [`SessionError::InvalidRecipient`] if `number` has no digits,
    /// [`SessionError::Send`] if the transport fails.
    pub async fn send(&self, number: &str, body: &str) -> Result<SendReceipt, SessionError> {
        let session = {
            let inner = self.inner.lock().await;
            match (&inner.live, inner.state) {
                (Some(live), ConnectionState::Connected) => Arc::clone(&live.session),
                _ => return Err(SessionError::NotConnected),
            }
        };

        let recipient = Recipient::from_number(number, &self.address_suffix)?;
        debug!("sending {} byte(s) to {recipient}", body.len());
        session
            .send_text(&recipient, body)
            .await
            .map_err(SessionError::Send)
    }

    // ── Transitions (lock held) ───────────────────────────────────────────────

    async fn start_exclusive(&self, force_new: bool) -> Result<StartOutcome, SessionError> {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;

        if force_new {
            self.reset_locked(&mut inner).await?;
        } else if inner.live.is_some() {
            return Ok(match inner.state {
                ConnectionState::Connected => StartOutcome::AlreadyConnected,
                _ => StartOutcome::AlreadyConnecting,
            });
        }

        inner.transient_failures = 0;
        self.begin_attempt(&mut inner).await?;
        Ok(StartOutcome::Started(inner.state))
    }

    async fn begin_attempt(&self, inner: &mut Inner) -> Result<(), SessionError> {
        inner.live = None;
        inner.pairing = None;
        inner.state = ConnectionState::Connecting;
        self.publish(inner);

        let (connection, saver, restoring) = match self.open_connection().await {
            Ok(opened) => opened,
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                self.publish(inner);
                return Err(e);
            }
        };

        let handle = SessionHandle::new();
        let pump = tokio::spawn(pump_events(handle, connection.events, self.driver.clone()));
        inner.live = Some(LiveSession {
            handle,
            session: connection.session,
            saver,
            pump,
        });
        self.publish(inner);

        info!(
            %handle,
            restoring,
            "transport opened; waiting for the session to authenticate"
        );
        Ok(())
    }

    /// Loads credentials and opens the transport with them.
    async fn open_connection(
        &self,
    ) -> Result<(TransportConnection, CredentialSaver, bool), SessionError> {
        let store = self.store.clone();
        let (credentials, saver) = off_runtime(move || store.load()).await?;
        let restoring = !credentials.is_empty();

        let open = tokio::time::timeout(self.connect_timeout, self.transport.open(credentials));
        let connection = open
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::Timeout {
                    operation: "open",
                    after: self.connect_timeout,
                })
            })
            .map_err(SessionError::Connect)?;
        Ok((connection, saver, restoring))
    }

    async fn disconnect_locked(
        &self,
        inner: &mut Inner,
    ) -> Result<DisconnectOutcome, SessionError> {
        let Some(live) = inner.live.take() else {
            if inner.state != ConnectionState::Disconnected || inner.pairing.is_some() {
                inner.state = ConnectionState::Disconnected;
                inner.pairing = None;
                self.publish(inner);
            }
            return Ok(DisconnectOutcome::AlreadyDisconnected);
        };

        // Release first: from here on no event or send can reach this session.
        let handle = live.handle;
        let session = Arc::clone(&live.session);
        drop(live);
        inner.state = ConnectionState::Disconnected;
        inner.pairing = None;
        inner.transient_failures = 0;
        self.publish(inner);

        let logout = tokio::time::timeout(self.logout_timeout, session.logout())
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::Timeout {
                    operation: "logout",
                    after: self.logout_timeout,
                })
            });
        match logout {
            Ok(()) => {
                info!(%handle, "session disconnected");
                Ok(DisconnectOutcome::Disconnected)
            }
            Err(e) => {
                warn!(%handle, "logout failed; the session was released anyway: {e}");
                Err(SessionError::Logout(e))
            }
        }
    }

    async fn reset_locked(&self, inner: &mut Inner) -> Result<(), SessionError> {
        // Already logged by `disconnect_locked`; the wipe goes ahead.
        let _ = self.disconnect_locked(inner).await;
        let store = self.store.clone();
        off_runtime(move || store.clear()).await?;
        inner.pairing = None;
        inner.transient_failures = 0;
        self.publish(inner);
        info!("session reset; stored credentials deleted");
        Ok(())
    }

    fn on_transient_close(&self, inner: &mut Inner, detail: &str) {
        warn!("connection closed ({detail})");
        inner.live = None;
        inner.pairing = None;
        self.schedule_retry(inner);
    }

    fn schedule_retry(&self, inner: &mut Inner) {
        inner.transient_failures += 1;
        let attempt = inner.transient_failures;

        if attempt > self.policy.max_attempts {
            warn!(
                "giving up after {} reconnect attempt(s); call /connect to try again",
                self.policy.max_attempts
            );
            inner.state = ConnectionState::Disconnected;
            inner.transient_failures = 0;
            self.publish(inner);
            return;
        }

        inner.state = ConnectionState::Connecting;
        self.publish(inner);

        let delay = self.policy.delay_for(attempt);
        let epoch = inner.epoch;
        let driver = self.driver.clone();
        info!(
            "reconnect attempt {attempt}/{} in {delay:?}",
            self.policy.max_attempts
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = driver.send(DriverMessage::RetryDue { epoch });
        });
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot.send_replace(SessionSnapshot {
            state: inner.state,
            pairing: inner.pairing.clone(),
            handle: inner.live.as_ref().map(|live| live.handle),
        });
    }

    // ── Driver callbacks ──────────────────────────────────────────────────────

    async fn on_event(&self, handle: SessionHandle, event: TransportEvent) {
        let mut inner = self.inner.lock().await;
        if !inner.is_current(handle) {
            debug!(%handle, "dropping event from a released session");
            return;
        }

        match event {
            TransportEvent::PairingCode(code) => {
                if inner.state != ConnectionState::Connecting {
                    debug!("ignoring pairing code while {}", inner.state);
                    return;
                }
                inner.pairing = Some(PairingArtifact::new(code.clone()));
                self.publish(&inner);
                drop(inner);

                info!("new pairing code available");
                let display = Arc::clone(&self.display);
                match tokio::task::spawn_blocking(move || display.show(&code)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("{e}"),
                    Err(e) => warn!("pairing display task failed: {e}"),
                }
            }
            TransportEvent::Opened => {
                inner.state = ConnectionState::Connected;
                inner.pairing = None;
                inner.transient_failures = 0;
                self.publish(&inner);
                info!(%handle, "session connected");
            }
            TransportEvent::CredentialsUpdated(credentials) => {
                let Some(saver) = inner.live.as_ref().map(|live| live.saver.clone()) else {
                    return;
                };
                // The lock stays held so a save never overlaps a reset's clear.
                if let Err(e) = off_runtime(move || saver.save(&credentials)).await {
                    warn!("failed to persist rotated credentials: {e}");
                }
            }
            TransportEvent::Closed(CloseReason::LoggedOut) => {
                inner.live = None;
                inner.pairing = None;
                inner.state = ConnectionState::Disconnected;
                inner.transient_failures = 0;
                self.publish(&inner);
                warn!("session logged out by the network; use /reset-connection to pair again");
            }
            TransportEvent::Closed(CloseReason::Transient(detail)) => {
                self.on_transient_close(&mut inner, &detail);
            }
        }
    }

    async fn on_stream_ended(&self, handle: SessionHandle) {
        let mut inner = self.inner.lock().await;
        if inner.is_current(handle) {
            self.on_transient_close(&mut inner, "event stream ended");
        }
    }

    async fn on_retry_due(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || inner.live.is_some() {
            debug!("reconnect superseded by a newer lifecycle call");
            return;
        }
        if let Err(e) = self.begin_attempt(&mut inner).await {
            warn!("reconnect attempt failed: {e}");
            self.schedule_retry(&mut inner);
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// Runs a lifecycle operation to completion on its own task, whether or not
/// the caller keeps waiting for the result.
async fn detach<T>(
    operation: impl Future<Output = Result<T, SessionError>> + Send + 'static,
) -> Result<T, SessionError>
where
    T: Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SessionError::Interrupted),
    }
}

/// Runs blocking credential I/O on the blocking pool.
async fn off_runtime<T>(
    work: impl FnOnce() -> Result<T, StorageError> + Send + 'static,
) -> Result<T, SessionError>
where
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(SessionError::from),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(SessionError::Interrupted),
    }
}

/// Forwards one connection's events to the driver, then reports the end of
/// the stream.
async fn pump_events(
    handle: SessionHandle,
    mut events: mpsc::Receiver<TransportEvent>,
    driver: mpsc::UnboundedSender<DriverMessage>,
) {
    while let Some(event) = events.recv().await {
        if driver.send(DriverMessage::Event { handle, event }).is_err() {
            return;
        }
    }
    let _ = driver.send(DriverMessage::StreamEnded { handle });
}

/// Applies driver messages one at a time until the supervisor is dropped.
async fn run_driver(
    supervisor: Weak<ConnectionSupervisor>,
    mut messages: mpsc::UnboundedReceiver<DriverMessage>,
) {
    while let Some(message) = messages.recv().await {
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        match message {
            DriverMessage::Event { handle, event } => supervisor.on_event(handle, event).await,
            DriverMessage::StreamEnded { handle } => supervisor.on_stream_ended(handle).await,
            DriverMessage::RetryDue { epoch } => supervisor.on_retry_due(epoch).await,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
