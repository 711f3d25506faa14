//! Live session with the console
//!
//! [`SessionManager`] owns the receive loop. Each start (and each restart)
//! opens one link, sends a heartbeat and then reads datagrams until stopped:
//!
//! ```text
//! open link ─► heartbeat ─► recv ─┬─ datagram ─► decrypt ─► id filter ─► decode ─► publish
//!                   ▲             ├─ deadline ─► heartbeat
//!                   └─────────────┴─ error ────► heartbeat + backoff
//! ```
//!
//! Snapshots are published through a `watch` channel, so readers always see
//! the latest complete snapshot without locking and slow readers never hold
//! up the loop.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use gt7_telemetry::{SessionConfig, SessionManager, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> gt7_telemetry::Result<()> {
//!     let manager = Arc::new(SessionManager::new(SessionConfig::new("192.168.1.40"))?);
//!     let mut snapshots = manager.subscribe(UpdateRate::Max(10));
//!     let session = Arc::clone(&manager).spawn();
//!
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("{:.1} km/h in gear {}", snapshot.speed_kph, snapshot.current_gear);
//!     }
//!
//!     session.await.ok();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::protocol::{HEARTBEAT_RETRY_DELAY, MAX_DATAGRAM_SIZE};
use crate::stream::ThrottleExt;
use crate::transport::{Endpoint, Link, UdpEndpoint};
use crate::types::{SessionSummary, TelemetrySnapshot, UpdateRate};
use crate::{Result, TelemetryError, cipher, decoder};

/// Loop state for one open link. Dropped (and so reset) on every rebind.
#[derive(Debug, Default)]
struct SessionState {
    /// Monotonic filter; starts at 0 on every link, so id 0 is never accepted
    last_packet_id: u32,
    last_received_at: Option<Instant>,
    /// Datagrams received since the last heartbeat, accepted or not
    packets_since_heartbeat: u32,
    /// Consecutive receive errors, drives the backoff
    error_count: u32,
}

enum LinkExit {
    Stopped,
    Restart,
}

/// Clears the running flag however `start` exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Maintains the telemetry stream from one console and publishes decoded
/// snapshots.
pub struct SessionManager<E: Endpoint = UdpEndpoint> {
    endpoint: E,
    config: SessionConfig,

    snapshots: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
    summary: watch::Sender<SessionSummary>,
    received_at: watch::Sender<Option<Instant>>,
    empty: Arc<TelemetrySnapshot>,

    cancel: CancellationToken,
    restart_requested: AtomicBool,
    restart_signal: Notify,
    running: AtomicBool,
}

impl SessionManager<UdpEndpoint> {
    /// Create a manager for the console described by `config`.
    ///
    /// Nothing touches the network until [`start`](Self::start).
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = UdpEndpoint::new(&config);
        Ok(Self::with_endpoint(endpoint, config))
    }
}

impl<E: Endpoint> SessionManager<E> {
    /// Create a manager over a custom transport.
    pub fn with_endpoint(endpoint: E, config: SessionConfig) -> Self {
        let (snapshots, _) = watch::channel(None);
        let (summary, _) = watch::channel(SessionSummary::default());
        let (received_at, _) = watch::channel(None);

        Self {
            endpoint,
            config,
            snapshots,
            summary,
            received_at,
            empty: Arc::new(TelemetrySnapshot::default()),
            cancel: CancellationToken::new(),
            restart_requested: AtomicBool::new(false),
            restart_signal: Notify::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session loop on the calling task.
    ///
    /// Returns `Ok(())` after [`stop`](Self::stop), or an error when the
    /// link cannot be opened (resolve or bind failure, also on a restart).
    /// Returns [`TelemetryError::AlreadyRunning`] if the loop is already
    /// running elsewhere. A stopped manager does not start again.
    pub async fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            debug!("Session manager was stopped, not starting");
            return Ok(());
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TelemetryError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        info!(
            host = %self.config.host,
            send_port = self.config.send_port,
            receive_port = self.config.receive_port,
            "Telemetry session starting"
        );

        let mut binds = 0u32;
        loop {
            let link = tokio::select! {
                _ = self.cancel.cancelled() => break,
                link = self.endpoint.open() => link?,
            };
            binds += 1;
            // A restart requested while no link was open has been served
            self.restart_requested.store(false, Ordering::Release);
            debug!("Telemetry link {} open on {:?}", binds, link.local_addr());

            match self.run_link(link).await {
                LinkExit::Stopped => break,
                LinkExit::Restart => info!("Restarting telemetry session"),
            }
        }

        info!("Telemetry session stopped after {} bind(s)", binds);
        Ok(())
    }

    /// Run [`start`](Self::start) on a new tokio task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Stop the loop. Wakes a pending read; the manager stays stopped.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping telemetry session");
        }
        self.cancel.cancel();
    }

    /// Drop the current socket and bind a fresh one.
    ///
    /// The duplicate filter starts over on the new link. No effect once
    /// stopped.
    pub fn restart(&self) {
        debug!("Telemetry session restart requested");
        self.restart_requested.store(true, Ordering::Release);
        self.restart_signal.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Latest published snapshot, or the zero-valued snapshot before the
    /// first accepted packet.
    pub fn last_snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.snapshots.borrow().clone().unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Stream of accepted snapshots.
    ///
    /// Yields the current snapshot first if one exists, then every newer
    /// one. Under [`UpdateRate::Max`] intermediate snapshots are dropped,
    /// latest wins. The stream ends when the manager is stopped. Must be
    /// called within a tokio runtime.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<TelemetrySnapshot>> {
        let snapshots = WatchStream::new(self.snapshots.subscribe())
            .filter_map(|opt| async move { opt })
            .take_until(self.cancel.clone().cancelled_owned());

        match rate.interval() {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }

    pub fn session_summary(&self) -> SessionSummary {
        self.summary.borrow().clone()
    }

    /// Receiver that observes every summary update.
    pub fn summary_updates(&self) -> watch::Receiver<SessionSummary> {
        self.summary.subscribe()
    }

    /// When the last packet was accepted.
    pub fn last_received_at(&self) -> Option<Instant> {
        *self.received_at.borrow()
    }

    async fn run_link(&self, mut link: E::Link) -> LinkExit {
        let mut state = SessionState::default();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        self.heartbeat(&mut link, &mut state).await;

        loop {
            if self.cancel.is_cancelled() {
                return LinkExit::Stopped;
            }
            if self.restart_requested.swap(false, Ordering::AcqRel) {
                return LinkExit::Restart;
            }

            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return LinkExit::Stopped,
                _ = self.restart_signal.notified() => continue,
                received = link.recv(&mut buf) => received,
            };

            match received {
                Ok(Some(len)) => {
                    state.error_count = 0;
                    state.packets_since_heartbeat = state.packets_since_heartbeat.saturating_add(1);

                    if self.admit(&buf[..len], &mut state)
                        && state.packets_since_heartbeat > self.config.heartbeat_packet_interval
                    {
                        trace!("Keep-alive heartbeat after {} datagrams", state.packets_since_heartbeat);
                        self.heartbeat(&mut link, &mut state).await;
                    }
                }
                Ok(None) => {
                    debug!(
                        "No telemetry within {:?} (last packet {:?} ago), sending heartbeat",
                        self.config.read_timeout(),
                        state.last_received_at.map(|at| at.elapsed())
                    );
                    self.heartbeat(&mut link, &mut state).await;
                }
                Err(e) => {
                    state.error_count += 1;
                    warn!("Telemetry receive failed ({} in a row): {}", state.error_count, e);
                    self.heartbeat(&mut link, &mut state).await;

                    // Exponential backoff: 100ms, 200ms, ... capped at 1.6s
                    let backoff = Duration::from_millis(50 * (1 << state.error_count.min(5)));
                    tokio::select! {
                        _ = self.cancel.cancelled() => return LinkExit::Stopped,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    /// Send a heartbeat, retrying once after [`HEARTBEAT_RETRY_DELAY`] if the
    /// send fails. A second failure is left to the next read deadline.
    async fn heartbeat(&self, link: &mut E::Link, state: &mut SessionState) {
        state.packets_since_heartbeat = 0;
        let Err(e) = link.send_heartbeat().await else {
            trace!("Heartbeat sent");
            return;
        };
        warn!("Heartbeat failed, retrying in {:?}: {}", HEARTBEAT_RETRY_DELAY, e);

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(HEARTBEAT_RETRY_DELAY) => {}
        }

        match link.send_heartbeat().await {
            Ok(()) => debug!("Heartbeat retry succeeded"),
            Err(e) => warn!("Heartbeat retry failed: {}", e),
        }
    }

    /// Decrypt, filter and decode one datagram, publishing it if accepted.
    fn admit(&self, datagram: &[u8], state: &mut SessionState) -> bool {
        let plain = match cipher::decrypt(datagram) {
            Ok(plain) => plain,
            Err(e) => {
                trace!("Dropping {} byte datagram: {}", datagram.len(), e);
                return false;
            }
        };

        let packet_id = match decoder::packet_id(&plain) {
            Ok(id) => id,
            Err(e) => {
                trace!("Dropping packet without id: {}", e);
                return false;
            }
        };

        if packet_id <= state.last_packet_id {
            trace!("Dropping packet {} (last accepted {})", packet_id, state.last_packet_id);
            return false;
        }

        let snapshot = match decoder::decode(&plain) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                trace!("Dropping packet {}: {}", packet_id, e);
                return false;
            }
        };

        if state.last_received_at.is_none() {
            info!("Receiving telemetry (first packet {})", packet_id);
        }

        let now = Instant::now();
        state.last_packet_id = packet_id;
        state.last_received_at = Some(now);

        self.summary.send_modify(|summary| summary.observe(&snapshot));
        self.received_at.send_replace(Some(now));
        self.snapshots.send_replace(Some(Arc::new(snapshot)));
        true
    }
}

impl<E: Endpoint> Drop for SessionManager<E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
