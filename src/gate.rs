//! Debouncing and auto-cancellation suppression for list reads.
//!
//! Every request passes through [`RequestGate::dispatch`]. Anything other than
//! `GET /api/collections/{name}/records` goes straight to the transport.
//! List reads are keyed by path and query:
//!
//! - the first read for a key is sent after a single scheduler yield;
//! - a read arriving while another for the same key is waiting or in flight
//!   releases that caller with [`Supersession::Debounced`] and waits out the
//!   quiet period itself, so only the newest read of a burst is delivered;
//! - a read the transport auto-cancelled resolves to [`Supersession::Transport`].
//!
//! A key's entry stays in the table until its network call returns, and calls
//! for one key never overlap. A superseded call is left to finish on its own
//! task; only its waiting caller is released. Dispatch therefore needs a
//! running tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::DEFAULT_DEBOUNCE;
use crate::error::{Error, Supersession};
use crate::transport::{ApiRequest, Transport};

/// Held by the one network call currently running for a key.
type FlightLock = Arc<tokio::sync::Mutex<()>>;

struct PendingRequest {
    ticket: u64,
    cancel: oneshot::Sender<()>,
    flight: FlightLock,
}

type PendingTable = Mutex<HashMap<String, PendingRequest>>;

pub struct RequestGate<T> {
    transport: Arc<T>,
    quiet_period: Duration,
    pending: PendingTable,
    next_ticket: AtomicU64,
}

/// Removes the table entry for `ticket` when dropped, unless a newer ticket owns the key.
struct PendingGuard<'a> {
    table: &'a PendingTable,
    key: &'a str,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut table = lock(self.table);
        if table.get(self.key).is_some_and(|p| p.ticket == self.ticket) {
            table.remove(self.key);
        }
    }
}

fn lock(table: &PendingTable) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport> RequestGate<T> {
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_quiet_period(transport, DEFAULT_DEBOUNCE)
    }

    #[must_use]
    pub fn with_quiet_period(transport: Arc<T>, quiet_period: Duration) -> Self {
        Self {
            transport,
            quiet_period,
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Number of list reads currently waiting or in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Send `request`, debouncing it if it is a list read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Superseded`] when a newer read for the same key took
    /// this one's place, or when the transport auto-cancelled it. Any other
    /// transport error is returned unchanged.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<Value, Error> {
        if !request.is_list_read() {
            return self.transport.send(request).await;
        }

        let key = request.debounce_key();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (cancel, mut cancelled) = oneshot::channel();

        let (superseded_previous, flight) = {
            let mut table = lock(&self.pending);
            let flight: FlightLock = table
                .get(&key)
                .map_or_else(FlightLock::default, |p| Arc::clone(&p.flight));
            let entry = PendingRequest {
                ticket,
                cancel,
                flight: Arc::clone(&flight),
            };
            match table.insert(key.clone(), entry) {
                Some(previous) => {
                    // The previous caller may already be gone.
                    let _ = previous.cancel.send(());
                    (true, flight)
                }
                None => (false, flight),
            }
        };
        let guard = PendingGuard {
            table: &self.pending,
            key: &key,
            ticket,
        };

        let quiet_period = self.quiet_period;
        let wait = async move {
            if superseded_previous {
                tokio::time::sleep(quiet_period).await;
            } else {
                tokio::task::yield_now().await;
            }
            flight.lock_owned().await
        };

        let permit = tokio::select! {
            biased;
            _ = &mut cancelled => {
                tracing::debug!(key = %key, ticket, "list read superseded before dispatch");
                return Err(Error::Superseded(Supersession::Debounced));
            }
            permit = wait => permit,
        };

        let transport = Arc::clone(&self.transport);
        let mut call = tokio::spawn(async move {
            let _permit = permit;
            transport.send(request).await
        });

        let joined = tokio::select! {
            biased;
            _ = &mut cancelled => {
                tracing::debug!(key = %key, ticket, "in-flight list read superseded");
                return Err(Error::Superseded(Supersession::Debounced));
            }
            joined = &mut call => joined,
        };
        drop(guard);

        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::Aborted(e.to_string())),
        };
        match result {
            Err(e) if e.is_auto_cancelled() => {
                tracing::debug!(key = %key, error = %e, "list read auto-cancelled by transport");
                Err(Error::Superseded(Supersession::Transport))
            }
            other => other,
        }
    }
}
