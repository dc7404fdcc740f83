//! # Event Gateway
//!
//! Delivers each committed ingredient change to the cascade exactly once,
//! and never a change whose write rolled back.
//!
//! ## Delivery Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Post-Commit Delivery                            │
//! │                                                                         │
//! │  writer                                                                 │
//! │    pending = handle.pending()                                           │
//! │    pending.record(event)                                                │
//! │    store.update_ingredient(..)  ── Err ──► pending dropped, discarded  │
//! │    pending.release()            ── try_send, never blocks              │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     EventDispatcher::run                        │   │
//! │  │                                                                 │   │
//! │  │  select!                                                        │   │
//! │  │    event from channel ──► deliver(event)                        │   │
//! │  │    relay tick         ──► deliver(each stale pending row)       │   │
//! │  │    shutdown           ──► stop                                  │   │
//! │  │                                                                 │   │
//! │  │  deliver:                                                       │   │
//! │  │    outbox.claim(event_id, lease cutoff)                         │   │
//! │  │      false ──► held or finished elsewhere, skip                 │   │
//! │  │      true  ──► cascade.on_ingredient_changed(ingredient_id)     │   │
//! │  │                  clean report ──► mark_dispatched               │   │
//! │  │                  report with failures ──► mark_failed           │   │
//! │  │                  lookup failed ──► release, or give up after    │   │
//! │  │                                    max_delivery_attempts        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The relay covers everything the hot path can lose: a full channel, a
//! crash between commit and release, a dispatcher that was not running.
//! A dispatcher that dies mid-delivery leaves a claim without a dispatch
//! mark; once that claim is older than `claim_lease_secs` the relay takes it
//! over. Redelivery recomputes from current prices, so it only costs work.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use costify_core::IngredientUpdated;

use crate::cascade::{CascadeReport, IngredientChangeCascade};
use crate::config::GatewaySettings;
use crate::error::{StoreError, StoreResult};
use crate::ports::EventOutbox;

// =============================================================================
// Pending Events
// =============================================================================

/// Events recorded during a write, held back until the write commits.
///
/// Dropping it without calling [`PendingEvents::release`] discards them.
#[derive(Debug)]
pub struct PendingEvents {
    events: Vec<IngredientUpdated>,
    sender: mpsc::Sender<IngredientUpdated>,
}

impl PendingEvents {
    pub fn record(&mut self, event: IngredientUpdated) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hands the events to the dispatcher. Call only after the commit
    /// returned `Ok`.
    ///
    /// ## Returns
    /// How many went onto the channel. The rest stay in the outbox for the
    /// relay.
    pub fn release(mut self) -> usize {
        let mut sent = 0;
        for event in std::mem::take(&mut self.events) {
            let event_id = event.event_id;
            match self.sender.try_send(event) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(event_id = %event_id, "Dispatcher queue full, leaving event to the relay");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(event_id = %event_id, "Dispatcher stopped, leaving event to the relay");
                }
            }
        }
        sent
    }
}

impl Drop for PendingEvents {
    fn drop(&mut self) {
        if !self.events.is_empty() {
            debug!(count = self.events.len(), "Discarding events of an uncommitted write");
        }
    }
}

// =============================================================================
// Gateway Handle
// =============================================================================

/// Cloneable handle used by writers and by whoever owns the dispatcher.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    event_tx: mpsc::Sender<IngredientUpdated>,
    shutdown_tx: mpsc::Sender<()>,
}

impl GatewayHandle {
    /// Starts collecting events for one write.
    pub fn pending(&self) -> PendingEvents {
        PendingEvents {
            events: Vec::new(),
            sender: self.event_tx.clone(),
        }
    }

    /// Triggers graceful shutdown. Returns `false` if the dispatcher had
    /// already stopped.
    pub async fn shutdown(&self) -> bool {
        self.shutdown_tx.send(()).await.is_ok()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// What happened to one delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// This dispatcher claimed the event and ran the cascade.
    Delivered(CascadeReport),

    /// Another delivery holds a live claim, or delivery already finished.
    AlreadyClaimed,

    /// The cascade could not start; the event is claimable again.
    Released { error: String },

    /// The cascade could not start and the event ran out of attempts.
    GaveUp { error: String },
}

/// Consumes released events and relays stale outbox rows.
pub struct EventDispatcher {
    cascade: Arc<IngredientChangeCascade>,
    outbox: Arc<dyn EventOutbox>,
    settings: GatewaySettings,
    event_rx: mpsc::Receiver<IngredientUpdated>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl EventDispatcher {
    /// Creates a new dispatcher and returns a handle.
    pub fn new(
        cascade: Arc<IngredientChangeCascade>,
        outbox: Arc<dyn EventOutbox>,
        settings: GatewaySettings,
    ) -> (Self, GatewayHandle) {
        let (event_tx, event_rx) = mpsc::channel(settings.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = EventDispatcher {
            cascade,
            outbox,
            settings,
            event_rx,
            shutdown_rx,
        };

        (dispatcher, GatewayHandle { event_tx, shutdown_tx })
    }

    /// Spawns [`EventDispatcher::run`] on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs the dispatcher loop until shutdown.
    ///
    /// Events still queued at shutdown remain undispatched in the outbox and
    /// are picked up by the next relay sweep.
    pub async fn run(mut self) {
        info!("Event dispatcher starting");

        let mut interval = tokio::time::interval(self.settings.relay_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => {
                    self.deliver(&event).await;
                }

                _ = interval.tick() => {
                    if let Err(e) = self.relay_sweep().await {
                        error!(error = %e, "Relay sweep failed");
                    }
                    if let Err(e) = self.prune().await {
                        warn!(error = %e, "Outbox prune failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Event dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Event dispatcher stopped");
    }

    /// Delivers everything already queued, then runs one relay sweep.
    ///
    /// For one-shot processes that do not keep a dispatcher running.
    pub async fn drain(&mut self) -> StoreResult<Vec<DeliveryOutcome>> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            outcomes.push(self.deliver(&event).await);
        }
        outcomes.extend(self.relay_sweep().await?);
        Ok(outcomes)
    }

    /// Claims stale undispatched rows and delivers them, oldest first.
    pub async fn relay_sweep(&self) -> StoreResult<Vec<DeliveryOutcome>> {
        let now = Utc::now();
        let stale = self
            .outbox
            .pending(
                now - self.settings.relay_grace(),
                now - self.settings.claim_lease(),
                self.settings.relay_batch_size,
            )
            .await?;

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        info!(count = stale.len(), "Relaying undispatched events");

        let mut outcomes = Vec::with_capacity(stale.len());
        for entry in stale {
            outcomes.push(self.deliver(&entry.event).await);
        }
        Ok(outcomes)
    }

    /// Deletes dispatched events past the retention window.
    pub async fn prune(&self) -> StoreResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(self.settings.retention_days);
        let pruned = self.outbox.prune(cutoff).await?;
        if pruned > 0 {
            info!(count = pruned, "Pruned dispatched events");
        }
        Ok(pruned)
    }

    /// Claims one event and, if the claim wins, runs the cascade.
    pub async fn deliver(&self, event: &IngredientUpdated) -> DeliveryOutcome {
        let event_id = event.event_id;

        let stale_before = Utc::now() - self.settings.claim_lease();
        match self.outbox.claim(event_id, stale_before).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(event_id = %event_id, "Event already claimed");
                return DeliveryOutcome::AlreadyClaimed;
            }
            Err(e) => {
                // Unclaimed, so the relay will see it again
                error!(event_id = %event_id, error = %e, "Failed to claim event");
                return DeliveryOutcome::Released {
                    error: e.to_string(),
                };
            }
        }

        debug!(
            event_id = %event_id,
            ingredient_id = %event.ingredient_id,
            "Delivering ingredient change"
        );

        match self.cascade.on_ingredient_changed(&event.ingredient_id).await {
            Ok(report) => {
                let marked = match report.failure_summary() {
                    Some(summary) => self.outbox.mark_failed(event_id, &summary).await,
                    None => self.outbox.mark_dispatched(event_id).await,
                };
                if let Err(e) = marked {
                    // Still claimed; redelivered once the lease runs out
                    error!(event_id = %event_id, error = %e, "Failed to finish event");
                }
                DeliveryOutcome::Delivered(report)
            }
            Err(e) => self.handle_cascade_error(event, e).await,
        }
    }

    async fn handle_cascade_error(&self, event: &IngredientUpdated, err: StoreError) -> DeliveryOutcome {
        let event_id = event.event_id;
        let message = err.to_string();

        let attempts = match self.outbox.entry(event_id).await {
            Ok(Some(entry)) => entry.attempts,
            Ok(None) => self.settings.max_delivery_attempts,
            Err(e) => {
                error!(event_id = %event_id, error = %e, "Failed to read outbox entry");
                self.settings.max_delivery_attempts
            }
        };

        if attempts < self.settings.max_delivery_attempts {
            warn!(
                event_id = %event_id,
                ingredient_id = %event.ingredient_id,
                attempts,
                error = %message,
                "Cascade could not start, releasing event"
            );
            if let Err(e) = self.outbox.release(event_id, &message).await {
                error!(event_id = %event_id, error = %e, "Failed to release event");
            }
            DeliveryOutcome::Released { error: message }
        } else {
            error!(
                event_id = %event_id,
                ingredient_id = %event.ingredient_id,
                attempts,
                error = %message,
                "Giving up on event"
            );
            if let Err(e) = self.outbox.mark_failed(event_id, &message).await {
                error!(event_id = %event_id, error = %e, "Failed to mark event failed");
            }
            DeliveryOutcome::GaveUp { error: message }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
