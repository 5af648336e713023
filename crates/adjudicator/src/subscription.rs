//! PollingSubscription: watches one channel cell and publishes dispute events.
//!
//! A background task polls the ledger every `polling_interval`, diffs the fresh status
//! against the last one seen, and publishes an [AdjudicatorEvent] when a funded
//! channel enters dispute. The task ends on [PollingSubscription::close], on a
//! protocol violation, or (with a bounded policy) after too many failed polls; the
//! reason is then available from [PollingSubscription::err] and the stream ends.

use crate::client::{ClientError, LedgerClient};
use crate::config::{PollFailurePolicy, SubscriptionConfig};
use crate::differ::{diff, StatusChange};
use crate::error::{ProtocolViolation, SubscriptionError};
use crate::event::{AdjudicatorEvent, RegisteredEvent};
use crate::timeout::dispute_timeout;
use crate::types::{ChannelConstants, ChannelId, ChannelStatus, ChannelToken, LiveChannel};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

/// How the channel cell is looked up on the next poll.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Id(ChannelId),
    /// Pinned to one cell instance; never goes back to an id scan.
    Token(ChannelToken),
}

/// Subscription to the adjudication events of one channel.
///
/// Dropping it cancels the background task.
pub struct PollingSubscription {
    events: mpsc::Receiver<AdjudicatorEvent>,
    cancel: watch::Sender<bool>,
    err: Arc<OnceLock<SubscriptionError>>,
}

impl PollingSubscription {
    /// Watch the channel with the given id. The first cell found is pinned by its token.
    /// Must be called from within a tokio runtime.
    pub fn subscribe<C>(client: Arc<C>, id: ChannelId, config: SubscriptionConfig) -> Self
    where
        C: LedgerClient + ?Sized + 'static,
    {
        Self::spawn(client, Lookup::Id(id), config)
    }

    /// Watch the channel cell instance identified by `token`.
    pub fn subscribe_with_token<C>(client: Arc<C>, token: ChannelToken, config: SubscriptionConfig) -> Self
    where
        C: LedgerClient + ?Sized + 'static,
    {
        Self::spawn(client, Lookup::Token(token), config)
    }

    fn spawn<C>(client: Arc<C>, lookup: Lookup, config: SubscriptionConfig) -> Self
    where
        C: LedgerClient + ?Sized + 'static,
    {
        let (event_tx, events) = mpsc::channel(config.buffer_size.max(1));
        let (cancel, cancel_rx) = watch::channel(false);
        let err = Arc::new(OnceLock::new());
        let worker = Worker {
            client,
            lookup,
            config,
            constants: None,
            last: None,
            failures: 0,
            events: event_tx,
            cancel: cancel_rx,
            err: Arc::clone(&err),
        };
        tokio::spawn(worker.run());
        Self { events, cancel, err }
    }

    /// The event stream, in observation order. Ends once the subscription is closed.
    pub fn events(&mut self) -> &mut mpsc::Receiver<AdjudicatorEvent> {
        &mut self.events
    }

    /// Next event, or `None` once the subscription has ended.
    pub async fn next_event(&mut self) -> Option<AdjudicatorEvent> {
        self.events.recv().await
    }

    /// Why the subscription ended. `None` while it is still running.
    pub fn err(&self) -> Option<&SubscriptionError> {
        self.err.get()
    }

    /// Request cancellation. The stream is closed by the background task, not here.
    pub fn close(&self) {
        self.cancel.send_replace(true);
    }
}

impl Stream for PollingSubscription {
    type Item = AdjudicatorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

struct Worker<C: ?Sized> {
    client: Arc<C>,
    lookup: Lookup,
    config: SubscriptionConfig,
    /// Cached after the first successful poll; immutable on-chain.
    constants: Option<ChannelConstants>,
    last: Option<ChannelStatus>,
    failures: u32,
    events: mpsc::Sender<AdjudicatorEvent>,
    cancel: watch::Receiver<bool>,
    err: Arc<OnceLock<SubscriptionError>>,
}

impl<C: LedgerClient + ?Sized> Worker<C> {
    async fn run(mut self) {
        let reason = self.poll_loop().await;
        match &reason {
            SubscriptionError::Closed => tracing::debug!("subscription closed"),
            SubscriptionError::ProtocolViolation(v) => {
                tracing::error!(reason = %v, "subscription stopped on protocol violation")
            }
            SubscriptionError::PollFailuresExhausted { .. } => {
                tracing::warn!(reason = %reason, "subscription stopped")
            }
        }
        // The error must be in place before the sender drops and the stream ends.
        let _ = self.err.set(reason);
    }

    async fn poll_loop(&mut self) -> SubscriptionError {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.changed() => return SubscriptionError::Closed,
                _ = sleep(self.config.polling_interval) => {}
            }
            if let Err(reason) = self.tick().await {
                return reason;
            }
        }
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    async fn tick(&mut self) -> Result<(), SubscriptionError> {
        let live = match self.poll().await {
            Ok(live) => {
                self.failures = 0;
                live
            }
            Err(e) => return self.on_poll_failure(e),
        };
        if self.cancelled() {
            return Err(SubscriptionError::Closed);
        }
        if self.constants.is_none() {
            self.constants = Some(live.constants.clone());
        }
        match diff(self.last.as_ref(), &live.status)? {
            StatusChange::Unchanged => {}
            change @ (StatusChange::Baseline | StatusChange::Funding) => {
                tracing::debug!(
                    ?change,
                    version = live.status.version(),
                    funded = live.status.funded,
                    "channel status updated"
                );
                self.last = Some(live.status);
            }
            StatusChange::Dispute => {
                let event = self.registered_event(&live).await?;
                tracing::info!(
                    channel = %event.channel_id(),
                    version = event.version(),
                    deadline = %event.timeout().deadline,
                    "channel dispute registered"
                );
                self.publish(event).await?;
                self.last = Some(live.status);
            }
        }
        Ok(())
    }

    async fn poll(&mut self) -> Result<LiveChannel, ClientError> {
        match self.lookup {
            Lookup::Token(token) => self.client.find_by_token(&token).await,
            Lookup::Id(id) => {
                let live = self.client.find_by_id(&id).await?;
                let token = live.constants.thread_token;
                tracing::debug!(channel = %id, %token, "pinned channel token");
                self.lookup = Lookup::Token(token);
                Ok(live)
            }
        }
    }

    fn on_poll_failure(&mut self, e: ClientError) -> Result<(), SubscriptionError> {
        self.failures = self.failures.saturating_add(1);
        if e.is_not_found() {
            tracing::debug!(reason = %e, failures = self.failures, "channel cell not found, retrying");
        } else {
            tracing::warn!(reason = %e, failures = self.failures, "poll failed, retrying");
        }
        match self.config.poll_failures {
            PollFailurePolicy::Bounded { max_consecutive } if self.failures >= max_consecutive => {
                Err(SubscriptionError::PollFailuresExhausted {
                    attempts: self.failures,
                    source: e,
                })
            }
            _ => Ok(()),
        }
    }

    async fn registered_event(&self, live: &LiveChannel) -> Result<AdjudicatorEvent, ProtocolViolation> {
        let params = &self.constants.as_ref().unwrap_or(&live.constants).params;
        let timeout = dispute_timeout(self.client.as_ref(), params, live.block_number).await?;
        Ok(AdjudicatorEvent::Registered(RegisteredEvent {
            channel_id: live.status.state.channel_id,
            version: live.status.version(),
            timeout,
        }))
    }

    /// Blocks while the stream is full, unless cancelled meanwhile.
    async fn publish(&mut self, event: AdjudicatorEvent) -> Result<(), SubscriptionError> {
        tokio::select! {
            biased;
            _ = self.cancel.changed() => Err(SubscriptionError::Closed),
            sent = self.events.send(event) => sent.map_err(|_| SubscriptionError::Closed),
        }
    }
}
