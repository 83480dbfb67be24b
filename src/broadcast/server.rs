use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::metrics::BroadcastMetrics;

use super::registry::Registry;
use super::{
    BroadcastConfig, BroadcastStatsSnapshot, CloseSlow, Closure, EvictionSignal, Subscription,
    SubscriptionError, SLOW_CONSUMER_CODE, SLOW_CONSUMER_REASON,
};

type PeerOutcome = Result<Closure, SubscriptionError>;

/// Fan-out server for change notifications
pub struct BroadcastServer {
    config: BroadcastConfig,
    registry: Arc<Registry>,
}

impl BroadcastServer {
    /// A `buffer_capacity` of 0 is raised to 1; every subscriber needs room
    /// for at least one pending payload.
    pub fn new(mut config: BroadcastConfig) -> Self {
        config.buffer_capacity = config.buffer_capacity.max(1);
        Self {
            config,
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> BroadcastStatsSnapshot {
        self.registry.stats.snapshot()
    }

    /// Enqueue `payload` for every registered subscriber.
    ///
    /// Never waits on a subscriber: a full buffer gets its subscriber evicted
    /// on a separate task. Subscribers registering concurrently may or may not
    /// see this payload. Must be called from within a Tokio runtime.
    pub fn publish(&self, payload: impl Into<Utf8Bytes>) {
        let payload = payload.into();

        self.registry.stats.published.fetch_add(1, Ordering::Relaxed);
        BroadcastMetrics::record_published();

        let fan_out = self.registry.fan_out(&payload);

        tracing::debug!(
            bytes = payload.len(),
            queued = fan_out.queued,
            evicted = fan_out.evicted,
            "Payload published"
        );
    }

    /// Register a subscriber whose eviction is carried out by `close_slow`.
    ///
    /// The subscriber stays registered until the returned guard is dropped.
    pub fn subscribe(&self, close_slow: Arc<dyn CloseSlow>) -> Subscription {
        self.registry.insert(self.config.buffer_capacity, close_slow)
    }

    /// Serve one subscriber connection until it ends.
    ///
    /// `reader` is only watched for the peer going away; inbound messages
    /// are discarded. Published payloads are written to `writer` as text
    /// frames, each bounded by the configured write timeout. The subscriber
    /// is unregistered and `writer` closed on every exit path.
    pub async fn accept<W, R, E>(&self, mut writer: W, reader: R) -> PeerOutcome
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: std::error::Error + Send + Sync + 'static,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let eviction = Arc::new(EvictionSignal::new());
        let mut subscription = self.subscribe(eviction.clone());

        let (closed_tx, mut closed_rx) = oneshot::channel();
        let observer = AbortOnDrop(tokio::spawn(observe_close(reader, closed_tx)));

        let outcome = self
            .deliver(&mut writer, &mut subscription, &eviction, &mut closed_rx)
            .await;

        drop(observer);
        drop(subscription);
        let _ = timeout(self.config.write_timeout, writer.close()).await;

        outcome
    }

    async fn deliver<W>(
        &self,
        writer: &mut W,
        subscription: &mut Subscription,
        eviction: &EvictionSignal,
        closed: &mut oneshot::Receiver<PeerOutcome>,
    ) -> PeerOutcome
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: std::error::Error + Send + Sync + 'static,
    {
        loop {
            let event = tokio::select! {
                biased;
                _ = eviction.fired() => Event::Interrupted(Interrupt::Evicted),
                peer = &mut *closed => Event::Interrupted(Interrupt::peer(peer)),
                Some(payload) = subscription.recv() => Event::Payload(payload),
            };

            let payload = match event {
                Event::Interrupted(interrupt) => return self.finish(writer, interrupt).await,
                Event::Payload(payload) => payload,
            };

            // A write stuck on the peer is abandoned on eviction or peer close
            let interrupted = tokio::select! {
                biased;
                _ = eviction.fired() => Some(Interrupt::Evicted),
                peer = &mut *closed => Some(Interrupt::peer(peer)),
                written = self.write_frame(writer, Message::Text(payload)) => {
                    written?;
                    None
                }
            };
            if let Some(interrupt) = interrupted {
                return self.finish(writer, interrupt).await;
            }

            self.registry.stats.delivered.fetch_add(1, Ordering::Relaxed);
            BroadcastMetrics::record_delivered();
        }
    }

    async fn finish<W>(&self, writer: &mut W, interrupt: Interrupt) -> PeerOutcome
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: std::error::Error + Send + Sync + 'static,
    {
        match interrupt {
            Interrupt::Evicted => self.close_slow_consumer(writer).await,
            Interrupt::Peer(outcome) => outcome,
        }
    }

    async fn write_frame<W>(&self, writer: &mut W, frame: Message) -> Result<(), SubscriptionError>
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: std::error::Error + Send + Sync + 'static,
    {
        match timeout(self.config.write_timeout, writer.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SubscriptionError::Write(Box::new(e))),
            Err(_) => Err(SubscriptionError::WriteTimeout(self.config.write_timeout)),
        }
    }

    async fn close_slow_consumer<W>(&self, writer: &mut W) -> PeerOutcome
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: std::error::Error + Send + Sync + 'static,
    {
        let frame = Message::Close(Some(CloseFrame {
            code: SLOW_CONSUMER_CODE,
            reason: Utf8Bytes::from(SLOW_CONSUMER_REASON),
        }));

        if let Err(e) = self.write_frame(writer, frame).await {
            tracing::debug!(error = %e, "Could not send slow consumer close frame");
        }

        Ok(Closure::Evicted)
    }
}

impl Default for BroadcastServer {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

enum Event {
    Interrupted(Interrupt),
    Payload(Utf8Bytes),
}

/// Reason the delivery loop stops
enum Interrupt {
    Evicted,
    Peer(PeerOutcome),
}

impl Interrupt {
    /// The observer is gone without reporting only if it was aborted
    fn peer(reported: Result<PeerOutcome, oneshot::error::RecvError>) -> Self {
        Self::Peer(reported.unwrap_or(Ok(Closure::Disconnected)))
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drain `reader` until the peer goes away and report how it went.
async fn observe_close<R, E>(mut reader: R, closed: oneshot::Sender<PeerOutcome>)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let outcome = loop {
        match reader.next().await {
            Some(Ok(Message::Close(frame))) => break classify_close(frame),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Err(SubscriptionError::Read(Box::new(e))),
            None => break Ok(Closure::Disconnected),
        }
    };

    let _ = closed.send(outcome);
}

fn classify_close(frame: Option<CloseFrame>) -> PeerOutcome {
    match frame {
        None => Ok(Closure::PeerClosed { code: None }),
        Some(frame) if frame.code == close_code::NORMAL || frame.code == close_code::AWAY => {
            Ok(Closure::PeerClosed {
                code: Some(frame.code),
            })
        }
        Some(frame) => Err(SubscriptionError::AbnormalClose {
            code: frame.code,
            reason: frame.reason.as_str().to_owned(),
        }),
    }
}
