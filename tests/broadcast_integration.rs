//! Broadcaster integration tests
//!
//! Subscribers are driven through in-memory channels standing in for
//! WebSocket halves, so no server or network is needed.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::channel::mpsc;
use futures::{Sink, StreamExt};
use tokio::task::JoinHandle;

use htmx_company_board::broadcast::{
    BroadcastConfig, BroadcastServer, CloseSlow, Closure, SubscriptionError, SLOW_CONSUMER_CODE,
    SLOW_CONSUMER_REASON,
};

type Inbound = mpsc::UnboundedSender<Result<Message, std::io::Error>>;
type Outbound = mpsc::UnboundedReceiver<Message>;
type Served = JoinHandle<Result<Closure, SubscriptionError>>;

fn server(buffer_capacity: usize) -> Arc<BroadcastServer> {
    Arc::new(BroadcastServer::new(BroadcastConfig {
        buffer_capacity,
        write_timeout: Duration::from_secs(5),
    }))
}

/// Poll `condition` until it holds, failing the test after a second
async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Serve a subscriber that reads everything it is sent
async fn connect(server: &Arc<BroadcastServer>) -> (Inbound, Outbound, Served) {
    let (to_client, from_server) = mpsc::unbounded();
    let (to_server, from_client) = mpsc::unbounded();

    let before = server.subscriber_count();
    let handle = tokio::spawn({
        let server = server.clone();
        async move { server.accept(to_client, from_client).await }
    });
    wait_until(|| server.subscriber_count() > before).await;

    (to_server, from_server, handle)
}

/// Serve a subscriber whose writes stall after the first text frame
async fn connect_stalled(server: &Arc<BroadcastServer>) -> (Inbound, StalledSink, Served) {
    let sink = StalledSink::default();
    let (to_server, from_client) = mpsc::unbounded();

    let before = server.subscriber_count();
    let handle = tokio::spawn({
        let server = server.clone();
        let sink = sink.clone();
        async move { server.accept(sink, from_client).await }
    });
    wait_until(|| server.subscriber_count() > before).await;

    (to_server, sink, handle)
}

async fn finished(handle: Served) -> Result<Closure, SubscriptionError> {
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("subscription did not finish in time")
        .unwrap()
}

async fn next_text(outbound: &mut Outbound) -> String {
    match tokio::time::timeout(Duration::from_secs(1), outbound.next()).await {
        Ok(Some(Message::Text(text))) => text.as_str().to_owned(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

fn close_frame(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: "bye".into(),
    }))
}

fn assert_slow_consumer_close(frame: &Message) {
    match frame {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, SLOW_CONSUMER_CODE);
            assert_eq!(frame.reason.as_str(), SLOW_CONSUMER_REASON);
        }
        other => panic!("expected slow consumer close frame, got {other:?}"),
    }
}

/// Sink that accepts text frames but never finishes flushing them.
/// Close frames go through.
#[derive(Clone, Default)]
struct StalledSink {
    frames: Arc<Mutex<Vec<Message>>>,
    stalled: bool,
}

impl StalledSink {
    fn frames(&self) -> Vec<Message> {
        self.frames.lock().unwrap().clone()
    }

    fn text_count(&self) -> usize {
        self.frames()
            .iter()
            .filter(|m| matches!(m, Message::Text(_)))
            .count()
    }
}

impl Sink<Message> for StalledSink {
    type Error = std::io::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.stalled = matches!(item, Message::Text(_));
        self.frames.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.stalled {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
struct CountingCloser {
    calls: AtomicUsize,
}

#[async_trait]
impl CloseSlow for CountingCloser {
    async fn close_slow(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_subscriber_receives_payloads_in_order() {
        let server = server(16);
        let (inbound, mut outbound, handle) = connect(&server).await;

        for n in 0..5 {
            server.publish(format!("change-{n}"));
        }
        for n in 0..5 {
            assert_eq!(next_text(&mut outbound).await, format!("change-{n}"));
        }

        inbound.unbounded_send(Ok(close_frame(close_code::NORMAL))).unwrap();
        let closure = handle.await.unwrap().unwrap();

        assert_eq!(closure, Closure::PeerClosed { code: Some(1000) });
        assert_eq!(server.subscriber_count(), 0);
        assert_eq!(server.stats().delivered, 5);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_every_payload() {
        let server = server(16);
        let (_in_a, mut out_a, _a) = connect(&server).await;
        let (_in_b, mut out_b, _b) = connect(&server).await;

        server.publish("shared");

        assert_eq!(next_text(&mut out_a).await, "shared");
        assert_eq!(next_text(&mut out_b).await, "shared");
    }

    #[tokio::test]
    async fn test_disconnect_without_close_frame() {
        let server = server(16);
        let (inbound, _outbound, handle) = connect(&server).await;

        drop(inbound);

        assert_eq!(handle.await.unwrap().unwrap(), Closure::Disconnected);
        assert_eq!(server.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_abnormal_close_is_reported() {
        let server = server(16);
        let (inbound, _outbound, handle) = connect(&server).await;

        inbound
            .unbounded_send(Ok(close_frame(close_code::ERROR)))
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, SubscriptionError::AbnormalClose { code: 1011, .. }));
        assert_eq!(server.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_inbound_messages_are_ignored() {
        let server = server(16);
        let (inbound, mut outbound, handle) = connect(&server).await;

        inbound
            .unbounded_send(Ok(Message::Text("hello server".into())))
            .unwrap();
        server.publish("still delivered");
        assert_eq!(next_text(&mut outbound).await, "still delivered");

        inbound.unbounded_send(Ok(close_frame(close_code::AWAY))).unwrap();
        assert_eq!(
            handle.await.unwrap().unwrap(),
            Closure::PeerClosed { code: Some(1001) }
        );
    }

    #[tokio::test]
    async fn test_peer_close_interrupts_stalled_write() {
        let server = server(16);
        let (inbound, sink, handle) = connect_stalled(&server).await;

        server.publish("p1");
        wait_until(|| sink.text_count() == 1).await;

        let started = Instant::now();
        inbound.unbounded_send(Ok(close_frame(close_code::NORMAL))).unwrap();

        assert_eq!(
            finished(handle).await.unwrap(),
            Closure::PeerClosed { code: Some(1000) }
        );
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(server.subscriber_count(), 0);
        assert_eq!(server.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_write_failure_ends_only_that_subscriber() {
        let server = server(16);
        let (_in_a, out_a, handle_a) = connect(&server).await;
        let (_in_b, mut out_b, _b) = connect(&server).await;

        drop(out_a);
        server.publish("after A went away");

        let err = handle_a.await.unwrap().unwrap_err();
        assert!(matches!(err, SubscriptionError::Write(_)));
        assert_eq!(next_text(&mut out_b).await, "after A went away");
        assert_eq!(server.subscriber_count(), 1);
    }
}

mod slow_consumer_tests {
    use super::*;

    #[tokio::test]
    async fn test_stalled_subscriber_is_closed_with_reason() {
        let server = server(2);
        let (_inbound, sink, handle) = connect_stalled(&server).await;

        // First payload is taken off the buffer and stalls in the write
        server.publish("p1");
        wait_until(|| sink.text_count() == 1).await;

        // Two fill the buffer, the next one overflows it
        server.publish("p2");
        server.publish("p3");
        server.publish("p4");

        assert_eq!(finished(handle).await.unwrap(), Closure::Evicted);

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Message::Text(t) if t.as_str() == "p1"));
        assert_slow_consumer_close(&frames[1]);

        assert_eq!(server.subscriber_count(), 0);
        assert_eq!(server.stats().evicted, 1);
    }

    #[tokio::test]
    async fn test_evicted_subscriber_gets_nothing_further() {
        let server = server(2);
        let (_in_a, mut out_a, _a) = connect(&server).await;
        let (_in_b, sink_b, handle_b) = connect_stalled(&server).await;

        server.publish("p1");
        assert_eq!(next_text(&mut out_a).await, "p1");
        wait_until(|| sink_b.text_count() == 1).await;

        for payload in ["p2", "p3", "p4"] {
            server.publish(payload);
            assert_eq!(next_text(&mut out_a).await, payload);
        }
        assert_eq!(finished(handle_b).await.unwrap(), Closure::Evicted);

        server.publish("after eviction");
        assert_eq!(next_text(&mut out_a).await, "after eviction");

        let frames = sink_b.frames();
        assert_eq!(frames.len(), 2);
        assert_slow_consumer_close(frames.last().unwrap());
        assert_eq!(server.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_overflow_evicts_exactly_once() {
        let server = server(2);
        let closer = Arc::new(CountingCloser::default());
        let mut subscription = server.subscribe(closer.clone());

        server.publish("m1");
        server.publish("m2");
        server.publish("m3");
        server.publish("m4");

        wait_until(|| closer.calls.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(closer.calls.load(Ordering::SeqCst), 1);

        // The buffered payloads are the first two; m3 was never queued
        assert_eq!(subscription.pending(), 2);
        assert_eq!(subscription.try_recv().as_deref(), Some("m1"));
        assert_eq!(subscription.try_recv().as_deref(), Some("m2"));
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_fast_one() {
        let server = server(2);
        let closer = Arc::new(CountingCloser::default());
        let _never_reads = server.subscribe(closer.clone());
        let (_inbound, mut outbound, _handle) = connect(&server).await;

        for n in 0..6 {
            server.publish(format!("n{n}"));
            assert_eq!(next_text(&mut outbound).await, format!("n{n}"));
        }

        wait_until(|| closer.calls.load(Ordering::SeqCst) == 1).await;
        assert_eq!(server.stats().evicted, 1);
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_on_stalled_subscriber() {
        let server = server(16);
        let (_inbound, _sink, _handle) = connect_stalled(&server).await;

        let started = Instant::now();
        for n in 0..1000 {
            server.publish(format!("burst-{n}"));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(server.stats().published, 1000);
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeated_connect_and_disconnect_leaves_no_residue() {
        let server = server(4);

        for _ in 0..50 {
            let (inbound, _outbound, handle) = connect(&server).await;
            drop(inbound);
            handle.await.unwrap().unwrap();
        }

        assert_eq!(server.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_unregistered() {
        let server = server(4);

        for _ in 0..1000 {
            let subscription = server.subscribe(Arc::new(CountingCloser::default()));
            server.publish("tick");
            drop(subscription);
        }

        assert_eq!(server.subscriber_count(), 0);
        assert_eq!(server.stats().evicted, 0);
    }

    #[tokio::test]
    async fn test_aborted_connection_is_unregistered() {
        let server = server(4);
        let (_inbound, _outbound, handle) = connect(&server).await;

        handle.abort();
        let _ = handle.await;

        assert_eq!(server.subscriber_count(), 0);
    }
}
