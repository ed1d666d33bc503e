//! Scenario tests for the market-data stream supervisor
//!
//! A scripted in-memory transport stands in for the exchange gateway so
//! the reconnect, replay, liveness and send-retry behavior can be
//! exercised deterministically under paused time.

use async_trait::async_trait;
use currencycom::core::kernel::WsSession;
use currencycom::exchanges::currencycom::codec::Envelope;
use currencycom::exchanges::currencycom::websocket::{Access, MarketStream, SessionState};
use currencycom::exchanges::currencycom::{CurrencycomWsEvent, MessageHandler};
use currencycom::ExchangeError;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Script controlling how the mock transport behaves per connection
#[derive(Default, Clone)]
struct MockPlan {
    /// Every connect attempt is refused
    fail_all_connects: bool,
    /// Connect attempts numbered above this succeed no more
    fail_connects_after: Option<u32>,
    /// Connect attempts hang forever instead of completing
    never_connect: bool,
    /// Sessions numbered up to this close immediately after opening
    immediate_close_sessions: u32,
    /// First session closes once a `marketData.subscribe` frame arrives
    close_first_session_after_subscribe: bool,
    /// Frames delivered on the first session before the transport idles
    inbound_first_session: Vec<Message>,
}

/// In-memory transport that follows a [`MockPlan`]
///
/// Counts connect attempts and records every outbound envelope together
/// with the connection it was sent on.
struct MockWs {
    plan: MockPlan,
    connects: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<(u32, Envelope)>>>,
    inbound: VecDeque<Message>,
    connected: bool,
}

impl MockWs {
    fn new(plan: MockPlan) -> (Self, Arc<AtomicU32>, Arc<Mutex<Vec<(u32, Envelope)>>>) {
        let connects = Arc::new(AtomicU32::new(0));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ws = Self {
            plan,
            connects: Arc::clone(&connects),
            sent: Arc::clone(&sent),
            inbound: VecDeque::new(),
            connected: false,
        };
        (ws, connects, sent)
    }

    fn connection_number(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WsSession for MockWs {
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;

        if self.plan.never_connect {
            std::future::pending::<()>().await;
        }
        if self.plan.fail_all_connects
            || self.plan.fail_connects_after.map_or(false, |limit| n > limit)
        {
            return Err(ExchangeError::ConnectionError(
                "connection refused".to_string(),
            ));
        }

        if n == 1 {
            self.inbound = self.plan.inbound_first_session.clone().into();
        }
        self.connected = true;
        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if let Message::Text(text) = &msg {
            let envelope: Envelope = serde_json::from_str(text)
                .map_err(|e| ExchangeError::SerializationError(e.to_string()))?;
            self.sent
                .lock()
                .unwrap()
                .push((self.connection_number(), envelope));
        }
        Ok(())
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        let conn = self.connection_number();

        if conn <= self.plan.immediate_close_sessions {
            self.connected = false;
            return None;
        }
        if let Some(msg) = self.inbound.pop_front() {
            return Some(Ok(msg));
        }
        if self.plan.close_first_session_after_subscribe && conn == 1 {
            loop {
                let subscribed = {
                    let sent = self.sent.lock().unwrap();
                    sent.iter()
                        .any(|(c, env)| *c == 1 && env.destination == "marketData.subscribe")
                };
                if subscribed {
                    self.connected = false;
                    return None;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        // Idle transport: never yields, never closes
        std::future::pending::<()>().await;
        None
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[derive(Default)]
struct RecordingHandler {
    events: Arc<Mutex<Vec<CurrencycomWsEvent>>>,
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn on_message(&self, event: CurrencycomWsEvent) -> Result<(), ExchangeError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn on_message(&self, _event: CurrencycomWsEvent) -> Result<(), ExchangeError> {
        Err(ExchangeError::Other("handler rejected event".to_string()))
    }
}

/// Poll a condition until it holds, advancing paused time in small steps
async fn eventually<F: Fn() -> bool>(what: &str, cond: F) {
    tokio::time::timeout(Duration::from_secs(300), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn quote_frame(symbol: &str) -> Message {
    Message::Text(
        json!({
            "status": "OK",
            "destination": "internal.quote",
            "payload": {
                "symbolName": symbol,
                "bid": 10000.5,
                "bidQty": 1.0,
                "ofr": 10001.0,
                "ofrQty": 2.0,
                "timestamp": 1_597_850_971_558_u64
            }
        })
        .to_string(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_reconnect_attempts() {
    let (ws, connects, _sent) = MockWs::new(MockPlan {
        fail_all_connects: true,
        ..MockPlan::default()
    });
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    let states = handle.state_watch();

    handle.closed().await;

    assert_eq!(connects.load(Ordering::SeqCst), 5);
    assert_eq!(*states.borrow(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_counter_resets_on_successful_open() {
    // Two sessions open and drop immediately; every later connect is
    // refused. A reset counter yields 2 + 5 attempts, an unreset one
    // would stop at 5 total.
    let (ws, connects, _sent) = MockWs::new(MockPlan {
        immediate_close_sessions: 2,
        fail_connects_after: Some(2),
        ..MockPlan::default()
    });
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    let states = handle.state_watch();

    handle.closed().await;

    assert_eq!(connects.load(Ordering::SeqCst), 6);
    assert_eq!(*states.borrow(), SessionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_send_retries_then_gives_up_silently() {
    let (ws, _connects, sent) = MockWs::new(MockPlan {
        never_connect: true,
        ..MockPlan::default()
    });
    let handle = MarketStream::spawn(ws, RecordingHandler::default());

    let start = tokio::time::Instant::now();
    let result = handle.send("marketData.subscribe", json!({"symbols": ["BTC/USD"]})).await;

    // Five one-second retries, then a silent drop
    assert!(result.is_ok());
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_correlation_ids_increase_from_one() {
    let (ws, _connects, sent) = MockWs::new(MockPlan::default());
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    eventually("session open", || handle.state() == SessionState::Open).await;

    handle.send("a.one", json!({})).await.unwrap();
    handle.send("a.two", json!({})).await.unwrap();
    handle.send("a.three", json!({})).await.unwrap();

    eventually("three frames sent", || sent.lock().unwrap().len() == 3).await;
    let ids: Vec<u64> = sent
        .lock()
        .unwrap()
        .iter()
        .map(|(_, env)| env.correlation_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    handle.shutdown();
    handle.closed().await;
}

#[tokio::test(start_paused = true)]
async fn test_liveness_probe_on_silent_transport() {
    let (ws, _connects, sent) = MockWs::new(MockPlan::default());
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    eventually("session open", || handle.state() == SessionState::Open).await;

    // Nothing arrives; the read timeout must produce an application ping
    tokio::time::sleep(Duration::from_secs(6)).await;

    let sent = sent.lock().unwrap();
    let pings: Vec<_> = sent
        .iter()
        .filter(|(_, env)| env.destination == "ping")
        .collect();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].1.correlation_id, 1);
    assert_eq!(pings[0].1.payload, json!({}));
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_replayed_after_reconnect() {
    let (ws, connects, sent) = MockWs::new(MockPlan {
        close_first_session_after_subscribe: true,
        ..MockPlan::default()
    });
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    eventually("session open", || handle.state() == SessionState::Open).await;

    handle
        .subscribe_market_data(vec!["BTC/USD".to_string()])
        .await
        .unwrap();
    // A duplicate registration is a no-op and must not go on the wire
    handle
        .subscribe_market_data(vec!["BTC/USD".to_string()])
        .await
        .unwrap();

    eventually("reconnect", || connects.load(Ordering::SeqCst) == 2).await;
    eventually("replay on the new session", || {
        sent.lock()
            .unwrap()
            .iter()
            .any(|(conn, env)| *conn == 2 && env.destination == "marketData.subscribe")
    })
    .await;

    let sent = sent.lock().unwrap();
    let subs_per_conn = |n: u32| {
        sent.iter()
            .filter(|(conn, env)| *conn == n && env.destination == "marketData.subscribe")
            .count()
    };
    assert_eq!(subs_per_conn(1), 1);
    assert_eq!(subs_per_conn(2), 1);

    let replayed = sent
        .iter()
        .find(|(conn, env)| *conn == 2 && env.destination == "marketData.subscribe")
        .unwrap();
    assert_eq!(replayed.1.payload["symbols"], json!(["BTC/USD"]));
    // The replay draws a fresh id from the same counter
    assert_eq!(replayed.1.correlation_id, 2);

    assert_eq!(handle.subscriptions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_frames_never_reach_handler() {
    let (ws, _connects, _sent) = MockWs::new(MockPlan {
        inbound_first_session: vec![
            Message::Text("not json at all".to_string()),
            Message::Binary(vec![0x01, 0x02, 0x03]),
            quote_frame("BTC/USD"),
        ],
        ..MockPlan::default()
    });
    let handler = RecordingHandler::default();
    let events = Arc::clone(&handler.events);
    let handle = MarketStream::spawn(ws, handler);

    eventually("quote dispatched", || events.lock().unwrap().len() == 1).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The garbage was dropped without disturbing the session
    assert_eq!(handle.state(), SessionState::Open);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        CurrencycomWsEvent::Quote(quote) => assert_eq!(quote.symbol_name, "BTC/USD"),
        other => panic!("expected a quote event, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_handler_error_triggers_reconnect() {
    let (ws, connects, _sent) = MockWs::new(MockPlan {
        inbound_first_session: vec![quote_frame("BTC/USD")],
        ..MockPlan::default()
    });
    let handle = MarketStream::spawn(ws, FailingHandler);

    eventually("reconnect after handler failure", || {
        connects.load(Ordering::SeqCst) == 2 && handle.state() == SessionState::Open
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_clean_and_observable() {
    let (ws, connects, sent) = MockWs::new(MockPlan::default());
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    eventually("session open", || handle.state() == SessionState::Open).await;
    let states = handle.state_watch();

    handle.shutdown();
    handle.closed().await;

    assert_eq!(*states.borrow(), SessionState::Closing);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    // Shutdown is not signalled by a ping
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_private_channel_send_is_rejected() {
    let (ws, _connects, sent) = MockWs::new(MockPlan::default());
    let handle = MarketStream::spawn(ws, RecordingHandler::default());
    eventually("session open", || handle.state() == SessionState::Open).await;

    let result = handle
        .send_with_access("account.balance", json!({}), Access::Private)
        .await;

    assert!(matches!(
        result,
        Err(ExchangeError::UnsupportedOperation(_))
    ));
    assert!(sent.lock().unwrap().is_empty());

    handle.shutdown();
    handle.closed().await;
}
