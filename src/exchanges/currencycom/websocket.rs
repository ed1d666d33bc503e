use crate::core::errors::ExchangeError;
use crate::core::kernel::{WsCodec, WsSession};
use crate::exchanges::currencycom::codec::CurrencycomCodec;
use crate::exchanges::currencycom::handler::MessageHandler;
use crate::exchanges::currencycom::subscription::{SubscriptionRegistry, SubscriptionSpec};
use crate::exchanges::currencycom::types::KlineInterval;
use rand::Rng;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, warn};

/// Stream configuration
///
/// Defaults match the exchange gateway's expectations; they are knobs
/// mostly so tests can tighten them.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Interval between application-level liveness probes, also used as
    /// the read timeout
    pub ping_interval: Duration,
    /// Consecutive failed cycles tolerated before the stream gives up
    pub max_reconnect_attempts: u32,
    /// Upper bound on the jittered reconnect backoff
    pub max_backoff: Duration,
    /// Attempts a `send` makes while the socket is not yet established
    pub send_retry_limit: u32,
    /// Delay between those attempts
    pub send_retry_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            max_backoff: Duration::from_secs(60),
            send_retry_limit: 5,
            send_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Lifecycle of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Reconnecting,
    Closing,
    /// Terminal: reconnect attempts exhausted
    Failed,
}

/// Channel access level for outbound messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

/// Jittered exponential backoff, bounded by `max_backoff` with a 1 second
/// floor: `round(random[0,1) * min(max, 2^attempts - 1) + 1)`
fn backoff_delay(attempts: u32, max_backoff: Duration) -> Duration {
    let expo = 2_u64.saturating_pow(attempts).saturating_sub(1);
    let cap = expo.min(max_backoff.as_secs());
    let jitter: f64 = rand::thread_rng().gen();
    let secs = (jitter * cap as f64 + 1.0).round() as u64;
    Duration::from_secs(secs)
}

struct Outbound {
    destination: String,
    payload: Value,
}

/// Market-data stream over the exchange's `/connect` endpoint
///
/// `spawn` starts a supervisor task that owns the transport, drives the
/// receive loop and reconnects with jittered exponential backoff. The
/// returned [`StreamHandle`] is the caller-side surface: sends,
/// subscriptions, a state watch and shutdown.
pub struct MarketStream;

impl MarketStream {
    pub fn spawn<T, H>(transport: T, handler: H) -> StreamHandle
    where
        T: WsSession + 'static,
        H: MessageHandler + 'static,
    {
        Self::spawn_with_config(transport, handler, StreamConfig::default())
    }

    pub fn spawn_with_config<T, H>(transport: T, handler: H, config: StreamConfig) -> StreamHandle
    where
        T: WsSession + 'static,
        H: MessageHandler + 'static,
    {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor {
            transport,
            handler,
            codec: CurrencycomCodec,
            config: config.clone(),
            registry: Arc::clone(&registry),
            // Pre-increment semantics: the first message on the wire
            // carries correlation id 1. Never reset on reconnect.
            correlation_id: AtomicU64::new(0),
            cmd_rx,
            state_tx,
            shutdown_rx,
        };

        let task = tokio::spawn(supervisor.run());

        StreamHandle {
            cmd_tx,
            registry,
            state_rx,
            shutdown_tx,
            task,
            config,
        }
    }
}

/// Caller-side handle to a running market-data stream
pub struct StreamHandle {
    cmd_tx: mpsc::UnboundedSender<Outbound>,
    registry: Arc<SubscriptionRegistry>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
    config: StreamConfig,
}

impl StreamHandle {
    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch channel following the session state; `SessionState::Failed`
    /// is the terminal signal that the stream gave up reconnecting
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the active logical subscriptions
    pub fn subscriptions(&self) -> Vec<SubscriptionSpec> {
        self.registry.snapshot()
    }

    /// Send a message on the public channel
    ///
    /// While the socket is not yet established (e.g. an in-flight
    /// reconnect) the call retries up to `send_retry_limit` times with a
    /// fixed delay, then gives up without surfacing an error; pending
    /// subscriptions are covered by the replay on the next connect.
    pub async fn send(&self, destination: &str, payload: Value) -> Result<(), ExchangeError> {
        self.send_with_access(destination, payload, Access::Public)
            .await
    }

    /// Send a message with an explicit access level
    ///
    /// Private-channel access is not available on this transport and
    /// fails synchronously.
    pub async fn send_with_access(
        &self,
        destination: &str,
        payload: Value,
        access: Access,
    ) -> Result<(), ExchangeError> {
        if access == Access::Private {
            return Err(ExchangeError::UnsupportedOperation(
                "private channel access is not implemented on the WebSocket transport".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            if self.state() == SessionState::Open {
                let _ = self.cmd_tx.send(Outbound {
                    destination: destination.to_string(),
                    payload,
                });
                return Ok(());
            }
            if attempt >= self.config.send_retry_limit {
                warn!(
                    destination,
                    "dropping outbound message: socket not established"
                );
                return Ok(());
            }
            attempt += 1;
            sleep(self.config.send_retry_delay).await;
        }
    }

    /// Subscribe to quote updates for the given symbols
    pub async fn subscribe_market_data(&self, symbols: Vec<String>) -> Result<(), ExchangeError> {
        self.subscribe(SubscriptionSpec::market_data(symbols)).await
    }

    /// Subscribe to order-book depth updates for the given symbols
    pub async fn subscribe_depth_market_data(
        &self,
        symbols: Vec<String>,
    ) -> Result<(), ExchangeError> {
        self.subscribe(SubscriptionSpec::depth_market_data(symbols))
            .await
    }

    /// Subscribe to OHLC updates for the given intervals and symbols
    pub async fn subscribe_ohlc_market_data(
        &self,
        intervals: &[KlineInterval],
        symbols: Vec<String>,
    ) -> Result<(), ExchangeError> {
        let intervals = intervals.iter().map(|i| i.as_str().to_string()).collect();
        self.subscribe(SubscriptionSpec::ohlc_market_data(intervals, symbols))
            .await
    }

    /// Register a subscription and send it on the active session
    ///
    /// Registered specs are replayed after every successful reconnect;
    /// an equivalent spec already present is a no-op.
    pub async fn subscribe(&self, spec: SubscriptionSpec) -> Result<(), ExchangeError> {
        if !self.registry.add(spec.clone()) {
            return Ok(());
        }
        self.send(spec.destination(), spec.payload()).await
    }

    /// Request a cooperative stop; observed at the loop's next suspension
    /// point, after which the transport is closed
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the supervisor task to finish
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

enum SessionExit {
    /// Cooperative stop requested by the caller
    Shutdown,
    /// Transport closed or errored; the supervisor decides what happens next
    ConnectionLost,
}

enum LoopEvent {
    Shutdown,
    Command(Option<Outbound>),
    Recv(Result<Option<Result<tokio_tungstenite::tungstenite::Message, ExchangeError>>, tokio::time::error::Elapsed>),
}

struct Supervisor<T, H> {
    transport: T,
    handler: H,
    codec: CurrencycomCodec,
    config: StreamConfig,
    registry: Arc<SubscriptionRegistry>,
    correlation_id: AtomicU64,
    cmd_rx: mpsc::UnboundedReceiver<Outbound>,
    state_tx: watch::Sender<SessionState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T, H> Supervisor<T, H>
where
    T: WsSession,
    H: MessageHandler,
{
    async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                self.finish().await;
                return;
            }

            match self.transport.connect().await {
                Ok(()) => {
                    // Reset immediately upon any successful open
                    attempts = 0;
                    self.state_tx.send_replace(SessionState::Open);
                    debug!("websocket connected");

                    match self.run_session().await {
                        Ok(SessionExit::Shutdown) => {
                            self.finish().await;
                            return;
                        }
                        Ok(SessionExit::ConnectionLost) => {
                            debug!("websocket connection lost");
                        }
                        Err(e) => {
                            warn!("websocket session error: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("websocket connect failed: {}", e);
                }
            }

            attempts += 1;
            if attempts >= self.config.max_reconnect_attempts {
                error!("{}", ExchangeError::ExhaustedRetries { attempts });
                self.state_tx.send_replace(SessionState::Failed);
                return;
            }

            let delay = backoff_delay(attempts, self.config.max_backoff);
            debug!(
                attempts,
                delay_secs = delay.as_secs(),
                "websocket reconnecting, {} attempts left",
                self.config.max_reconnect_attempts - attempts
            );
            self.state_tx.send_replace(SessionState::Reconnecting);

            let mut shutdown = self.shutdown_rx.clone();
            tokio::select! {
                () = sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn finish(&mut self) {
        self.state_tx.send_replace(SessionState::Closing);
        let _ = self.transport.close().await;
    }

    /// Drive one live session from just-after-connect to its exit
    ///
    /// The exchange forgets subscriptions across physical connections, so
    /// the registry is replayed first; a replay failure counts as a
    /// session failure. Each loop iteration emits a liveness probe when
    /// idle past the ping interval and reads with the same interval as
    /// the timeout.
    async fn run_session(&mut self) -> Result<SessionExit, ExchangeError> {
        self.replay_subscriptions().await?;

        let mut last_ping = Instant::now();
        loop {
            if *self.shutdown_rx.borrow() {
                return Ok(SessionExit::Shutdown);
            }

            if last_ping.elapsed() >= self.config.ping_interval {
                self.send_ping().await?;
                last_ping = Instant::now();
            }

            let event = {
                let mut shutdown = self.shutdown_rx.clone();
                tokio::select! {
                    _ = shutdown.changed() => LoopEvent::Shutdown,
                    cmd = self.cmd_rx.recv() => LoopEvent::Command(cmd),
                    recv = timeout(self.config.ping_interval, self.transport.next_raw()) => {
                        LoopEvent::Recv(recv)
                    }
                }
            };

            match event {
                LoopEvent::Shutdown => {
                    if *self.shutdown_rx.borrow() {
                        return Ok(SessionExit::Shutdown);
                    }
                }
                LoopEvent::Command(Some(out)) => {
                    self.send_envelope(&out.destination, out.payload).await?;
                    last_ping = Instant::now();
                }
                LoopEvent::Command(None) => {
                    // Every handle dropped; nothing left to serve
                    return Ok(SessionExit::Shutdown);
                }
                LoopEvent::Recv(Err(_elapsed)) => {
                    // Read timeout is a liveness check failure, not an
                    // error: probe again and keep the connection
                    debug!(
                        "no frame within {:?}, sending liveness probe",
                        self.config.ping_interval
                    );
                    self.send_ping().await?;
                    last_ping = Instant::now();
                }
                LoopEvent::Recv(Ok(None)) => {
                    return Ok(SessionExit::ConnectionLost);
                }
                LoopEvent::Recv(Ok(Some(Err(e)))) => {
                    warn!("websocket receive error: {}", e);
                    return Ok(SessionExit::ConnectionLost);
                }
                LoopEvent::Recv(Ok(Some(Ok(frame)))) => {
                    match self.codec.decode_message(&frame) {
                        // A handler error ends the session and goes
                        // through the reconnect path
                        Ok(Some(event)) => self.handler.on_message(event).await?,
                        Ok(None) => {}
                        Err(e) => {
                            debug!("discarding undecodable frame: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn replay_subscriptions(&mut self) -> Result<(), ExchangeError> {
        let specs = self.registry.snapshot();
        if specs.is_empty() {
            return Ok(());
        }

        debug!(count = specs.len(), "replaying subscriptions");
        for spec in specs {
            let correlation_id = self.next_correlation_id();
            let frame = self.codec.encode_subscription(&spec, correlation_id)?;
            self.transport.send_raw(frame).await?;
        }
        Ok(())
    }

    async fn send_envelope(
        &mut self,
        destination: &str,
        payload: Value,
    ) -> Result<(), ExchangeError> {
        let correlation_id = self.next_correlation_id();
        let frame = self
            .codec
            .encode_message(destination, payload, correlation_id)?;
        self.transport.send_raw(frame).await
    }

    async fn send_ping(&mut self) -> Result<(), ExchangeError> {
        let correlation_id = self.next_correlation_id();
        let frame = self.codec.encode_ping(correlation_id)?;
        self.transport.send_raw(frame).await
    }

    fn next_correlation_id(&self) -> u64 {
        self.correlation_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_within_documented_bounds() {
        let max_backoff = Duration::from_secs(60);
        for attempts in 1..=5 {
            let cap = (2_u64.pow(attempts) - 1).min(60);
            for _ in 0..200 {
                let delay = backoff_delay(attempts, max_backoff).as_secs();
                assert!(
                    (1..=cap + 1).contains(&delay),
                    "attempt {}: delay {} outside [1, {}]",
                    attempts,
                    delay,
                    cap + 1
                );
            }
        }
    }

    #[test]
    fn test_backoff_saturates_at_max() {
        // 2^30 - 1 far exceeds the cap; delay must stay within max + 1
        for _ in 0..200 {
            let delay = backoff_delay(30, Duration::from_secs(60)).as_secs();
            assert!((1..=61).contains(&delay));
        }
    }

    #[test]
    fn test_default_config_matches_gateway_expectations() {
        let config = StreamConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.max_backoff, Duration::from_secs(60));
        assert_eq!(config.send_retry_limit, 5);
        assert_eq!(config.send_retry_delay, Duration::from_secs(1));
    }
}
