//! WebSocket client for one bar's live order feed.
//!
//! Frames are read by a single task and applied to the shared [`LiveBoard`]
//! under its write lock, so application order equals delivery order. Once
//! [`LiveOrderChannel::close`] has run (or the channel is dropped) no further
//! frame touches the board.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jcr_schemas::{BarKind, ClientMessage, LiveOrder, OrderId};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::board::{Applied, LiveBoard};
use crate::codec;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const UPDATE_BUFFER: usize = 256;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors / hooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Handshake with the hub failed.
    Connect(String),
    /// Outbound frame could not be written.
    Send(String),
    /// Frame was not valid channel JSON.
    Decode(String),
    /// Channel closed locally or by the hub.
    Closed,
    /// Handshake or `wait_for` deadline passed.
    Timeout,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Connect(m) => write!(f, "live channel connect failed: {m}"),
            ChannelError::Send(m) => write!(f, "live channel send failed: {m}"),
            ChannelError::Decode(m) => write!(f, "live channel frame invalid: {m}"),
            ChannelError::Closed => write!(f, "live channel closed"),
            ChannelError::Timeout => write!(f, "timed out waiting for live channel"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// How [`LiveOrderChannel::open_with`] reaches the hub.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Sent as `Authorization: Bearer <token>` on the upgrade request.
    pub bearer: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            bearer: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Called once per order inserted into the mirror (the audible alert).
pub trait OrderNotifier: Send + Sync {
    fn order_placed(&self, bar: BarKind, order: &LiveOrder);
}

pub struct SilentNotifier;

impl OrderNotifier for SilentNotifier {
    fn order_placed(&self, _bar: BarKind, _order: &LiveOrder) {}
}

/// Fan-out of what the reader task did, for views that redraw on change.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardUpdate {
    Applied(Applied),
    Disconnected,
}

// ---------------------------------------------------------------------------
// LiveOrderChannel
// ---------------------------------------------------------------------------

pub struct LiveOrderChannel {
    bar: BarKind,
    board: Arc<RwLock<LiveBoard>>,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    updates: broadcast::Sender<BoardUpdate>,
    closed: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl LiveOrderChannel {
    /// Connect to `url` and subscribe to `bar` with default [`ConnectOptions`].
    pub async fn open(
        url: &str,
        bar: BarKind,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Result<Self, ChannelError> {
        Self::open_with(url, bar, notifier, &ConnectOptions::default()).await
    }

    /// Connect to `url` and subscribe to `bar`. The handshake and the
    /// subscribe frame together must finish within `opts.timeout`.
    pub async fn open_with(
        url: &str,
        bar: BarKind,
        notifier: Arc<dyn OrderNotifier>,
        opts: &ConnectOptions,
    ) -> Result<Self, ChannelError> {
        let (sink, stream) = tokio::time::timeout(opts.timeout, handshake(url, bar, opts))
            .await
            .map_err(|_| {
                warn!(
                    url,
                    bar = %bar,
                    timeout_ms = opts.timeout.as_millis() as u64,
                    "live channel handshake timed out"
                );
                ChannelError::Timeout
            })??;
        info!(url, bar = %bar, "live channel subscribed");

        let board = Arc::new(RwLock::new(LiveBoard::new(bar)));
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        let closed = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            stream,
            ReaderShared {
                bar,
                board: Arc::clone(&board),
                updates: updates.clone(),
                closed: Arc::clone(&closed),
                connected: Arc::clone(&connected),
                notifier,
            },
        ));

        Ok(Self {
            bar,
            board,
            sink: Arc::new(Mutex::new(sink)),
            updates,
            closed,
            connected,
            reader: Some(reader),
        })
    }

    pub fn bar(&self) -> BarKind {
        self.bar
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// False once the hub side has gone away.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub async fn board(&self) -> LiveBoard {
        self.board.read().await.clone()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<BoardUpdate> {
        self.updates.subscribe()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Ask the hub to complete `order_id`. With `optimistic`, the order is
    /// shown as completing until the hub's `order_completed` arrives.
    pub async fn request_complete(
        &self,
        order_id: OrderId,
        optimistic: bool,
    ) -> Result<(), ChannelError> {
        if optimistic {
            self.board.write().await.mark_completing(order_id);
        }
        let sent = self.send(&ClientMessage::RequestComplete { order_id }).await;
        if sent.is_err() && optimistic {
            self.board.write().await.cancel_completing(order_id);
        }
        sent
    }

    /// Ask the hub to change the open flag. The requested value is shown
    /// until the hub broadcasts `open_status_changed`.
    pub async fn request_set_open(&self, open: bool) -> Result<(), ChannelError> {
        self.board.write().await.set_open_optimistic(open);
        let sent = self.send(&ClientMessage::RequestSetOpen { open }).await;
        if sent.is_err() {
            self.board.write().await.clear_pending_open();
        }
        sent
    }

    async fn send(&self, msg: &ClientMessage) -> Result<(), ChannelError> {
        if self.is_closed() || !self.is_connected() {
            return Err(ChannelError::Closed);
        }
        let text = codec::encode_client(msg)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Waiting
    // -----------------------------------------------------------------------

    /// Wait until `pred` holds for the mirror, returning a copy of it.
    pub async fn wait_for<P>(&self, timeout: Duration, pred: P) -> Result<LiveBoard, ChannelError>
    where
        P: Fn(&LiveBoard) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut rx = self.updates.subscribe();
        loop {
            {
                let board = self.board.read().await;
                if pred(&board) {
                    return Ok(board.clone());
                }
            }
            if self.is_closed() || !self.is_connected() {
                return Err(ChannelError::Closed);
            }
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => return Err(ChannelError::Timeout),
                Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return Err(ChannelError::Closed),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop processing frames and send a close frame. Idempotent.
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taking the write lock waits out any frame mid-application.
        drop(self.board.write().await);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Err(e) = self.sink.lock().await.close().await {
            debug!(error = %e, "live channel close frame not delivered");
        }
        info!(bar = %self.bar, "live channel closed");
    }
}

impl Drop for LiveOrderChannel {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

async fn handshake(
    url: &str,
    bar: BarKind,
    opts: &ConnectOptions,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), ChannelError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ChannelError::Connect(e.to_string()))?;
    if let Some(token) = &opts.bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ChannelError::Connect(format!("invalid bearer token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws, _resp) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| ChannelError::Connect(e.to_string()))?;
    let (mut sink, stream) = ws.split();

    let subscribe = codec::encode_client(&ClientMessage::Subscribe { bar })?;
    sink.send(Message::Text(subscribe))
        .await
        .map_err(|e| ChannelError::Send(e.to_string()))?;
    Ok((sink, stream))
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

struct ReaderShared {
    bar: BarKind,
    board: Arc<RwLock<LiveBoard>>,
    updates: broadcast::Sender<BoardUpdate>,
    closed: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    notifier: Arc<dyn OrderNotifier>,
}

async fn read_loop(mut stream: SplitStream<WsStream>, shared: ReaderShared) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!(bar = %shared.bar, "hub closed live channel");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(bar = %shared.bar, error = %e, "live channel read failed");
                break;
            }
        };

        let msg = match codec::decode_server(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(bar = %shared.bar, error = %e, "ignoring undecodable live frame");
                continue;
            }
        };
        let kind = msg.kind();

        let outcomes = {
            let mut board = shared.board.write().await;
            if shared.closed.load(Ordering::Acquire) {
                return;
            }
            let outcomes = board.apply(msg);
            // Reported under the lock: a reader that sees the change also
            // sees its notification.
            for applied in &outcomes {
                report(&shared, applied);
            }
            outcomes
        };
        debug!(bar = %shared.bar, kind, outcomes = outcomes.len(), "live frame applied");

        for applied in outcomes {
            let _ = shared.updates.send(BoardUpdate::Applied(applied));
        }
    }

    shared.connected.store(false, Ordering::Release);
    let _ = shared.updates.send(BoardUpdate::Disconnected);
}

fn report(shared: &ReaderShared, applied: &Applied) {
    match applied {
        Applied::Seeded { orders, reseeded } => {
            info!(bar = %shared.bar, orders, reseeded, "live board seeded");
        }
        Applied::OrderAdded(order) => {
            info!(bar = %shared.bar, order_id = %order.id, "new order");
            shared.notifier.order_placed(shared.bar, order);
        }
        Applied::Inconsistent(inc) => {
            warn!(
                bar = %shared.bar,
                order_id = %inc.order_id(),
                kind = inc.as_str(),
                "live channel inconsistency"
            );
        }
        _ => {}
    }
}
