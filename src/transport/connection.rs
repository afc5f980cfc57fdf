//! Bidirectional multiplexed message connection.
//!
//! Both sides can issue requests, replies, and notifications over a single
//! byte stream (JSON Lines framing). Outbound request/response correlation
//! uses a monotonically increasing numeric id and a pending map completed by
//! the read loop. Inbound requests run as independent tasks, so a handler
//! that is itself awaiting an outbound sub-request never blocks the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{OpError, OpResult};
use crate::transport::cancel::CancelToken;
use crate::transport::frame::{Message, NotificationFrame, RequestFrame, ResponseFrame};

/// Notification asking the receiver to cancel an in-flight request. Params
/// are the positional array `[id]`.
pub const CANCEL_METHOD: &str = "$/cancel";

const METHOD_NOT_FOUND: i64 = -32601;

type RequestHandler =
    Arc<dyn Fn(Value, CancelToken) -> BoxFuture<'static, OpResult<Value>> + Send + Sync>;
type NotificationHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;
type CloseHook = Box<dyn Fn() + Send + Sync>;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

pub struct MessageConnection {
    /// Identity stamped on locally raised transport errors.
    side: String,
    outbound: mpsc::UnboundedSender<String>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<ResponseFrame>>>,
    inflight: Mutex<HashMap<u64, CancelToken>>,
    request_handlers: RwLock<HashMap<String, RequestHandler>>,
    notification_handlers: RwLock<HashMap<String, NotificationHandler>>,
    close_hooks: Mutex<Vec<CloseHook>>,
    reader: Mutex<Option<BoxedReader>>,
}

impl MessageConnection {
    /// Wrap a byte stream pair. The writer task starts immediately; inbound
    /// processing starts with [`listen`](Self::listen).
    pub fn new(
        side: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut writer = Box::pin(writer);
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if writer.write_all(line.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                    || writer.flush().await.is_err()
                {
                    tracing::debug!("write side closed, stopping writer task");
                    break;
                }
            }
        });
        Arc::new(Self {
            side: side.into(),
            outbound: tx,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            request_handlers: RwLock::new(HashMap::new()),
            notification_handlers: RwLock::new(HashMap::new()),
            close_hooks: Mutex::new(Vec::new()),
            reader: Mutex::new(Some(Box::new(reader))),
        })
    }

    pub fn side(&self) -> &str {
        &self.side
    }

    /// Register a request handler. Must happen before [`listen`](Self::listen).
    pub fn on_request<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value, CancelToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = OpResult<Value>> + Send + 'static,
    {
        let boxed: RequestHandler = Arc::new(move |params, token| Box::pin(handler(params, token)));
        self.request_handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(method.into(), boxed);
    }

    /// Register a notification handler. Must happen before [`listen`](Self::listen).
    pub fn on_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let boxed: NotificationHandler = Arc::new(move |params| Box::pin(handler(params)));
        self.notification_handlers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(method.into(), boxed);
    }

    /// Run when the read loop terminates (peer hung up or stream error).
    pub fn on_close(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.close_hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Issue a request and await the correlated response. A reply carrying
    /// an error is reconstructed into the typed error; replies without a
    /// typed payload are wrapped and tagged with this side's identity.
    pub async fn send_request(&self, method: &str, params: Value) -> OpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, tx);

        let frame = RequestFrame::new(id, method, params);
        if let Err(err) = self.send_line(&frame) {
            self.pending
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&id);
            return Err(err);
        }

        let response = rx.await.map_err(|_| self.closed_error(method))?;
        match response.error {
            Some(err) => Err(err.into_op_error(&self.side)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    /// Fire-and-forget notification.
    pub fn send_notification(&self, method: &str, params: Value) -> OpResult<()> {
        self.send_line(&NotificationFrame::new(method, params))
    }

    /// Spawn the read loop. Inbound requests are dispatched as independent
    /// tasks; `$/cancel` notifications cancel the matching in-flight token.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let conn = Arc::clone(self);
        let reader = conn
            .reader
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        tokio::spawn(async move {
            let Some(reader) = reader else {
                tracing::warn!(side = %conn.side, "listen called twice");
                return;
            };
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Message>(&line) {
                            Ok(message) => conn.dispatch(message),
                            Err(err) => {
                                tracing::warn!(side = %conn.side, error = %err, "unparseable frame dropped");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(side = %conn.side, error = %err, "read loop stopping");
                        break;
                    }
                }
            }
            conn.shutdown();
        })
    }

    fn dispatch(self: &Arc<Self>, message: Message) {
        match message {
            Message::Request(req) => self.dispatch_request(req),
            Message::Response(resp) => {
                let sender = self
                    .pending
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&resp.id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(resp);
                    }
                    None => tracing::warn!(side = %self.side, id = resp.id, "response for unknown request"),
                }
            }
            Message::Notification(note) => self.dispatch_notification(note),
        }
    }

    fn dispatch_request(self: &Arc<Self>, req: RequestFrame) {
        let handler = self
            .request_handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&req.method)
            .cloned();
        let Some(handler) = handler else {
            tracing::warn!(side = %self.side, method = %req.method, "unknown method");
            let frame = ResponseFrame::protocol_failure(
                req.id,
                METHOD_NOT_FOUND,
                format!("method not found: {}", req.method),
            );
            let _ = self.send_line(&frame);
            return;
        };

        let token = CancelToken::new();
        self.inflight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(req.id, token.clone());

        let conn = Arc::clone(self);
        tokio::spawn(async move {
            let result = handler(req.params, token).await;
            conn.inflight
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&req.id);
            let frame = match result {
                Ok(value) => ResponseFrame::success(req.id, value),
                Err(err) => {
                    tracing::debug!(side = %conn.side, method = %req.method, error = %err, "request failed");
                    ResponseFrame::failure(req.id, &err)
                }
            };
            let _ = conn.send_line(&frame);
        });
    }

    fn dispatch_notification(self: &Arc<Self>, note: NotificationFrame) {
        if note.method == CANCEL_METHOD {
            let id = note.params.get(0).and_then(Value::as_u64);
            match id {
                Some(id) => {
                    let token = self
                        .inflight
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .get(&id)
                        .cloned();
                    if let Some(token) = token {
                        tracing::debug!(side = %self.side, id, "cancelling in-flight request");
                        token.cancel();
                    }
                }
                None => tracing::warn!(side = %self.side, "cancel notification without an id"),
            }
            return;
        }

        let handler = self
            .notification_handlers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&note.method)
            .cloned();
        match handler {
            Some(handler) => {
                tokio::spawn(handler(note.params));
            }
            None => {
                tracing::debug!(side = %self.side, method = %note.method, "unhandled notification")
            }
        }
    }

    fn send_line<T: serde::Serialize>(&self, frame: &T) -> OpResult<()> {
        let line = serde_json::to_string(frame).map_err(|e| {
            OpError::assemble(self.side.as_str(), format!("frame serialization failed: {e}"))
        })?;
        self.outbound
            .send(line)
            .map_err(|_| OpError::assemble(self.side.as_str(), "connection closed"))
    }

    fn closed_error(&self, method: &str) -> OpError {
        OpError::assemble(
            self.side.as_str(),
            format!("connection closed while awaiting {method}"),
        )
    }

    /// Read loop teardown: fail every pending outbound request, cancel every
    /// in-flight inbound one, then run the close hooks.
    fn shutdown(&self) {
        let pending: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .collect();
        // Dropping the senders wakes every waiter with a closed-channel error.
        drop(pending);

        let inflight: Vec<_> = self
            .inflight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .collect();
        for (_, token) in inflight {
            token.cancel();
        }

        let hooks = self
            .close_hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
        tracing::info!(side = %self.side, "connection closed");
    }
}

impl std::fmt::Debug for MessageConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageConnection").field("side", &self.side).finish_non_exhaustive()
    }
}
