//! Per-topic one-shot listener set; broadcasts "new data" or "closed
//! (optional error)" (spec §4.2).
//!
//! A single dedicated task owns the topic table and serves requests sent
//! over an `mpsc` channel, the same actor shape
//! `services/server/src/state.rs`'s `ForwarderCommand` uses for its
//! request/reply pairs — one channel carrying a request enum, each variant
//! embedding its own `oneshot::Sender` for the reply.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::error::HubError;

/// What a listener receives when it fires.
#[derive(Debug, Clone)]
pub(crate) struct Notification {
    pub(crate) closed: bool,
    pub(crate) err: Option<HubError>,
}

impl Notification {
    fn progress() -> Self {
        Self {
            closed: false,
            err: None,
        }
    }

    fn terminal(err: Option<HubError>) -> Self {
        Self { closed: true, err }
    }
}

enum BusRequest {
    RegisterTopic {
        topic_id: String,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    CloseTopic {
        topic_id: String,
        err: Option<HubError>,
        reply: oneshot::Sender<()>,
    },
    Notify {
        topic_id: String,
        reply: oneshot::Sender<()>,
    },
    Subscribe {
        topic_id: String,
        reply: oneshot::Sender<oneshot::Receiver<Notification>>,
    },
}

/// A cheaply-cloneable handle to the bus task.
#[derive(Debug, Clone)]
pub(crate) struct BusHandle {
    tx: mpsc::Sender<BusRequest>,
}

impl BusHandle {
    pub(crate) async fn register_topic(&self, topic_id: String) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(BusRequest::RegisterTopic {
                topic_id,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return Err(HubError::Cancelled);
        }
        reply_rx.await.unwrap_or(Err(HubError::Cancelled))
    }

    pub(crate) async fn close_topic(&self, topic_id: String, err: Option<HubError>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(BusRequest::CloseTopic {
                topic_id,
                err,
                reply: reply_tx,
            })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    pub(crate) async fn notify(&self, topic_id: String) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(BusRequest::Notify {
                topic_id,
                reply: reply_tx,
            })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// Returns a one-shot receiver satisfied the next time `notify` or
    /// `close_topic` runs for this topic. If the topic is absent the
    /// receiver fires immediately with a terminal `TopicNotFound`-shaped
    /// notification (represented here as `closed: true, err: None`, since
    /// the caller — `hub::storage`'s read-retry loop — treats "topic gone"
    /// the same as "already sealed": retry the read, it will resolve via
    /// EOF or the stream's own terminal error).
    pub(crate) async fn subscribe(&self, topic_id: String) -> oneshot::Receiver<Notification> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(BusRequest::Subscribe {
                topic_id,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Notification::terminal(Some(HubError::Cancelled)));
            return rx;
        }

        match reply_rx.await {
            Ok(rx) => rx,
            Err(_) => {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Notification::terminal(Some(HubError::Cancelled)));
                rx
            }
        }
    }
}

/// Spawns the bus task and returns a handle to it. The task runs until
/// every `BusHandle` clone is dropped, at which point it drains every live
/// listener with a cancellation notification and exits (spec §4.2's
/// "context cancellation" clause).
pub(crate) fn spawn() -> BusHandle {
    let (tx, mut rx) = mpsc::channel::<BusRequest>(256);

    tokio::spawn(async move {
        let mut topics: HashMap<String, Vec<oneshot::Sender<Notification>>> = HashMap::new();

        while let Some(request) = rx.recv().await {
            match request {
                BusRequest::RegisterTopic { topic_id, reply } => {
                    let result = if topics.contains_key(&topic_id) {
                        Err(HubError::StreamAlreadyExists)
                    } else {
                        topics.insert(topic_id, Vec::new());
                        Ok(())
                    };
                    let _ = reply.send(result);
                }
                BusRequest::CloseTopic {
                    topic_id,
                    err,
                    reply,
                } => {
                    if let Some(listeners) = topics.remove(&topic_id) {
                        for listener in listeners {
                            let _ = listener.send(Notification::terminal(err.clone()));
                        }
                    }
                    let _ = reply.send(());
                }
                BusRequest::Notify { topic_id, reply } => {
                    if let Some(listeners) = topics.get_mut(&topic_id) {
                        for listener in listeners.drain(..) {
                            let _ = listener.send(Notification::progress());
                        }
                    }
                    let _ = reply.send(());
                }
                BusRequest::Subscribe { topic_id, reply } => {
                    let (tx, rx) = oneshot::channel();
                    match topics.get_mut(&topic_id) {
                        Some(listeners) => listeners.push(tx),
                        None => {
                            let _ = tx.send(Notification::terminal(None));
                        }
                    }
                    let _ = reply.send(rx);
                }
            }
        }

        for (_, listeners) in topics.drain() {
            for listener in listeners {
                let _ = listener.send(Notification::terminal(Some(HubError::Cancelled)));
            }
        }
    });

    BusHandle { tx }
}
