//! Hot-reload channel over Server-Sent Events.
//!
//! Every project with a live unit gets one notifier per class, created by the
//! first subscriber and shared by the rest. The notifier relays the unit's
//! build events to each connected browser as JSON:
//!
//! ```text
//! data: {"action":"building","name":"client"}
//! data: {"action":"built","name":"client","time":412,"hash":"client-3","errors":[],"warnings":[]}
//! ```
//!
//! When a browser subscribes to a project that has no unit (the server was
//! restarted, or the project was evicted) it gets a single
//! `{"action":"reload"}` and then heartbeats only.

use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use super::registry::ProjectKey;
use super::unit::CompilationUnit;

/// Per-build payload sent with `built` and `sync`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub name: String,
    pub time: u64,
    pub hash: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HotEvent {
    Building { name: String },
    Built(BuildSummary),
    /// Sent to a new subscriber when the unit has already built.
    Sync(BuildSummary),
    /// Ask the browser for a full page reload.
    Reload,
}

impl HotEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"action":"reload"}"#.to_string())
    }
}

/// Connected SSE clients of one notifier.
type ClientRegistry = Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>;

/// Fans one unit's events out to every subscribed browser.
pub struct Notifier {
    clients: ClientRegistry,
    next_client_id: AtomicUsize,
    relay: JoinHandle<()>,
}

impl Notifier {
    fn start(unit: &CompilationUnit) -> Self {
        let clients: ClientRegistry = Arc::new(RwLock::new(HashMap::new()));
        let mut events = unit.subscribe();
        let relay_clients = clients.clone();
        let key = unit.key().to_string();

        let relay = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => broadcast_to(&relay_clients, &event.to_json()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(unit = %key, skipped, "hot relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            clients,
            next_client_id: AtomicUsize::new(0),
            relay,
        }
    }

    /// Register a client and return its id and event receiver.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

/// Send `data` to every client, dropping the ones that went away.
fn broadcast_to(clients: &ClientRegistry, data: &str) {
    let mut gone = Vec::new();
    for (id, tx) in clients.read().iter() {
        match tx.try_send(data.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(client = id, "hot client is behind, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*id),
        }
    }
    if !gone.is_empty() {
        let mut clients = clients.write();
        for id in gone {
            clients.remove(&id);
        }
    }
}

pub type EventStream = std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// All notifiers, keyed by project class and identity.
pub struct HotHub {
    notifiers: DashMap<ProjectKey, Arc<Notifier>>,
    heartbeat: Duration,
}

impl HotHub {
    pub fn new(heartbeat: Duration) -> Self {
        Self {
            notifiers: DashMap::new(),
            heartbeat,
        }
    }

    /// Attach a new subscriber to `unit`'s notifier, creating it if needed.
    ///
    /// A unit that has already built greets the subscriber with `sync`.
    pub fn subscribe(&self, project: &ProjectKey, unit: &CompilationUnit) -> EventStream {
        let notifier = self
            .notifiers
            .entry(project.clone())
            .or_insert_with(|| Arc::new(Notifier::start(unit)))
            .clone();

        let (id, rx) = notifier.register_client();
        if let Some(summary) = unit.last_build() {
            broadcast_one(&notifier, id, &HotEvent::Sync(summary));
        }
        tracing::debug!(project = %project, client = id, "hot client subscribed");

        Box::pin(ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data))))
    }

    /// One `reload` event, then nothing but heartbeats.
    pub fn reload_stream() -> EventStream {
        let reload = HotEvent::Reload.to_json();
        Box::pin(
            tokio_stream::once(Ok(Event::default().data(reload)))
                .chain(tokio_stream::pending()),
        )
    }

    pub fn notifier(&self, project: &ProjectKey) -> Option<Arc<Notifier>> {
        self.notifiers.get(project).map(|n| n.clone())
    }

    /// Drop a project's notifier; its clients' streams end.
    pub fn remove(&self, project: &ProjectKey) {
        self.notifiers.remove(project);
    }

    /// Wrap a stream in an SSE response with the headers proxies and the
    /// browser hot client expect.
    pub fn response(&self, stream: EventStream) -> Response {
        let sse = Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(self.heartbeat)
                .text("\u{1f493}"),
        );
        (
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
                (
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-transform"),
                ),
                (
                    header::HeaderName::from_static("x-accel-buffering"),
                    HeaderValue::from_static("no"),
                ),
            ],
            sse,
        )
            .into_response()
    }
}

fn broadcast_one(notifier: &Notifier, id: usize, event: &HotEvent) {
    if let Some(tx) = notifier.clients.read().get(&id) {
        let _ = tx.try_send(event.to_json());
    }
}
