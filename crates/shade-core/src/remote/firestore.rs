//! Firestore REST ledger.
//!
//! Documents live at `Users/{userId}`. Writes use `:commit` field transforms
//! (`appendMissingElements` / `removeAllFromArray`), which are atomic at the
//! array level. The REST surface has no push channel, so a subscription is a
//! polling task that forwards a snapshot whenever the document's `updateTime`
//! or existence changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::DateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{
    DocumentSnapshot, RemoteError, RemoteLedger, RemoteResult, SnapshotSink, SubscriptionHandle,
    USERS_COLLECTION,
};
use crate::models::{format_date, Card, UserId, SAVED_COLOURS_FIELD};
use crate::util::{compact_text, normalize_text_option};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Connection settings for [`FirestoreLedger`]
#[derive(Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: Option<String>,
    pub id_token: Option<String>,
    pub poll_interval: Duration,
    pub base_url: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: None,
            id_token: None,
            poll_interval: Duration::from_secs(5),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = normalize_text_option(id_token);
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = normalize_text_option(api_key);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval", &self.poll_interval)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Raw document as returned by the REST API; `fields` are typed values.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    update_time: Option<String>,
}

impl FirestoreDocument {
    fn plain_fields(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), typed_to_plain(value)))
                .collect(),
        )
    }

    fn typed_entry_with_id(&self, card_id: &str) -> Option<&Value> {
        self.fields
            .get(SAVED_COLOURS_FIELD)?
            .pointer("/arrayValue/values")?
            .as_array()?
            .iter()
            .find(|entry| {
                entry
                    .pointer("/mapValue/fields/id/stringValue")
                    .and_then(Value::as_str)
                    == Some(card_id)
            })
    }
}

/// Shared HTTP half of the ledger; cheap to clone into polling tasks.
#[derive(Clone)]
struct FirestoreClient {
    config: FirestoreConfig,
    http: Client,
}

impl FirestoreClient {
    fn document_name(&self, user_id: &UserId) -> String {
        format!(
            "{}/{USERS_COLLECTION}/{}",
            self.config.database_path(),
            user_id
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.config.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match &self.config.id_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_document(&self, user_id: &UserId) -> RemoteResult<Option<FirestoreDocument>> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.document_name(user_id)
        );
        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str::<FirestoreDocument>(&body)
            .map(Some)
            .map_err(|error| RemoteError::Decode(error.to_string()))
    }

    async fn commit_transform(&self, user_id: &UserId, transform: Value) -> RemoteResult<()> {
        let url = format!(
            "{}/{}:commit",
            self.config.base_url.trim_end_matches('/'),
            self.config.database_path()
        );
        let payload = json!({
            "writes": [{
                "transform": {
                    "document": self.document_name(user_id),
                    "fieldTransforms": [transform],
                }
            }]
        });

        let response = self
            .authorize(self.http.post(url).json(&payload))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status, &body))
        }
    }
}

/// Remote ledger backed by the Firestore REST API
pub struct FirestoreLedger {
    client: FirestoreClient,
    next_handle: AtomicU64,
    pollers: Mutex<HashMap<SubscriptionHandle, JoinHandle<()>>>,
}

impl FirestoreLedger {
    pub fn new(config: FirestoreConfig) -> RemoteResult<Self> {
        if normalize_text_option(Some(config.project_id.clone())).is_none() {
            return Err(RemoteError::Rejected {
                status: 0,
                message: "Firestore project id must not be empty".to_string(),
            });
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client: FirestoreClient { config, http },
            next_handle: AtomicU64::new(1),
            pollers: Mutex::new(HashMap::new()),
        })
    }
}

impl Drop for FirestoreLedger {
    fn drop(&mut self) {
        let pollers = self.pollers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in pollers.drain() {
            task.abort();
        }
    }
}

impl RemoteLedger for FirestoreLedger {
    async fn upsert_card(&self, user_id: &UserId, card: &Card) -> RemoteResult<()> {
        self.client
            .commit_transform(
                user_id,
                json!({
                    "fieldPath": SAVED_COLOURS_FIELD,
                    "appendMissingElements": { "values": [card_to_typed(card)] },
                }),
            )
            .await?;
        tracing::debug!("Appended card {} to {}", card.id, user_id);
        Ok(())
    }

    async fn remove_card(&self, user_id: &UserId, card: &Card) -> RemoteResult<()> {
        let Some(document) = self.client.get_document(user_id).await? else {
            return Ok(());
        };
        let Some(stored) = document.typed_entry_with_id(card.id.as_str()).cloned() else {
            tracing::debug!("Card {} not present remotely; nothing to remove", card.id);
            return Ok(());
        };

        self.client
            .commit_transform(
                user_id,
                json!({
                    "fieldPath": SAVED_COLOURS_FIELD,
                    "removeAllFromArray": { "values": [stored] },
                }),
            )
            .await?;
        tracing::debug!("Removed card {} from {}", card.id, user_id);
        Ok(())
    }

    async fn subscribe(
        &self,
        user_id: &UserId,
        sink: SnapshotSink,
    ) -> RemoteResult<SubscriptionHandle> {
        // The first read doubles as the handshake: failures surface to the caller.
        let initial = self.client.get_document(user_id).await?;
        let observed = Observed::from_document(initial.as_ref());
        sink.deliver(initial.map_or(DocumentSnapshot::Missing, |document| {
            DocumentSnapshot::Exists(document.plain_fields())
        }));

        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let task = tokio::spawn(poll_document(
            self.client.clone(),
            user_id.clone(),
            sink,
            observed,
        ));
        self.pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, task);
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let task = self
            .pollers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// What the poller last forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Missing,
    Present(Option<String>),
    Failed,
}

impl Observed {
    fn from_document(document: Option<&FirestoreDocument>) -> Self {
        document.map_or(Self::Missing, |document| {
            Self::Present(document.update_time.clone())
        })
    }
}

async fn poll_document(
    client: FirestoreClient,
    user_id: UserId,
    sink: SnapshotSink,
    mut last: Observed,
) {
    let mut ticker = tokio::time::interval(client.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; the handshake already covered it
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if sink.is_closed() {
            break;
        }

        let (observed, snapshot) = match client.get_document(&user_id).await {
            Ok(document) => {
                let observed = Observed::from_document(document.as_ref());
                let snapshot = document.map_or(DocumentSnapshot::Missing, |document| {
                    DocumentSnapshot::Exists(document.plain_fields())
                });
                (observed, snapshot)
            }
            Err(error) => {
                tracing::debug!("Polling {} failed: {}", user_id, error);
                (Observed::Failed, DocumentSnapshot::Failed(error))
            }
        };

        if observed != last {
            if !sink.deliver(snapshot) {
                break;
            }
            last = observed;
        }
    }
}

fn card_to_typed(card: &Card) -> Value {
    let date = if DateTime::from_timestamp_millis(card.created_at).is_some() {
        json!({ "timestampValue": format_date(card.created_at) })
    } else {
        json!({ "integerValue": card.created_at.to_string() })
    };
    json!({
        "mapValue": {
            "fields": {
                "id": { "stringValue": card.id.as_str() },
                "hexCode": { "stringValue": card.hex_code },
                "colourName": { "stringValue": card.colour_name },
                "date": date,
            }
        }
    })
}

/// Convert a Firestore typed value into plain JSON.
fn typed_to_plain(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => inner
            .as_str()
            .and_then(|text| text.parse::<i64>().ok())
            .map_or_else(|| inner.clone(), Value::from),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(name, value)| (name.clone(), typed_to_plain(value)))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(typed_to_plain).collect())
                .unwrap_or_default(),
        ),
        "nullValue" => Value::Null,
        // stringValue, booleanValue, doubleValue, timestampValue, referenceValue, ...
        _ => inner.clone(),
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_decode() {
        RemoteError::Decode(error.to_string())
    } else {
        RemoteError::Transport(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: Option<String>,
}

fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| compact_text(body));
    let message = if message.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Permission(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Transport(message)
        }
        status if status.is_server_error() => RemoteError::Transport(message),
        status => RemoteError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardId, UserDocument};
    use crate::remote::SnapshotEvent;
    use axum::extract::State;
    use axum::http::{Method, Uri};
    use axum::Router;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    const POLL: Duration = Duration::from_millis(20);

    fn typed_document() -> FirestoreDocument {
        serde_json::from_value(typed_document_json("2025-08-14T10:00:01.000000Z")).unwrap()
    }

    fn typed_document_json(update_time: &str) -> Value {
        json!({
            "name": "projects/p/databases/(default)/documents/Users/u1",
            "fields": {
                "savedColours": {
                    "arrayValue": {
                        "values": [
                            {"mapValue": {"fields": {
                                "id": {"stringValue": "A"},
                                "hexCode": {"stringValue": "FF0000"},
                                "colourName": {"stringValue": "Red"},
                                "date": {"timestampValue": "2025-08-14T10:00:00Z"}
                            }}},
                            {"mapValue": {"fields": {
                                "id": {"stringValue": "B"},
                                "hexCode": {"stringValue": "00FF00"},
                                "colourName": {"stringValue": "Green"},
                                "date": {"integerValue": "1755165600000"}
                            }}}
                        ]
                    }
                }
            },
            "updateTime": update_time
        })
    }

    /// In-process stand-in for the Firestore REST endpoint.
    #[derive(Default)]
    struct StubFirestore {
        document: Option<Value>,
        failing: bool,
        reads: usize,
        commits: Vec<Value>,
    }

    type SharedStub = Arc<Mutex<StubFirestore>>;

    async fn stub_handler(
        State(stub): State<SharedStub>,
        method: Method,
        uri: Uri,
        body: String,
    ) -> (StatusCode, String) {
        let mut stub = stub.lock().unwrap();
        if method == Method::POST && uri.path().ends_with(":commit") {
            stub.commits.push(serde_json::from_str(&body).unwrap());
            return (StatusCode::OK, "{}".to_string());
        }

        assert!(uri.path().ends_with("/documents/Users/u1"), "{uri}");
        stub.reads += 1;
        if stub.failing {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"error":{"message":"backend unavailable"}}"#.to_string(),
            );
        }
        match &stub.document {
            Some(document) => (StatusCode::OK, document.to_string()),
            None => (
                StatusCode::NOT_FOUND,
                r#"{"error":{"message":"document not found"}}"#.to_string(),
            ),
        }
    }

    async fn serve_stub(stub: &SharedStub) -> FirestoreLedger {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .fallback(stub_handler)
            .with_state(Arc::clone(stub));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let mut config = FirestoreConfig::new("demo").with_poll_interval(POLL);
        config.base_url = format!("http://{addr}/v1");
        FirestoreLedger::new(config).unwrap()
    }

    fn set_stub(stub: &SharedStub, update: impl FnOnce(&mut StubFirestore)) {
        update(&mut stub.lock().unwrap());
    }

    fn user() -> UserId {
        "u1".parse().unwrap()
    }

    async fn next_snapshot(rx: &mut UnboundedReceiver<SnapshotEvent>) -> DocumentSnapshot {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .snapshot
    }

    async fn assert_no_snapshot(rx: &mut UnboundedReceiver<SnapshotEvent>) {
        tokio::time::sleep(POLL * 8).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn typed_document_decodes_into_user_document() {
        let document = typed_document();
        let decoded = UserDocument::from_fields(&document.plain_fields()).unwrap();

        assert_eq!(decoded.saved_colours.len(), 2);
        assert_eq!(decoded.saved_colours[0].colour_name, "Red");
        assert_eq!(decoded.saved_colours[0].date, 1_755_165_600_000);
        assert_eq!(decoded.saved_colours[1].date, 1_755_165_600_000);
    }

    #[test]
    fn typed_entry_is_found_by_id() {
        let document = typed_document();
        let entry = document.typed_entry_with_id("B").unwrap();
        assert_eq!(
            entry.pointer("/mapValue/fields/colourName/stringValue"),
            Some(&json!("Green"))
        );
        assert!(document.typed_entry_with_id("Z").is_none());
    }

    #[test]
    fn empty_array_value_has_no_values_key() {
        assert_eq!(typed_to_plain(&json!({"arrayValue": {}})), json!([]));
        assert_eq!(typed_to_plain(&json!({"nullValue": null})), Value::Null);
    }

    #[test]
    fn card_encodes_as_typed_map() {
        let card = Card {
            id: CardId::from("A"),
            hex_code: "FF0000".to_string(),
            colour_name: "Red".to_string(),
            created_at: 1_755_165_600_000,
        };
        let typed = card_to_typed(&card);
        assert_eq!(
            typed.pointer("/mapValue/fields/date/timestampValue"),
            Some(&json!("2025-08-14T10:00:00.000Z"))
        );
        assert_eq!(
            typed_to_plain(&typed),
            json!({"id": "A", "hexCode": "FF0000", "colourName": "Red", "date": "2025-08-14T10:00:00.000Z"})
        );
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, r#"{"error":{"message":"Missing or insufficient permissions."}}"#),
            RemoteError::Permission(message) if message == "Missing or insufficient permissions."
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            RemoteError::Transport(message) if message == "HTTP 503"
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad"),
            RemoteError::Rejected { status: 400, .. }
        ));
    }

    #[test]
    fn config_debug_redacts_credentials() {
        let config = FirestoreConfig::new("demo")
            .with_id_token(Some("secret-token".to_string()))
            .with_api_key(Some("secret-key".to_string()));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn ledger_rejects_empty_project() {
        assert!(FirestoreLedger::new(FirestoreConfig::new("  ")).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_document_subscribes_as_missing_and_remove_is_a_no_op() {
        let stub = SharedStub::default();
        let ledger = serve_stub(&stub).await;
        let (sink, mut rx) = SnapshotSink::channel(1);

        let handle = ledger.subscribe(&user(), sink).await.unwrap();
        assert_eq!(next_snapshot(&mut rx).await, DocumentSnapshot::Missing);

        let card = Card {
            id: CardId::from("A"),
            hex_code: "FF0000".to_string(),
            colour_name: "Red".to_string(),
            created_at: 0,
        };
        ledger.remove_card(&user(), &card).await.unwrap();
        assert!(stub.lock().unwrap().commits.is_empty());
        ledger.unsubscribe(handle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_appends_the_typed_card() {
        let stub = SharedStub::default();
        let ledger = serve_stub(&stub).await;
        let card = Card {
            id: CardId::from("C"),
            hex_code: "0000FF".to_string(),
            colour_name: "Blue".to_string(),
            created_at: 1_755_165_600_000,
        };

        ledger.upsert_card(&user(), &card).await.unwrap();

        let commits = stub.lock().unwrap().commits.clone();
        assert_eq!(commits.len(), 1);
        let transform = &commits[0]["writes"][0]["transform"];
        assert_eq!(
            transform["document"],
            json!("projects/demo/databases/(default)/documents/Users/u1")
        );
        assert_eq!(
            transform["fieldTransforms"][0],
            json!({
                "fieldPath": "savedColours",
                "appendMissingElements": { "values": [card_to_typed(&card)] },
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_sends_the_stored_value_not_the_local_one() {
        let stub = SharedStub::default();
        set_stub(&stub, |stub| {
            stub.document = Some(typed_document_json("2025-08-14T10:00:01.000000Z"));
        });
        let ledger = serve_stub(&stub).await;
        // differs from the stored element in everything but the id
        let local = Card {
            id: CardId::from("B"),
            hex_code: "ABCDEF".to_string(),
            colour_name: "Renamed".to_string(),
            created_at: 42,
        };

        ledger.remove_card(&user(), &local).await.unwrap();

        let commits = stub.lock().unwrap().commits.clone();
        assert_eq!(commits.len(), 1);
        let stored = typed_document().typed_entry_with_id("B").cloned().unwrap();
        assert_eq!(
            commits[0]["writes"][0]["transform"]["fieldTransforms"][0],
            json!({
                "fieldPath": "savedColours",
                "removeAllFromArray": { "values": [stored] },
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poller_forwards_changes_and_one_error_per_failure() {
        let stub = SharedStub::default();
        set_stub(&stub, |stub| stub.document = Some(typed_document_json("t1")));
        let ledger = serve_stub(&stub).await;
        let (sink, mut rx) = SnapshotSink::channel(7);

        let handle = ledger.subscribe(&user(), sink).await.unwrap();
        assert!(matches!(next_snapshot(&mut rx).await, DocumentSnapshot::Exists(_)));
        assert_no_snapshot(&mut rx).await;

        set_stub(&stub, |stub| stub.document = Some(typed_document_json("t2")));
        assert!(matches!(next_snapshot(&mut rx).await, DocumentSnapshot::Exists(_)));

        set_stub(&stub, |stub| stub.failing = true);
        assert!(matches!(
            next_snapshot(&mut rx).await,
            DocumentSnapshot::Failed(RemoteError::Transport(_))
        ));
        assert_no_snapshot(&mut rx).await;

        set_stub(&stub, |stub| stub.failing = false);
        assert!(matches!(next_snapshot(&mut rx).await, DocumentSnapshot::Exists(_)));

        set_stub(&stub, |stub| stub.document = None);
        assert_eq!(next_snapshot(&mut rx).await, DocumentSnapshot::Missing);
        assert_no_snapshot(&mut rx).await;

        ledger.unsubscribe(handle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsubscribe_stops_polling() {
        let stub = SharedStub::default();
        let ledger = serve_stub(&stub).await;
        let (sink, mut rx) = SnapshotSink::channel(1);

        let handle = ledger.subscribe(&user(), sink).await.unwrap();
        next_snapshot(&mut rx).await;
        tokio::time::sleep(POLL * 4).await;

        ledger.unsubscribe(handle);
        tokio::time::sleep(POLL * 2).await;
        let reads_after_unsubscribe = stub.lock().unwrap().reads;
        tokio::time::sleep(POLL * 8).await;

        assert_eq!(stub.lock().unwrap().reads, reads_after_unsubscribe);
        assert!(rx.try_recv().is_err());
    }
}
