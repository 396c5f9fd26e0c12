#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::IntoResponse,
};
use qonto_watcher::config::ApiConfig;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, (StatusCode, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Mutex<Option<Duration>>,
}

/// Records every request and answers with the response registered for
/// `path?query`, then `path`, falling back to 404.
#[derive(Clone)]
pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: impl Into<String>) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(path.to_owned(), (status, body.into()));
    }

    pub fn respond_to_query(
        &self,
        path: &str,
        query: &str,
        status: StatusCode,
        body: impl Into<String>,
    ) {
        self.respond(&format!("{path}?{query}"), status, body);
    }

    pub fn delay_responses(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            login: "acme-4242".to_owned(),
            secret: "s3cr3t".to_owned(),
            base_url: self.url("/v2"),
            timeout: Duration::from_secs(2),
        }
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_owned();
    let query = uri.query().map(str::to_owned);

    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        query: query.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned),
        body,
    });

    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let response = {
        let responses = state.responses.lock().unwrap();
        query
            .as_ref()
            .and_then(|q| responses.get(&format!("{path}?{q}")))
            .or_else(|| responses.get(&path))
            .cloned()
    };

    let (status, body) = response.unwrap_or((StatusCode::NOT_FOUND, String::new()));

    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

pub fn transaction(id: &str, emitted_at: &str, settled_at: Option<&str>) -> Value {
    let status = if settled_at.is_some() { "completed" } else { "pending" };
    json!({
        "transaction_id": id,
        "amount": 42.5,
        "amount_cents": 4250,
        "local_amount": 42.5,
        "local_amount_cents": 4250,
        "side": "debit",
        "operation_type": "card",
        "currency": "EUR",
        "local_currency": "EUR",
        "label": "Office supplies",
        "settled_at": settled_at,
        "emitted_at": emitted_at,
        "status": status,
        "note": null
    })
}

pub fn page(transactions: Vec<Value>, current_page: u32, next_page: Option<u32>) -> String {
    let total_count = transactions.len();
    json!({
        "transactions": transactions,
        "meta": {
            "current_page": current_page,
            "next_page": next_page,
            "prev_page": null,
            "total_pages": next_page.unwrap_or(current_page),
            "total_count": total_count,
            "per_page": 100
        }
    })
    .to_string()
}

/// Log output of the current thread, as plain text.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Installs an `info` level fmt subscriber writing here until the guard
    /// is dropped. Tasks spawned on a current thread runtime are covered.
    pub fn start() -> (Self, DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
