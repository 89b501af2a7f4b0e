//! In-process stand-in for the Bot API, served by axum on a random port.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode, Uri, header::CONTENT_TYPE},
        routing::post,
    },
    serde_json::{Map, Value, json},
    teloxide::Bot,
};

pub(crate) const CHAT_ID: i64 = 42;

#[derive(Debug, Clone)]
pub(crate) enum TelegramCall {
    SendMessage(Value),
    SendPhoto(Value),
    SendChatAction(Value),
    AnswerCallbackQuery(Value),
    Other { method: String, body: Value },
}

#[derive(Clone, Default)]
struct ApiState {
    calls: Arc<Mutex<Vec<TelegramCall>>>,
    updates: Arc<Mutex<VecDeque<Value>>>,
    refuse_html: Arc<AtomicBool>,
    refuse_photos: Arc<AtomicBool>,
    rate_limits: Arc<AtomicUsize>,
}

pub(crate) struct MockTelegramApi {
    state: ApiState,
    url: reqwest::Url,
    server: tokio::task::JoinHandle<()>,
}

impl MockTelegramApi {
    pub async fn start() -> Self {
        let state = ApiState::default();
        let app = Router::new()
            .route("/{*path}", post(handle))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            state,
            url: reqwest::Url::parse(&format!("http://{addr}/")).unwrap(),
            server,
        }
    }

    pub fn bot(&self) -> Bot {
        Bot::new("test-token").set_api_url(self.url.clone())
    }

    /// Recorded calls, excluding `getUpdates`.
    pub fn calls(&self) -> Vec<TelegramCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Answer HTML sends with "can't parse entities".
    pub fn refuse_html(&self) {
        self.state.refuse_html.store(true, Ordering::SeqCst);
    }

    /// Answer every photo with a bad URL error.
    pub fn refuse_photos(&self) {
        self.state.refuse_photos.store(true, Ordering::SeqCst);
    }

    /// Answer the next `count` sends with a one-second `retry_after`.
    pub fn rate_limit(&self, count: usize) {
        self.state.rate_limits.store(count, Ordering::SeqCst);
    }

    /// Queue an update for the next `getUpdates`.
    pub fn push_update(&self, update: Value) {
        self.state.updates.lock().unwrap().push_back(update);
    }
}

impl Drop for MockTelegramApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<ApiState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let method = uri
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let body = decode_body(content_type, &body);

    if method == "getupdates" {
        let updates: Vec<Value> = state.updates.lock().unwrap().drain(..).collect();
        if updates.is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        return ok(json!(updates));
    }

    let call = match method.as_str() {
        "sendmessage" => TelegramCall::SendMessage(body.clone()),
        "sendphoto" => TelegramCall::SendPhoto(body.clone()),
        "sendchataction" => TelegramCall::SendChatAction(body.clone()),
        "answercallbackquery" => TelegramCall::AnswerCallbackQuery(body.clone()),
        _ => TelegramCall::Other {
            method: method.clone(),
            body: body.clone(),
        },
    };
    state.calls.lock().unwrap().push(call);

    let is_send = matches!(method.as_str(), "sendmessage" | "sendphoto");
    if is_send && take_one(&state.rate_limits) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 1",
                "parameters": { "retry_after": 1 },
            })),
        );
    }
    if method == "sendphoto" && state.refuse_photos.load(Ordering::SeqCst) {
        return bad_request("Bad Request: wrong file identifier/HTTP URL specified");
    }
    if is_send && state.refuse_html.load(Ordering::SeqCst) && body["parse_mode"] == "HTML" {
        return bad_request(
            "Bad Request: can't parse entities: Unsupported start tag \"b\" at byte offset 0",
        );
    }

    match method.as_str() {
        "sendmessage" | "sendphoto" => ok(json!({
            "message_id": 1,
            "date": 0,
            "chat": { "id": CHAT_ID, "type": "private" },
            "text": "ok",
        })),
        "getme" => ok(json!({
            "id": 1,
            "is_bot": true,
            "first_name": "FlowRelay",
            "username": "flowrelay_bot",
            "can_join_groups": false,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false,
        })),
        _ => ok(json!(true)),
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn ok(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "ok": true, "result": result })))
}

fn bad_request(description: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error_code": 400, "description": description })),
    )
}

/// JSON bodies as-is; multipart forms flattened into an object of fields.
fn decode_body(content_type: &str, body: &[u8]) -> Value {
    let Some(boundary) = content_type
        .strip_prefix("multipart/form-data")
        .and_then(|rest| rest.split("boundary=").nth(1))
    else {
        return serde_json::from_slice(body).unwrap_or(Value::Null);
    };

    let delimiter = format!("--{}", boundary.trim_matches('"'));
    let text = String::from_utf8_lossy(body);
    let mut fields = Map::new();
    for part in text.split(delimiter.as_str()) {
        let Some((head, value)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        let Some(name) = head
            .split("name=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
        else {
            continue;
        };
        let value = value.strip_suffix("\r\n").unwrap_or(value);
        let value = if value.starts_with(['{', '[', '"']) {
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        } else {
            Value::String(value.to_string())
        };
        fields.insert(name.to_string(), value);
    }
    Value::Object(fields)
}
