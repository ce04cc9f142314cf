//! End-to-end idempotency pipeline tests.
//!
//! These tests run requests through the full stage order:
//!
//! 1. Body Parser - JSON body into the context
//! 2. Idempotency - evaluate, capture, replay
//!
//! with either a scripted engine or a small in-memory engine that behaves
//! like a real one (key required, in-flight lock, cached outcomes).

use bytes::Bytes;
use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
use http_body_util::Full;
use mnemosyne_core::conventions::{IDEMPOTENCY_KEY_HEADER, REPLAYED_HEADER};
use mnemosyne_core::fixtures::ScriptedEngine;
use mnemosyne_core::{
    BoxFuture, CachedOutcome, EngineError, EngineResult, FailureCode, IdempotencyEngine,
    IdempotencyRequest,
};
use mnemosyne_middleware::types::body_bytes;
use mnemosyne_middleware::{
    BodyParserMiddleware, CompletionDispatcher, IdempotencyMiddleware, MiddlewareContext,
    Pipeline, PipelineError, Request, Response, ResponseSink, ResponseWriter,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// In-memory engine
// ============================================================================

enum Entry {
    InFlight,
    Done(CachedOutcome),
}

/// Minimal engine keyed by the idempotency-key header.
#[derive(Default)]
struct MemoryEngine {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryEngine {
    fn key(request: &IdempotencyRequest) -> EngineResult<String> {
        match request.idempotency_key() {
            None => Err(EngineError::idempotency(
                FailureCode::KeyMissing,
                "idempotency-key header is required",
            )),
            Some(key) if key.len() > 32 => Err(EngineError::idempotency(
                FailureCode::KeyTooLong,
                "idempotency-key is too long",
            )),
            Some(key) => Ok(key.to_string()),
        }
    }
}

impl IdempotencyEngine for MemoryEngine {
    fn evaluate<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
    ) -> BoxFuture<'a, EngineResult<Option<CachedOutcome>>> {
        Box::pin(async move {
            let key = Self::key(request)?;
            let mut entries = self.entries.lock().unwrap();
            match entries.get(&key) {
                Some(Entry::Done(outcome)) => Ok(Some(outcome.clone())),
                Some(Entry::InFlight) => Err(EngineError::in_progress("request in progress")),
                None => {
                    entries.insert(key, Entry::InFlight);
                    Ok(None)
                }
            }
        })
    }

    fn complete<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
        outcome: CachedOutcome,
    ) -> BoxFuture<'a, EngineResult<()>> {
        Box::pin(async move {
            let key = Self::key(request)?;
            self.entries.lock().unwrap().insert(key, Entry::Done(outcome));
            Ok(())
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

type Handler = Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send>;

/// Builds the standard two-stage pipeline and returns its dispatcher.
fn build_pipeline(engine: Arc<dyn IdempotencyEngine>) -> (Pipeline, CompletionDispatcher) {
    let idempotency = IdempotencyMiddleware::new(engine);
    let dispatcher = idempotency.dispatcher().clone();

    let pipeline = Pipeline::builder()
        .stage(BodyParserMiddleware::new())
        .stage(idempotency)
        .build();

    (pipeline, dispatcher)
}

fn make_request(method: &str, path: &str, key: Option<&str>, body: Option<&str>) -> Request {
    let mut builder = HttpRequest::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
    }
    let payload = match body {
        Some(body) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Bytes::from(body.to_string())
        }
        None => Bytes::new(),
    };
    builder.body(Full::new(payload)).unwrap()
}

/// Handler that creates an order and counts its invocations.
fn create_order(calls: Arc<AtomicUsize>) -> Handler {
    Box::new(move |_ctx, _req| {
        Box::pin(async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            HttpResponse::builder()
                .status(StatusCode::CREATED)
                .header(CONTENT_TYPE, "application/json")
                .header("location", format!("/orders/{n}"))
                .header("set-cookie", "session=abc")
                .body(Full::new(Bytes::from(format!(r#"{{"id":{n}}}"#))))
                .unwrap()
        })
    })
}

fn ok_handler() -> Handler {
    Box::new(|_ctx, _req| {
        Box::pin(async {
            HttpResponse::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from_static(br#"{"ok":true}"#)))
                .unwrap()
        })
    })
}

fn failing_handler() -> Handler {
    Box::new(|_ctx, _req| {
        Box::pin(async {
            HttpResponse::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from_static(br#"{"reason":"inventory down"}"#)))
                .unwrap()
        })
    })
}

fn slow_handler(delay: Duration) -> Handler {
    Box::new(move |_ctx, _req| {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            HttpResponse::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from_static(b"done")))
                .unwrap()
        })
    })
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response.into_body()).await).unwrap()
}

// ============================================================================
// Protocol scenarios
// ============================================================================

#[tokio::test]
async fn test_first_time_request_is_captured_untouched() {
    let engine = Arc::new(ScriptedEngine::new().then_new());
    let (pipeline, _dispatcher) = build_pipeline(engine.clone());

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("GET", "/x", Some("k-a"), None),
            ok_handler(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(REPLAYED_HEADER));
    assert_eq!(json_body(response).await, json!({"ok": true}));

    let completions = engine.wait_for_completions(1).await;
    let stored = serde_json::to_value(&completions[0].outcome).unwrap();
    assert_eq!(
        stored,
        json!({
            "additional": {"statusCode": 200, "content-type": "application/json"},
            "body": {"ok": true}
        })
    );
}

#[tokio::test]
async fn test_cached_body_is_replayed() {
    let cached = CachedOutcome::success(200, json!({"ok": true}));
    let engine = Arc::new(ScriptedEngine::new().then_replay(cached));
    let (pipeline, dispatcher) = build_pipeline(engine.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("GET", "/x", Some("k-b"), None),
            create_order(calls.clone()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[REPLAYED_HEADER], "true");
    assert_eq!(json_body(response).await, json!({"ok": true}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    dispatcher.wait_idle().await;
    assert!(engine.completions().is_empty());
}

#[tokio::test]
async fn test_in_progress_is_rejected_with_retry_hint() {
    let engine = Arc::new(ScriptedEngine::new().then_fail(FailureCode::RequestInProgress));
    let (pipeline, _dispatcher) = build_pipeline(engine);

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/x", Some("k-c"), Some("{}")),
            ok_handler(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()[RETRY_AFTER], "1");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "REQUEST_IN_PROGRESS");
}

// ============================================================================
// Full round trips with a stateful engine
// ============================================================================

#[tokio::test]
async fn test_duplicate_replays_original_response() {
    let engine: Arc<dyn IdempotencyEngine> = Arc::new(MemoryEngine::default());
    let (pipeline, dispatcher) = build_pipeline(engine);
    let calls = Arc::new(AtomicUsize::new(0));

    let first = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", Some("order-1"), Some(r#"{"sku":"A-1"}"#)),
            create_order(calls.clone()),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_location = first.headers()["location"].clone();
    let first_body = body_bytes(first.into_body()).await;

    dispatcher.wait_idle().await;

    let second = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", Some("order-1"), Some(r#"{"sku":"A-1"}"#)),
            create_order(calls.clone()),
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.status(), StatusCode::CREATED);
    assert_eq!(second.headers()[REPLAYED_HEADER], "true");
    assert_eq!(second.headers()["location"], first_location);
    assert_eq!(second.headers()[CONTENT_TYPE], "application/json");
    // Not on the cacheable allowlist.
    assert!(!second.headers().contains_key("set-cookie"));
    assert_eq!(body_bytes(second.into_body()).await, first_body);
}

#[tokio::test]
async fn test_replayed_json_keeps_original_key_order() {
    let payload: &'static [u8] = br#"{"zeta":1,"alpha":2,"mid":{"y":true,"b":null}}"#;
    let handler = move || -> Handler {
        Box::new(move |_ctx, _req| {
            Box::pin(async move {
                HttpResponse::builder()
                    .status(StatusCode::CREATED)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Full::new(Bytes::from_static(payload)))
                    .unwrap()
            })
        })
    };

    let engine: Arc<dyn IdempotencyEngine> = Arc::new(MemoryEngine::default());
    let (pipeline, dispatcher) = build_pipeline(engine);

    let first = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/ordered", Some("ordered-1"), None),
            handler(),
        )
        .await;
    let first_body = body_bytes(first.into_body()).await;
    assert_eq!(first_body, Bytes::from_static(payload));

    dispatcher.wait_idle().await;

    let replayed = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/ordered", Some("ordered-1"), None),
            handler(),
        )
        .await;

    assert_eq!(replayed.headers()[REPLAYED_HEADER], "true");
    assert_eq!(body_bytes(replayed.into_body()).await, first_body);
}

#[tokio::test]
async fn test_concurrent_duplicate_is_told_to_retry() {
    let engine: Arc<dyn IdempotencyEngine> = Arc::new(MemoryEngine::default());
    let (pipeline, dispatcher) = build_pipeline(engine);

    let (first, second) = tokio::join!(
        pipeline.process(
            MiddlewareContext::new(),
            make_request("POST", "/slow", Some("slow-1"), None),
            slow_handler(Duration::from_millis(50)),
        ),
        pipeline.process(
            MiddlewareContext::new(),
            make_request("POST", "/slow", Some("slow-1"), None),
            slow_handler(Duration::from_millis(50)),
        ),
    );

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(second.headers()[RETRY_AFTER], "1");

    dispatcher.wait_idle().await;
}

#[tokio::test]
async fn test_cached_failure_is_replayed_through_error_channel() {
    let engine: Arc<dyn IdempotencyEngine> = Arc::new(MemoryEngine::default());
    let (pipeline, dispatcher) = build_pipeline(engine);

    let first = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/reserve", Some("r-1"), None),
            failing_handler(),
        )
        .await;
    assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);
    dispatcher.wait_idle().await;

    let second = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/reserve", Some("r-1"), None),
            ok_handler(),
        )
        .await;

    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(second.headers()[REPLAYED_HEADER], "true");
    assert_eq!(json_body(second).await, json!({"reason": "inventory down"}));
}

#[tokio::test]
async fn test_missing_and_oversized_keys_are_rejected() {
    let engine: Arc<dyn IdempotencyEngine> = Arc::new(MemoryEngine::default());
    let (pipeline, _dispatcher) = build_pipeline(engine);

    let missing = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", None, None),
            ok_handler(),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert!(!missing.headers().contains_key(RETRY_AFTER));
    assert_eq!(
        json_body(missing).await["error"]["code"],
        "IDEMPOTENCY_KEY_MISSING"
    );

    let long_key = "k".repeat(64);
    let too_long = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", Some(&long_key), None),
            ok_handler(),
        )
        .await;
    assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(too_long).await["error"]["code"],
        "IDEMPOTENCY_KEY_LEN_EXCEEDED"
    );
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_capture_is_transparent_when_completion_fails() {
    let engine = Arc::new(ScriptedEngine::new().failing_completions());
    let (pipeline, dispatcher) = build_pipeline(engine.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", Some("k-1"), None),
            create_order(calls),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["location"], "/orders/1");
    assert_eq!(response.headers()["set-cookie"], "session=abc");
    assert_eq!(json_body(response).await, json!({"id": 1}));

    dispatcher.wait_idle().await;
    assert_eq!(engine.completions().len(), 1);
}

#[tokio::test]
async fn test_unrecognized_engine_failure_reaches_error_channel() {
    let engine = Arc::new(ScriptedEngine::new().then_error("storage offline"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let pipeline = Pipeline::builder()
        .stage(BodyParserMiddleware::new())
        .stage(IdempotencyMiddleware::new(engine))
        .error_handler(
            move |_ctx: &MiddlewareContext, sink: ResponseWriter, error: PipelineError| {
                recorder
                    .lock()
                    .unwrap()
                    .push((sink.status(), error.code()));
                sink.send(Bytes::from_static(b"handled"))
            },
        )
        .build();

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("GET", "/x", Some("k-1"), None),
            ok_handler(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR".to_string())]
    );
}

#[tokio::test]
async fn test_cached_error_reaches_custom_error_handler() {
    let cached = CachedOutcome::failure(409, json!({"message": "already shipped"}));
    let engine = Arc::new(ScriptedEngine::new().then_replay(cached));
    let seen = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&seen);

    let pipeline = Pipeline::builder()
        .stage(IdempotencyMiddleware::new(engine))
        .error_handler(
            move |_ctx: &MiddlewareContext, sink: ResponseWriter, error: PipelineError| {
                if let PipelineError::Replayed { payload } = &error {
                    *recorder.lock().unwrap() = Some(payload.clone());
                }
                sink.send(Bytes::new())
            },
        )
        .build();

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/ship", Some("k-1"), None),
            ok_handler(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.headers()[REPLAYED_HEADER], "true");
    assert_eq!(
        *seen.lock().unwrap(),
        Some(json!({"message": "already shipped"}))
    );
}

#[tokio::test]
async fn test_malformed_body_never_reaches_engine() {
    let engine = Arc::new(ScriptedEngine::new());
    let (pipeline, _dispatcher) = build_pipeline(engine.clone());

    let response = pipeline
        .process(
            MiddlewareContext::new(),
            make_request("POST", "/orders", Some("k-1"), Some("{\"sku\":")),
            ok_handler(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "MALFORMED_BODY");
    assert!(engine.evaluations().is_empty());
}

#[tokio::test]
async fn test_parsed_body_reaches_engine_snapshot() {
    let engine = Arc::new(ScriptedEngine::new());
    let (pipeline, dispatcher) = build_pipeline(engine.clone());

    pipeline
        .process(
            MiddlewareContext::new(),
            make_request("PUT", "/orders/7?expand=items", Some("k-1"), Some(r#"{"qty":2}"#)),
            ok_handler(),
        )
        .await;
    dispatcher.wait_idle().await;

    let evaluated = &engine.evaluations()[0];
    assert_eq!(evaluated.body(), &json!({"qty": 2}));
    assert_eq!(evaluated.path(), "/orders/7");
    assert_eq!(evaluated.uri().query(), Some("expand=items"));

    // Both engine calls see the same snapshot.
    let completed = &engine.completions()[0].request;
    assert_eq!(completed.body(), evaluated.body());
    assert_eq!(completed.idempotency_key(), evaluated.idempotency_key());
}

#[tokio::test]
async fn test_stalled_engine_times_out() {
    use mnemosyne_core::fixtures::StalledEngine;

    let pipeline = Pipeline::builder()
        .stage(
            IdempotencyMiddleware::new(Arc::new(StalledEngine))
                .with_evaluate_timeout(Duration::from_millis(25)),
        )
        .build();

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        pipeline.process(
            MiddlewareContext::new(),
            make_request("GET", "/x", Some("k-1"), None),
            ok_handler(),
        ),
    )
    .await
    .expect("pipeline must not hang");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
