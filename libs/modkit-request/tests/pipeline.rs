//! End-to-end pipeline behavior with in-process adapters: merging,
//! interceptor ordering and execution modes, dispatch, adapter resolution
//! and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::{Method, StatusCode};
use modkit_request::{
    AdapterAttempt, AdapterChoice, AdapterPreference, CancelToken, AbortController, Client,
    ExecutionMode, HeaderBucket, Interceptor, Payload, RequestConfig, RequestError, Response,
    TransportError, TransportErrorKind, adapter_fn, merge_config,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

type Log = Arc<Mutex<Vec<String>>>;

/// Client whose `"http"` adapter records each call and echoes the body.
fn client_with_counter() -> (Client, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let client = Client::builder()
        .without_http_adapter()
        .register_adapter(adapter_fn("http", move |config: RequestConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let data = config.data.get().cloned().unwrap_or_default();
                Ok(Response::new(StatusCode::OK, data))
            }
        }))
        .build()
        .unwrap();
    (client, calls)
}

fn logging_request(log: &Log, label: &'static str) -> Interceptor<RequestConfig> {
    let log = Arc::clone(log);
    Interceptor::new(move |config| {
        log.lock().push(format!("req:{label}"));
        Ok(config)
    })
}

fn logging_response(log: &Log, label: &'static str) -> Interceptor<Response> {
    let log = Arc::clone(log);
    Interceptor::new(move |response| {
        log.lock().push(format!("res:{label}"));
        Ok(response)
    })
}

#[tokio::test]
async fn request_interceptors_run_in_reverse_and_response_in_order() {
    let (client, _) = client_with_counter();
    let log: Log = Arc::default();
    for label in ["a", "b", "c"] {
        client.interceptors().request.register(logging_request(&log, label));
        client.interceptors().response.register(logging_response(&log, label));
    }

    client.request("/x").await.unwrap();

    assert_eq!(
        *log.lock(),
        vec!["req:c", "req:b", "req:a", "res:a", "res:b", "res:c"]
    );
}

#[tokio::test]
async fn run_when_false_excludes_interceptor() {
    let (client, _) = client_with_counter();
    let log: Log = Arc::default();
    client.interceptors().request.register(
        logging_request(&log, "post-only").run_when(|config| config.method.get() == Some(&Method::POST)),
    );
    client.interceptors().request.register(logging_request(&log, "always"));

    client.request("/x").await.unwrap();
    assert_eq!(*log.lock(), vec!["req:always"]);

    log.lock().clear();
    client.post("/x", "body", RequestConfig::new()).await.unwrap();
    assert_eq!(*log.lock(), vec!["req:always", "req:post-only"]);
}

#[tokio::test]
async fn sync_interceptor_failure_prevents_dispatch() {
    let (client, calls) = client_with_counter();
    let a_runs = Arc::new(AtomicUsize::new(0));
    let b_rejections = Arc::new(AtomicUsize::new(0));

    // registered first, so it runs after "a"
    let rejections = Arc::clone(&b_rejections);
    client.interceptors().request.register(
        Interceptor::new(|_| Err(RequestError::custom("b failed")))
            .on_rejected(move |err| {
                rejections.fetch_add(1, Ordering::SeqCst);
                Err(err)
            })
            .synchronous(true),
    );
    let runs = Arc::clone(&a_runs);
    client.interceptors().request.register(
        Interceptor::new(move |config| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(config)
        })
        .synchronous(true),
    );

    let err = client.request("/x").await.unwrap_err();
    assert_eq!(err.to_string(), "b failed");
    assert_eq!(a_runs.load(Ordering::SeqCst), 1);
    assert_eq!(b_rejections.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sync_rejected_handler_can_recover() {
    let (client, calls) = client_with_counter();
    client.interceptors().request.register(
        Interceptor::new(|_| Err(RequestError::custom("boom")))
            .on_rejected(|_| Ok(RequestConfig::new().url("/recovered")))
            .synchronous(true),
    );

    let prepared = client.prepare("/x").unwrap();
    assert_eq!(prepared.mode(), ExecutionMode::Synchronous);
    let response = prepared.await.unwrap();
    assert_eq!(response.config.url.get().map(String::as_str), Some("/recovered"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_chain_passes_failures_to_next_rejected_handler() {
    let (client, calls) = client_with_counter();
    // chain order: failing (registered last) → recovering
    client.interceptors().request.register(
        Interceptor::new(Ok).on_rejected_async(|_| async { Ok(RequestConfig::new().url("/fallback")) }),
    );
    client
        .interceptors()
        .request
        .register(Interceptor::new_async(|_| async { Err(RequestError::custom("async failure")) }));

    let prepared = client.prepare("/x").unwrap();
    assert_eq!(prepared.mode(), ExecutionMode::Asynchronous);
    let response = prepared.await.unwrap();
    assert_eq!(response.config.url.get().map(String::as_str), Some("/fallback"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn response_rejected_handler_sees_transport_error() {
    let client = Client::builder()
        .without_http_adapter()
        .register_adapter(adapter_fn("http", |_| async {
            Err(TransportError::new(TransportErrorKind::Network, "connection refused").into())
        }))
        .build()
        .unwrap();
    client.interceptors().response.register(
        Interceptor::new(Ok).on_rejected(|err| {
            assert!(matches!(err, RequestError::Transport(_)));
            Ok(Response::new(StatusCode::SERVICE_UNAVAILABLE, "offline"))
        }),
    );

    let response = client.request("/x").await.unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.data, Payload::from("offline"));
}

#[tokio::test]
async fn ejected_interceptor_stays_in_prepared_request() {
    let (client, _) = client_with_counter();
    let log: Log = Arc::default();
    let id = client
        .interceptors()
        .request
        .register(logging_request(&log, "ejected").synchronous(false));

    let prepared = client.prepare("/x").unwrap();
    assert!(client.interceptors().request.eject(id));
    prepared.await.unwrap();
    assert_eq!(*log.lock(), vec!["req:ejected"]);

    log.lock().clear();
    client.request("/x").await.unwrap();
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn adapter_preference_falls_through_to_direct_adapter() {
    let (client, _) = client_with_counter();
    let direct = adapter_fn("inline", |_| async { Ok(Response::new(StatusCode::ACCEPTED, "")) });
    let preference = AdapterPreference(vec![
        AdapterChoice::Named("missing".to_owned()),
        AdapterChoice::Direct(direct),
    ]);

    let response = client.request(RequestConfig::new().adapter(preference)).await.unwrap();
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let err = client
        .request(RequestConfig::new().adapter("missing"))
        .await
        .unwrap_err();
    match err {
        RequestError::AdapterResolution(e) => {
            assert_eq!(e.attempts, vec![AdapterAttempt::NotRegistered("missing".to_owned())]);
            assert!(e.to_string().contains("missing"), "{e}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_before_dispatch_skips_adapter() {
    let (client, calls) = client_with_counter();
    let controller = AbortController::new();
    controller.abort();

    let err = client
        .request(RequestConfig::new().signal(controller.signal()))
        .await
        .unwrap_err();
    assert!(modkit_request::is_cancel(&err));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_after_adapter_settles_wins() {
    let token = CancelToken::new();
    let trip = token.clone();
    let client = Client::builder()
        .defaults(RequestConfig::standard())
        .without_http_adapter()
        .register_adapter(adapter_fn("http", move |_| {
            trip.cancel(Some("user left"));
            async { Ok(Response::new(StatusCode::OK, r#"{"ok":true}"#)) }
        }))
        .build()
        .unwrap();

    let err = client
        .request(RequestConfig::new().cancel_token(token))
        .await
        .unwrap_err();
    match err {
        RequestError::Canceled(e) => assert_eq!(e.message.as_deref(), Some("user left")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn layered_headers_are_flattened_before_transport() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let client = Client::builder()
        .without_http_adapter()
        .register_adapter(adapter_fn("http", move |config: RequestConfig| {
            *sink.lock() = Some(config.headers.clone());
            async { Ok(Response::new(StatusCode::OK, "")) }
        }))
        .build()
        .unwrap();

    let config = RequestConfig::new()
        .method(Method::GET)
        .header_in(HeaderBucket::Common, "X-A", "1")
        .header_in(HeaderBucket::Get, "X-B", "2");
    client.request(("/users", config)).await.unwrap();

    let headers = seen.lock().clone().unwrap();
    assert!(!headers.has_buckets());
    assert_eq!(headers.values().len(), 2);
    assert_eq!(headers.values().get("x-a"), Some("1"));
    assert_eq!(headers.values().get("x-b"), Some("2"));
}

#[tokio::test]
async fn post_content_type_defaults_to_form() {
    let (client, _) = client_with_counter();

    let response = client
        .post("/items", json!({"a": 1}), RequestConfig::new())
        .await
        .unwrap();
    assert_eq!(
        response.config.headers.values().content_type(),
        Some("application/x-www-form-urlencoded")
    );

    let response = client
        .post(
            "/items",
            json!({"a": 1}),
            RequestConfig::new().header("Content-Type", "application/json"),
        )
        .await
        .unwrap();
    assert_eq!(
        response.config.headers.values().content_type(),
        Some("application/json")
    );
}

#[tokio::test]
async fn defaults_merge_deeply_with_call_config() {
    let (client, _) = client_with_counter();
    client.update_defaults(|defaults| {
        *defaults = std::mem::take(defaults)
            .header("x-shared", "default")
            .header("x-default-only", "1")
            .param("page", 1)
            .param("filter", json!({"state": "open", "owner": "me"}));
    });

    let response = client
        .request(
            RequestConfig::new()
                .url("/issues")
                .header("x-shared", "call")
                .param("filter", json!({"owner": "you"})),
        )
        .await
        .unwrap();

    let headers = response.config.headers.values();
    assert_eq!(headers.get("x-shared"), Some("call"));
    assert_eq!(headers.get("x-default-only"), Some("1"));
    assert_eq!(
        response.config.params.get().cloned().map(Value::Object),
        Some(json!({"page": 1, "filter": {"state": "open", "owner": "you"}}))
    );
    assert_eq!(client.defaults().headers.values().get("x-shared"), Some("default"));
}

#[test]
fn merge_with_empty_override_is_identity() {
    let resolved = RequestConfig::new()
        .url("/a")
        .method(Method::PATCH)
        .header("x-a", "1")
        .param("q", "rust")
        .data(json!({"k": "v"}))
        .extension("trace", true);
    assert_eq!(merge_config(&resolved, &RequestConfig::new()), resolved);
}

#[test]
fn get_uri_renders_without_dispatch() {
    let (client, calls) = client_with_counter();
    client.update_defaults(|defaults| *defaults = std::mem::take(defaults).base_url("https://api.test/v2/"));

    let uri = client.get_uri(
        RequestConfig::new()
            .url("/search")
            .param("q", "a b")
            .param("tags", json!(["x", "y"])),
    );
    assert_eq!(uri, "https://api.test/v2/search?q=a+b&tags[]=x&tags[]=y");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
