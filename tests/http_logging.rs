//! End-to-end behaviour of the request/response logger, driven through the
//! router without a socket.

use std::sync::Arc;
use std::time::Duration;

use astor_httplog::middleware::{HttpLogger, LogConfig, LogLevel, Recover};
use astor_httplog::pool::{BufferPool, PoolConfig};
use astor_httplog::{Body, BoxError, Request, Response, ResponseWriter, Router};
use bytes::Bytes;
use futures_util::stream;
use http::{Method, StatusCode};
use http_body::Frame;
use http_body_util::StreamBody;

mod common;
use common::{LogBuffer, assert_all_released, request, request_id, send, subscriber};

async fn echo(mut req: Request) -> Response {
    match req.bytes().await {
        Ok(body) => Response::json(body),
        Err(_) => Response::status(StatusCode::BAD_REQUEST),
    }
}

async fn get_user(req: Request) -> Response {
    Response::builder()
        .header("x-user", req.param("id").unwrap_or_default().to_owned())
        .text("alice")
}

async fn ignore_body(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn boom(mut req: Request) -> Response {
    let _ = req.bytes().await;
    panic!("handler failure")
}

fn pool() -> Arc<BufferPool> {
    Arc::new(BufferPool::new(PoolConfig::default()))
}

fn logger(pool: &Arc<BufferPool>, config: LogConfig) -> HttpLogger {
    HttpLogger::with_pool(config, Arc::clone(pool))
}

#[tokio::test]
async fn request_body_is_logged_and_still_read_by_handler() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).build()).layer())
        .on(Method::POST, "/echo", echo);

    let w = send(&router, request(Method::POST, "/echo", r#"{"a":1}"#)).await;

    assert_eq!(w.status(), StatusCode::OK);
    assert_eq!(w.body(), br#"{"a":1}"#);

    let pre = logs.matching("[Request  ");
    let post = logs.matching("[Response ");
    assert_eq!(pre.len(), 1);
    assert_eq!(post.len(), 1);
    assert!(pre[0].ends_with(r#" , [data]: {"a":1}"#), "{}", pre[0]);
    assert_all_released(&pool);
}

#[tokio::test]
async fn response_body_capture_matches_what_client_receives() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).response_body(true).build()))
        .on(Method::POST, "/echo", echo);

    let w = send(&router, request(Method::POST, "/echo", "ping-pong")).await;

    let post = logs.matching("[Response ");
    assert_eq!(post.len(), 1);
    let (_, logged) = post[0].split_once(" , [data]: ").unwrap();
    assert_eq!(logged.as_bytes(), w.body());
    assert!(post[0].contains("[status]: 200 "));
    assert_all_released(&pool);
}

#[tokio::test]
async fn lines_carry_request_metadata_and_share_an_id() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::default()))
        .on(Method::GET, "/users/{id}", get_user);

    send(&router, request(Method::GET, "/users/42?verbose=1", "")).await;

    let pre = &logs.matching("[Request  ")[0];
    let post = &logs.matching("[Response ")[0];

    assert!(pre.contains("[path]: /users/42 , [method]: GET , [client ip]: 192.0.2.10 , [params]: [id=42] , [query]: verbose=1"), "{pre}");
    assert!(!pre.contains("[data]"));
    assert!(!pre.contains("[header]"));
    assert!(post.contains("[path]: /users/42 , [method]: GET , [latency]: "));
    assert!(post.contains(" ms, [status]: 200 "));

    let id = request_id(pre);
    assert_eq!(id.len(), 24);
    assert_eq!(request_id(post), id);
}

#[tokio::test]
async fn headers_are_logged_only_when_enabled() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let base = logger(&pool, LogConfig::default());
    let router = Router::new()
        .on_with(
            Method::GET,
            "/users/{id}",
            base.clone_with(|c| c.request_header(true).response_header(true)),
            get_user,
        )
        .on_with(Method::GET, "/plain/{id}", base, get_user);

    let traced = http::Request::builder()
        .uri("/users/7")
        .header("x-trace", "abc")
        .body(Body::empty())
        .unwrap();
    send(&router, Request::new(traced)).await;
    send(&router, request(Method::GET, "/plain/7", "")).await;

    let pre = logs.matching("[Request  ");
    let post = logs.matching("[Response ");
    assert_eq!(pre.len(), 2);
    assert_eq!(post.len(), 2);

    assert!(pre[0].contains(", [header]: x-trace=abc "), "{}", pre[0]);
    assert!(post[0].contains(", [header]: "));
    assert!(post[0].contains("x-user=7 "), "{}", post[0]);

    assert!(!pre[1].contains("[header]"));
    assert!(!post[1].contains("[header]"));
    assert_all_released(&pool);
}

#[tokio::test]
async fn large_body_is_truncated_in_log_only() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).max_body_capture(8).build()))
        .on(Method::POST, "/echo", echo);

    let payload = "x".repeat(100);
    let w = send(&router, request(Method::POST, "/echo", payload.clone())).await;

    assert_eq!(w.body(), payload.as_bytes());
    let pre = &logs.matching("[Request  ")[0];
    assert!(pre.ends_with(" , [data]: xxxxxxxx...(truncated)"), "{pre}");
}

#[tokio::test]
async fn unread_body_is_still_released() {
    let pool = pool();
    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).response_body(true).build()))
        .on(Method::POST, "/ignore", ignore_body);

    let w = send(&router, request(Method::POST, "/ignore", "never read")).await;

    assert_eq!(w.status(), StatusCode::NO_CONTENT);
    assert_all_released(&pool);
    assert!(pool.get().is_empty());
}

#[tokio::test]
async fn level_selects_severity() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .on_with(Method::GET, "/warn/{id}", logger(&pool, LogConfig::builder().level(LogLevel::Warn).build()), get_user)
        .on_with(Method::GET, "/fatal/{id}", logger(&pool, LogConfig::builder().level(LogLevel::Fatal).build()), get_user);

    send(&router, request(Method::GET, "/warn/1", "")).await;
    send(&router, request(Method::GET, "/fatal/1", "")).await;

    let lines = logs.matching("[Re");
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("WARN") && lines[1].contains("WARN"));
    assert!(lines[2].contains("ERROR") && lines[3].contains("ERROR"));
}

#[tokio::test]
async fn panicking_handler_still_releases_buffers() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let all = LogConfig::builder()
        .request_header(true)
        .request_body(true)
        .response_header(true)
        .response_body(true)
        .build();
    let router = Arc::new(
        Router::new()
            .layer(logger(&pool, all))
            .on(Method::POST, "/boom", boom),
    );

    let task = tokio::spawn({
        let router = Arc::clone(&router);
        async move {
            send(&router, request(Method::POST, "/boom", r#"{"a":1}"#)).await;
        }
    });
    let err = task.await.unwrap_err();
    assert!(err.is_panic());

    assert_eq!(logs.matching("[Request  ").len(), 1);
    assert!(logs.matching("[Response ").is_empty());
    assert_all_released(&pool);
    assert!(pool.get().is_empty());
}

#[tokio::test]
async fn recovered_panic_is_logged_as_500() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).response_body(true).build()))
        .layer(Recover)
        .on(Method::POST, "/boom", boom);

    let w = send(&router, request(Method::POST, "/boom", "payload")).await;

    assert_eq!(w.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let post = logs.matching("[Response ");
    assert_eq!(post.len(), 1);
    assert!(post[0].contains("[status]: 500 "));
    assert_all_released(&pool);
}

async fn slow_echo(mut req: Request) -> Response {
    let body = req.bytes().await.unwrap_or_default();
    tokio::time::sleep(Duration::from_secs(60)).await;
    Response::json(body)
}

#[tokio::test]
async fn cancelled_request_releases_buffers() {
    let pool = pool();
    let all = LogConfig::builder()
        .request_header(true)
        .request_body(true)
        .response_header(true)
        .response_body(true)
        .build();
    let router = Router::new()
        .layer(logger(&pool, all))
        .on(Method::POST, "/slow", slow_echo);

    let req = request(Method::POST, "/slow", r#"{"a":1}"#);
    let outcome = tokio::time::timeout(Duration::from_millis(20), send(&router, req)).await;

    assert!(outcome.is_err());
    let stats = pool.stats();
    assert_eq!(stats.hits + stats.misses, 3, "{stats:?}");
    assert_all_released(&pool);
}

#[tokio::test]
async fn body_read_error_is_logged_and_surfaced_to_handler() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let router = Router::new()
        .layer(logger(&pool, LogConfig::builder().request_body(true).build()))
        .on(Method::POST, "/echo", echo);

    let frames: Vec<Result<Frame<Bytes>, BoxError>> = vec![
        Ok(Frame::data(Bytes::from_static(b"partial"))),
        Err("connection reset".into()),
    ];
    let body = Body::new(StreamBody::new(stream::iter(frames)));
    let req = http::Request::post("/echo").body(body).unwrap();
    let w = send(&router, Request::new(req)).await;

    assert_eq!(w.status(), StatusCode::BAD_REQUEST);

    let pre = logs.matching("[Request  ");
    assert_eq!(pre.len(), 1);
    assert!(pre[0].ends_with(" , [data]: partial"), "{}", pre[0]);

    let warned = logs.matching("request body capture failed");
    assert_eq!(warned.len(), 1);
    assert!(warned[0].contains("WARN") && warned[0].contains("connection reset"), "{}", warned[0]);

    let post = logs.matching("[Response ");
    assert_eq!(post.len(), 1);
    assert!(post[0].contains("[status]: 400 "));
    assert_all_released(&pool);
}

#[tokio::test]
async fn large_response_is_truncated_in_log_only() {
    let logs = LogBuffer::default();
    let _guard = tracing::subscriber::set_default(subscriber(&logs));
    let pool = pool();

    let config = LogConfig::builder().response_body(true).max_body_capture(4).build();
    let router = Router::new()
        .layer(logger(&pool, config))
        .on(Method::POST, "/echo", echo);

    let w = send(&router, request(Method::POST, "/echo", "0123456789")).await;

    assert_eq!(w.body(), b"0123456789");
    let post = &logs.matching("[Response ")[0];
    assert!(post.ends_with(" , [data]: 0123...(truncated)"), "{post}");
    assert_all_released(&pool);
}
