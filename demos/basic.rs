//! Access logging with request/response body capture on one route.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42?verbose=1
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'

use astor_httplog::middleware::{HttpLogger, LogConfig, Recover};
use astor_httplog::{Request, Response, Router, Server};
use http::{Method, StatusCode};

const LOG_CONFIG: &str = r#"
level = "info"
requestHeader = true
maxBodyCapture = 4096
"#;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config: LogConfig = toml::from_str(LOG_CONFIG).expect("invalid log config");
    let logger = HttpLogger::new(config);

    let app = Router::new()
        .layer(Recover)
        .on_with(Method::GET, "/users/{id}", logger.clone(), get_user)
        .on_with(
            Method::POST,
            "/users",
            logger.clone_with(|c| c.request_body(true).response_body(true)),
            create_user,
        )
        .on_with(Method::DELETE, "/users/{id}", logger, delete_user);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// The logger has already read the body once; the handler still gets all of it.
async fn create_user(mut req: Request) -> Response {
    match req.bytes().await {
        Ok(body) if !body.is_empty() => Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/99")
            .json(r#"{"id":"99","name":"new_user"}"#),
        _ => Response::status(StatusCode::BAD_REQUEST),
    }
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}
