// ABOUTME: HTTP Basic authentication middleware enforcing the server's authorization policy.
// ABOUTME: Health and info actuator endpoints are public; every other request needs credentials.

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};

/// Paths reachable without credentials (load balancer health checks).
pub const PUBLIC_PATHS: [&str; 2] = ["/actuator/health", "/actuator/info"];

const CHALLENGE: &str = "Basic realm=\"Realm\"";

/// Expected username and password.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check an `Authorization` header value. Both fields are compared in
    /// constant time and both comparisons always run.
    pub fn verify_header(&self, value: &str) -> bool {
        let Some((user, pass)) = parse_basic(value) else {
            return false;
        };
        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Split `Basic <base64(user:password)>` into its parts.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim().as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Whether `path` is exempt from authentication.
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// A tower Layer that applies HTTP Basic authentication to non-public routes.
#[derive(Clone, Debug)]
pub struct BasicAuthLayer {
    credentials: Arc<Credentials>,
}

impl BasicAuthLayer {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = BasicAuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BasicAuthMiddleware {
            inner,
            credentials: Arc::clone(&self.credentials),
        }
    }
}

/// The middleware service that checks Basic credentials.
#[derive(Clone, Debug)]
pub struct BasicAuthMiddleware<S> {
    inner: S,
    credentials: Arc<Credentials>,
}

impl<S> Service<Request<Body>> for BasicAuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let authorized = is_public(req.uri().path())
            || req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| self.credentials.verify_header(v));

        if authorized {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        tracing::debug!(
            method = %req.method(),
            path = %req.uri().path(),
            "rejected unauthenticated request"
        );
        Box::pin(async move { Ok(unauthorized()) })
    }
}

fn unauthorized() -> Response<Body> {
    let mut resp = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized" })),
    )
        .into_response();
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
    resp
}
