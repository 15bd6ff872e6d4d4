use axum::{
    Json,
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::json;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Request bodies up to this size are logged when they are JSON.
const MAX_LOGGED_BODY: usize = 1024;

/// Wrap each request in an `http_request` span keyed by a trace id.
///
/// The id comes from an incoming `x-trace-id` header when it parses as a
/// UUID and is echoed on the response. Only small JSON request bodies are
/// read here; everything else reaches the handler as a stream. Response
/// bodies pass through untouched so streamed replies reach the caller as
/// they are produced.
pub async fn trace_middleware(req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let mut response = match log_body(&parts.headers, body).await {
            Ok(body) => {
                let mut req = Request::from_parts(parts, body);
                if let Some(value) = &header_value {
                    req.headers_mut().insert(X_TRACE_ID, value.clone());
                }
                next.run(req).await
            }
            Err(rejection) => rejection,
        };
        if let Some(value) = header_value {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response headers sent"
        );
        response
    }
    .instrument(span)
    .await
}

/// Declared length of a JSON body small enough to log.
fn loggable_len(headers: &HeaderMap) -> Option<usize> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())?;
    (is_json && len < MAX_LOGGED_BODY).then_some(len)
}

/// Log the request body when it is small JSON, returning a body for the handler.
///
/// Other bodies are handed back unread. A loggable body that cannot be read,
/// or that runs past the limit its headers promised, is rejected.
async fn log_body(headers: &HeaderMap, body: Body) -> Result<Body, Response> {
    if loggable_len(headers).is_none() {
        if let Some(len) = headers.get(header::CONTENT_LENGTH) {
            debug!(content_length = ?len, "request body not logged");
        }
        return Ok(body);
    }

    let bytes: Bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("request body exceeds its declared length");
            return Err(reject(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
        }
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return Err(reject(StatusCode::BAD_REQUEST, "failed to read request body"));
        }
    };

    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!(body = %text, "request body");
    }
    Ok(Body::from(bytes))
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
