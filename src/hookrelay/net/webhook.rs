use std::borrow::Cow;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use log::{debug, error};
use percent_encoding::percent_decode_str;

use crate::error::{ErrorCode, RelayError};
use crate::hookrelay::pubsub::PubSub;

/// Every method on every path goes to the bus
pub fn router(bus: Arc<PubSub>) -> Router {
    Router::new().fallback(webhook).with_state(bus)
}

/// Path without its leading separator, percent-decoded.
///
/// Escapes that decode to invalid UTF-8 become U+FFFD; malformed escapes stay literal.
pub fn topic_from_path(path: &str) -> Cow<'_, str> {
    let raw = path.strip_prefix('/').unwrap_or(path);
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Reads the whole body and publishes it to the topic named by the path.
///
/// Answers 204 once the bus has taken the payload, whether or not a consumer
/// existed, and 500 if the body could not be read.
pub async fn webhook(
    State(bus): State<Arc<PubSub>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    let topic = topic_from_path(uri.path());

    let payload = match to_bytes(body, usize::MAX).await {
        Ok(payload) => payload,
        Err(e) => {
            let err = RelayError::new(ErrorCode::BodyReadFailed, e.to_string());
            error!("{} {}: {}", method, uri.path(), err);
            return internal_error();
        }
    };

    let size = payload.len();
    let delivery = bus.publish(&topic, payload).await;
    debug!("{} {}: {} bytes to topic {:?}: {:?}", method, uri.path(), size, topic, delivery);

    StatusCode::NO_CONTENT.into_response()
}

fn internal_error() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let text = status.canonical_reason().unwrap_or("Internal Server Error");
    (status, format!("{}\n", text)).into_response()
}
