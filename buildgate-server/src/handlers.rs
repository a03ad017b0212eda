//! HTTP request handlers

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use crate::tracing::Stage;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use buildgate_core::{decode, encode, resolve, Decision, GateError, Signature, SignedRequest};
use std::borrow::Cow;
use std::time::Instant;
use tracing::error;

/// Signature view of an inbound request head
pub struct InboundRequest<'a> {
    parts: &'a Parts,
}

impl<'a> InboundRequest<'a> {
    /// Wrap request parts
    pub fn new(parts: &'a Parts) -> Self {
        Self { parts }
    }
}

impl SignedRequest for InboundRequest<'_> {
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn request_target(&self) -> Cow<'_, str> {
        match self.parts.uri.path_and_query() {
            Some(target) => Cow::Borrowed(target.as_str()),
            None => Cow::Borrowed("/"),
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

/// Policy decision ready to be written
#[derive(Debug)]
pub struct DecisionResponse(pub Decision);

impl IntoResponse for DecisionResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.0.body() {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

/// Validate a build request
///
/// Mounted as the router fallback, so it answers on every path. The
/// signature is checked before the body is read; each failing gate ends the
/// request with its own 400 response.
pub async fn validate(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<DecisionResponse> {
    admit(&state, request).await.map_err(|err| {
        if let ApiError::Internal(detail) = &err {
            error!("validator: internal error: {}", detail);
        }
        metrics::record_rejection(err.reason());
        err
    })
}

async fn admit(state: &AppState, request: Request) -> ApiResult<DecisionResponse> {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let head = InboundRequest::new(&parts);
    let reject = |stage: Stage, err: GateError| {
        state.debug.event(stage, &err);
        ApiError::from(err)
    };

    let signature =
        Signature::from_request(&head).map_err(|e| reject(Stage::Signature, e))?;
    state
        .verifier
        .verify(&signature, &head)
        .map_err(|e| reject(Stage::Verification, e))?;

    let bytes = read_body(body, state.max_body_bytes)
        .await
        .map_err(|e| reject(Stage::Body, e))?;
    state
        .verifier
        .verify_digest(&signature, &head, &bytes)
        .map_err(|e| reject(Stage::Verification, e))?;

    let build = decode(&bytes).map_err(|e| reject(Stage::Decode, e))?;
    state.debug.payload(&bytes);

    let author = build.author();
    let disposition = resolve(author, &state.policies);
    let decision = encode(disposition, author);

    if let Some(message) = &decision.message {
        state.debug.event(Stage::Resolve, message);
    }
    metrics::record_decision(disposition, start.elapsed().as_secs_f64());

    Ok(DecisionResponse(decision))
}

async fn read_body(body: Body, limit: usize) -> Result<axum::body::Bytes, GateError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| GateError::BodyReadError(e.to_string()))
}
