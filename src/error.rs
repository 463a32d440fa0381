use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use crate::dispatch::Saturated;
use crate::signature::SignatureError;

/// Failures that end an inbound request at the HTTP boundary.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("signature verification failed: {0}")]
    Unauthorized(SignatureError),
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("form body has no command field")]
    MissingCommand,
    #[error("too many handlers in flight")]
    Saturated,
}

impl InboundError {
    pub fn status(&self) -> StatusCode {
        match self {
            InboundError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            InboundError::MissingHeader(_)
            | InboundError::InvalidTimestamp
            | InboundError::MalformedPayload(_)
            | InboundError::MissingCommand => StatusCode::BAD_REQUEST,
            InboundError::Saturated => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<SignatureError> for InboundError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::MissingHeader(name) => InboundError::MissingHeader(name),
            SignatureError::InvalidTimestamp => InboundError::InvalidTimestamp,
            other => InboundError::Unauthorized(other),
        }
    }
}

impl From<Saturated> for InboundError {
    fn from(_: Saturated) -> Self {
        InboundError::Saturated
    }
}

impl IntoResponse for InboundError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "rejecting request");
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_failures_map_to_status_codes() {
        let cases = [
            (SignatureError::MissingHeader("x-slack-signature"), StatusCode::BAD_REQUEST),
            (SignatureError::InvalidTimestamp, StatusCode::BAD_REQUEST),
            (SignatureError::Expired { age_secs: 900 }, StatusCode::UNAUTHORIZED),
            (SignatureError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (SignatureError::Mismatch, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(InboundError::from(err).status(), status);
        }
    }

    #[test]
    fn saturation_is_service_unavailable() {
        let response = InboundError::from(Saturated).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
