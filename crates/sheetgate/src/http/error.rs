use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sheetgate_protocol::ErrorBody;
use tracing::{debug, error};

use crate::error::GatewayError;

/// Boundary wrapper turning a [`GatewayError`] into a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = %err.kind(), status = status.as_u16(), error = %err, "Request failed");
        } else {
            debug!(kind = %err.kind(), status = status.as_u16(), error = %err, "Request rejected");
        }
        let body = ErrorBody::new(err.kind().as_str(), err.public_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_follows_error_kind() {
        let response = ApiError(GatewayError::forbidden("no")).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError(GatewayError::RemoteRejected {
            status: 422,
            message: "bad sheet".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response =
            ApiError(GatewayError::io("Failed to store upload", io::Error::other("disk")))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
