use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Caller mistakes only get the message; everything else carries the full error.
        let error = match self {
            PaymentError::InvalidRequest(_) => None,
            _ => Some(self.to_string()),
        };

        let body = Json(ErrorResponse {
            message: self.message(),
            error,
        });

        (status, body).into_response()
    }
}
