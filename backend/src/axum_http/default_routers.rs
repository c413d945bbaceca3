use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub message: &'static str,
    pub status: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub payments: &'static str,
}

pub async fn root() -> impl IntoResponse {
    Json(ServerInfo {
        message: "VTC API Server is running",
        status: "OK",
        endpoints: Endpoints {
            payments: "/api/payments",
        },
    })
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "NOT_FOUND").into_response()
}
