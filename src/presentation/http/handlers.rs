use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::proxy::job::{Job, Status};

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    key: Option<String>,
}

/// Serves `GET /?key=<key>`. Any other method on this route is rejected
/// with 405 before a job is ever built.
pub async fn get_value(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<KeyQuery>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, String::new()).into_response();
    }

    let key = match params.key.filter(|k| !k.is_empty()) {
        Some(key) => key,
        None => return (StatusCode::BAD_REQUEST, String::new()).into_response(),
    };

    let (job, reply) = Job::new(key);
    if state.jobs.try_send(job).is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, String::new()).into_response();
    }

    match reply.await {
        Ok(response) => (status_code(response.status), response.body).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, String::new()).into_response(),
    }
}

fn status_code(status: Status) -> StatusCode {
    match status {
        Status::Ok => StatusCode::OK,
        Status::NotFound => StatusCode::NOT_FOUND,
        Status::BadRequest => StatusCode::BAD_REQUEST,
        Status::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        Status::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
