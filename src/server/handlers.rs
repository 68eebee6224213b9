use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AppState;
use crate::error::AuthorizationError;
use crate::health::AvailabilityStatus;
use crate::spotify::CallbackParams;

pub const ERR_ALREADY_AUTHENTICATED: &str = "you are already authenticated";
pub const ERR_NOT_AUTHENTICATED: &str = "you must be authenticated to access this endpoint";
pub const ERR_RETRIEVE_CURRENT_TRACK: &str = "failed to retrieve current playing track";
pub const ERR_PROCESS_CURRENT_TRACK: &str = "failed to process images for currently playing track";
pub const ERR_RETRIEVE_TOKEN: &str = "could not retrieve token";
pub const MSG_AUTHENTICATED: &str = "welcome, you are now authenticated!";

/// Body of a successful action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Success {
    pub success: String,
}

/// Body of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An error response with a fixed, client-facing message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message.to_string(),
            }),
        )
            .into_response()
    }
}

/// Reject requests once the session is authorized.
pub async fn guest_only(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.spoty.is_authorized() {
        return ApiError::new(StatusCode::FORBIDDEN, ERR_ALREADY_AUTHENTICATED).into_response();
    }
    next.run(request).await
}

/// Reject requests until the session is authorized.
pub async fn authenticated_only(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.spoty.is_authorized() {
        return ApiError::new(StatusCode::UNAUTHORIZED, ERR_NOT_AUTHENTICATED).into_response();
    }
    next.run(request).await
}

/// `GET /`: aggregate health, 503 while any probe is down.
pub async fn health(State(state): State<AppState>) -> Response {
    let result = state.checker.result();
    let status = match result.status {
        AvailabilityStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        AvailabilityStatus::Up | AvailabilityStatus::Unknown => StatusCode::OK,
    };
    (status, Json(result)).into_response()
}

/// `GET /api/version`
pub async fn version(State(state): State<AppState>) -> Response {
    Json(state.build).into_response()
}

/// `GET /api/authenticate`: redirect to the Spotify consent page.
pub async fn authenticate(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.spoty.authorize_url())],
    )
        .into_response()
}

/// `GET /api/callback`: complete the authorization-code flow.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Success>, ApiError> {
    match state.spoty.complete_authorization(&params).await {
        Ok(()) => Ok(Json(Success {
            success: MSG_AUTHENTICATED.to_string(),
        })),
        Err(AuthorizationError::AlreadyAuthorized) => Err(ApiError::new(
            StatusCode::FORBIDDEN,
            ERR_ALREADY_AUTHENTICATED,
        )),
        Err(e) => {
            warn!(error = %e, "Authorization callback rejected");
            Err(ApiError::new(StatusCode::FORBIDDEN, ERR_RETRIEVE_TOKEN))
        }
    }
}

/// `GET /api/current`
pub async fn current_track(State(state): State<AppState>) -> Response {
    match state.spoty.track_currently_playing().await {
        Ok(track) => Json(track).into_response(),
        Err(e) => {
            debug!(error = %e, "Current track unavailable");
            ApiError::new(StatusCode::NOT_FOUND, ERR_RETRIEVE_CURRENT_TRACK).into_response()
        }
    }
}

/// `GET /api/current/images`
pub async fn current_track_images(State(state): State<AppState>) -> Response {
    let track = match state.spoty.track_currently_playing().await {
        Ok(track) => track,
        Err(e) => {
            debug!(error = %e, "Current track unavailable");
            return ApiError::new(StatusCode::NOT_FOUND, ERR_RETRIEVE_CURRENT_TRACK)
                .into_response();
        }
    };

    match state.spoty.track_images(&track).await {
        Ok(images) => Json(images).into_response(),
        Err(e) => {
            warn!(error = %e, "Could not enrich album images");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ERR_PROCESS_CURRENT_TRACK)
                .into_response()
        }
    }
}
