//! Mapping of errors and rejections onto HTTP responses

use std::convert::Infallible;

use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Rejection;

use crate::error::RustyRoomsError;

pub fn status_for(err: &RustyRoomsError) -> StatusCode {
    match err {
        RustyRoomsError::InvalidRoomName(_)
        | RustyRoomsError::InvalidFilename(_)
        | RustyRoomsError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
        RustyRoomsError::OriginRejected(_) => StatusCode::FORBIDDEN,
        RustyRoomsError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        RustyRoomsError::DocumentExists(_) => StatusCode::CONFLICT,
        RustyRoomsError::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        RustyRoomsError::StorageError(_) | RustyRoomsError::ConfigError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Plain-text error response
pub fn error_reply(err: &RustyRoomsError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    } else {
        log::debug!("Request rejected: {}", err);
    }
    warp::reply::with_status(err.to_string(), status).into_response()
}

/// Turn body parsing failures into 400s, leave everything else to warp
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Rejection> {
    if let Some(err) = rejection.find::<RustyRoomsError>() {
        return Ok(error_reply(err));
    }

    if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(&RustyRoomsError::InvalidRequestBody(
            err.to_string(),
        )));
    }

    Err(rejection)
}

/// Collapse a handler result into a response
pub fn into_response<T: Reply>(result: crate::error::Result<T>) -> Result<Response, Infallible> {
    Ok(match result {
        Ok(reply) => reply.into_response(),
        Err(err) => error_reply(&err),
    })
}
