//! Document endpoints used by the editor under `/api/files`

use std::convert::Infallible;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

use crate::core::server::SharedServerState;
use crate::error::{Result, RustyRoomsError};
use crate::handlers::decode_segment;
use crate::handlers::errors::into_response;
use crate::storage::DocumentSummary;

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveFileRequest {
    pub content: String,
}

// GET /api/files
pub async fn list_files(state: SharedServerState) -> std::result::Result<Response, Infallible> {
    let result = state.documents.list().await;
    into_response(result.map(|documents| warp::reply::json(&documents)))
}

// POST /api/files
pub async fn create_file(
    request: CreateFileRequest,
    state: SharedServerState,
) -> std::result::Result<Response, Infallible> {
    let result = state.documents.create(&request.name).await;
    if let Ok(DocumentSummary { name }) = &result {
        log::info!("Created document {}", name);
    }
    into_response(result.map(|document| {
        warp::reply::with_status(warp::reply::json(&document), StatusCode::CREATED)
    }))
}

// GET /api/files/{filename}
pub async fn get_file(
    raw_name: String,
    state: SharedServerState,
) -> std::result::Result<Response, Infallible> {
    let result = async {
        let name = filename(&raw_name)?;
        state.documents.read(&name).await
    }
    .await;

    into_response(
        result.map(|content| warp::reply::with_header(content, "Content-Type", "text/markdown")),
    )
}

// PUT /api/files/{filename}
pub async fn save_file(
    raw_name: String,
    request: SaveFileRequest,
    state: SharedServerState,
) -> std::result::Result<Response, Infallible> {
    let result = async {
        let name = filename(&raw_name)?;
        state.documents.save(&name, &request.content).await?;
        log::debug!("Saved document {} ({} bytes)", name, request.content.len());
        Ok::<_, RustyRoomsError>(StatusCode::OK)
    }
    .await;

    into_response(result)
}

fn filename(raw: &str) -> Result<String> {
    decode_segment(raw).ok_or_else(|| RustyRoomsError::InvalidFilename(raw.to_string()))
}
