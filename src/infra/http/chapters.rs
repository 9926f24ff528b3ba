//! Chapter route handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use axum_extra::extract::Multipart;
use tracing::info;

use crate::application::chapters::{ChapterListQuery, ChapterServiceError};

use super::{
    HttpState,
    error::ApiError,
    models::{ChapterListResponse, ChapterResponse, UploadResponse},
    upload::{parse_chapter_array, read_json_file},
};

const SOURCE: &str = "infra::http::chapters";

fn read_error(message: &'static str, err: ChapterServiceError) -> ApiError {
    let api = match err {
        ChapterServiceError::InvalidPagination => {
            ApiError::bad_request("Invalid pagination parameters", None)
        }
        ChapterServiceError::NotFound => ApiError::not_found("Chapter not found"),
        ChapterServiceError::Repo(err) => ApiError::internal(message, err),
    };
    api.with_source(SOURCE)
}

pub async fn list_chapters(
    State(state): State<HttpState>,
    query: Result<Query<ChapterListQuery>, QueryRejection>,
) -> Result<Json<ChapterListResponse>, ApiError> {
    let Query(query) = query.map_err(|err| {
        ApiError::bad_request("Invalid query parameters", Some(err.body_text())).with_source(SOURCE)
    })?;
    let page = state
        .chapters
        .list(&query)
        .await
        .map_err(|err| read_error("Server error while retrieving chapters", err))?;
    Ok(Json(page.into()))
}

pub async fn get_chapter(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ChapterResponse>, ApiError> {
    let chapter = state
        .chapters
        .get(&id)
        .await
        .map_err(|err| read_error("Server error while retrieving chapter", err))?;
    Ok(Json(ChapterResponse {
        success: true,
        chapter,
    }))
}

pub async fn upload_chapters(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let data = read_json_file(&mut multipart).await?;
    let batch = parse_chapter_array(&data)?;

    let report = state.chapters.ingest(batch).await.map_err(|err| {
        ApiError::internal("Server error while processing uploaded file", err).with_source(SOURCE)
    })?;

    info!(
        target = "chapterdash::http::chapters",
        attempted = report.attempted,
        succeeded = report.success_count,
        failed = report.failed.len(),
        invalidated = report.invalidated,
        "chapter upload processed"
    );

    Ok(Json(report.into()))
}
