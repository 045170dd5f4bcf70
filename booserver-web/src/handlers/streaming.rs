//! Byte-serving handlers for the id-addressed media verbs.

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use booserver_core::media::{mime_for, MediaType};
use booserver_core::store::MetaData;

use super::api::IdQuery;
use super::range::{
    build_range_response, extract_range_header, parse_range_header, range_not_satisfiable,
    validate_range,
};
use crate::server::AppState;

/// Serves any record; images are always whole, everything else honors
/// Range.
///
/// # Errors
/// Returns `StatusCode` errors for unknown ids and I/O failures.
pub async fn item(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    headers: HeaderMap,
) -> Result<Response<Body>, StatusCode> {
    let record = lookup(&state, query.id).await?;
    match record.media_type() {
        MediaType::Photo => serve_whole(&record).await,
        _ => serve_ranged(&record, &headers).await,
    }
}

/// Serves a video record with Range support.
///
/// # Errors
/// Returns `StatusCode` errors for unknown ids and I/O failures.
pub async fn video(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    headers: HeaderMap,
) -> Result<Response<Body>, StatusCode> {
    let record = lookup(&state, query.id).await?;
    serve_ranged(&record, &headers).await
}

/// Serves an audio record with Range support.
///
/// # Errors
/// Returns `StatusCode` errors for unknown ids and I/O failures.
pub async fn audio(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    headers: HeaderMap,
) -> Result<Response<Body>, StatusCode> {
    let record = lookup(&state, query.id).await?;
    serve_ranged(&record, &headers).await
}

/// Serves an image record whole; Range headers are ignored.
///
/// # Errors
/// Returns `StatusCode` errors for unknown ids and I/O failures.
pub async fn photo(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Response<Body>, StatusCode> {
    let record = lookup(&state, query.id).await?;
    serve_whole(&record).await
}

async fn lookup(state: &AppState, id: i64) -> Result<MetaData, StatusCode> {
    state
        .manager
        .file_by_id(id)
        .await
        .map_err(|err| {
            tracing::error!("lookup of record {id} failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

async fn serve_whole(record: &MetaData) -> Result<Response<Body>, StatusCode> {
    let data = tokio::fs::read(&record.path).await.map_err(|err| {
        tracing::warn!("cannot read {}: {err}", record.path);
        StatusCode::NOT_FOUND
    })?;
    build_range_response(data, mime_for(&record.ext), None)
}

async fn serve_ranged(record: &MetaData, headers: &HeaderMap) -> Result<Response<Body>, StatusCode> {
    let path = Path::new(&record.path);
    let total_size = tokio::fs::metadata(path)
        .await
        .map_err(|err| {
            tracing::warn!("cannot stat {}: {err}", record.path);
            StatusCode::NOT_FOUND
        })?
        .len();

    let Some(raw) = extract_range_header(headers) else {
        return serve_whole(record).await;
    };

    let satisfiable = parse_range_header(&raw)
        .and_then(|(start, end)| validate_range(start, end, total_size));
    let Some((start, end, length)) = satisfiable else {
        tracing::debug!("unsatisfiable range {raw:?} for {} ({total_size} bytes)", record.path);
        return range_not_satisfiable(total_size);
    };

    let data = read_file_segment(path, start, length).await.map_err(|err| {
        tracing::error!("cannot read {}: {err}", record.path);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    build_range_response(data, mime_for(&record.ext), Some((start, end, total_size)))
}

/// Reads `length` bytes of a file starting at `start`.
async fn read_file_segment(path: &Path, start: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let mut buffer = vec![0u8; length as usize];
    file.read_exact(&mut buffer).await?;

    Ok(buffer)
}
