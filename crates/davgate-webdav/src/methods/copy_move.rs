//! COPY and MOVE method implementations (RFC 4918 Sections 9.8 and 9.9).

use axum::body::Body;
use http::{HeaderMap, Response, StatusCode};

use davgate_core::error::AppError;
use davgate_core::result::AppResult;

use super::{child_path, ensure_parent, header_str, if_tokens};
use crate::engine::DavEngine;
use crate::lock::is_descendant;
use crate::path;
use crate::properties::Depth;
use crate::response::status;

/// Destination of a COPY or MOVE, relative to the engine prefix.
#[derive(Debug)]
struct Transfer {
    destination: String,
    overwrite: bool,
}

fn parse_overwrite(headers: &HeaderMap) -> AppResult<bool> {
    match header_str(headers, "Overwrite").map(str::trim) {
        None | Some("T") | Some("t") => Ok(true),
        Some("F") | Some("f") => Ok(false),
        Some(other) => Err(AppError::validation(format!(
            "invalid Overwrite header {other:?}"
        ))),
    }
}

fn prepare(engine: &DavEngine, source: &str, headers: &HeaderMap) -> AppResult<Transfer> {
    let raw = path::destination(headers)?
        .ok_or_else(|| AppError::validation("missing Destination header"))?;
    let destination = path::strip_prefix(engine.prefix(), &raw)
        .ok_or_else(|| AppError::bad_gateway("Destination is outside this server"))?;

    if destination == source {
        return Err(AppError::authorization(
            "source and destination are the same resource",
        ));
    }
    if is_descendant(&destination, source) {
        return Err(AppError::conflict("destination lies inside the source"));
    }
    // Overwriting an ancestor would delete the source with it.
    if is_descendant(source, &destination) {
        return Err(AppError::authorization(
            "destination is an ancestor of the source",
        ));
    }

    Ok(Transfer {
        destination,
        overwrite: parse_overwrite(headers)?,
    })
}

/// Make room at the destination. Returns whether something was replaced.
async fn clear_destination(
    engine: &DavEngine,
    transfer: &Transfer,
    tokens: &[String],
) -> AppResult<bool> {
    ensure_parent(engine, &transfer.destination).await?;

    match engine.stat_opt(&transfer.destination).await? {
        None => Ok(false),
        Some(_) if !transfer.overwrite => Err(AppError::precondition_failed(
            "destination exists and Overwrite is F",
        )),
        Some(_) => {
            engine
                .locks()
                .confirm(&transfer.destination, true, tokens)?;
            engine.filesystem().remove(&transfer.destination).await?;
            engine.locks().remove_under(&transfer.destination);
            Ok(true)
        }
    }
}

async fn copy_tree(
    engine: &DavEngine,
    source: &str,
    destination: &str,
    is_dir: bool,
    recursive: bool,
) -> AppResult<()> {
    let fs = engine.filesystem();
    if !is_dir {
        return fs.copy_file(source, destination).await;
    }

    fs.create_dir(destination).await?;
    if !recursive {
        return Ok(());
    }

    let mut pending = vec![(source.to_string(), destination.to_string())];
    while let Some((from, to)) = pending.pop() {
        for entry in fs.read_dir(&from).await? {
            let child_from = child_path(&from, &entry.name);
            let child_to = child_path(&to, &entry.name);
            if entry.meta.is_dir {
                fs.create_dir(&child_to).await?;
                pending.push((child_from, child_to));
            } else {
                fs.copy_file(&child_from, &child_to).await?;
            }
        }
    }
    Ok(())
}

fn created_or_replaced(replaced: bool) -> Response<Body> {
    status(if replaced {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CREATED
    })
}

/// Handle a COPY request
pub async fn handle_copy(
    engine: &DavEngine,
    source: &str,
    headers: &HeaderMap,
) -> AppResult<Response<Body>> {
    let meta = engine.filesystem().stat(source).await?;
    let depth = Depth::from_header(header_str(headers, "Depth"))?;
    if depth == Depth::One {
        return Err(AppError::validation("COPY supports Depth 0 or infinity"));
    }

    let transfer = prepare(engine, source, headers)?;
    let replaced = clear_destination(engine, &transfer, &if_tokens(headers)).await?;
    copy_tree(
        engine,
        source,
        &transfer.destination,
        meta.is_dir,
        depth == Depth::Infinity,
    )
    .await?;

    tracing::info!(source, destination = %transfer.destination, "copied via WebDAV");
    Ok(created_or_replaced(replaced))
}

/// Handle a MOVE request
pub async fn handle_move(
    engine: &DavEngine,
    source: &str,
    headers: &HeaderMap,
) -> AppResult<Response<Body>> {
    if source == "/" {
        return Err(AppError::authorization("cannot move the root collection"));
    }
    engine.filesystem().stat(source).await?;
    if Depth::from_header(header_str(headers, "Depth"))? != Depth::Infinity {
        return Err(AppError::validation("MOVE requires Depth infinity"));
    }

    let transfer = prepare(engine, source, headers)?;
    let tokens = if_tokens(headers);
    engine.locks().confirm(source, true, &tokens)?;
    let replaced = clear_destination(engine, &transfer, &tokens).await?;

    engine
        .filesystem()
        .rename(source, &transfer.destination)
        .await?;
    engine.locks().remove_under(source);

    tracing::info!(source, destination = %transfer.destination, "moved via WebDAV");
    Ok(created_or_replaced(replaced))
}
