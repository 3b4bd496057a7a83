use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use mechshare_events::EventKind;
use tracing::warn;

use crate::auth::MaybeUser;
use crate::error::ApiError;
use crate::rest::{ensure_mechanism, parse_id};
use crate::AppState;

/// Serve a mechanism's file. The download is recorded first, but a recording
/// failure is logged and the file is served anyway.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeUser(user_id): MaybeUser,
) -> Result<Response, ApiError> {
    let mechanism_id = parse_id(&id)?;
    ensure_mechanism(&state, mechanism_id).await?;

    if let Err(e) = state
        .recorder
        .record(mechanism_id, user_id, EventKind::Download, Utc::now())
        .await
    {
        warn!(error = %e, mechanism_id, "Failed to record download; serving file anyway");
    }

    let stored = state
        .subjects
        .file_path(mechanism_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("file not found".to_string()))?;
    let path = resolve_upload_path(&state.upload_dir, &stored)
        .ok_or_else(|| ApiError::NotFound("file not found".to_string()))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("file not found".to_string()));
        }
        Err(e) => return Err(ApiError::Internal(format!("reading {}: {e}", path.display()))),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .replace('"', "");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Stored paths are relative to the upload root. Anything that would escape
/// it (absolute paths, `..`) is treated as missing.
fn resolve_upload_path(upload_dir: &FsPath, stored: &str) -> Option<PathBuf> {
    let relative = FsPath::new(stored);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || stored.is_empty() {
        return None;
    }
    Some(upload_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_under_the_upload_dir() {
        assert_eq!(
            resolve_upload_path(FsPath::new("/srv/uploads"), "files/gear.pdf"),
            Some(PathBuf::from("/srv/uploads/files/gear.pdf"))
        );
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let root = FsPath::new("/srv/uploads");
        assert_eq!(resolve_upload_path(root, "../etc/passwd"), None);
        assert_eq!(resolve_upload_path(root, "/etc/passwd"), None);
        assert_eq!(resolve_upload_path(root, "files/../../secret"), None);
        assert_eq!(resolve_upload_path(root, ""), None);
    }
}
