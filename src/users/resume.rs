use tracing::{info, warn};
use uuid::Uuid;

use super::extractors::ResumeUpload;
use super::model::Resume;
use crate::{error::AppError, state::AppState};

pub const RESUME_UPLOAD_FAILED: &str = "Resume upload failed.";

/// Stores the file under a fresh key and returns its `(storage_id, url)` pair.
pub async fn upload_resume(st: &AppState, file: ResumeUpload) -> Result<Resume, AppError> {
    let ext = ext_from_mime(&file.content_type)
        .or_else(|| ext_from_file_name(file.file_name.as_deref()))
        .unwrap_or("bin");
    let key = format!("resumes/{}.{}", Uuid::new_v4(), ext);

    st.storage
        .put_object(&key, file.body, &file.content_type)
        .await
        .map_err(|e| AppError::upstream(RESUME_UPLOAD_FAILED, e))?;

    info!(storage_id = %key, "resume uploaded");
    Ok(Resume {
        url: st.storage.object_url(&key),
        storage_id: key,
    })
}

pub async fn delete_resume(st: &AppState, storage_id: &str) -> Result<(), AppError> {
    st.storage
        .delete_object(storage_id)
        .await
        .map_err(|e| AppError::upstream("Failed to delete previous resume.", e))?;
    info!(%storage_id, "resume deleted");
    Ok(())
}

/// Best-effort removal of an upload whose record write failed.
pub async fn discard_resume(st: &AppState, resume: &Resume) {
    if let Err(e) = st.storage.delete_object(&resume.storage_id).await {
        warn!(error = %e, storage_id = %resume.storage_id, "orphaned resume left in storage");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/rtf" | "text/rtf" => Some("rtf"),
        "text/plain" => Some("txt"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

fn ext_from_file_name(name: Option<&str>) -> Option<&'static str> {
    let ext = name?.rsplit_once('.')?.1.to_ascii_lowercase();
    ["pdf", "doc", "docx", "rtf", "txt", "jpg", "png"]
        .into_iter()
        .find(|known| *known == ext)
}
