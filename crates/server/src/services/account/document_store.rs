use database::account::document::{AccountDocument, ALLOWED_MIMETYPES, MAX_DOCUMENT_SIZE};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use utils::{AppError, AppResult};

/// 本地KYC文件目录，文件由上传层写入，这里负责校验与删除
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 文件名只能是单层名称，不允许跳出存储目录
    pub fn path_for(&self, filename: &str) -> AppResult<PathBuf> {
        let invalid = filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains('\0');
        if invalid {
            return Err(AppError::BadRequest(format!("Invalid document filename: {:?}", filename)));
        }

        Ok(self.root.join(filename))
    }

    pub fn validate(&self, document: &AccountDocument) -> AppResult<()> {
        self.path_for(&document.filename)?;

        if !ALLOWED_MIMETYPES.contains(&document.mimetype.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unsupported file type {} for {}. Only JPEG, JPG, PNG and PDF files are allowed.",
                document.mimetype, document.doc_type
            )));
        }
        if document.size == 0 || document.size > MAX_DOCUMENT_SIZE {
            return Err(AppError::BadRequest(format!(
                "File size for {} must be between 1 byte and {} bytes",
                document.doc_type, MAX_DOCUMENT_SIZE
            )));
        }

        Ok(())
    }

    /// 删除文件；文件不存在视为已删除，返回 false
    pub async fn remove(&self, filename: &str) -> AppResult<bool> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("🗑️ document file removed: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("⚠️ document file already absent: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(AppError::InternalServerErrorWithContext(format!(
                "Failed to remove document file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
