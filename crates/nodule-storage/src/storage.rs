//! 上传文件存储管理

use nodule_core::utils::is_safe_path_segment;
use nodule_core::{NoduleError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 上传文件对外访问的URL前缀
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// 已写入磁盘的文件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub file_name: String,
    pub url_path: String,
    pub disk_path: PathBuf,
}

/// 上传目录管理器，每个检查一个子目录
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 创建上传根目录
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            NoduleError::Storage(format!("Cannot create uploads dir {}: {}", self.root.display(), e))
        })?;
        info!("Uploads directory ready: {}", self.root.display());
        Ok(())
    }

    /// 检查目录路径
    pub fn study_dir(&self, study_id: &str) -> Result<PathBuf> {
        ensure_safe(study_id, "study_id")?;
        Ok(self.root.join(study_id))
    }

    /// 写入文件到检查目录，文件名只保留最后一级
    pub async fn store_file(&self, study_id: &str, file_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        let dir = self.study_dir(study_id)?;
        let file_name = upload_file_name(file_name)?;

        tokio::fs::create_dir_all(&dir).await?;
        let disk_path = dir.join(&file_name);
        tokio::fs::write(&disk_path, bytes).await?;

        debug!("Stored {} ({} bytes) for study {}", file_name, bytes.len(), study_id);
        Ok(StoredFile {
            url_path: url_path(study_id, &file_name),
            file_name,
            disk_path,
        })
    }

    /// 删除检查目录，返回目录之前是否存在
    pub async fn remove_study_dir(&self, study_id: &str) -> Result<bool> {
        let dir = self.study_dir(study_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Removed uploads folder for study {}", study_id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(NoduleError::Storage(format!(
                "Cannot remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }

    /// 上传根目录下以指定前缀开头的检查目录，按名称排序
    pub async fn seed_folders(&self, prefix: &str) -> Result<Vec<String>> {
        let mut folders = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Uploads directory {} does not exist", self.root.display());
                return Ok(folders);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) && is_safe_path_segment(name) {
                    folders.push(name.to_string());
                }
            }
        }

        folders.sort();
        Ok(folders)
    }

    /// 检查目录下的 .dcm 文件名，按名称排序
    pub async fn list_dicom_files(&self, study_id: &str) -> Result<Vec<String>> {
        let dir = self.study_dir(study_id)?;
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.to_ascii_lowercase().ends_with(".dcm") {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// 将 `/uploads/<study>/<file>` 形式的URL路径解析为磁盘路径
    pub fn resolve_url_path(&self, url_path: &str) -> Result<PathBuf> {
        let relative = url_path
            .strip_prefix(UPLOADS_URL_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| NoduleError::Validation(format!("Not an uploads path: {}", url_path)))?;

        let mut path = self.root.clone();
        for segment in relative.split('/') {
            ensure_safe(segment, "path segment")?;
            path.push(segment);
        }
        Ok(path)
    }
}

/// 检查文件的URL路径
pub fn url_path(study_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", UPLOADS_URL_PREFIX, study_id, file_name)
}

/// 上传文件最终使用的文件名：只保留最后一级，且必须是安全的路径段
pub fn upload_file_name(file_name: &str) -> Result<String> {
    let name = base_name(file_name);
    ensure_safe(&name, "file name")?;
    Ok(name)
}

fn base_name(file_name: &str) -> String {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim()
        .to_string()
}

fn ensure_safe(segment: &str, what: &str) -> Result<()> {
    if is_safe_path_segment(segment) {
        Ok(())
    } else {
        warn!("Rejected unsafe {}: {:?}", what, segment);
        Err(NoduleError::Validation(format!("Invalid {}: {:?}", what, segment)))
    }
}
