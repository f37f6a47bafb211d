use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use axum::body::Bytes;
use axum::extract::Multipart;
use tokio::fs;
use tracing::{info, warn};

use crate::error::ApiError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "/images";

/// On-disk image storage.
///
/// Keys are relative paths such as `campaigns/img-3-<uuid>.png`; each key maps
/// to `{storage_dir}/{key}`. The same directory is served read-only under
/// [`PUBLIC_PREFIX`].
pub struct ImageStorage {
    dir: PathBuf,
}

impl ImageStorage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == ".." || part.is_empty()) {
            bail!("Invalid storage key '{}'", key);
        }
        Ok(self.dir.join(key))
    }

    pub async fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.file_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted stored image {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored image {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    pub async fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!("Failed to remove stored image {}: {}", key, e);
            }
        }
    }
}

/// Public URL for a storage key, or an empty string when there is none.
pub fn public_url(key: Option<&str>) -> String {
    match key {
        Some(key) if !key.is_empty() => format!("{}/{}", PUBLIC_PREFIX, key),
        _ => String::new(),
    }
}

/// Normalized extension (with leading dot) if the upload looks like an image.
pub fn image_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then(|| format!(".{}", ext))
}

pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
}

/// A fully buffered multipart form: file parts plus plain text fields.
#[derive(Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    form.files.push(UploadedFile { field: name, file_name, bytes });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Files submitted under `field`, in upload order. Each must be a non-empty image.
    pub fn images(&self, field: &str) -> Result<Vec<(&UploadedFile, String)>, ApiError> {
        let mut images = Vec::new();
        for file in self.files.iter().filter(|f| f.field == field) {
            let ext = image_extension(&file.file_name).ok_or_else(|| {
                ApiError::invalid(format!(
                    "{} must be one of: {}",
                    file.file_name,
                    IMAGE_EXTENSIONS.join(", ")
                ))
            })?;
            if file.bytes.is_empty() {
                return Err(ApiError::invalid(format!("{} is empty", file.file_name)));
            }
            images.push((file, ext));
        }
        Ok(images)
    }
}
