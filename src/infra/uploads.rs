//! Filesystem storage for post images.
//!
//! Images live under `<media root>/posts/`. The stored path recorded on the post
//! is relative to the media root, e.g. `posts/cat.jpg`, and doubles as the URL
//! suffix served under `/media/`.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::application::posts::ImageStore;
use crate::domain::forms::ImageUpload;

const POSTS_DIR: &str = "posts";

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of storing an image.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(POSTS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` as `posts/<sanitized name>`, adding a random suffix when the name is taken.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredMedia, MediaStorageError> {
        if data.is_empty() {
            return Err(MediaStorageError::EmptyPayload);
        }

        let filename = sanitize_filename(original_name);
        let mut stored_path = format!("{POSTS_DIR}/{filename}");
        let mut file = match self.create_new(&stored_path).await? {
            Some(file) => file,
            None => {
                stored_path = format!("{POSTS_DIR}/{}", with_suffix(&filename));
                self.create_new(&stored_path)
                    .await?
                    .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::AlreadyExists))?
            }
        };

        file.write_all(&data).await?;
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        debug!(
            target = "yatube::infra::uploads",
            stored_path = %stored_path,
            checksum = %checksum,
            size_bytes = data.len(),
            "stored post image"
        );

        Ok(StoredMedia {
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaStorageError::Io(err)),
        }
    }

    async fn create_new(&self, stored_path: &str) -> Result<Option<fs::File>, MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
        {
            Ok(file) => Ok(Some(file)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(MediaStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for MediaStorage {
    async fn save_image(
        &self,
        upload: &ImageUpload,
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let stored = self.store(&upload.filename, upload.bytes.clone()).await?;
        Ok(stored.stored_path)
    }

    async fn remove_image(&self, stored_path: &str) -> Result<(), Box<dyn StdError + Send + Sync>> {
        self.delete(stored_path).await?;
        Ok(())
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn with_suffix(filename: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..7];
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{filename}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_slugifies_stem() {
        assert_eq!(sanitize_filename("My Cat.JPG"), "my-cat.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("???.png"), "image.png");
    }

    #[test]
    fn suffix_keeps_extension() {
        let renamed = with_suffix("cat.gif");
        assert!(renamed.starts_with("cat_"));
        assert!(renamed.ends_with(".gif"));
        assert_eq!(renamed.len(), "cat_".len() + 7 + ".gif".len());
    }

    #[tokio::test]
    async fn store_places_files_under_posts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store("small.gif", Bytes::from_static(b"GIF89a"))
            .await
            .expect("stored");
        assert_eq!(stored.stored_path, "posts/small.gif");
        assert_eq!(stored.size_bytes, 6);
        assert_eq!(stored.checksum.len(), 64);

        let read = storage.read(&stored.stored_path).await.expect("read");
        assert_eq!(read.as_ref(), b"GIF89a");
    }

    #[tokio::test]
    async fn name_collisions_get_a_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        let first = storage
            .store("small.gif", Bytes::from_static(b"one"))
            .await
            .expect("first");
        let second = storage
            .store("small.gif", Bytes::from_static(b"two"))
            .await
            .expect("second");

        assert_ne!(first.stored_path, second.stored_path);
        assert_eq!(storage.read(&first.stored_path).await.expect("read").as_ref(), b"one");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(matches!(
            storage.read("../secret").await,
            Err(MediaStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(MediaStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn deleting_missing_file_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");
        storage.delete("posts/nope.gif").await.expect("noop delete");
    }
}
