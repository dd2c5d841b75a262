use std::fs;
use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::domain::ScientificName;
use crate::error::CatalogueError;
use crate::fetch::{Fetcher, HttpTransport};

pub const IMAGE_SOURCE: &str = "wikimedia";
pub const DEFAULT_EXTENSION: &str = "jpg";
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: Option<Utf8PathBuf>,
    pub downloaded: bool,
}

impl StoredImage {
    pub fn local_path(&self) -> String {
        self.path
            .as_ref()
            .map(|path| path.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ImageDownloader {
    dir: Utf8PathBuf,
    timeout: Duration,
}

impl ImageDownloader {
    pub fn new(dir: impl Into<Utf8PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn target_path(&self, name: &ScientificName, index: usize, url: &str) -> Utf8PathBuf {
        self.dir.join(image_file_name(name, index, url))
    }

    pub fn download<T: HttpTransport>(
        &self,
        fetcher: &Fetcher<T>,
        name: &ScientificName,
        index: usize,
        url: &str,
    ) -> StoredImage {
        let path = self.target_path(name, index, url);
        if path.as_std_path().exists() {
            debug!(path = %path, "image already present");
            return StoredImage {
                path: Some(path),
                downloaded: false,
            };
        }

        let response = match fetcher.download(url, self.timeout) {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "image download failed");
                return StoredImage {
                    path: None,
                    downloaded: false,
                };
            }
        };
        if response.status != 200 || !response.is_image() {
            warn!(
                url,
                status = response.status,
                content_type = response.content_type.as_deref().unwrap_or_default(),
                "image download rejected"
            );
            return StoredImage {
                path: None,
                downloaded: false,
            };
        }

        match write_atomic(&path, &response.body) {
            Ok(()) => StoredImage {
                path: Some(path),
                downloaded: true,
            },
            Err(err) => {
                warn!(path = %path, error = %err, "failed to save image");
                StoredImage {
                    path: None,
                    downloaded: false,
                }
            }
        }
    }
}

pub fn image_file_name(name: &ScientificName, index: usize, url: &str) -> String {
    format!("{}_{index}.{}", name.file_stem(), extension_from_url(url))
}

pub fn extension_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CatalogueError> {
    let parent = path
        .parent()
        .ok_or_else(|| CatalogueError::Filesystem(format!("no parent directory for {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CatalogueError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".plant-image")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CatalogueError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| CatalogueError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| CatalogueError::Filesystem(err.to_string()))?;
    Ok(())
}
