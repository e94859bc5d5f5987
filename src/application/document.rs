//! Mapping of request paths onto Markdown files below the document root.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use thiserror::Error;

use crate::domain::types::{ModTime, SourceIdentity};

/// Source bytes of one document together with its identity and freshness stamp.
#[derive(Debug, Clone)]
pub struct Document {
    pub identity: SourceIdentity,
    pub content: Bytes,
    pub modified: ModTime,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document root `{}` is not a directory", .root.display())]
    RootMissing { root: PathBuf },
    #[error("request path `{path}` does not end with `.{extension}`")]
    UnsupportedPath { path: String, extension: String },
    #[error("request path `{path}` leaves the document root")]
    OutsideRoot { path: String },
    #[error("document `{}` does not exist", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DocumentResolver {
    root: PathBuf,
    extension: String,
}

impl DocumentResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Resolve a request URI path (query string ignored) to a file below the root.
    pub fn resolve(&self, request_path: &str) -> Result<SourceIdentity, DocumentError> {
        let path = request_path
            .split_once('?')
            .map_or(request_path, |(path, _)| path)
            .trim();

        let suffix = format!(".{}", self.extension);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if !file_name.ends_with(&suffix) || file_name == suffix {
            return Err(DocumentError::UnsupportedPath {
                path: path.to_string(),
                extension: self.extension.clone(),
            });
        }

        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(DocumentError::OutsideRoot {
                        path: path.to_string(),
                    });
                }
            }
        }

        Ok(SourceIdentity::new(resolved))
    }

    /// Validate the root, resolve `request_path`, then read the file and its mtime.
    pub async fn open(&self, request_path: &str) -> Result<Document, DocumentError> {
        self.ensure_root().await?;
        let identity = self.resolve(request_path)?;
        self.confine(&identity, request_path).await?;
        load(identity).await
    }

    /// Reject documents that only resolve inside the root through a symlink pointing out of it.
    async fn confine(
        &self,
        identity: &SourceIdentity,
        request_path: &str,
    ) -> Result<(), DocumentError> {
        let path = identity.as_path();
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| DocumentError::RootMissing {
                root: self.root.clone(),
            })?;
        let target = match tokio::fs::canonicalize(path).await {
            Ok(target) => target,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DocumentError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(DocumentError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if target.starts_with(&root) {
            Ok(())
        } else {
            Err(DocumentError::OutsideRoot {
                path: request_path.to_string(),
            })
        }
    }

    pub async fn ensure_root(&self) -> Result<(), DocumentError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(DocumentError::RootMissing {
                root: self.root.clone(),
            }),
        }
    }
}

/// Read an already-resolved document.
pub async fn load(identity: SourceIdentity) -> Result<Document, DocumentError> {
    let path = identity.as_path();
    let not_found = || DocumentError::NotFound {
        path: path.to_path_buf(),
    };
    let io_error = |source: std::io::Error| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    };

    // mtime is taken before the content so a concurrent edit at worst causes
    // one extra render, never a stale cache hit.
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Err(not_found()),
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(io_error(err)),
    };
    let modified = ModTime::from_system_time(meta.modified().map_err(io_error)?);
    let content = tokio::fs::read(path).await.map_err(io_error)?;

    Ok(Document {
        identity,
        content: Bytes::from(content),
        modified,
    })
}
