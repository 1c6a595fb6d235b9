//! Bearer credential and the stores it is kept in between invocations.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SessionError;

/// Bearer token issued by the queue service on login.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Returns `None` for a blank token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<BearerToken>, SessionError>;
    async fn store(&self, token: &BearerToken) -> Result<(), SessionError>;
    async fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    token: Mutex<Option<BearerToken>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: BearerToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<BearerToken>, SessionError> {
        Ok(self.token.lock().await.clone())
    }

    async fn store(&self, token: &BearerToken) -> Result<(), SessionError> {
        *self.token.lock().await = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.token.lock().await.take();
        Ok(())
    }
}

/// Keeps the token in a single file. A missing or blank file means no session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<BearerToken>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(BearerToken::new(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored session");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, token: &BearerToken) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, token.as_str()).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
