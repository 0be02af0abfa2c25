//! Credential persistence
//!
//! The platform's tokens live in the same flat key=value file the rest of
//! the configuration is read from, so a refreshed token survives restarts.
//! Implementations of the [`TokenStore`] port must replace both keys
//! atomically: a reader sees either the fully-old or fully-new pair.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use deskbot_core::TokenStore;
use deskbot_domain::{Credential, DeskbotError, Result};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "DESKBOT_TOKEN";
pub const REFRESH_TOKEN_KEY: &str = "DESKBOT_REFRESH_TOKEN";

/// Token store backed by one or more flat key=value files.
///
/// `load` reads the first file that exists; `save` rewrites every
/// configured location. Unrelated keys and comments in the files are
/// preserved. Each rewrite goes through a same-directory temp file followed
/// by a rename, so concurrent readers never observe a half-written pair.
pub struct EnvFileTokenStore {
    paths: Vec<PathBuf>,
}

impl EnvFileTokenStore {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self { paths: vec![path.into()] }
    }

    fn read_credential(path: &Path) -> Result<Option<Credential>> {
        let contents = fs::read_to_string(path).map_err(|err| {
            DeskbotError::Internal(format!("failed to read {}: {err}", path.display()))
        })?;

        let mut access_token = None;
        let mut refresh_token = None;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                TOKEN_KEY => access_token = Some(value.trim().to_string()),
                REFRESH_TOKEN_KEY => refresh_token = Some(value.trim().to_string()),
                _ => {}
            }
        }

        Ok(access_token
            .filter(|token| !token.is_empty())
            .map(|token| Credential::new(token, refresh_token.filter(|t| !t.is_empty()))))
    }

    /// Rewrite one file with the new token pair, preserving everything
    /// else. The file is created when missing.
    fn write_credential(path: &Path, credential: &Credential) -> Result<()> {
        let existing = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(DeskbotError::Internal(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };

        let mut lines: Vec<String> = Vec::new();
        let mut wrote_token = false;
        let mut wrote_refresh = false;
        for line in existing.lines() {
            let key = line.trim().split_once('=').map(|(key, _)| key.trim());
            match key {
                Some(TOKEN_KEY) => {
                    lines.push(format!("{TOKEN_KEY}={}", credential.access_token));
                    wrote_token = true;
                }
                Some(REFRESH_TOKEN_KEY) => {
                    match credential.refresh_token.as_deref() {
                        Some(refresh) => lines.push(format!("{REFRESH_TOKEN_KEY}={refresh}")),
                        None => lines.push(line.to_string()),
                    }
                    wrote_refresh = true;
                }
                _ => lines.push(line.to_string()),
            }
        }
        if !wrote_token {
            lines.push(format!("{TOKEN_KEY}={}", credential.access_token));
        }
        if !wrote_refresh {
            if let Some(refresh) = credential.refresh_token.as_deref() {
                lines.push(format!("{REFRESH_TOKEN_KEY}={refresh}"));
            }
        }
        let mut contents = lines.join("\n");
        contents.push('\n');

        // Same-directory temp file + rename keeps the replacement atomic
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents).map_err(|err| {
            DeskbotError::Internal(format!("failed to write {}: {err}", temp_path.display()))
        })?;
        fs::rename(&temp_path, path).map_err(|err| {
            DeskbotError::Internal(format!("failed to replace {}: {err}", path.display()))
        })?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for EnvFileTokenStore {
    async fn load(&self) -> Result<Option<Credential>> {
        for path in &self.paths {
            if !path.exists() {
                continue;
            }
            debug!(path = %path.display(), "loading credential");
            return Self::read_credential(path);
        }
        Ok(None)
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let mut succeeded = 0usize;
        for path in &self.paths {
            match Self::write_credential(path, credential) {
                Ok(()) => {
                    debug!(path = %path.display(), "credential persisted");
                    succeeded += 1;
                }
                Err(err) => {
                    // Keep writing the remaining locations
                    warn!(path = %path.display(), error = %err, "failed to persist credential");
                }
            }
        }

        if succeeded == 0 && !self.paths.is_empty() {
            return Err(DeskbotError::Internal(
                "credential could not be persisted to any configured location".into(),
            ));
        }
        Ok(())
    }
}

/// In-memory token store for tests and token-less invocations.
#[derive(Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self { credential: RwLock::new(Some(credential)) }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.credential.read().await.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.credential.write().await = Some(credential.clone());
        Ok(())
    }
}
