//! On-disk voice asset storage
//!
//! Layout under the upload root:
//! - `{voice_id}/reference.<ext>`  uploaded sample, original extension kept
//! - `{voice_id}/test.wav`         optional rendered test phrase
//! - `temp/generated_*.wav`        on-demand generation output

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use super::id::VoiceId;
use crate::config::VoiceConfig;
use crate::util::{gen_nonce, now_secs};
use crate::{AudriaError, Result};

const REFERENCE_STEM: &str = "reference";
const TEST_FILE: &str = "test.wav";
const TEMP_DIR: &str = "temp";

/// Listing entry for a stored voice
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceSummary {
    pub voice_id: String,
    pub voice_name: String,
    pub reference_path: Option<String>,
    pub test_path: Option<String>,
    pub created_at: Option<String>,
}

/// Detailed view of one voice directory
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub voice_dir: String,
    pub reference_exists: bool,
    pub test_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_created: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoiceStore {
    root: PathBuf,
    temp_dir: PathBuf,
    max_file_size: u64,
    allowed_extensions: BTreeSet<String>,
}

impl VoiceStore {
    pub fn new<P: Into<PathBuf>>(
        root: P,
        max_file_size: u64,
        allowed_extensions: BTreeSet<String>,
    ) -> Result<Self> {
        let root = root.into();
        let temp_dir = root.join(TEMP_DIR);
        std::fs::create_dir_all(&temp_dir)?;
        info!(target: "voice_store", root = %root.display(), "Voice store ready");
        Ok(Self {
            root,
            temp_dir,
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn from_config(cfg: &VoiceConfig) -> Result<Self> {
        Self::new(
            cfg.upload_dir.clone(),
            cfg.max_file_size,
            cfg.allowed_extensions.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check name and size of an upload; returns the normalized extension
    pub fn validate_upload(&self, filename: &str, size: u64) -> Result<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&ext) {
            let allowed: Vec<&str> = self.allowed_extensions.iter().map(|s| s.as_str()).collect();
            return Err(AudriaError::InvalidInput(format!(
                "Invalid file type. Allowed: {}",
                allowed.join(", ")
            )));
        }
        if size == 0 {
            return Err(AudriaError::InvalidInput("File is empty".into()));
        }
        if size > self.max_file_size {
            return Err(AudriaError::InvalidInput(format!(
                "File too large. Max size: {:.1}MB",
                self.max_file_size as f64 / (1024.0 * 1024.0)
            )));
        }
        Ok(ext)
    }

    pub fn voice_dir(&self, id: &VoiceId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Atomically reserve the directory for `id`. `false` when it is taken.
    pub async fn claim(&self, id: &VoiceId) -> Result<bool> {
        match fs::create_dir(self.voice_dir(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the voice directory and write the reference sample into it
    pub async fn create_voice(&self, id: &VoiceId, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.voice_dir(id);
        fs::create_dir_all(&dir).await?;
        let reference = dir.join(format!("{REFERENCE_STEM}.{ext}"));
        fs::write(&reference, bytes).await?;
        debug!(target: "voice_store", voice_id = %id, bytes = bytes.len(), "Stored reference audio");
        Ok(reference)
    }

    pub async fn reference_path(&self, id: &VoiceId) -> Result<Option<PathBuf>> {
        let dir = self.voice_dir(id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut found: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_reference = path.file_stem().and_then(|s| s.to_str()) == Some(REFERENCE_STEM);
            if is_reference && entry.file_type().await?.is_file() {
                found.push(path);
            }
        }
        found.sort();
        Ok(found.into_iter().next())
    }

    async fn exists(&self, id: &VoiceId) -> bool {
        fs::metadata(self.voice_dir(id))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    pub fn test_output_path(&self, id: &VoiceId) -> PathBuf {
        self.voice_dir(id).join(TEST_FILE)
    }

    pub async fn test_path(&self, id: &VoiceId) -> Option<PathBuf> {
        let p = self.test_output_path(id);
        if is_file(&p).await {
            Some(p)
        } else {
            None
        }
    }

    /// Voices owned by `user_id`, newest first. Directories without a
    /// reference sample are skipped.
    pub async fn list(&self, user_id: &str) -> Result<Vec<VoiceSummary>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut voices: Vec<(i64, VoiceSummary)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let id = match VoiceId::parse(&name) {
                Ok(id) if id.owned_by(user_id) => id,
                _ => continue,
            };
            let reference = match self.reference_path(&id).await? {
                Some(p) => p,
                None => continue,
            };
            let created = match id.created_at() {
                Some(t) => Some(t),
                None => file_created(&entry.path()).await,
            };
            voices.push((
                created.map(|t| t.timestamp()).unwrap_or(0),
                VoiceSummary {
                    voice_id: id.to_string(),
                    voice_name: id.voice_name().to_string(),
                    reference_path: Some(reference.to_string_lossy().to_string()),
                    test_path: self
                        .test_path(&id)
                        .await
                        .map(|p| p.to_string_lossy().to_string()),
                    created_at: created.map(|t| t.to_rfc3339()),
                },
            ));
        }
        voices.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.voice_id.cmp(&b.1.voice_id)));
        Ok(voices.into_iter().map(|(_, v)| v).collect())
    }

    pub async fn info(&self, id: &VoiceId) -> Result<VoiceInfo> {
        let dir = self.voice_dir(id);
        if !self.exists(id).await {
            return Err(AudriaError::NotFound(format!("Voice {id} not found")));
        }
        let reference = self.reference_path(id).await?;
        let test = self.test_path(id).await;

        let mut info = VoiceInfo {
            voice_id: id.to_string(),
            voice_dir: dir.to_string_lossy().to_string(),
            reference_exists: reference.is_some(),
            test_exists: test.is_some(),
            reference_size: None,
            reference_created: None,
            test_size: None,
            test_created: None,
        };
        if let Some(p) = reference {
            info.reference_size = fs::metadata(&p).await.ok().map(|m| m.len());
            info.reference_created = file_created(&p).await.map(|t| t.to_rfc3339());
        }
        if let Some(p) = test {
            info.test_size = fs::metadata(&p).await.ok().map(|m| m.len());
            info.test_created = file_created(&p).await.map(|t| t.to_rfc3339());
        }
        Ok(info)
    }

    pub async fn delete(&self, id: &VoiceId) -> Result<()> {
        if !self.exists(id).await {
            return Err(AudriaError::NotFound(format!("Voice {id} not found")));
        }
        fs::remove_dir_all(self.voice_dir(id)).await?;
        info!(target: "voice_store", voice_id = %id, "Deleted voice");
        Ok(())
    }

    /// Fresh path in the temp dir for one generation request
    pub async fn generated_output_path(&self, id: &VoiceId) -> Result<PathBuf> {
        fs::create_dir_all(&self.temp_dir).await?;
        Ok(self
            .temp_dir
            .join(format!("generated_{id}_{}_{}.wav", now_secs(), gen_nonce())))
    }

    /// Remove generated files older than `max_age`; returns how many were removed
    pub async fn prune_temp(&self, max_age: Duration) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.temp_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let now = SystemTime::now();
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age >= max_age {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(target: "voice_store", path = ?entry.path(), error = %e, "Failed to prune temp file")
                    }
                }
            }
        }
        if removed > 0 {
            debug!(target: "voice_store", removed, "Pruned generated audio");
        }
        Ok(removed)
    }
}

async fn is_file(p: &Path) -> bool {
    fs::metadata(p).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn file_created(p: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(p).await.ok()?;
    let t = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::<Utc>::from(t))
}
