//! Speech synthesis engines
//!
//! Synthesis is delegated to external CLI engines with graceful degradation:
//! - Prefer the Coqui `tts` CLI (voice cloning from the reference sample)
//! - Fallback to espeak-ng (generic voice, no cloning)
//! - If neither is present, uploads keep the reference only and generation
//!   reports the feature as unavailable
//!
//! Env overrides:
//! - TTS_BIN, TTS_MODEL, COQUI_TOS_AGREED, TTS_TIMEOUT_MS
//! - ESPEAK_BIN

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::{AudriaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Reference sample to clone; ignored by engines that cannot clone
    pub speaker_wav: Option<PathBuf>,
    pub language: String,
    pub out_path: PathBuf,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    fn clones_voice(&self) -> bool;

    /// Render `req.text` into a WAV file at `req.out_path`
    async fn synthesize(&self, req: &SynthesisRequest) -> Result<()>;
}

/// Coqui TTS through its command line entry point.
///
/// One model instance per process: calls are serialized.
pub struct CoquiCliSynthesizer {
    bin: PathBuf,
    model: String,
    tos_agreed: bool,
    timeout_ms: u64,
    lock: Mutex<()>,
}

impl CoquiCliSynthesizer {
    pub fn new(bin: PathBuf, model: String, tos_agreed: bool, timeout_ms: u64) -> Self {
        Self {
            bin,
            model,
            tos_agreed,
            timeout_ms,
            lock: Mutex::new(()),
        }
    }

    fn command(&self, req: &SynthesisRequest) -> Command {
        let mut cmd = Command::new(&self.bin);
        // Joined form so text starting with '-' is never read as a flag
        cmd.arg(format!("--text={}", req.text));
        cmd.arg("--model_name").arg(&self.model);
        if let Some(speaker) = &req.speaker_wav {
            cmd.arg("--speaker_wav").arg(speaker);
        }
        if !req.language.is_empty() {
            cmd.arg("--language_idx").arg(&req.language);
        }
        cmd.arg("--out_path").arg(&req.out_path);
        if self.tos_agreed {
            cmd.env("COQUI_TOS_AGREED", "1");
        }
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for CoquiCliSynthesizer {
    fn name(&self) -> &str {
        "coqui-tts"
    }

    fn clones_voice(&self) -> bool {
        true
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<()> {
        let _guard = self.lock.lock().await;
        let cmd = self.command(req);
        debug!(target: "synth", engine = self.name(), model = %self.model, "Running tts");
        run_engine(cmd, self.timeout_ms, self.name(), req).await
    }
}

/// espeak-ng: always available on most Linux images, never clones.
pub struct EspeakSynthesizer {
    bin: PathBuf,
    timeout_ms: u64,
}

impl EspeakSynthesizer {
    pub fn new(bin: PathBuf, timeout_ms: u64) -> Self {
        Self { bin, timeout_ms }
    }

    fn command(&self, req: &SynthesisRequest) -> Command {
        let mut cmd = Command::new(&self.bin);
        if !req.language.is_empty() {
            cmd.arg("-v").arg(&req.language);
        }
        cmd.arg("-w").arg(&req.out_path);
        // Options end here; the text is always a positional argument
        cmd.arg("--").arg(&req.text);
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn clones_voice(&self) -> bool {
        false
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<()> {
        let cmd = self.command(req);
        debug!(target: "synth", engine = self.name(), "Running espeak-ng");
        run_engine(cmd, self.timeout_ms, self.name(), req).await
    }
}

async fn run_engine(
    mut cmd: Command,
    timeout_ms: u64,
    engine: &str,
    req: &SynthesisRequest,
) -> Result<()> {
    if let Some(parent) = req.out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(Duration::from_millis(timeout_ms), cmd.output()).await {
        Ok(res) => res?,
        Err(_) => {
            warn!(target: "synth", engine, timeout_ms, "Synthesis timed out");
            discard(&req.out_path).await;
            return Err(AudriaError::Timeout(timeout_ms));
        }
    };
    if !output.status.success() {
        discard(&req.out_path).await;
        return Err(AudriaError::Synthesis(format!(
            "{engine} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    if !tokio::fs::try_exists(&req.out_path).await.unwrap_or(false) {
        return Err(AudriaError::Synthesis(format!(
            "{engine} produced no output"
        )));
    }
    Ok(())
}

async fn discard(path: &std::path::Path) {
    let _ = tokio::fs::remove_file(path).await;
}

/// Engines available to the voice service
#[derive(Clone, Default)]
pub struct SynthEngines {
    pub cloning: Option<Arc<dyn SpeechSynthesizer>>,
    pub fallback: Option<Arc<dyn SpeechSynthesizer>>,
}

impl SynthEngines {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(
        cloning: Option<Arc<dyn SpeechSynthesizer>>,
        fallback: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self { cloning, fallback }
    }

    /// Pick engines from binaries found at startup
    pub fn detect(cfg: &VoiceConfig) -> Self {
        let cloning = cfg.tts_bin.as_ref().map(|bin| {
            info!(target: "synth", bin = ?bin, model = %cfg.tts_model, "Detected Coqui TTS binary");
            Arc::new(CoquiCliSynthesizer::new(
                bin.clone(),
                cfg.tts_model.clone(),
                cfg.tos_agreed,
                cfg.synth_timeout_ms,
            )) as Arc<dyn SpeechSynthesizer>
        });
        let fallback = cfg.espeak_bin.as_ref().map(|bin| {
            info!(target: "synth", bin = ?bin, "Detected espeak-ng binary");
            Arc::new(EspeakSynthesizer::new(bin.clone(), cfg.synth_timeout_ms))
                as Arc<dyn SpeechSynthesizer>
        });
        if cloning.is_none() {
            warn!(
                target: "synth",
                "Coqui TTS not found; voice cloning disabled (uploads keep reference audio only)"
            );
        }
        Self { cloning, fallback }
    }

    pub fn cloning_available(&self) -> bool {
        self.cloning.is_some()
    }

    pub fn describe(&self) -> String {
        format!(
            "cloning={} fallback={}",
            self.cloning.as_ref().map(|e| e.name()).unwrap_or("none"),
            self.fallback.as_ref().map(|e| e.name()).unwrap_or("none"),
        )
    }
}
