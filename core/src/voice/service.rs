use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::id::VoiceId;
use super::store::{VoiceInfo, VoiceStore, VoiceSummary};
use super::synth::{SynthEngines, SynthesisRequest};
use crate::util::now_secs;
use crate::{AudriaError, Result};

const ACCESS_DENIED: &str = "Voice not found or access denied";
const TEST_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: String,
    pub voice_name: String,
    pub voice_type: String,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub test_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceRecord {
    pub voice_id: String,
    pub voice_name: String,
    pub voice_type: String,
    pub reference_path: String,
    pub test_path: Option<String>,
    pub voice_dir: String,
    pub message: String,
    pub tts_available: bool,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub text: String,
    pub voice_id: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedSpeech {
    pub file_path: PathBuf,
    /// Engine that produced the audio
    pub tts_type: String,
    /// Whether the output uses the uploaded voice
    pub cloned: bool,
    pub message: String,
}

/// Voice asset lifecycle: upload → reference storage → on-demand speech
pub struct VoiceService {
    store: VoiceStore,
    engines: SynthEngines,
}

impl VoiceService {
    pub fn new(store: VoiceStore, engines: SynthEngines) -> Self {
        info!(target: "voice_service", engines = %engines.describe(), "Voice service ready");
        Self { store, engines }
    }

    pub fn store(&self) -> &VoiceStore {
        &self.store
    }

    pub fn engines(&self) -> &SynthEngines {
        &self.engines
    }

    fn authorize(user_id: &str, raw_id: &str) -> Result<VoiceId> {
        match VoiceId::parse(raw_id) {
            Ok(id) if id.owned_by(user_id) => Ok(id),
            _ => Err(AudriaError::Forbidden(ACCESS_DENIED.into())),
        }
    }

    pub async fn upload(&self, req: UploadRequest) -> Result<VoiceRecord> {
        let voice_name = req.voice_name.trim().to_string();
        if voice_name.is_empty() {
            return Err(AudriaError::InvalidInput("voice_name is required".into()));
        }
        let ext = self
            .store
            .validate_upload(&req.filename, req.bytes.len() as u64)?;

        // Same user + name within one second would collide; step the stamp forward
        let mut ts = now_secs();
        let id = loop {
            let candidate = VoiceId::generate(&req.user_id, &voice_name, ts);
            if self.store.claim(&candidate).await? {
                break candidate;
            }
            ts += 1;
        };

        let reference = self.store.create_voice(&id, &ext, &req.bytes).await?;
        let voice_dir = self.store.voice_dir(&id);
        info!(
            target: "voice_service",
            voice_id = %id,
            bytes = req.bytes.len(),
            "Stored voice reference"
        );

        let mut record = VoiceRecord {
            voice_id: id.to_string(),
            voice_name: id.voice_name().to_string(),
            voice_type: req.voice_type,
            reference_path: reference.to_string_lossy().to_string(),
            test_path: None,
            voice_dir: voice_dir.to_string_lossy().to_string(),
            message: String::new(),
            tts_available: self.engines.cloning_available(),
        };

        let Some(engine) = self.engines.cloning.as_ref() else {
            record.message = format!(
                "Voice '{voice_name}' saved (TTS not available for cloning - using reference audio only)"
            );
            return Ok(record);
        };

        let text = req
            .test_text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Hello, this is {voice_name}. I'm ready to help."));
        let test_out = self.store.test_output_path(&id);
        let synth = SynthesisRequest {
            text,
            speaker_wav: Some(reference),
            language: TEST_LANGUAGE.to_string(),
            out_path: test_out.clone(),
        };
        match engine.synthesize(&synth).await {
            Ok(()) => {
                record.test_path = Some(test_out.to_string_lossy().to_string());
                record.message = format!(
                    "Voice '{voice_name}' created successfully using {}",
                    engine.name()
                );
            }
            Err(e) => {
                warn!(target: "voice_service", voice_id = %id, error = %e, "Test audio generation failed");
                record.message = format!(
                    "Voice '{voice_name}' saved, but test audio generation failed: {e}"
                );
            }
        }
        Ok(record)
    }

    pub async fn generate(&self, user_id: &str, req: GenerateRequest) -> Result<GeneratedSpeech> {
        let id = Self::authorize(user_id, &req.voice_id)?;
        if req.text.trim().is_empty() {
            return Err(AudriaError::InvalidInput("Text is required".into()));
        }
        let reference = self
            .store
            .reference_path(&id)
            .await?
            .ok_or_else(|| AudriaError::NotFound(format!("Voice {id} not found")))?;
        let language = if req.language.trim().is_empty() {
            TEST_LANGUAGE.to_string()
        } else {
            req.language.trim().to_string()
        };
        let out_path = self.store.generated_output_path(&id).await?;

        let (engine, speaker) = match (&self.engines.cloning, &self.engines.fallback) {
            (Some(engine), _) => (engine, Some(reference)),
            (None, Some(engine)) => (engine, None),
            (None, None) => {
                return Err(AudriaError::SynthesisUnavailable(
                    "voice cloning engine not installed and no fallback engine available".into(),
                ))
            }
        };

        engine
            .synthesize(&SynthesisRequest {
                text: req.text,
                speaker_wav: speaker,
                language,
                out_path: out_path.clone(),
            })
            .await?;

        let cloned = engine.clones_voice();
        info!(
            target: "voice_service",
            voice_id = %id,
            engine = engine.name(),
            cloned,
            "Generated speech"
        );
        Ok(GeneratedSpeech {
            file_path: out_path,
            tts_type: engine.name().to_string(),
            cloned,
            message: if cloned {
                "Audio generated successfully".to_string()
            } else {
                format!(
                    "Generated using {} (voice cloning not available)",
                    engine.name()
                )
            },
        })
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<VoiceSummary>> {
        self.store.list(user_id).await
    }

    pub async fn info(&self, user_id: &str, voice_id: &str) -> Result<VoiceInfo> {
        let id = Self::authorize(user_id, voice_id)?;
        self.store.info(&id).await
    }

    pub async fn delete(&self, user_id: &str, voice_id: &str) -> Result<()> {
        let id = Self::authorize(user_id, voice_id)?;
        self.store.delete(&id).await
    }
}
