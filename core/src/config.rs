use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::{get_from_env_or_path, get_from_path};

pub const DEFAULT_TTS_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";
pub const PLACEHOLDER_JWT_SECRET: &str = "your-secret-key-change-this";
const DEFAULT_EXTENSIONS: [&str; 6] = ["wav", "mp3", "m4a", "ogg", "flac", "aac"];

/// Top-level service configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Postgres connection string; migrations are applied out of band
    pub database_url: Option<String>,
    /// Frontend origin, used for CORS and password reset redirects
    pub frontend_url: String,
    pub jwt_secret: String,
    pub supabase: SupabaseConfig,
    pub voice: VoiceConfig,
}

/// Hosted auth/database connection
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub request_timeout_ms: u64,
}

/// Voice asset storage and synthesis engine settings
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub upload_dir: PathBuf,
    pub tts_model: String,
    pub tos_agreed: bool,
    pub max_file_size: u64,
    pub allowed_extensions: BTreeSet<String>,
    pub synth_timeout_ms: u64,
    pub temp_ttl_secs: u64,
    pub tts_bin: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => default,
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: env_nonempty("SUPABASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            key: env_nonempty("SUPABASE_KEY").unwrap_or_default(),
            request_timeout_ms: env_parse("SUPABASE_TIMEOUT_MS").unwrap_or(15_000),
        }
    }
}

impl SupabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty()
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: env_nonempty("VOICE_UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads/voices")),
            tts_model: env_nonempty("TTS_MODEL").unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tos_agreed: env_flag("COQUI_TOS_AGREED", true),
            max_file_size: env_parse("VOICE_MAX_FILE_SIZE").unwrap_or(16 * 1024 * 1024),
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            synth_timeout_ms: env_parse("TTS_TIMEOUT_MS").unwrap_or(300_000),
            temp_ttl_secs: env_parse("VOICE_TEMP_TTL_SECS").unwrap_or(3_600),
            tts_bin: get_from_env_or_path("TTS_BIN", "tts"),
            espeak_bin: get_from_env_or_path("ESPEAK_BIN", "espeak-ng")
                .or_else(|| get_from_path("espeak")),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppConfig {
    /// Build configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            environment: env_nonempty("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            host: env_nonempty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT").unwrap_or(8000),
            database_url: env_nonempty("DATABASE_URL"),
            frontend_url: env_nonempty("FRONTEND_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            jwt_secret: env_nonempty("JWT_SECRET_KEY")
                .unwrap_or_else(|| PLACEHOLDER_JWT_SECRET.to_string()),
            supabase: SupabaseConfig::default(),
            voice: VoiceConfig::default(),
        }
    }

    /// Load configuration from a TOML file (path via AUDRIA_CONFIG or ./audria.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("AUDRIA_CONFIG").unwrap_or_else(|_| "audria.toml".into());
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let default = Self::from_env();
        let p = path.as_ref();
        if !p.exists() {
            tracing::info!(target: "config", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<AppToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_placeholder_jwt_secret(&self) -> bool {
        self.jwt_secret == PLACEHOLDER_JWT_SECRET
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AppToml {
    pub environment: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub frontend_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub supabase: Option<SupabaseToml>,
    pub voice: Option<VoiceToml>,
}

impl AppToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(v) = self.environment {
            base.environment = v;
        }
        if let Some(v) = self.host {
            base.host = v;
        }
        if let Some(v) = self.port {
            base.port = v;
        }
        if let Some(v) = self.database_url {
            base.database_url = Some(v);
        }
        if let Some(v) = self.frontend_url {
            base.frontend_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.jwt_secret {
            base.jwt_secret = v;
        }
        if let Some(s) = self.supabase {
            s.apply(&mut base.supabase);
        }
        if let Some(v) = self.voice {
            v.apply(&mut base.voice);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SupabaseToml {
    pub url: Option<String>,
    pub key: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl SupabaseToml {
    fn apply(self, cfg: &mut SupabaseConfig) {
        if let Some(v) = self.url {
            cfg.url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = self.key {
            cfg.key = v;
        }
        if let Some(v) = self.request_timeout_ms {
            cfg.request_timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoiceToml {
    pub upload_dir: Option<PathBuf>,
    pub tts_model: Option<String>,
    pub tos_agreed: Option<bool>,
    pub max_file_size: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub synth_timeout_ms: Option<u64>,
    pub temp_ttl_secs: Option<u64>,
    pub tts_bin: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}

impl VoiceToml {
    fn apply(self, cfg: &mut VoiceConfig) {
        if let Some(v) = self.upload_dir {
            if !v.as_os_str().is_empty() {
                cfg.upload_dir = v;
            }
        }
        if let Some(v) = self.tts_model {
            cfg.tts_model = v;
        }
        if let Some(v) = self.tos_agreed {
            cfg.tos_agreed = v;
        }
        if let Some(v) = self.max_file_size {
            cfg.max_file_size = v;
        }
        if let Some(v) = self.allowed_extensions {
            cfg.allowed_extensions = v
                .into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(v) = self.synth_timeout_ms {
            cfg.synth_timeout_ms = v;
        }
        if let Some(v) = self.temp_ttl_secs {
            cfg.temp_ttl_secs = v;
        }
        if let Some(v) = self.tts_bin {
            cfg.tts_bin = Some(v);
        }
        if let Some(v) = self.espeak_bin {
            cfg.espeak_bin = Some(v);
        }
    }
}
