// Audria Core Library
// Voice asset lifecycle and hosted auth/database client

pub mod config;
pub mod hosted;
pub mod voice;

pub(crate) mod util;

// Export core types
pub use config::{AppConfig, SupabaseConfig, VoiceConfig};
pub use hosted::{AuthBackend, PersonRepository, SupabaseClient};
pub use voice::{SynthEngines, VoiceId, VoiceService, VoiceStore};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudriaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, AudriaError>;
