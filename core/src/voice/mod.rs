//! Voice assets
//!
//! A voice is a directory on disk holding the uploaded reference sample and
//! an optional rendered test phrase. Cloning and synthesis are delegated to
//! an external engine (see [`synth`]).

pub mod id;
pub mod service;
pub mod store;
pub mod synth;

pub use id::VoiceId;
pub use service::{GenerateRequest, GeneratedSpeech, UploadRequest, VoiceRecord, VoiceService};
pub use store::{VoiceInfo, VoiceStore, VoiceSummary};
pub use synth::{
    CoquiCliSynthesizer, EspeakSynthesizer, SpeechSynthesizer, SynthEngines, SynthesisRequest,
};
