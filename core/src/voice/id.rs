use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

use crate::{AudriaError, Result};

const PREFIX: &str = "local_";
const MAX_LEN: usize = 255;

/// Identifier of a voice asset, also the name of its directory on disk.
///
/// Layout: `local_{user}_{name}_{unix_ts}`. Both the user and name segments
/// are slugged to `[A-Za-z0-9-]`, so `_` only ever appears as a separator and
/// an id is always a single safe path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn generate(user_id: &str, voice_name: &str, unix_ts: i64) -> Self {
        let user = slug_or(user_id, "anonymous");
        let name = slug_or(voice_name, "voice");
        Self(format!("{PREFIX}{user}_{name}_{unix_ts}"))
    }

    /// Accept an id coming from a client. Anything that is not a plain
    /// `local_...` path component is refused.
    pub fn parse(raw: &str) -> Result<Self> {
        let ok = raw.len() <= MAX_LEN
            && raw.starts_with(PREFIX)
            && raw.len() > PREFIX.len()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(AudriaError::InvalidInput(format!("Invalid voice id: {raw}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owned_by(&self, user_id: &str) -> bool {
        self.0
            .starts_with(&format!("{PREFIX}{}_", slug_or(user_id, "anonymous")))
    }

    /// Display name embedded in the id (second-to-last segment)
    pub fn voice_name(&self) -> &str {
        let parts: Vec<&str> = self.0.split('_').collect();
        if parts.len() >= 3 {
            parts[parts.len() - 2]
        } else {
            &self.0
        }
    }

    /// Upload time embedded in the id
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let ts = self.0.rsplit('_').next()?.parse::<i64>().ok()?;
        Utc.timestamp_opt(ts, 0).single()
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VoiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

fn slug_or(raw: &str, fallback: &str) -> String {
    let s = slug(raw);
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}
