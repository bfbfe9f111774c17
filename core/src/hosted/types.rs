use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated caller: user id plus the bearer token that proves it.
/// The token is forwarded to the database so row-level security applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

fn default_expires_in() -> i64 {
    3600
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: AuthUser,
}

/// Sign-up may or may not yield a session, depending on whether the
/// project requires email confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub generation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub generation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub generation: Option<String>,
}

impl PersonUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.generation.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonDetails {
    pub id: String,
    pub person_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonWithDetails {
    #[serde(flatten)]
    pub person: Person,
    pub details: Option<PersonDetails>,
}

// Detail blob stored as JSONB in person_details.data.
// Field names are camelCase on the wire to match the frontend.

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonDetailsData {
    pub residences: Vec<Residence>,
    pub work_history: Vec<WorkHistory>,
    pub personal_info: PersonalInfo,
    pub daily_routine: DailyRoutine,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Residence {
    pub id: String,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub from_year: String,
    pub to_year: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkHistory {
    pub id: String,
    pub job: String,
    pub from_year: String,
    pub to_year: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub interests: String,
    pub personality_traits: String,
    pub spiritual_practices: String,
    pub comfort_items: String,
    pub preferred_greeting: String,
    pub favorite_songs: String,
    pub health_conditions: String,
    pub sensitivities: String,
    pub sensory_preferences: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyRoutine {
    pub wake_time: String,
    pub nap_time: String,
    pub sleep_time: String,
}

/// Canonical 8-4-4-4-12 hex UUID check, used before ids reach query filters.
pub fn is_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}
