#![allow(dead_code)]

use async_trait::async_trait;
use audria_core::config::{AppConfig, SupabaseConfig, VoiceConfig};
use audria_core::hosted::{
    AuthSession, AuthUser, Caller, NewPerson, Person, PersonDetails, PersonDetailsData,
    PersonUpdate, SignUpOutcome,
};
use audria_core::voice::{SpeechSynthesizer, SynthEngines, SynthesisRequest, VoiceService, VoiceStore};
use audria_core::{AudriaError, AuthBackend, PersonRepository, Result};
use audria_server::{build_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const ALICE: &str = "0b6c7a52-1f0e-4d8a-9a51-3f1c2b7e9d01";
pub const BOB: &str = "5e2d9c1b-7a3f-4b6e-8c0d-2a9f1e4b7c02";
pub const ALICE_TOKEN: &str = "token-alice";
pub const BOB_TOKEN: &str = "token-bob";

pub fn user(id: &str, email: &str) -> AuthUser {
    AuthUser {
        id: id.into(),
        email: Some(email.into()),
        email_confirmed_at: None,
        last_sign_in_at: None,
        created_at: None,
        updated_at: None,
        user_metadata: Value::Null,
    }
}

pub fn session(token: &str, id: &str, email: &str) -> AuthSession {
    AuthSession {
        access_token: token.into(),
        refresh_token: format!("refresh-{token}"),
        expires_in: 3600,
        token_type: "bearer".into(),
        user: user(id, email),
    }
}

/// Two fixed accounts; everything else is rejected like GoTrue would
#[derive(Default)]
pub struct FakeAuth {
    pub resets: Mutex<Vec<(String, String)>>,
    pub signed_out: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthBackend for FakeAuth {
    fn is_configured(&self) -> bool {
        true
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _name: Option<&str>,
    ) -> Result<SignUpOutcome> {
        if email == "alice@example.com" {
            return Err(AudriaError::Backend {
                status: 422,
                message: "User already registered".into(),
            });
        }
        Ok(SignUpOutcome {
            user: Some(user("new-user", email)),
            session: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        match (email, password) {
            ("alice@example.com", "secret") => Ok(session(ALICE_TOKEN, ALICE, email)),
            _ => Err(AudriaError::Backend {
                status: 400,
                message: "Invalid login credentials".into(),
            }),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        if refresh_token == format!("refresh-{ALICE_TOKEN}") {
            Ok(session(ALICE_TOKEN, ALICE, "alice@example.com"))
        } else {
            Err(AudriaError::Backend {
                status: 400,
                message: "Invalid Refresh Token".into(),
            })
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.signed_out
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        match access_token {
            ALICE_TOKEN => Ok(user(ALICE, "alice@example.com")),
            BOB_TOKEN => Ok(user(BOB, "bob@example.com")),
            _ => Err(AudriaError::Backend {
                status: 401,
                message: "invalid JWT".into(),
            }),
        }
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.resets
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        if email.ends_with("@fail.test") {
            return Err(AudriaError::Backend {
                status: 429,
                message: "rate limited".into(),
            });
        }
        Ok(())
    }

    async fn update_password(&self, access_token: &str, _new_password: &str) -> Result<AuthUser> {
        match access_token {
            ALICE_TOKEN => Ok(user(ALICE, "alice@example.com")),
            _ => Err(AudriaError::InvalidInput(
                "Invalid or expired reset token".into(),
            )),
        }
    }
}

/// In-memory rows with the same owner scoping the database policies apply
#[derive(Default)]
pub struct FakePersons {
    rows: Mutex<Vec<Person>>,
    details: Mutex<Vec<PersonDetails>>,
    next: Mutex<u32>,
    list_failure: Mutex<Option<fn() -> AudriaError>>,
}

impl FakePersons {
    fn next_id(&self) -> String {
        let mut n = self.next.lock().unwrap();
        *n += 1;
        format!("00000000-0000-4000-8000-{:012}", *n)
    }

    /// Make every subsequent list call fail with the given error
    pub fn fail_lists_with(&self, make: fn() -> AudriaError) {
        *self.list_failure.lock().unwrap() = Some(make);
    }

    pub fn list_is_empty_for(&self, user_id: &str) -> bool {
        !self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.user_id == user_id)
    }

    fn owned(&self, caller: &Caller, id: &str) -> Result<Person> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.user_id == caller.user_id)
            .cloned()
            .ok_or_else(|| AudriaError::NotFound("Person not found".into()))
    }
}

#[async_trait]
impl PersonRepository for FakePersons {
    async fn create_person(&self, caller: &Caller, person: &NewPerson) -> Result<Person> {
        let now = Utc::now();
        let row = Person {
            id: self.next_id(),
            user_id: caller.user_id.clone(),
            name: person.name.clone(),
            generation: person.generation.clone(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_persons(&self, caller: &Caller, skip: u32, limit: u32) -> Result<Vec<Person>> {
        if let Some(make) = *self.list_failure.lock().unwrap() {
            return Err(make());
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == caller.user_id)
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_person(&self, caller: &Caller, person_id: &str) -> Result<Person> {
        self.owned(caller, person_id)
    }

    async fn update_person(
        &self,
        caller: &Caller,
        person_id: &str,
        update: &PersonUpdate,
    ) -> Result<Person> {
        self.owned(caller, person_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| p.id == person_id)
            .ok_or_else(|| AudriaError::NotFound("Person not found".into()))?;
        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        if let Some(generation) = &update.generation {
            row.generation = Some(generation.clone());
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_person(&self, caller: &Caller, person_id: &str) -> Result<()> {
        self.owned(caller, person_id)?;
        self.rows.lock().unwrap().retain(|p| p.id != person_id);
        self.details
            .lock()
            .unwrap()
            .retain(|d| d.person_id != person_id);
        Ok(())
    }

    async fn get_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
    ) -> Result<Option<PersonDetails>> {
        self.owned(caller, person_id)?;
        Ok(self
            .details
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.person_id == person_id)
            .cloned())
    }

    async fn upsert_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
        data: &PersonDetailsData,
    ) -> Result<PersonDetails> {
        self.owned(caller, person_id)?;
        let data = serde_json::to_value(data)?;
        let now = Utc::now();
        let mut details = self.details.lock().unwrap();
        if let Some(existing) = details.iter_mut().find(|d| d.person_id == person_id) {
            existing.data = data;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let row = PersonDetails {
            id: self.next_id(),
            person_id: person_id.to_string(),
            data,
            created_at: now,
            updated_at: now,
        };
        details.push(row.clone());
        Ok(row)
    }
}

/// Writes a fixed WAV header to the requested path
pub struct FakeSynth {
    pub clones: bool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn name(&self) -> &str {
        "fake-tts"
    }

    fn clones_voice(&self) -> bool {
        self.clones
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<()> {
        tokio::fs::write(&req.out_path, b"RIFF$\0\0\0WAVEfmt ").await?;
        Ok(())
    }
}

pub fn test_config(upload_dir: &Path) -> AppConfig {
    AppConfig {
        environment: "development".into(),
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        frontend_url: "http://localhost:5173".into(),
        jwt_secret: "test-secret".into(),
        supabase: SupabaseConfig {
            url: "http://supabase.test".into(),
            key: "anon-key".into(),
            request_timeout_ms: 1_000,
        },
        voice: VoiceConfig {
            upload_dir: upload_dir.to_path_buf(),
            tts_model: "test-model".into(),
            tos_agreed: true,
            max_file_size: 64 * 1024,
            allowed_extensions: ["wav", "mp3"].iter().map(|s| s.to_string()).collect(),
            synth_timeout_ms: 5_000,
            temp_ttl_secs: 60,
            tts_bin: None,
            espeak_bin: None,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub auth: Arc<FakeAuth>,
    pub persons: Arc<FakePersons>,
    pub config: AppConfig,
}

pub fn app_with_engines(upload_dir: &Path, engines: SynthEngines) -> TestApp {
    let config = test_config(upload_dir);
    let auth = Arc::new(FakeAuth::default());
    let persons = Arc::new(FakePersons::default());
    let store = VoiceStore::from_config(&config.voice).unwrap();
    let state = AppState::new(
        config.clone(),
        auth.clone(),
        persons.clone(),
        VoiceService::new(store, engines),
    );
    TestApp {
        router: build_router(state),
        auth,
        persons,
        config,
    }
}

pub fn app(upload_dir: &Path) -> TestApp {
    app_with_engines(
        upload_dir,
        SynthEngines::new(Some(Arc::new(FakeSynth { clones: true })), None),
    )
}

pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub const BOUNDARY: &str = "----audria-test-boundary";

/// Multipart body with text fields plus one `audio_file` part
pub fn multipart_upload(
    token: &str,
    fields: &[(&str, &str)],
    filename: &str,
    audio: &[u8],
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio_file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/voices/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
