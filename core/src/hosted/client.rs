use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    AuthSession, AuthUser, Caller, NewPerson, Person, PersonDetails, PersonDetailsData,
    PersonUpdate, SignUpOutcome,
};
use super::{AuthBackend, PersonRepository};
use crate::config::SupabaseConfig;
use crate::{AudriaError, Result};

const PERSONS: &str = "persons";
const PERSON_DETAILS: &str = "person_details";

/// HTTP client for a hosted Supabase project (GoTrue + PostgREST)
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    cfg: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(cfg: SupabaseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| AudriaError::Config(format!("Failed to build HTTP client: {e}")))?;
        if !cfg.is_configured() {
            warn!(
                target: "supabase",
                "SUPABASE_URL / SUPABASE_KEY not set; auth and person routes will be unavailable"
            );
        }
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SupabaseConfig::default())
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.cfg.is_configured() {
            Ok(())
        } else {
            Err(AudriaError::Unavailable("Supabase service unavailable".into()))
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.cfg.url.trim_end_matches('/'), path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.cfg.url.trim_end_matches('/'), table)
    }

    /// Request carrying only the project key
    fn anon(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        self.ensure_configured()?;
        debug!(target: "supabase", %method, url, "request");
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.cfg.key)
            .bearer_auth(&self.cfg.key))
    }

    /// Request on behalf of a signed-in user; RLS evaluates against this token
    fn as_user(&self, method: Method, url: &str, access_token: &str) -> Result<RequestBuilder> {
        self.ensure_configured()?;
        debug!(target: "supabase", %method, url, "user request");
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.cfg.key)
            .bearer_auth(access_token))
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(backend_error(resp).await);
        }
        Ok(resp.json::<T>().await?)
    }

    async fn send_empty(req: RequestBuilder) -> Result<()> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(backend_error(resp).await);
        }
        Ok(())
    }

    /// Ownership probe shared by all person-scoped operations
    async fn ensure_person_owned(&self, caller: &Caller, person_id: &str) -> Result<()> {
        let req = self
            .as_user(Method::GET, &self.rest_url(PERSONS), &caller.access_token)?
            .query(&[
                ("select", "id".to_string()),
                ("id", format!("eq.{person_id}")),
                ("user_id", format!("eq.{}", caller.user_id)),
            ]);
        let rows: Vec<Value> = Self::send_json(req).await?;
        if rows.is_empty() {
            return Err(AudriaError::NotFound("Person not found".into()));
        }
        Ok(())
    }
}

async fn backend_error(resp: Response) -> AudriaError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| extract_error_message(&v))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Upstream error")
                    .to_string()
            } else {
                body.clone()
            }
        });
    warn!(target: "supabase", status = status.as_u16(), message = %message, "Backend error");
    AudriaError::Backend {
        status: status.as_u16(),
        message,
    }
}

/// GoTrue reports `msg` or `error_description`; PostgREST reports `message`.
pub(crate) fn extract_error_message(val: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|k| val.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Sign-up answers with a full session when email confirmation is off,
/// and with the bare user object otherwise.
pub(crate) fn parse_sign_up(val: Value) -> Result<SignUpOutcome> {
    if val.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value(val)?;
        return Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }
    if let Some(user) = val.get("user").filter(|u| !u.is_null()) {
        let user: AuthUser = serde_json::from_value(user.clone())?;
        return Ok(SignUpOutcome {
            user: Some(user),
            session: None,
        });
    }
    if val.get("id").is_some() {
        let user: AuthUser = serde_json::from_value(val)?;
        return Ok(SignUpOutcome {
            user: Some(user),
            session: None,
        });
    }
    Ok(SignUpOutcome {
        user: None,
        session: None,
    })
}

fn first_row<T>(rows: Vec<T>, what: &str) -> Result<T> {
    rows.into_iter().next().ok_or_else(|| AudriaError::Backend {
        status: 500,
        message: format!("Failed to {what}"),
    })
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    fn is_configured(&self) -> bool {
        self.cfg.is_configured()
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<SignUpOutcome> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(name) = name {
            body["data"] = json!({ "name": name });
        }
        let req = self.anon(Method::POST, &self.auth_url("signup"))?.json(&body);
        let val: Value = Self::send_json(req).await?;
        parse_sign_up(val)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let req = self
            .anon(Method::POST, &self.auth_url("token"))?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        Self::send_json(req).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let req = self
            .anon(Method::POST, &self.auth_url("token"))?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        Self::send_json(req).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let req = self.as_user(Method::POST, &self.auth_url("logout"), access_token)?;
        Self::send_empty(req).await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let req = self.as_user(Method::GET, &self.auth_url("user"), access_token)?;
        Self::send_json(req).await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        let req = self
            .anon(Method::POST, &self.auth_url("recover"))?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        Self::send_empty(req).await
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<AuthUser> {
        // Reject stale reset links before attempting the write
        self.get_user(access_token).await.map_err(|e| match e {
            AudriaError::Backend { status, .. } if (400..500).contains(&status) => {
                AudriaError::InvalidInput("Invalid or expired reset token".into())
            }
            other => other,
        })?;
        let req = self
            .as_user(Method::PUT, &self.auth_url("user"), access_token)?
            .json(&json!({ "password": new_password }));
        Self::send_json(req).await
    }
}

#[async_trait]
impl PersonRepository for SupabaseClient {
    async fn create_person(&self, caller: &Caller, person: &NewPerson) -> Result<Person> {
        let req = self
            .as_user(Method::POST, &self.rest_url(PERSONS), &caller.access_token)?
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": caller.user_id,
                "name": person.name,
                "generation": person.generation,
            }));
        let rows: Vec<Person> = Self::send_json(req).await?;
        first_row(rows, "create person")
    }

    async fn list_persons(&self, caller: &Caller, skip: u32, limit: u32) -> Result<Vec<Person>> {
        let req = self
            .as_user(Method::GET, &self.rest_url(PERSONS), &caller.access_token)?
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", caller.user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
                ("offset", skip.to_string()),
            ]);
        Self::send_json(req).await
    }

    async fn get_person(&self, caller: &Caller, person_id: &str) -> Result<Person> {
        let req = self
            .as_user(Method::GET, &self.rest_url(PERSONS), &caller.access_token)?
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{person_id}")),
                ("user_id", format!("eq.{}", caller.user_id)),
            ]);
        let rows: Vec<Person> = Self::send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AudriaError::NotFound("Person not found".into()))
    }

    async fn update_person(
        &self,
        caller: &Caller,
        person_id: &str,
        update: &PersonUpdate,
    ) -> Result<Person> {
        self.ensure_person_owned(caller, person_id).await?;

        let mut body = serde_json::Map::new();
        if let Some(name) = &update.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(generation) = &update.generation {
            body.insert("generation".into(), json!(generation));
        }
        body.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let req = self
            .as_user(Method::PATCH, &self.rest_url(PERSONS), &caller.access_token)?
            .header("Prefer", "return=representation")
            .query(&[
                ("id", format!("eq.{person_id}")),
                ("user_id", format!("eq.{}", caller.user_id)),
            ])
            .json(&Value::Object(body));
        let rows: Vec<Person> = Self::send_json(req).await?;
        first_row(rows, "update person")
    }

    async fn delete_person(&self, caller: &Caller, person_id: &str) -> Result<()> {
        self.ensure_person_owned(caller, person_id).await?;
        // person_details rows go with it via ON DELETE CASCADE
        let req = self
            .as_user(Method::DELETE, &self.rest_url(PERSONS), &caller.access_token)?
            .query(&[
                ("id", format!("eq.{person_id}")),
                ("user_id", format!("eq.{}", caller.user_id)),
            ]);
        Self::send_empty(req).await
    }

    async fn get_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
    ) -> Result<Option<PersonDetails>> {
        self.ensure_person_owned(caller, person_id).await?;
        let req = self
            .as_user(Method::GET, &self.rest_url(PERSON_DETAILS), &caller.access_token)?
            .query(&[
                ("select", "*".to_string()),
                ("person_id", format!("eq.{person_id}")),
            ]);
        let rows: Vec<PersonDetails> = Self::send_json(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
        data: &PersonDetailsData,
    ) -> Result<PersonDetails> {
        self.ensure_person_owned(caller, person_id).await?;
        let data = serde_json::to_value(data)?;
        let url = self.rest_url(PERSON_DETAILS);

        let probe = self
            .as_user(Method::GET, &url, &caller.access_token)?
            .query(&[
                ("select", "id".to_string()),
                ("person_id", format!("eq.{person_id}")),
            ]);
        let existing: Vec<Value> = Self::send_json(probe).await?;

        let req = if existing.is_empty() {
            self.as_user(Method::POST, &url, &caller.access_token)?
                .json(&json!({ "person_id": person_id, "data": data }))
        } else {
            self.as_user(Method::PATCH, &url, &caller.access_token)?
                .query(&[("person_id", format!("eq.{person_id}"))])
                .json(&json!({ "data": data, "updated_at": Utc::now().to_rfc3339() }))
        };
        let rows: Vec<PersonDetails> =
            Self::send_json(req.header("Prefer", "return=representation")).await?;
        first_row(rows, "save person details")
    }
}
