//! Hosted auth/database backend
//!
//! Authentication and row storage are delegated to a hosted Supabase project:
//! - GoTrue (`/auth/v1`) for sign-up, sign-in, sessions and password resets
//! - PostgREST (`/rest/v1`) for the `persons` / `person_details` tables
//!
//! Ownership of rows is enforced by the database's row-level security; the
//! caller's own access token is forwarded on every data request.
//!
//! Env overrides:
//! - SUPABASE_URL, SUPABASE_KEY, SUPABASE_TIMEOUT_MS

mod client;
mod types;

use async_trait::async_trait;

use crate::Result;

pub use client::SupabaseClient;
pub use types::{
    is_uuid, AuthSession, AuthUser, Caller, DailyRoutine, NewPerson, Person, PersonDetails,
    PersonDetailsData, PersonUpdate, PersonWithDetails, PersonalInfo, Residence, SignUpOutcome,
    WorkHistory,
};

/// Authentication passthrough
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Whether credentials for the hosted project are present
    fn is_configured(&self) -> bool;

    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>)
        -> Result<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    /// Resolve an access token to its user; fails for expired or forged tokens
    async fn get_user(&self, access_token: &str) -> Result<AuthUser>;

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()>;

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<AuthUser>;
}

/// Row access for subject profiles, scoped to the calling user
#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn create_person(&self, caller: &Caller, person: &NewPerson) -> Result<Person>;

    async fn list_persons(&self, caller: &Caller, skip: u32, limit: u32) -> Result<Vec<Person>>;

    /// Fails with `NotFound` when the row is missing or owned by someone else
    async fn get_person(&self, caller: &Caller, person_id: &str) -> Result<Person>;

    async fn update_person(
        &self,
        caller: &Caller,
        person_id: &str,
        update: &PersonUpdate,
    ) -> Result<Person>;

    async fn delete_person(&self, caller: &Caller, person_id: &str) -> Result<()>;

    async fn get_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
    ) -> Result<Option<PersonDetails>>;

    async fn upsert_person_details(
        &self,
        caller: &Caller,
        person_id: &str,
        data: &PersonDetailsData,
    ) -> Result<PersonDetails>;
}
