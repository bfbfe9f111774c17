// Person profile routes
//
// Rows live in the hosted database; every call is made with the caller's
// token so the database policies see the real user.

use audria_core::hosted::{
    is_uuid, NewPerson, Person, PersonDetails, PersonDetailsData, PersonUpdate, PersonWithDetails,
};
use audria_core::AudriaError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_persons).post(create_person))
        .route(
            "/:person_id",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/:person_id/details", put(upsert_details).get(get_details))
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    skip: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn person_id(raw: &str) -> ApiResult<&str> {
    if is_uuid(raw) {
        Ok(raw)
    } else {
        Err(ApiError::Status(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid person id: {raw}"),
        ))
    }
}

async fn create_person(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<NewPerson>,
) -> ApiResult<(StatusCode, Json<Person>)> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    let person = state.persons.create_person(&caller, &body).await?;
    info!(target: "http", user_id = %caller.user_id, person_id = %person.id, "Person created");
    Ok((StatusCode::CREATED, Json(person)))
}

async fn list_persons(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Person>>> {
    let limit = page.limit.clamp(1, MAX_LIMIT);
    match state.persons.list_persons(&caller, page.skip, limit).await {
        Ok(persons) => Ok(Json(persons)),
        Err(e @ (AudriaError::Unavailable(_) | AudriaError::Config(_))) => Err(e.into()),
        Err(e) => {
            warn!(target: "http", user_id = %caller.user_id, error = %e, "Listing persons failed; returning empty list");
            Ok(Json(Vec::new()))
        }
    }
}

async fn get_person(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<PersonWithDetails>> {
    let id = person_id(&raw_id)?;
    let person = state.persons.get_person(&caller, id).await?;
    let details = state.persons.get_person_details(&caller, id).await?;
    Ok(Json(PersonWithDetails { person, details }))
}

async fn update_person(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(raw_id): Path<String>,
    Json(update): Json<PersonUpdate>,
) -> ApiResult<Json<Person>> {
    let id = person_id(&raw_id)?;
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    let person = state.persons.update_person(&caller, id, &update).await?;
    Ok(Json(person))
}

async fn delete_person(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = person_id(&raw_id)?;
    state.persons.delete_person(&caller, id).await?;
    info!(target: "http", user_id = %caller.user_id, person_id = id, "Person deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn upsert_details(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(raw_id): Path<String>,
    Json(data): Json<PersonDetailsData>,
) -> ApiResult<Json<PersonDetails>> {
    let id = person_id(&raw_id)?;
    let details = state
        .persons
        .upsert_person_details(&caller, id, &data)
        .await?;
    Ok(Json(details))
}

async fn get_details(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<PersonDetails>> {
    let id = person_id(&raw_id)?;
    state
        .persons
        .get_person_details(&caller, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Status(StatusCode::NOT_FOUND, "Person details not found".into()))
}
