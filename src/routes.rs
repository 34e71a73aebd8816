use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use std::sync::Arc;

use crate::{
    birthdays::upcoming_birthdays,
    errors::{ApiError, StoreError},
    models::{Contact, ContactPatch, NewContact},
    settings::Settings,
    store::ContactStore,
    validation::{validate_new_contact, validate_patch, validate_window},
};

const NEXT_WEEK_DAYS: u32 = 7;
const MAX_WINDOW_DAYS: u32 = 366;

/// Source of "today" for the birthday endpoints.
pub type Clock = fn() -> NaiveDate;

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Clone)]
pub struct AppState {
    pub store: ContactStore,
    pub settings: Arc<Settings>,
    pub today: Clock,
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<u32>,
    limit: Option<u32>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    days: Option<u32>,
}

#[derive(Serialize)]
struct Greeting {
    message: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/healthchecker", get(health_check))
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/", get(list_contacts).post(create_contact))
        .route(
            "/contacts/:id",
            get(get_contact)
                .put(replace_contact)
                .patch(patch_contact)
                .delete(delete_contact),
        )
        .route("/birthdays/next7", get(birthdays_next_week))
        .route("/birthdays/upcoming", get(birthdays_upcoming))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Greeting> {
    Json(Greeting {
        message: "Hello, world!",
    })
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Greeting>> {
    state.store.ping().await?;
    Ok(Json(Greeting {
        message: "Welcome to the contacts API!",
    }))
}

async fn create_contact(
    State(state): State<AppState>,
    body: Result<Json<NewContact>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let Json(new) = body?;
    validate_new_contact(&new)?;

    let contact = state.store.create(new).await?;
    tracing::info!("Contact {} created", contact.id);
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn list_contacts(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Contact>>> {
    let Query(query) = query?;
    let offset = query.skip.unwrap_or(0);
    let limit = state.settings.page_limit(query.limit);

    let contacts = match query.q.as_deref().filter(|q| !q.is_empty()) {
        Some(needle) => state.store.search(needle, offset, limit).await?,
        None => state.store.list(offset, limit).await?,
    };
    Ok(Json(contacts))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Contact>> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or(StoreError::NotFound(id).into())
}

async fn replace_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<NewContact>, JsonRejection>,
) -> ApiResult<Json<Contact>> {
    let Json(new) = body?;
    validate_new_contact(&new)?;

    Ok(Json(state.store.update_full(id, new).await?))
}

async fn patch_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<ContactPatch>, JsonRejection>,
) -> ApiResult<Json<Contact>> {
    let Json(patch) = body?;
    validate_patch(&patch)?;

    Ok(Json(state.store.update_partial(id, patch).await?))
}

async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.store.delete(id).await? {
        tracing::info!("Contact {} deleted", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::NotFound(id).into())
    }
}

async fn birthdays_next_week(State(state): State<AppState>) -> ApiResult<Json<Vec<Contact>>> {
    upcoming(&state, NEXT_WEEK_DAYS).await
}

async fn birthdays_upcoming(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Contact>>> {
    let Query(query) = query?;
    let days = query.days.unwrap_or(NEXT_WEEK_DAYS);
    validate_window(days, MAX_WINDOW_DAYS)?;

    upcoming(&state, days).await
}

async fn upcoming(state: &AppState, days: u32) -> ApiResult<Json<Vec<Contact>>> {
    let snapshot = state.store.with_birthdays().await?;
    Ok(Json(upcoming_birthdays((state.today)(), days, snapshot)))
}
