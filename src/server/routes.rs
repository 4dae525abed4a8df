use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use crate::auth::Caller;
use crate::model::{County, CountyWithPlaces, PostalCode, PostalCodeDetail, PlaceDetail};
use crate::mutation::RecordMutator;
use crate::query::{CountyFilter, PlaceFilter, PlaceListing, QueryEngine};
use crate::server::extract::{RecordId, RequestBody};
use crate::server::SharedState;
use crate::Error;

type ApiResult<T> = Result<T, Error>;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// ========== Counties ==========

pub async fn list_counties(
    State(state): State<SharedState>,
    Query(filter): Query<CountyFilter>,
) -> ApiResult<Json<Vec<County>>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).list_counties(&filter)?))
}

pub async fn show_county(
    State(state): State<SharedState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<CountyWithPlaces>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).show_county(id)?))
}

pub async fn create_county(
    State(state): State<SharedState>,
    caller: Caller,
    body: RequestBody,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body.into_input()?;
    let store = state.store.lock().await;
    let county = RecordMutator::new(&store).create_county(&input)?;
    tracing::debug!(caller = %caller.name, id = county.id, "county create");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "County created successfully", "data": county })),
    ))
}

pub async fn update_county(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
    body: RequestBody,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    store.get_county(id)?.ok_or_else(|| Error::not_found("County", id))?;
    let input = body.into_input()?;
    let county = RecordMutator::new(&store).update_county(id, &input)?;
    tracing::debug!(caller = %caller.name, id, "county update");
    Ok(Json(json!({ "message": "County updated successfully", "data": county })))
}

pub async fn delete_county(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    RecordMutator::new(&store).delete_county(id)?;
    tracing::debug!(caller = %caller.name, id, "county delete");
    Ok(Json(json!({ "message": "County deleted successfully" })))
}

// ========== Places ==========

pub async fn list_places(
    State(state): State<SharedState>,
    Query(filter): Query<PlaceFilter>,
) -> ApiResult<Json<PlaceListing>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).list_places(&filter)?))
}

pub async fn show_place(
    State(state): State<SharedState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<PlaceDetail>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).show_place(id)?))
}

pub async fn create_place(
    State(state): State<SharedState>,
    caller: Caller,
    body: RequestBody,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body.into_input()?;
    let store = state.store.lock().await;
    let place = RecordMutator::new(&store).create_place(&input)?;
    let detail = QueryEngine::new(&store).show_place(place.id)?;
    tracing::debug!(caller = %caller.name, id = place.id, "place create");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Place created successfully", "data": detail })),
    ))
}

pub async fn update_place(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
    body: RequestBody,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    store.get_place(id)?.ok_or_else(|| Error::not_found("Place", id))?;
    let input = body.into_input()?;
    let place = RecordMutator::new(&store).update_place(id, &input)?;
    let detail = QueryEngine::new(&store).show_place(place.id)?;
    tracing::debug!(caller = %caller.name, id, "place update");
    Ok(Json(json!({ "message": "Place updated successfully", "data": detail })))
}

pub async fn delete_place(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    RecordMutator::new(&store).delete_place(id)?;
    tracing::debug!(caller = %caller.name, id, "place delete");
    Ok(Json(json!({ "message": "Place deleted successfully" })))
}

// ========== Postal codes ==========

pub async fn list_postal_codes(
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<PostalCodeDetail>>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).list_postal_codes()?))
}

pub async fn show_postal_code(
    State(state): State<SharedState>,
    RecordId(id): RecordId,
) -> ApiResult<Json<PostalCodeDetail>> {
    let store = state.store.lock().await;
    Ok(Json(QueryEngine::new(&store).show_postal_code(id)?))
}

pub async fn create_postal_code(
    State(state): State<SharedState>,
    caller: Caller,
    body: RequestBody,
) -> ApiResult<(StatusCode, Json<PostalCode>)> {
    let input = body.into_input()?;
    let store = state.store.lock().await;
    let code = RecordMutator::new(&store).create_postal_code(&input)?;
    tracing::debug!(caller = %caller.name, id = code.id, "postal code create");
    Ok((StatusCode::CREATED, Json(code)))
}

pub async fn update_postal_code(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
    body: RequestBody,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    store.get_postal_code(id)?.ok_or_else(|| Error::not_found("PostalCode", id))?;
    let input = body.into_input()?;
    let code = RecordMutator::new(&store).update_postal_code(id, &input)?;
    let detail = QueryEngine::new(&store).show_postal_code(code.id)?;
    tracing::debug!(caller = %caller.name, id, "postal code update");
    Ok(Json(json!({ "message": "Postal code updated successfully", "data": detail })))
}

pub async fn delete_postal_code(
    State(state): State<SharedState>,
    caller: Caller,
    RecordId(id): RecordId,
) -> ApiResult<Json<Value>> {
    let store = state.store.lock().await;
    RecordMutator::new(&store).delete_postal_code(id)?;
    tracing::debug!(caller = %caller.name, id, "postal code delete");
    Ok(Json(json!({ "message": "Deleted successfully" })))
}
