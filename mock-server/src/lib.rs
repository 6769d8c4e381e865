//! In-memory stand-in for a PostgREST service.
//!
//! Tables are created on first insert and hold arbitrary JSON rows. Reads
//! understand `limit`, `offset` and `column=eq.value` filters; every other
//! PostgREST operator is ignored. Two test hooks exist:
//! - requests without a `Bearer` credential are rejected with 401;
//! - an `error=<status>` query parameter forces that status on any route.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};

pub type Db = Arc<RwLock<HashMap<String, Vec<Value>>>>;

type Params = Vec<(String, String)>;

/// Query keys that are never treated as row filters.
const RESERVED_PARAMS: &[&str] = &["select", "limit", "offset", "order", "error"];

pub fn app() -> Router {
    app_with_db(Db::default())
}

pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/", get(root))
        .route(
            "/{table}",
            get(read_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn root(headers: HeaderMap, Query(params): Query<Params>) -> Response {
    if let Err(rejection) = guard(&headers, &params) {
        return rejection;
    }
    (StatusCode::OK, Json(serde_json::json!({ "swagger": "2.0", "paths": {} }))).into_response()
}

async fn read_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = guard(&headers, &params) {
        return rejection;
    }
    let tables = db.read().await;
    let Some(rows) = tables.get(&table) else {
        return status_reply(StatusCode::NOT_FOUND);
    };

    let filters = filters(&params);
    let offset = param(&params, "offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit = param(&params, "limit").and_then(|v| v.parse().ok()).unwrap_or(usize::MAX);
    let selected: Vec<Value> = rows
        .iter()
        .filter(|row| matches_filters(row, &filters))
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();
    (StatusCode::OK, Json(selected)).into_response()
}

async fn insert_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = guard(&headers, &params) {
        return rejection;
    }
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return status_reply(StatusCode::BAD_REQUEST);
    };
    let rows = match &payload {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![payload.clone()],
        _ => return status_reply(StatusCode::BAD_REQUEST),
    };
    db.write().await.entry(table).or_default().extend(rows);

    let wants_representation = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"));
    if wants_representation {
        // Echo in the shape it was sent so clients can decode into the same type.
        return (StatusCode::CREATED, Json(payload)).into_response();
    }
    StatusCode::CREATED.into_response()
}

async fn update_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = guard(&headers, &params) {
        return rejection;
    }
    let Ok(Value::Object(changes)) = serde_json::from_slice::<Value>(&body) else {
        return status_reply(StatusCode::BAD_REQUEST);
    };
    let mut tables = db.write().await;
    let Some(rows) = tables.get_mut(&table) else {
        return status_reply(StatusCode::NOT_FOUND);
    };

    let filters = filters(&params);
    for row in rows.iter_mut().filter(|row| matches_filters(row, &filters)) {
        if let Value::Object(fields) = row {
            for (key, value) in &changes {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = guard(&headers, &params) {
        return rejection;
    }
    let mut tables = db.write().await;
    let Some(rows) = tables.get_mut(&table) else {
        return status_reply(StatusCode::NOT_FOUND);
    };
    let filters = filters(&params);
    rows.retain(|row| !matches_filters(row, &filters));
    StatusCode::NO_CONTENT.into_response()
}

/// Reject unauthenticated requests, then apply the `error` hook.
fn guard(headers: &HeaderMap, params: &Params) -> Result<(), Response> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !token.is_empty());
    if !authorized {
        return Err(status_reply(StatusCode::UNAUTHORIZED));
    }

    let forced = param(params, "error")
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok());
    match forced {
        Some(status) => Err(status_reply(status)),
        None => Ok(()),
    }
}

fn status_reply(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn filters(params: &Params) -> Vec<(&str, &str)> {
    params
        .iter()
        .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
        .filter_map(|(k, v)| v.strip_prefix("eq.").map(|expected| (k.as_str(), expected)))
        .collect()
}

fn matches_filters(row: &Value, filters: &[(&str, &str)]) -> bool {
    filters.iter().all(|(column, expected)| match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}
