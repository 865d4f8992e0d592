//! The remote store: a small HTTP key-value server with the same key space as the local
//! store. One static bearer token, full-replacement PUTs, no merging server-side.

pub mod kv;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    routing::get,
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::utils::time::parse_date_key;

use kv::KvStore;

#[derive(Clone)]
pub struct AppState {
    kv: Arc<KvStore>,
    token: Arc<str>,
}

impl AppState {
    pub fn new(kv: KvStore, token: &str) -> Self {
        Self {
            kv: Arc::new(kv),
            token: token.into(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/api/day/{date}", get(get_day).put(put_day))
        .route("/api/presets", get(get_presets).put(put_presets))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Missing and wrong tokens look the same to the caller.
fn authorize(state: &AppState, auth: Option<&Authorization<Bearer>>) -> Result<(), ApiError> {
    match auth {
        Some(bearer) if bearer.token() == state.token.as_ref() => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )),
    }
}

fn day_key(date: &str) -> Result<String, ApiError> {
    match parse_date_key(date) {
        Some(_) => Ok(format!("day:{date}")),
        None => Err(not_found_error()),
    }
}

fn not_found_error() -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))
}

fn storage_error(e: anyhow::Error) -> ApiError {
    error!("Storage failure {e:?}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Storage failure"})),
    )
}

async fn get_day(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(date): Path<String>,
) -> ApiResult {
    authorize(&state, auth.as_deref())?;
    let key = day_key(&date)?;
    let value = state.kv.get(&key).await.map_err(storage_error)?;
    Ok(Json(
        value.unwrap_or_else(|| json!({"laps": [], "activeLap": null})),
    ))
}

async fn put_day(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(date): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&state, auth.as_deref())?;
    let key = day_key(&date)?;
    state.kv.put(&key, &body).await.map_err(storage_error)?;
    Ok(Json(json!({"ok": true})))
}

async fn get_presets(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> ApiResult {
    authorize(&state, auth.as_deref())?;
    let value = state.kv.get("presets").await.map_err(storage_error)?;
    Ok(Json(value.unwrap_or_else(|| json!([]))))
}

async fn put_presets(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&state, auth.as_deref())?;
    state.kv.put("presets", &body).await.map_err(storage_error)?;
    Ok(Json(json!({"ok": true})))
}

async fn not_found() -> ApiError {
    not_found_error()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::json;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    use super::*;

    const TOKEN: &str = "test-token";

    fn test_router(dir: &TempDir) -> Result<Router> {
        let kv = KvStore::new(dir.path().to_owned())?;
        Ok(router(AppState::new(kv, TOKEN)))
    }

    fn request(method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(v) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unset_day_defaults_to_empty() -> Result<()> {
        let dir = tempdir()?;
        let router = test_router(&dir)?;

        let response = router
            .oneshot(request("GET", "/api/day/2026-03-07", Some(TOKEN), None))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"laps": [], "activeLap": null})
        );
        Ok(())
    }

    #[tokio::test]
    async fn put_then_get_replaces_wholesale() -> Result<()> {
        let dir = tempdir()?;
        let router = test_router(&dir)?;

        let day = json!({"laps": [{"id": "a", "name": "work", "startTime": 0, "endTime": 5, "duration": 5}], "activeLap": null});
        let response = router
            .clone()
            .oneshot(request(
                "PUT",
                "/api/day/2026-03-07",
                Some(TOKEN),
                Some(day.clone()),
            ))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"ok": true}));

        let response = router
            .oneshot(request("GET", "/api/day/2026-03-07", Some(TOKEN), None))
            .await?;
        assert_eq!(body_json(response).await, day);
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_wrong_token_is_unauthorized() -> Result<()> {
        let dir = tempdir()?;
        let router = test_router(&dir)?;

        let response = router
            .clone()
            .oneshot(request("GET", "/api/presets", None, None))
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(request("GET", "/api/presets", Some("nope"), None))
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_date_is_not_found() -> Result<()> {
        let dir = tempdir()?;
        let router = test_router(&dir)?;

        for path in ["/api/day/2026-3-7", "/api/day/today", "/api/nope"] {
            let response = router
                .clone()
                .oneshot(request("GET", path, Some(TOKEN), None))
                .await?;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "for {path}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn presets_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let router = test_router(&dir)?;

        let response = router
            .clone()
            .oneshot(request("GET", "/api/presets", Some(TOKEN), None))
            .await?;
        assert_eq!(body_json(response).await, json!([]));

        let presets = json!(["work", "lunch"]);
        router
            .clone()
            .oneshot(request(
                "PUT",
                "/api/presets",
                Some(TOKEN),
                Some(presets.clone()),
            ))
            .await?;

        let response = router
            .oneshot(request("GET", "/api/presets", Some(TOKEN), None))
            .await?;
        assert_eq!(body_json(response).await, presets);
        Ok(())
    }
}
