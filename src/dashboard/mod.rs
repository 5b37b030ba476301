//! JSON view API: the engine's presentation contract over HTTP.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::db::models::CompositeKey;
use crate::sync::state::EngineView;
use crate::sync::SyncState;
use crate::view::SortOption;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<RwLock<SyncState>>,
}

/// Build the Axum router for the view API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/view", get(view_handler))
        .route("/api/health", get(health_handler))
        .route("/api/filter/sport", put(sport_handler))
        .route("/api/filter/league", put(league_handler))
        .route("/api/search", put(search_handler))
        .route("/api/sort", put(sort_handler))
        .route("/api/favourites/toggle", post(toggle_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /api/view
async fn view_handler(State(state): State<Arc<AppState>>) -> Json<EngineView> {
    Json(state.sync.read().await.view(Utc::now()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    loading: bool,
    last_error: Option<String>,
}

/// GET /api/health
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    let sync = state.sync.read().await;
    Json(Health {
        loading: sync.loading(),
        last_error: sync.last_error().map(str::to_string),
    })
}

#[derive(Deserialize)]
struct SportBody {
    sport: Option<String>,
}

/// PUT /api/filter/sport
async fn sport_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SportBody>,
) -> Json<EngineView> {
    let mut sync = state.sync.write().await;
    sync.set_sport(body.sport);
    Json(sync.view(Utc::now()))
}

#[derive(Deserialize)]
struct LeagueBody {
    league: Option<String>,
}

/// PUT /api/filter/league
async fn league_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LeagueBody>,
) -> Json<EngineView> {
    let mut sync = state.sync.write().await;
    sync.set_league(body.league);
    Json(sync.view(Utc::now()))
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
}

/// PUT /api/search
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchBody>,
) -> Json<EngineView> {
    let mut sync = state.sync.write().await;
    sync.set_search(body.query);
    Json(sync.view(Utc::now()))
}

#[derive(Deserialize)]
struct SortBody {
    sort: SortOption,
}

/// PUT /api/sort
async fn sort_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SortBody>,
) -> Json<EngineView> {
    let mut sync = state.sync.write().await;
    sync.set_sort(body.sort);
    Json(sync.view(Utc::now()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody {
    id: String,
    #[serde(default)]
    match_time: String,
}

#[derive(Serialize)]
struct ToggleResponse {
    key: CompositeKey,
    favourite: bool,
}

/// POST /api/favourites/toggle
async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ToggleBody>,
) -> Json<ToggleResponse> {
    let key = CompositeKey::new(&body.id, &body.match_time);
    let favourite = state.sync.write().await.toggle_favourite(key.clone());
    info!("Favourite {} -> {}", key, favourite);
    Json(ToggleResponse { key, favourite })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::sample;
    use crate::sync::favourites::tests::RecordingStore;
    use crate::sync::FavouritesStore;
    use serde_json::{json, Value};

    async fn serve() -> (String, Arc<RwLock<SyncState>>) {
        let mut sync = SyncState::new(FavouritesStore::load(Arc::new(RecordingStore::default())), 1);
        let mut basket = sample("2", "2024-01-01T00:00:00Z");
        basket.sport = "Basketball".into();
        sync.apply_fetch(Ok(vec![sample("1", "2024-01-01T00:00:00Z"), basket]));
        let sync = Arc::new(RwLock::new(sync));

        let app = router(AppState { sync: sync.clone() });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), sync)
    }

    #[tokio::test]
    async fn view_reflects_auto_selected_sport() {
        let (base, _) = serve().await;
        let view: Value = reqwest::get(format!("{}/api/view", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["selectedSport"], "Football");
        assert_eq!(view["matches"].as_array().unwrap().len(), 1);
        assert_eq!(view["sports"][0]["key"], "Football");
        assert_eq!(view["loading"], false);
    }

    #[tokio::test]
    async fn setters_update_the_view() {
        let (base, sync) = serve().await;
        let client = reqwest::Client::new();

        let view: Value = client
            .put(format!("{}/api/filter/sport", base))
            .json(&json!({ "sport": "Basketball" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["matches"][0]["id"], "2");

        client
            .put(format!("{}/api/sort", base))
            .json(&json!({ "sort": "timeDesc" }))
            .send()
            .await
            .unwrap();
        client
            .put(format!("{}/api/search", base))
            .json(&json!({ "query": "zzz" }))
            .send()
            .await
            .unwrap();

        let guard = sync.read().await;
        assert_eq!(guard.query().sort, SortOption::TimeDesc);
        assert!(guard.view(Utc::now()).matches.is_empty());
    }

    #[tokio::test]
    async fn toggle_returns_composite_key() {
        let (base, sync) = serve().await;
        let client = reqwest::Client::new();
        let body = json!({ "id": "1", "matchTime": "2024-01-01T00:00:00Z" });

        let resp: Value = client
            .post(format!("{}/api/favourites/toggle", base))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["key"], "1_2024-01-01T00:00:00.000Z");
        assert_eq!(resp["favourite"], true);
        assert_eq!(sync.read().await.visible_favourites().len(), 1);
    }

    #[tokio::test]
    async fn bad_sort_value_is_rejected() {
        let (base, _) = serve().await;
        let status = reqwest::Client::new()
            .put(format!("{}/api/sort", base))
            .json(&json!({ "sort": "random" }))
            .send()
            .await
            .unwrap()
            .status();
        assert!(status.is_client_error());
    }
}
