use crate::catalog::seconds_until_midnight;
use crate::disclosure::DisclosureError;
use crate::engine::{Answer, Engine};
use crate::hint::{HintError, HintSource};
use crate::query::{QueryError, RawQuery};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

/// How long a response may be cached by browsers and CDNs
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CachePolicy {
    /// The answer can never change
    Immutable,
    /// The answer was picked at random and may differ next time
    Short,
    /// The answer is good until the given number of seconds from now
    For(i64),
}

impl CachePolicy {
    fn headers(self) -> [(HeaderName, HeaderValue); 2] {
        let (shared, cdn) = match self {
            CachePolicy::Immutable => (
                String::from("public, s-maxage=31536000, stale-while-revalidate=86400"),
                String::from("public, max-age=31536000"),
            ),
            CachePolicy::Short => (
                String::from("public, s-maxage=3600, stale-while-revalidate=1800"),
                String::from("public, max-age=3600"),
            ),
            CachePolicy::For(secs) => (
                format!("public, s-maxage={secs}, stale-while-revalidate=3600"),
                format!("public, max-age={secs}"),
            ),
        };
        [
            (header::CACHE_CONTROL, header_value(shared)),
            (CDN_CACHE_CONTROL, header_value(cdn)),
        ]
    }
}

fn header_value(s: String) -> HeaderValue {
    HeaderValue::try_from(s).unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}

/// Build the HTTP interface to `engine`
pub(crate) fn routes(engine: Arc<Engine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    Router::new()
        .route("/api/contexto", get(game_query))
        .route("/api/contexto/games", get(list_games).layer(cors))
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .with_state(engine)
}

async fn game_query(State(engine): State<Arc<Engine>>, Query(raw): Query<RawQuery>) -> Response {
    let query = match engine.validate(raw).await {
        Ok(query) => query,
        Err(e) => {
            let response = error_response(&e);
            if matches!(e, QueryError::Internal(_)) {
                let e = anyhow::Error::new(e);
                tracing::error!("Failed to look up game: {e:#}");
            }
            return response;
        }
    };
    match engine.answer(&query).await {
        Ok(answer) => answer_response(answer),
        Err(e) => {
            let response = error_response(&e);
            if matches!(e, QueryError::Internal(_)) {
                let e = anyhow::Error::new(e);
                tracing::error!(
                    id = query.id,
                    action = query.action.name(),
                    "Failed to answer game query: {e:#}",
                );
            }
            response
        }
    }
}

async fn list_games(State(engine): State<Arc<Engine>>) -> Response {
    match engine.listing().await {
        Ok(listing) => {
            let max_age = seconds_until_midnight(chrono::Utc::now());
            (CachePolicy::For(max_age).headers(), Json(listing)).into_response()
        }
        Err(e) => {
            let response = error_response(&e);
            let e = anyhow::Error::new(e);
            tracing::error!("Failed to list games: {e:#}");
            response
        }
    }
}

fn answer_response(answer: Answer) -> Response {
    match answer {
        Answer::Rank(Some(rank)) => {
            (CachePolicy::Immutable.headers(), Json(json!({ "rank": rank }))).into_response()
        }
        Answer::Rank(None) => (StatusCode::NOT_FOUND, Json(json!({ "rank": null }))).into_response(),
        Answer::Secret(word) => {
            (CachePolicy::Immutable.headers(), Json(json!({ "secretWord": word }))).into_response()
        }
        Answer::Hint(hint) => {
            let policy = match hint.source {
                HintSource::Predefined => CachePolicy::Immutable,
                HintSource::Random => CachePolicy::Short,
            };
            (
                policy.headers(),
                Json(json!({ "hint": hint.word, "rank": hint.rank })),
            )
                .into_response()
        }
        Answer::Closest(words) => (
            CachePolicy::Immutable.headers(),
            Json(json!({ "closestWords": words })),
        )
            .into_response(),
    }
}

fn status(e: &QueryError) -> StatusCode {
    match e {
        QueryError::MissingParameter(_)
        | QueryError::InvalidParameter { .. }
        | QueryError::Hint(HintError::TooClose) => StatusCode::BAD_REQUEST,
        QueryError::GameNotFound(_)
        | QueryError::Hint(HintError::NoCandidate)
        | QueryError::Disclosure(DisclosureError::NoSecret) => StatusCode::NOT_FOUND,
        QueryError::Disclosure(DisclosureError::Unauthorized) => StatusCode::FORBIDDEN,
        QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &QueryError) -> Response {
    (status(e), Json(json!({ "error": e.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG_FILE;
    use crate::store::{testing::data_dir, RankingStore, DEFAULT_CAPACITY};
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::Value;
    use tower::ServiceExt;

    const GAME: &str = r#"{"rank_map": {"mèo": 1, "chó": 2, "gà": 500, "hoá": 1200}}"#;
    const HINTED_GAME: &str = r#"{"rank_map": {"mèo": 1, "chó": 2, "gà": 500}, "hints": [500]}"#;

    struct TestResponse {
        status: StatusCode,
        cache_control: Option<String>,
        body: Value,
    }

    async fn get(dir: &tempfile::TempDir, uri: &str) -> TestResponse {
        let engine = Engine::with_rng(
            RankingStore::new(dir.path(), DEFAULT_CAPACITY),
            StdRng::seed_from_u64(42),
        );
        let response = routes(Arc::new(engine))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap();
        TestResponse {
            status,
            cache_control,
            body,
        }
    }

    fn immutable() -> Option<String> {
        Some(String::from(
            "public, s-maxage=31536000, stale-while-revalidate=86400",
        ))
    }

    #[tokio::test]
    async fn test_guess() {
        let tmp = data_dir(&[GAME]);
        let r = get(&tmp, "/api/contexto?id=1&guess=M%C3%88O").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(r.body, json!({"rank": 1}));
        assert_eq!(r.cache_control, immutable());
    }

    #[tokio::test]
    async fn test_guess_not_ranked() {
        let tmp = data_dir(&[GAME]);
        let r = get(&tmp, "/api/contexto?id=1&guess=meo").await;
        assert_eq!(r.status, StatusCode::NOT_FOUND);
        assert_eq!(r.body, json!({"rank": null}));
        assert_eq!(r.cache_control, None);
    }

    #[tokio::test]
    async fn test_bad_parameters() {
        let tmp = data_dir(&[GAME]);
        for uri in [
            "/api/contexto?guess=x",
            "/api/contexto?id=abc&guess=x",
            "/api/contexto?id=1",
            "/api/contexto?id=1&closest=true",
            "/api/contexto?id=1&hint=true&lowestRank=many",
        ] {
            let r = get(&tmp, uri).await;
            assert_eq!(r.status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(r.body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_unknown_game() {
        let tmp = data_dir(&[GAME]);
        for uri in [
            "/api/contexto?id=7&guess=x",
            "/api/contexto?id=7&secret=true",
            "/api/contexto?id=7&hint=true",
            "/api/contexto?id=7&closest=true&guess=x",
            "/api/contexto?id=7",
            "/api/contexto?id=7&closest=true",
            "/api/contexto?id=7&hint=true&lowestRank=many",
        ] {
            let r = get(&tmp, uri).await;
            assert_eq!(r.status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(r.body, json!({"error": "game not found"}));
        }
    }

    #[tokio::test]
    async fn test_secret() {
        let tmp = data_dir(&[GAME]);
        let r = get(&tmp, "/api/contexto?id=1&secret=true&hint=true").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(r.body, json!({"secretWord": "mèo"}));
        assert_eq!(r.cache_control, immutable());
    }

    #[tokio::test]
    async fn test_hints() {
        let tmp = data_dir(&[GAME, HINTED_GAME]);
        let r = get(&tmp, "/api/contexto?id=1&hint=true").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(r.body, json!({"hint": "hoá", "rank": 1200}));
        assert_eq!(
            r.cache_control.as_deref(),
            Some("public, s-maxage=3600, stale-while-revalidate=1800")
        );
        let r = get(&tmp, "/api/contexto?id=2&hint=true&lowestRank=800").await;
        assert_eq!(r.body, json!({"hint": "gà", "rank": 500}));
        assert_eq!(r.cache_control, immutable());
        let r = get(&tmp, "/api/contexto?id=1&hint=true&lowestRank=2").await;
        assert_eq!(r.status, StatusCode::BAD_REQUEST);
        assert!(r.body["error"].is_string());
        let r = get(&tmp, "/api/contexto?id=1&hint=true&lowestRank=40").await;
        assert_eq!(r.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_closest() {
        let tmp = data_dir(&[GAME]);
        let r = get(&tmp, "/api/contexto?id=1&closest=true&guess=ch%C3%B3").await;
        assert_eq!(r.status, StatusCode::FORBIDDEN);
        let r = get(&tmp, "/api/contexto?id=1&closest=true&guess=m%C3%A8o").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(
            r.body,
            json!({"closestWords": [
                {"word": "mèo", "rank": 1},
                {"word": "chó", "rank": 2},
                {"word": "gà", "rank": 500},
                {"word": "hoá", "rank": 1200},
            ]})
        );
        assert_eq!(r.cache_control, immutable());
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let tmp = data_dir(&["{"]);
        let r = get(&tmp, "/api/contexto?id=1&guess=x").await;
        assert_eq!(r.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(r.body, json!({"error": "failed to read game data"}));
    }

    #[tokio::test]
    async fn test_list_games() {
        let tmp = data_dir(&[GAME, GAME]);
        let r = get(&tmp, "/api/contexto/games").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(
            r.body,
            json!({"games": {
                "1": {"createdAt": "2025-01-01"},
                "2": {"createdAt": "2025-01-02"},
            }})
        );
        let cache_control = r.cache_control.unwrap();
        assert!(cache_control.starts_with("public, s-maxage="), "{cache_control}");
        assert!(cache_control.ends_with(", stale-while-revalidate=3600"), "{cache_control}");
    }

    #[tokio::test]
    async fn test_list_games_after_indexing() {
        let tmp = data_dir(&[GAME]);
        let app = routes(Arc::new(Engine::new(RankingStore::new(
            tmp.path(),
            DEFAULT_CAPACITY,
        ))));
        let list = |app: Router| async move {
            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/api/contexto/games")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice::<Value>(&bytes).unwrap()
        };
        assert_eq!(
            list(app.clone()).await,
            json!({"games": {"1": {"createdAt": "2025-01-01"}}})
        );
        std::fs::write(
            tmp.path().join(CATALOG_FILE),
            r#"{
                "1": {"slug": "game-1", "createdAt": "2025-01-01"},
                "2": {"slug": "game-2", "createdAt": "2025-01-02"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            list(app).await,
            json!({"games": {
                "1": {"createdAt": "2025-01-01"},
                "2": {"createdAt": "2025-01-02"},
            }})
        );
    }

    #[tokio::test]
    async fn test_list_games_preflight() {
        let tmp = data_dir(&[GAME]);
        let engine = Engine::new(RankingStore::new(tmp.path(), DEFAULT_CAPACITY));
        let response = routes(Arc::new(engine))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/contexto/games")
                    .header(header::ORIGIN, "https://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let r = get(&tmp, "/health").await;
        assert_eq!(r.status, StatusCode::OK);
        assert_eq!(r.body, json!({"status": "ok"}));
    }
}
