//! Demonstration HTTP API (not part of the core — see lib.rs docs).
//! Follows the same `AppState`/`Arc<Mutex<..>>` shape used elsewhere in
//! this crate's demo harnesses, minus the HTML rendering: this is a thin
//! JSON surface over `compose_session` so the crate is runnable end to
//! end without a real persistence layer.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::composer::{
    self, ComposeOptions, NewContentCriteria, SessionCompositionConfig, SessionCompositionResult,
    WeakAreaCriteria,
};
use crate::curriculum::{CompetencyArea, GradeRange, SkillProgress};
use crate::registry::TemplateRegistry;
use crate::rng::Xorshift64Rng;

struct AppState {
    registry: TemplateRegistry,
    skills: Vec<SkillProgress>,
}

type SharedState = Arc<Mutex<AppState>>;

/// Request body for `POST /compose`. `grade_range`/`competency_area_id`
/// arrive as strings and are parsed server-side, matching the registry's
/// own string-in, typed-enum-out validation style.
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub user_id: String,
    pub grade_range: String,
    pub competency_area_id: Option<String>,
    pub config: SessionCompositionConfig,
    pub new_content_criteria: NewContentCriteria,
    pub weak_area_criteria: WeakAreaCriteria,
    pub seed: u64,
}

async fn health() -> &'static str {
    "ok"
}

async fn compose_handler(
    State(state): State<SharedState>,
    Json(req): Json<ComposeRequest>,
) -> Json<SessionCompositionResult> {
    let st = state.lock().await;

    let Some(grade_range) = GradeRange::parse(&req.grade_range) else {
        return Json(SessionCompositionResult::Error {
            message: format!("invalid grade_range: {}", req.grade_range),
        });
    };
    let competency_area_id = match req.competency_area_id.as_deref() {
        Some(raw) => match CompetencyArea::parse(raw) {
            Some(area) => Some(area),
            None => {
                return Json(SessionCompositionResult::Error {
                    message: format!("invalid competency_area_id: {raw}"),
                });
            }
        },
        None => None,
    };

    let mut rng = Xorshift64Rng::new(req.seed);
    let result = composer::compose_session(ComposeOptions {
        user_id: req.user_id,
        grade_range,
        competency_area_id,
        config: req.config,
        new_content_criteria: req.new_content_criteria,
        weak_area_criteria: req.weak_area_criteria,
        skills: &st.skills,
        registry: &st.registry,
        now: Utc::now(),
        rng: &mut rng,
    });

    tracing::info!(?grade_range, "handled /compose request");
    Json(result)
}

pub async fn serve(port: u16) {
    let (registry, skills) = crate::demo::build_demo_catalog();
    let state: SharedState = Arc::new(Mutex::new(AppState { registry, skills }));

    let app = Router::new()
        .route("/health", get(health))
        .route("/compose", post(compose_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, "starting mathpractice demonstration server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));
    axum::serve(listener, app)
        .await
        .expect("server exited unexpectedly");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let (registry, skills) = crate::demo::build_demo_catalog();
        let state: SharedState = Arc::new(Mutex::new(AppState { registry, skills }));
        Router::new()
            .route("/health", get(health))
            .route("/compose", post(compose_handler))
            .with_state(state)
    }

    #[tokio::test]
    async fn health_check_responds_ok() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn compose_endpoint_returns_a_plan() {
        let body = serde_json::json!({
            "user_id": "demo-user",
            "grade_range": "4-6",
            "competency_area_id": null,
            "config": {
                "new_content_percent": 40,
                "review_content_percent": 30,
                "weak_area_percent": 20,
                "random_percent": 10,
                "total_exercises": 20
            },
            "new_content_criteria": {
                "max_attempts": 3,
                "min_days_since_last_practice": 14.0
            },
            "weak_area_criteria": {
                "max_mastery_level": 40.0,
                "min_attempts": 3
            },
            "seed": 7
        });

        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/compose")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn compose_endpoint_rejects_bad_grade_range() {
        let body = serde_json::json!({
            "user_id": "demo-user",
            "grade_range": "not-a-grade",
            "competency_area_id": null,
            "config": {
                "new_content_percent": 40,
                "review_content_percent": 30,
                "weak_area_percent": 20,
                "random_percent": 10,
                "total_exercises": 20
            },
            "new_content_criteria": {
                "max_attempts": 3,
                "min_days_since_last_practice": 14.0
            },
            "weak_area_criteria": {
                "max_mastery_level": 40.0,
                "min_attempts": 3
            },
            "seed": 7
        });

        let response = router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/compose")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["status"], "error");
    }
}
