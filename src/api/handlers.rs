use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{EmptyReason, Recommendation, RecommendationReport, RunSummary};
use crate::services::{report::store_link, RunOptions};

use super::AppState;

// Request/Response types

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    /// Ignore the stored snapshot and refetch every friend
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendationEntry {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub store_url: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<RecommendationEntry>,
    pub summary: RunSummary,
    pub empty_reason: Option<EmptyReason>,
}

impl RecommendationResponse {
    fn from_report(report: RecommendationReport, store_url: &str) -> Self {
        let recommendations = report
            .recommendations
            .into_iter()
            .map(|rec| RecommendationEntry {
                store_url: store_link(store_url, rec.id),
                recommendation: rec,
            })
            .collect();

        Self {
            run_id: report.run_id,
            generated_at: report.generated_at,
            recommendations,
            summary: report.summary,
            empty_reason: report.empty_reason,
        }
    }
}

// Handlers

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Runs the recommendation pipeline
///
/// Runs are serialised so two requests never write the same cache at once.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Json<RecommendationResponse> {
    let _guard = state.run_lock.lock().await;

    tracing::info!(fresh = query.fresh, "Processing recommendation request");
    let report = state
        .service
        .run(RunOptions {
            use_cache: !query.fresh,
        })
        .await;

    tracing::info!(
        run_id = %report.run_id,
        recommendations = report.recommendations.len(),
        "Recommendation request completed"
    );

    Json(RecommendationResponse::from_report(report, &state.store_url))
}

/// Drops the stored snapshot so the next run starts from scratch
pub async fn clear_cache(State(state): State<AppState>) -> AppResult<StatusCode> {
    let _guard = state.run_lock.lock().await;
    state.service.store().clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
