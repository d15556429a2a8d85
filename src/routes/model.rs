use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use uuid::Uuid;

use crate::core::fairness::{privacy_check, sensitive_features, FairnessAuditor};
use crate::core::training::{train, TrainingReport};
use crate::engine::Published;
use crate::error::EngineError;
use crate::models::{HealthResponse, HealthStatus, MetricsResponse, TrainResponse};
use crate::routes::{ApiError, AppState};

/// Configure health and model lifecycle routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/model/metrics", web::get().to(model_metrics))
        .route("/model/train", web::post().to(train_model));
}

fn status_of(published: Option<&Published>) -> (HealthStatus, Option<Uuid>) {
    match published {
        Some(Published::Trained(snapshot)) => (HealthStatus::Ready, Some(snapshot.version)),
        Some(Published::Legacy(_)) => (HealthStatus::Legacy, None),
        None => (HealthStatus::Untrained, None),
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let (status, model_version) = status_of(state.cell.current().as_ref());

    HttpResponse::Ok().json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_version,
        cache: state.cache.stats(),
        timestamp: chrono::Utc::now(),
    })
}

/// GET /api/v1/model/metrics
async fn model_metrics(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let published = state
        .cell
        .current()
        .ok_or_else(|| EngineError::NotInitialized("no trained model".to_string()))?;
    let (status, model_version) = status_of(Some(&published));

    Ok(HttpResponse::Ok().json(MetricsResponse {
        status,
        model_version,
        metrics: published.metrics().clone(),
    }))
}

/// Train on the current resident source, persist and publish
///
/// POST /api/v1/model/train
///
/// The previous snapshot keeps serving until the new one is saved; a failed
/// run publishes nothing.
async fn train_model(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // One run at a time; the model directory has a single writer
    let guard = Arc::clone(&state.training).lock_owned().await;

    // Train on fresh records, not whatever the cache holds
    state.cache.invalidate().await;
    let loaded = state.residents().await?;
    tracing::info!(
        residents = loaded.residents.len(),
        rejected = loaded.rejected,
        source = %state.source.describe(),
        "Training requested"
    );

    let config = state.settings.training.to_config();
    let store = state.store.clone();
    let batch = loaded.clone();
    // The guard stays held until every file is written
    let (report, _guard): (TrainingReport, _) = tokio::task::spawn_blocking(move || {
        let report = train(&batch.residents, &config)?;
        store.save(&report.snapshot)?;
        Ok::<_, EngineError>((report, guard))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("training task failed: {}", e)))??;

    let predictions = report.snapshot.predict_residents(&loaded.residents);
    let bias = FairnessAuditor::new(state.settings.fairness.thresholds()).analyze(
        &report.labels,
        &predictions,
        &sensitive_features(&loaded.residents),
    )?;
    if bias.bias_detected {
        tracing::warn!(recommendations = ?bias.recommendations, "Bias detected in trained classifier");
    }
    let privacy = privacy_check(loaded.columns.as_slice());

    let TrainingReport {
        snapshot,
        label_source,
        ..
    } = report;
    let metrics = snapshot.metrics.clone();
    let snapshot = state.cell.publish(snapshot);

    Ok(HttpResponse::Ok().json(TrainResponse {
        model_version: snapshot.version,
        samples: loaded.residents.len(),
        rejected: loaded.rejected,
        label_source,
        metrics,
        bias,
        privacy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{configure_routes, test_support};
    use crate::services::LoadOutcome;
    use actix_web::{test, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_health_reports_untrained() {
        let (state, _dir) = test_support::state();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "untrained");
        assert!(body["modelVersion"].is_null());
        assert_eq!(body["cache"]["entries"], 0);
    }

    #[actix_web::test]
    async fn test_metrics_before_training_is_conflict() {
        let (state, _dir) = test_support::state();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/model/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn test_train_publishes_and_persists() {
        let (state, _dir) = test_support::state();
        let store = state.store.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/v1/model/train").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["samples"], 24);
        assert_eq!(body["labelSource"], "rule_based");
        assert!(body["bias"]["attributes"].get("gender").is_some());
        assert_eq!(body["privacy"]["piiDetected"], true);

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let health: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health["status"], "ready");
        assert_eq!(health["modelVersion"], body["modelVersion"]);

        assert!(matches!(store.load().unwrap(), LoadOutcome::Current(_)));
    }

    #[actix_web::test]
    async fn test_concurrent_training_leaves_consistent_store() {
        let (state, _dir) = test_support::state();
        let store = state.store.clone();
        let cell = Arc::clone(&state.cell);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let first = test::TestRequest::post().uri("/api/v1/model/train").to_request();
        let second = test::TestRequest::post().uri("/api/v1/model/train").to_request();
        let (a, b) = tokio::join!(test::call_service(&app, first), test::call_service(&app, second));
        assert!(a.status().is_success());
        assert!(b.status().is_success());

        let published = cell.trained().unwrap();
        let persisted = match store.load().unwrap() {
            LoadOutcome::Current(snapshot) => snapshot,
            other => panic!("expected current snapshot, got {:?}", other),
        };
        assert_eq!(persisted.version, published.version);
        assert_eq!(persisted.trained_at, published.trained_at);
        assert_eq!(persisted.feature_names, published.feature_names);
        assert!(state.training.try_lock().is_ok());
    }
}
