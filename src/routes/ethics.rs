use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::core::fairness::{
    demographic_rows, ethics_summary, privacy_check, sensitive_features, BiasReport, FairnessAuditor,
};
use crate::core::training::resolve_labels;
use crate::models::BiasResponse;
use crate::routes::{ApiError, AppState};
use crate::services::LoadedResidents;

/// Configure fairness audit routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/ethics/bias", web::get().to(bias))
        .route("/ethics/summary", web::get().to(summary));
}

async fn audit(state: &AppState) -> Result<(BiasResponse, Arc<LoadedResidents>), ApiError> {
    let snapshot = state.cell.trained()?;
    let loaded = state.residents().await?;

    let (labels, _) = resolve_labels(&loaded.residents);
    let predictions = snapshot.predict_residents(&loaded.residents);
    let sensitive = sensitive_features(&loaded.residents);

    let auditor = FairnessAuditor::new(state.settings.fairness.thresholds());
    let bias: BiasReport = auditor.analyze(&labels, &predictions, &sensitive)?;
    let monitoring = auditor.monitor(&predictions, &demographic_rows(&sensitive))?;
    for alert in &monitoring.alerts {
        tracing::warn!("{}", alert);
    }

    Ok((BiasResponse { bias, monitoring }, loaded))
}

/// Bias analysis of the served classifier over the current population
///
/// GET /api/v1/ethics/bias
async fn bias(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let (report, _) = audit(&state).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Ethics score, privacy score and overall compliance
///
/// GET /api/v1/ethics/summary
async fn summary(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let (report, loaded) = audit(&state).await?;
    let privacy = privacy_check(loaded.columns.as_slice());
    Ok(HttpResponse::Ok().json(ethics_summary(
        &report.bias,
        &privacy,
        state.settings.fairness.ethics_minimum,
    )))
}

#[cfg(test)]
mod tests {
    use crate::routes::{configure_routes, test_support};
    use actix_web::{test, web, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_bias_and_summary() {
        let (state, _dir) = test_support::state();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/ethics/bias").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);

        let req = test::TestRequest::post().uri("/api/v1/model/train").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get().uri("/api/v1/ethics/bias").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["monitoring"]["totalPredictions"], 24);
        assert!(body["bias"]["attributes"].get("age_group").is_some());

        let req = test::TestRequest::get().uri("/api/v1/ethics/summary").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let score = body["ethicsScore"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&score));
        assert!(body["privacyScore"].as_f64().unwrap() < 100.0);
    }
}
