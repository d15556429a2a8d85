use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::core::explain::compare_pair;
use crate::core::grouping::GroupingEngine;
use crate::core::ranking::Ranker;
use crate::core::scoring::ScoreBlender;
use crate::core::training::resolve_labels;
use crate::engine::Published;
use crate::error::EngineError;
use crate::models::{
    CompatibilityRequest, ExplainPairRequest, ExplainRequest, GroupingRequest, GroupsRequest, RecommendationRequest,
};
use crate::routes::{find_resident, ApiError, AppState};

/// Configure scoring, grouping and explanation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/compatibility", web::post().to(compatibility))
        .route("/recommendations", web::post().to(recommendations))
        .route("/groups", web::post().to(groups))
        .route("/explain", web::post().to(explain))
        .route("/explain/pair", web::post().to(explain_pair))
        .route("/explain/global", web::get().to(explain_global));
}

/// Blended compatibility of two residents
///
/// POST /api/v1/compatibility
///
/// Request body:
/// ```json
/// { "residentA": 1, "residentB": 2 }
/// ```
async fn compatibility(
    state: web::Data<AppState>,
    req: web::Json<CompatibilityRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let (snapshot, population) = state.population().await?;
    let blender = ScoreBlender::new(&snapshot, &population).with_thresholds(state.settings.scoring.thresholds());

    let result = blender.blend(req.resident_a, req.resident_b)?;
    tracing::debug!(
        a = req.resident_a,
        b = req.resident_b,
        score = result.compatibility_pct,
        "Compatibility computed"
    );
    Ok(HttpResponse::Ok().json(result))
}

/// Best matches for one resident
///
/// POST /api/v1/recommendations
///
/// Request body:
/// ```json
/// { "residentId": 1, "limit": 5 }
/// ```
async fn recommendations(
    state: web::Data<AppState>,
    req: web::Json<RecommendationRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let (snapshot, population) = state.population().await?;
    let blender = ScoreBlender::new(&snapshot, &population).with_thresholds(state.settings.scoring.thresholds());

    let ranked = Ranker::new(state.settings.ranking.limits()).recommend(&blender, req.resident_id, req.limit)?;
    tracing::info!(
        "Returning {} recommendations for resident {}",
        ranked.matches.len(),
        req.resident_id
    );
    Ok(HttpResponse::Ok().json(ranked))
}

/// Partition the population into capacity-bounded groups
///
/// POST /api/v1/groups
///
/// Request body:
/// ```json
/// { "groupCount": 3, "maxSize": 4 }
/// ```
async fn groups(state: web::Data<AppState>, req: web::Json<GroupsRequest>) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let (snapshot, population) = state.population().await?;
    let blender = ScoreBlender::new(&snapshot, &population).with_thresholds(state.settings.scoring.thresholds());

    let grouping = &state.settings.grouping;
    let request = GroupingRequest {
        group_count: req.group_count,
        max_size: req.max_size.unwrap_or(grouping.default_max_size),
    };
    let result = GroupingEngine::new(grouping.n_init, grouping.random_state).form_groups(&blender, request)?;
    tracing::info!(
        groups = result.groups.len(),
        pending = result.pending.len(),
        "Groups formed"
    );
    Ok(HttpResponse::Ok().json(result))
}

/// Explain one classifier decision
///
/// POST /api/v1/explain
///
/// Request body (one of):
/// ```json
/// { "residentId": 1 }
/// { "instance": [0.4, 1.0, 0.0] }
/// ```
async fn explain(state: web::Data<AppState>, req: web::Json<ExplainRequest>) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    let published = state
        .cell
        .current()
        .ok_or_else(|| EngineError::NotInitialized("no trained model".to_string()))?;

    let instance = match (&req.instance, req.resident_id, &published) {
        (Some(instance), _, _) => instance.clone(),
        (None, Some(id), Published::Trained(snapshot)) => {
            let loaded = state.residents().await?;
            snapshot.resident_input(find_resident(&loaded, id)?)
        }
        (None, Some(_), Published::Legacy(_)) => {
            return Err(EngineError::NotInitialized(
                "legacy model cannot encode residents; pass an instance vector".to_string(),
            )
            .into())
        }
        (None, None, _) => {
            return Err(EngineError::InvalidParameter("either residentId or instance is required".to_string()).into())
        }
    };

    let limits = &state.settings.explain;
    let explanation = published
        .explainer()
        .with_limits(limits.top_k, limits.fallback_top)
        .explain(&instance)?;
    Ok(HttpResponse::Ok().json(explanation))
}

/// Side-by-side comparison of the key lifestyle factors of two residents
///
/// POST /api/v1/explain/pair
async fn explain_pair(
    state: web::Data<AppState>,
    req: web::Json<ExplainPairRequest>,
) -> Result<HttpResponse, ApiError> {
    req.validate()?;
    if req.resident_a == req.resident_b {
        return Err(EngineError::InvalidPair(req.resident_a).into());
    }

    let loaded = state.residents().await?;
    let a = find_resident(&loaded, req.resident_a)?;
    let b = find_resident(&loaded, req.resident_b)?;
    Ok(HttpResponse::Ok().json(compare_pair(a, b)))
}

/// Global importance ranking and class patterns
///
/// GET /api/v1/explain/global
async fn explain_global(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let published = state
        .cell
        .current()
        .ok_or_else(|| EngineError::NotInitialized("no trained model".to_string()))?;

    // Patterns need encoded residents, which a legacy model cannot produce
    let (x, y) = match &published {
        Published::Trained(snapshot) => {
            let loaded = state.residents().await?;
            let (labels, _) = resolve_labels(&loaded.residents);
            (snapshot.encoder.transform_all(&loaded.residents), labels)
        }
        Published::Legacy(_) => (Vec::new(), Vec::new()),
    };

    let limits = &state.settings.explain;
    let report = published
        .explainer()
        .with_limits(limits.top_k, limits.fallback_top)
        .global_report(&x, &y);
    Ok(HttpResponse::Ok().json(report))
}
