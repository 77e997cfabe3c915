use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use lostfound_matching::{ItemStore, MatchError, StatusUpdate};
use lostfound_types::api::{
    Claims, FoundItemView, LostItemView, MessageBody, ReportCreatedResponse, ReportFoundRequest,
    ReportLostRequest,
};
use lostfound_types::models::{
    DEFAULT_SCOPE, ItemKind, ItemReport, ItemStatus, MAX_LOST_IMAGES,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn report_lost(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReportLostRequest>,
) -> ApiResult<impl IntoResponse> {
    let category = required(req.category)?;
    let name = required(req.name)?;
    let occurred_on = parse_date(&required(req.date)?)?;
    let location = required(req.location)?;
    let occurred_time = match non_empty(req.time) {
        Some(raw) => Some(parse_time(&raw)?),
        None => None,
    };

    let images = clean_images(req.images);
    if images.len() > MAX_LOST_IMAGES {
        return Err(ApiError::BadRequest(format!(
            "At most {} images per lost report",
            MAX_LOST_IMAGES
        )));
    }

    let report = ItemReport {
        id: Uuid::new_v4(),
        kind: ItemKind::Lost,
        owner_user_id: claims.sub,
        scope: scope_or_default(req.scope),
        category,
        color: non_empty(req.color).unwrap_or_default(),
        name: Some(name),
        description: non_empty(req.description),
        location,
        occurred_on,
        occurred_time,
        reporter_name: non_empty(req.owner_name),
        contact: non_empty(req.email),
        phone: non_empty(req.phone),
        brand: non_empty(req.brand),
        serial: non_empty(req.serial),
        landmark: non_empty(req.landmark),
        images,
        status: ItemStatus::Open,
        created_at: Utc::now(),
        ..Default::default()
    };

    submit(state, report, "Lost item reported").await
}

pub async fn report_found(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReportFoundRequest>,
) -> ApiResult<impl IntoResponse> {
    let category = required(req.category)?;
    let description = required(req.description)?;
    let color = required(req.color)?;
    let occurred_on = parse_date(&required(req.date_found)?)?;
    let location = required(req.location_found)?;

    let report = ItemReport {
        id: Uuid::new_v4(),
        kind: ItemKind::Found,
        owner_user_id: claims.sub,
        scope: scope_or_default(req.scope),
        category,
        color,
        name: None,
        description: Some(description),
        location,
        occurred_on,
        reporter_name: non_empty(req.finder_name),
        contact: non_empty(req.contact),
        custody: non_empty(req.custody),
        consent: req.consent,
        images: clean_images(req.images),
        status: ItemStatus::Open,
        created_at: Utc::now(),
        ..Default::default()
    };

    submit(state, report, "Found item reported").await
}

/// Persists the report, then evaluates it against the opposing pool before
/// answering. The report stays stored even when evaluation fails.
async fn submit(
    state: AppState,
    report: ItemReport,
    msg: &str,
) -> ApiResult<(StatusCode, Json<ReportCreatedResponse>)> {
    let db = state.db.clone();
    let stored = report.clone();
    tokio::task::spawn_blocking(move || db.insert_item(&stored))
        .await?
        .map_err(|e| ApiError::internal("item insert failed", e))?;

    info!(
        "{} report {} filed by {} in scope '{}'",
        report.kind, report.id, report.owner_user_id, report.scope
    );

    let matches = match state.evaluator.evaluate(&report, &report.scope).await {
        Ok(candidates) => candidates.len(),
        Err(MatchError::InvalidReport { id, reason }) => {
            warn!("Report {} was stored but not evaluated: {}", id, reason);
            0
        }
        Err(e) => {
            warn!("Evaluation of report {} failed: {}", report.id, e);
            0
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(ReportCreatedResponse {
            msg: msg.to_string(),
            id: report.id,
            matches,
        }),
    ))
}

pub async fn list_lost(State(state): State<AppState>) -> ApiResult<Json<Vec<LostItemView>>> {
    let items = list(state, ItemKind::Lost).await?;
    Ok(Json(items.into_iter().map(LostItemView::from).collect()))
}

pub async fn list_found(State(state): State<AppState>) -> ApiResult<Json<Vec<FoundItemView>>> {
    let items = list(state, ItemKind::Found).await?;
    Ok(Json(items.into_iter().map(FoundItemView::from).collect()))
}

async fn list(state: AppState, kind: ItemKind) -> ApiResult<Vec<ItemReport>> {
    let db = state.db.clone();
    let items = tokio::task::spawn_blocking(move || db.list_items(kind))
        .await?
        .map_err(|e| ApiError::internal("item listing failed", e))?;
    Ok(items)
}

/// Owner closes a report. Closed reports leave every pool and stop any
/// evaluation pass they trigger.
pub async fn close_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessageBody>> {
    let db = state.db.clone();
    let item = tokio::task::spawn_blocking(move || db.get_item(&item_id))
        .await?
        .map_err(|e| ApiError::internal("item lookup failed", e))?
        .ok_or(ApiError::NotFound)?;

    if item.owner_user_id != claims.sub {
        return Err(ApiError::Forbidden);
    }
    if item.status == ItemStatus::Closed {
        return Err(ApiError::Conflict("Item already closed".into()));
    }

    let db = state.db.clone();
    let prior = item.status;
    let outcome = tokio::task::spawn_blocking(move || db.set_status(&item_id, prior, ItemStatus::Closed))
        .await?
        .map_err(|e| ApiError::internal("status update failed", e))?;

    if outcome == StatusUpdate::Conflict {
        return Err(ApiError::Conflict("Item changed state, retry".into()));
    }

    info!("Report {} closed by owner", item_id);
    Ok(Json(MessageBody {
        msg: "Item closed".into(),
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>) -> ApiResult<String> {
    non_empty(value).ok_or_else(|| ApiError::BadRequest("Missing required fields".into()))
}

fn scope_or_default(scope: Option<String>) -> String {
    non_empty(scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string())
}

fn clean_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

fn parse_time(raw: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest(format!("Invalid time '{}', expected HH:MM", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_missing() {
        assert!(required(Some("  ".into())).is_err());
        assert!(required(None).is_err());
        assert_eq!(required(Some(" Wallet ".into())).unwrap(), "Wallet");
    }

    #[test]
    fn dates_and_times_follow_form_formats() {
        assert_eq!(
            parse_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date("01/03/2024").is_err());
        assert_eq!(
            parse_time("14:30").unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert!(parse_time("2pm").is_err());
    }

    #[test]
    fn scope_defaults_when_blank() {
        assert_eq!(scope_or_default(None), DEFAULT_SCOPE);
        assert_eq!(scope_or_default(Some(" ".into())), DEFAULT_SCOPE);
        assert_eq!(scope_or_default(Some("campus-b".into())), "campus-b");
    }
}
