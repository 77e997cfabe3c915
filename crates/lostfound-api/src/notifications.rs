use axum::{
    Extension, Json,
    extract::{Query, State},
};
use tracing::debug;
use uuid::Uuid;

use lostfound_matching::NotificationLedger;
use lostfound_types::api::{Claims, NotificationQuery, NotificationResponse};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Match notifications for the caller's lost reports, newest first.
///
/// Entries not yet seen are flagged `is_new` and marked delivered by this read.
pub async fn get_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let db = state.db.clone();
    let owner = claims.sub;
    let rows = tokio::task::spawn_blocking(move || db.list_for_user(&owner, query.unseen))
        .await?
        .map_err(|e| ApiError::internal("notification listing failed", e))?;

    let unseen: Vec<Uuid> = rows
        .iter()
        .filter(|r| !r.notification.delivered)
        .map(|r| r.notification.id)
        .collect();

    let response: Vec<NotificationResponse> = rows
        .into_iter()
        .map(|row| NotificationResponse {
            id: row.notification.id,
            kind: "match",
            score: row.notification.score,
            vector_score: row.notification.score,
            created_at: row.notification.created_at,
            is_new: !row.notification.delivered,
            match_method: row.notification.match_method,
            lost_item: row.lost_item.into(),
            found_item: row.found_item.into(),
        })
        .collect();

    if !unseen.is_empty() {
        let db = state.db.clone();
        let marked = tokio::task::spawn_blocking(move || db.mark_delivered(&unseen))
            .await?
            .map_err(|e| ApiError::internal("marking notifications failed", e))?;
        debug!("Delivered {} notifications to {}", marked, owner);
    }

    Ok(Json(response))
}
