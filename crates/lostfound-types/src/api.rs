use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ItemKind, ItemReport, ItemStatus, MatchMethod, User};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

// -- Reports --

/// Lost report form. Keys follow the client's camelCase form fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLostRequest {
    pub category: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub brand: Option<String>,
    pub serial: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub landmark: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub scope: Option<String>,
}

/// Found report form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFoundRequest {
    pub category: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub date_found: Option<String>,
    pub location_found: Option<String>,
    pub custody: Option<String>,
    pub finder_name: Option<String>,
    pub contact: Option<String>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub images: Vec<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportCreatedResponse {
    pub msg: String,
    pub id: Uuid,
    pub matches: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub msg: String,
}

// -- Report views --

/// A lost report as the client renders it.
#[derive(Debug, Serialize)]
pub struct LostItemView {
    pub id: Uuid,
    pub kind: ItemKind,
    pub scope: String,
    pub category: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: String,
    pub brand: Option<String>,
    pub serial: Option<String>,
    pub date_lost: NaiveDate,
    pub time_lost: Option<NaiveTime>,
    pub location: String,
    pub landmark: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub images: Vec<String>,
    pub user_id: Uuid,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ItemReport> for LostItemView {
    fn from(r: ItemReport) -> Self {
        Self {
            id: r.id,
            kind: r.kind,
            scope: r.scope,
            category: r.category,
            name: r.name,
            description: r.description,
            color: r.color,
            brand: r.brand,
            serial: r.serial,
            date_lost: r.occurred_on,
            time_lost: r.occurred_time,
            location: r.location,
            landmark: r.landmark,
            owner_name: r.reporter_name,
            email: r.contact,
            phone: r.phone,
            images: r.images,
            user_id: r.owner_user_id,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

/// A found report as the client renders it. The finder's account id is not
/// exposed.
#[derive(Debug, Serialize)]
pub struct FoundItemView {
    pub id: Uuid,
    pub kind: ItemKind,
    pub scope: String,
    pub category: String,
    pub description: Option<String>,
    pub color: String,
    pub date_found: NaiveDate,
    pub location_found: String,
    pub custody: Option<String>,
    pub finder_name: Option<String>,
    pub contact: Option<String>,
    pub consent: bool,
    pub images: Vec<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ItemReport> for FoundItemView {
    fn from(r: ItemReport) -> Self {
        Self {
            id: r.id,
            kind: r.kind,
            scope: r.scope,
            category: r.category,
            description: r.description,
            color: r.color,
            date_found: r.occurred_on,
            location_found: r.location,
            custody: r.custody,
            finder_name: r.reporter_name,
            contact: r.contact,
            consent: r.consent,
            images: r.images,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

// -- Notifications --

#[derive(Debug, Deserialize, Default)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unseen: bool,
}

/// One entry of the notification panel.
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub match_method: MatchMethod,
    pub lost_item: LostItemView,
    pub found_item: FoundItemView,
    pub score: f64,
    /// Same value as `score`; the client renders it as a percentage.
    pub vector_score: f64,
    pub created_at: DateTime<Utc>,
    pub is_new: bool,
}
