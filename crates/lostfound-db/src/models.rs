//! Database row types. These map directly to SQLite rows and are converted
//! into `lostfound-types` models at the crate boundary.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use lostfound_types::models::{ItemReport, MatchNotification, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ItemRow {
    pub id: String,
    pub kind: String,
    pub owner_id: String,
    pub scope: String,
    pub category: String,
    pub color: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: String,
    pub occurred_on: String,
    pub occurred_time: Option<String>,
    pub reporter_name: Option<String>,
    pub contact: Option<String>,
    pub images: String,
    pub image_embedding: Option<Vec<u8>>,
    pub status: String,
    pub created_at: String,
    pub phone: Option<String>,
    pub brand: Option<String>,
    pub serial: Option<String>,
    pub landmark: Option<String>,
    pub custody: Option<String>,
    pub consent: bool,
}

pub struct NotificationRow {
    pub id: String,
    pub lost_id: String,
    pub found_id: String,
    pub score: f64,
    pub lost_owner_id: String,
    pub delivered: bool,
    pub created_at: String,
    pub match_method: String,
}

/// Timestamps are stored as RFC 3339 with microseconds so that `ORDER BY`
/// on the text column is chronological.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("bad timestamp '{}'", raw))
}

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id.parse().with_context(|| format!("corrupt user id '{}'", self.id))?,
            username: self.username,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl ItemRow {
    pub fn into_report(self) -> Result<ItemReport> {
        let id: Uuid = self.id.parse().with_context(|| format!("corrupt item id '{}'", self.id))?;

        let images: Vec<String> = serde_json::from_str(&self.images)
            .with_context(|| format!("corrupt images column on item '{}'", id))?;

        let image_embedding = match self.image_embedding {
            Some(bytes) => {
                let decoded = decode_embedding(&bytes);
                if decoded.is_none() {
                    warn!("Ignoring truncated image embedding on item '{}' ({} bytes)", id, bytes.len());
                }
                decoded
            }
            None => None,
        };

        let occurred_time = match self.occurred_time.as_deref() {
            Some(raw) => Some(
                NaiveTime::parse_from_str(raw, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
                    .with_context(|| format!("corrupt occurred_time '{}' on item '{}'", raw, id))?,
            ),
            None => None,
        };

        Ok(ItemReport {
            id,
            kind: self.kind.parse().map_err(|e: String| anyhow!("{} on item '{}'", e, id))?,
            owner_user_id: self
                .owner_id
                .parse()
                .with_context(|| format!("corrupt owner_id '{}' on item '{}'", self.owner_id, id))?,
            scope: self.scope,
            category: self.category,
            color: self.color,
            name: self.name,
            description: self.description,
            location: self.location,
            occurred_on: NaiveDate::parse_from_str(&self.occurred_on, "%Y-%m-%d")
                .with_context(|| format!("corrupt occurred_on '{}' on item '{}'", self.occurred_on, id))?,
            occurred_time,
            reporter_name: self.reporter_name,
            contact: self.contact,
            phone: self.phone,
            brand: self.brand,
            serial: self.serial,
            landmark: self.landmark,
            custody: self.custody,
            consent: self.consent,
            images,
            image_embedding,
            status: self.status.parse().map_err(|e: String| anyhow!("{} on item '{}'", e, id))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<MatchNotification> {
        Ok(MatchNotification {
            id: self.id.parse().with_context(|| format!("corrupt notification id '{}'", self.id))?,
            lost_id: self.lost_id.parse()?,
            found_id: self.found_id.parse()?,
            score: self.score,
            created_at: parse_timestamp(&self.created_at)?,
            lost_owner_user_id: self.lost_owner_id.parse()?,
            match_method: self
                .match_method
                .parse()
                .map_err(|e: String| anyhow!("{} on notification '{}'", e, self.id))?,
            delivered: self.delivered,
        })
    }
}
