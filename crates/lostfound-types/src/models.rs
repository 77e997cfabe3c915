use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope used when the deployment is not partitioned.
pub const DEFAULT_SCOPE: &str = "default";

/// Lost reports accept at most this many image references.
pub const MAX_LOST_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Lost,
    Found,
}

impl ItemKind {
    /// The kind a report of this kind is compared against.
    pub fn opposing(self) -> Self {
        match self {
            Self::Lost => Self::Found,
            Self::Found => Self::Lost,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Found => "found",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lost" => Ok(Self::Lost),
            "found" => Ok(Self::Found),
            other => Err(format!("unknown item kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Open,
    Matched,
    Closed,
}

impl ItemStatus {
    /// Allowed moves: open -> matched -> closed, open -> closed. Never backward.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Matched) | (Self::Open, Self::Closed) | (Self::Matched, Self::Closed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Matched => "matched",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "matched" => Ok(Self::Matched),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown item status '{}'", other)),
        }
    }
}

/// Which embedding signals backed a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Attributes and description text only.
    #[default]
    Text,
    /// Image embeddings, without a text signal.
    Visual,
    Hybrid,
}

impl MatchMethod {
    pub fn from_signals(text: bool, image: bool) -> Self {
        match (text, image) {
            (true, true) => Self::Hybrid,
            (false, true) => Self::Visual,
            _ => Self::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Visual => "visual",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "visual" => Ok(Self::Visual),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown match method '{}'", other)),
        }
    }
}

/// A lost or found submission.
///
/// Both kinds share one shape. `brand`, `serial`, `landmark` and `phone` are
/// only filled for lost reports, `custody` and `consent` only for found ones.
/// `contact` is the owner's email on a lost report and the finder's contact
/// on a found one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub id: Uuid,
    pub kind: ItemKind,
    pub owner_user_id: Uuid,
    pub scope: String,
    pub category: String,
    pub color: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: String,
    pub occurred_on: NaiveDate,
    pub occurred_time: Option<NaiveTime>,
    pub reporter_name: Option<String>,
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub brand: Option<String>,
    pub serial: Option<String>,
    pub landmark: Option<String>,
    pub custody: Option<String>,
    #[serde(default)]
    pub consent: bool,
    pub images: Vec<String>,
    /// Precomputed visual embedding handed over by a vision collaborator.
    /// Not part of the client payload.
    #[serde(skip_serializing, default)]
    pub image_embedding: Option<Vec<f32>>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

impl ItemReport {
    /// Text fed to the embedding provider: name, brand and description,
    /// whichever exist.
    pub fn comparison_text(&self) -> Option<String> {
        let parts: Vec<&str> = [self.name.as_deref(), self.brand.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Durable record of a qualifying lost/found pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNotification {
    pub id: Uuid,
    pub lost_id: Uuid,
    pub found_id: Uuid,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub lost_owner_user_id: Uuid,
    pub match_method: MatchMethod,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
