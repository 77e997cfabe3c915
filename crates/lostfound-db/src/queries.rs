use crate::Database;
use crate::models::{
    ItemRow, NotificationRow, UserRow, encode_embedding, encode_timestamp,
};
use anyhow::Result;
use lostfound_types::models::{ItemKind, ItemReport, ItemStatus, MatchNotification};
use rusqlite::{Connection, Row};
use tracing::warn;
use uuid::Uuid;

const ITEM_FIELDS: &[&str] = &[
    "id",
    "kind",
    "owner_id",
    "scope",
    "category",
    "color",
    "name",
    "description",
    "location",
    "occurred_on",
    "occurred_time",
    "reporter_name",
    "contact",
    "images",
    "image_embedding",
    "status",
    "created_at",
    "phone",
    "brand",
    "serial",
    "landmark",
    "custody",
    "consent",
];

const NOTIFICATION_FIELDS: &[&str] = &[
    "id",
    "lost_id",
    "found_id",
    "score",
    "lost_owner_id",
    "delivered",
    "created_at",
    "match_method",
];

fn columns(fields: &[&str], alias: &str) -> String {
    fields
        .iter()
        .map(|f| format!("{}.{}", alias, f))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A notification joined with both sides of the pair.
pub struct NotificationWithItems {
    pub notification: MatchNotification,
    pub lost_item: ItemReport,
    pub found_item: ItemReport,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        let now = encode_timestamp(&chrono::Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, email, password_hash, now.as_str()),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Items --

    pub fn insert_item(&self, report: &ItemReport) -> Result<()> {
        let images = serde_json::to_string(&report.images)?;
        let embedding = report.image_embedding.as_deref().map(encode_embedding);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO items (id, kind, owner_id, scope, category, color, name, description,
                                    location, occurred_on, occurred_time, reporter_name, contact,
                                    images, image_embedding, status, created_at,
                                    phone, brand, serial, landmark, custody, consent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                         ?18, ?19, ?20, ?21, ?22, ?23)",
                rusqlite::params![
                    report.id.to_string(),
                    report.kind.as_str(),
                    report.owner_user_id.to_string(),
                    report.scope,
                    report.category,
                    report.color,
                    report.name,
                    report.description,
                    report.location,
                    report.occurred_on.format("%Y-%m-%d").to_string(),
                    report.occurred_time.map(|t| t.format("%H:%M:%S").to_string()),
                    report.reporter_name,
                    report.contact,
                    images,
                    embedding,
                    report.status.as_str(),
                    encode_timestamp(&report.created_at),
                    report.phone,
                    report.brand,
                    report.serial,
                    report.landmark,
                    report.custody,
                    report.consent,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_item(&self, id: &Uuid) -> Result<Option<ItemReport>> {
        let row = self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM items i WHERE i.id = ?1", columns(ITEM_FIELDS, "i"));
            conn.query_row(&sql, [id.to_string()], |row| map_item(row, 0))
                .optional()
        })?;

        row.map(ItemRow::into_report).transpose()
    }

    /// All reports of one kind, newest first.
    pub fn list_items(&self, kind: ItemKind) -> Result<Vec<ItemReport>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM items i WHERE i.kind = ?1 ORDER BY i.created_at DESC",
                columns(ITEM_FIELDS, "i")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([kind.as_str()], |row| map_item(row, 0))?;
            skip_unreadable(rows, "item")
        })?;

        Ok(convert_skipping_corrupt(rows))
    }

    /// Reports of one kind inside a scope that have never matched. Rows that
    /// fail to decode are logged and left out.
    pub fn open_items(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>> {
        self.items_in_scope(kind, scope, "i.status = 'open'")
    }

    /// Reports of one kind inside a scope that can still take part in a
    /// match: open ones and ones that already matched something else.
    pub fn eligible_items(&self, kind: ItemKind, scope: &str) -> Result<Vec<ItemReport>> {
        self.items_in_scope(kind, scope, "i.status IN ('open', 'matched')")
    }

    fn items_in_scope(&self, kind: ItemKind, scope: &str, status_filter: &str) -> Result<Vec<ItemReport>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM items i
                 WHERE i.kind = ?1 AND i.scope = ?2 AND {}
                 ORDER BY i.created_at DESC",
                columns(ITEM_FIELDS, "i"),
                status_filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([kind.as_str(), scope], |row| map_item(row, 0))?;
            skip_unreadable(rows, "item")
        })?;

        Ok(convert_skipping_corrupt(rows))
    }

    pub fn open_item_scopes(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT scope FROM items WHERE status = 'open' ORDER BY scope")?;
            let scopes = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(scopes)
        })
    }

    /// Compare-and-set on `status`. Returns false when the row was not in
    /// `expected` (or does not exist).
    pub fn update_item_status(&self, id: &Uuid, expected: ItemStatus, new: ItemStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE items SET status = ?1 WHERE id = ?2 AND status = ?3",
                rusqlite::params![new.as_str(), id.to_string(), expected.as_str()],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Match notifications --

    /// Inserts the notification unless the pair already has one. Returns
    /// whether a row was created, together with the stored row (which is the
    /// pre-existing one on conflict).
    pub fn insert_notification(&self, notification: &MatchNotification) -> Result<(bool, MatchNotification)> {
        let row = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let created = tx.execute(
                "INSERT INTO match_notifications
                     (id, lost_id, found_id, score, lost_owner_id, delivered, created_at, match_method)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(lost_id, found_id) DO NOTHING",
                rusqlite::params![
                    notification.id.to_string(),
                    notification.lost_id.to_string(),
                    notification.found_id.to_string(),
                    notification.score,
                    notification.lost_owner_user_id.to_string(),
                    notification.delivered,
                    encode_timestamp(&notification.created_at),
                    notification.match_method.as_str(),
                ],
            )? == 1;

            let sql = format!(
                "SELECT {} FROM match_notifications n WHERE n.lost_id = ?1 AND n.found_id = ?2",
                columns(NOTIFICATION_FIELDS, "n")
            );
            let stored = tx.query_row(
                &sql,
                [notification.lost_id.to_string(), notification.found_id.to_string()],
                |row| map_notification(row, 0),
            )?;
            tx.commit()?;
            Ok((created, stored))
        })?;

        let (created, stored) = row;
        Ok((created, stored.into_notification()?))
    }

    pub fn get_notification_for_pair(&self, lost_id: &Uuid, found_id: &Uuid) -> Result<Option<MatchNotification>> {
        let row = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM match_notifications n WHERE n.lost_id = ?1 AND n.found_id = ?2",
                columns(NOTIFICATION_FIELDS, "n")
            );
            conn.query_row(&sql, [lost_id.to_string(), found_id.to_string()], |row| {
                map_notification(row, 0)
            })
            .optional()
        })?;

        row.map(NotificationRow::into_notification).transpose()
    }

    pub fn count_notifications(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM match_notifications", [], |r| r.get(0))?)
        })
    }

    /// Notifications owned through the lost side, newest first, each joined
    /// with both reports in a single query.
    pub fn notifications_for_owner(&self, owner_id: &Uuid, unseen_only: bool) -> Result<Vec<NotificationWithItems>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, {}, {}
                 FROM match_notifications n
                 JOIN items l ON l.id = n.lost_id
                 JOIN items f ON f.id = n.found_id
                 WHERE n.lost_owner_id = ?1 AND (?2 = 0 OR n.delivered = 0)
                 ORDER BY n.created_at DESC",
                columns(NOTIFICATION_FIELDS, "n"),
                columns(ITEM_FIELDS, "l"),
                columns(ITEM_FIELDS, "f"),
            );
            let lost_offset = NOTIFICATION_FIELDS.len();
            let found_offset = lost_offset + ITEM_FIELDS.len();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![owner_id.to_string(), unseen_only], |row| {
                Ok((
                    map_notification(row, 0)?,
                    map_item(row, lost_offset)?,
                    map_item(row, found_offset)?,
                ))
            })?;
            skip_unreadable(rows, "notification")
        })?;

        let mut joined = Vec::with_capacity(rows.len());
        for (notification, lost, found) in rows {
            let id = notification.id.clone();
            let decoded = notification.into_notification().and_then(|notification| {
                Ok(NotificationWithItems {
                    notification,
                    lost_item: lost.into_report()?,
                    found_item: found.into_report()?,
                })
            });
            match decoded {
                Ok(entry) => joined.push(entry),
                Err(e) => warn!("Skipping corrupt notification '{}': {}", id, e),
            }
        }
        Ok(joined)
    }

    pub fn mark_notifications_delivered(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "UPDATE match_notifications SET delivered = 1 WHERE delivered = 0 AND id IN ({})",
                placeholders.join(", ")
            );
            let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
            let changed = conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
            Ok(changed)
        })
    }
}

/// Drains a row iterator, logging and dropping rows whose columns do not
/// have the expected SQLite types. Any other error still aborts the query.
fn skip_unreadable<T>(rows: impl Iterator<Item = rusqlite::Result<T>>, what: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        match row {
            Ok(row) => out.push(row),
            Err(
                e @ (rusqlite::Error::InvalidColumnType(..)
                | rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::IntegralValueOutOfRange(..)
                | rusqlite::Error::Utf8Error(..)),
            ) => warn!("Skipping unreadable {} row: {}", what, e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}

fn convert_skipping_corrupt(rows: Vec<ItemRow>) -> Vec<ItemReport> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match row.into_report() {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Skipping corrupt item row '{}': {:#}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_item(row: &Row<'_>, offset: usize) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(offset)?,
        kind: row.get(offset + 1)?,
        owner_id: row.get(offset + 2)?,
        scope: row.get(offset + 3)?,
        category: row.get(offset + 4)?,
        color: row.get(offset + 5)?,
        name: row.get(offset + 6)?,
        description: row.get(offset + 7)?,
        location: row.get(offset + 8)?,
        occurred_on: row.get(offset + 9)?,
        occurred_time: row.get(offset + 10)?,
        reporter_name: row.get(offset + 11)?,
        contact: row.get(offset + 12)?,
        images: row.get(offset + 13)?,
        image_embedding: row.get(offset + 14)?,
        status: row.get(offset + 15)?,
        created_at: row.get(offset + 16)?,
        phone: row.get(offset + 17)?,
        brand: row.get(offset + 18)?,
        serial: row.get(offset + 19)?,
        landmark: row.get(offset + 20)?,
        custody: row.get(offset + 21)?,
        consent: row.get(offset + 22)?,
    })
}

fn map_notification(row: &Row<'_>, offset: usize) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(offset)?,
        lost_id: row.get(offset + 1)?,
        found_id: row.get(offset + 2)?,
        score: row.get(offset + 3)?,
        lost_owner_id: row.get(offset + 4)?,
        delivered: row.get(offset + 5)?,
        created_at: row.get(offset + 6)?,
        match_method: row.get(offset + 7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
