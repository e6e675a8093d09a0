//! SQLite-backed member collection.
//!
//! Uses prepared statements; ids and timestamps are assigned here, never by callers.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{Member, NewMember};
use crate::store::RecordStore;

/// Local member collection.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all members, newest first.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query(
            "SELECT id, full_name, phone, address, is_team_member, role, created_at FROM members ORDER BY created_at DESC, seq DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(member_from_row).collect()
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        let row = sqlx::query(
            "SELECT id, full_name, phone, address, is_team_member, role, created_at FROM members WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(member_from_row).transpose()
    }

    /// Create a new member.
    pub async fn create_member(&self, request: &NewMember) -> Result<Member, AppError> {
        let request = request.clone().normalized();
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO members (id, full_name, phone, address, is_team_member, role, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(request.is_team_member as i32)
        .bind(&request.role)
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!("Inserted member {}", id);

        Ok(Member {
            id,
            full_name: request.full_name,
            phone: request.phone,
            address: request.address,
            is_team_member: request.is_team_member,
            role: request.role,
            created_at,
        })
    }

    /// Delete a member.
    pub async fn delete_member(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        }

        tracing::debug!("Deleted member {}", id);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list(&self) -> Result<Vec<Member>, AppError> {
        self.list_members().await.map_err(AppError::into_store_error)
    }

    async fn insert(&self, member: &NewMember) -> Result<Member, AppError> {
        self.create_member(member)
            .await
            .map_err(AppError::into_store_error)
    }

    async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.delete_member(id)
            .await
            .map_err(AppError::into_store_error)
    }
}

// Fixed-width UTC text so lexical order in SQLite matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Member, AppError> {
    let is_team_member: i32 = row.get("is_team_member");
    let created_at: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| AppError::Database(format!("Invalid created_at '{}': {}", created_at, e)))?
        .with_timezone(&Utc);

    Ok(Member {
        id: row.get("id"),
        full_name: row.get("full_name"),
        phone: row.get("phone"),
        address: row.get("address"),
        is_team_member: is_team_member != 0,
        role: row.get("role"),
        created_at,
    })
}
