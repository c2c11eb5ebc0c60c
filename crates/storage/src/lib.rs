use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

use shared::domain::{MemoId, ResourceId, RowStatus, UserId, Visibility};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMemo {
    pub memo_id: MemoId,
    pub creator_id: UserId,
    pub creator_name: String,
    pub created_ts: i64,
    pub updated_ts: i64,
    pub row_status: RowStatus,
    pub visibility: Visibility,
    pub pinned: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub resource_id: ResourceId,
    pub public_id: String,
    pub memo_id: Option<MemoId>,
    pub filename: String,
    pub external_link: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct NewMemo<'a> {
    pub creator_id: UserId,
    pub content: &'a str,
    pub visibility: Visibility,
    /// Defaults to the current time when unset.
    pub created_ts: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewResource<'a> {
    pub creator_id: UserId,
    pub memo_id: Option<MemoId>,
    pub filename: &'a str,
    pub external_link: &'a str,
    pub mime_type: &'a str,
    pub size: u64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(anyhow!("username cannot be empty"));
        }
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn username_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn create_memo(&self, memo: &NewMemo<'_>) -> Result<MemoId> {
        let created_ts = memo.created_ts.unwrap_or_else(|| Utc::now().timestamp());
        let rec = sqlx::query(
            "INSERT INTO memos (creator_id, created_ts, updated_ts, visibility, content)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(memo.creator_id.0)
        .bind(created_ts)
        .bind(created_ts)
        .bind(memo.visibility.as_str())
        .bind(memo.content)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert memo for user {}", memo.creator_id))?;
        Ok(MemoId(rec.get::<i64, _>(0)))
    }

    pub async fn find_memo(&self, memo_id: MemoId) -> Result<Option<StoredMemo>> {
        let row = sqlx::query(
            "SELECT m.id, m.creator_id, u.username, m.created_ts, m.updated_ts,
                    m.row_status, m.visibility, m.pinned, m.content
             FROM memos m
             JOIN users u ON u.id = m.creator_id
             WHERE m.id = ?",
        )
        .bind(memo_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| stored_memo_from_row(&r)).transpose()
    }

    /// Public, non-archived memos, newest first, optionally for one creator.
    pub async fn list_public_memos(
        &self,
        creator_id: Option<UserId>,
        limit: i64,
    ) -> Result<Vec<StoredMemo>> {
        let creator_id = creator_id.map(|id| id.0);
        let rows = sqlx::query(
            "SELECT m.id, m.creator_id, u.username, m.created_ts, m.updated_ts,
                    m.row_status, m.visibility, m.pinned, m.content
             FROM memos m
             JOIN users u ON u.id = m.creator_id
             WHERE m.row_status = ? AND m.visibility = ?
               AND (? IS NULL OR m.creator_id = ?)
             ORDER BY m.created_ts DESC, m.id DESC
             LIMIT ?",
        )
        .bind(RowStatus::Normal.as_str())
        .bind(Visibility::Public.as_str())
        .bind(creator_id)
        .bind(creator_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stored_memo_from_row).collect()
    }

    /// Returns `false` when the memo does not exist.
    pub async fn set_memo_row_status(&self, memo_id: MemoId, status: RowStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE memos SET row_status = ?, updated_ts = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().timestamp())
            .bind(memo_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` when the memo does not exist.
    pub async fn set_memo_pinned(&self, memo_id: MemoId, pinned: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE memos SET pinned = ? WHERE id = ?")
            .bind(pinned)
            .bind(memo_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_resource(&self, resource: &NewResource<'_>) -> Result<StoredResource> {
        let filename = resource.filename.trim();
        if filename.is_empty() {
            return Err(anyhow!("resource filename cannot be empty"));
        }
        let public_id = Uuid::new_v4().to_string();
        let rec = sqlx::query(
            "INSERT INTO resources (public_id, creator_id, memo_id, created_ts, filename, external_link, mime_type, size)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&public_id)
        .bind(resource.creator_id.0)
        .bind(resource.memo_id.map(|id| id.0))
        .bind(Utc::now().timestamp())
        .bind(filename)
        .bind(resource.external_link)
        .bind(resource.mime_type)
        .bind(resource.size as i64)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert resource '{filename}'"))?;

        Ok(StoredResource {
            resource_id: ResourceId(rec.get::<i64, _>(0)),
            public_id,
            memo_id: resource.memo_id,
            filename: filename.to_string(),
            external_link: resource.external_link.to_string(),
            mime_type: resource.mime_type.to_string(),
            size: resource.size,
        })
    }

    pub async fn list_resources_for_memo(&self, memo_id: MemoId) -> Result<Vec<StoredResource>> {
        let rows = sqlx::query(
            "SELECT id, public_id, memo_id, filename, external_link, mime_type, size
             FROM resources
             WHERE memo_id = ?
             ORDER BY id ASC",
        )
        .bind(memo_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StoredResource {
                resource_id: ResourceId(r.get::<i64, _>(0)),
                public_id: r.get::<String, _>(1),
                memo_id: r.get::<Option<i64>, _>(2).map(MemoId),
                filename: r.get::<String, _>(3),
                external_link: r.get::<String, _>(4),
                mime_type: r.get::<String, _>(5),
                size: r.get::<i64, _>(6).max(0) as u64,
            })
            .collect())
    }
}

fn stored_memo_from_row(r: &SqliteRow) -> Result<StoredMemo> {
    let memo_id = MemoId(r.get::<i64, _>(0));
    let row_status = r.get::<String, _>(5);
    let visibility = r.get::<String, _>(6);
    Ok(StoredMemo {
        memo_id,
        creator_id: UserId(r.get::<i64, _>(1)),
        creator_name: r.get::<String, _>(2),
        created_ts: r.get::<i64, _>(3),
        updated_ts: r.get::<i64, _>(4),
        row_status: RowStatus::parse(&row_status)
            .ok_or_else(|| anyhow!("memo {memo_id} has unknown row status '{row_status}'"))?,
        visibility: Visibility::parse(&visibility)
            .ok_or_else(|| anyhow!("memo {memo_id} has unknown visibility '{visibility}'"))?,
        pinned: r.get::<bool, _>(7),
        content: r.get::<String, _>(8),
    })
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
