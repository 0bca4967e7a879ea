//! Artifact version repository
//!
//! - insert: plain INSERT, the UNIQUE key rejects duplicate numbers
//! - latest: ORDER BY version_number DESC LIMIT 1 on the covering index

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use sitecraft_core::artifact::ArtifactVersion;
use sitecraft_core::error::{Result as CoreResult, SiteError};
use sitecraft_core::version::VersionStore;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("version {version} already exists for conversation '{conversation_id}'")]
    Conflict {
        conversation_id: String,
        version: i32,
    },
}

impl From<DbError> for SiteError {
    fn from(e: DbError) -> Self {
        SiteError::persistence(e.to_string())
    }
}

/// Version record from database
#[derive(Debug, Clone, FromRow)]
pub struct VersionRow {
    pub id: Uuid,
    pub conversation_id: String,
    pub version_number: i32,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl From<VersionRow> for ArtifactVersion {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            version_number: row.version_number,
            code: row.code,
            created_at: row.created_at,
        }
    }
}

/// Version repository
pub struct VersionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> VersionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        conversation_id: &str,
        version_number: i32,
        code: &str,
    ) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO artifact_versions (id, conversation_id, version_number, code)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(conversation_id)
        .bind(version_number)
        .bind(code)
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict {
                conversation_id: conversation_id.to_string(),
                version: version_number,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn latest(&self, conversation_id: &str) -> Result<Option<VersionRow>, DbError> {
        let row = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, conversation_id, version_number, code, created_at
            FROM artifact_versions
            WHERE conversation_id = $1
            ORDER BY version_number DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<VersionRow>, DbError> {
        let row = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, conversation_id, version_number, code, created_at
            FROM artifact_versions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}

/// `VersionStore` over Postgres. Cloning shares the pool.
#[derive(Clone)]
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> VersionRepo<'_> {
        VersionRepo::new(&self.pool)
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn insert(&self, conversation_id: &str, version_number: i32, code: &str) -> CoreResult<Uuid> {
        Ok(self.repo().insert(conversation_id, version_number, code).await?)
    }

    async fn latest(&self, conversation_id: &str) -> CoreResult<Option<ArtifactVersion>> {
        Ok(self.repo().latest(conversation_id).await?.map(Into::into))
    }

    async fn by_id(&self, id: Uuid) -> CoreResult<Option<ArtifactVersion>> {
        Ok(self.repo().get(id).await?.map(Into::into))
    }
}
