//! Schema for artifact versions. Every statement is idempotent.

use sqlx::PgPool;

pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running artifact version migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifact_versions (
            id UUID PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            version_number INTEGER NOT NULL CHECK (version_number > 0),
            code TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (conversation_id, version_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_artifact_versions_latest
            ON artifact_versions (conversation_id, version_number DESC)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Artifact version migrations complete");
    Ok(())
}
