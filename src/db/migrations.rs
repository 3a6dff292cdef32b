use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

/// Drop all tables created by the migrations.
pub async fn drop_all(pool: &SqlitePool) -> Result<()> {
    // Replies reference comments, comments reference posts.
    for table in ["comments", "posts", "_schema_version"] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await
            .with_context(|| format!("Failed to drop {table} table"))?;
    }
    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating posts and comments");

    // Reaction columns are NULL when the count is unknown;
    // reactions_retrieved_time is NULL until a tally has been attached.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            page_id TEXT NOT NULL,
            caption TEXT,
            description TEXT,
            link TEXT,
            message TEXT,
            message_tags TEXT,
            name TEXT,
            picture TEXT,
            properties TEXT,
            shares INTEGER NOT NULL DEFAULT 0 CHECK (shares >= 0),
            source TEXT,
            post_type TEXT,
            created_time TEXT,
            retrieved_time TEXT NOT NULL,
            reactions_like INTEGER,
            reactions_love INTEGER,
            reactions_wow INTEGER,
            reactions_haha INTEGER,
            reactions_sad INTEGER,
            reactions_angry INTEGER,
            reactions_retrieved_time TEXT
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id TEXT,
            user_name TEXT,
            like_count INTEGER NOT NULL DEFAULT 0,
            message TEXT,
            message_tags TEXT,
            parent_id TEXT REFERENCES comments(id) ON DELETE CASCADE,
            created_time TEXT,
            retrieved_time TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comments table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_page_id ON posts(page_id)")
        .execute(pool)
        .await
        .context("Failed to create posts page index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)")
        .execute(pool)
        .await
        .context("Failed to create comments post index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent_id ON comments(parent_id)")
        .execute(pool)
        .await
        .context("Failed to create comments parent index")?;

    Ok(())
}
