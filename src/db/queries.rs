use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{Comment, NewComment, NewPost, Post};
use crate::graph::ReactionTally;

// ========== Posts ==========

/// Insert a post, or refresh only its share count if the id is already stored.
pub async fn upsert_post(pool: &SqlitePool, post: &NewPost) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO posts (
            id, page_id, caption, description, link, message, message_tags, name,
            picture, properties, shares, source, post_type, created_time, retrieved_time
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET shares = excluded.shares
        ",
    )
    .bind(&post.id)
    .bind(&post.page_id)
    .bind(&post.caption)
    .bind(&post.description)
    .bind(&post.link)
    .bind(&post.message)
    .bind(&post.message_tags)
    .bind(&post.name)
    .bind(&post.picture)
    .bind(&post.properties)
    .bind(post.shares)
    .bind(&post.source)
    .bind(&post.post_type)
    .bind(&post.created_time)
    .bind(&post.retrieved_time)
    .execute(pool)
    .await
    .context("Failed to upsert post")?;

    Ok(())
}

/// Get a post by id.
pub async fn get_post(pool: &SqlitePool, id: &str) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// All posts of a page, oldest first.
pub async fn list_posts(pool: &SqlitePool, page_id: &str) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE page_id = ? ORDER BY created_time, id")
        .bind(page_id)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")
}

/// Posts of a page that have no reaction tally yet, oldest first.
pub async fn list_posts_without_reactions(pool: &SqlitePool, page_id: &str) -> Result<Vec<Post>> {
    sqlx::query_as(
        r"
        SELECT * FROM posts
        WHERE page_id = ? AND reactions_retrieved_time IS NULL
        ORDER BY created_time, id
        ",
    )
    .bind(page_id)
    .fetch_all(pool)
    .await
    .context("Failed to list posts without reactions")
}

/// Attach a reaction tally to an existing post.
///
/// Returns `false` if no post with that id is stored.
pub async fn update_post_reactions(
    pool: &SqlitePool,
    post_id: &str,
    tally: &ReactionTally,
) -> Result<bool> {
    let column = |count: crate::graph::ReactionCount| count.known().map(|n| n as i64);

    let result = sqlx::query(
        r"
        UPDATE posts SET
            reactions_like = ?,
            reactions_love = ?,
            reactions_wow = ?,
            reactions_haha = ?,
            reactions_sad = ?,
            reactions_angry = ?,
            reactions_retrieved_time = ?
        WHERE id = ?
        ",
    )
    .bind(column(tally.like))
    .bind(column(tally.love))
    .bind(column(tally.wow))
    .bind(column(tally.haha))
    .bind(column(tally.sad))
    .bind(column(tally.angry))
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(post_id)
    .execute(pool)
    .await
    .context("Failed to update post reactions")?;

    Ok(result.rows_affected() > 0)
}

// ========== Comments ==========

/// Insert a comment unless one with the same id is already stored.
///
/// Returns `true` if a row was inserted.
pub async fn insert_comment_if_absent(pool: &SqlitePool, comment: &NewComment) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO comments (
            id, post_id, user_id, user_name, like_count, message, message_tags,
            parent_id, created_time, retrieved_time
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        ",
    )
    .bind(&comment.id)
    .bind(&comment.post_id)
    .bind(&comment.user_id)
    .bind(&comment.user_name)
    .bind(comment.like_count)
    .bind(&comment.message)
    .bind(&comment.message_tags)
    .bind(&comment.parent_id)
    .bind(&comment.created_time)
    .bind(&comment.retrieved_time)
    .execute(pool)
    .await
    .context("Failed to insert comment")?;

    Ok(result.rows_affected() > 0)
}

/// Get a comment by id.
pub async fn get_comment(pool: &SqlitePool, id: &str) -> Result<Option<Comment>> {
    sqlx::query_as("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch comment")
}

/// All comments that are not replies, oldest first.
pub async fn list_top_level_comments(pool: &SqlitePool) -> Result<Vec<Comment>> {
    sqlx::query_as("SELECT * FROM comments WHERE parent_id IS NULL ORDER BY created_time, id")
        .fetch_all(pool)
        .await
        .context("Failed to list top-level comments")
}

/// Number of top-level comments stored for a post.
pub async fn count_post_comments(pool: &SqlitePool, post_id: &str) -> Result<u64> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_id = ? AND parent_id IS NULL")
            .bind(post_id)
            .fetch_one(pool)
            .await
            .context("Failed to count post comments")?;
    Ok(row.0 as u64)
}

/// Number of replies stored for a comment.
pub async fn count_comment_replies(pool: &SqlitePool, comment_id: &str) -> Result<u64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE parent_id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comment replies")?;
    Ok(row.0 as u64)
}
