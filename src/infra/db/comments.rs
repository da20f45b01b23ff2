use sqlx::query_as;
use time::OffsetDateTime;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::{CommentRecord, CommentWithAuthor, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created: row.created,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentWithAuthorRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: OffsetDateTime,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    author_email: Option<String>,
    author_password_hash: String,
    author_date_joined: OffsetDateTime,
}

impl From<CommentWithAuthorRow> for CommentWithAuthor {
    fn from(row: CommentWithAuthorRow) -> Self {
        Self {
            comment: CommentRecord {
                id: row.id,
                post_id: row.post_id,
                author_id: row.author_id,
                text: row.text,
                created: row.created,
            },
            author: UserRecord {
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                email: row.author_email,
                password_hash: row.author_password_hash,
                date_joined: row.author_date_joined,
            },
        }
    }
}

#[async_trait::async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let rows = query_as::<_, CommentWithAuthorRow>(
            r#"
            SELECT
                c.id,
                c.post_id,
                c.author_id,
                c.text,
                c.created,
                u.username AS author_username,
                u.first_name AS author_first_name,
                u.last_name AS author_last_name,
                u.email AS author_email,
                u.password_hash AS author_password_hash,
                u.date_joined AS author_date_joined
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created DESC, c.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES ($1, $2, $3, $4)
            RETURNING id, post_id, author_id, text, created
            "#,
        )
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(params.text)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
