use sqlx::{Postgres, QueryBuilder, query, query_as, query_scalar};
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostRecord, PostWithRelations, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

const POST_LISTING_SELECT: &str = r#"
SELECT
    p.id,
    p.text,
    p.pub_date,
    p.author_id,
    p.group_id,
    p.image,
    u.username AS author_username,
    u.first_name AS author_first_name,
    u.last_name AS author_last_name,
    u.email AS author_email,
    u.password_hash AS author_password_hash,
    u.date_joined AS author_date_joined,
    g.title AS group_title,
    g.slug AS group_slug,
    g.description AS group_description,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
FROM posts p
INNER JOIN users u ON u.id = p.author_id
LEFT JOIN groups g ON g.id = p.group_id
WHERE 1=1
"#;

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PostListingRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    author_email: Option<String>,
    author_password_hash: String,
    author_date_joined: OffsetDateTime,
    group_title: Option<String>,
    group_slug: Option<String>,
    group_description: Option<String>,
    comment_count: i64,
}

impl From<PostListingRow> for PostWithRelations {
    fn from(row: PostListingRow) -> Self {
        // The group columns come from a LEFT JOIN; all of them are present or none are.
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupRecord {
                id,
                title,
                slug,
                description: row.group_description.unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                pub_date: row.pub_date,
                author_id: row.author_id,
                group_id: group.as_ref().map(|group| group.id),
                image: row.image,
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
            group,
            comment_count: row.comment_count,
        }
    }
}

#[async_trait::async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        Self::apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostWithRelations>, RepoError> {
        let offset = Self::convert_window(offset, "offset")?;
        let limit = Self::convert_window(limit, "limit")?;

        let mut qb = QueryBuilder::<Postgres>::new(POST_LISTING_SELECT);
        Self::apply_scope_conditions(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostListingRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostWithRelations::from).collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostWithRelations>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_LISTING_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostListingRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostWithRelations::from))
    }
}

#[async_trait::async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(params.text)
        .bind(OffsetDateTime::now_utc())
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(params.image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE id = $1
            RETURNING id, text, pub_date, author_id, group_id, image
            "#,
        )
        .bind(params.id)
        .bind(params.text)
        .bind(params.group_id)
        .bind(params.image)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let deleted: Option<i64> = query_scalar("DELETE FROM posts WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(deleted.is_some())
    }
}
