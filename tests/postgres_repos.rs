use sqlx::PgPool;
use yatube::{
    application::repos::{
        CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
        FollowsRepo, GroupsRepo, PostScope, PostsRepo, PostsWriteRepo, RepoError, UsersRepo,
    },
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::db::PostgresRepositories,
};

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            password_hash: "not-a-real-hash".to_string(),
        })
        .await
        .expect("create user")
}

async fn group(repos: &PostgresRepositories, slug: &str) -> GroupRecord {
    repos
        .create_group(CreateGroupParams {
            title: format!("Group {slug}"),
            slug: slug.to_string(),
            description: String::new(),
        })
        .await
        .expect("create group")
}

async fn post(
    repos: &PostgresRepositories,
    author: &UserRecord,
    text: &str,
    group: Option<&GroupRecord>,
) -> PostRecord {
    repos
        .create_post(CreatePostParams {
            text: text.to_string(),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        })
        .await
        .expect("create post")
}

async fn comment(repos: &PostgresRepositories, post: &PostRecord, author: &UserRecord) {
    repos
        .create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: author.id,
            text: "a comment".to_string(),
        })
        .await
        .expect("create comment");
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .expect("count rows")
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_group_ungroups_its_posts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let cats = group(&repos, "cats").await;
    let kept = post(&repos, &author, "about cats", Some(&cats)).await;

    assert!(repos.delete_group("cats").await.expect("delete group"));
    assert!(!repos.delete_group("cats").await.expect("second delete"));

    let found = repos
        .find_post(kept.id)
        .await
        .expect("find post")
        .expect("post survives its group");
    assert_eq!(found.post.group_id, None);
    assert!(found.group.is_none());
    assert_eq!(repos.count_posts(PostScope::Group(cats.id)).await.expect("count"), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_post_removes_its_comments(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let reader = user(&repos, "anna").await;
    let doomed = post(&repos, &author, "short-lived", None).await;
    let other = post(&repos, &author, "stays", None).await;
    comment(&repos, &doomed, &reader).await;
    comment(&repos, &doomed, &author).await;
    comment(&repos, &other, &reader).await;

    assert!(repos.delete_post(doomed.id).await.expect("delete post"));

    assert!(repos.list_comments(doomed.id).await.expect("list").is_empty());
    assert_eq!(repos.list_comments(other.id).await.expect("list").len(), 1);
    assert!(!repos.delete_post(doomed.id).await.expect("second delete"));
}

#[sqlx::test(migrations = "./migrations")]
async fn schema_cascades_comments_with_their_post(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let target = post(&repos, &author, "removed directly", None).await;
    comment(&repos, &target, &author).await;

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(target.id)
        .execute(&pool)
        .await
        .expect("raw delete");

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_user_cascades_to_their_content(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let reader = user(&repos, "anna").await;
    let written = post(&repos, &author, "by leo", None).await;
    comment(&repos, &written, &reader).await;
    repos.create_follow(reader.id, author.id).await.expect("follow");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(author.id)
        .execute(&pool)
        .await
        .expect("delete user");

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM posts").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM comments").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_breaks_timestamp_ties_by_id(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let first = post(&repos, &author, "first", None).await;
    let second = post(&repos, &author, "second", None).await;
    let third = post(&repos, &author, "third", None).await;
    let newest = post(&repos, &author, "newest", None).await;

    sqlx::query("UPDATE posts SET pub_date = TIMESTAMPTZ '2024-01-01 00:00:00+00' WHERE id <> $1")
        .bind(newest.id)
        .execute(&pool)
        .await
        .expect("equalise timestamps");
    sqlx::query("UPDATE posts SET pub_date = TIMESTAMPTZ '2024-06-01 00:00:00+00' WHERE id = $1")
        .bind(newest.id)
        .execute(&pool)
        .await
        .expect("move newest forward");

    let ids: Vec<i64> = repos
        .list_posts(PostScope::All, 0, 10)
        .await
        .expect("list posts")
        .into_iter()
        .map(|item| item.post.id)
        .collect();

    assert_eq!(ids, vec![newest.id, third.id, second.id, first.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_windows_follow_offset_and_limit(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;
    let cats = group(&repos, "cats").await;
    for n in 0..13 {
        post(&repos, &author, &format!("post {n}"), Some(&cats)).await;
    }
    post(&repos, &author, "ungrouped", None).await;

    let scope = PostScope::Group(cats.id);
    assert_eq!(repos.count_posts(scope).await.expect("count"), 13);
    assert_eq!(repos.list_posts(scope, 0, 10).await.expect("page 1").len(), 10);
    let second = repos.list_posts(scope, 10, 10).await.expect("page 2");
    assert_eq!(second.len(), 3);
    assert!(second.iter().all(|item| item.group.as_ref().map(|g| g.id) == Some(cats.id)));
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_scope_lists_only_followed_authors(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let followed = user(&repos, "leo").await;
    let other = user(&repos, "fyodor").await;
    let reader = user(&repos, "anna").await;
    let wanted = post(&repos, &followed, "followed", None).await;
    post(&repos, &other, "not followed", None).await;

    repos.create_follow(reader.id, followed.id).await.expect("follow");
    repos.create_follow(reader.id, followed.id).await.expect("duplicate edge");

    let feed = repos
        .list_posts(PostScope::FollowedBy(reader.id), 0, 10)
        .await
        .expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.id, wanted.id);

    assert_eq!(repos.delete_follows(reader.id, followed.id).await.expect("unfollow"), 2);
    assert!(!repos.is_following(reader.id, followed.id).await.expect("is following"));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_group_slug_is_reported(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    group(&repos, "cats").await;

    let result = repos
        .create_group(CreateGroupParams {
            title: "Other cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await;

    assert!(matches!(
        result,
        Err(RepoError::Duplicate { constraint }) if constraint == "groups_slug_key"
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn group_slug_charset_is_enforced(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());

    let result = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats and dogs".to_string(),
            description: String::new(),
        })
        .await;

    assert!(matches!(result, Err(RepoError::Integrity { .. })));
}

#[sqlx::test(migrations = "./migrations")]
async fn blank_post_text_is_rejected_by_schema(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let author = user(&repos, "leo").await;

    let result = repos
        .create_post(CreatePostParams {
            text: "   ".to_string(),
            author_id: author.id,
            group_id: None,
            image: None,
        })
        .await;

    assert!(matches!(result, Err(RepoError::Integrity { .. })));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_username_is_reported(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    user(&repos, "leo").await;

    let result = repos
        .create_user(CreateUserParams {
            username: "leo".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            password_hash: "x".to_string(),
        })
        .await;

    assert!(matches!(result, Err(RepoError::Duplicate { .. })));
}
