//! In-memory repositories and a router harness for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use yatube::{
    application::{
        auth::AuthService,
        follows::FollowService,
        pagination::Paginator,
        posts::{ImageStore, PostService},
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostScope,
            PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    cache::{PageCacheConfig, PageCacheState},
    domain::entities::{
        CommentRecord, CommentWithAuthor, FollowRecord, GroupRecord, PostRecord,
        PostWithRelations, SessionRecord, UserRecord,
    },
    infra::{
        http::{self, HttpState, SESSION_COOKIE},
        uploads::MediaStorage,
    },
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<UserRecord>,
    sessions: Vec<SessionRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Deterministic, strictly increasing timestamps.
    fn tick(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_000 + self.next_id)
    }

    fn relations(&self, post: &PostRecord) -> Option<PostWithRelations> {
        let author = self.users.iter().find(|user| user.id == post.author_id)?;
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .cloned();
        let comment_count = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .count() as i64;
        Some(PostWithRelations {
            post: PostRecord {
                group_id: group.as_ref().map(|group| group.id),
                ..post.clone()
            },
            author: author.clone(),
            group,
            comment_count,
        })
    }

    fn in_scope(&self, post: &PostRecord, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(id) => post.group_id == Some(id),
            PostScope::Author(id) => post.author_id == id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }
}

/// Every repository trait over one set of in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub healthy: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: Mutex::new(Tables::default()),
            healthy: Mutex::new(true),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    pub fn insert_user(&self, username: &str) -> UserRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let user = UserRecord {
            id,
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            password_hash: String::new(),
            date_joined: tables.tick(),
        };
        tables.users.push(user.clone());
        user
    }

    pub fn insert_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let group = GroupRecord {
            id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: String::new(),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn insert_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        let mut tables = self.lock();
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: text.to_string(),
            pub_date: tables.tick(),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn remove_post(&self, id: i64) {
        let mut tables = self.lock();
        tables.posts.retain(|post| post.id != id);
        tables.comments.retain(|comment| comment.post_id != id);
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.lock().posts.clone()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn follow_edges(&self, user_id: i64, author_id: i64) -> usize {
        self.lock()
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id && edge.author_id == author_id)
            .count()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let id = tables.next_id();
        let user = UserRecord {
            id,
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            date_joined: tables.tick(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let session = SessionRecord {
            id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|session| session.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, prefix: &str) -> Result<(), RepoError> {
        self.lock().sessions.retain(|session| session.prefix != prefix);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = self.lock();
        if tables.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let id = tables.next_id();
        let group = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, slug: &str) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let Some(id) = tables
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .map(|group| group.id)
        else {
            return Ok(false);
        };
        tables.groups.retain(|group| group.id != id);
        for post in tables.posts.iter_mut().filter(|post| post.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .count() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<PostWithRelations>, RepoError> {
        let tables = self.lock();
        let mut posts: Vec<&PostRecord> = tables
            .posts
            .iter()
            .filter(|post| tables.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|post| tables.relations(post))
            .collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostWithRelations>, RepoError> {
        let tables = self.lock();
        Ok(tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| tables.relations(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let post = PostRecord {
            id,
            text: params.text,
            pub_date: tables.tick(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.posts.len();
        tables.posts.retain(|post| post.id != id);
        tables.comments.retain(|comment| comment.post_id != id);
        Ok(tables.posts.len() < before)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let tables = self.lock();
        let mut comments: Vec<CommentWithAuthor> = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .filter_map(|comment| {
                let author = tables.users.iter().find(|user| user.id == comment.author_id)?;
                Some(CommentWithAuthor {
                    comment: comment.clone(),
                    author: author.clone(),
                })
            })
            .collect();
        comments.sort_by(|a, b| {
            b.comment
                .created
                .cmp(&a.comment.created)
                .then(b.comment.id.cmp(&a.comment.id))
        });
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created: tables.tick(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn create_follow(
        &self,
        user_id: i64,
        author_id: i64,
    ) -> Result<FollowRecord, RepoError> {
        let mut tables = self.lock();
        let id = tables.next_id();
        let edge = FollowRecord {
            id,
            user_id,
            author_id,
        };
        tables.follows.push(edge.clone());
        Ok(edge)
    }

    async fn delete_follows(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok((before - tables.follows.len()) as u64)
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|edge| edge.author_id == author_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        if *self.healthy.lock().expect("health flag") {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

/// A fully wired router over a [`MemoryStore`].
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    router: Router,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(PageCacheConfig {
            enabled: true,
            ttl: std::time::Duration::from_secs(20),
            capacity: 64,
        })
    }

    pub fn without_cache() -> Self {
        Self::with_cache(PageCacheConfig {
            enabled: false,
            ..PageCacheConfig::default()
        })
    }

    pub fn with_cache(cache: PageCacheConfig) -> Self {
        let store = MemoryStore::new();
        let media_dir = tempfile::tempdir().expect("media tempdir");
        let media = Arc::new(MediaStorage::new(media_dir.path().to_path_buf()).expect("media"));
        let images: Arc<dyn ImageStore> = media.clone();

        let posts = PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            images,
            Paginator::default(),
        );
        let auth = AuthService::new(store.clone(), store.clone(), Duration::days(1));
        let follows = FollowService::new(store.clone(), store.clone());

        let state = HttpState {
            posts: Arc::new(posts),
            auth: Arc::new(auth),
            follows: Arc::new(follows),
            health: store.clone(),
            media,
            page_cache: PageCacheState::new(cache),
            secure_cookies: false,
            upload_limit_bytes: 1024 * 1024,
        };
        let router = http::build_router(state.clone());

        Self {
            store,
            state,
            router,
            _media: media_dir,
        }
    }

    /// Create a user and return a `Cookie` header value for its session.
    pub async fn login_as(&self, username: &str) -> (UserRecord, String) {
        let user = self.store.insert_user(username);
        let session = self
            .state
            .auth
            .issue_session(user.id)
            .await
            .expect("session");
        (user, format!("{SESSION_COOKIE}={}", session.token))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    /// Submit the post form as `multipart/form-data` with text fields only.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        cookie: &str,
    ) -> Response<Body> {
        const BOUNDARY: &str = "yatube-test-boundary";
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// How many post cards a rendered listing contains.
pub fn count_cards(html: &str) -> usize {
    html.matches("<article>").count()
}
