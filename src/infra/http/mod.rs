mod about;
mod auth;
mod media;
mod middleware;
mod posts;

use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{StatusCode, Uri, request::Parts},
    middleware as axum_middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::application::{
    auth::AuthService,
    error::{ErrorReport, HttpError},
    follows::FollowService,
    posts::PostService,
    repos::{HealthRepo, RepoError},
};
use crate::cache::{PageCacheState, page_cache_layer};
use crate::domain::entities::UserRecord;
use crate::infra::uploads::MediaStorage;

use middleware::{log_responses, resolve_session, set_request_context};

pub use middleware::RequestContext;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionid";

const LOGIN_PATH: &str = "/auth/login/";

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub auth: Arc<AuthService>,
    pub follows: Arc<FollowService>,
    pub health: Arc<dyn HealthRepo>,
    pub media: Arc<MediaStorage>,
    pub page_cache: PageCacheState,
    pub secure_cookies: bool,
    pub upload_limit_bytes: usize,
}

/// The signed-in user for this request, if any. Inserted by the session middleware.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(Option<UserRecord>);

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

impl From<Option<UserRecord>> for CurrentUser {
    fn from(user: Option<UserRecord>) -> Self {
        Self(user)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for routes that need a signed-in user. Anonymous requests are
/// redirected to the login page with the requested path in `next`.
pub struct RequireUser(pub UserRecord);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|current| current.user())
        {
            Some(user) => Ok(Self(user.clone())),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or("/", |value| value.as_str());
                Err(login_redirect(next))
            }
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let cached_routes = Router::new().route("/", get(posts::index)).route_layer(
        axum_middleware::from_fn_with_state(state.page_cache.clone(), page_cache_layer),
    );

    let upload_routes = Router::new()
        .route(
            "/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    Router::new()
        .merge(cached_routes)
        .merge(upload_routes)
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/profile/{username}/follow/", get(posts::follow_author))
        .route("/profile/{username}/unfollow/", get(posts::unfollow_author))
        .route("/posts/{id}/", get(posts::post_detail))
        .route("/posts/{id}/delete/", post(posts::delete_post))
        .route("/posts/{id}/comment/", post(posts::add_comment))
        .route("/follow/", get(posts::follow_index))
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup_submit))
        .route("/auth/login/", get(auth::login_form).post(auth::login_submit))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/media/{*path}", get(media::serve_media))
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(state, resolve_session))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn fallback(uri: Uri) -> Response {
    HttpError::not_found("infra::http::fallback", uri.path()).into_response()
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// `303` to the login page carrying `next`.
pub fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("{LOGIN_PATH}?next={}", encode_next(next))).into_response()
}

/// Percent-encode everything except RFC 3986 unreserved characters and `/`.
pub fn encode_next(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                encoded.push(char::from(byte));
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Only same-site absolute paths are accepted as a post-login target.
pub fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}
