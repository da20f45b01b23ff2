//! Page cache middleware.
//!
//! Wraps the routes that opt into whole-response caching. Only `GET` requests
//! are looked up, and only `200 OK` responses without `Set-Cookie` are stored.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use super::{CachedResponse, PageCache, PageCacheConfig, PageKey, Viewer};
use crate::infra::http::CurrentUser;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct PageCacheState {
    pub config: PageCacheConfig,
    pub store: Arc<PageCache>,
}

impl PageCacheState {
    pub fn new(config: PageCacheConfig) -> Self {
        Self {
            store: Arc::new(PageCache::new(&config)),
            config,
        }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<CurrentUser>()
        .map_or(Viewer::Anonymous, |current| {
            Viewer::from_user_id(current.user().map(|user| user.id))
        });
    let key = PageKey::new(request.uri().path(), request.uri().query(), viewer);

    if let Some(cached) = cache.store.get(&key) {
        debug!(cache = "page", outcome = "hit", key = %key, "serving cached response");
        return cached.into_response();
    }

    debug!(cache = "page", outcome = "miss", key = %key, "executing handler");
    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            cache
                .store
                .insert(key, CachedResponse::new(parts.status, &parts.headers, bytes.clone()));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            warn!(
                target = "yatube::cache::middleware",
                error = %err,
                "failed to buffer response body; not caching"
            );
            Response::from_parts(parts, Body::empty())
        }
    }
}

pub fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn response(status: StatusCode) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        response
    }

    #[test]
    fn stores_plain_ok_responses() {
        assert!(should_store_response(&response(StatusCode::OK)));
    }

    #[test]
    fn skips_non_ok_responses() {
        assert!(!should_store_response(&response(StatusCode::NOT_FOUND)));
        assert!(!should_store_response(&response(StatusCode::SEE_OTHER)));
        assert!(!should_store_response(&response(StatusCode::NO_CONTENT)));
    }

    #[test]
    fn skips_responses_setting_cookies() {
        let mut response = response(StatusCode::OK);
        response
            .headers_mut()
            .insert(header::SET_COOKIE, HeaderValue::from_static("sessionid=x"));
        assert!(!should_store_response(&response));
    }
}
