use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        auth::AuthError, follows::FollowError, groups::GroupError, posts::PostError,
        repos::RepoError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
    presentation::views::render_error_page,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A failed request rendered through the `core/*.html` error pages.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    path: Option<String>,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            path: None,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            path: None,
            report,
        }
    }

    pub fn not_found(source: &'static str, path: impl Into<String>) -> Self {
        let path = path.into();
        let mut error = Self::new(
            source,
            StatusCode::NOT_FOUND,
            "Page not found",
            format!("no resource at `{path}`"),
        );
        error.path = Some(path);
        error
    }

    /// Record the request path shown on the 404 page.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }

    fn from_repo(source: &'static str, error: &RepoError) -> Self {
        match error {
            RepoError::Timeout => Self::from_error(
                source,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                error,
            ),
            RepoError::NotFound => Self::from_error(
                source,
                StatusCode::NOT_FOUND,
                "Page not found",
                error,
            ),
            _ => Self::internal(source, error),
        }
    }

    fn from_domain(source: &'static str, error: &DomainError) -> Self {
        match error {
            DomainError::NotFound { .. } => {
                Self::from_error(source, StatusCode::NOT_FOUND, "Page not found", error)
            }
            DomainError::NotAuthor { .. } => Self::from_error(
                source,
                StatusCode::FORBIDDEN,
                "Only the author may change this post",
                error,
            ),
            DomainError::Invariant { .. } => Self::internal(source, error),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = render_error_page(self.status, self.public_message, self.path);
        self.report.attach(&mut response);
        response
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "infra::http::post_error_to_http_error";
        match &error {
            PostError::Repo(err) => HttpError::from_repo(SOURCE, err),
            PostError::Domain(err) => HttpError::from_domain(SOURCE, err),
            PostError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            PostError::Media(_) => HttpError::internal(SOURCE, &error),
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(error: AuthError) -> Self {
        const SOURCE: &str = "infra::http::auth_error_to_http_error";
        match &error {
            AuthError::Repo(err) => HttpError::from_repo(SOURCE, err),
            AuthError::Invalid(_) | AuthError::InvalidCredentials => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            AuthError::Hashing(_) => HttpError::internal(SOURCE, &error),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "infra::http::follow_error_to_http_error";
        match &error {
            FollowError::Repo(err) => HttpError::from_repo(SOURCE, err),
            FollowError::UnknownAuthor(_) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
        }
    }
}

impl From<GroupError> for HttpError {
    fn from(error: GroupError) -> Self {
        const SOURCE: &str = "infra::http::group_error_to_http_error";
        match &error {
            GroupError::Repo(err) => HttpError::from_repo(SOURCE, err),
            GroupError::NotFound(_) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            _ => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let error = PostError::Repo(RepoError::Timeout);
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &error);
        assert_eq!(report.messages, vec!["database timeout".to_string()]);
    }

    #[test]
    fn not_author_maps_to_forbidden() {
        let error: HttpError = PostError::Domain(DomainError::not_author("post", 4)).into();
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_post_maps_to_not_found() {
        let error: HttpError = PostError::Domain(DomainError::not_found("post")).into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_timeout_maps_to_unavailable() {
        let error: HttpError = AuthError::Repo(RepoError::Timeout).into();
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.report().messages, vec!["database timeout".to_string()]);
    }
}
