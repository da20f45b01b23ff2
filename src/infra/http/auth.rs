//! Signup, login and logout.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;

use crate::application::{
    auth::{AuthError, IssuedSession, SignupSubmission},
    error::HttpError,
};
use crate::presentation::views::{
    LayoutChrome, LoggedOutTemplate, LoginFormView, LoginTemplate, SignupFormView, SignupTemplate,
    render_template_response,
};

use super::{CurrentUser, HttpState, SESSION_COOKIE, safe_next};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupForm {
    first_name: String,
    last_name: String,
    username: String,
    email: String,
    password1: String,
    password2: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

pub(super) async fn signup_form(current: CurrentUser) -> Response {
    render_template_response(
        SignupTemplate {
            chrome: LayoutChrome::for_viewer(current.user()),
            form: SignupFormView::default(),
        },
        StatusCode::OK,
    )
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    current: CurrentUser,
    Form(form): Form<SignupForm>,
) -> Response {
    let view = SignupFormView {
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        username: form.username.clone(),
        email: form.email.clone(),
        ..SignupFormView::default()
    };
    let submission = SignupSubmission {
        first_name: form.first_name,
        last_name: form.last_name,
        username: form.username,
        email: form.email,
        password1: form.password1,
        password2: form.password2,
    };

    match state.auth.signup(submission).await {
        Ok((_, session)) => {
            let jar = jar.add(session_cookie(&state, session));
            (jar, Redirect::to("/")).into_response()
        }
        Err(AuthError::Invalid(errors)) => render_template_response(
            SignupTemplate {
                chrome: LayoutChrome::for_viewer(current.user()),
                form: view.with_errors(&errors),
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn login_form(current: CurrentUser, Query(query): Query<NextQuery>) -> Response {
    render_template_response(
        LoginTemplate {
            chrome: LayoutChrome::for_viewer(current.user()),
            form: LoginFormView {
                next: query.next.unwrap_or_default(),
                ..LoginFormView::default()
            },
        },
        StatusCode::OK,
    )
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    current: CurrentUser,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.auth.login(&form.username, &form.password).await {
        Ok((user, session)) => {
            info!(
                target = "yatube::http::auth",
                user_id = user.id,
                "user logged in"
            );
            let target = safe_next(form.next.as_deref()).to_string();
            let jar = jar.add(session_cookie(&state, session));
            (jar, Redirect::to(&target)).into_response()
        }
        Err(AuthError::InvalidCredentials) => render_template_response(
            LoginTemplate {
                chrome: LayoutChrome::for_viewer(current.user()),
                form: LoginFormView {
                    username: form.username,
                    next: form.next.unwrap_or_default(),
                    error: Some(AuthError::InvalidCredentials.to_string()),
                },
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.auth.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    let page = render_template_response(
        LoggedOutTemplate {
            chrome: LayoutChrome::default(),
        },
        StatusCode::OK,
    );
    (jar, page).into_response()
}

fn session_cookie(state: &HttpState, session: IssuedSession) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .max_age(state.auth.session_ttl())
        .build()
}
