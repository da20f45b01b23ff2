//! Post listings, authoring, comments and follows.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, Uri, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error};

use crate::application::{
    error::HttpError,
    pagination::PageParam,
    posts::{PostError, PostSubmission},
};
use crate::domain::entities::UserRecord;
use crate::domain::forms::{FormErrors, ImageUpload};
use crate::presentation::views::{
    AuthorView, CommentFormView, CommentView, FollowTemplate, GroupListTemplate, IndexTemplate,
    LayoutChrome, PageObj, PostCard, PostDetailTemplate, PostFormTemplate, PostFormView,
    ProfileTemplate, render_template_response,
};

use super::{CurrentUser, HttpState, RequireUser};

const SOURCE: &str = "infra::http::posts";

/// The `page` query parameter. A repeated parameter resolves to its last value
/// and an undecodable query string reads as no parameter at all.
#[derive(Debug, Default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn from_uri(uri: &Uri) -> Self {
        let page = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| {
                pairs
                    .into_iter()
                    .rev()
                    .find(|(key, _)| key == "page")
                    .map(|(_, value)| value)
            })
            .unwrap_or_default();
        Self { page }
    }

    fn param(&self) -> PageParam {
        PageParam::parse(self.page.as_deref())
    }
}

impl<S> FromRequestParts<S> for PageQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_uri(&parts.uri))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

pub(super) async fn index(
    State(state): State<HttpState>,
    current: CurrentUser,
    query: PageQuery,
) -> Response {
    match state.posts.index(query.param()).await {
        Ok(window) => render_template_response(
            IndexTemplate {
                chrome: LayoutChrome::for_viewer(current.user()),
                page_obj: PageObj::from(&window),
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn group_posts(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(slug): Path<String>,
    query: PageQuery,
    uri: Uri,
) -> Response {
    match state.posts.group_posts(&slug, query.param()).await {
        Ok(page) => render_template_response(
            GroupListTemplate {
                chrome: LayoutChrome::for_viewer(current.user()),
                page_obj: PageObj::from(&page.page),
                group: page.group,
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn profile(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(username): Path<String>,
    query: PageQuery,
    uri: Uri,
) -> Response {
    let viewer = current.user();
    match state.posts.profile(&username, query.param(), viewer).await {
        Ok(profile) => {
            let can_follow = viewer.is_some_and(|viewer| viewer.id != profile.author.id);
            render_template_response(
                ProfileTemplate {
                    chrome: LayoutChrome::for_viewer(viewer),
                    author: AuthorView {
                        username: profile.author.username.clone(),
                        display_name: profile.author.display_name(),
                        followers: profile.followers,
                        follows: profile.follows,
                    },
                    page_obj: PageObj::from(&profile.page),
                    following: profile.following,
                    can_follow,
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    current: CurrentUser,
    Path(id): Path<String>,
    uri: Uri,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return HttpError::not_found(SOURCE, uri.path()).into_response();
    };

    match state.posts.detail(id).await {
        Ok(detail) => {
            let viewer = current.user();
            render_template_response(
                PostDetailTemplate {
                    chrome: LayoutChrome::for_viewer(viewer),
                    post: PostCard::from(&detail.post),
                    author_post_count: detail.author_post_count,
                    comments: detail.comments.iter().map(CommentView::from).collect(),
                    form: CommentFormView::default(),
                    can_edit: viewer.is_some_and(|viewer| viewer.id == detail.post.author.id),
                    can_comment: viewer.is_some(),
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    render_post_form(&state, &user, PostFormView::default(), None).await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let submission = match read_post_form(&mut multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    let text = submission.text.clone();
    let group = submission.group.clone();

    match state.posts.create(&user, submission).await {
        Ok(_) => Redirect::to(&profile_path(&user.username)).into_response(),
        Err(PostError::Invalid(errors)) => {
            let form = invalid_form(&state, &text, group.as_deref(), &errors).await;
            match form {
                Ok(form) => render_post_form(&state, &user, form, None).await,
                Err(err) => err.into_response(),
            }
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    uri: Uri,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return HttpError::not_found(SOURCE, uri.path()).into_response();
    };

    let post = match state.posts.editable(id, &user).await {
        Ok(post) => post,
        Err(err) => return HttpError::from(err).with_path(uri.path()).into_response(),
    };
    let groups = match state.posts.groups().await {
        Ok(groups) => groups,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let form = PostFormView::new(&post.post.text, post.post.group_id, &groups)
        .with_image(post.post.image.as_deref());
    render_post_form(&state, &user, form, Some(id)).await
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return HttpError::not_found(SOURCE, uri.path()).into_response();
    };
    let submission = match read_post_form(&mut multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    let text = submission.text.clone();
    let group = submission.group.clone();

    match state.posts.update(id, &user, submission).await {
        Ok(_) => Redirect::to(&post_path(id)).into_response(),
        Err(PostError::Invalid(errors)) => {
            let current_image = match state.posts.editable(id, &user).await {
                Ok(post) => post.post.image,
                Err(err) => return HttpError::from(err).into_response(),
            };
            match invalid_form(&state, &text, group.as_deref(), &errors).await {
                Ok(form) => {
                    let form = form.with_image(current_image.as_deref());
                    render_post_form(&state, &user, form, Some(id)).await
                }
                Err(err) => err.into_response(),
            }
        }
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn delete_post(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    uri: Uri,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return HttpError::not_found(SOURCE, uri.path()).into_response();
    };

    match state.posts.delete(id, &user).await {
        Ok(()) => Redirect::to(&profile_path(&user.username)).into_response(),
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    uri: Uri,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_post_id(&id) else {
        return HttpError::not_found(SOURCE, uri.path()).into_response();
    };

    match state.posts.add_comment(id, &user, &form.text).await {
        Ok(comment) => {
            debug!(
                target = "yatube::http::posts",
                post_id = id,
                comment_id = comment.id,
                "comment added"
            );
            Redirect::to(&post_path(id)).into_response()
        }
        // An invalid comment is dropped without a write.
        Err(PostError::Invalid(_)) => Redirect::to(&post_path(id)).into_response(),
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    query: PageQuery,
) -> Response {
    match state.posts.follow_feed(&user, query.param()).await {
        Ok(window) => render_template_response(
            FollowTemplate {
                chrome: LayoutChrome::for_viewer(Some(&user)),
                page_obj: PageObj::from(&window),
            },
            StatusCode::OK,
        ),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(outcome) => {
            debug!(
                target = "yatube::http::posts",
                user_id = user.id,
                author = %username,
                outcome = ?outcome,
                "follow requested"
            );
            Redirect::to(&profile_path(&username)).into_response()
        }
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(err) => HttpError::from(err).with_path(uri.path()).into_response(),
    }
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn profile_path(username: &str) -> String {
    format!("/profile/{username}/")
}

fn post_path(id: i64) -> String {
    format!("/posts/{id}/")
}

async fn invalid_form(
    state: &HttpState,
    text: &str,
    group: Option<&str>,
    errors: &FormErrors,
) -> Result<PostFormView, HttpError> {
    let groups = state.posts.groups().await?;
    let selected = group.and_then(|value| value.trim().parse::<i64>().ok());
    Ok(PostFormView::new(text, selected, &groups).with_errors(errors))
}

async fn render_post_form(
    state: &HttpState,
    user: &UserRecord,
    mut form: PostFormView,
    editing: Option<i64>,
) -> Response {
    if form.groups.is_empty() {
        match state.posts.groups().await {
            Ok(groups) => {
                let selected = form
                    .groups
                    .iter()
                    .find(|option| option.selected)
                    .map(|option| option.id);
                let rebuilt = PostFormView::new(&form.text, selected, &groups);
                form.groups = rebuilt.groups;
            }
            Err(err) => return HttpError::from(err).into_response(),
        }
    }

    let (is_edit, action) = match editing {
        Some(id) => (true, format!("/posts/{id}/edit/")),
        None => (false, "/create/".to_string()),
    };

    render_template_response(
        PostFormTemplate {
            chrome: LayoutChrome::for_viewer(Some(user)),
            form,
            is_edit,
            action,
        },
        StatusCode::OK,
    )
}

/// Collect the post form fields. Unknown fields are ignored.
async fn read_post_form(multipart: &mut Multipart) -> Result<PostSubmission, HttpError> {
    let mut submission = PostSubmission::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = "yatube::http::posts",
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "Upload is too large"
                } else {
                    "Request could not be processed"
                };
                return Err(HttpError::from_error(SOURCE, status, public_message, &err));
            }
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => submission.text = field_text(field).await?,
            Some("group") => submission.group = Some(field_text(field).await?),
            Some("image-clear") => {
                let value = field_text(field).await?;
                submission.clear_image =
                    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1");
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(|mime| mime.to_string());
                let bytes: Bytes = field.bytes().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        err.status(),
                        "Request could not be processed",
                        &err,
                    )
                })?;
                submission.image = Some(ImageUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => continue,
        }
    }

    Ok(submission)
}

async fn field_text(field: axum_extra::extract::multipart::Field) -> Result<String, HttpError> {
    field.text().await.map_err(|err| {
        HttpError::from_error(
            SOURCE,
            err.status(),
            "Request could not be processed",
            &err,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("12"), Some(12));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("abc"), None);
        assert_eq!(parse_post_id("-3"), None);
    }

    #[test]
    fn paths_keep_trailing_slash() {
        assert_eq!(profile_path("leo"), "/profile/leo/");
        assert_eq!(post_path(4), "/posts/4/");
    }

    #[test]
    fn page_query_defaults_to_first_page() {
        assert_eq!(PageQuery::default().param(), PageParam::Number(1));
    }

    fn page_of(uri: &'static str) -> PageParam {
        PageQuery::from_uri(&Uri::from_static(uri)).param()
    }

    #[test]
    fn page_query_takes_last_repeated_value() {
        assert_eq!(page_of("/?page=2&page=1"), PageParam::Number(1));
        assert_eq!(page_of("/?page=1&other=x&page=3"), PageParam::Number(3));
    }

    #[test]
    fn page_query_ignores_other_parameters() {
        assert_eq!(page_of("/?q=cats"), PageParam::Number(1));
        assert_eq!(page_of("/"), PageParam::Number(1));
        assert_eq!(page_of("/?page=abc"), PageParam::Number(1));
    }
}
