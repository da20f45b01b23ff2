use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::PageWindow;
use crate::domain::entities::{CommentWithAuthor, GroupRecord, PostWithRelations, UserRecord};
use crate::domain::forms::FormErrors;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year]");
const DATETIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:long] [year], [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render one of the `core/*.html` pages. Falls back to a bare status line when
/// the error template itself cannot be rendered.
pub fn render_error_page(
    status: StatusCode,
    public_message: &'static str,
    path: Option<String>,
) -> Response {
    let chrome = LayoutChrome::default();
    let rendered = match status {
        StatusCode::NOT_FOUND => NotFoundTemplate {
            chrome,
            path: path.unwrap_or_default(),
        }
        .render(),
        StatusCode::FORBIDDEN => ForbiddenTemplate {
            chrome,
            message: public_message.to_string(),
        }
        .render(),
        _ => ServerErrorTemplate {
            chrome,
            message: public_message.to_string(),
        }
        .render(),
    };

    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            let mut response = (status, public_message).into_response();
            ErrorReport::from_error("presentation::views::render_error_page", status, &err)
                .attach(&mut response);
            response
        }
    }
}

pub fn format_date(value: OffsetDateTime) -> String {
    value.format(DATE_FORMAT).unwrap_or_default()
}

pub fn format_datetime(value: OffsetDateTime) -> String {
    value.format(DATETIME_FORMAT).unwrap_or_default()
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
}

/// Per-request page chrome: who is signed in, for the navigation bar.
#[derive(Clone, Default)]
pub struct LayoutChrome {
    pub viewer: Option<ViewerView>,
}

impl LayoutChrome {
    pub fn for_viewer(viewer: Option<&UserRecord>) -> Self {
        Self {
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                display_name: user.display_name(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct GroupLink {
    pub title: String,
    pub slug: String,
}

impl From<&GroupRecord> for GroupLink {
    fn from(group: &GroupRecord) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub author_username: String,
    pub author_name: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub comment_count: i64,
}

impl From<&PostWithRelations> for PostCard {
    fn from(post: &PostWithRelations) -> Self {
        Self {
            id: post.post.id,
            text: post.post.text.clone(),
            published: format_date(post.post.pub_date),
            author_username: post.author.username.clone(),
            author_name: post.author.display_name(),
            group: post.group.as_ref().map(GroupLink::from),
            image_url: post.post.image.as_deref().map(media_url),
            comment_count: post.comment_count,
        }
    }
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Clone)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

/// The paginated window handed to listing templates as `page_obj`.
#[derive(Clone)]
pub struct PageObj {
    pub posts: Vec<PostCard>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub has_other_pages: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
    pub pages: Vec<PageLink>,
}

impl From<&PageWindow<PostWithRelations>> for PageObj {
    fn from(window: &PageWindow<PostWithRelations>) -> Self {
        Self {
            posts: window.items.iter().map(PostCard::from).collect(),
            number: window.number,
            num_pages: window.num_pages,
            total_count: window.total_count,
            has_other_pages: window.has_other_pages(),
            previous_page_number: window.previous_page_number(),
            next_page_number: window.next_page_number(),
            pages: window
                .page_range()
                .map(|number| PageLink {
                    number,
                    current: number == window.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorView {
    pub username: String,
    pub display_name: String,
    pub followers: u64,
    pub follows: u64,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentWithAuthor> for CommentView {
    fn from(comment: &CommentWithAuthor) -> Self {
        Self {
            author_username: comment.author.username.clone(),
            author_name: comment.author.display_name(),
            text: comment.comment.text.clone(),
            created: format_datetime(comment.comment.created),
        }
    }
}

#[derive(Clone, Default)]
pub struct CommentFormView {
    pub text: String,
    pub text_errors: Vec<String>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

#[derive(Clone, Default)]
pub struct PostFormView {
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
}

impl PostFormView {
    pub fn new(text: &str, selected_group: Option<i64>, groups: &[GroupRecord]) -> Self {
        Self {
            text: text.to_string(),
            groups: groups
                .iter()
                .map(|group| GroupOption {
                    id: group.id,
                    title: group.title.clone(),
                    selected: Some(group.id) == selected_group,
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, stored_path: Option<&str>) -> Self {
        self.current_image = stored_path.map(media_url);
        self
    }

    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.text_errors = errors.messages("text");
        self.group_errors = errors.messages("group");
        self.image_errors = errors.messages("image");
        self
    }
}

#[derive(Clone, Default)]
pub struct SignupFormView {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub first_name_errors: Vec<String>,
    pub last_name_errors: Vec<String>,
    pub username_errors: Vec<String>,
    pub email_errors: Vec<String>,
    pub password_errors: Vec<String>,
}

impl SignupFormView {
    pub fn with_errors(mut self, errors: &FormErrors) -> Self {
        self.first_name_errors = errors.messages("first_name");
        self.last_name_errors = errors.messages("last_name");
        self.username_errors = errors.messages("username");
        self.email_errors = errors.messages("email");
        self.password_errors = errors.messages("password2");
        self
    }
}

#[derive(Clone, Default)]
pub struct LoginFormView {
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub chrome: LayoutChrome,
    pub page_obj: PageObj,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub chrome: LayoutChrome,
    pub group: GroupRecord,
    pub page_obj: PageObj,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub chrome: LayoutChrome,
    pub author: AuthorView,
    pub page_obj: PageObj,
    pub following: bool,
    /// Signed in and looking at someone else's profile.
    pub can_follow: bool,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub chrome: LayoutChrome,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub form: CommentFormView,
    pub can_edit: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "posts/post_create.html")]
pub struct PostFormTemplate {
    pub chrome: LayoutChrome,
    pub form: PostFormView,
    pub is_edit: bool,
    pub action: String,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub chrome: LayoutChrome,
    pub page_obj: PageObj,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub chrome: LayoutChrome,
    pub form: SignupFormView,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub chrome: LayoutChrome,
    pub form: LoginFormView,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub chrome: LayoutChrome,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub chrome: LayoutChrome,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub chrome: LayoutChrome,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub chrome: LayoutChrome,
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/403.html")]
pub struct ForbiddenTemplate {
    pub chrome: LayoutChrome,
    pub message: String,
}

#[derive(Template)]
#[template(path = "core/500.html")]
pub struct ServerErrorTemplate {
    pub chrome: LayoutChrome,
    pub message: String,
}
