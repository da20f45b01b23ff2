//! Static "about" pages.

use axum::{http::StatusCode, response::Response};

use crate::presentation::views::{
    AboutAuthorTemplate, AboutTechTemplate, LayoutChrome, render_template_response,
};

use super::CurrentUser;

pub(super) async fn author(current: CurrentUser) -> Response {
    render_template_response(
        AboutAuthorTemplate {
            chrome: LayoutChrome::for_viewer(current.user()),
        },
        StatusCode::OK,
    )
}

pub(super) async fn tech(current: CurrentUser) -> Response {
    render_template_response(
        AboutTechTemplate {
            chrome: LayoutChrome::for_viewer(current.user()),
        },
        StatusCode::OK,
    )
}
