// Static pages.

use axum::response::Html;

use crate::auth::OptionalUser;
use crate::error::AppResult;
use crate::templates::{self, AboutAuthorTemplate, AboutTechTemplate, PageChrome};

pub async fn about_author_handler(OptionalUser(viewer): OptionalUser) -> AppResult<Html<String>> {
    templates::render(AboutAuthorTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
    })
}

pub async fn about_tech_handler(OptionalUser(viewer): OptionalUser) -> AppResult<Html<String>> {
    templates::render(AboutTechTemplate {
        chrome: PageChrome::for_viewer(viewer.as_ref()),
    })
}
