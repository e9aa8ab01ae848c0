//! HTML page templates
//!
//! Three Handlebars templates rendered with named variables. Built-in
//! defaults are compiled in; `templates.dir` can override any of them
//! with `<name>.hbs` files.

use axum::response::Html;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;

use crate::error::AppError;

/// Pages the application renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Entry page; variables: `login_url`
    Index,
    /// Implicit-flow callback; variables: `client_id`, `app_domain`
    OAuthCallback,
    /// Gated page; variables: `email`
    PrivateArea,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Index, Page::OAuthCallback, Page::PrivateArea];

    pub fn name(self) -> &'static str {
        match self {
            Page::Index => "index",
            Page::OAuthCallback => "oauth",
            Page::PrivateArea => "private_area",
        }
    }

    fn default_source(self) -> &'static str {
        match self {
            Page::Index => include_str!("../templates/index.hbs"),
            Page::OAuthCallback => include_str!("../templates/oauth.hbs"),
            Page::PrivateArea => include_str!("../templates/private_area.hbs"),
        }
    }
}

/// Compiled page templates
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Compile templates, preferring files in `dir` when present
    ///
    /// # Errors
    /// Returns `Template` if an override cannot be read or does not compile
    pub fn load(dir: Option<&Path>) -> Result<Self, AppError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        for page in Page::ALL {
            let override_path = dir.map(|dir| dir.join(format!("{}.hbs", page.name())));

            match override_path.filter(|path| path.is_file()) {
                Some(path) => {
                    let source = std::fs::read_to_string(&path).map_err(|e| {
                        AppError::Template(format!("Failed to read {}: {}", path.display(), e))
                    })?;
                    registry.register_template_string(page.name(), source)?;
                    tracing::info!(template = page.name(), path = %path.display(), "Template override loaded");
                }
                None => {
                    registry.register_template_string(page.name(), page.default_source())?;
                }
            }
        }

        Ok(Self { registry })
    }

    /// Render `page` with `data`; values are HTML-escaped
    pub fn render<T: Serialize>(&self, page: Page, data: &T) -> Result<Html<String>, AppError> {
        Ok(Html(self.registry.render(page.name(), data)?))
    }
}
