//! Response rendering helpers.
//!
//! [`Renderer`] is usually seeded into the resolver as a shared instance and
//! injected into handlers that render JSON or templates.

use crate::error::MochiError;
use crate::response::Response;
use http::{HeaderMap, StatusCode};
use minijinja::Environment;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Renders serializable data as a JSON response.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    /// Builds a JSON response with the given status and extra headers.
    pub fn render<T: Serialize + ?Sized>(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        data: &T,
    ) -> Response {
        let mut response = Response::json(status, data);
        response.headers_mut().extend(headers);
        response
    }
}

/// Renders MiniJinja templates loaded from a views directory.
pub struct TemplateRenderer {
    env: Environment<'static>,
    views_path: Option<PathBuf>,
}

impl TemplateRenderer {
    /// Creates a renderer that loads templates from `views_path` on demand.
    pub fn new(views_path: impl AsRef<Path>) -> Self {
        let views_path = views_path.as_ref().to_path_buf();
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&views_path));
        Self {
            env,
            views_path: Some(views_path),
        }
    }

    /// Creates a renderer with no directory; templates must be added explicitly.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            env: Environment::new(),
            views_path: None,
        }
    }

    /// Registers a template from source.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), MochiError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|e| MochiError::internal_with_source(format!("invalid template `{name}`"), e))
    }

    /// Returns the views directory, if any.
    #[must_use]
    pub fn views_path(&self) -> Option<&Path> {
        self.views_path.as_deref()
    }

    /// Renders `template` with `context`.
    pub fn render<S: Serialize>(&self, template: &str, context: S) -> Result<String, MochiError> {
        let compiled = self.env.get_template(template).map_err(|e| {
            MochiError::internal_with_source(format!("template `{template}` not found"), e)
        })?;
        compiled.render(context).map_err(|e| {
            MochiError::internal_with_source(format!("failed to render template `{template}`"), e)
        })
    }
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("views_path", &self.views_path)
            .finish_non_exhaustive()
    }
}

/// JSON and template rendering for handlers.
///
/// # Example
///
/// ```rust
/// use mochi_core::renderer::{Renderer, TemplateRenderer};
/// use http::{HeaderMap, StatusCode};
///
/// let mut templates = TemplateRenderer::in_memory();
/// templates.add_template("hello.html", "Hello {{ name }}!").unwrap();
/// let renderer = Renderer::new().with_templates(templates);
///
/// let response = renderer
///     .render_template(StatusCode::OK, "hello.html", &serde_json::json!({"name": "Ada"}), HeaderMap::new())
///     .unwrap();
/// assert_eq!(response.body().to_bytes().as_ref(), b"Hello Ada!");
/// ```
#[derive(Debug, Default)]
pub struct Renderer {
    json: JsonRenderer,
    templates: Option<TemplateRenderer>,
}

impl Renderer {
    /// Creates a renderer without template support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables template rendering.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateRenderer) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Returns the template renderer, if configured.
    #[must_use]
    pub fn templates(&self) -> Option<&TemplateRenderer> {
        self.templates.as_ref()
    }

    /// Renders `data` as a JSON response.
    pub fn render_json<T: Serialize + ?Sized>(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        data: &T,
    ) -> Response {
        self.json.render(status, headers, data)
    }

    /// Renders a template into an HTML response.
    pub fn render_template<S: Serialize>(
        &self,
        status: StatusCode,
        template: &str,
        data: S,
        headers: HeaderMap,
    ) -> Result<Response, MochiError> {
        let templates = self
            .templates
            .as_ref()
            .ok_or_else(|| MochiError::internal("template rendering is not configured"))?;
        let body = templates.render(template, data)?;

        let mut response = Response::text(status, body);
        response.headers_mut().extend(headers);
        Ok(response)
    }
}
