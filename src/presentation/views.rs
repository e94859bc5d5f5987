use crate::application::{
    document::{Document, DocumentError},
    error::{ErrorReport, HttpError},
    render::{RenderFailure, RenderOutcome},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{format_description::BorrowedFormatItem, macros::format_description};

const MODIFIED_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

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

/// Error page carrying `report` for the response logger.
pub fn render_error_response(
    view: ErrorPageView,
    status: StatusCode,
    report: ErrorReport,
) -> Response {
    let mut response = render_template_response(ErrorTemplate { view }, status);
    report.attach(&mut response);
    response
}

#[derive(Clone, Debug)]
pub struct FooterView {
    pub origin: String,
    pub rate_limit: Option<u64>,
    pub rate_remaining: Option<u64>,
    pub modified: Option<String>,
}

impl FooterView {
    pub fn for_outcome(outcome: &RenderOutcome, document: &Document) -> Option<Self> {
        let modified = document
            .modified
            .to_offset_date_time()
            .and_then(|value| value.format(MODIFIED_FORMAT).ok());

        match outcome {
            RenderOutcome::CachedHit { .. } => Some(Self {
                origin: "Rendered from cache".to_string(),
                rate_limit: None,
                rate_remaining: None,
                modified,
            }),
            RenderOutcome::FreshRender {
                rate_limit,
                rate_remaining,
                ..
            } => Some(Self {
                origin: "Rendered from GitHub Markdown API.".to_string(),
                rate_limit: Some(*rate_limit),
                rate_remaining: Some(*rate_remaining),
                modified,
            }),
            RenderOutcome::RemoteFailure(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocumentView {
    pub title: String,
    pub body_html: String,
    pub footer: Option<FooterView>,
}

impl DocumentView {
    /// Page for a rendered outcome, or the failure that left nothing to show.
    pub fn from_outcome<'a>(
        document: &Document,
        outcome: &'a RenderOutcome,
    ) -> Result<Self, &'a RenderFailure> {
        if let RenderOutcome::RemoteFailure(failure) = outcome {
            return Err(failure);
        }

        Ok(Self {
            title: document_title(document),
            body_html: outcome.html().unwrap_or_default().to_string(),
            footer: FooterView::for_outcome(outcome, document),
        })
    }
}

#[derive(Template)]
#[template(path = "document.html")]
pub struct DocumentTemplate {
    pub view: DocumentView,
}

#[derive(Clone, Debug)]
pub struct ErrorPageView {
    pub title: String,
    pub lead: String,
    pub details: Vec<String>,
    pub hints: Vec<String>,
}

impl ErrorPageView {
    pub fn for_document_error(error: &DocumentError) -> Self {
        match error {
            DocumentError::RootMissing { root } => Self {
                title: "Error".to_string(),
                lead: format!(
                    "Configured document root {} is not a valid directory.",
                    root.display()
                ),
                details: vec![
                    "Ensure documents.root matches the directory your Markdown files live in."
                        .to_string(),
                ],
                hints: Vec::new(),
            },
            DocumentError::UnsupportedPath { extension, .. } => Self {
                title: "Error".to_string(),
                lead: "Unable to determine requested Markdown page.".to_string(),
                details: vec![format!("URI must end with a .{extension} file extension.")],
                hints: Vec::new(),
            },
            DocumentError::OutsideRoot { path } => Self {
                title: "Error".to_string(),
                lead: format!("Requested path {path} is outside the document root."),
                details: Vec::new(),
                hints: Vec::new(),
            },
            DocumentError::NotFound { path } => Self {
                title: "Error".to_string(),
                lead: format!("Unable to open {}", path.display()),
                details: vec![
                    "Ensure documents.root matches the directory your Markdown files live in."
                        .to_string(),
                ],
                hints: Vec::new(),
            },
            DocumentError::Io { path, .. } => Self {
                title: "Error".to_string(),
                lead: format!("Unable to read {}", path.display()),
                details: Vec::new(),
                hints: Vec::new(),
            },
        }
    }

    pub fn for_render_failure(failure: &RenderFailure, endpoint: &str) -> Self {
        let detail = match failure {
            RenderFailure::MalformedResponse => {
                "The API returned a response without a header block.".to_string()
            }
            RenderFailure::NotOk {
                rate_limit,
                rate_remaining,
                ..
            } => format!(
                "The API rejected the request (rate limit: {rate_limit}, remaining: {rate_remaining})."
            ),
            RenderFailure::Unreachable { message } => message.clone(),
        };

        Self {
            title: "Error".to_string(),
            lead: "Unable to access GitHub API".to_string(),
            details: vec![detail],
            hints: vec![
                "Check the configured remote.username and remote.token are correct".to_string(),
                format!("Is the GitHub API endpoint {endpoint} accessible?"),
                "Has the rate limit been exceeded? If so, wait until the next hour".to_string(),
            ],
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}

fn document_title(document: &Document) -> String {
    document
        .identity
        .as_path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Markdown preview".to_string())
}
