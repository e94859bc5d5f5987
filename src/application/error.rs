use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{document::DocumentError, render::RenderFailure},
    infra::error::InfraError,
};

/// Diagnostic attached to failed responses and picked up by the response logger.
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

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
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
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Status code a document lookup failure is reported with.
pub fn document_error_status(error: &DocumentError) -> StatusCode {
    match error {
        DocumentError::RootMissing { .. } | DocumentError::Io { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DocumentError::UnsupportedPath { .. } | DocumentError::OutsideRoot { .. } => {
            StatusCode::BAD_REQUEST
        }
        DocumentError::NotFound { .. } => StatusCode::NOT_FOUND,
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Render(#[from] RenderFailure),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let error = DocumentError::Io {
            path: PathBuf::from("/docs/a.md"),
            source: std::io::Error::other("disk on fire"),
        };
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "disk on fire");
    }

    #[test]
    fn document_errors_map_to_statuses() {
        assert_eq!(
            document_error_status(&DocumentError::NotFound {
                path: PathBuf::from("/a.md")
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            document_error_status(&DocumentError::UnsupportedPath {
                path: "/a.txt".to_string(),
                extension: "md".to_string(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            document_error_status(&DocumentError::RootMissing {
                root: PathBuf::from("/nowhere")
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
