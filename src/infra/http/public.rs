use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header::CACHE_CONTROL},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::{
    application::{
        document::{DocumentError, DocumentResolver},
        error::{ErrorReport, document_error_status},
        render::{self, MarkdownRemote, RenderFailure},
    },
    infra::session::SessionStore,
    presentation::views::{
        DocumentTemplate, DocumentView, ErrorPageView, render_error_response,
        render_template_response,
    },
};

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub documents: Arc<DocumentResolver>,
    pub remote: Arc<dyn MarkdownRemote>,
    pub sessions: SessionStore,
    pub cookie_name: Arc<str>,
    /// Endpoint shown on the error page when the remote renderer fails.
    pub remote_label: Arc<str>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .fallback(render_document)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn render_document(
    State(state): State<HttpState>,
    jar: CookieJar,
    uri: Uri,
) -> Response {
    let document = match state.documents.open(uri.path()).await {
        Ok(document) => document,
        Err(err) => return document_error_response(&err),
    };

    let session_id = jar
        .get(&state.cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
    let session = state.sessions.attach(session_id);

    // The lock spans the remote call so one session renders one document at a time.
    let outcome = {
        let mut context = session.context.lock().await;
        render::render(
            &mut context,
            document.content.clone(),
            &document.identity,
            document.modified,
            state.remote.as_ref(),
        )
        .await
    };

    let mut response = match DocumentView::from_outcome(&document, &outcome) {
        Ok(view) => render_template_response(DocumentTemplate { view }, StatusCode::OK),
        Err(failure) => remote_failure_response(failure, &state.remote_label),
    };
    set_no_store(&mut response);

    if session.created {
        let cookie = Cookie::build((state.cookie_name.to_string(), session.id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        return (jar.add(cookie), response).into_response();
    }

    response
}

fn document_error_response(err: &DocumentError) -> Response {
    let status = document_error_status(err);
    let mut response = render_error_response(
        ErrorPageView::for_document_error(err),
        status,
        ErrorReport::from_error("infra::http::public::render_document", status, err),
    );
    set_no_store(&mut response);
    response
}

fn remote_failure_response(failure: &RenderFailure, endpoint: &str) -> Response {
    let status = StatusCode::BAD_GATEWAY;
    render_error_response(
        ErrorPageView::for_render_failure(failure, endpoint),
        status,
        ErrorReport::from_error("application::render", status, failure),
    )
}

fn set_no_store(response: &mut Response) {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
}
