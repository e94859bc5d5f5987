use std::{process, sync::Arc};

use askama::Template;
use mdpreview::{
    application::{
        document::{self, DocumentResolver},
        error::AppError,
        render::{self, SessionContext},
    },
    config::{self, RenderArgs, Settings},
    domain::types::SourceIdentity,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        remote::GitHubMarkdownClient,
        session::SessionStore,
        telemetry,
    },
    presentation::views::{DocumentTemplate, DocumentView},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let remote = GitHubMarkdownClient::new(&settings.remote)?;
    let remote_label: Arc<str> = Arc::from(remote.endpoint().as_str());

    let documents = DocumentResolver::new(
        settings.documents.root.clone(),
        settings.documents.extension.clone(),
    );
    if let Err(err) = documents.ensure_root().await {
        warn!(
            target = "mdpreview::serve",
            error = %err,
            "document root unavailable; requests will fail until it exists"
        );
    }

    let state = HttpState {
        documents: Arc::new(documents),
        remote: Arc::new(remote),
        sessions: SessionStore::new(settings.session.idle_ttl),
        cookie_name: Arc::from(settings.session.cookie_name.as_str()),
        remote_label,
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "mdpreview::serve",
        addr = %settings.server.addr,
        root = %settings.documents.root.display(),
        endpoint = %settings.remote.api_url,
        "preview server listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "mdpreview::serve", "preview server stopped");
    Ok(())
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let remote = GitHubMarkdownClient::new(&settings.remote)?;
    let document = document::load(SourceIdentity::new(args.file)).await?;

    let mut session = SessionContext::new();
    let outcome = render::render(
        &mut session,
        document.content.clone(),
        &document.identity,
        document.modified,
        &remote,
    )
    .await;

    let view = DocumentView::from_outcome(&document, &outcome)
        .map_err(|failure| AppError::from(failure.clone()))?;

    let output = if args.page {
        DocumentTemplate { view }
            .render()
            .map_err(|err| AppError::unexpected(format!("failed to render page: {err}")))?
    } else {
        view.body_html
    };

    println!("{output}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "mdpreview::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "mdpreview::serve", "shutdown requested");
}
