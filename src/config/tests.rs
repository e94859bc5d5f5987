use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_target_github_markdown_api() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.remote.api_url.as_str(), DEFAULT_API_URL);
    assert_eq!(settings.remote.timeout, Duration::from_secs(10));
    assert_eq!(settings.remote.user_agent, DEFAULT_USER_AGENT);
    assert!(settings.remote.token.is_none());
    assert_eq!(settings.documents.extension, "md");
    assert_eq!(settings.session.cookie_name, "mdpreview_session");
    assert_eq!(settings.session.idle_ttl, Duration::from_secs(1440));
    assert_eq!(settings.documents.root, std::path::Path::new("."));
    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = RawSettings::default();
    raw.remote.timeout_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero timeout must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "remote.timeout_seconds",
            ..
        }
    ));
}

#[test]
fn username_without_token_is_rejected() {
    let mut raw = RawSettings::default();
    raw.remote.username = Some("octocat".to_string());

    let err = Settings::from_raw(raw).expect_err("token required");
    assert!(matches!(err, LoadError::Invalid { key: "remote.token", .. }));
}

#[test]
fn blank_credentials_are_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.remote.username = Some("  ".to_string());
    raw.remote.token = Some("".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.remote.username.is_none());
    assert!(settings.remote.token.is_none());
}

#[test]
fn non_http_api_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.remote.api_url = Some("ftp://example.com/markdown".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn extension_is_normalised() {
    let mut raw = RawSettings::default();
    raw.documents.extension = Some(".markdown".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.documents.extension, "markdown");
}

#[test]
fn invalid_cookie_name_is_rejected() {
    let mut raw = RawSettings::default();
    raw.session.cookie_name = Some("bad name;".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["mdpreview"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "mdpreview",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--document-root",
        "/srv/docs",
        "--remote-timeout-seconds",
        "3",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.document_root.as_deref(),
                Some(std::path::Path::new("/srv/docs"))
            );
            assert_eq!(serve.overrides.remote.timeout_seconds, Some(3));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "mdpreview",
        "render",
        "--page",
        "--remote-api-url",
        "http://localhost:9000/markdown/raw",
        "README.md",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert!(render.page);
            assert_eq!(render.file, std::path::Path::new("README.md"));
            assert_eq!(
                render.remote.api_url.as_deref(),
                Some("http://localhost:9000/markdown/raw")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn zero_session_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.session.idle_ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "session.idle_ttl_seconds",
            ..
        }
    ));
}
