use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.database.url, None);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.redis.url, None);
    assert_eq!(settings.redis.call_timeout, Duration::from_millis(250));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.namespace, "chapters");
    assert_eq!(settings.cache.ttl_seconds.get(), 3600);
    assert_eq!(settings.cache.list_ttl_seconds, None);
    assert_eq!(settings.cache.max_body_bytes.get(), 1_048_576);
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert_eq!(settings.rate_limit.window_seconds.get(), 60);
    assert_eq!(settings.rate_limit.max_requests.get(), 30);
    assert_eq!(settings.admin.api_key, None);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.ttl_seconds = Some(60);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        cache_ttl_seconds: Some(120),
        admin_api_key: Some("s3cret".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.ttl_seconds.get(), 120);
    assert_eq!(settings.admin.api_key.as_deref(), Some("s3cret"));
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
fn blank_urls_and_keys_count_as_unset() {
    let mut raw = RawSettings::default();
    raw.redis.url = Some("   ".to_string());
    raw.admin.api_key = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.redis.url, None);
    assert_eq!(settings.admin.api_key, None);
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.rate_limit.max_requests = Some(0);
    let err = Settings::from_raw(raw).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.max_requests",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.cache.item_ttl_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.item_ttl_seconds",
            ..
        })
    ));
}

#[test]
fn namespace_must_not_contain_delimiter() {
    let mut raw = RawSettings::default();
    raw.cache.namespace = Some("chap:ters".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.namespace",
            ..
        })
    ));
}

#[test]
fn admin_key_is_redacted_in_debug_output() {
    let admin = AdminSettings {
        api_key: Some("s3cret".to_string()),
    };
    let rendered = format!("{admin:?}");
    assert!(!rendered.contains("s3cret"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["chapterdash"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "chapterdash",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_seed_arguments() {
    let args = CliArgs::parse_from([
        "chapterdash",
        "seed",
        "--database-url",
        "postgres://example",
        "/tmp/chapters.json",
    ]);

    match args.command.expect("seed command") {
        Command::Seed(seed) => {
            assert_eq!(
                seed.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(seed.file, std::path::Path::new("/tmp/chapters.json"));
        }
        _ => panic!("wrong command parsed"),
    }
}
