use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use chapterdash::{
    application::{chapters::ChapterService, error::AppError},
    cache::{CacheBackend, CacheClient, CacheConfig, CacheInvalidator, CacheKeys, InMemoryBackend},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminGate, CacheWiring, HttpState, RateLimiter, RouterParts},
        redis::RedisBackend,
        telemetry,
    },
};
use serde_json::Value;
use tokio::sync::watch;
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

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
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
        config::Command::Seed(args) => run_seed(settings, args).await,
    }
}

/// Shared collaborators of every command that touches chapters.
struct Runtime {
    repositories: PostgresRepositories,
    cache_client: CacheClient,
    cache_keys: CacheKeys,
    chapters: Arc<ChapterService>,
}

impl Runtime {
    async fn init(settings: &config::Settings) -> Result<Self, AppError> {
        let repositories = init_repositories(settings).await?;
        let cache_client = init_cache_client(settings)?;
        let cache_keys = CacheKeys::new(settings.cache.namespace.clone());

        let repo = Arc::new(repositories.clone());
        let invalidator = CacheInvalidator::new(cache_client.clone(), cache_keys.clone());
        let chapters = Arc::new(ChapterService::new(repo.clone(), repo, invalidator));

        Ok(Self {
            repositories,
            cache_client,
            cache_keys,
            chapters,
        })
    }

    async fn shutdown(self) {
        if let Err(err) = self.cache_client.close().await {
            warn!(
                target = "chapterdash::main",
                error = %err,
                "failed to close cache backend cleanly"
            );
        }
        self.repositories.close().await;
        info!(target = "chapterdash::main", "connections closed");
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "database.url must be set (CHAPTERDASH__DATABASE__URL or --database-url)",
        ))
    })?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

fn init_cache_client(settings: &config::Settings) -> Result<CacheClient, AppError> {
    let backend: Arc<dyn CacheBackend> = match settings.redis.url.as_deref() {
        Some(url) => Arc::new(RedisBackend::open(url)?),
        None => {
            warn!(
                target = "chapterdash::main",
                "redis.url is not set; caching responses in process memory"
            );
            Arc::new(InMemoryBackend::new())
        }
    };

    let client = CacheClient::new(backend, settings.redis.call_timeout);
    info!(
        target = "chapterdash::main",
        backend = client.backend_name(),
        call_timeout_ms = settings.redis.call_timeout.as_millis() as u64,
        "cache backend configured"
    );
    Ok(client)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let runtime = Runtime::init(&settings).await?;

    let rate_limiter = RateLimiter::new(
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
        settings.rate_limit.max_requests.get(),
    );
    let purge_handle = spawn_rate_limit_purge(rate_limiter.clone());

    let router = http::build_router(RouterParts {
        state: HttpState {
            chapters: runtime.chapters.clone(),
        },
        cache: CacheWiring {
            client: runtime.cache_client.clone(),
            keys: runtime.cache_keys.clone(),
            config: CacheConfig::from(&settings.cache),
        },
        admin: AdminGate::new(settings.admin.api_key.clone()),
        rate_limiter,
        max_upload_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
    });

    if settings.admin.api_key.is_none() {
        warn!(
            target = "chapterdash::main",
            "admin.api_key is not set; chapter uploads will be rejected"
        );
    }

    let result = serve_http(&settings, router).await;

    purge_handle.abort();
    let _ = purge_handle.await;
    runtime.shutdown().await;

    result
}

fn spawn_rate_limit_purge(limiter: RateLimiter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            limiter.purge_expired();
        }
    })
}

async fn serve_http(settings: &config::Settings, router: axum::Router) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "chapterdash::main",
        addr = %settings.server.addr,
        "listening"
    );

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        let _ = stopping_rx.wait_for(|stopping| *stopping).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = deadline => {
            warn!(
                target = "chapterdash::main",
                grace_secs = grace.as_secs(),
                "in-flight requests did not drain in time; shutting down anyway"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "chapterdash::main", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "chapterdash::main", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(target = "chapterdash::main", "shutdown signal received");
}

async fn run_seed(settings: config::Settings, args: config::SeedArgs) -> Result<(), AppError> {
    let data = tokio::fs::read(&args.file)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let batch = match serde_json::from_slice::<Value>(&data) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            return Err(AppError::validation(format!(
                "{} must contain a JSON array of chapters",
                args.file.display()
            )));
        }
        Err(err) => {
            return Err(AppError::validation(format!(
                "{} is not valid JSON: {err}",
                args.file.display()
            )));
        }
    };

    let runtime = Runtime::init(&settings).await?;
    let result = runtime.chapters.replace_all(batch).await;
    let outcome = match result {
        Ok(report) => {
            for failed in &report.failed {
                warn!(
                    target = "chapterdash::seed",
                    error = %failed.error,
                    "chapter rejected"
                );
            }
            info!(
                target = "chapterdash::seed",
                file = %args.file.display(),
                attempted = report.attempted,
                inserted = report.success_count,
                failed = report.failed.len(),
                invalidated = report.invalidated,
                "seed complete"
            );
            Ok(())
        }
        Err(err) => Err(AppError::from(err)),
    };

    runtime.shutdown().await;
    outcome
}
