pub mod models;
pub mod publishers;
pub mod resolvers;
pub mod services;
pub mod subsystems;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::models::config::{AppConfig, StorageConfig, load_config};
use crate::publishers::RealTelegramApi;
use crate::resolvers::{ContentResolver, LinkResolver, MirrorResolver};
use crate::services::classifier::Classifier;
use crate::services::diagnostics::{CorrelationCounter, DiagnosticsSink, FileCounterStore, OperatorChannel};
use crate::services::dispatcher::Dispatcher;
use crate::services::downloads::MediaDownloader;
use crate::services::fetcher::{DocumentFetcher, HttpPageFetcher};
use crate::services::normalizer::UrlNormalizer;
use crate::services::pipeline::Pipeline;
use crate::subsystems::PollerSubsystem;
use crate::traits::chat_transport::ChatTransport;
use crate::traits::page_fetcher::PageFetcher;

fn io_err(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// High-level entrypoint: load config, init logging, run the relay
pub async fn run_with_config_path(path: &str) -> std::io::Result<()> {
    let cfg: AppConfig =
        load_config(path).map_err(|e| std::io::Error::other(format!("Failed to load {}: {:#}", path, e)))?;

    // guard должен жить до конца процесса, иначе файловый лог теряет хвост
    let _log_guard = init_logging(&cfg.storage);

    run_relay(cfg).await
}

/// Structured logging to stdout (default `info` if RUST_LOG is not set),
/// plus a daily-rolling file when `storage.log_dir` is configured.
fn init_logging(storage: &StorageConfig) -> Option<WorkerGuard> {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let (file_layer, guard) = match storage.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "postrelay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false).compact();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(log_filter))
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .try_init();
    guard
}

/// Собирает сервисы по конфигурации и запускает подсистему опроса до сигнала завершения
pub async fn run_relay(cfg: AppConfig) -> std::io::Result<()> {
    info!("relay starting");
    let poller = build_poller(&cfg)?;

    Toplevel::new(|s: SubsystemHandle| async move {
        s.start(SubsystemBuilder::new("poller", |h: SubsystemHandle| poller.run(h)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(10))
    .await
    .map_err(io_err)?;

    info!("relay stopped");
    Ok(())
}

/// Wires transport, fetchers, resolvers and diagnostics into a ready poller.
pub fn build_poller(cfg: &AppConfig) -> std::io::Result<PollerSubsystem> {
    let timeout = Duration::from_secs(cfg.fetcher.request_timeout_secs);
    let user_agent = cfg.fetcher.user_agent.as_str();

    let transport: Arc<dyn ChatTransport> = Arc::new(
        RealTelegramApi::builder()
            .base_url(cfg.telegram.api_base_url.as_str())
            .token(cfg.telegram.bot_token.as_str())
            .build(),
    );

    let operator = Arc::new(OperatorChannel::new(
        Arc::clone(&transport),
        cfg.telegram.operator_chat_id,
        cfg.telegram.self_chat_id,
    ));
    let diagnostics = Arc::new(
        DiagnosticsSink::builder()
            .failures_log(cfg.storage.failures_log.as_str())
            .errors_log(cfg.storage.errors_log.as_str())
            .operator(Arc::clone(&operator))
            .build(),
    );
    let counter = CorrelationCounter::new(Box::new(
        FileCounterStore::builder().path(cfg.storage.counter_path.as_str()).build(),
    ));

    let pages: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::with_timeout(timeout).map_err(io_err)?);
    let fetcher = Arc::new(
        DocumentFetcher::builder()
            .pages(Arc::clone(&pages))
            .operator(Arc::clone(&operator))
            .max_attempts(cfg.fetcher.max_attempts)
            .retry_delay(Duration::from_millis(cfg.fetcher.retry_delay_ms))
            .user_agent(user_agent)
            .build(),
    );
    let normalizer = UrlNormalizer::builder()
        .short_link_pattern(&cfg.source.short_link_pattern)
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(io_err)?;
    let classifier = Classifier::builder()
        .fetcher(Arc::clone(&fetcher))
        .base_url(cfg.source.base_url.as_str())
        .short_video_hosts(&cfg.source.short_video_hosts)
        .image_hosts(&cfg.source.image_hosts)
        .build()
        .map_err(io_err)?;

    let video = MirrorResolver::builder()
        .pages(pages)
        .primary_url(cfg.mirrors.primary_url.as_str())
        .secondary_url(cfg.mirrors.secondary_url.as_str())
        .maybe_secondary_cookie(cfg.mirrors.secondary_cookie.clone())
        .rehost_base_url(cfg.mirrors.rehost_base_url.as_str())
        .user_agent(user_agent)
        .build();
    let link = LinkResolver::new(Arc::clone(&fetcher), cfg.source.image_host_pages.clone());
    let resolver = ContentResolver::new(video, link);

    let downloader = MediaDownloader::builder()
        .temp_dir(cfg.storage.temp_dir.as_str())
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(io_err)?;
    let dispatcher = Dispatcher::new(Arc::clone(&transport), downloader);

    let pipeline = Arc::new(
        Pipeline::builder()
            .transport(Arc::clone(&transport))
            .link_prefixes(cfg.source.link_prefixes.clone())
            .counter(counter)
            .normalizer(normalizer)
            .fetcher(fetcher)
            .classifier(classifier)
            .resolver(resolver)
            .dispatcher(dispatcher)
            .diagnostics(diagnostics)
            .build(),
    );

    Ok(PollerSubsystem::builder()
        .transport(transport)
        .pipeline(pipeline)
        .poll_timeout_secs(cfg.telegram.poll_timeout_secs)
        .build())
}
