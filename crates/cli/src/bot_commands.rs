use std::{path::Path, sync::Arc};

use {
    anyhow::Result,
    flowrelay_analytics::AnalyticsRecorder,
    flowrelay_chat::{ChatOrchestrator, Command},
    flowrelay_config::{Diagnostic, FlowrelayConfig, Severity, check_config, discover_and_load},
    flowrelay_metrics::{MetricsRecorderConfig, init_metrics},
    flowrelay_sessions::SessionStore,
    flowrelay_telegram::{TelegramBotConfig, TelegramOutbound, start_polling},
    tracing::{debug, error, info, warn},
};

use crate::interact_commands::backend_client;

/// Load config, wire every component and poll Telegram until ctrl-c.
pub async fn run(path: Option<&Path>) -> Result<()> {
    let (config, config_path) = discover_and_load(path)?;
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found, using defaults and environment"),
    }

    let diagnostics = check_config(&config);
    log_diagnostics(&diagnostics);
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        anyhow::bail!("invalid configuration; run `flowrelay check-config` for details");
    }

    let _metrics = init_metrics(metrics_config(&config))?;

    let bot = telegram_config(&config).build_bot()?;
    let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
    let backend = Arc::new(backend_client(&config)?);
    let sessions = Arc::new(SessionStore::new());
    let analytics = Arc::new(AnalyticsRecorder::new());

    let orchestrator = Arc::new(
        ChatOrchestrator::new(backend, outbound.clone(), sessions, analytics)
            .with_transcripts(config.backend.transcripts_active()),
    );

    let commands: Vec<(&str, &str)> = Command::ALL
        .into_iter()
        .map(|c| (c.name(), c.description()))
        .collect();
    let handle = start_polling(
        bot,
        config.telegram.poll_timeout_secs,
        &commands,
        outbound,
        orchestrator,
    )
    .await?;

    let cancel = handle.cancel_token();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("received ctrl-c, shutting down");
            cancel.cancel();
        },
        () = cancel.cancelled() => {},
    }
    handle.join().await;

    Ok(())
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => debug!(path = %d.path, "{}", d.message),
        }
    }
}

fn telegram_config(config: &FlowrelayConfig) -> TelegramBotConfig {
    TelegramBotConfig {
        token: config.telegram.token.clone(),
        api_url: config.telegram.api_url.clone(),
        poll_timeout_secs: config.telegram.poll_timeout_secs,
    }
}

fn metrics_config(config: &FlowrelayConfig) -> MetricsRecorderConfig {
    MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        listen: config.metrics.listen,
        global_labels: vec![("service".into(), "flowrelay".into())],
    }
}
