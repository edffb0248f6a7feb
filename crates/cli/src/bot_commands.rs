use std::sync::Arc;

use {
    anyhow::{Result, bail},
    mediagrab_config::MediagrabConfig,
    mediagrab_pipeline::{MediaBot, MessagingSink, Pipeline},
    mediagrab_sessions::{PendingPolicy, SessionStore},
    mediagrab_telegram::TelegramSink,
    tracing::{info, warn},
};

fn pending_policy(config: &MediagrabConfig) -> PendingPolicy {
    if config.session.replace_pending {
        PendingPolicy::Replace
    } else {
        PendingPolicy::Reject
    }
}

/// Connect to Telegram and serve until Ctrl-C.
pub async fn run(config: MediagrabConfig) -> Result<()> {
    let bot = mediagrab_telegram::connect(&config.telegram).await?;

    let sink: Arc<dyn MessagingSink> = Arc::new(
        TelegramSink::new(bot.clone()).with_max_retries(config.telegram.retry_after_max_retries),
    );
    let sessions = Arc::new(SessionStore::new(pending_policy(&config)));
    let pipeline = Pipeline::from_config(&config, sessions, Arc::clone(&sink));
    let service = Arc::new(MediaBot::new(Arc::new(pipeline), sink));

    let cancel =
        mediagrab_telegram::start_polling(bot, service, config.telegram.poll_timeout_secs);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutting down");
            cancel.cancel();
        },
        () = cancel.cancelled() => {
            bail!("telegram polling stopped unexpectedly");
        },
    }
    Ok(())
}
