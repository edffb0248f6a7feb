use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {
    mediagrab_config::TelegramConfig,
    mediagrab_pipeline::{Command, MediaBot},
};

use crate::{error::Result, handlers};

/// Build the Bot API client and prepare the account for long polling.
///
/// Verifies the token, clears any webhook and registers the command menu.
pub async fn connect(config: &TelegramConfig) -> Result<Bot> {
    // Client timeout must outlast the long-polling timeout.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    let commands: Vec<_> = Command::ALL
        .iter()
        .map(|(command, description)| BotCommand::new(command.name(), *description))
        .collect();
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(
        username = ?me.username,
        "telegram bot connected (webhook cleared)"
    );
    Ok(bot)
}

/// Spawn the polling loop. It runs until the returned token is cancelled,
/// or until Telegram reports that another instance polls with this token,
/// in which case the loop cancels the token itself.
pub fn start_polling(bot: Bot, service: Arc<MediaBot>, poll_timeout_secs: u32) -> CancellationToken {
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();

    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let result = tokio::select! {
                () = loop_cancel.cancelled() => {
                    info!("telegram polling stopped");
                    break;
                },
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        dispatch(update.kind, &bot, &service).await;
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    error!("another instance is already polling with this token, stopping");
                    loop_cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                },
            }
        }
    });

    cancel
}

async fn dispatch(kind: UpdateKind, bot: &Bot, service: &MediaBot) {
    match kind {
        UpdateKind::Message(msg) => {
            debug!(chat_id = msg.chat.id.0, "received telegram message");
            if let Err(e) = handlers::handle_message(msg, service).await {
                error!(error = %e, "error handling telegram message");
            }
        },
        UpdateKind::CallbackQuery(query) => {
            debug!(callback_data = ?query.data, "received telegram callback query");
            if let Err(e) = handlers::handle_callback_query(query, bot, service).await {
                error!(error = %e, "error handling telegram callback query");
            }
        },
        other => {
            debug!("ignoring update: {other:?}");
        },
    }
}
