use teloxide::{payloads::AnswerCallbackQuerySetters, prelude::*};

use {
    mediagrab_pipeline::{Choice, ChoiceHandled, MediaBot, messages},
    tracing::debug,
};

use crate::{
    error::Result,
    outbound::{handle_for, session_for_chat},
};

/// Route an inbound message to the bot service.
///
/// Messages without text (stickers, photos...) are treated as unrecognised
/// input and get a filler reply.
pub async fn handle_message(msg: Message, service: &MediaBot) -> Result<()> {
    if msg.from.as_ref().is_some_and(|user| user.is_bot) {
        debug!(chat_id = msg.chat.id.0, "ignoring message from a bot");
        return Ok(());
    }

    let session_id = session_for_chat(msg.chat.id);
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();
    let handled = service.handle_text(&session_id, text).await?;
    debug!(session_id = %session_id, ?handled, "telegram message handled");
    Ok(())
}

/// Route a keyboard press. The query is always answered so the client
/// stops showing its spinner, even when handling fails.
pub async fn handle_callback_query(
    query: CallbackQuery,
    bot: &Bot,
    service: &MediaBot,
) -> Result<()> {
    let choice = query.data.as_deref().and_then(Choice::from_callback_data);
    let prompt = query
        .message
        .as_ref()
        .map(|message| handle_for(message.chat().id, message.id()));

    let handled = match (choice, prompt) {
        (Some(choice), Some(prompt)) => {
            let session_id = prompt.session_id.clone();
            Some(service.handle_choice(&session_id, choice, Some(prompt)).await)
        },
        _ => {
            debug!(data = ?query.data, "callback without a usable choice");
            None
        },
    };

    let mut answer = bot.answer_callback_query(&query.id);
    if matches!(handled, Some(Ok(ChoiceHandled::Expired))) {
        answer = answer.text(messages::CHOICE_EXPIRED);
    }
    answer.await?;

    match handled {
        Some(Err(e)) => Err(e.into()),
        _ => Ok(()),
    }
}
