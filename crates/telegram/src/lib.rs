//! Telegram transport for mediagrab.
//!
//! Long-polls the Bot API with teloxide, routes messages and keyboard presses
//! to [`mediagrab_pipeline::MediaBot`], and implements the pipeline's
//! messaging sink on top of the Bot API.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{connect, start_polling},
    error::{Error, Result},
    outbound::TelegramSink,
};
