//! The download pipeline and the bot behaviour around it.
//!
//! [`MediaBot`] turns inbound messages and button presses into session
//! transitions and spawns a [`Pipeline`] run per confirmed request. Both talk
//! to the chat platform only through [`MessagingSink`].

pub mod bot;
pub mod messages;
pub mod orchestrator;
pub mod outcome;
pub mod replies;
pub mod sink;

#[cfg(test)]
mod testing;

pub use {
    bot::{Choice, ChoiceHandled, Command, MediaBot, TextHandled},
    orchestrator::{Pipeline, StatusSlot},
    outcome::{Delivery, PipelineOutcome},
    replies::{FILLER_REPLIES, pick_reply},
    sink::{ChoiceOption, MediaPayload, MessageHandle, MessagingSink, SinkError},
};
