//! User-facing texts.

use crate::sink::ChoiceOption;

pub const GREETING: &str =
    "Hi! Send me a YouTube link and pick whether you want the video or just the audio.";

pub const USAGE: &str = "Send a YouTube link, then tap Video or Audio.\n\
    /cancel drops a link that is still waiting for a choice.";

pub const CHOICE_PROMPT: &str = "Video or audio?";

pub const DOWNLOADING: &str = "Downloading...";

pub const CANCELLED: &str = "Cancelled.";

pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

pub const CHOICE_EXPIRED: &str = "This request has expired";

pub const PENDING_CHOICE: &str =
    "Pick video or audio for the previous link first, or /cancel it.";

pub const UNSUPPORTED_SOURCE: &str = "I can't fetch this kind of link (playlists aren't supported).";

pub const DOWNLOAD_FAILED: &str = "Download failed :(";

pub const SEND_FAILED: &str = "Sending failed :(";

pub const CALLBACK_VIDEO: &str = "video";
pub const CALLBACK_AUDIO: &str = "audio";
pub const CALLBACK_CANCEL: &str = "cancel";

pub const CHOICE_OPTIONS: [ChoiceOption; 3] = [
    ChoiceOption {
        label: "Video",
        data: CALLBACK_VIDEO,
    },
    ChoiceOption {
        label: "Audio",
        data: CALLBACK_AUDIO,
    },
    ChoiceOption {
        label: "Cancel",
        data: CALLBACK_CANCEL,
    },
];
