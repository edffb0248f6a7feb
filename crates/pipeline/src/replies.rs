//! Filler replies for messages that are neither links nor commands.

use rand::Rng;

pub const FILLER_REPLIES: [&str; 3] = ["What?", "Didn't get that.", "Huh?"];

/// Pick one reply uniformly at random from [`FILLER_REPLIES`].
pub fn pick_reply<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FILLER_REPLIES[rng.random_range(0..FILLER_REPLIES.len())]
}
