//! Recognises links the fetch engine is expected to handle.

use std::sync::LazyLock;

use regex::Regex;

/// Optional scheme and `www.`, a known host, a slash, then at least one character.
#[allow(clippy::expect_used)]
static SUPPORTED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:youtube|youtu)\.(?:com|be)/\S+")
        .expect("supported-url pattern compiles")
});

/// Returns `true` when `text` is a supported media link.
///
/// Surrounding whitespace is ignored; anything else in the message
/// (including a second word) makes it plain text.
pub fn is_supported_url(text: &str) -> bool {
    let text = text.trim();
    !text.contains(char::is_whitespace) && SUPPORTED_URL.is_match(text)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("https://youtu.be/abc123")]
    #[case("youtube.com/watch?v=x")]
    #[case("http://www.youtube.com/shorts/xyz")]
    #[case("www.youtu.be/abc")]
    #[case("HTTPS://YOUTUBE.COM/watch?v=Caps")]
    #[case("  https://youtu.be/padded  ")]
    fn supported(#[case] input: &str) {
        assert!(is_supported_url(input), "{input:?} should be supported");
    }

    #[rstest]
    #[case("hello world")]
    #[case("")]
    #[case("youtube.com")]
    #[case("youtube.com/")]
    #[case("https://vimeo.com/123")]
    #[case("ftp://youtube.com/watch?v=x")]
    #[case("look https://youtu.be/abc")]
    #[case("https://youtu.be/abc and more")]
    #[case("notyoutube.com/watch?v=x")]
    #[case("\u{0}\u{ffff}://")]
    fn unsupported(#[case] input: &str) {
        assert!(!is_supported_url(input), "{input:?} should not be supported");
    }
}
