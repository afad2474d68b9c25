use std::sync::LazyLock;

use regex::Regex;

static SPOTIFY_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://open\.spotify\.com/(?:intl-[a-z]{2}/)?(?:track|album|playlist|artist|episode)/[A-Za-z0-9]+|spotify:(?:track|album|playlist|artist|episode):[A-Za-z0-9]+)",
    )
    .ok()
});

pub fn is_spotify_link(query: &str) -> bool {
    SPOTIFY_LINK
        .as_ref()
        .is_some_and(|re| re.is_match(query.trim()))
}

pub fn is_url(query: &str) -> bool {
    let query = query.trim();
    query.starts_with("http://") || query.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spotify_links() {
        assert!(is_spotify_link(
            "https://open.spotify.com/track/4cOdK2wGLETKBW3PvgPWqT"
        ));
        assert!(is_spotify_link(
            "https://open.spotify.com/intl-de/album/1DFixLWuPkv3KT3TnV35m3?si=abc"
        ));
        assert!(is_spotify_link("spotify:track:4cOdK2wGLETKBW3PvgPWqT"));
        assert!(!is_spotify_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_spotify_link("never gonna give you up"));
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_url("  http://example.com/a.mp3"));
        assert!(!is_url("rick astley"));
    }
}
