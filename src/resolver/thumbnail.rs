use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::configs::ResolverConfig;

/// Confirms thumbnail URLs point at a reachable image before they are rendered.
pub struct ThumbnailValidator {
    client: reqwest::Client,
    enabled: bool,
    timeout: Duration,
}

impl ThumbnailValidator {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled: config.validate_thumbnails,
            timeout: Duration::from_millis(config.thumbnail_timeout_ms),
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            enabled: false,
            timeout: Duration::ZERO,
        }
    }

    /// Returns the URL if it answers a HEAD with a 2xx image response, `None` otherwise.
    pub async fn validate(&self, url: Option<String>) -> Option<String> {
        let url = url?;
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return None;
        }
        if !self.enabled {
            return Some(url);
        }

        match self.client.head(&url).timeout(self.timeout).send().await {
            Ok(response) => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok());
                if response.status().is_success() && is_image_content_type(content_type) {
                    Some(url)
                } else {
                    debug!(
                        "Dropping thumbnail {} (status {}, type {:?})",
                        url,
                        response.status(),
                        content_type
                    );
                    None
                }
            }
            Err(e) => {
                debug!("Dropping thumbnail {}: {}", url, e);
                None
            }
        }
    }
}

pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| mime.trim().to_ascii_lowercase().starts_with("image/"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_types() {
        assert!(is_image_content_type(Some("image/jpeg")));
        assert!(is_image_content_type(Some("Image/WebP; charset=binary")));
        assert!(!is_image_content_type(Some("text/html; charset=utf-8")));
        assert!(!is_image_content_type(None));
    }

    #[tokio::test]
    async fn test_disabled_validator_passes_http_urls() {
        let validator = ThumbnailValidator::disabled();
        assert_eq!(
            validator.validate(Some("https://i.ytimg.com/vi/x/hq.jpg".into())).await,
            Some("https://i.ytimg.com/vi/x/hq.jpg".into())
        );
        assert_eq!(validator.validate(Some("file:///etc/passwd".into())).await, None);
        assert_eq!(validator.validate(None).await, None);
    }
}
