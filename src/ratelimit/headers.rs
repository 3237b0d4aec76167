//! Rate limit response header parsing.
//!
//! Parsing is lenient: a missing or malformed header is treated as absent
//! rather than failing the request, since routes without local limits carry
//! none of these headers at all.

use std::time::Duration;

use reqwest::header::HeaderMap;

/// Rate limit information extracted from a response.
#[derive(Debug, Clone, Default)]
pub struct RateLimitHeaders {
    /// Requests remaining in the current window.
    pub remaining: Option<u64>,
    /// Time until the window resets, from `X-RateLimit-Reset-After` with
    /// `Retry-After` as a fallback.
    pub reset_after: Option<Duration>,
    /// Server-assigned bucket hash for the endpoint.
    pub bucket: Option<String>,
    /// Whether the limit applies account-wide rather than per bucket.
    pub global: bool,
}

impl RateLimitHeaders {
    /// Extracts rate limit headers from a response header map.
    pub fn parse(headers: &HeaderMap) -> Self {
        let reset_after = header_f64(headers, "x-ratelimit-reset-after")
            .or_else(|| header_f64(headers, "retry-after"))
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        RateLimitHeaders {
            remaining: header_u64(headers, "x-ratelimit-remaining"),
            reset_after,
            bucket: header_str(headers, "x-ratelimit-bucket").map(ToOwned::to_owned),
            global: header_str(headers, "x-ratelimit-global")
                .is_some_and(|text| text.parse().unwrap_or(false)),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name)?.parse().ok()
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    header_str(headers, name)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::RateLimitHeaders;

    fn map(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }

        headers
    }

    #[test]
    fn parses_full_set() {
        let parsed = RateLimitHeaders::parse(&map(&[
            ("x-ratelimit-remaining", "3"),
            ("x-ratelimit-reset-after", "2.5"),
            ("x-ratelimit-bucket", "abcd1234"),
        ]));

        assert_eq!(parsed.remaining, Some(3));
        assert_eq!(parsed.reset_after.unwrap().as_millis(), 2500);
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
    }

    #[test]
    fn absent_headers_parse_as_none() {
        let parsed = RateLimitHeaders::parse(&map(&[]));

        assert_eq!(parsed.remaining, None);
        assert_eq!(parsed.reset_after, None);
        assert_eq!(parsed.bucket, None);
        assert!(!parsed.global);
    }

    #[test]
    fn retry_after_is_a_fallback() {
        let parsed = RateLimitHeaders::parse(&map(&[("retry-after", "4")]));
        assert_eq!(parsed.reset_after.unwrap().as_secs(), 4);

        let parsed = RateLimitHeaders::parse(&map(&[
            ("retry-after", "4"),
            ("x-ratelimit-reset-after", "1.5"),
        ]));
        assert_eq!(parsed.reset_after.unwrap().as_millis(), 1500);
    }

    #[test]
    fn malformed_values_are_ignored() {
        let parsed = RateLimitHeaders::parse(&map(&[
            ("x-ratelimit-remaining", "many"),
            ("x-ratelimit-global", "yes"),
        ]));

        assert_eq!(parsed.remaining, None);
        assert!(!parsed.global);
    }

    #[test]
    fn out_of_range_reset_after_is_ignored() {
        let parsed = RateLimitHeaders::parse(&map(&[("x-ratelimit-reset-after", "-1.5")]));
        assert_eq!(parsed.reset_after, None);

        let parsed = RateLimitHeaders::parse(&map(&[("retry-after", "NaN")]));
        assert_eq!(parsed.reset_after, None);

        let parsed = RateLimitHeaders::parse(&map(&[("retry-after", "inf")]));
        assert_eq!(parsed.reset_after, None);
    }

    #[test]
    fn global_flag_parses() {
        let parsed = RateLimitHeaders::parse(&map(&[
            ("x-ratelimit-global", "true"),
            ("retry-after", "1"),
        ]));

        assert!(parsed.global);
    }
}
