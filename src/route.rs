//! API route descriptors.
//!
//! A [`Route`] describes a single REST call: HTTP method, path template and
//! the substituted path parameters. The parameters Discord partitions rate
//! limits by (channel, guild and webhook identifiers, the "major parameters")
//! are recorded separately so the rate limiter can derive bucket keys from
//! them.

use std::fmt::{self, Display, Formatter};

use reqwest::Method;

/// Immutable descriptor of one Discord REST call.
///
/// Built from a path template with `{name}` placeholders; builder methods
/// substitute parameters into the path. Major parameters are additionally
/// recorded for bucket key derivation.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    template: &'static str,
    path: String,
    channel_id: Option<u64>,
    guild_id: Option<u64>,
    webhook_id: Option<u64>,
    webhook_token: Option<String>,
}

impl Route {
    /// Creates a route from a method and a path template.
    pub fn new(method: Method, template: &'static str) -> Self {
        Route {
            method,
            template,
            path: template.to_owned(),
            channel_id: None,
            guild_id: None,
            webhook_id: None,
            webhook_token: None,
        }
    }

    /// Creates a `GET` route.
    pub fn get(template: &'static str) -> Self {
        Self::new(Method::GET, template)
    }

    /// Creates a `POST` route.
    pub fn post(template: &'static str) -> Self {
        Self::new(Method::POST, template)
    }

    /// Creates a `PATCH` route.
    pub fn patch(template: &'static str) -> Self {
        Self::new(Method::PATCH, template)
    }

    /// Creates a `PUT` route.
    pub fn put(template: &'static str) -> Self {
        Self::new(Method::PUT, template)
    }

    /// Creates a `DELETE` route.
    pub fn delete(template: &'static str) -> Self {
        Self::new(Method::DELETE, template)
    }

    /// Substitutes the `{channel_id}` placeholder and records the channel as
    /// a major parameter.
    pub fn channel_id(mut self, id: u64) -> Self {
        self.channel_id = Some(id);
        self.fill("channel_id", id);
        self
    }

    /// Substitutes the `{guild_id}` placeholder and records the guild as a
    /// major parameter.
    pub fn guild_id(mut self, id: u64) -> Self {
        self.guild_id = Some(id);
        self.fill("guild_id", id);
        self
    }

    /// Substitutes the `{webhook_id}` placeholder and records the webhook as
    /// a major parameter.
    pub fn webhook_id(mut self, id: u64) -> Self {
        self.webhook_id = Some(id);
        self.fill("webhook_id", id);
        self
    }

    /// Substitutes the `{webhook_token}` placeholder and records the token as
    /// a major parameter.
    pub fn webhook_token(mut self, token: &str) -> Self {
        self.webhook_token = Some(token.to_owned());
        self.fill("webhook_token", token);
        self
    }

    /// Substitutes a non-major placeholder such as `{message_id}`.
    pub fn param(mut self, name: &str, value: impl Display) -> Self {
        self.fill(name, value);
        self
    }

    fn fill(&mut self, name: &str, value: impl Display) {
        self.path = self
            .path
            .replace(&format!("{{{name}}}"), &value.to_string());
    }

    /// HTTP method of the call.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Fully substituted request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Endpoint signature: method plus the unsubstituted template.
    ///
    /// Server-assigned bucket hashes are learned per signature, so every
    /// route instantiated from the same template shares one signature no
    /// matter which parameters were filled in.
    pub fn signature(&self) -> String {
        format!("{}:{}", self.method, self.template)
    }

    /// Major parameter portion of the bucket key.
    ///
    /// Routes that differ only in these values must land in distinct buckets
    /// even when they share an endpoint signature.
    pub(crate) fn major_parameters(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            OptId(self.channel_id),
            OptId(self.guild_id),
            OptId(self.webhook_id),
            self.webhook_token.as_deref().unwrap_or("none"),
        )
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

struct OptId(Option<u64>);

impl Display for OptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Route;

    #[test]
    fn substitutes_placeholders() {
        let route = Route::get("/channels/{channel_id}/messages/{message_id}")
            .channel_id(123)
            .param("message_id", 456);

        assert_eq!(route.path(), "/channels/123/messages/456");
        assert_eq!(route.to_string(), "GET /channels/123/messages/456");
    }

    #[test]
    fn signature_ignores_substitutions() {
        let a = Route::get("/channels/{channel_id}/messages").channel_id(1);
        let b = Route::get("/channels/{channel_id}/messages").channel_id(2);

        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn major_parameters_separate_channels() {
        let a = Route::get("/channels/{channel_id}/messages").channel_id(1);
        let b = Route::get("/channels/{channel_id}/messages").channel_id(2);

        assert_ne!(a.major_parameters(), b.major_parameters());
    }

    #[test]
    fn webhook_token_is_major() {
        let a = Route::post("/webhooks/{webhook_id}/{webhook_token}")
            .webhook_id(9)
            .webhook_token("abc");
        let b = Route::post("/webhooks/{webhook_id}/{webhook_token}")
            .webhook_id(9)
            .webhook_token("def");

        assert_eq!(a.path(), "/webhooks/9/abc");
        assert_ne!(a.major_parameters(), b.major_parameters());
    }
}
