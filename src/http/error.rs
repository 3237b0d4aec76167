use thiserror::Error;

/// Errors surfaced by the request dispatcher.
///
/// Rate limit responses are handled internally and never appear here except
/// as [`Error::RetriesExhausted`] once the attempt bound runs out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to perform HTTP request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Discord API returned an error: {code} - {message}")]
    Api {
        /// HTTP status of the response.
        status: u16,
        /// Discord error code, zero when the body carried none.
        ///
        /// See: <https://discord.com/developers/docs/topics/opcodes-and-status-codes#json>
        code: u64,
        /// Human-readable error message.
        message: String,
    },
    #[error("request {route} failed after {attempts} attempts")]
    RetriesExhausted { route: String, attempts: usize },
}
