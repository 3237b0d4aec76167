//! Discord entity models.
//!
//! Plain structs with explicit field lists covering what the endpoint
//! wrappers need; nowhere near the full API surface. Snowflake IDs stay as
//! strings, matching the wire format.

use serde::Deserialize;

/// A Discord user.
///
/// See: <https://discord.com/developers/docs/resources/user#user-object>
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
    pub avatar: Option<String>,
}

/// A guild member.
///
/// See: <https://discord.com/developers/docs/resources/guild#guild-member-object>
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    pub nick: Option<String>,
    pub roles: Vec<String>,
}

/// A guild or DM channel.
///
/// See: <https://discord.com/developers/docs/resources/channel#channel-object>
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: Option<String>,
    pub guild_id: Option<String>,
}

/// A message in a channel.
///
/// See: <https://discord.com/developers/docs/resources/message#message-object>
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub author: User,
    pub content: String,
}
