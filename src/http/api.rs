//! Endpoint wrappers.
//!
//! A deliberately small selection of REST endpoints, each one a route
//! construction plus a dispatch through [`Client::request`]. Successfully
//! parsed entities are pushed into the client's cache; lookups consult it
//! first to reduce network load.

use serde_json::json;

use super::{Client, RequestOptions, Result};
use crate::{
    model::{Channel, Member, Message},
    route::Route,
};

impl Client {
    /// Retrieves a channel by ID, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the channel does not exist.
    pub async fn get_channel(&self, channel_id: u64) -> Result<Channel> {
        if let Some(channel) = self.cache.channels.get(channel_id).await {
            return Ok(channel);
        }

        let route = Route::get("/channels/{channel_id}").channel_id(channel_id);
        let channel: Channel = self.request_json(route, RequestOptions::new()).await?;

        self.cache.channels.insert(channel_id, channel.clone()).await;

        Ok(channel)
    }

    /// Retrieves the most recent messages in a channel, newest first.
    ///
    /// # Arguments
    ///
    /// * `limit` - Number of messages to fetch, 1-100
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the channel is inaccessible.
    pub async fn get_channel_messages(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<Message>> {
        let route = Route::get("/channels/{channel_id}/messages").channel_id(channel_id);
        let options = RequestOptions::new().query("limit", limit);

        self.request_json(route, options).await
    }

    /// Sends a message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the bot cannot post in the
    /// channel.
    pub async fn create_message(&self, channel_id: u64, content: &str) -> Result<Message> {
        let route = Route::post("/channels/{channel_id}/messages").channel_id(channel_id);
        let options = RequestOptions::new().json(json!({ "content": content }));

        let message: Message = self.request_json(route, options).await?;

        if let Ok(id) = message.id.parse() {
            self.cache.messages.insert(id, message.clone()).await;
        }

        Ok(message)
    }

    /// Deletes a message, optionally recording a reason in the guild's audit
    /// log.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the message is already gone.
    pub async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
        reason: Option<&str>,
    ) -> Result<()> {
        let route = Route::delete("/channels/{channel_id}/messages/{message_id}")
            .channel_id(channel_id)
            .param("message_id", message_id);

        let mut options = RequestOptions::new();
        if let Some(reason) = reason {
            options = options.reason(reason);
        }

        self.request(route, options).await?;
        self.cache.messages.remove(message_id).await;

        Ok(())
    }

    /// Retrieves a guild member, consulting the cache first.
    ///
    /// # Arguments
    ///
    /// * `guild_id` - Guild (server) ID
    /// * `user_id` - Discord user ID
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the user is not a member of
    /// the guild.
    pub async fn get_guild_member(&self, guild_id: u64, user_id: u64) -> Result<Member> {
        if let Some(member) = self.cache.members.get(user_id).await {
            return Ok(member);
        }

        let route = Route::get("/guilds/{guild_id}/members/{user_id}")
            .guild_id(guild_id)
            .param("user_id", user_id);

        let member: Member = self.request_json(route, RequestOptions::new()).await?;

        self.cache.members.insert(user_id, member.clone()).await;

        Ok(member)
    }

    /// Executes a webhook, optionally uploading files alongside the message.
    ///
    /// # Arguments
    ///
    /// * `files` - `(filename, contents)` pairs sent as multipart parts
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the webhook token is invalid.
    pub async fn execute_webhook(
        &self,
        webhook_id: u64,
        token: &str,
        content: &str,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<()> {
        let route = Route::post("/webhooks/{webhook_id}/{webhook_token}")
            .webhook_id(webhook_id)
            .webhook_token(token);

        let mut options = RequestOptions::new().json(json!({ "content": content }));
        for (filename, data) in files {
            options = options.file(&filename, data);
        }

        self.request(route, options).await?;

        Ok(())
    }
}
