//! Discord REST API client core.
//!
//! Implements the request dispatch and rate limit coordination layer for a
//! Discord bot: routes are resolved to rate limit buckets, requests to the
//! same bucket are serialized behind a gate, 429 responses are retried
//! transparently, and account-wide lockouts stall every bucket until they
//! clear.
//!
//! See: <https://discord.com/developers/docs/topics/rate-limits>

pub mod cache;
pub mod config;
pub mod http;
pub mod model;
pub mod ratelimit;
pub mod route;

pub use crate::{
    cache::Cache,
    config::Config,
    http::{Client, Error, RequestOptions},
    route::Route,
};

use const_format::formatcp;

/// Base URL of the Discord REST API.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// `User-Agent` sent with every request, in the form Discord requires of
/// bot libraries.
pub(crate) const USER_AGENT: &str = formatcp!(
    "DiscordBot (https://github.com/accord-rs/accord, {})",
    env!("CARGO_PKG_VERSION")
);
