//! Cookie-authenticated client for X's private web GraphQL surface.
//!
//! Operation ids and feature flags are mined from the web client's served
//! bundles at runtime, with last-known values as fallback.

pub mod constants;
pub mod cookies;
pub mod discovery;
pub mod error;
pub mod features;
pub mod http;
pub mod post;
mod raw;
pub mod read;
pub mod routes;
pub mod search;
pub mod types;

#[cfg(test)]
mod test_support;

pub use {
    cookies::{CookieMap, CookieSources, CookieStatus},
    discovery::{
        BundleLocator, Discovery, DiscoverySource, MainBundle, NamedBundle, Operation, QueryInfo,
    },
    error::{Error, Result},
    http::{XClient, XClientConfig, XEndpoints},
    routes::XCookieRoutes,
    types::{
        Article, ArticleSummary, PostedTweet, SearchResults, Thread, Timeline, Tweet, TweetThread,
        UserTweets,
    },
};
