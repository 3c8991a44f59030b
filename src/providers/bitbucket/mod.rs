mod client;
mod provider;

pub use client::DEFAULT_BASE_URL;
pub use provider::BitbucketProvider;
