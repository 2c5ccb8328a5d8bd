pub mod client;
pub mod retry;

pub use client::{endpoint, UpstreamClient, UpstreamRequest, UpstreamResponse};
