//! Upstream aggregation: one module per platform, plus the shared
//! normalization and partial-result helpers.

pub mod assemble;
pub mod normalize;
pub mod storefront;
pub mod twitch;
pub mod youtube;

pub use storefront::{CartItems, CartRelay, StorefrontAggregator};
pub use twitch::{ChannelAggregator, Section, Sections};
pub use youtube::VideoAggregator;
