//! Price Feed Adapters
//!
//! Implementations of `PriceFeedPort`.

pub mod json_file;
pub mod static_feed;

pub use json_file::JsonFilePriceFeed;
pub use static_feed::StaticPriceFeed;
