pub mod types;
pub mod traits;
pub mod config;
pub mod credentials;
pub mod fetcher;
pub mod filter;
pub mod sort;
pub mod aggregator;
pub mod state;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod fixtures;

pub use types::*;
pub use traits::TimelineSource;
pub use config::{AggregatorConfig, FetchConfig};
pub use credentials::{CredentialResolver, Credentials, FetchMode};
pub use fetcher::{FeedFetcher, TwitterClient};
pub use filter::FeedFilter;
pub use sort::{SortBy, Sorter};
pub use aggregator::{AggregatorBuilder, CycleAccumulator, CycleReport, FeedFailure, TweetAggregator};
pub use state::{CacheStore, TweetCollection};
pub use pipeline::{CycleOutcome, CycleScheduler};
pub use report::Reporter;
