use crate::types::{ConfigurationError, Tweet};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::sync::Arc;

pub type TweetComparator = Arc<dyn Fn(&Tweet, &Tweet) -> Ordering + Send + Sync>;

/// Ordering applied to a cycle's merged items. All variants sort stably.
#[derive(Clone, Default)]
pub enum SortBy {
    /// Most recent first; unparseable timestamps last.
    #[default]
    Recent,
    /// Oldest first; unparseable timestamps last.
    Oldest,
    Custom(TweetComparator),
}

impl SortBy {
    pub fn custom<F>(comparator: F) -> Self
    where
        F: Fn(&Tweet, &Tweet) -> Ordering + Send + Sync + 'static,
    {
        SortBy::Custom(Arc::new(comparator))
    }

    /// Resolve a strategy named in a config file.
    pub fn named(name: &str) -> Result<Self, ConfigurationError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "recent" | "newest" | "created_at" => Ok(SortBy::Recent),
            "oldest" => Ok(SortBy::Oldest),
            _ => Err(ConfigurationError::InvalidComparator { name: name.to_string() }),
        }
    }
}

impl fmt::Debug for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Recent => f.write_str("Recent"),
            SortBy::Oldest => f.write_str("Oldest"),
            SortBy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sorter {
    order: SortBy,
}

impl Sorter {
    pub fn new(order: SortBy) -> Self {
        Self { order }
    }

    pub fn sort(&self, mut items: Vec<Tweet>) -> Vec<Tweet> {
        match &self.order {
            SortBy::Recent => items.sort_by_cached_key(|tweet| {
                let time = tweet.created_at_time();
                (time.is_none(), Reverse(time))
            }),
            SortBy::Oldest => items.sort_by_cached_key(|tweet| {
                let time = tweet.created_at_time();
                (time.is_none(), time)
            }),
            SortBy::Custom(comparator) => items.sort_by(|a, b| comparator(a, b)),
        }
        items
    }
}
