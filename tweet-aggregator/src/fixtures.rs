//! Built-in timeline served in test mode when no `test_data` is injected.

use crate::types::{Tweet, TWITTER_DATE_FORMAT};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// 2015-10-01T12:00:00Z
const FIRST_TWEET_TIMESTAMP: i64 = 1_443_700_800;
const SECONDS_PER_DAY: i64 = 86_400;
pub const SAMPLE_SCREENNAME: &str = "birdwatch_sample";
pub const SAMPLE_SIZE: usize = 10;

/// Ten tweets, `#01` through `#10`, one per day starting 2015-10-01 and listed
/// oldest first. Even-numbered tweets are retweets.
pub fn sample_timeline() -> Vec<Tweet> {
    (1..=SAMPLE_SIZE as i64)
        .filter_map(|n| {
            let posted = DateTime::<Utc>::from_timestamp(FIRST_TWEET_TIMESTAMP + (n - 1) * SECONDS_PER_DAY, 0)?;
            Some(sample_tweet(n, posted))
        })
        .collect()
}

fn sample_tweet(n: i64, posted: DateTime<Utc>) -> Tweet {
    let id = format!("65000000000000{:04}", n);
    let mut tweet = Tweet::new(
        id.clone(),
        posted.format(TWITTER_DATE_FORMAT).to_string(),
        format!("Sample tweet number {} #{:02}", n, n),
    );
    tweet.extra.insert("user".to_string(), json!({ "screen_name": SAMPLE_SCREENNAME }));

    if n % 2 == 0 {
        tweet = tweet.with_retweeted_status(retweeted_original(n));
    }
    tweet
}

fn retweeted_original(n: i64) -> Value {
    json!({
        "id_str": format!("64000000000000{:04}", n),
        "user": { "screen_name": "someone_else" },
    })
}
