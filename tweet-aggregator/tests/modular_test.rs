mod common;

use common::{init_tracing, timeline, tweet};
use regex::Regex;
use serde_json::json;
use std::cmp::Ordering;
use tweet_aggregator::fixtures::{sample_timeline, SAMPLE_SIZE};
use tweet_aggregator::{
    AggregatorError, ConfigurationError, CycleAccumulator, Feed, FeedFilter, FeedOptions, FilterTags, SortBy,
    Sorter, Tweet,
};

fn ids(tweets: &[Tweet]) -> Vec<&str> {
    tweets.iter().map(|t| t.id_str.as_str()).collect()
}

fn sample_number(tweet: &Tweet) -> u32 {
    tweet.id_str[tweet.id_str.len() - 4..].parse().unwrap()
}

#[test]
fn test_sample_timeline_shape() {
    let sample = sample_timeline();
    assert_eq!(sample.len(), SAMPLE_SIZE);
    assert_eq!(sample.iter().filter(|t| t.is_retweet()).count(), 5);
    assert!(sample.iter().all(|t| t.created_at_time().is_some()));
    assert_eq!(sample[0].created_at, "Thu Oct 01 12:00:00 +0000 2015");
    assert!(sample[9].text.ends_with("#10"));
}

#[test]
fn test_identity_filter_keeps_everything() {
    init_tracing();
    let filter = FeedFilter::compile("sample", &FeedOptions::default());
    assert!(filter.is_identity());
    assert_eq!(filter.apply(sample_timeline()).unwrap(), sample_timeline());
}

#[test]
fn test_remove_retweets_drops_exactly_the_retweets() {
    init_tracing();
    let sample = sample_timeline();
    let retweets = sample.iter().filter(|t| t.is_retweet()).count();

    let filter = FeedFilter::compile("sample", &FeedOptions::default().with_remove_retweets(true));
    let kept = filter.apply(sample.clone()).unwrap();

    assert_eq!(kept.len(), sample.len() - retweets);
    assert!(kept.iter().all(|t| !t.is_retweet()));
    let originals: Vec<Tweet> = sample.into_iter().filter(|t| !t.is_retweet()).collect();
    assert_eq!(kept, originals);
}

#[test]
fn test_tag_list_matches_equivalent_pattern() {
    init_tracing();
    let by_tags = FeedFilter::compile(
        "sample",
        &FeedOptions::default().with_filter_tags(FilterTags::tags(["01", "02"])),
    );
    let by_pattern = FeedFilter::compile(
        "sample",
        &FeedOptions::default().with_filter_tags(FilterTags::Pattern(Regex::new(r"#(?:01|02)\b").unwrap())),
    );

    let tagged = by_tags.apply(sample_timeline()).unwrap();
    let patterned = by_pattern.apply(sample_timeline()).unwrap();

    assert_eq!(tagged.len(), 2);
    assert_eq!(tagged, patterned);
    assert_eq!(tagged.iter().map(sample_number).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_tags_combine_with_retweet_removal() {
    let options = FeedOptions::default()
        .with_filter_tags(FilterTags::tags(["#01", "02", "03"]))
        .with_remove_retweets(true);
    let kept = FeedFilter::compile("sample", &options).apply(sample_timeline()).unwrap();
    assert_eq!(kept.iter().map(sample_number).collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn test_tags_are_case_insensitive_whole_hashtags() {
    let filter = FeedFilter::compile(
        "rustlang",
        &FeedOptions::default().with_filter_tags(FilterTags::tags(["Rust"])),
    );
    let items = vec![
        tweet("1", "Fri Jan 01 10:00:00 +0000 2016", "shipping #rust today"),
        tweet("2", "Fri Jan 01 11:00:00 +0000 2016", "all about #rustacean life"),
        tweet("3", "Fri Jan 01 12:00:00 +0000 2016", "no tags, just rust"),
        tweet("4", "Fri Jan 01 13:00:00 +0000 2016", "#RUST!"),
    ];
    let kept = filter.apply(items).unwrap();
    assert_eq!(ids(&kept), vec!["1", "4"]);
}

#[test]
fn test_tags_ending_in_symbols_match() {
    let filter = FeedFilter::compile(
        "cpp",
        &FeedOptions::default().with_filter_tags(FilterTags::tags(["c++", "01"])),
    );
    let items = vec![
        tweet("1", "Fri Jan 01 10:00:00 +0000 2016", "#c++ rocks"),
        tweet("2", "Fri Jan 01 11:00:00 +0000 2016", "learning #C++"),
        tweet("3", "Fri Jan 01 12:00:00 +0000 2016", "#c++x is not a thing"),
        tweet("4", "Fri Jan 01 13:00:00 +0000 2016", "#010 is not #01"),
        tweet("5", "Fri Jan 01 14:00:00 +0000 2016", "#010 only"),
    ];
    let kept = filter.apply(items).unwrap();
    assert_eq!(ids(&kept), vec!["1", "2", "4"]);
}

#[test]
fn test_empty_filters_are_identity() {
    let empty_list = FeedFilter::compile("a", &FeedOptions::default().with_filter_tags(FilterTags::tags(Vec::<String>::new())));
    let empty_pattern = FeedFilter::compile(
        "a",
        &FeedOptions::default().with_filter_tags(FilterTags::Pattern(Regex::new("").unwrap())),
    );
    assert!(empty_list.is_identity());
    assert!(empty_pattern.is_identity());
}

#[test]
fn test_malformed_filters_are_rejected_at_compile_time() {
    for value in [json!(42), json!({ "tag": "01" }), json!(["01", 2]), json!("(unclosed")] {
        let options = FeedOptions::default().with_filter_tags(FilterTags::from(value.clone()));
        let filter = FeedFilter::compile("broken", &options);
        let err = filter.check().expect_err(&format!("{} should be rejected", value));
        assert_eq!(err.screenname, "broken");
        assert!(filter.apply(sample_timeline()).is_err());
    }

    let blank = FeedFilter::compile("blank", &FeedOptions::default().with_filter_tags(FilterTags::tags(["  "])));
    assert!(blank.check().is_err());
}

#[test]
fn test_feed_deserializes_filter_shapes() {
    let feed: Feed = serde_json::from_value(json!({
        "screenname": "nasa",
        "filterTags": ["01", "02"],
        "removeRetweets": true
    }))
    .unwrap();
    assert_eq!(feed.screenname, "nasa");
    assert!(feed.options.remove_retweets);
    assert!(matches!(feed.options.filter_tags, Some(FilterTags::Tags(ref tags)) if tags == &["01", "02"]));

    let feed: Feed = serde_json::from_value(json!({ "screenname": "nasa", "filter_tags": "#(?:moon|mars)" })).unwrap();
    assert!(matches!(feed.options.filter_tags, Some(FilterTags::Pattern(_))));

    let feed: Feed = serde_json::from_value(json!({ "screenname": "nasa", "filterTags": 7 })).unwrap();
    assert!(matches!(feed.options.filter_tags, Some(FilterTags::Malformed(_))));
}

#[test]
fn test_feed_from_command_line_form() {
    let feed: Feed = "@nasa:01, 02".parse().unwrap();
    assert_eq!(feed.screenname, "nasa");
    assert!(matches!(feed.options.filter_tags, Some(FilterTags::Tags(ref tags)) if tags == &["01", "02"]));

    let plain: Feed = "spacex".parse().unwrap();
    assert!(plain.options.filter_tags.is_none());

    assert!(matches!(
        ":01".parse::<Feed>(),
        Err(ConfigurationError::EmptyScreenname { .. })
    ));
}

#[test]
fn test_default_sort_is_newest_first() {
    let sorted = Sorter::default().sort(sample_timeline());
    assert_eq!(sample_number(&sorted[0]), 10);
    assert_eq!(sample_number(&sorted[SAMPLE_SIZE - 1]), 1);
    assert!(sorted
        .windows(2)
        .all(|pair| pair[0].created_at_time() >= pair[1].created_at_time()));
}

#[test]
fn test_sort_is_stable_for_ties() {
    let at = "Fri Jan 01 12:00:00 +0000 2016";
    let items = vec![
        tweet("first-feed", at, "a"),
        tweet("older", "Thu Dec 31 12:00:00 +0000 2015", "b"),
        tweet("second-feed", at, "c"),
        tweet("unparseable", "yesterday", "d"),
        tweet("third-feed", at, "e"),
    ];
    let sorted = Sorter::default().sort(items);
    assert_eq!(
        ids(&sorted),
        vec!["first-feed", "second-feed", "third-feed", "older", "unparseable"]
    );
}

#[test]
fn test_oldest_and_named_orders() {
    let sorted = Sorter::new(SortBy::named("oldest").unwrap()).sort(timeline("a", 3));
    assert_eq!(ids(&sorted), vec!["a-2", "a-1", "a-0"]);

    assert!(matches!(SortBy::named("Newest"), Ok(SortBy::Recent)));
    assert!(matches!(
        SortBy::named("by_vibes"),
        Err(ConfigurationError::InvalidComparator { ref name }) if name == "by_vibes"
    ));
}

#[test]
fn test_custom_comparator_overrides_default_order() {
    // Even-numbered tweets first, each group oldest first.
    let order = SortBy::custom(|a, b| {
        let (a, b) = (sample_number(a), sample_number(b));
        (a % 2, a).cmp(&(b % 2, b))
    });
    let sorted = Sorter::new(order).sort(sample_timeline());

    assert_eq!(sample_number(&sorted[0]), 2);
    assert_eq!(sample_number(&sorted[SAMPLE_SIZE - 1]), 9);
    assert_eq!(
        sorted.iter().map(sample_number).collect::<Vec<_>>(),
        vec![2, 4, 6, 8, 10, 1, 3, 5, 7, 9]
    );

    let unchanged = Sorter::new(SortBy::custom(|_, _| Ordering::Equal)).sort(sample_timeline());
    assert_eq!(unchanged, sample_timeline());
}

#[test]
fn test_accumulator_flattens_in_registration_order() {
    let mut acc = CycleAccumulator::new(3);
    assert!(acc.record(2, timeline("c", 1)));
    assert!(acc.record(0, timeline("a", 2)));
    assert!(!acc.is_complete());
    assert!(acc.record(1, Vec::new()));
    assert!(acc.is_complete());

    let merged = acc.flatten().unwrap();
    assert_eq!(ids(&merged), vec!["a-0", "a-1", "c-0"]);
}

#[test]
fn test_accumulator_rejects_duplicates_and_strays() {
    init_tracing();
    let mut acc = CycleAccumulator::new(2);
    assert!(acc.record(0, timeline("a", 1)));
    assert!(!acc.record(0, timeline("b", 5)));
    assert!(!acc.record(7, timeline("c", 1)));

    match acc.flatten() {
        Err(AggregatorError::IncompleteCycle { filled, expected }) => {
            assert_eq!(filled, 1);
            assert_eq!(expected, 2);
        }
        other => panic!("expected IncompleteCycle, got {:?}", other.map(|v| v.len())),
    }
}
