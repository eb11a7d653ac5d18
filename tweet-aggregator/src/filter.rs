use crate::types::{FeedOptions, FilterTags, InvalidFilterError, Tweet};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Build the pattern that matches any of `tags` as a hashtag.
///
/// Tags may be given with or without the leading `#`. Matching is case-insensitive
/// and the tag must be followed by a non-word character or the end of the text,
/// so `01` matches `#01` but not `#010`, and `c++` matches `#c++ rocks`.
pub fn hashtag_pattern<S: AsRef<str>>(tags: &[S]) -> Option<Regex> {
    let alternatives: Vec<String> = tags
        .iter()
        .map(|tag| tag.as_ref().trim().trim_start_matches('#'))
        .filter(|tag| !tag.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    RegexBuilder::new(&format!(r"#(?:{})(?:$|[^\w])", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .ok()
}

#[derive(Debug, Clone)]
enum TagMatcher {
    Any,
    Pattern(Regex),
}

/// A feed's inclusion rules, resolved once when the feed is registered.
#[derive(Debug, Clone)]
pub struct FeedFilter {
    remove_retweets: bool,
    tags: Result<TagMatcher, InvalidFilterError>,
}

impl FeedFilter {
    pub fn compile(screenname: &str, options: &FeedOptions) -> Self {
        let tags = match &options.filter_tags {
            None => Ok(TagMatcher::Any),
            Some(FilterTags::Pattern(regex)) if regex.as_str().is_empty() => Ok(TagMatcher::Any),
            Some(FilterTags::Pattern(regex)) => Ok(TagMatcher::Pattern(regex.clone())),
            Some(FilterTags::Tags(tags)) if tags.iter().all(|t| t.trim().is_empty()) => {
                if tags.is_empty() {
                    Ok(TagMatcher::Any)
                } else {
                    Err(invalid(screenname, options, "tags are blank"))
                }
            }
            Some(FilterTags::Tags(tags)) => hashtag_pattern(tags)
                .map(TagMatcher::Pattern)
                .ok_or_else(|| invalid(screenname, options, "tags do not form a valid pattern")),
            Some(FilterTags::Malformed(_)) => Err(invalid(
                screenname,
                options,
                "expected a regex or a list of strings",
            )),
        };

        Self {
            remove_retweets: options.remove_retweets,
            tags,
        }
    }

    /// The rejection recorded at compile time, if any.
    pub fn check(&self) -> Result<(), InvalidFilterError> {
        self.tags.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    pub fn is_identity(&self) -> bool {
        !self.remove_retweets && matches!(self.tags, Ok(TagMatcher::Any))
    }

    pub fn describe(&self) -> Option<String> {
        match &self.tags {
            Ok(TagMatcher::Pattern(regex)) => Some(format!("/{}/", regex.as_str())),
            _ => None,
        }
    }

    pub fn apply(&self, items: Vec<Tweet>) -> Result<Vec<Tweet>, InvalidFilterError> {
        let matcher = self.tags.as_ref().map_err(Clone::clone)?;

        if self.is_identity() {
            return Ok(items);
        }

        let before = items.len();
        let kept: Vec<Tweet> = items
            .into_iter()
            .filter(|tweet| !(self.remove_retweets && tweet.is_retweet()))
            .filter(|tweet| match matcher {
                TagMatcher::Any => true,
                TagMatcher::Pattern(regex) => regex.is_match(&tweet.text),
            })
            .collect();

        debug!("Filter kept {}/{} items", kept.len(), before);
        Ok(kept)
    }
}

fn invalid(screenname: &str, options: &FeedOptions, reason: &str) -> InvalidFilterError {
    InvalidFilterError {
        screenname: screenname.to_string(),
        value: options
            .filter_tags
            .as_ref()
            .map(FilterTags::describe)
            .unwrap_or_default(),
        reason: reason.to_string(),
    }
}
