//! Feed configuration and request options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default page size for feed reads.
pub const DEFAULT_LIMIT: u32 = 10;

/// Default feed group for flat timelines.
pub const DEFAULT_FLAT_GROUP: &str = "timeline";

/// Default feed group for notification feeds.
pub const DEFAULT_NOTIFICATION_GROUP: &str = "notification";

/// `mark_seen` / `mark_read` accept either a flag or a list of group ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkFlag {
    All(bool),
    Ids(Vec<String>),
}

impl MarkFlag {
    /// Only an explicit `true` marks everything.
    pub fn is_all(&self) -> bool {
        matches!(self, MarkFlag::All(true))
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "true" => MarkFlag::All(true),
            "false" => MarkFlag::All(false),
            ids => MarkFlag::Ids(ids.split(',').map(str::to_string).collect()),
        }
    }
}

/// Options for a feed read.
///
/// Merged in priority order: defaults, then configured, then call-time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedRequestOptions {
    #[serde(rename = "withReactionCounts", skip_serializing_if = "Option::is_none")]
    pub with_reaction_counts: Option<bool>,

    #[serde(rename = "withOwnReactions", skip_serializing_if = "Option::is_none")]
    pub with_own_reactions: Option<bool>,

    #[serde(rename = "withRecentReactions", skip_serializing_if = "Option::is_none")]
    pub with_recent_reactions: Option<bool>,

    #[serde(rename = "reactionKindsFilter", skip_serializing_if = "Option::is_none")]
    pub reaction_kinds_filter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_lt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_lte: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_gt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_gte: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_seen: Option<MarkFlag>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_read: Option<MarkFlag>,

    /// Parameters without a dedicated field, passed through verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl FeedRequestOptions {
    /// Defaults applied to every paged read.
    pub fn defaults() -> Self {
        Self {
            with_reaction_counts: Some(true),
            with_own_reactions: Some(true),
            limit: Some(DEFAULT_LIMIT),
            ..Default::default()
        }
    }

    /// Options for a bare page size.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Overlay `over` on top of `self`; fields set in `over` win.
    pub fn merged(mut self, over: &FeedRequestOptions) -> Self {
        fn pick<T: Clone>(base: &mut Option<T>, over: &Option<T>) {
            if over.is_some() {
                base.clone_from(over);
            }
        }

        pick(&mut self.with_reaction_counts, &over.with_reaction_counts);
        pick(&mut self.with_own_reactions, &over.with_own_reactions);
        pick(&mut self.with_recent_reactions, &over.with_recent_reactions);
        pick(&mut self.reaction_kinds_filter, &over.reaction_kinds_filter);
        pick(&mut self.limit, &over.limit);
        pick(&mut self.offset, &over.offset);
        pick(&mut self.id_lt, &over.id_lt);
        pick(&mut self.id_lte, &over.id_lte);
        pick(&mut self.id_gt, &over.id_gt);
        pick(&mut self.id_gte, &over.id_gte);
        pick(&mut self.ranking, &over.ranking);
        pick(&mut self.mark_seen, &over.mark_seen);
        pick(&mut self.mark_read, &over.mark_read);
        for (k, v) in &over.extra {
            self.extra.insert(k.clone(), v.clone());
        }
        self
    }

    /// Parse the query part of a pagination cursor.
    ///
    /// Cursors are URL-ish strings such as
    /// `/api/v1.0/feed/user/1/?limit=10&id_lt=abc`. Values that fail to parse
    /// into a typed field are kept in `extra` untouched.
    pub fn from_cursor(cursor: &str) -> Self {
        let mut options = Self::default();
        for (key, value) in cursor_query(cursor) {
            options.set_param(&key, value);
        }
        options
    }

    fn set_param(&mut self, key: &str, value: String) {
        match key {
            "withReactionCounts" | "with_reaction_counts" => match value.parse() {
                Ok(b) => self.with_reaction_counts = Some(b),
                Err(_) => self.keep(key, value),
            },
            "withOwnReactions" | "with_own_reactions" => match value.parse() {
                Ok(b) => self.with_own_reactions = Some(b),
                Err(_) => self.keep(key, value),
            },
            "withRecentReactions" | "with_recent_reactions" => match value.parse() {
                Ok(b) => self.with_recent_reactions = Some(b),
                Err(_) => self.keep(key, value),
            },
            "reactionKindsFilter" | "reaction_kinds_filter" => {
                self.reaction_kinds_filter = Some(value)
            }
            "limit" => match value.parse() {
                Ok(n) => self.limit = Some(n),
                Err(_) => self.keep(key, value),
            },
            "offset" => match value.parse() {
                Ok(n) => self.offset = Some(n),
                Err(_) => self.keep(key, value),
            },
            "id_lt" => self.id_lt = Some(value),
            "id_lte" => self.id_lte = Some(value),
            "id_gt" => self.id_gt = Some(value),
            "id_gte" => self.id_gte = Some(value),
            "ranking" => self.ranking = Some(value),
            "mark_seen" => self.mark_seen = Some(MarkFlag::parse(&value)),
            "mark_read" => self.mark_read = Some(MarkFlag::parse(&value)),
            _ => self.keep(key, value),
        }
    }

    fn keep(&mut self, key: &str, value: String) {
        self.extra.insert(key.to_string(), value);
    }
}

/// Decoded query parameters of a cursor, in order of appearance.
pub fn cursor_query(cursor: &str) -> Vec<(String, String)> {
    let query = match cursor.split_once('?') {
        Some((_, q)) => q,
        None => return Vec::new(),
    };
    let query = query.split('#').next().unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Feed manager configuration.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Feed group, e.g. `timeline` or `notification`.
    pub feed_group: String,

    /// Owner of the feed (None = the current user).
    pub user_id: Option<String>,

    /// Configured request options, layered over the defaults.
    pub options: FeedRequestOptions,

    /// Location reported with analytics engagements.
    pub analytics_location: Option<String>,

    /// Establish a live-update subscription while observers are registered.
    pub notify: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            feed_group: DEFAULT_FLAT_GROUP.to_string(),
            user_id: None,
            options: FeedRequestOptions::default(),
            analytics_location: None,
            notify: false,
        }
    }
}

impl FeedConfig {
    /// Flat timeline feed.
    pub fn flat(feed_group: impl Into<String>) -> Self {
        Self {
            feed_group: feed_group.into(),
            ..Default::default()
        }
    }

    /// Notification feed: marks everything seen on read unless told
    /// otherwise, and listens for live updates.
    pub fn notification(feed_group: impl Into<String>) -> Self {
        Self {
            feed_group: feed_group.into(),
            options: FeedRequestOptions {
                mark_seen: Some(MarkFlag::All(true)),
                ..Default::default()
            },
            notify: true,
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Final options for a read: defaults, configured, then `extra`.
    pub fn request_options(&self, extra: Option<&FeedRequestOptions>) -> FeedRequestOptions {
        let options = FeedRequestOptions::defaults().merged(&self.options);
        match extra {
            Some(extra) => options.merged(extra),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_time_options_win() {
        let config = FeedConfig {
            options: FeedRequestOptions {
                limit: Some(25),
                ranking: Some("popular".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let options = config.request_options(Some(&FeedRequestOptions::with_limit(5)));
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.ranking.as_deref(), Some("popular"));
        assert_eq!(options.with_reaction_counts, Some(true));
        assert_eq!(options.with_own_reactions, Some(true));
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let options = FeedConfig::default().request_options(None);
        assert_eq!(options, FeedRequestOptions::defaults());
    }

    #[test]
    fn test_cursor_parsing() {
        let options = FeedRequestOptions::from_cursor(
            "/api/v1.0/enrich/feed/user/1/?limit=10&id_lt=f1e2&ranking=popular&withOwnReactions=false&foo=bar%20baz",
        );
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.id_lt.as_deref(), Some("f1e2"));
        assert_eq!(options.ranking.as_deref(), Some("popular"));
        assert_eq!(options.with_own_reactions, Some(false));
        assert_eq!(options.extra.get("foo").map(String::as_str), Some("bar baz"));
    }

    #[test]
    fn test_cursor_without_query() {
        assert!(cursor_query("/api/feed/").is_empty());
        assert_eq!(FeedRequestOptions::from_cursor(""), FeedRequestOptions::default());
    }

    #[test]
    fn test_unparseable_typed_param_goes_to_extra() {
        let options = FeedRequestOptions::from_cursor("?limit=ten");
        assert_eq!(options.limit, None);
        assert_eq!(options.extra.get("limit").map(String::as_str), Some("ten"));
    }

    #[test]
    fn test_mark_flags() {
        let options = FeedRequestOptions::from_cursor("?mark_seen=true&mark_read=g1,g2");
        assert!(options.mark_seen.unwrap().is_all());
        assert_eq!(
            options.mark_read,
            Some(MarkFlag::Ids(vec!["g1".to_string(), "g2".to_string()]))
        );
    }

    #[test]
    fn test_notification_preset_marks_seen() {
        let config = FeedConfig::notification(DEFAULT_NOTIFICATION_GROUP);
        assert!(config.notify);
        let options = config.request_options(None);
        assert_eq!(options.mark_seen, Some(MarkFlag::All(true)));

        let options = config.request_options(Some(&FeedRequestOptions {
            mark_seen: Some(MarkFlag::All(false)),
            ..Default::default()
        }));
        assert_eq!(options.mark_seen, Some(MarkFlag::All(false)));
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_value(FeedRequestOptions::defaults()).unwrap();
        assert_eq!(json["withReactionCounts"], true);
        assert_eq!(json["withOwnReactions"], true);
        assert_eq!(json["limit"], 10);
        assert!(json.get("offset").is_none());
    }
}
