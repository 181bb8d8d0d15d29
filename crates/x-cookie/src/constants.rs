//! Last-known-good values used whenever discovery comes up empty.

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Bearer token embedded in the public web client.
pub const DEFAULT_BEARER_TOKEN: &str = "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

pub const DEFAULT_API_BASE: &str = "https://x.com";
pub const DEFAULT_HOME_URL: &str = "https://x.com";
pub const DEFAULT_BUNDLE_BASE: &str = "https://abs.twimg.com/responsive-web/client-web";

/// Page size for timeline-like reads, and its upper bound.
pub const DEFAULT_COUNT: u32 = 20;
pub const MAX_COUNT: u32 = 50;

/// Cookies kept from a cookie file; anything else is dropped.
pub const X_COOKIE_NAMES: &[&str] = &["auth_token", "ct0", "gt", "twid", "kdt", "guest_id"];
pub const X_REQUIRED_COOKIES: &[&str] = &["auth_token", "ct0"];

/// Always sent as `true`, whatever the page says.
pub const FORCED_FEATURE: &str = "responsive_web_graphql_exclude_directive_enabled";

/// Field toggles that default to `false`.
pub const FALSE_BY_DEFAULT_TOGGLES: &[&str] = &["withGrokAnalyze", "withDisallowedReplyControls"];

pub const FALLBACK_TWEET_DETAIL_QUERY_ID: &str = "nBS-WpgA6ZG0CyNHD517JQ";
pub const FALLBACK_TWEET_QUERY_ID: &str = "Xl5pC_lBk_gcO2ItU39DQw";
pub const FALLBACK_ARTICLE_QUERY_ID: &str = "id8pHQbQi7eZ6P9mA1th1Q";
pub const FALLBACK_USER_TWEETS_QUERY_ID: &str = "E3opETHurmVJflFsUBVuUQ";
pub const FALLBACK_USER_BY_SCREEN_NAME_QUERY_ID: &str = "G3KGOASz96M-Qu0nwmGXNg";
pub const FALLBACK_HOME_TIMELINE_QUERY_ID: &str = "HJFjzBgCs16TqxewQOeLNg";
pub const FALLBACK_SEARCH_QUERY_ID: &str = "UN1i3zUiCWa-6r-Uaho4fw";
pub const FALLBACK_CREATE_TWEET_QUERY_ID: &str = "oB-5XsHNAbjvARJEc8CZFw";

pub const FALLBACK_TWEET_FEATURE_SWITCHES: &[&str] = &[
    "creator_subscriptions_tweet_preview_api_enabled",
    "communities_web_enable_tweet_community_results_fetch",
    "c9s_tweet_anatomy_moderator_badge_enabled",
    "articles_preview_enabled",
    "responsive_web_edit_tweet_api_enabled",
    "graphql_is_translatable_rweb_tweet_is_translatable_enabled",
    "view_counts_everywhere_api_enabled",
    "longform_notetweets_consumption_enabled",
    "responsive_web_twitter_article_tweet_consumption_enabled",
    "tweet_awards_web_tipping_enabled",
    "creator_subscriptions_quote_tweet_preview_enabled",
    "freedom_of_speech_not_reach_fetch_enabled",
    "standardized_nudges_misinfo",
    "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled",
    "rweb_video_timestamps_enabled",
    "longform_notetweets_rich_text_read_enabled",
    "longform_notetweets_inline_media_enabled",
    "rweb_tipjar_consumption_enabled",
    "responsive_web_graphql_exclude_directive_enabled",
    "verified_phone_label_enabled",
    "responsive_web_graphql_skip_user_profile_image_extensions_enabled",
    "responsive_web_graphql_timeline_navigation_enabled",
    "responsive_web_enhance_cards_enabled",
];

pub const FALLBACK_TWEET_FIELD_TOGGLES: &[&str] = &[
    "withArticleRichContentState",
    "withArticlePlainText",
    "withGrokAnalyze",
    "withDisallowedReplyControls",
];

pub const FALLBACK_TWEET_DETAIL_FEATURE_SWITCHES: &[&str] = &[
    "rweb_tipjar_consumption_enabled",
    "responsive_web_graphql_exclude_directive_enabled",
    "verified_phone_label_enabled",
    "creator_subscriptions_tweet_preview_api_enabled",
    "responsive_web_graphql_timeline_navigation_enabled",
    "responsive_web_graphql_skip_user_profile_image_extensions_enabled",
    "communities_web_enable_tweet_community_results_fetch",
    "c9s_tweet_anatomy_moderator_badge_enabled",
    "articles_preview_enabled",
    "responsive_web_edit_tweet_api_enabled",
    "graphql_is_translatable_rweb_tweet_is_translatable_enabled",
    "view_counts_everywhere_api_enabled",
    "longform_notetweets_consumption_enabled",
    "responsive_web_twitter_article_tweet_consumption_enabled",
    "tweet_awards_web_tipping_enabled",
    "creator_subscriptions_quote_tweet_preview_enabled",
    "freedom_of_speech_not_reach_fetch_enabled",
    "standardized_nudges_misinfo",
    "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled",
    "rweb_video_timestamps_enabled",
    "longform_notetweets_rich_text_read_enabled",
    "longform_notetweets_inline_media_enabled",
    "responsive_web_enhance_cards_enabled",
];

/// Values for TweetDetail flags the page does not mention.
pub const FALLBACK_TWEET_DETAIL_FEATURE_DEFAULTS: &[(&str, bool)] = &[
    ("verified_phone_label_enabled", false),
    ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
    ("tweet_awards_web_tipping_enabled", false),
    ("responsive_web_enhance_cards_enabled", false),
];

pub const FALLBACK_TWEET_DETAIL_FIELD_TOGGLES: &[&str] = &[
    "withArticleRichContentState",
    "withArticlePlainText",
    "withGrokAnalyze",
    "withDisallowedReplyControls",
];

pub const FALLBACK_ARTICLE_FEATURE_SWITCHES: &[&str] = &[
    "profile_label_improvements_pcf_label_in_post_enabled",
    "rweb_tipjar_consumption_enabled",
    "responsive_web_graphql_exclude_directive_enabled",
    "verified_phone_label_enabled",
    "responsive_web_graphql_skip_user_profile_image_extensions_enabled",
    "responsive_web_graphql_timeline_navigation_enabled",
    "responsive_web_twitter_article_tweet_consumption_enabled",
    "longform_notetweets_consumption_enabled",
];

pub const FALLBACK_ARTICLE_FIELD_TOGGLES: &[&str] =
    &["withArticleRichContentState", "withArticlePlainText"];

/// Feature flags sent with `UserByScreenName`, which is not mined.
pub const USER_BY_SCREEN_NAME_FEATURES: &[(&str, bool)] = &[
    ("hidden_profile_subscriptions_enabled", true),
    ("rweb_tipjar_consumption_enabled", true),
    ("responsive_web_graphql_exclude_directive_enabled", true),
    ("verified_phone_label_enabled", false),
    ("subscriptions_verification_info_is_identity_verified_enabled", true),
    ("subscriptions_verification_info_verified_since_enabled", true),
    ("highlights_tweets_tab_ui_enabled", true),
    ("responsive_web_twitter_article_notes_tab_enabled", true),
    ("subscriptions_feature_can_gift_premium", true),
    ("creator_subscriptions_tweet_preview_api_enabled", true),
    ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
    ("responsive_web_graphql_timeline_navigation_enabled", true),
    ("profile_label_improvements_pcf_label_in_post_enabled", true),
];
