use std::{collections::HashMap, sync::LazyLock};

use {
    regex::Regex,
    serde_json::{Map, Value},
};

use crate::constants::{FALSE_BY_DEFAULT_TOGGLES, FORCED_FEATURE};

/// `"<key>":{"value":<bool>}` as it appears in the page.
static LITERAL_FLAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#""([^"\\]+)"\s*:\s*\{"value"\s*:\s*(true|false)"#).ok()
});

/// The same pair inside a double-encoded state blob.
static ESCAPED_FLAG: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\\"([^"\\]+)\\"\s*:\s*\{\\"value\\"\s*:\s*(true|false)"#).ok()
});

/// Every flag value in the page. The first literal occurrence of a key wins,
/// then the first escaped one.
fn page_flags(html: &str) -> HashMap<&str, bool> {
    let mut flags = HashMap::new();
    for re in [&*LITERAL_FLAG, &*ESCAPED_FLAG].into_iter().flatten() {
        for caps in re.captures_iter(html) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                flags.entry(key.as_str()).or_insert(value.as_str() == "true");
            }
        }
    }
    flags
}

/// Look up `"<key>":{"value":<bool>}` in the page, literal form first, then the
/// JSON-escaped form the page uses when the state blob is double-encoded.
pub fn resolve_feature_value(html: &str, key: &str) -> Option<bool> {
    page_flags(html).get(key).copied()
}

/// Resolve every flag in `keys`: page value, else `defaults`, else `true`.
/// The exclude-directive flag is always present and `true`.
pub fn build_feature_map(
    html: &str,
    keys: &[String],
    defaults: &[(&str, bool)],
) -> Map<String, Value> {
    let page = page_flags(html);
    let mut features = Map::new();
    for key in keys {
        let value = page
            .get(key.as_str())
            .copied()
            .or_else(|| {
                defaults
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, v)| *v)
            })
            .unwrap_or(true);
        features.insert(key.clone(), Value::Bool(value));
    }
    features.insert(FORCED_FEATURE.to_string(), Value::Bool(true));
    features
}

/// Every toggle is `true` except the known-sensitive ones.
pub fn build_field_toggle_map(keys: &[String]) -> Map<String, Value> {
    keys.iter()
        .map(|key| {
            let on = !FALSE_BY_DEFAULT_TOGGLES.contains(&key.as_str());
            (key.clone(), Value::Bool(on))
        })
        .collect()
}

/// Owned copies of a static flag list.
pub fn to_owned_list(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}
