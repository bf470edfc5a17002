//! URL composition: base-URL joining and query-string serialization.

use crate::config::{ParamsSerializerOptions, RequestConfig};
use serde_json::{Map, Value};

/// `scheme://...` or protocol-relative `//...`.
#[must_use]
pub fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join `base` and `relative` with exactly one slash between them.
#[must_use]
pub fn combine_urls(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Prefix `url` with `base_url` unless `url` is already absolute.
#[must_use]
pub fn build_full_path(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !is_absolute_url(url) => combine_urls(base, url),
        _ => url.to_owned(),
    }
}

/// Percent-encode a query key or value, keeping `: $ , [ ]` readable and
/// writing spaces as `+`.
#[must_use]
pub fn encode(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%3A", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%20", "+")
        .replace("%5B", "[")
        .replace("%5D", "]")
}

/// Append serialized `params` to `url`.
///
/// A fragment is dropped only when a query is appended. `null` values are
/// skipped; arrays repeat the key (`k[]`, `k[0]` or `k` depending on
/// `indexes`); nested objects are written as JSON, or flattened to `a.b` keys
/// when the `dots` option is set.
#[must_use]
pub fn build_url(
    url: &str,
    params: Option<&Map<String, Value>>,
    options: Option<&ParamsSerializerOptions>,
) -> String {
    let Some(params) = params else {
        return url.to_owned();
    };

    let query = match options {
        Some(options) => match &options.serialize {
            Some(serialize) => serialize(params, options),
            None => serialize_params(params, options),
        },
        None => serialize_params(params, &ParamsSerializerOptions::default()),
    };

    if query.is_empty() {
        return url.to_owned();
    }
    let base = url.split_once('#').map_or(url, |(before, _)| before);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Render the final URL of `config` without sending anything.
#[must_use]
pub fn get_uri(config: &RequestConfig) -> String {
    let full_path = build_full_path(
        config.base_url.get().map(String::as_str),
        config.url.get().map_or("", String::as_str),
    );
    build_url(&full_path, config.params.get(), config.params_serializer.get())
}

fn serialize_params(params: &Map<String, Value>, options: &ParamsSerializerOptions) -> String {
    let serializer = QuerySerializer {
        indexes: options.indexes(),
        dots: options.options.get("dots").and_then(Value::as_bool).unwrap_or(false),
        options,
    };
    let mut pairs = Vec::new();
    for (key, value) in params {
        serializer.push(&mut pairs, key, value);
    }
    pairs.join("&")
}

struct QuerySerializer<'a> {
    indexes: Option<bool>,
    dots: bool,
    options: &'a ParamsSerializerOptions,
}

impl QuerySerializer<'_> {
    fn push(&self, pairs: &mut Vec<String>, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let item_key = match self.indexes {
                        None => key.to_owned(),
                        Some(false) => format!("{key}[]"),
                        Some(true) => format!("{key}[{index}]"),
                    };
                    self.push_scalar(pairs, &item_key, item);
                }
            }
            Value::Object(map) if self.dots => {
                for (child, child_value) in map {
                    self.push(pairs, &format!("{key}.{child}"), child_value);
                }
            }
            _ => self.push_scalar(pairs, key, value),
        }
    }

    fn push_scalar(&self, pairs: &mut Vec<String>, key: &str, value: &Value) {
        let rendered = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        pairs.push(format!("{}={}", self.encode(key), self.encode(&rendered)));
    }

    fn encode(&self, raw: &str) -> String {
        match &self.options.encode {
            Some(custom) => custom(raw),
            None => encode(raw),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_absolute_url_detection() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("custom-scheme-v1.0://example.com/"));
        assert!(is_absolute_url("//example.com"));
        assert!(!is_absolute_url("/users"));
        assert!(!is_absolute_url("123://example.com"));
        assert!(!is_absolute_url("!valid://example.com"));
    }

    #[test]
    fn test_combine_urls_single_slash() {
        assert_eq!(combine_urls("https://api.com/", "/users"), "https://api.com/users");
        assert_eq!(combine_urls("https://api.com", "users"), "https://api.com/users");
        assert_eq!(combine_urls("https://api.com", ""), "https://api.com");
    }

    #[test]
    fn test_build_full_path_keeps_absolute_url() {
        assert_eq!(
            build_full_path(Some("https://api.com"), "https://other.com/x"),
            "https://other.com/x"
        );
        assert_eq!(build_full_path(None, "/x"), "/x");
    }

    #[test]
    fn test_build_url_appends_and_strips_fragment() {
        let p = params(json!({"page": 2, "q": "a b"}));
        assert_eq!(build_url("/search#top", Some(&p), None), "/search?page=2&q=a+b");
        assert_eq!(build_url("/search?x=1", Some(&p), None), "/search?x=1&page=2&q=a+b");
    }

    #[test]
    fn test_build_url_arrays_and_nulls() {
        let p = params(json!({"ids": [1, null, 2], "skip": null}));
        assert_eq!(build_url("/x", Some(&p), None), "/x?ids[]=1&ids[]=2");

        let indexed = ParamsSerializerOptions::new().option("indexes", true);
        assert_eq!(build_url("/x", Some(&p), Some(&indexed)), "/x?ids[0]=1&ids[2]=2");

        let bare = ParamsSerializerOptions::new().option("indexes", Value::Null);
        assert_eq!(build_url("/x", Some(&p), Some(&bare)), "/x?ids=1&ids=2");
    }

    #[test]
    fn test_build_url_objects() {
        let p = params(json!({"filter": {"a": 1}}));
        assert_eq!(
            build_url("/x", Some(&p), None),
            format!("/x?filter={}", encode(r#"{"a":1}"#))
        );

        let dots = ParamsSerializerOptions::new().option("dots", true);
        assert_eq!(build_url("/x", Some(&p), Some(&dots)), "/x?filter.a=1");
    }

    #[test]
    fn test_custom_encoder_and_serializer() {
        let p = params(json!({"k": "v"}));
        let upper = ParamsSerializerOptions::new().with_encoder(str::to_uppercase);
        assert_eq!(build_url("/x", Some(&p), Some(&upper)), "/x?K=V");

        let custom = ParamsSerializerOptions::new().with_serializer(|params, _| {
            params.keys().cloned().collect::<Vec<_>>().join(";")
        });
        assert_eq!(build_url("/x", Some(&p), Some(&custom)), "/x?k");
    }

    #[test]
    fn test_encode_keeps_readable_characters() {
        assert_eq!(encode("a:b$c,d e[f]"), "a:b$c,d+e[f]");
        assert_eq!(encode("x&y=z"), "x%26y%3Dz");
    }

    #[test]
    fn test_get_uri_uses_base_and_params() {
        let config = RequestConfig::new()
            .base_url("https://api.example.com/v1/")
            .url("/users")
            .param("active", true);
        assert_eq!(get_uri(&config), "https://api.example.com/v1/users?active=true");
    }

    #[test]
    fn test_empty_query_keeps_fragment() {
        let config = RequestConfig::new().url("/a#frag").params(Map::new());
        assert_eq!(get_uri(&config), "/a#frag");

        let only_nulls = RequestConfig::new()
            .url("/a#frag")
            .params(params(json!({"skip": null})));
        assert_eq!(get_uri(&only_nulls), "/a#frag");
    }
}
