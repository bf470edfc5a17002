//! Header containers.
//!
//! [`Headers`] is the canonical, case-insensitive header container used by
//! the dispatcher, transforms and adapters. [`HeaderConfig`] is the layered
//! shape stored in a request configuration: flat values plus a `common`
//! bucket and per-method buckets that are flattened for the resolved method
//! before dispatch.

use crate::error::RequestError;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use std::collections::BTreeMap;

/// Headers whose duplicates are dropped when parsing a raw header block.
const IGNORE_DUPLICATES: &[&str] = &[
    "age",
    "authorization",
    "content-length",
    "content-type",
    "etag",
    "expires",
    "from",
    "host",
    "if-modified-since",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "proxy-authorization",
    "referer",
    "retry-after",
    "user-agent",
];

/// Canonical case-insensitive header container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HeaderMap);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self(HeaderMap::new())
    }

    /// Build a container from `(name, value)` pairs. Later pairs replace
    /// earlier ones with the same name.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` if a name or value is not a
    /// valid HTTP header token.
    pub fn try_from_pairs<I, K, V>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name.as_ref(), value.as_ref())?;
        }
        Ok(headers)
    }

    /// Parse a raw header block (`Name: value` lines).
    ///
    /// `set-cookie` values accumulate; duplicates of single-valued headers
    /// such as `content-type` keep the first value; other duplicates are
    /// joined with `", "`.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` for lines that are not valid
    /// header names or values.
    pub fn parse_block(raw: &str) -> Result<Self, RequestError> {
        let mut headers = Self::new();
        for line in raw.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name.is_empty() {
                continue;
            }
            let header_name = parse_name(&name)?;
            let header_value = parse_value(value)?;

            if name == "set-cookie" {
                headers.0.append(header_name, header_value);
                continue;
            }
            let joined = match headers.0.get(&header_name) {
                None => header_value,
                Some(_) if IGNORE_DUPLICATES.contains(&name.as_str()) => continue,
                Some(existing) => {
                    let mut bytes = existing.as_bytes().to_vec();
                    bytes.extend_from_slice(b", ");
                    bytes.extend_from_slice(header_value.as_bytes());
                    HeaderValue::from_bytes(&bytes)
                        .map_err(|e| RequestError::InvalidHeader(format!("{name}: {e}")))?
                }
            };
            headers.0.insert(header_name, joined);
        }
        Ok(headers)
    }

    /// Merge several containers into one; later containers override earlier
    /// ones on conflicting names.
    #[must_use]
    pub fn concat<'a>(sources: impl IntoIterator<Item = &'a Headers>) -> Self {
        let mut merged = Self::new();
        for source in sources {
            merged.merge_from(source);
        }
        merged
    }

    /// Copy every header of `other` into `self`, replacing same-named values.
    pub fn merge_from(&mut self, other: &Headers) {
        for name in other.0.keys() {
            self.0.remove(name);
            for value in other.0.get_all(name) {
                self.0.append(name.clone(), value.clone());
            }
        }
    }

    /// Insert (replace) a header.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` if name or value are invalid.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        self.0.insert(parse_name(name)?, parse_value(value)?);
        Ok(())
    }

    /// Value of `name` as a string, if present and valid UTF-8.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.0.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    /// Set `Content-Type`. With `rewrite == false` an existing value is kept.
    pub fn set_content_type(&mut self, value: &'static str, rewrite: bool) {
        if rewrite || !self.0.contains_key(CONTENT_TYPE) {
            self.0
                .insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    #[must_use]
    pub fn into_map(self) -> HeaderMap {
        self.0
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self(map)
    }
}

fn parse_name(name: &str) -> Result<HeaderName, RequestError> {
    HeaderName::try_from(name).map_err(|e| RequestError::InvalidHeader(format!("{name}: {e}")))
}

fn parse_value(value: &str) -> Result<HeaderValue, RequestError> {
    HeaderValue::try_from(value).map_err(|e| RequestError::InvalidHeader(format!("{value:?}: {e}")))
}

/// Per-method header bucket of a [`HeaderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderBucket {
    Common,
    Delete,
    Get,
    Head,
    Post,
    Put,
    Patch,
}

impl HeaderBucket {
    /// Bucket holding headers specific to `method`, if the method has one.
    #[must_use]
    pub fn for_method(method: &Method) -> Option<Self> {
        match *method {
            Method::DELETE => Some(Self::Delete),
            Method::GET => Some(Self::Get),
            Method::HEAD => Some(Self::Head),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    /// Parse a bucket key as used in layered header settings (`"common"`,
    /// `"get"`, ...). Case-insensitive.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "common" => Some(Self::Common),
            "delete" => Some(Self::Delete),
            "get" => Some(Self::Get),
            "head" => Some(Self::Head),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }
}

/// Layered header configuration.
///
/// Flat values apply to every request. Bucketed values apply only when the
/// resolved method matches the bucket (or always, for `Common`). After
/// [`HeaderConfig::flatten`] only flat values remain, so buckets never reach
/// a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderConfig {
    values: Headers,
    buckets: BTreeMap<HeaderBucket, Headers>,
}

impl HeaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flat header.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` if name or value are invalid.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        self.values.insert(name, value)
    }

    /// Set a header inside a bucket.
    ///
    /// # Errors
    /// Returns `RequestError::InvalidHeader` if name or value are invalid.
    pub fn insert_in(
        &mut self,
        bucket: HeaderBucket,
        name: &str,
        value: &str,
    ) -> Result<(), RequestError> {
        self.buckets.entry(bucket).or_default().insert(name, value)
    }

    #[must_use]
    pub fn values(&self) -> &Headers {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Headers {
        &mut self.values
    }

    #[must_use]
    pub fn bucket(&self, bucket: HeaderBucket) -> Option<&Headers> {
        self.buckets.get(&bucket)
    }

    #[must_use]
    pub fn has_buckets(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Deep-merge two layered configurations; `over` wins per header name
    /// inside every section.
    #[must_use]
    pub fn merged(base: &HeaderConfig, over: &HeaderConfig) -> HeaderConfig {
        let mut merged = base.clone();
        merged.values.merge_from(&over.values);
        for (bucket, headers) in &over.buckets {
            merged.buckets.entry(*bucket).or_default().merge_from(headers);
        }
        merged
    }

    /// Collapse into a flat configuration for `method`: `common`, then the
    /// method bucket, then flat values (later wins). All buckets are dropped.
    #[must_use]
    pub fn flatten(&self, method: &Method) -> HeaderConfig {
        let mut layers: Vec<&Headers> = Vec::with_capacity(3);
        if let Some(common) = self.buckets.get(&HeaderBucket::Common) {
            layers.push(common);
        }
        if let Some(specific) =
            HeaderBucket::for_method(method).and_then(|bucket| self.buckets.get(&bucket))
        {
            layers.push(specific);
        }
        layers.push(&self.values);
        HeaderConfig::from(Headers::concat(layers))
    }
}

impl From<Headers> for HeaderConfig {
    fn from(values: Headers) -> Self {
        Self {
            values,
            buckets: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let headers = Headers::try_from_pairs([("X-Request-Id", "abc")]).unwrap();
        assert_eq!(headers.get("x-request-id"), Some("abc"));
        assert_eq!(headers.get("X-REQUEST-ID"), Some("abc"));
    }

    #[test]
    fn test_parse_block_handles_duplicates() {
        let raw = "Content-Type: text/plain\r\n\
                   content-type: application/json\r\n\
                   Set-Cookie: a=1\r\n\
                   Set-Cookie: b=2\r\n\
                   X-Trace: one\r\n\
                   X-Trace: two\r\n\
                   garbage line\r\n";
        let headers = Headers::parse_block(raw).unwrap();

        assert_eq!(headers.content_type(), Some("text/plain"));
        assert_eq!(headers.get("x-trace"), Some("one, two"));
        let cookies: Vec<_> = headers.as_map().get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_parse_block_joins_non_ascii_duplicates() {
        let headers = Headers::parse_block("x-n: caf\u{e9}\nx-n: th\u{e9}").unwrap();
        assert_eq!(headers.get("x-n"), Some("caf\u{e9}, th\u{e9}"));
        assert_eq!(
            headers.as_map().get("x-n").map(HeaderValue::as_bytes),
            Some("caf\u{e9}, th\u{e9}".as_bytes())
        );
    }

    #[test]
    fn test_concat_later_wins() {
        let a = Headers::try_from_pairs([("x-a", "1"), ("x-shared", "a")]).unwrap();
        let b = Headers::try_from_pairs([("x-b", "2"), ("X-Shared", "b")]).unwrap();
        let merged = Headers::concat([&a, &b]);

        assert_eq!(merged.get("x-a"), Some("1"));
        assert_eq!(merged.get("x-b"), Some("2"));
        assert_eq!(merged.get("x-shared"), Some("b"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_set_content_type_does_not_override_by_default() {
        let mut headers = Headers::try_from_pairs([("content-type", "application/json")]).unwrap();
        headers.set_content_type("application/x-www-form-urlencoded", false);
        assert_eq!(headers.content_type(), Some("application/json"));

        headers.set_content_type("text/plain", true);
        assert_eq!(headers.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let result = Headers::try_from_pairs([("bad header", "x")]);
        assert!(matches!(result, Err(RequestError::InvalidHeader(_))));
    }

    #[test]
    fn test_flatten_uses_common_and_method_bucket() {
        let mut config = HeaderConfig::new();
        config.insert_in(HeaderBucket::Common, "X-A", "1").unwrap();
        config.insert_in(HeaderBucket::Get, "X-B", "2").unwrap();
        config.insert_in(HeaderBucket::Post, "X-C", "3").unwrap();
        config.insert("X-D", "4").unwrap();

        let flat = config.flatten(&Method::GET);
        assert!(!flat.has_buckets());
        assert_eq!(flat.values().get("x-a"), Some("1"));
        assert_eq!(flat.values().get("x-b"), Some("2"));
        assert_eq!(flat.values().get("x-c"), None);
        assert_eq!(flat.values().get("x-d"), Some("4"));
    }

    #[test]
    fn test_flatten_flat_values_override_buckets() {
        let mut config = HeaderConfig::new();
        config.insert_in(HeaderBucket::Common, "Accept", "text/plain").unwrap();
        config.insert("Accept", "application/json").unwrap();

        let flat = config.flatten(&Method::DELETE);
        assert_eq!(flat.values().get("accept"), Some("application/json"));
    }

    #[test]
    fn test_merged_is_deep_and_override_wins() {
        let mut base = HeaderConfig::new();
        base.insert("X-Base", "b").unwrap();
        base.insert("X-Shared", "base").unwrap();
        base.insert_in(HeaderBucket::Common, "X-Common", "c").unwrap();

        let mut over = HeaderConfig::new();
        over.insert("X-Shared", "over").unwrap();
        over.insert_in(HeaderBucket::Common, "X-Other", "o").unwrap();

        let merged = HeaderConfig::merged(&base, &over);
        assert_eq!(merged.values().get("x-base"), Some("b"));
        assert_eq!(merged.values().get("x-shared"), Some("over"));
        let common = merged.bucket(HeaderBucket::Common).unwrap();
        assert_eq!(common.get("x-common"), Some("c"));
        assert_eq!(common.get("x-other"), Some("o"));

        // Inputs untouched
        assert_eq!(base.values().get("x-shared"), Some("base"));
        assert!(over.values().get("x-base").is_none());
    }
}
