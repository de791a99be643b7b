//! Percent-encoding and query strings as OAuth needs them.
//!
//! The encoding follows [RFC 3986 section 2.3][unreserved]: only `ALPHA`, `DIGIT`, `-`, `.`,
//! `_` and `~` stay as they are, everything else is written as `%XX` with upper case hex digits.
//! In particular a space becomes `%20` and never `+`. This is not what form encoders commonly
//! produce, but it is the only encoding under which OAuth 1.0a signatures computed by two
//! parties agree.
//!
//! [unreserved]: https://tools.ietf.org/html/rfc3986#section-2.3
use std::collections::BTreeMap;
use std::iter::FromIterator;
use std::vec;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a string with the RFC 3986 unreserved set.
///
/// ```
/// # use oxide_auth_client::primitives::codec::url_encode;
/// assert_eq!(url_encode("a b~c&d"), "a%20b~c%26d");
/// ```
pub fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Inverse of [`url_encode`].
///
/// Invalid escapes are kept literally, invalid utf-8 is replaced. A `+` is *not* treated as a
/// space here, use [`parse_query_string`] for form encoded input.
///
/// [`url_encode`]: fn.url_encode.html
/// [`parse_query_string`]: fn.parse_query_string.html
pub fn url_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Decode a form value, where `+` also stands for a space.
fn form_decode(input: &str) -> String {
    if input.contains('+') {
        url_decode(&input.replace('+', " "))
    } else {
        url_decode(input)
    }
}

/// Split a query string into its parameters.
///
/// Pairs are separated by `&`, key and value by the first `=`. A key without `=` maps to the
/// empty string, empty segments are skipped. When a key appears more than once the last value
/// wins but the key keeps the position of its first occurrence.
pub fn parse_query_string(query: &str) -> Params {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = Params::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = match pair.find('=') {
            Some(idx) => (&pair[..idx], &pair[idx + 1..]),
            None => (pair, ""),
        };
        params.insert(form_decode(key), form_decode(value));
    }
    params
}

/// Encode parameters as `key=value` pairs joined by `&`, in their current order.
pub fn build_query_string<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// An insertion ordered parameter map with unique keys.
///
/// Request parameters need a deterministic order: the OAuth 1.0a `Authorization` header lists
/// protocol parameters in the order the caller supplied them. Inserting an existing key replaces
/// its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// An empty parameter list.
    pub fn new() -> Self {
        Params::default()
    }

    /// Set a parameter, returning the value it replaced.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<String>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => Some(std::mem::replace(&mut pair.1, value)),
            None => {
                self.pairs.push((key, value));
                None
            }
        }
    }

    /// Builder style variant of `insert`.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    /// Get the value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check for the presence of a parameter.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a parameter and return its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over the parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Split into the parameters accepted by the predicate on their key and the rest.
    pub fn partition<F>(&self, mut predicate: F) -> (Params, Params)
    where
        F: FnMut(&str) -> bool,
    {
        let (accepted, rejected): (Vec<_>, Vec<_>) = self
            .pairs
            .iter()
            .cloned()
            .partition(|(k, _)| predicate(k.as_str()));
        (Params { pairs: accepted }, Params { pairs: rejected })
    }

    /// Encode as a query string, see [`build_query_string`].
    ///
    /// [`build_query_string`]: fn.build_query_string.html
    pub fn to_query_string(&self) -> String {
        build_query_string(self.iter())
    }

    /// An order independent view, for comparisons.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.pairs.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        params.extend(iter);
        params
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Params {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
