//! Case-insensitive, order-preserving header multimap.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A header name compared case-insensitively, keeping the spelling it was created with.
#[derive(Clone)]
pub struct HeaderName {
    name: Cow<'static, str>,
    normalised: Cow<'static, str>,
}

macro_rules! standard_headers {
    ($($konst:ident => $name:literal, $lower:literal;)+) => {
        impl HeaderName {
            $(
                pub const $konst: HeaderName = HeaderName {
                    name: Cow::Borrowed($name),
                    normalised: Cow::Borrowed($lower),
                };
            )+

            fn standard(lower: &str) -> Option<HeaderName> {
                match lower {
                    $($lower => Some(HeaderName::$konst),)+
                    _ => None,
                }
            }
        }
    };
}

standard_headers! {
    ACCEPT => "Accept", "accept";
    ACCEPT_ENCODING => "Accept-Encoding", "accept-encoding";
    AUTHORIZATION => "Authorization", "authorization";
    CACHE_CONTROL => "Cache-Control", "cache-control";
    CONNECTION => "Connection", "connection";
    CONTENT_ENCODING => "Content-Encoding", "content-encoding";
    CONTENT_LENGTH => "Content-Length", "content-length";
    CONTENT_TYPE => "Content-Type", "content-type";
    COOKIE => "Cookie", "cookie";
    HOST => "Host", "host";
    LOCATION => "Location", "location";
    SET_COOKIE => "Set-Cookie", "set-cookie";
    TRANSFER_ENCODING => "Transfer-Encoding", "transfer-encoding";
    USER_AGENT => "User-Agent", "user-agent";
    X_FORWARDED_FOR => "X-Forwarded-For", "x-forwarded-for";
    X_FORWARDED_PROTO => "X-Forwarded-Proto", "x-forwarded-proto";
}

impl HeaderName {
    /// Look up the canonical name for `name`, creating a new one if it is not a standard header.
    pub fn intern(name: &str) -> HeaderName {
        let lower = name.to_ascii_lowercase();
        Self::standard(&lower).unwrap_or_else(|| HeaderName {
            name: Cow::Owned(name.to_string()),
            normalised: Cow::Owned(lower),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Lowercase form used for comparisons.
    pub fn normalised(&self) -> &str {
        &self.normalised
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.normalised == other.normalised
    }
}

impl Eq for HeaderName {}

impl Hash for HeaderName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalised.hash(state);
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        HeaderName::intern(name)
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.name, f)
    }
}

/// One header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: HeaderName,
    value: String,
}

impl Header {
    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered header entries. Duplicate names are kept as separate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any existing values for the same name.
    pub fn add(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        self.entries.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Replace every value for `name` with a single one, at the position of the first.
    pub fn set(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|h| h.name == name) {
            Some(first) => {
                self.entries[first].value = value;
                let mut index = 0;
                self.entries.retain(|h| {
                    let keep = index <= first || h.name != name;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push(Header { name, value }),
        }
    }

    /// Remove every value for `name`, returning how many were removed.
    pub fn remove(&mut self, name: impl Into<HeaderName>) -> usize {
        let name = name.into();
        let before = self.entries.len();
        self.entries.retain(|h| h.name != name);
        before - self.entries.len()
    }

    pub fn first(&self, name: impl Into<HeaderName>) -> Option<&str> {
        let name = name.into();
        self.entries
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all(&self, name: impl Into<HeaderName>) -> Vec<&str> {
        let name = name.into();
        self.entries
            .iter()
            .filter(|h| h.name == name)
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: impl Into<HeaderName>) -> bool {
        let name = name.into();
        self.entries.iter().any(|h| h.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<HeaderName>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_case_insensitively() {
        assert_eq!(HeaderName::intern("content-TYPE"), HeaderName::CONTENT_TYPE);
        assert_eq!(HeaderName::intern("content-type").as_str(), "Content-Type");
        assert_eq!(HeaderName::intern("X-Custom").as_str(), "X-Custom");
        assert_eq!(HeaderName::intern("X-Custom"), HeaderName::intern("x-custom"));
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let mut headers = Headers::new();
        headers.add("X", "1");
        headers.add("Host", "h");
        headers.add("x", "2");

        assert_eq!(headers.get_all("X"), vec!["1", "2"]);
        assert_eq!(headers.first("host"), Some("h"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn set_collapses_to_first_position() {
        let mut headers: Headers = [("A", "1"), ("B", "2"), ("a", "3")].into_iter().collect();
        headers.set("A", "9");

        let lines: Vec<_> = headers
            .iter()
            .map(|h| (h.name().as_str().to_string(), h.value().to_string()))
            .collect();
        assert_eq!(
            lines,
            vec![("A".to_string(), "9".to_string()), ("B".to_string(), "2".to_string())]
        );
        assert_eq!(headers.remove("b"), 1);
        assert!(!headers.contains("B"));
    }
}
