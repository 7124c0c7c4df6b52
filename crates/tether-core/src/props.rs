//! Property dictionaries
//!
//! The foreign library hands out dictionaries that live only for the
//! duration of a callback. A [`PropertyDictionary`] is the owned copy the
//! dispatcher takes before the callback frame unwinds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Media class of an object, e.g. `Audio/Sink`
pub const MEDIA_CLASS: &str = "media.class";
/// Unique node name
pub const NODE_NAME: &str = "node.name";
/// Human readable node description
pub const NODE_DESCRIPTION: &str = "node.description";
/// Monotonic serial assigned by the server
pub const OBJECT_SERIAL: &str = "object.serial";

/// Read-only ordered string mapping.
///
/// Keys keep the order the foreign side supplied them in. Duplicate keys
/// are kept as-is; lookups return the first match, like the foreign lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDictionary {
    items: Vec<(String, String)>,
}

impl PropertyDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Parse the value for `key` as an integer.
    ///
    /// Accepts decimal and `0x`-prefixed hexadecimal, with an optional sign.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        parse_int(self.get(key)?)
    }

    /// Parse the value for `key` with [`FromStr`]
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PropertyDictionary {
            items: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PropertyDictionary {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    // from_str_radix would accept a second sign
    if !digits.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    let magnitude = i128::from(u64::from_str_radix(digits, radix).ok()?);
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}
