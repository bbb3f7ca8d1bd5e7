//! In-memory [`Directory`] used by the command tests.
//!
//! Understands the filter shapes the commands send: `&`, `|`, `!`, equality,
//! presence, `>=`, `<=` and the `1.2.840.113556.1.4.803` bitwise-AND rule.

use super::{encode_password_for_ad, Attribute, Directory};
use crate::error::{Error, Result};
use ldap3::SearchEntry;
use std::collections::{BTreeMap, HashMap};

const BITWISE_AND_RULE: &str = "1.2.840.113556.1.4.803";

#[derive(Debug, Clone, Default)]
struct StoredEntry {
    dn: String,
    attrs: Vec<(String, Vec<Vec<u8>>)>,
}

impl StoredEntry {
    fn values(&self, attr: &str) -> Option<&Vec<Vec<u8>>> {
        self.attrs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values)
    }

    fn values_mut(&mut self, attr: &str) -> &mut Vec<Vec<u8>> {
        let index = match self
            .attrs
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(attr))
        {
            Some(index) => index,
            None => {
                self.attrs.push((attr.to_string(), Vec::new()));
                self.attrs.len() - 1
            }
        };
        &mut self.attrs[index].1
    }

    fn text_values(&self, attr: &str) -> Vec<String> {
        self.values(attr)
            .map(|values| {
                values
                    .iter()
                    .map(|value| String::from_utf8_lossy(value).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn to_search_entry(&self, wanted: &[&str]) -> SearchEntry {
        let mut attrs = HashMap::new();
        let mut bin_attrs = HashMap::new();

        for (name, values) in &self.attrs {
            let selected = wanted.is_empty()
                || wanted
                    .iter()
                    .any(|w| *w == "*" || w.eq_ignore_ascii_case(name));
            if !selected || values.is_empty() {
                continue;
            }
            let text: Option<Vec<String>> = values
                .iter()
                .map(|value| String::from_utf8(value.clone()).ok())
                .collect();
            match text {
                Some(text) => {
                    attrs.insert(name.clone(), text);
                }
                None => {
                    bin_attrs.insert(name.clone(), values.clone());
                }
            }
        }

        SearchEntry {
            dn: self.dn.clone(),
            attrs,
            bin_attrs,
        }
    }
}

/// Entries keyed by lower-cased DN.
#[derive(Debug, Default)]
pub(crate) struct MemoryDirectory {
    entries: BTreeMap<String, StoredEntry>,
    /// DNs whose modifications fail, to exercise per-row error handling.
    read_only: Vec<String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dn: &str, attrs: &[(&str, &[&str])]) {
        let entry = StoredEntry {
            dn: dn.to_string(),
            attrs: attrs
                .iter()
                .map(|(name, values)| {
                    (
                        name.to_string(),
                        values.iter().map(|value| value.as_bytes().to_vec()).collect(),
                    )
                })
                .collect(),
        };
        self.entries.insert(dn.to_ascii_lowercase(), entry);
    }

    pub fn set_read_only(&mut self, dn: &str) {
        self.read_only.push(dn.to_ascii_lowercase());
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.entries.contains_key(&dn.to_ascii_lowercase())
    }

    pub fn attr(&self, dn: &str, attr: &str) -> Vec<String> {
        self.entries
            .get(&dn.to_ascii_lowercase())
            .map(|entry| entry.text_values(attr))
            .unwrap_or_default()
    }

    pub fn raw_attr(&self, dn: &str, attr: &str) -> Vec<Vec<u8>> {
        self.entries
            .get(&dn.to_ascii_lowercase())
            .and_then(|entry| entry.values(attr).cloned())
            .unwrap_or_default()
    }

    fn entry_mut(&mut self, dn: &str) -> Result<&mut StoredEntry> {
        let key = dn.to_ascii_lowercase();
        if self.read_only.contains(&key) {
            return Err(Error::InvalidArgument(format!("{} is read-only", dn)));
        }
        self.entries
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(dn.to_string()))
    }
}

impl Directory for MemoryDirectory {
    fn read_entry(&mut self, dn: &str, attrs: &[&str]) -> Result<Option<SearchEntry>> {
        Ok(self
            .entries
            .get(&dn.to_ascii_lowercase())
            .map(|entry| entry.to_search_entry(attrs)))
    }

    fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<SearchEntry>> {
        let filter = Filter::parse(filter)
            .ok_or_else(|| Error::InvalidArgument(format!("bad filter {}", filter)))?;
        let suffix = base.to_ascii_lowercase();

        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| key.ends_with(&suffix))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| entry.to_search_entry(attrs))
            .collect())
    }

    fn add(&mut self, dn: &str, attrs: Vec<Attribute>) -> Result<()> {
        let key = dn.to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return Err(Error::InvalidArgument(format!("{} already exists", dn)));
        }
        self.entries.insert(
            key,
            StoredEntry {
                dn: dn.to_string(),
                attrs,
            },
        );
        Ok(())
    }

    fn replace(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        let entry = self.entry_mut(dn)?;
        *entry.values_mut(attr) = values.iter().map(|v| v.as_bytes().to_vec()).collect();
        Ok(())
    }

    fn add_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        let entry = self.entry_mut(dn)?;
        let current = entry.values_mut(attr);
        for value in values {
            if current.iter().any(|v| v == value.as_bytes()) {
                return Err(Error::InvalidArgument(format!("{} already has {}", dn, value)));
            }
            current.push(value.as_bytes().to_vec());
        }
        Ok(())
    }

    fn delete_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        let entry = self.entry_mut(dn)?;
        let current = entry.values_mut(attr);
        for value in values {
            let Some(index) = current.iter().position(|v| v == value.as_bytes()) else {
                return Err(Error::NotFound(format!("{} in {} of {}", value, attr, dn)));
            };
            current.remove(index);
        }
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> Result<()> {
        self.entry_mut(dn)?;
        self.entries.remove(&dn.to_ascii_lowercase());
        Ok(())
    }

    fn set_password(&mut self, dn: &str, password: &str) -> Result<()> {
        let entry = self.entry_mut(dn)?;
        *entry.values_mut("unicodePwd") = vec![encode_password_for_ad(password)];
        *entry.values_mut("pwdLastSet") = vec![b"133000000000000000".to_vec()];
        Ok(())
    }
}

enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    GreaterOrEqual(String, i64),
    LessOrEqual(String, i64),
    BitAnd(String, i64),
}

impl Filter {
    fn parse(input: &str) -> Option<Self> {
        let (filter, rest) = Self::parse_one(input.trim())?;
        rest.is_empty().then_some(filter)
    }

    fn parse_one(input: &str) -> Option<(Self, &str)> {
        let body = input.strip_prefix('(')?;
        match body.chars().next()? {
            '&' | '|' => {
                let mut rest = &body[1..];
                let mut parts = Vec::new();
                while rest.starts_with('(') {
                    let (part, tail) = Self::parse_one(rest)?;
                    parts.push(part);
                    rest = tail;
                }
                let rest = rest.strip_prefix(')')?;
                let filter = if body.starts_with('&') {
                    Self::And(parts)
                } else {
                    Self::Or(parts)
                };
                Some((filter, rest))
            }
            '!' => {
                let (inner, rest) = Self::parse_one(&body[1..])?;
                Some((Self::Not(Box::new(inner)), rest.strip_prefix(')')?))
            }
            _ => {
                let end = body.find(')')?;
                Some((Self::parse_item(&body[..end])?, &body[end + 1..]))
            }
        }
    }

    fn parse_item(item: &str) -> Option<Self> {
        if let Some((attr, value)) = item.split_once(">=") {
            return Some(Self::GreaterOrEqual(attr.to_string(), value.parse().ok()?));
        }
        if let Some((attr, value)) = item.split_once("<=") {
            return Some(Self::LessOrEqual(attr.to_string(), value.parse().ok()?));
        }
        let (lhs, value) = item
            .split_once(":=")
            .or_else(|| item.split_once('='))?;
        if let Some((attr, rule)) = lhs.split_once(':') {
            if rule != BITWISE_AND_RULE {
                return None;
            }
            return Some(Self::BitAnd(attr.to_string(), value.parse().ok()?));
        }
        if value == "*" {
            return Some(Self::Present(lhs.to_string()));
        }
        Some(Self::Equal(lhs.to_string(), unescape_filter_value(value)))
    }

    fn matches(&self, entry: &StoredEntry) -> bool {
        let numbers = |attr: &str| -> Vec<i64> {
            entry
                .text_values(attr)
                .iter()
                .filter_map(|v| v.parse().ok())
                .collect()
        };
        match self {
            Self::And(parts) => parts.iter().all(|part| part.matches(entry)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(entry)),
            Self::Not(inner) => !inner.matches(entry),
            Self::Present(attr) => entry.values(attr).is_some_and(|v| !v.is_empty()),
            Self::Equal(attr, value) => entry
                .text_values(attr)
                .iter()
                .any(|v| v.eq_ignore_ascii_case(value)),
            Self::GreaterOrEqual(attr, bound) => numbers(attr).iter().any(|n| n >= bound),
            Self::LessOrEqual(attr, bound) => numbers(attr).iter().any(|n| n <= bound),
            Self::BitAnd(attr, mask) => numbers(attr).iter().any(|n| n & mask == *mask),
        }
    }
}

fn unescape_filter_value(value: &str) -> String {
    value
        .replace("\\28", "(")
        .replace("\\29", ")")
        .replace("\\2A", "*")
        .replace("\\00", "\0")
        .replace("\\5C", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDirectory {
        let mut dir = MemoryDirectory::new();
        dir.insert(
            "CN=jdoe,CN=Users,DC=example,DC=com",
            &[
                ("objectClass", &["top", "person", "user"]),
                ("sAMAccountName", &["jdoe"]),
                ("userAccountControl", &["514"]),
            ],
        );
        dir.insert(
            "CN=asmith,CN=Users,DC=example,DC=com",
            &[
                ("objectClass", &["top", "person", "user"]),
                ("sAMAccountName", &["asmith"]),
                ("userAccountControl", &["512"]),
                ("accountExpires", &["0"]),
            ],
        );
        dir
    }

    #[test]
    fn filters_match_like_a_server() {
        let mut dir = sample();
        let base = "DC=example,DC=com";

        let users = dir.search(base, "(objectClass=user)", &["cn"]).unwrap();
        assert_eq!(users.len(), 2);

        let disabled = dir
            .search(
                base,
                "(&(objectClass=user)(userAccountControl:1.2.840.113556.1.4.803:=2))",
                &[],
            )
            .unwrap();
        assert_eq!(disabled.len(), 1);
        assert_eq!(disabled[0].dn, "CN=jdoe,CN=Users,DC=example,DC=com");

        let expiring = dir
            .search(base, "(&(objectClass=user)(accountExpires>=1))", &[])
            .unwrap();
        assert!(expiring.is_empty());

        let not_jdoe = dir
            .search(base, "(&(objectClass=user)(!(sAMAccountName=jdoe)))", &[])
            .unwrap();
        assert_eq!(not_jdoe.len(), 1);

        assert_eq!(dir.search(base, "(accountExpires=*)", &[]).unwrap().len(), 1);
    }

    #[test]
    fn search_is_scoped_to_base() {
        let mut dir = sample();
        assert!(dir
            .search("DC=other,DC=com", "(objectClass=*)", &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn read_entry_selects_attributes() {
        let mut dir = sample();
        let entry = dir
            .read_entry("cn=JDOE,cn=users,dc=example,dc=com", &["userAccountControl"])
            .unwrap()
            .unwrap();
        assert_eq!(entry.attrs.len(), 1);
        assert_eq!(entry.attrs["userAccountControl"], ["514"]);
        assert!(dir.read_entry("CN=ghost,DC=example,DC=com", &[]).unwrap().is_none());
    }

    #[test]
    fn read_only_entries_reject_changes() {
        let mut dir = sample();
        dir.set_read_only("CN=jdoe,CN=Users,DC=example,DC=com");
        assert!(dir
            .replace("CN=jdoe,CN=Users,DC=example,DC=com", "userAccountControl", &["512"])
            .is_err());
    }
}
