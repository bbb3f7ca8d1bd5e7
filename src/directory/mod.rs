//! The narrow slice of LDAP the account operations need.

#[cfg(test)]
pub(crate) mod memory;

use crate::error::{Error, Result};
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{LdapConn, LdapError, Mod, Scope, SearchEntry};
use std::collections::HashSet;

const PAGE_SIZE: i32 = 500;
const NO_SUCH_OBJECT: u32 = 32;

/// One attribute of a new entry with all of its raw values.
pub type Attribute = (String, Vec<Vec<u8>>);

pub fn text_attr(name: &str, values: &[&str]) -> Attribute {
    (
        name.to_string(),
        values.iter().map(|value| value.as_bytes().to_vec()).collect(),
    )
}

/// `unicodePwd` wants the quoted password as UTF-16LE.
pub fn encode_password_for_ad(password: &str) -> Vec<u8> {
    let quoted = format!("\"{}\"", password);
    quoted
        .encode_utf16()
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

pub trait Directory {
    /// Base-scope read of a single entry. A missing entry is `Ok(None)`.
    fn read_entry(&mut self, dn: &str, attrs: &[&str]) -> Result<Option<SearchEntry>>;

    /// Subtree search below `base`.
    fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<SearchEntry>>;

    fn add(&mut self, dn: &str, attrs: Vec<Attribute>) -> Result<()>;

    fn replace(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()>;

    fn add_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()>;

    fn delete_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()>;

    fn delete(&mut self, dn: &str) -> Result<()>;

    fn set_password(&mut self, dn: &str, password: &str) -> Result<()>;
}

fn value_set(values: &[&str]) -> HashSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Directory for LdapConn {
    fn read_entry(&mut self, dn: &str, attrs: &[&str]) -> Result<Option<SearchEntry>> {
        let outcome = LdapConn::search(self, dn, Scope::Base, "(objectClass=*)", attrs.to_vec())?
            .success();

        match outcome {
            Ok((entries, _)) => Ok(entries.into_iter().next().map(SearchEntry::construct)),
            Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<SearchEntry>> {
        log::debug!("searching {} with {}", base, filter);

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];

        let mut stream =
            self.streaming_search_with(adapters, base, Scope::Subtree, filter, attrs.to_vec())?;

        let mut entries = Vec::new();
        while let Some(entry) = stream.next()? {
            entries.push(SearchEntry::construct(entry));
        }
        stream.result().success()?;

        Ok(entries)
    }

    fn add(&mut self, dn: &str, attrs: Vec<Attribute>) -> Result<()> {
        let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attrs
            .into_iter()
            .map(|(name, values)| (name.into_bytes(), values.into_iter().collect()))
            .collect();

        LdapConn::add(self, dn, attrs)?.success()?;
        Ok(())
    }

    fn replace(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        self.modify(dn, vec![Mod::Replace(attr.to_string(), value_set(values))])?
            .success()?;
        Ok(())
    }

    fn add_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        self.modify(dn, vec![Mod::Add(attr.to_string(), value_set(values))])?
            .success()?;
        Ok(())
    }

    fn delete_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
        self.modify(dn, vec![Mod::Delete(attr.to_string(), value_set(values))])?
            .success()?;
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> Result<()> {
        LdapConn::delete(self, dn)?.success()?;
        Ok(())
    }

    fn set_password(&mut self, dn: &str, password: &str) -> Result<()> {
        let mut pwd_set = HashSet::new();
        pwd_set.insert(encode_password_for_ad(password));

        self.modify(dn, vec![Mod::Replace(b"unicodePwd".to_vec(), pwd_set)])?
            .success()?;
        Ok(())
    }
}

/// First value of a text attribute, looked up case-insensitively.
pub fn first_value<'a>(entry: &'a SearchEntry, attr: &str) -> Option<&'a str> {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

pub fn all_values<'a>(entry: &'a SearchEntry, attr: &str) -> &'a [String] {
    entry
        .attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .map(|(_, values)| values.as_slice())
        .unwrap_or_default()
}

/// Read an entry that has to exist.
pub fn require_entry<D: Directory + ?Sized>(
    directory: &mut D,
    dn: &str,
    attrs: &[&str],
) -> Result<SearchEntry> {
    directory
        .read_entry(dn, attrs)?
        .ok_or_else(|| Error::NotFound(dn.to_string()))
}
