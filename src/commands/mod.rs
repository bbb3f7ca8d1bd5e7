pub mod actions;
pub mod block;
pub mod expire;
pub mod groups;
pub mod users;

use crate::directory::first_value;
use crate::dn;
use ldap3::SearchEntry;

/// A listed user or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryObject {
    pub cn: String,
    pub dn: String,
}

impl DirectoryObject {
    /// Takes `cn` from the entry, or from the DN's leaf when the attribute
    /// was not returned.
    pub fn from_entry(entry: &SearchEntry) -> Self {
        let cn = first_value(entry, "cn")
            .map(str::to_string)
            .or_else(|| dn::parse(&entry.dn).leaf_cn)
            .unwrap_or_default();

        Self {
            cn,
            dn: entry.dn.clone(),
        }
    }
}

pub(crate) fn object_list(mut entries: Vec<SearchEntry>) -> Vec<DirectoryObject> {
    entries.sort_by(|a, b| a.dn.cmp(&b.dn));
    entries.iter().map(DirectoryObject::from_entry).collect()
}
