// src/commands/groups.rs
use crate::batch::{self, BatchReport, MembershipRow};
use crate::commands::{object_list, DirectoryObject};
use crate::directory::{all_values, require_entry, text_attr, Directory};
use crate::dn::{DistinguishedName, DomainName, ObjectKind};
use crate::error::{Error, Result};
use crate::ldap::escape_filter;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// ADS_GROUP_TYPE_GLOBAL_GROUP | ADS_GROUP_TYPE_SECURITY_ENABLED
pub const GLOBAL_SECURITY_GROUP: i32 = -2147483646;
const SAM_ACCOUNT_NAME_MAX: usize = 20;
const CONFIG_TARGET_OU: &str = "CN=Users";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub ou_path: String,
    pub description: Option<String>,
    pub mail: Option<String>,
}

/// Pre-Windows 2000 name: spaces dropped, at most 20 characters.
pub fn group_sam_account_name(name: &str) -> String {
    let sam: String = name
        .chars()
        .filter(|c| *c != ' ')
        .take(SAM_ACCOUNT_NAME_MAX)
        .collect();
    if !sam.is_empty() {
        return sam;
    }
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SAM_ACCOUNT_NAME_MAX)
        .collect()
}

fn member_dns(membership: &MembershipRow) -> Result<(String, String)> {
    let user = &membership.user;
    let group = &membership.group;
    let user_dn =
        DistinguishedName::new(&user.name, &user.domain, Some(&user.ou_path), ObjectKind::User)?;
    let group_dn =
        DistinguishedName::new(&group.name, &group.domain, Some(&group.ou_path), ObjectKind::Group)?;
    Ok((user_dn.to_string(), group_dn.to_string()))
}

pub fn list_groups<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
) -> Result<Vec<DirectoryObject>> {
    let entries = directory.search(search_base, "(objectClass=group)", &["cn", "distinguishedName"])?;
    Ok(object_list(entries))
}

pub fn list_members<D: Directory + ?Sized>(directory: &mut D, group_dn: &str) -> Result<Vec<String>> {
    let entry = require_entry(directory, group_dn, &["member"])?;
    Ok(all_values(&entry, "member").to_vec())
}

pub fn add_member_by_dn<D: Directory + ?Sized>(
    directory: &mut D,
    user_dn: &str,
    group_dn: &str,
) -> Result<()> {
    directory.add_values(group_dn, "member", &[user_dn])?;
    log::info!("added {} to {}", user_dn, group_dn);
    Ok(())
}

pub fn remove_member_by_dn<D: Directory + ?Sized>(
    directory: &mut D,
    user_dn: &str,
    group_dn: &str,
) -> Result<()> {
    directory.delete_values(group_dn, "member", &[user_dn])?;
    log::info!("removed {} from {}", user_dn, group_dn);
    Ok(())
}

/// Add a member given both objects as name, domain and OU path.
pub fn add_member<D: Directory + ?Sized>(directory: &mut D, membership: &MembershipRow) -> Result<()> {
    let (user_dn, group_dn) = member_dns(membership)?;
    add_member_by_dn(directory, &user_dn, &group_dn)
}

pub fn remove_member<D: Directory + ?Sized>(directory: &mut D, membership: &MembershipRow) -> Result<()> {
    let (user_dn, group_dn) = member_dns(membership)?;
    remove_member_by_dn(directory, &user_dn, &group_dn)
}

fn dn_by_sam<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    sam_account_name: &str,
) -> Result<String> {
    let filter = format!("(sAMAccountName={})", escape_filter(sam_account_name));
    directory
        .search(search_base, &filter, &["distinguishedName"])?
        .into_iter()
        .next()
        .map(|entry| entry.dn)
        .ok_or_else(|| Error::NotFound(sam_account_name.to_string()))
}

/// Add a member when only the two `sAMAccountName`s are known.
pub fn add_member_by_sam<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    user: &str,
    group: &str,
) -> Result<()> {
    let user_dn = dn_by_sam(directory, search_base, user)?;
    let group_dn = dn_by_sam(directory, search_base, group)?;
    add_member_by_dn(directory, &user_dn, &group_dn)
}

/// Create a global security group and return its DN.
pub fn create_group<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    group: &NewGroup,
) -> Result<String> {
    let domain = DomainName::from_dn_components(search_base)?;
    let group_dn = DistinguishedName::new(
        &group.name,
        &domain.to_dotted_string(),
        Some(&group.ou_path),
        ObjectKind::Group,
    )?
    .to_string();

    let sam = group_sam_account_name(&group.name);
    let group_type = GLOBAL_SECURITY_GROUP.to_string();

    let mut attrs = vec![
        text_attr("objectClass", &["top", "group"]),
        text_attr("cn", &[group.name.as_str()]),
        text_attr("sAMAccountName", &[sam.as_str()]),
        text_attr("groupType", &[group_type.as_str()]),
    ];
    if let Some(description) = group.description.as_deref().filter(|d| !d.is_empty()) {
        attrs.push(text_attr("description", &[description]));
    }
    if let Some(mail) = group.mail.as_deref().filter(|m| !m.is_empty()) {
        attrs.push(text_attr("mail", &[mail]));
    }

    directory.add(&group_dn, attrs)?;
    log::info!("created group {} ({})", sam, group_dn);
    Ok(group_dn)
}

pub fn delete_group<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
) -> Result<String> {
    let group_dn = DistinguishedName::new(name, domain, Some(ou_path), ObjectKind::Group)?.to_string();

    require_entry(directory, &group_dn, &["objectClass"])?;
    directory.delete(&group_dn)?;

    log::info!("deleted group {}", group_dn);
    Ok(group_dn)
}

/// Delete a group knowing only its name. The DN comes from the group list.
pub fn delete_group_by_name<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    name: &str,
) -> Result<String> {
    let name = name.trim();
    let mut matches: Vec<DirectoryObject> = list_groups(directory, search_base)?
        .into_iter()
        .filter(|group| group.cn.eq_ignore_ascii_case(name))
        .collect();

    let group = match matches.len() {
        0 => return Err(Error::NotFound(format!("group {}", name))),
        1 => matches.remove(0),
        n => {
            return Err(Error::InvalidArgument(format!(
                "{} groups are named {}, delete by OU path instead",
                n, name
            )))
        }
    };

    directory.delete(&group.dn)?;
    log::info!("deleted group {}", group.dn);
    Ok(group.dn)
}

#[derive(Debug, Clone, Deserialize)]
struct GroupConfigGeneral {
    #[serde(rename = "Group name (pre-Windows 2000)")]
    name: String,
    #[serde(rename = "Target OU", default)]
    target_ou: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "E-mail", default)]
    mail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GroupConfigAction {
    Add,
    Remove,
    Modify,
}

/// A `group-config.json` document.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "GroupConfig::default_action")]
    action: GroupConfigAction,
    #[serde(rename = "group_DN", default)]
    group_dn: Option<String>,
    #[serde(rename = "General", default)]
    general: Option<GroupConfigGeneral>,
}

impl GroupConfig {
    fn default_action() -> GroupConfigAction {
        GroupConfigAction::Add
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// The group described by the `General` section. The target OU falls
    /// back to `CN=Users`.
    pub fn new_group(&self) -> Result<NewGroup> {
        let general = self
            .general
            .as_ref()
            .ok_or_else(|| Error::Config("group config has no General section".into()))?;
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Ok(NewGroup {
            name: general.name.trim().to_string(),
            ou_path: non_empty(&general.target_ou).unwrap_or_else(|| CONFIG_TARGET_OU.to_string()),
            description: non_empty(&general.description),
            mail: non_empty(&general.mail),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupConfigOutcome {
    Created(String),
    Deleted(String),
}

/// Create or delete the group a config file describes.
pub fn apply_group_config<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    path: &Path,
) -> Result<GroupConfigOutcome> {
    let config = GroupConfig::load(path)?;
    match config.action {
        GroupConfigAction::Add => {
            let group = config.new_group()?;
            create_group(directory, search_base, &group).map(GroupConfigOutcome::Created)
        }
        GroupConfigAction::Remove => {
            let group_dn = config
                .group_dn
                .filter(|dn| !dn.trim().is_empty())
                .ok_or_else(|| Error::Config("remove needs group_DN".into()))?;
            require_entry(directory, &group_dn, &["objectClass"])?;
            directory.delete(&group_dn)?;
            log::info!("deleted group {}", group_dn);
            Ok(GroupConfigOutcome::Deleted(group_dn))
        }
        GroupConfigAction::Modify => Err(Error::Config(
            "group config action modify is not supported".into(),
        )),
    }
}

pub fn add_members_from_file<D: Directory + ?Sized>(directory: &mut D, path: &Path) -> Result<BatchReport> {
    batch::run::<MembershipRow, _>(path, |row| add_member(directory, row))
}

pub fn remove_members_from_file<D: Directory + ?Sized>(
    directory: &mut D,
    path: &Path,
) -> Result<BatchReport> {
    batch::run::<MembershipRow, _>(path, |row| remove_member(directory, row))
}
