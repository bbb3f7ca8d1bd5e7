use crate::batch::{self, BatchReport, ObjectRow};
use crate::directory::{first_value, require_entry, Directory};
use crate::dn::{DistinguishedName, ObjectKind};
use crate::error::{Error, Result};
use crate::uac::{self, AccountState};
use std::path::Path;

const DISABLED_FILTER: &str = "(&(objectClass=user)(userAccountControl:1.2.840.113556.1.4.803:=2))";

/// Control value and `pwdLastSet` of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountStatus {
    pub control: u32,
    pub pwd_last_set: Option<i64>,
}

/// Servers hand the value back either unsigned or as a signed 32-bit integer.
pub fn parse_control_value(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<i32>().ok().map(|v| v as u32))
}

pub fn read_status<D: Directory + ?Sized>(directory: &mut D, user_dn: &str) -> Result<AccountStatus> {
    let entry = require_entry(directory, user_dn, &["userAccountControl", "pwdLastSet"])?;

    let control = first_value(&entry, "userAccountControl")
        .and_then(parse_control_value)
        .ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no readable userAccountControl", user_dn))
        })?;
    let pwd_last_set = first_value(&entry, "pwdLastSet").and_then(|v| v.trim().parse().ok());

    Ok(AccountStatus {
        control,
        pwd_last_set,
    })
}

fn write_control<D: Directory + ?Sized>(directory: &mut D, user_dn: &str, control: u32) -> Result<()> {
    let value = control.to_string();
    directory.replace(user_dn, "userAccountControl", &[value.as_str()])
}

fn user_dn(name: &str, domain: &str, ou_path: &str) -> Result<String> {
    Ok(DistinguishedName::new(name, domain, Some(ou_path), ObjectKind::User)?.to_string())
}

/// Flip the account between enabled and disabled and return the new state.
pub fn toggle_block<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
) -> Result<AccountState> {
    let dn = user_dn(name, domain, ou_path)?;
    let status = read_status(directory, &dn)?;

    let (control, state) = uac::toggle(status.control, status.pwd_last_set, name).map_err(|e| {
        log::warn!("{}", e);
        e
    })?;
    write_control(directory, &dn, control)?;

    log::info!("{} is now {} (userAccountControl {})", dn, state, control);
    Ok(state)
}

/// Disable the account. Returns `false` when it already was.
pub fn block_user<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
) -> Result<bool> {
    let dn = user_dn(name, domain, ou_path)?;
    let status = read_status(directory, &dn)?;

    if AccountState::of(status.control) == AccountState::Disabled {
        log::info!("{} is already disabled", dn);
        return Ok(false);
    }

    let control = uac::disable(status.control);
    write_control(directory, &dn, control)?;
    log::info!("disabled {} (userAccountControl {})", dn, control);
    Ok(true)
}

/// Enable the account. Returns `false` when it already was.
pub fn unblock_user<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
) -> Result<bool> {
    let dn = user_dn(name, domain, ou_path)?;
    let status = read_status(directory, &dn)?;

    if AccountState::of(status.control) == AccountState::Enabled {
        log::info!("{} is already enabled", dn);
        return Ok(false);
    }

    let control = uac::enable(status.control, status.pwd_last_set, name)?;
    write_control(directory, &dn, control)?;
    log::info!("enabled {} (userAccountControl {})", dn, control);
    Ok(true)
}

pub fn blocked_count<D: Directory + ?Sized>(directory: &mut D, search_base: &str) -> Result<usize> {
    Ok(directory
        .search(search_base, DISABLED_FILTER, &["distinguishedName"])?
        .len())
}

pub fn block_from_file<D: Directory + ?Sized>(directory: &mut D, path: &Path) -> Result<BatchReport> {
    batch::run::<ObjectRow, _>(path, |row| {
        block_user(directory, &row.name, &row.domain, &row.ou_path).map(|_| ())
    })
}

pub fn unblock_from_file<D: Directory + ?Sized>(directory: &mut D, path: &Path) -> Result<BatchReport> {
    batch::run::<ObjectRow, _>(path, |row| {
        unblock_user(directory, &row.name, &row.domain, &row.ou_path).map(|_| ())
    })
}
