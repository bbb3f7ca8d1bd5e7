use crate::batch::{self, BatchReport, ExpiryRow};
use crate::directory::{require_entry, Directory};
use crate::dn::{DistinguishedName, ObjectKind};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use std::path::Path;

/// 100ns ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

const EXPIRING_FILTER: &str = "(&(objectClass=user)(accountExpires>=1))";

pub fn parse_expiry_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| Error::InvalidDate(raw.to_string()))
}

/// `accountExpires` value for midnight UTC at the start of `date`.
pub fn account_expires_from_date(date: NaiveDate) -> i64 {
    let seconds = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    seconds * TICKS_PER_SECOND + FILETIME_UNIX_EPOCH
}

/// Set `accountExpires` on a user and return the written value.
pub fn set_expiration<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
    date: &str,
) -> Result<i64> {
    let expires = account_expires_from_date(parse_expiry_date(date)?);
    let user_dn = DistinguishedName::new(name, domain, Some(ou_path), ObjectKind::User)?.to_string();

    require_entry(directory, &user_dn, &["accountExpires"])?;
    let value = expires.to_string();
    directory.replace(&user_dn, "accountExpires", &[value.as_str()])?;

    log::info!("{} expires at {} (accountExpires {})", user_dn, date.trim(), expires);
    Ok(expires)
}

pub fn expiring_count<D: Directory + ?Sized>(directory: &mut D, search_base: &str) -> Result<usize> {
    Ok(directory
        .search(search_base, EXPIRING_FILTER, &["distinguishedName"])?
        .len())
}

pub fn expire_from_file<D: Directory + ?Sized>(directory: &mut D, path: &Path) -> Result<BatchReport> {
    batch::run::<ExpiryRow, _>(path, |row| {
        let target = &row.target;
        set_expiration(directory, &target.name, &target.domain, &target.ou_path, &row.date)
            .map(|_| ())
    })
}
