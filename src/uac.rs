//! userAccountControl bit model.
//!
//! Values are carried around as plain `u32` because that is what the directory
//! hands back; bits without a name are never dropped.

use crate::error::{Error, Result};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UserAccountControl: u32 {
        const SCRIPT                         = 0x0000_0001;
        const ACCOUNTDISABLE                 = 0x0000_0002;
        const HOMEDIR_REQUIRED               = 0x0000_0008;
        const LOCKOUT                        = 0x0000_0010;
        const PASSWD_NOTREQD                 = 0x0000_0020;
        const PASSWD_CANT_CHANGE             = 0x0000_0040;
        const ENCRYPTED_TEXT_PWD_ALLOWED     = 0x0000_0080;
        const TEMP_DUPLICATE_ACCOUNT         = 0x0000_0100;
        const NORMAL_ACCOUNT                 = 0x0000_0200;
        const INTERDOMAIN_TRUST_ACCOUNT      = 0x0000_0800;
        const WORKSTATION_TRUST_ACCOUNT      = 0x0000_1000;
        const SERVER_TRUST_ACCOUNT           = 0x0000_2000;
        const DONT_EXPIRE_PASSWORD           = 0x0001_0000;
        const MNS_LOGON_ACCOUNT              = 0x0002_0000;
        const SMARTCARD_REQUIRED             = 0x0004_0000;
        const TRUSTED_FOR_DELEGATION         = 0x0008_0000;
        const NOT_DELEGATED                  = 0x0010_0000;
        const USE_DES_KEY_ONLY               = 0x0020_0000;
        const DONT_REQ_PREAUTH               = 0x0040_0000;
        const PASSWORD_EXPIRED               = 0x0080_0000;
        const TRUSTED_TO_AUTH_FOR_DELEGATION = 0x0100_0000;
    }
}

/// Value written to new accounts when configuration asks for nothing better.
/// A site policy value: `NORMAL_ACCOUNT | PASSWD_NOTREQD`. It does not set
/// `DONT_EXPIRE_PASSWORD` (65536).
pub const DEFAULT_NEW_ACCOUNT: u32 = 544;

/// A value split into named flags and whatever is left over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub flags: UserAccountControl,
    pub unknown_bits: u32,
}

impl Decoded {
    pub fn names(&self) -> Vec<&'static str> {
        self.flags.iter_names().map(|(name, _)| name).collect()
    }

    pub fn value(&self) -> u32 {
        self.flags.bits() | self.unknown_bits
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.names().iter().map(|n| n.to_string()).collect();
        if self.unknown_bits != 0 {
            parts.push(format!("0x{:08X}", self.unknown_bits));
        }
        if parts.is_empty() {
            parts.push("(none)".to_string());
        }
        f.write_str(&parts.join(" | "))
    }
}

pub fn decode(value: u32) -> Decoded {
    let flags = UserAccountControl::from_bits_truncate(value);
    Decoded {
        flags,
        unknown_bits: value & !UserAccountControl::all().bits(),
    }
}

/// OR together the named flags. Names are matched case-insensitively.
pub fn encode<I, S>(names: I) -> Result<u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().try_fold(0u32, |acc, name| {
        let name = name.as_ref().trim();
        UserAccountControl::from_name(&name.to_ascii_uppercase())
            .map(|flag| acc | flag.bits())
            .ok_or_else(|| Error::UnknownFlagName(name.to_string()))
    })
}

pub fn set_flag(value: u32, flag: UserAccountControl) -> u32 {
    value | flag.bits()
}

pub fn clear_flag(value: u32, flag: UserAccountControl) -> u32 {
    value & !flag.bits()
}

pub fn is_set(value: u32, flag: UserAccountControl) -> bool {
    value & flag.bits() == flag.bits()
}

/// Site policy for new accounts: nothing, `0` or a bare `NORMAL_ACCOUNT` become
/// [`DEFAULT_NEW_ACCOUNT`]. Any other configured value is used unchanged.
pub fn default_control_value(configured: Option<u32>) -> u32 {
    match configured {
        None | Some(0) => DEFAULT_NEW_ACCOUNT,
        Some(v) if v == UserAccountControl::NORMAL_ACCOUNT.bits() => DEFAULT_NEW_ACCOUNT,
        Some(v) => v,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Enabled,
    Disabled,
}

impl AccountState {
    pub fn of(value: u32) -> Self {
        if is_set(value, UserAccountControl::ACCOUNTDISABLE) {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Clear `ACCOUNTDISABLE`. Refused while the password must be changed at next
/// logon, i.e. `pwdLastSet` is `0` or missing.
pub fn enable(value: u32, pwd_last_set: Option<i64>, account: &str) -> Result<u32> {
    match pwd_last_set {
        Some(ts) if ts != 0 => Ok(clear_flag(value, UserAccountControl::ACCOUNTDISABLE)),
        _ => Err(Error::PasswordResetRequired(account.to_string())),
    }
}

pub fn disable(value: u32) -> u32 {
    set_flag(value, UserAccountControl::ACCOUNTDISABLE)
}

/// Flip the account to the other state, returning the new value and state.
pub fn toggle(value: u32, pwd_last_set: Option<i64>, account: &str) -> Result<(u32, AccountState)> {
    match AccountState::of(value) {
        AccountState::Disabled => Ok((enable(value, pwd_last_set, account)?, AccountState::Enabled)),
        AccountState::Enabled => Ok((disable(value), AccountState::Disabled)),
    }
}
