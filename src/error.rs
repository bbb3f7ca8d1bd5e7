//! Error types shared by the DN engine, the account-control model and the
//! directory operations built on top of them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid domain format: {0:?}")]
    InvalidDomainFormat(String),

    #[error("group {0:?} has no container; groups need an explicit OU path")]
    MissingContainer(String),

    #[error("unknown userAccountControl flag name: {0}")]
    UnknownFlagName(String),

    #[error("cannot enable {0}: password must be changed at next logon (pwdLastSet is 0)")]
    PasswordResetRequired(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid date {0:?}: expected DD-MM-YYYY or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unsupported file {0:?}: expected .csv or a spreadsheet (.xlsx, .xls, .ods)")]
    UnsupportedFile(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_container_display() {
        let err = Error::MissingContainer("Admins".into());
        assert_eq!(
            err.to_string(),
            "group \"Admins\" has no container; groups need an explicit OU path"
        );
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }
}
