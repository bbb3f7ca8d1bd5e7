use crate::batch::{self, BatchReport, NewUserRow, ObjectRow};
use crate::commands::{object_list, DirectoryObject};
use crate::config::UserDefaults;
use crate::directory::{first_value, require_entry, text_attr, Attribute, Directory};
use crate::dn::{DistinguishedName, DomainName, ObjectKind};
use crate::error::{Error, Result};
use crate::ldap::escape_filter;
use crate::uac;
use ldap3::SearchEntry;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

const FIRST_UID_NUMBER: u32 = 1000;
const MIN_PASSWORD_LENGTH: usize = 8;

/// Random password with at least one upper, lower, digit and symbol.
pub fn generate_password(length: usize) -> String {
    const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const NUMBERS: &[u8] = b"0123456789";
    const SPECIAL: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::thread_rng();
    let mut password: Vec<u8> = [UPPERCASE, LOWERCASE, NUMBERS, SPECIAL]
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();

    let all: Vec<u8> = [UPPERCASE, LOWERCASE, NUMBERS, SPECIAL].concat();
    while password.len() < length {
        password.push(all[rng.gen_range(0..all.len())]);
    }

    password.shuffle(&mut rng);
    password.into_iter().map(char::from).collect()
}

pub fn validate_new_user(user: &NewUserRow) -> Result<()> {
    for (name, value) in [
        ("username", &user.username),
        ("first name", &user.first_name),
        ("last name", &user.last_name),
        ("password", &user.password),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidArgument(format!("{} is required", name)));
        }
    }

    let valid_username = user
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_username {
        return Err(Error::InvalidArgument(format!(
            "invalid username {:?}: use letters, digits, '_' or '-'",
            user.username
        )));
    }

    if user.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

/// Highest `uidNumber` in the directory plus one.
pub fn next_uid_number<D: Directory + ?Sized>(directory: &mut D, search_base: &str) -> Result<u32> {
    let entries = directory.search(search_base, "(uidNumber=*)", &["uidNumber"])?;

    let highest = entries
        .iter()
        .filter_map(|entry| first_value(entry, "uidNumber"))
        .filter_map(|value| value.trim().parse::<u32>().ok())
        .max();

    Ok(highest.map_or(FIRST_UID_NUMBER, |uid| uid.saturating_add(1)))
}

pub fn find_by_sam<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    sam_account_name: &str,
) -> Result<Option<SearchEntry>> {
    let filter = format!(
        "(&(objectClass=user)(sAMAccountName={}))",
        escape_filter(sam_account_name)
    );
    let entries = directory.search(
        search_base,
        &filter,
        &["distinguishedName", "userAccountControl", "pwdLastSet"],
    )?;
    Ok(entries.into_iter().next())
}

/// Create a user in the configured default OU and return its DN.
///
/// The entry is added first, then the password is set, then the account
/// control value from the defaults policy is written. When either of the
/// last two steps fails the entry is deleted again, so a row can be retried.
pub fn create_user<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    defaults: &UserDefaults,
    user: &NewUserRow,
) -> Result<String> {
    validate_new_user(user)?;

    let domain = DomainName::from_dn_components(search_base)?;
    let display_name = format!("{} {}", user.first_name, user.last_name);
    let user_dn = DistinguishedName::new(
        &display_name,
        &domain.to_dotted_string(),
        Some(defaults.default_ou()),
        ObjectKind::User,
    )?
    .to_string();

    if let Some(existing) = find_by_sam(directory, search_base, &user.username)? {
        return Err(Error::InvalidArgument(format!(
            "sAMAccountName {} is already used by {}",
            user.username, existing.dn
        )));
    }

    let uid_number = next_uid_number(directory, search_base)?.to_string();
    let principal = format!("{}@{}", user.username, domain);

    let mut attrs: Vec<Attribute> = vec![
        text_attr("objectClass", &["top", "person", "organizationalPerson", "user"]),
        text_attr("cn", &[display_name.as_str()]),
        text_attr("sAMAccountName", &[user.username.as_str()]),
        text_attr("userPrincipalName", &[principal.as_str()]),
        text_attr("givenName", &[user.first_name.as_str()]),
        text_attr("sn", &[user.last_name.as_str()]),
        text_attr("displayName", &[display_name.as_str()]),
        text_attr("uid", &[user.username.as_str()]),
        text_attr("uidNumber", &[uid_number.as_str()]),
    ];

    for (name, value) in &defaults.attributes {
        if attrs.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
            log::debug!("default attribute {} ignored, already set", name);
            continue;
        }
        attrs.push((name.clone(), vec![value.to_bytes()]));
    }

    log::debug!("adding user {}", user_dn);
    directory.add(&user_dn, attrs)?;

    let control = uac::default_control_value(defaults.user_account_control).to_string();
    let finished = directory
        .set_password(&user_dn, &user.password)
        .and_then(|_| directory.replace(&user_dn, "userAccountControl", &[control.as_str()]));

    if let Err(e) = finished {
        log::warn!("creation of {} failed ({}), removing the partial entry", user_dn, e);
        if let Err(cleanup) = directory.delete(&user_dn) {
            log::error!("could not remove partial entry {}: {}", user_dn, cleanup);
        }
        return Err(e);
    }

    log::info!("created user {} ({})", user.username, user_dn);
    Ok(user_dn)
}

pub fn delete_user<D: Directory + ?Sized>(
    directory: &mut D,
    name: &str,
    domain: &str,
    ou_path: &str,
) -> Result<String> {
    let user_dn = DistinguishedName::new(name, domain, Some(ou_path), ObjectKind::User)?.to_string();

    require_entry(directory, &user_dn, &["objectClass"])?;
    directory.delete(&user_dn)?;

    log::info!("deleted user {}", user_dn);
    Ok(user_dn)
}

pub fn list_users<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
) -> Result<Vec<DirectoryObject>> {
    let entries = directory.search(search_base, "(objectClass=user)", &["cn", "distinguishedName"])?;
    Ok(object_list(entries))
}

pub fn count_users<D: Directory + ?Sized>(directory: &mut D, search_base: &str) -> Result<usize> {
    Ok(directory
        .search(search_base, "(objectClass=user)", &["distinguishedName"])?
        .len())
}

/// Users whose `cn` contains `term`, ignoring case.
pub fn search_users<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    term: &str,
) -> Result<Vec<DirectoryObject>> {
    let needle = term.trim().to_lowercase();
    Ok(list_users(directory, search_base)?
        .into_iter()
        .filter(|user| user.cn.to_lowercase().contains(&needle))
        .collect())
}

/// Create every user listed in a header-keyed CSV or spreadsheet file.
pub fn import_users<D: Directory + ?Sized>(
    directory: &mut D,
    search_base: &str,
    defaults: &UserDefaults,
    path: &Path,
) -> Result<BatchReport> {
    batch::run::<NewUserRow, _>(path, |row| {
        create_user(directory, search_base, defaults, row).map(|_| ())
    })
}

pub fn delete_users<D: Directory + ?Sized>(directory: &mut D, path: &Path) -> Result<BatchReport> {
    batch::run::<ObjectRow, _>(path, |row| {
        delete_user(directory, &row.name, &row.domain, &row.ou_path).map(|_| ())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributeValue;
    use crate::directory::memory::MemoryDirectory;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = "DC=example,DC=com";

    fn new_user(username: &str, password: &str) -> NewUserRow {
        NewUserRow {
            username: username.into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            password: password.into(),
        }
    }

    #[test]
    fn generated_passwords_pass_validation() {
        let password = generate_password(16);
        assert_eq!(password.len(), 16);
        assert!(password.chars().any(|c| c.is_ascii_uppercase()));
        assert!(password.chars().any(|c| c.is_ascii_lowercase()));
        assert!(password.chars().any(|c| c.is_ascii_digit()));
        assert!(validate_new_user(&new_user("jdoe", &password)).is_ok());

        assert_eq!(generate_password(2).len(), MIN_PASSWORD_LENGTH);
    }

    #[test]
    fn validation_rules() {
        assert!(validate_new_user(&new_user("jdoe", "S3cretPass")).is_ok());
        assert!(validate_new_user(&new_user("j.doe", "S3cretPass")).is_err());
        assert!(validate_new_user(&new_user("jdoe", "short")).is_err());
        assert!(validate_new_user(&new_user("", "S3cretPass")).is_err());

        let mut missing = new_user("jdoe", "S3cretPass");
        missing.last_name = " ".into();
        assert!(matches!(validate_new_user(&missing), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn uid_numbers_start_at_1000() {
        let mut dir = MemoryDirectory::new();
        assert_eq!(next_uid_number(&mut dir, BASE).unwrap(), 1000);

        dir.insert("CN=a,CN=Users,DC=example,DC=com", &[("uidNumber", &["1004"])]);
        dir.insert("CN=b,CN=Users,DC=example,DC=com", &[("uidNumber", &["1017"])]);
        dir.insert("CN=c,CN=Users,DC=example,DC=com", &[("uidNumber", &["junk"])]);
        assert_eq!(next_uid_number(&mut dir, BASE).unwrap(), 1018);
    }

    #[test]
    fn create_user_writes_entry_password_and_control() {
        let mut dir = MemoryDirectory::new();
        let defaults = UserDefaults {
            default_ou: Some("Staff/IT".into()),
            user_account_control: None,
            attributes: vec![
                ("loginShell".into(), AttributeValue::Text("/bin/bash".into())),
                ("sn".into(), AttributeValue::Text("ignored".into())),
            ],
        };

        let dn = create_user(&mut dir, BASE, &defaults, &new_user("jdoe", "S3cretPass")).unwrap();
        assert_eq!(dn, "CN=John Doe,OU=IT,OU=Staff,DC=example,DC=com");

        assert_eq!(dir.attr(&dn, "sAMAccountName"), ["jdoe"]);
        assert_eq!(dir.attr(&dn, "userPrincipalName"), ["jdoe@example.com"]);
        assert_eq!(dir.attr(&dn, "uidNumber"), ["1000"]);
        assert_eq!(dir.attr(&dn, "loginShell"), ["/bin/bash"]);
        assert_eq!(dir.attr(&dn, "sn"), ["Doe"]);
        assert_eq!(dir.attr(&dn, "userAccountControl"), ["544"]);
        assert_eq!(
            dir.raw_attr(&dn, "unicodePwd"),
            vec![crate::directory::encode_password_for_ad("S3cretPass")]
        );
    }

    struct PasswordPolicy {
        inner: MemoryDirectory,
    }

    impl Directory for PasswordPolicy {
        fn read_entry(&mut self, dn: &str, attrs: &[&str]) -> Result<Option<SearchEntry>> {
            self.inner.read_entry(dn, attrs)
        }
        fn search(&mut self, base: &str, filter: &str, attrs: &[&str]) -> Result<Vec<SearchEntry>> {
            self.inner.search(base, filter, attrs)
        }
        fn add(&mut self, dn: &str, attrs: Vec<Attribute>) -> Result<()> {
            self.inner.add(dn, attrs)
        }
        fn replace(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
            self.inner.replace(dn, attr, values)
        }
        fn add_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
            self.inner.add_values(dn, attr, values)
        }
        fn delete_values(&mut self, dn: &str, attr: &str, values: &[&str]) -> Result<()> {
            self.inner.delete_values(dn, attr, values)
        }
        fn delete(&mut self, dn: &str) -> Result<()> {
            self.inner.delete(dn)
        }
        fn set_password(&mut self, _dn: &str, _password: &str) -> Result<()> {
            Err(Error::InvalidArgument("constraint violation: password policy".into()))
        }
    }

    #[test]
    fn failed_password_removes_the_new_entry() {
        let mut dir = PasswordPolicy {
            inner: MemoryDirectory::new(),
        };
        let user = new_user("jdoe", "S3cretPass");

        let err = create_user(&mut dir, BASE, &UserDefaults::default(), &user).unwrap_err();
        assert!(err.to_string().contains("password policy"));
        assert!(!dir.inner.contains("CN=John Doe,CN=Users,DC=example,DC=com"));

        let mut inner = dir.inner;
        let dn = create_user(&mut inner, BASE, &UserDefaults::default(), &user).unwrap();
        assert_eq!(inner.attr(&dn, "sAMAccountName"), ["jdoe"]);
    }

    #[test]
    fn count_and_search_users() {
        let mut dir = MemoryDirectory::new();
        dir.insert("CN=John Doe,CN=Users,DC=example,DC=com", &[("objectClass", &["user"])]);
        dir.insert("CN=Anna Smith,OU=HR,DC=example,DC=com", &[("objectClass", &["user"])]);
        dir.insert("CN=Doe Admins,OU=Groups,DC=example,DC=com", &[("objectClass", &["group"])]);

        assert_eq!(count_users(&mut dir, BASE).unwrap(), 2);

        let found = search_users(&mut dir, BASE, "DOE").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cn, "John Doe");

        assert!(search_users(&mut dir, BASE, "nobody").unwrap().is_empty());
    }

    #[test]
    fn find_user_by_sam_account_name() {
        let mut dir = MemoryDirectory::new();
        dir.insert(
            "CN=John Doe,CN=Users,DC=example,DC=com",
            &[("objectClass", &["user"]), ("sAMAccountName", &["jdoe"])],
        );

        let found = find_by_sam(&mut dir, BASE, "jdoe").unwrap().unwrap();
        assert_eq!(found.dn, "CN=John Doe,CN=Users,DC=example,DC=com");
        assert!(find_by_sam(&mut dir, BASE, "ghost").unwrap().is_none());
    }

    #[test]
    fn create_user_rejects_taken_username() {
        let mut dir = MemoryDirectory::new();
        dir.insert(
            "CN=Someone,CN=Users,DC=example,DC=com",
            &[("objectClass", &["user"]), ("sAMAccountName", &["jdoe"])],
        );

        let err = create_user(&mut dir, BASE, &UserDefaults::default(), &new_user("jdoe", "S3cretPass"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!dir.contains("CN=John Doe,CN=Users,DC=example,DC=com"));
    }

    #[test]
    fn delete_user_builds_dn_and_removes_entry() {
        let mut dir = MemoryDirectory::new();
        dir.insert("CN=jdoe,OU=Sales,DC=example,DC=com", &[("objectClass", &["user"])]);

        let dn = delete_user(&mut dir, "jdoe", "example.com", "Sales").unwrap();
        assert_eq!(dn, "CN=jdoe,OU=Sales,DC=example,DC=com");
        assert!(!dir.contains(&dn));

        assert!(matches!(
            delete_user(&mut dir, "jdoe", "example.com", "Sales"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn list_users_falls_back_to_dn_leaf() {
        let mut dir = MemoryDirectory::new();
        dir.insert(
            "CN=jdoe,CN=Users,DC=example,DC=com",
            &[("objectClass", &["user"]), ("cn", &["jdoe"])],
        );
        dir.insert("CN=Anna Smith,OU=HR,DC=example,DC=com", &[("objectClass", &["user"])]);
        dir.insert("CN=Admins,OU=Groups,DC=example,DC=com", &[("objectClass", &["group"])]);

        let users = list_users(&mut dir, BASE).unwrap();
        assert_eq!(
            users,
            vec![
                DirectoryObject {
                    cn: "Anna Smith".into(),
                    dn: "CN=Anna Smith,OU=HR,DC=example,DC=com".into(),
                },
                DirectoryObject {
                    cn: "jdoe".into(),
                    dn: "CN=jdoe,CN=Users,DC=example,DC=com".into(),
                },
            ]
        );
    }

    #[test]
    fn import_users_reports_per_row() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("new.csv");
        fs::write(
            &path,
            "username,first_name,last_name,password\n\
             jdoe,John,Doe,S3cretPass\n\
             bad name,Bad,Name,S3cretPass\n\
             asmith,Anna,Smith,S3cretPass\n",
        )
        .unwrap();

        let mut dir = MemoryDirectory::new();
        let report = import_users(&mut dir, BASE, &UserDefaults::default(), &path).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].line, 3);
        assert_eq!(dir.attr("CN=Anna Smith,CN=Users,DC=example,DC=com", "uidNumber"), ["1001"]);
    }

    #[test]
    fn delete_users_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("delete.csv");
        fs::write(&path, "name,domain,ou\njdoe,example.com,\nghost,example.com,\n").unwrap();

        let mut dir = MemoryDirectory::new();
        dir.insert("CN=jdoe,CN=Users,DC=example,DC=com", &[("objectClass", &["user"])]);

        let report = delete_users(&mut dir, &path).unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!dir.contains("CN=jdoe,CN=Users,DC=example,DC=com"));
    }
}
