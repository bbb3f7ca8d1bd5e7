use crate::dn::escape::{escape_value, split_unescaped, unescape_value};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A DNS-style domain such as `corp.example.com`, kept as its labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    labels: Vec<String>,
}

impl DomainName {
    pub fn parse(domain: &str) -> Result<Self> {
        let trimmed = domain.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidDomainFormat(domain.to_string()));
        }

        let labels: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if labels.iter().any(|label| label.is_empty()) {
            return Err(Error::InvalidDomainFormat(domain.to_string()));
        }

        Ok(Self { labels })
    }

    /// Recover the domain from a `DC=` chain, e.g. a `defaultNamingContext`.
    /// Components of any other type are skipped.
    pub fn from_dn_components(dn: &str) -> Result<Self> {
        let labels: Vec<String> = split_unescaped(dn, ',')
            .into_iter()
            .filter_map(|component| {
                let (attr, value) = component.trim().split_once('=')?;
                attr.trim()
                    .eq_ignore_ascii_case("DC")
                    .then(|| unescape_value(value.trim()))
            })
            .collect();

        if labels.is_empty() || labels.iter().any(|label| label.is_empty()) {
            return Err(Error::InvalidDomainFormat(dn.to_string()));
        }

        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `corp.example.com` -> `DC=corp,DC=example,DC=com`. Order is kept as-is.
    pub fn to_dn_components(&self) -> String {
        self.labels
            .iter()
            .map(|label| format!("DC={}", escape_value(label)))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_dotted_string(&self) -> String {
        self.labels.join(".")
    }

    /// First label upper-cased, the legacy NetBIOS-style prefix.
    pub fn short_prefix(&self) -> String {
        self.labels[0].to_uppercase()
    }

    /// `PREFIX\user`, unless `user` is already qualified.
    pub fn logon_name(&self, user: &str) -> String {
        if user.contains('\\') {
            return user.to_string();
        }
        format!("{}\\{}", self.short_prefix(), user)
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dn_components_keep_label_order() {
        let domain = DomainName::parse("corp.example.com").unwrap();
        assert_eq!(domain.to_dn_components(), "DC=corp,DC=example,DC=com");
    }

    #[test]
    fn dotted_round_trip() {
        for input in ["example.com", "corp.example.com", "local", "a.b.c.d.e"] {
            let domain = DomainName::parse(input).unwrap();
            let again = DomainName::parse(&domain.to_dotted_string()).unwrap();
            assert_eq!(again.to_dotted_string(), input);
            assert_eq!(again, domain);
        }
    }

    #[test]
    fn rejects_empty_labels() {
        for input in ["", "   ", ".example.com", "example.com.", "example..com", "."] {
            assert!(
                matches!(DomainName::parse(input), Err(Error::InvalidDomainFormat(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn short_prefix_is_first_label_upper() {
        let domain = DomainName::parse("testad.local").unwrap();
        assert_eq!(domain.short_prefix(), "TESTAD");
    }

    #[test]
    fn logon_name_qualifies_bare_user() {
        let domain = DomainName::parse("testad.local").unwrap();
        assert_eq!(domain.logon_name("admin"), "TESTAD\\admin");
        assert_eq!(domain.logon_name("OTHER\\admin"), "OTHER\\admin");
    }

    #[test]
    fn from_dn_components_skips_other_types() {
        let domain =
            DomainName::from_dn_components("CN=Users,dc=testad, DC=local").unwrap();
        assert_eq!(domain.to_dotted_string(), "testad.local");
    }

    #[test]
    fn from_dn_components_needs_a_dc() {
        assert!(matches!(
            DomainName::from_dn_components("CN=Users,OU=Sales"),
            Err(Error::InvalidDomainFormat(_))
        ));
    }

    #[test]
    fn from_str_and_display() {
        let domain: DomainName = "example.com".parse().unwrap();
        assert_eq!(domain.to_string(), "example.com");
        assert_eq!(domain.labels(), ["example", "com"]);
    }
}
