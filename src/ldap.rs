use crate::dn::DomainName;
use crate::error::{Error, Result};
use ldap3::{LdapConn, LdapConnSettings, Scope};
use std::time::Duration;
use url::{Host, Url};

const CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct LdapConfig {
    pub server: String,
    pub username: String,
    pub password: String,
    pub domain: String,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Accept `ldap://host[:port]`, `ldaps://host[:port]` or a bare host, which is
/// taken as `ldap://`. Paths, queries and credentials in the URL are refused.
pub fn normalize_server_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidArgument("LDAP server is required".into()));
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("ldap://{}", raw)
    };

    let invalid = || Error::InvalidArgument(format!("invalid LDAP server address {:?}", raw));
    let url = Url::parse(&with_scheme).map_err(|_| invalid())?;

    let scheme = url.scheme().to_ascii_lowercase();
    if scheme != "ldap" && scheme != "ldaps" {
        return Err(invalid());
    }
    if !matches!(url.path(), "" | "/")
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
    {
        return Err(invalid());
    }

    let host = match url.host() {
        Some(Host::Domain(name)) => {
            let valid = name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if name.is_empty() || !valid {
                return Err(invalid());
            }
            name.to_string()
        }
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => format!("[{}]", addr),
        None => return Err(invalid()),
    };

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

/// Connect and bind as `PREFIX\user`. Returns the connection and the domain's
/// `DC=` search base.
pub fn ldap_connect(config: &LdapConfig) -> Result<(LdapConn, String)> {
    let domain = DomainName::parse(&config.domain)?;
    let ldap_url = normalize_server_url(&config.server)?;

    let settings = LdapConnSettings::new()
        .set_conn_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .set_no_tls_verify(true);

    let mut ldap = LdapConn::with_settings(settings, &ldap_url)?;

    let bind_name = domain.logon_name(&config.username);
    log::debug!("binding to {} as {}", ldap_url, bind_name);
    ldap.simple_bind(&bind_name, &config.password)?.success()?;

    let search_base = domain.to_dn_components();

    let (results, _) = ldap
        .search(
            &search_base,
            Scope::Base,
            "(objectClass=*)",
            vec!["distinguishedName"],
        )?
        .success()?;

    if results.is_empty() {
        log::warn!("no results returned from the base search of {}", search_base);
    }

    log::info!("connected to {} as {}", ldap_url, bind_name);
    Ok((ldap, search_base))
}

pub fn escape_filter(input: &str) -> String {
    input
        .replace('\\', "\\5C")
        .replace('*', "\\2A")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
