use crate::dn::domain::DomainName;
use crate::dn::escape::{escape_value, split_unescaped, trim_unescaped_end};
use crate::error::{Error, Result};
use std::fmt;

const USERS_CONTAINER: &str = "Users";
const BUILTIN_CONTAINER: &str = "Builtin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    User,
    Group,
}

/// One step of an OU path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A plain name, emitted as `OU=<name>`.
    OrganizationalUnit(String),
    /// A well-known container reached through its alias, emitted as `CN=<name>`.
    Container(&'static str),
    /// A caller-supplied `OU=...` or `CN=...` RDN, emitted verbatim.
    Tagged(String),
}

impl PathSegment {
    fn from_input(segment: &str) -> Self {
        let segment = trim_unescaped_end(segment.trim_start());
        if has_explicit_tag(segment) {
            return Self::Tagged(segment.to_string());
        }
        match well_known_container(segment) {
            Some(container) => Self::Container(container),
            None => Self::OrganizationalUnit(segment.trim().to_string()),
        }
    }

    pub fn to_rdn(&self) -> String {
        match self {
            Self::OrganizationalUnit(name) => format!("OU={}", escape_value(name)),
            Self::Container(name) => format!("CN={}", name),
            Self::Tagged(rdn) => rdn.clone(),
        }
    }
}

/// Slash-separated container path, stored parent first (`"Sales/IT"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OuPath {
    segments: Vec<PathSegment>,
}

impl OuPath {
    /// Split on unescaped `/`; `\/` stands for a literal slash inside a segment.
    /// Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        let segments = split_unescaped(path, '/')
            .into_iter()
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| PathSegment::from_input(&segment.replace("\\/", "/")))
            .collect();
        Self { segments }
    }

    pub fn users_container() -> Self {
        Self {
            segments: vec![PathSegment::Container(USERS_CONTAINER)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Most specific container first, as a DN lists it.
    pub fn to_dn_components(&self) -> String {
        self.segments
            .iter()
            .rev()
            .map(PathSegment::to_rdn)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    leaf_name: String,
    ou_path: OuPath,
    domain: DomainName,
}

impl DistinguishedName {
    pub fn new(leaf_name: &str, domain: &str, ou_path: Option<&str>, kind: ObjectKind) -> Result<Self> {
        if leaf_name.trim().is_empty() {
            return Err(Error::InvalidArgument("object name cannot be empty".into()));
        }
        if domain.trim().is_empty() {
            return Err(Error::InvalidArgument("domain cannot be empty".into()));
        }
        let domain = DomainName::parse(domain)?;

        let parsed = ou_path.map(OuPath::parse).unwrap_or_default();
        let ou_path = match (parsed.is_empty(), kind) {
            (false, _) => parsed,
            (true, ObjectKind::User) => OuPath::users_container(),
            (true, ObjectKind::Group) => return Err(Error::MissingContainer(leaf_name.to_string())),
        };

        Ok(Self {
            leaf_name: leaf_name.to_string(),
            ou_path,
            domain,
        })
    }

    pub fn leaf_name(&self) -> &str {
        &self.leaf_name
    }

    pub fn ou_path(&self) -> &OuPath {
        &self.ou_path
    }

    pub fn domain(&self) -> &DomainName {
        &self.domain
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CN={},{},{}",
            escape_value(&self.leaf_name),
            self.ou_path.to_dn_components(),
            self.domain.to_dn_components()
        )
    }
}

/// Build `CN=<leaf>,<containers>,<DC chain>`.
///
/// An empty path puts users in `CN=Users`; groups have no implicit container and
/// fail with [`Error::MissingContainer`].
pub fn build(leaf_name: &str, domain: &str, ou_path: &str, kind: ObjectKind) -> Result<String> {
    let dn = DistinguishedName::new(leaf_name, domain, Some(ou_path), kind)?;
    log::debug!("built DN {}", dn);
    Ok(dn.to_string())
}

pub(crate) fn has_explicit_tag(segment: &str) -> bool {
    let upper = segment.trim_start().to_ascii_uppercase();
    upper.starts_with("OU=") || upper.starts_with("CN=")
}

pub(crate) fn well_known_container(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_uppercase().as_str() {
        "USERS" => Some(USERS_CONTAINER),
        "BUILTIN" => Some(BUILTIN_CONTAINER),
        _ => None,
    }
}
