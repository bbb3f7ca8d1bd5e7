use crate::dn::builder::{has_explicit_tag, well_known_container};
use crate::dn::escape::{escape_value, split_unescaped, trim_unescaped_end, unescape_value};

/// What could be recovered from a DN string. Missing parts stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDn {
    pub leaf_cn: Option<String>,
    pub domain: Option<String>,
    /// Parent-first, in the notation [`crate::dn::build`] accepts.
    pub ou_path: Option<String>,
}

enum Component {
    Cn(String),
    Ou(String),
    Dc(String),
}

/// Best-effort split of a DN into leaf, domain and container path.
///
/// Only `CN`, `OU` and `DC` components are looked at; anything else, including
/// multi-valued RDNs, is skipped. Never fails.
pub fn parse(dn: &str) -> ParsedDn {
    let components: Vec<Component> = split_unescaped(dn, ',')
        .into_iter()
        .filter_map(classify)
        .collect();

    let leaf_index = components
        .iter()
        .position(|component| matches!(component, Component::Cn(_)));

    let leaf_cn = leaf_index.and_then(|i| match &components[i] {
        Component::Cn(value) => Some(value.clone()),
        _ => None,
    });

    let labels: Vec<&str> = components
        .iter()
        .filter_map(|component| match component {
            Component::Dc(value) => Some(value.as_str()),
            _ => None,
        })
        .collect();
    let domain = (!labels.is_empty()).then(|| labels.join("."));

    let mut segments: Vec<String> = components
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != leaf_index)
        .filter_map(|(_, component)| match component {
            Component::Ou(value) => Some(ou_segment(value)),
            Component::Cn(value) => Some(container_segment(value)),
            Component::Dc(_) => None,
        })
        .collect();
    segments.reverse();
    let ou_path = (!segments.is_empty()).then(|| segments.join("/"));

    ParsedDn {
        leaf_cn,
        domain,
        ou_path,
    }
}

fn classify(raw: &str) -> Option<Component> {
    let (attr, value) = raw.trim_start().split_once('=')?;
    let value = unescape_value(trim_unescaped_end(value.trim_start()));
    match attr.trim().to_ascii_uppercase().as_str() {
        "CN" => Some(Component::Cn(value)),
        "OU" => Some(Component::Ou(value)),
        "DC" => Some(Component::Dc(value)),
        _ => None,
    }
}

fn ou_segment(name: &str) -> String {
    let plain = well_known_container(name).is_none()
        && !has_explicit_tag(name)
        && escape_value(name) == name;

    if plain {
        escape_slash(name)
    } else {
        escape_slash(&format!("OU={}", escape_value(name)))
    }
}

/// `CN=Users` and `CN=Builtin` fold back to their alias; other containers keep
/// their tag.
fn container_segment(name: &str) -> String {
    match well_known_container(name) {
        Some(alias) if alias == name => alias.to_string(),
        _ => escape_slash(&format!("CN={}", escape_value(name))),
    }
}

fn escape_slash(segment: &str) -> String {
    segment.replace('/', "\\/")
}
