// src/config.rs

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/user_defaults.json";
pub const DEFAULT_OU: &str = "CN=Users";

const USER_ACCOUNT_CONTROL: &str = "userAccountControl";

/// A default attribute value as written into new user entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Binary(Vec<u8>),
}

impl AttributeValue {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Integer(n) => n.to_string().into_bytes(),
            Self::Binary(bytes) => bytes.clone(),
        }
    }

    fn from_json(name: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .ok_or_else(|| Error::Config(format!("{}: {} is not an integer", name, n))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| Error::Config(format!("{}: binary values are byte arrays", name)))
                })
                .collect::<Result<Vec<u8>>>()
                .map(Self::Binary),
            other => Err(Error::Config(format!(
                "{}: unsupported value {}",
                name, other
            ))),
        }
    }

    /// Typed value from what an operator typed: integers and JSON byte
    /// arrays keep their type, anything else is text.
    pub fn from_input(name: &str, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Number(_) | Value::Array(_) | Value::String(_))) => {
                Self::from_json(name, &value)
            }
            _ => Ok(Self::Text(raw.to_string())),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Binary(bytes) => Value::from(bytes.clone()),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_ou: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

/// Settings applied to every user this tool creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDefaults {
    pub default_ou: Option<String>,
    pub user_account_control: Option<u32>,
    /// In file order.
    pub attributes: Vec<(String, AttributeValue)>,
}

impl UserDefaults {
    /// A missing file means "no defaults", not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no defaults at {}, using built-in values", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawDefaults = serde_json::from_str(text)?;

        let mut defaults = Self {
            default_ou: raw.default_ou.filter(|ou| !ou.trim().is_empty()),
            ..Self::default()
        };

        for (name, value) in &raw.attributes {
            if name.eq_ignore_ascii_case(USER_ACCOUNT_CONTROL) {
                defaults.user_account_control = Some(control_value(value)?);
                continue;
            }
            defaults
                .attributes
                .push((name.clone(), AttributeValue::from_json(name, value)?));
        }

        Ok(defaults)
    }

    pub fn default_ou(&self) -> &str {
        self.default_ou.as_deref().unwrap_or(DEFAULT_OU)
    }

    /// Blank input clears the OU so the built-in container is used again.
    pub fn set_default_ou(&mut self, ou: &str) {
        let ou = ou.trim();
        self.default_ou = (!ou.is_empty()).then(|| ou.to_string());
    }

    /// Add an attribute or overwrite one with the same name (ignoring case),
    /// keeping its position. `userAccountControl` goes to its own field.
    pub fn set_attribute(&mut self, name: &str, raw: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config("attribute name is empty".into()));
        }
        if name.eq_ignore_ascii_case(USER_ACCOUNT_CONTROL) {
            self.user_account_control = Some(control_value(&Value::String(raw.trim().to_string()))?);
            return Ok(());
        }

        let value = AttributeValue::from_input(name, raw)?;
        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// `true` when something was removed.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.eq_ignore_ascii_case(USER_ACCOUNT_CONTROL) {
            return self.user_account_control.take().is_some();
        }
        let before = self.attributes.len();
        self.attributes
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.attributes.len() != before
    }

    pub fn to_json_string(&self) -> Result<String> {
        let mut attributes = Map::new();
        if let Some(uac) = self.user_account_control {
            attributes.insert(USER_ACCOUNT_CONTROL.to_string(), Value::from(uac));
        }
        for (name, value) in &self.attributes {
            attributes.insert(name.clone(), value.to_json());
        }

        let raw = RawDefaults {
            default_ou: self.default_ou.clone(),
            attributes,
        };
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_string()?)?;
        log::info!("saved user defaults to {}", path.display());
        Ok(())
    }
}

fn control_value(value: &Value) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::Config(format!("userAccountControl {} does not fit 32 bits", value)))
}
