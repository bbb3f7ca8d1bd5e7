// src/args.rs
use crate::commands::actions::BatchAction;
use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::{Error, Result};
use crate::ldap::LdapConfig;
use clap::{ArgAction, Args, Parser, Subcommand};
use rustyline::DefaultEditor;
use std::path::PathBuf;

const CONNECT_HISTORY: &str = ".adman_connect_history.txt";

#[derive(Debug, Parser)]
#[command(name = "adman", version, about = "Active Directory account administration over LDAP")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// User defaults file
    #[arg(long, env = "ADMAN_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// ldap://host[:port], ldaps://host[:port] or a bare host
    #[arg(short = 's', long, env = "ADMAN_SERVER", global = true)]
    pub server: Option<String>,

    #[arg(short = 'u', long, env = "ADMAN_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(short = 'p', long, env = "ADMAN_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// DNS domain, e.g. corp.example.com
    #[arg(short = 'd', long, env = "ADMAN_DOMAIN", global = true)]
    pub domain: Option<String>,
}

impl ConnectionArgs {
    pub fn into_config(self) -> Result<LdapConfig> {
        fn required(value: Option<String>, what: &str) -> Result<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::InvalidArgument(format!("{} is required", what)))
        }

        Ok(LdapConfig {
            server: required(self.server, "server")?,
            username: required(self.username, "username")?,
            password: required(self.password, "password")?,
            domain: required(self.domain, "domain")?,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build or parse distinguished names
    #[command(subcommand)]
    Dn(DnCommand),
    /// Decode or encode userAccountControl values
    #[command(subcommand)]
    Uac(UacCommand),
    /// Apply one action to every row of a CSV or spreadsheet file
    Batch {
        #[arg(value_enum)]
        action: BatchAction,
        file: PathBuf,
    },
    /// Menu driven session
    Interactive,
}

#[derive(Debug, Subcommand)]
pub enum DnCommand {
    Build {
        /// Common name of the object
        leaf: String,
        domain: String,
        /// Parent first, e.g. Sales/IT
        #[arg(long, default_value = "")]
        ou: String,
        /// Build a group DN, which needs an explicit container
        #[arg(long)]
        group: bool,
    },
    Parse {
        dn: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum UacCommand {
    Decode {
        #[arg(value_parser = parse_control_arg, allow_hyphen_values = true)]
        value: u32,
    },
    Encode {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Decimal, `0x` hex, or the signed form some tools print.
pub fn parse_control_arg(raw: &str) -> std::result::Result<u32, String> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw
            .parse::<u32>()
            .ok()
            .or_else(|| raw.parse::<i32>().ok().map(|v| v as u32)),
    };
    parsed.ok_or_else(|| format!("invalid userAccountControl value {:?}", raw))
}

#[derive(Debug, Parser)]
#[command(name = "connect", disable_help_flag = true, disable_version_flag = true)]
struct ConnectLine {
    #[command(flatten)]
    connection: ConnectionArgs,
}

/// Split a line into words, honouring single and double quotes.
pub fn split_args(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Parse a connect line such as `-s dc01 -u admin -p 'P@ss' -d corp.local`.
/// Flags left out fall back to the `ADMAN_*` environment variables.
pub fn parse_connect_line(line: &str) -> Result<LdapConfig> {
    let words = std::iter::once("connect".to_string()).chain(split_args(line));
    let parsed = ConnectLine::try_parse_from(words)
        .map_err(|e| Error::InvalidArgument(e.to_string().trim().to_string()))?;
    parsed.connection.into_config()
}

pub fn get_connect_arguments() -> Option<LdapConfig> {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("[!] Failed to initialize input editor: {}", e);
            return None;
        }
    };
    rl.load_history(CONNECT_HISTORY).ok();

    println!("Enter Connect arguments (e.g., -s ldaps://dc01.corp.local -u administrator -p 'Password123!' -d corp.local):");

    let line = rl.readline("> ").ok()?;
    rl.add_history_entry(line.as_str()).ok();
    rl.save_history(CONNECT_HISTORY).ok();

    match parse_connect_line(&line) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("[!] {}", e);
            None
        }
    }
}
