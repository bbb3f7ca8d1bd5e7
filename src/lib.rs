pub mod args;
pub mod batch;
pub mod commands;
pub mod config;
pub mod debug;
pub mod directory;
pub mod dn;
pub mod error;
pub mod help;
pub mod ldap;
pub mod uac;
