pub mod builder;
pub mod domain;
pub mod escape;
pub mod parser;

pub use builder::{build, DistinguishedName, ObjectKind, OuPath, PathSegment};
pub use domain::DomainName;
pub use escape::{escape_value, unescape_value};
pub use parser::{parse, ParsedDn};
