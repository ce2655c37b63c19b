//! Versioned partition naming.
//!
//! Partition names have the shape `<prefix>:<version>:<logical>`. Neither the
//! prefix nor the version may contain the separator, so the version of any
//! stored partition can be read back without ambiguity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Logical name of the partition holding the precached resource set.
pub const SHELL_PARTITION: &str = "shell";

const SEPARATOR: char = ':';

/// Identifier of the deployed policy/resource generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let token = token.into();
        validate_segment("version", &token)?;
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionToken> for String {
    fn from(token: VersionToken) -> Self {
        token.0
    }
}

fn validate_segment(what: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        return Err(Error::InvalidPartitionName(format!("{what} must not be empty")));
    }
    if value.contains(SEPARATOR) || value.chars().any(char::is_whitespace) {
        return Err(Error::InvalidPartitionName(format!(
            "{what} {value:?} must not contain '{SEPARATOR}' or whitespace"
        )));
    }
    Ok(())
}

/// Builds and recognizes partition names for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNaming {
    prefix: String,
    version: VersionToken,
}

impl PartitionNaming {
    pub fn new(prefix: impl Into<String>, version: VersionToken) -> Result<Self, Error> {
        let prefix = prefix.into();
        validate_segment("prefix", &prefix)?;
        Ok(Self { prefix, version })
    }

    pub fn version(&self) -> &VersionToken {
        &self.version
    }

    /// Full partition name for a logical partition of this version.
    pub fn name(&self, logical: &str) -> String {
        format!("{}{SEPARATOR}{}{SEPARATOR}{logical}", self.prefix, self.version)
    }

    pub fn shell(&self) -> String {
        self.name(SHELL_PARTITION)
    }

    /// Whether `name` belongs to this naming's version.
    pub fn is_current(&self, name: &str) -> bool {
        self.logical_name(name).is_some()
    }

    /// The logical suffix of `name` if it carries this prefix and version.
    pub fn logical_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        let mut parts = name.splitn(3, SEPARATOR);
        let prefix = parts.next()?;
        let version = parts.next()?;
        let logical = parts.next()?;
        (prefix == self.prefix && version == self.version.as_str() && !logical.is_empty()).then_some(logical)
    }
}
