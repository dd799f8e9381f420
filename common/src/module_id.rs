//! Module identifier newtype.
//!
//! Identifiers are stable, lowercase, hyphen-separated strings such as
//! `distributor-core`. They name a module across configuration, manifests,
//! and artifact file names, so they are validated once on construction.

use crate::error::{DescriptorError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A validated module identifier.
///
/// # Examples
///
/// ```
/// use distpack_common::ModuleId;
///
/// let id = ModuleId::try_from("distributor-core").expect("valid identifier");
/// assert_eq!(id.as_str(), "distributor-core");
/// assert!(ModuleId::try_from("Distributor_Core").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Return the identifier with hyphens replaced by underscores.
    ///
    /// The result is a valid package segment, used when deriving
    /// module-private relocation targets.
    ///
    /// # Examples
    ///
    /// ```
    /// use distpack_common::ModuleId;
    ///
    /// let id = ModuleId::try_from("permission-rank").expect("valid identifier");
    /// assert_eq!(id.package_token(), "permission_rank");
    /// ```
    #[must_use]
    pub fn package_token(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl TryFrom<&str> for ModuleId {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self> {
        validate_module_id(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ModuleId {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self> {
        validate_module_id(&value)?;
        Ok(Self(value))
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is lowercase alphanumeric runs joined by single
/// hyphens.
fn validate_module_id(value: &str) -> Result<()> {
    let invalid = |reason: &str| DescriptorError::InvalidIdentifier {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    if value.is_empty() {
        return Err(invalid("identifier must not be empty"));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(invalid("identifier must not start or end with '-'"));
    }
    if value.contains("--") {
        return Err(invalid("identifier must not contain consecutive hyphens"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(&format!(
            "identifier must be lowercase-hyphenated, found '{bad}'"
        )));
    }
    Ok(())
}
