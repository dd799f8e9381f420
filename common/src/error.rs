//! Error types for module descriptors and manifest synthesis.
//!
//! Each variant names the offending module or value so a failed build can be
//! traced back to the configuration entry that caused it.

use thiserror::Error;

/// Errors arising from invalid module descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A module identifier is empty or not lowercase-hyphenated.
    #[error("invalid module identifier \"{value}\": {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A module declares a dependency on itself.
    #[error("module {module} declares a dependency on itself")]
    SelfDependency {
        /// The offending module.
        module: String,
    },

    /// A module declares the same dependency twice.
    #[error("module {module} declares dependency {dependency} more than once")]
    DuplicateDependency {
        /// The offending module.
        module: String,
        /// The repeated dependency.
        dependency: String,
    },

    /// Manifest synthesis was attempted on an incomplete descriptor.
    #[error("cannot build manifest for {module}: {field} is not set")]
    MissingField {
        /// The module whose descriptor is incomplete.
        module: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The manifest bytes could not be parsed or produced.
    #[error("malformed manifest: {reason}")]
    MalformedManifest {
        /// Description of the parse failure.
        reason: String,
    },
}

/// Result type alias using [`DescriptorError`].
pub type Result<T> = std::result::Result<T, DescriptorError>;
