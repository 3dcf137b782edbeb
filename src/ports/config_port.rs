//! Port for configuration access.

use crate::domain::error::PerpsimError;

/// Read access to keyed configuration values, grouped by section.
///
/// Lookups with a sensible fallback take a `default`; values the
/// simulation cannot run without go through [`require_string`] so a
/// missing key is reported precisely instead of silently defaulted.
///
/// [`require_string`]: ConfigPort::require_string
pub trait ConfigPort {
    /// Returns the string value for `key` in `section`, if present.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Returns the integer value for `key`, or `default` when absent or unparseable.
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// Returns the float value for `key`, or `default` when absent or unparseable.
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Returns the boolean value for `key`, or `default` when absent or unparseable.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Returns the string value for `key`, or [`PerpsimError::ConfigMissing`]
    /// naming the section and key.
    fn require_string(&self, section: &str, key: &str) -> Result<String, PerpsimError> {
        self.get_string(section, key)
            .ok_or_else(|| PerpsimError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}
