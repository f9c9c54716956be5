//! # chronos-settings
//!
//! Layered configuration for the Chronos chat client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ChronosSettings::default()`]
//! 2. **User file**: `~/.chronos/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CHRONOS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, overlay, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = ChronosSettings::default();
        assert_eq!(settings.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(settings.submission.max_attachments, 20);
        assert_eq!(settings.submission.failure_policy, FailurePolicy::Remove);
        assert_eq!(settings.logging.level, "info");
        assert!(!settings.logging.json);
    }
}
