//! # trivia-settings
//!
//! Configuration for the trivia server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`TriviaSettings::default()`]
//! 2. **User file**: `~/.trivia/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TRIVIA_*` overrides (highest priority)
//!
//! Command-line flags, when the binary provides them, are applied on top.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
