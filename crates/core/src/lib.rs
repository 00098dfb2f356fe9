//! Shared configuration for the tracknote workspace.
//!
//! Holds [`config::AppConfig`] and its load pipeline (defaults, TOML file
//! with environment interpolation, `TRACKNOTE_*` overrides, validation).
//! Domain logic lives in `tracknote-extractors` and `tracknote-slack`.

pub mod config;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
