//! # modcfg-cli: Host Settings Command-Line Interface
//!
//! Inspects and edits the host's built-in settings through the
//! configuration engine, reading overrides from the process environment.
//!
//! ## Subcommands
//!
//! - `schema`: print the schema served to editors
//! - `validate <file>`: validate a document without saving it
//! - `show`: print the effective settings
//! - `save <file>`: save a document as the settings
//! - `status`: storage path, environment overrides and restart state
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers take parsed values.
//! - Handlers delegate to `modcfg-engine` and only format its results.

pub mod commands;
pub mod settings;
