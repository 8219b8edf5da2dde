//! # Subcommand Handlers
//!
//! Each handler writes its report to `out` and returns the process exit
//! code: 0 on success, 1 when a document failed validation. Operational
//! failures propagate as errors.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use modcfg_engine::EngineError;
use modcfg_schema::ErrorMap;

use crate::settings::Host;

/// Print the schema served to editors.
pub fn run_schema(host: &Host, out: &mut impl Write) -> Result<u8> {
    let schema = host.service.get_schema(host.info.id)?;
    writeln!(out, "{schema}")?;
    Ok(0)
}

/// Validate a document against the host settings without saving it.
pub fn run_validate(host: &Host, file: &Path, out: &mut impl Write) -> Result<u8> {
    let text = read(file)?;
    let errors = host.service.validate_text(host.info.id, &text)?;
    if errors.is_empty() {
        writeln!(out, "OK: {}", file.display())?;
        return Ok(0);
    }
    writeln!(out, "FAIL: {}", file.display())?;
    report(&errors, out)?;
    Ok(1)
}

/// Print the effective settings, with environment overrides applied.
pub fn run_show(host: &Host, out: &mut impl Write) -> Result<u8> {
    match host.service.load_value(host.info.id) {
        Ok(value) => {
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            Ok(0)
        }
        Err(err) => rejected(err, out),
    }
}

/// Save a document as the host settings.
pub fn run_save(host: &Host, file: &Path, out: &mut impl Write) -> Result<u8> {
    let text = read(file)?;
    // Load first so environment overrides are known to the save.
    if let Err(err) = host.service.load_value(host.info.id) {
        return rejected(err, out);
    }
    match host.service.save_text(host.info.id, &text) {
        Ok(true) => {
            writeln!(out, "Saved {}", host.info.name)?;
            if host.service.restart_required() {
                writeln!(out, "A restart is required for some changes to take effect.")?;
            }
            Ok(0)
        }
        Ok(false) => {
            writeln!(out, "{} is unchanged", host.info.name)?;
            Ok(0)
        }
        Err(err) => rejected(err, out),
    }
}

/// Print storage location, environment overrides and pending restarts.
pub fn run_status(host: &Host, out: &mut impl Write) -> Result<u8> {
    let loaded = host.service.load_value(host.info.id);
    let info = &host.info;
    writeln!(out, "Configuration: {} ({})", info.name, info.id)?;
    match &info.path {
        Some(path) => writeln!(out, "Stored at: {}", path.display())?,
        None => writeln!(out, "Stored in memory")?,
    }
    if let Err(err) = loaded {
        return rejected(err, out);
    }

    let overrides = host.service.loaded_environment_variables();
    match overrides.get(&info.id) {
        Some(paths) if !paths.is_empty() => {
            writeln!(out, "Environment overrides:")?;
            for path in paths {
                writeln!(out, "  {path}")?;
            }
        }
        _ => writeln!(out, "Environment overrides: none")?,
    }
    writeln!(
        out,
        "Restart required: {}",
        if host.service.restart_required() { "yes" } else { "no" }
    )?;
    Ok(0)
}

fn read(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

/// Report a validation failure, or propagate any other error.
fn rejected(err: EngineError, out: &mut impl Write) -> Result<u8> {
    let Some(errors) = err.validation_errors() else {
        return Err(err.into());
    };
    writeln!(out, "{err}")?;
    report(errors, out)?;
    Ok(1)
}

fn report(errors: &ErrorMap, out: &mut impl Write) -> Result<()> {
    for (path, messages) in errors {
        let path = if path.is_empty() { "(root)" } else { path.as_str() };
        writeln!(out, "  {path}: {}", messages.join(", "))?;
    }
    Ok(())
}
