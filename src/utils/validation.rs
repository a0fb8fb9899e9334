use crate::utils::error::{NatPmpError, Result};
use std::path::{Path, MAIN_SEPARATOR};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl Into<String>, reason: impl Into<String>) -> NatPmpError {
    NatPmpError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

/// The path must name a file the daemon can create or replace, never a
/// directory.
pub fn validate_file_path(field_name: &str, path: &Path) -> Result<()> {
    let value = path.to_string_lossy();

    let reason = if value.is_empty() {
        "Path cannot be empty"
    } else if value.contains('\0') {
        "Path contains null bytes"
    } else if value.ends_with(MAIN_SEPARATOR) || value.ends_with('/') {
        "Path must name a file, not a directory"
    } else if path.file_name().is_none() {
        "Path must end in a file name"
    } else {
        return Ok(());
    };

    Err(invalid(field_name, value, reason))
}

/// Interval or lifetime in whole seconds, at least `min_seconds`.
pub fn validate_seconds(field_name: &str, value: u64, min_seconds: u64) -> Result<()> {
    if value < min_seconds {
        return Err(invalid(
            field_name,
            value.to_string(),
            format!("Must be at least {}s", min_seconds),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}
