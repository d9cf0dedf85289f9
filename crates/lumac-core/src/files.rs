/*
 * files.rs
 * Copyright (c) 2025 the lumac authors
 */

//! File helpers used by the expansion engine and by callers that feed
//! expanded output to other tools.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ExpandError, ExpandResult};

/// Read a text file, translating `\r\n` and bare `\r` line endings to `\n`.
///
/// Templates are processed with Unix line endings only; all file input goes
/// through this translation. Content must be UTF-8.
pub fn read_file(path: impl AsRef<Path>) -> ExpandResult<String> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(normalize_newlines(&text))
}

/// Write `content` to `path`, replacing an existing file.
pub fn write_file(path: impl AsRef<Path>, content: &str) -> ExpandResult<()> {
    fs::write(path.as_ref(), content)?;
    Ok(())
}

/// Write `content` to a fresh temporary file and return its path.
///
/// The file is not deleted automatically; the caller owns it. Useful for
/// handing expanded output to an external tool without touching the source
/// tree.
pub fn write_to_tempfile(content: &str) -> ExpandResult<PathBuf> {
    let mut file = tempfile::Builder::new().prefix("lumac_").tempfile()?;
    file.write_all(content.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| ExpandError::Io(e.error))?;
    Ok(path)
}

/// Run `command` with `path` appended as its final argument, for example a
/// formatter over an expanded file. Returns the captured stdout; a non-zero
/// exit status is an error carrying the captured stderr.
pub fn run_process_with_file(command: &[&str], path: impl AsRef<Path>) -> ExpandResult<String> {
    let (program, args) = command.split_first().ok_or_else(|| {
        ExpandError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty command line",
        ))
    })?;
    let output = Command::new(program)
        .args(args)
        .arg(path.as_ref())
        .output()?;
    if !output.status.success() {
        return Err(ExpandError::Process {
            command: (*program).to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub(crate) fn normalize_newlines(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}
