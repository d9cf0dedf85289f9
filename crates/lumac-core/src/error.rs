/*
 * error.rs
 * Copyright (c) 2025 the lumac authors
 */

//! Error types for template tokenization, script generation, and evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while expanding a template.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// A macro section was opened but its closing sequence never appeared.
    #[error("{origin}: syntax error in macro section, macro started but not ended:\n>{content}<")]
    Lexical { origin: String, content: String },

    /// A continuation line of macro code does not extend the base
    /// indentation established by the first line of the section.
    #[error(
        "{origin}: syntax error: indentation of line {line} of the macro code \
         is not an extension of the base indentation:\n>{content}<"
    )]
    CodeIndentation {
        origin: String,
        line: usize,
        content: String,
    },

    /// A line of buffered macro output cannot be re-based onto the
    /// indentation declared at the macro call site.
    #[error(
        "{origin}: output syntax error: indentation of the following line of the \
         expansion result is not an extension of the base indentation of the \
         result:\n>{content}<\n(start of line shown enclosed by characters '>' and '<')"
    )]
    OutputIndentation { origin: String, content: String },

    /// Suite directives do not balance.
    #[error("Nesting error in compound statements: {message}")]
    Nesting { message: String },

    /// The generated template script failed to execute. The script is kept
    /// on disk under the reported path for inspection.
    #[error("Error occurred when executing template script.\n File {script:?}")]
    Execution {
        script: PathBuf,
        #[source]
        source: mlua::Error,
    },

    /// A tokenizer syntax fragment is not a valid regular expression.
    #[error("Invalid tokenizer pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An external process run on expanded output failed.
    #[error("Process '{command}' exited with {status}:\n{stderr}")]
    Process {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// Failure of the embedded Lua interpreter outside of script execution.
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invariant of the expansion engine was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for template expansion operations.
pub type ExpandResult<T> = Result<T, ExpandError>;
