/*
 * lib.rs
 * Copyright (c) 2025 the lumac authors
 */

//! A macro preprocessor with Lua macro code.
//!
//! `lumac` expands text templates of any shape: the macro sections of a
//! template contain Lua code, their delimiters are the string-literal and
//! line-comment styles of the *embedding* file, so templates stay valid
//! input for the tooling of their own language. Supported syntax, with the
//! default `$$` marker:
//!
//! - Embedded macro: `x = '$$ insert(v) $$' + 1` — the macro's output
//!   replaces the section within the line
//! - Line-block macro: a macro that occupies whole lines, e.g.
//!   `# $$ insert_from("head.tpl")` — its output is re-based onto the
//!   indentation of the line
//! - Comment style: `# $$ …` runs to the end of the line; quote styles
//!   `'''`, `'`, `"""`, `"` close with the marker and the same delimiter
//! - Multi-section suites: `# $$ for i = 1, 3 do:` … `# $$ :end` — template
//!   text between the sections becomes the loop body; `else:`/`elseif …:`
//!   continue a suite
//! - Inclusion: `insert_from` expands another template (cached),
//!   `import_from` pulls its definitions into the caller's namespace,
//!   `insert_content` inserts a file verbatim
//!
//! # Architecture
//!
//! Expansion is a three-stage pipeline: the [`Tokenizer`] splits a template
//! into text and macro sections, the script generator turns the sections
//! into an executable Lua chunk (the *template script*), and the evaluator
//! runs that chunk, re-basing each macro's output onto the indentation
//! declared at its call site. When a template script fails, the generated
//! code is kept in a temp file the error message points at.
//!
//! # Example
//!
//! ```ignore
//! use lumac_core::Preprocessor;
//!
//! let pp = Preprocessor::new();
//! let output = pp.expand_str(
//!     "demo",
//!     "# $$ for i = 1, 3 do:\n- entry '$$ insert(i) $$'\n# $$ :end\n",
//! )?;
//! assert_eq!(output, "- entry 1\n- entry 2\n- entry 3\n");
//! ```

pub mod error;
pub mod expander;
pub mod files;
pub mod tokenizer;

mod context;
mod evaluator;
mod script;

// Re-export main types at crate root
pub use error::{ExpandError, ExpandResult};
pub use expander::Preprocessor;
pub use files::{read_file, run_process_with_file, write_file, write_to_tempfile};
pub use tokenizer::{Token, TokenKind, Tokenizer};
