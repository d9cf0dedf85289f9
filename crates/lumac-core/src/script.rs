/*
 * script.rs
 * Copyright (c) 2025 the lumac authors
 */

//! Template script generation.
//!
//! The generator walks the token stream of a template once and emits a Lua
//! chunk, the *template script*, whose execution produces the expanded
//! output. Text sections become `insert(...)` statements. Macro sections are
//! emitted as Lua code, re-based from their template indentation onto the
//! current script nesting level. A plain macro section is bracketed by
//! `_open_frame`/`_close_frame` calls so the evaluator can re-base its
//! output; a section whose content ends in `:` opens a multi-section suite
//! (the colon is a directive marker, not Lua), `:end` closes it with Lua's
//! `end`, and `elseif .. :`/`else:` continue it at the same level.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ExpandError, ExpandResult};
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// Columns per script nesting level.
const INDENT_STEP: usize = 4;

/// Suite continuations close the running block and immediately open the
/// next one at the same nesting level.
static CONTINUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(elseif|else)\b.*:$").expect("Invalid regex pattern"));

/// Nesting state of the generated script.
///
/// The level rises when a macro section opens a multi-section suite and
/// falls at `:end`. A dedent below zero or a non-zero level at the end of
/// generation means the suite directives do not balance.
#[derive(Debug)]
struct ScriptIndentation {
    level: usize,
    step: usize,
}

impl ScriptIndentation {
    fn new(step: usize) -> Self {
        Self { level: 0, step }
    }

    fn indent(&mut self) {
        self.level += 1;
    }

    fn dedent(&mut self, origin: &str, content: &str) -> ExpandResult<()> {
        if self.level == 0 {
            return Err(ExpandError::Nesting {
                message: format!(
                    "{origin}: suite ended without a matching start, in macro section:\n>{content}<"
                ),
            });
        }
        self.level -= 1;
        Ok(())
    }

    fn prefix(&self) -> String {
        " ".repeat(self.level * self.step)
    }

    fn is_balanced(&self) -> bool {
        self.level == 0
    }
}

/// The executable Lua chunk generated for one template.
#[derive(Debug)]
pub(crate) struct TemplateScript {
    code: String,
}

impl TemplateScript {
    /// Generate the template script for `template`.
    ///
    /// `file_name` is only used in origin labels for error messages and
    /// frame brackets. With `trace_parsing`, every token is reported through
    /// `tracing` as it is consumed; with `trace_evaluation`, a `_trace(...)`
    /// statement is generated ahead of each section's code.
    pub(crate) fn generate(
        file_name: &str,
        template: &str,
        tokenizer: &Tokenizer,
        trace_parsing: bool,
        trace_evaluation: bool,
    ) -> ExpandResult<Self> {
        let mut indentation = ScriptIndentation::new(INDENT_STEP);
        let mut script = String::new();

        for token in tokenizer.tokenize(template) {
            let origin = format!("{file_name}:{}", line_no(template, token.content_start));

            if trace_parsing {
                tracing::debug!(
                    origin = %origin,
                    kind = ?token.kind,
                    content = %token.content,
                    "template token"
                );
            }

            if trace_evaluation && token.kind != TokenKind::Error {
                let message = format!("{origin}: {:?}\n>{}<\n", token.kind, token.content);
                script.push_str(&indentation.prefix());
                script.push_str("_trace(");
                script.push_str(&lua_string_literal(&message));
                script.push_str(")\n");
            }

            match token.kind {
                TokenKind::Error => {
                    return Err(ExpandError::Lexical {
                        origin,
                        content: token.content.to_string(),
                    });
                }
                TokenKind::Text => {
                    script.push_str(&indentation.prefix());
                    script.push_str("insert(");
                    script.push_str(&lua_string_literal(token.content));
                    script.push_str(")\n");
                }
                TokenKind::EmbeddedMacro | TokenKind::LineBlockMacro => {
                    generate_macro_section(
                        &mut script,
                        &mut indentation,
                        template,
                        &token,
                        &origin,
                        token.kind == TokenKind::EmbeddedMacro,
                    )?;
                }
            }
        }

        if !indentation.is_balanced() {
            return Err(ExpandError::Nesting {
                message: format!(
                    "block nesting not balanced at end of {file_name}, is :end somewhere missing?"
                ),
            });
        }

        Ok(Self { code: script })
    }

    /// The generated Lua source.
    pub(crate) fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for TemplateScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

fn generate_macro_section(
    script: &mut String,
    indentation: &mut ScriptIndentation,
    template: &str,
    token: &Token<'_>,
    origin: &str,
    embedded: bool,
) -> ExpandResult<()> {
    let trimmed = token.content.trim_end();

    if trimmed.trim_start().starts_with(":end") {
        indentation.dedent(origin, token.content)?;
        script.push_str(&indentation.prefix());
        script.push_str("end\n");
        return Ok(());
    }

    let suite_starts = trimmed.ends_with(':');

    if !suite_starts {
        // Declared indentation: the whitened line prefix of the opening
        // delimiter. The evaluator re-bases the section's output onto it.
        let declared = whitened_line_prefix(template, token.marker_start);
        script.push_str(&indentation.prefix());
        script.push_str("_open_frame(");
        script.push_str(&lua_string_literal(&declared));
        script.push_str(", ");
        script.push_str(if embedded { "true" } else { "false" });
        script.push_str(", ");
        script.push_str(&lua_string_literal(origin));
        script.push_str(")\n");
    }

    if CONTINUATION.is_match(trimmed) {
        indentation.dedent(origin, token.content)?;
    }

    // Base indentation of the macro code: the whitened line prefix of the
    // first content character. Continuation lines must extend it.
    let base = whitened_line_prefix(template, token.content_start);

    let body = if suite_starts {
        trimmed[..trimmed.len() - 1].trim_end()
    } else {
        token.content
    };

    let mut lines = body.split('\n').enumerate();

    // The first line comes without indentation, the tokenizer stripped it.
    if let Some((_, first)) = lines.next() {
        script.push_str(&indentation.prefix());
        script.push_str(first);
        script.push('\n');
    }

    for (no, line) in lines {
        let line_indentation = split_indentation(line).0;
        if line_indentation.is_empty() && !base.is_empty() {
            // Unindented line in an indented context: taken as it is.
            script.push_str(line);
            script.push('\n');
        } else if line_indentation.starts_with(&base) {
            script.push_str(&indentation.prefix());
            script.push_str(&line[base.len()..]);
            script.push('\n');
        } else {
            return Err(ExpandError::CodeIndentation {
                origin: origin.to_string(),
                line: no,
                content: line.to_string(),
            });
        }
    }

    if suite_starts {
        indentation.indent();
    } else {
        script.push_str(&indentation.prefix());
        script.push_str("_close_frame(");
        script.push_str(&lua_string_literal(origin));
        script.push_str(")\n");
    }

    Ok(())
}

/// 1-based line number of byte position `pos` in `template`.
fn line_no(template: &str, pos: usize) -> usize {
    template[..pos].matches('\n').count() + 1
}

/// The prefix of the line containing `pos`, up to `pos`, with every
/// non-whitespace character replaced by a space.
fn whitened_line_prefix(template: &str, pos: usize) -> String {
    let line_start = template[..pos].rfind('\n').map_or(0, |i| i + 1);
    template[line_start..pos]
        .chars()
        .map(|c| if c.is_whitespace() { c } else { ' ' })
        .collect()
}

/// Split a line (without newline) into leading whitespace and the rest.
fn split_indentation(line: &str) -> (&str, &str) {
    let rest = line.trim_start();
    line.split_at(line.len() - rest.len())
}

/// Quote `s` as a Lua string literal.
fn lua_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                // Three digits so a following literal digit is not absorbed
                // into the escape.
                out.push_str(&format!("\\{:03}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
