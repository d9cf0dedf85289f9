/*
 * evaluator.rs
 * Copyright (c) 2025 the lumac authors
 */

//! Template script evaluation.
//!
//! A template script runs as a Lua chunk inside an environment table that
//! exposes the callable surface of the engine: `insert`, `insert_content`,
//! `insert_from`, `import_from`, the frame brackets `_open_frame` and
//! `_close_frame`, `_trace`, and a `stderr` handle. Fresh runs get a new
//! environment whose metatable falls through to the Lua globals; runs with
//! an explicit namespace get the callables injected into the given table
//! and removed again afterwards.
//!
//! Before execution, a numbered temporary file is reserved and installed as
//! the chunk name. If the script fails, the generated code is written there
//! and kept so the location cited by the error can actually be inspected;
//! on success the file is deleted.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use mlua::{Lua, MultiValue, Table, Value};

use crate::context::ExpansionContext;
use crate::error::{ExpandError, ExpandResult};
use crate::files;
use crate::script::TemplateScript;
use crate::tokenizer::Tokenizer;

/// Buffered output of one macro section, opened by `_open_frame` and
/// consumed by `_close_frame`.
#[derive(Debug)]
struct MacroFrame {
    /// Whitened template indentation of the macro's opening delimiter.
    indentation: String,
    embedded: bool,
    origin: String,
    output: Vec<String>,
}

/// Frame stack and root output buffer of one evaluator invocation.
#[derive(Debug, Default)]
struct EvalState {
    frames: Vec<MacroFrame>,
    output: Vec<String>,
}

impl EvalState {
    fn push_fragment(&mut self, fragment: String) {
        match self.frames.last_mut() {
            Some(frame) => frame.output.push(fragment),
            None => self.output.push(fragment),
        }
    }

    fn open_frame(&mut self, indentation: String, embedded: bool, origin: String) {
        self.frames.push(MacroFrame {
            indentation,
            embedded,
            origin,
            output: Vec::new(),
        });
    }

    /// Pop the innermost frame and re-base its buffered output onto the
    /// indentation declared at the macro call site.
    ///
    /// The first output line establishes the base indentation. It is
    /// emitted bare for an embedded macro and with the declared
    /// indentation otherwise. Every further line keeps its text when it is
    /// unindented in an indented context, or swaps the base indentation
    /// for the declared one when it extends the base; anything else is an
    /// output indentation error.
    fn close_frame(&mut self, origin: &str) -> ExpandResult<()> {
        let frame = self.frames.pop().ok_or_else(|| {
            ExpandError::Internal(format!(
                "{origin}: frame closed without a matching open in the template script"
            ))
        })?;

        let text = frame.output.concat();
        let mut lines = text.split_inclusive('\n');
        let Some(first) = lines.next() else {
            return Ok(());
        };

        let (base, first_content) = split_line_indentation(first);
        let mut rebased = String::new();
        if !frame.embedded {
            rebased.push_str(&frame.indentation);
        }
        rebased.push_str(first_content);

        for line in lines {
            let line_indentation = split_line_indentation(line).0;
            if line_indentation.is_empty() && !base.is_empty() {
                rebased.push_str(line);
            } else if line_indentation.starts_with(base) {
                rebased.push_str(&frame.indentation);
                rebased.push_str(&line[base.len()..]);
            } else {
                return Err(ExpandError::OutputIndentation {
                    origin: frame.origin.clone(),
                    content: line.trim_end().to_string(),
                });
            }
        }

        self.push_fragment(rebased);
        Ok(())
    }

    fn finish(&self) -> ExpandResult<String> {
        if !self.frames.is_empty() {
            return Err(ExpandError::Internal(
                "macro frame still open after the template script finished".to_string(),
            ));
        }
        Ok(self.output.concat())
    }
}

/// Leading whitespace and remainder of one buffered line. A trailing
/// newline belongs to the remainder, never to the indentation.
fn split_line_indentation(line: &str) -> (&str, &str) {
    let body = line.strip_suffix('\n').unwrap_or(line);
    let rest = body.trim_start();
    line.split_at(body.len() - rest.len())
}

/// Execute `script` and return the expansion output.
///
/// With `globals: None` the chunk runs in a fresh environment table whose
/// lookups fall through to the Lua globals. With an explicit table, the
/// callables are injected into it for the duration of the run and the
/// previous values restored afterwards; no fallback metatable is attached,
/// macro code that needs the standard library under an explicit namespace
/// can attach one itself.
pub(crate) fn evaluate_template_script(
    lua: &Lua,
    script: &TemplateScript,
    tokenizer: &Tokenizer,
    context: &Rc<RefCell<ExpansionContext>>,
    globals: Option<Table>,
) -> ExpandResult<String> {
    let state = Rc::new(RefCell::new(EvalState::default()));

    let env = match &globals {
        Some(table) => table.clone(),
        None => lua
            .load("return setmetatable({}, { __index = _G })")
            .eval::<Table>()?,
    };

    let entries = callables(lua, tokenizer, context, &state, &env)?;

    let backup = match &globals {
        Some(table) => {
            let mut saved = Vec::with_capacity(entries.len());
            for (name, _) in &entries {
                saved.push((*name, table.raw_get::<Value>(*name)?));
            }
            Some(saved)
        }
        None => None,
    };
    for (name, value) in entries {
        env.raw_set(name, value)?;
    }

    // Reserve the script file up front: its path doubles as the chunk
    // name, so a runtime error cites the file that is kept on failure.
    let number = context.borrow_mut().next_script_number();
    let mut file = tempfile::Builder::new()
        .prefix(&format!("template_script_{number}_"))
        .suffix(".lua")
        .tempfile()?;
    let chunk_name = format!("@{}", file.path().display());

    let executed = lua
        .load(script.code())
        .set_name(chunk_name)
        .set_environment(env.clone())
        .exec();

    if let Some(saved) = backup {
        for (name, value) in saved {
            env.raw_set(name, value)?;
        }
    }

    match executed {
        Ok(()) => {
            let result = state.borrow().finish()?;
            tracing::debug!(bytes = result.len(), "template script finished");
            Ok(result)
        }
        Err(source) => {
            let script = persist_failed_script(file, script.code());
            Err(ExpandError::Execution { script, source })
        }
    }
}

/// Write a failed template script to its reserved file and keep the file.
///
/// Persisting is best effort: a failure here is logged, never returned, so
/// the execution error that brought us here stays the reported one.
fn persist_failed_script(mut file: tempfile::NamedTempFile, code: &str) -> std::path::PathBuf {
    if let Err(error) = file.write_all(code.as_bytes()) {
        tracing::warn!(%error, "could not write failed template script");
    }
    let path = file.path().to_path_buf();
    if let Err(error) = file.keep() {
        tracing::warn!(error = %error.error, "could not keep failed template script");
    }
    path
}

/// Build the callable surface for one evaluator invocation.
fn callables(
    lua: &Lua,
    tokenizer: &Tokenizer,
    context: &Rc<RefCell<ExpansionContext>>,
    state: &Rc<RefCell<EvalState>>,
    env: &Table,
) -> ExpandResult<Vec<(&'static str, Value)>> {
    let mut entries: Vec<(&'static str, Value)> = Vec::new();

    // insert(...) concatenates the string form of its arguments and
    // appends them to the innermost frame, or to the root output.
    let st = Rc::clone(state);
    let insert = lua.create_function(move |_, args: MultiValue| {
        let mut fragment = String::new();
        for value in args {
            fragment.push_str(&value.to_string()?);
        }
        if fragment.is_empty() {
            return Ok(());
        }
        st.borrow_mut().push_fragment(fragment);
        Ok(())
    })?;
    entries.push(("insert", Value::Function(insert)));

    // insert_content(path) appends a file verbatim, without expansion.
    let st = Rc::clone(state);
    let insert_content = lua.create_function(move |_, path: String| {
        let content = files::read_file(&path).map_err(mlua::Error::external)?;
        if content.is_empty() {
            return Ok(());
        }
        st.borrow_mut().push_fragment(content);
        Ok(())
    })?;
    entries.push(("insert_content", Value::Function(insert_content)));

    // insert_from(path [, globals [, trace_parsing [, trace_evaluation]]])
    // expands another template and appends its output. Without an explicit
    // namespace the result is cached per expansion context; with one it is
    // re-evaluated every time, since equal namespace content cannot be
    // recognized.
    let st = Rc::clone(state);
    let tok = tokenizer.clone();
    let ctx = Rc::clone(context);
    let insert_from = lua.create_function(
        move |lua,
              (path, globals, trace_parsing, trace_evaluation): (
            String,
            Option<Table>,
            Option<bool>,
            Option<bool>,
        )| {
            let template = files::read_file(&path).map_err(mlua::Error::external)?;
            let nested = TemplateScript::generate(
                &path,
                &template,
                &tok,
                trace_parsing.unwrap_or(false),
                trace_evaluation.unwrap_or(false),
            )
            .map_err(mlua::Error::external)?;

            let result = match globals {
                Some(table) => evaluate_template_script(lua, &nested, &tok, &ctx, Some(table))
                    .map_err(mlua::Error::external)?,
                None => {
                    let cached = ctx.borrow().inserted(&path).map(str::to_string);
                    match cached {
                        Some(result) => result,
                        None => {
                            let result = evaluate_template_script(lua, &nested, &tok, &ctx, None)
                                .map_err(mlua::Error::external)?;
                            ctx.borrow_mut().record_inserted(&path, result.clone());
                            result
                        }
                    }
                }
            };
            if result.is_empty() {
                return Ok(());
            }
            st.borrow_mut().push_fragment(result);
            Ok(())
        },
    )?;
    entries.push(("insert_from", Value::Function(insert_from)));

    // import_from(path [, trace_parsing [, trace_evaluation]]) expands
    // another template inside the caller's namespace for its definitions,
    // discarding the output. Each path is imported at most once per
    // expansion context.
    let tok = tokenizer.clone();
    let ctx = Rc::clone(context);
    let import_env = env.clone();
    let import_from = lua.create_function(
        move |lua,
              (path, trace_parsing, trace_evaluation): (String, Option<bool>, Option<bool>)| {
            if ctx.borrow().is_imported(&path) {
                return Ok(());
            }
            let template = files::read_file(&path).map_err(mlua::Error::external)?;
            let nested = TemplateScript::generate(
                &path,
                &template,
                &tok,
                trace_parsing.unwrap_or(false),
                trace_evaluation.unwrap_or(false),
            )
            .map_err(mlua::Error::external)?;
            evaluate_template_script(lua, &nested, &tok, &ctx, Some(import_env.clone()))
                .map_err(mlua::Error::external)?;
            ctx.borrow_mut().record_imported(&path);
            Ok(())
        },
    )?;
    entries.push(("import_from", Value::Function(import_from)));

    let st = Rc::clone(state);
    let open_frame = lua.create_function(
        move |_, (indentation, embedded, origin): (String, bool, String)| {
            st.borrow_mut().open_frame(indentation, embedded, origin);
            Ok(())
        },
    )?;
    entries.push(("_open_frame", Value::Function(open_frame)));

    let st = Rc::clone(state);
    let close_frame = lua.create_function(move |_, origin: String| {
        st.borrow_mut()
            .close_frame(&origin)
            .map_err(mlua::Error::external)
    })?;
    entries.push(("_close_frame", Value::Function(close_frame)));

    let trace = lua.create_function(|_, message: String| {
        tracing::debug!("{}", message);
        Ok(())
    })?;
    entries.push(("_trace", Value::Function(trace)));

    // Error-stream handle with the shape of a Lua file: stderr:write(...).
    let stderr = lua.create_table()?;
    let stderr_write = lua.create_function(|_, (this, parts): (Table, MultiValue)| {
        let mut text = String::new();
        for value in parts {
            text.push_str(&value.to_string()?);
        }
        eprint!("{text}");
        Ok(this)
    })?;
    stderr.raw_set("write", stderr_write)?;
    entries.push(("stderr", Value::Table(stderr)));

    Ok(entries)
}
