/*
 * expander.rs
 * Copyright (c) 2025 the lumac authors
 */

//! The expansion pipeline behind one facade.
//!
//! A [`Preprocessor`] ties the tokenizer, the script generator, and the
//! evaluator together. Each expansion request gets a fresh Lua state and a
//! fresh expansion context; recursive inclusions triggered by the template
//! share both.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::Lua;

use crate::context::ExpansionContext;
use crate::error::ExpandResult;
use crate::evaluator::evaluate_template_script;
use crate::files;
use crate::script::TemplateScript;
use crate::tokenizer::Tokenizer;

/// Expands templates.
///
/// ```no_run
/// use lumac_core::Preprocessor;
///
/// let pp = Preprocessor::new();
/// let output = pp.expand_file("page.tpl")?;
/// # Ok::<(), lumac_core::ExpandError>(())
/// ```
#[derive(Debug, Default)]
pub struct Preprocessor {
    tokenizer: Tokenizer,
    trace_parsing: bool,
    trace_evaluation: bool,
}

impl Preprocessor {
    /// A preprocessor for the default macro syntax, with tracing off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tokenizer, e.g. one built with
    /// [`Tokenizer::with_syntax`](crate::Tokenizer::with_syntax).
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Report every token through the `tracing` machinery while parsing.
    pub fn with_trace_parsing(mut self, trace: bool) -> Self {
        self.trace_parsing = trace;
        self
    }

    /// Generate trace statements into the template script, so each section
    /// is reported as it executes.
    pub fn with_trace_evaluation(mut self, trace: bool) -> Self {
        self.trace_evaluation = trace;
        self
    }

    /// Expand the template in file `path` and return the result.
    pub fn expand_file(&self, path: impl AsRef<Path>) -> ExpandResult<String> {
        let path = path.as_ref();
        tracing::debug!(template = %path.display(), "expanding template file");
        let template = files::read_file(path)?;
        self.expand_template(&path.display().to_string(), &template)
    }

    /// Expand an in-memory template. `name` is used in origin labels of
    /// error messages and traces.
    pub fn expand_str(&self, name: &str, template: &str) -> ExpandResult<String> {
        let template = files::normalize_newlines(template);
        self.expand_template(name, &template)
    }

    /// Expand the template in file `input` and write the result to `output`.
    pub fn expand_file_to_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> ExpandResult<()> {
        let result = self.expand_file(input)?;
        files::write_file(output, &result)
    }

    /// Generate the template script for the template in file `path` without
    /// executing it. Useful for debugging templates.
    pub fn template_script(&self, path: impl AsRef<Path>) -> ExpandResult<String> {
        let path = path.as_ref();
        let template = files::read_file(path)?;
        let script = TemplateScript::generate(
            &path.display().to_string(),
            &template,
            &self.tokenizer,
            self.trace_parsing,
            self.trace_evaluation,
        )?;
        Ok(script.code().to_string())
    }

    fn expand_template(&self, name: &str, template: &str) -> ExpandResult<String> {
        let script = TemplateScript::generate(
            name,
            template,
            &self.tokenizer,
            self.trace_parsing,
            self.trace_evaluation,
        )?;
        let lua = Lua::new();
        let context = Rc::new(RefCell::new(ExpansionContext::new()));
        evaluate_template_script(&lua, &script, &self.tokenizer, &context, None)
    }
}
