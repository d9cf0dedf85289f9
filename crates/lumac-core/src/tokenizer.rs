/*
 * tokenizer.rs
 * Copyright (c) 2025 the lumac authors
 */

//! Template tokenization.
//!
//! A template is split into *text* sections and *macro* sections by a single
//! composite regular expression. Macro sections are delimited by a macro
//! marker (default `$$`) wrapped in either a string-literal style of the
//! embedding file (default `'''`, `'`, `"""`, `"`, closed by the marker and
//! the *same* delimiter) or a line-comment opener (default `#`, closed by the
//! end of the line). A macro section that occupies a whole line, with nothing
//! but whitespace around it, is a *line-block* macro; any other occurrence is
//! an *embedded* macro.
//!
//! The `regex` crate has no backreferences, so the same-delimiter-closes rule
//! is encoded by expanding every string-literal delimiter into its own
//! alternation branch. Branches are tried in order: line-block first, then
//! embedded, then a catch-all error branch that matches an opener whose
//! closing sequence never appears. Text sections are the gaps between
//! matches, so concatenating all sections in order reproduces the template
//! exactly.

use regex::{Captures, Regex};

use crate::error::ExpandResult;

/// Default macro marker fragment.
pub const DEFAULT_MACRO_MARKER: &str = r"\$\$";

/// Default string-literal delimiter fragments, in match preference order.
/// Longer delimiters come first so that `'''` is not consumed as `'`.
pub const DEFAULT_STRING_LITERALS: &[&str] = &["'''", "'", "\"\"\"", "\""];

/// Default line-comment opener fragment.
pub const DEFAULT_COMMENT_START: &str = "#[ \t]*";

/// Kind of a template section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal template text, passed through to the output.
    Text,
    /// A macro section embedded in a line that also carries other content.
    EmbeddedMacro,
    /// A macro section that occupies one or more whole lines.
    LineBlockMacro,
    /// A macro opener whose closing sequence never appears.
    Error,
}

/// One section of a template.
///
/// Positions are byte offsets into the tokenized template. For text and
/// error tokens all three positions coincide with the section start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'t> {
    pub kind: TokenKind,
    /// Text content, or macro code with the delimiters and the whitespace
    /// around the markers stripped.
    pub content: &'t str,
    /// Start of the section. For a line-block macro this includes the
    /// leading whitespace of the line.
    pub section_start: usize,
    /// Start of the opening delimiter (string literal or comment opener).
    pub marker_start: usize,
    /// Start of the content.
    pub content_start: usize,
}

#[derive(Debug, Clone)]
struct Branch {
    kind: TokenKind,
    opener_group: String,
    content_group: String,
}

/// Splits templates into text and macro sections.
///
/// The tokenizer is configured with regex *fragments*: one for the macro
/// marker, one per string-literal delimiter, and one for the line-comment
/// opener. [`Tokenizer::new`] uses the defaults; [`Tokenizer::with_syntax`]
/// accepts custom fragments.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
    branches: Vec<Branch>,
}

impl Tokenizer {
    /// A tokenizer for the default macro syntax.
    pub fn new() -> Self {
        Self::with_syntax(
            DEFAULT_MACRO_MARKER,
            DEFAULT_STRING_LITERALS,
            DEFAULT_COMMENT_START,
        )
        .expect("Invalid regex pattern")
    }

    /// A tokenizer for a custom macro syntax.
    ///
    /// All parameters are regex fragments, not literal strings: a `$$`
    /// marker is written `r"\$\$"`. `string_literals` are tried in the given
    /// order, so longer delimiters that share a prefix with shorter ones
    /// must come first.
    pub fn with_syntax(
        macro_marker: &str,
        string_literals: &[&str],
        comment_start: &str,
    ) -> ExpandResult<Self> {
        let mut branches = Vec::new();
        let mut alternatives = Vec::new();

        // Line-block branches: the macro is the only content of its line(s).
        for (i, quote) in string_literals.iter().enumerate() {
            alternatives.push(format!(
                r"(?:^[ \t]*(?P<lbq{i}_o>{quote}){macro_marker}\s*(?P<lbq{i}_c>(?s:.+?))\s*{macro_marker}{quote}[ \t]*$\n?)"
            ));
            branches.push(Branch {
                kind: TokenKind::LineBlockMacro,
                opener_group: format!("lbq{i}_o"),
                content_group: format!("lbq{i}_c"),
            });
        }
        alternatives.push(format!(
            r"(?:^[ \t]*(?P<lbc_o>{comment_start}){macro_marker}\s*(?P<lbc_c>(?s:.+?))$\n?)"
        ));
        branches.push(Branch {
            kind: TokenKind::LineBlockMacro,
            opener_group: "lbc_o".to_string(),
            content_group: "lbc_c".to_string(),
        });

        // Embedded branches: the macro shares its line with other content.
        for (i, quote) in string_literals.iter().enumerate() {
            alternatives.push(format!(
                r"(?:(?P<emq{i}_o>{quote}){macro_marker}\s*(?P<emq{i}_c>(?s:.+?))\s*{macro_marker}{quote})"
            ));
            branches.push(Branch {
                kind: TokenKind::EmbeddedMacro,
                opener_group: format!("emq{i}_o"),
                content_group: format!("emq{i}_c"),
            });
        }
        alternatives.push(format!(
            r"(?:(?P<emc_o>{comment_start}){macro_marker}\s*(?P<emc_c>(?s:.+?))$)"
        ));
        branches.push(Branch {
            kind: TokenKind::EmbeddedMacro,
            opener_group: "emc_o".to_string(),
            content_group: "emc_c".to_string(),
        });

        // Error branch: an opener followed by the marker, with no closing
        // sequence anywhere up to the end of input.
        let openers = string_literals
            .iter()
            .copied()
            .chain(std::iter::once(comment_start))
            .collect::<Vec<_>>()
            .join("|");
        alternatives.push(format!(
            r"(?:(?P<err>(?:{openers}){macro_marker}(?s:.)*\z))"
        ));

        let pattern = Regex::new(&format!("(?m){}", alternatives.join("|")))?;
        Ok(Self { pattern, branches })
    }

    /// Lazily tokenize `template`. The returned iterator restarts from the
    /// beginning each time this is called.
    pub fn tokenize<'r, 't>(&'r self, template: &'t str) -> Tokens<'r, 't> {
        Tokens {
            template,
            matches: self.pattern.captures_iter(template),
            branches: &self.branches,
            last_end: 0,
            pending: None,
            done: false,
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the tokens of one template. See [`Tokenizer::tokenize`].
pub struct Tokens<'r, 't> {
    template: &'t str,
    matches: regex::CaptureMatches<'r, 't>,
    branches: &'r [Branch],
    last_end: usize,
    pending: Option<Token<'t>>,
    done: bool,
}

impl<'t> Tokens<'_, 't> {
    fn text_token(&self, start: usize, end: usize) -> Token<'t> {
        Token {
            kind: TokenKind::Text,
            content: &self.template[start..end],
            section_start: start,
            marker_start: start,
            content_start: start,
        }
    }
}

impl<'t> Iterator for Tokens<'_, 't> {
    type Item = Token<'t>;

    fn next(&mut self) -> Option<Token<'t>> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }
        if self.done {
            return None;
        }
        match self.matches.next() {
            Some(caps) => {
                let whole = caps.get(0)?;
                let token = classify(self.branches, &caps)?;
                let gap = (whole.start() > self.last_end)
                    .then(|| self.text_token(self.last_end, whole.start()));
                self.last_end = whole.end();
                match gap {
                    Some(text) => {
                        self.pending = Some(token);
                        Some(text)
                    }
                    None => Some(token),
                }
            }
            None => {
                self.done = true;
                (self.last_end < self.template.len())
                    .then(|| self.text_token(self.last_end, self.template.len()))
            }
        }
    }
}

fn classify<'t>(branches: &[Branch], caps: &Captures<'t>) -> Option<Token<'t>> {
    let whole = caps.get(0)?;
    if let Some(m) = caps.name("err") {
        return Some(Token {
            kind: TokenKind::Error,
            content: m.as_str(),
            section_start: whole.start(),
            marker_start: whole.start(),
            content_start: whole.start(),
        });
    }
    for branch in branches {
        if let Some(content) = caps.name(&branch.content_group) {
            let opener = caps.name(&branch.opener_group)?;
            return Some(Token {
                kind: branch.kind,
                content: content.as_str(),
                section_start: whole.start(),
                marker_start: opener.start(),
                content_start: content.start(),
            });
        }
    }
    None
}
