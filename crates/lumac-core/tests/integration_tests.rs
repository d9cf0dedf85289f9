/*
 * integration_tests.rs
 * Copyright (c) 2025 the lumac authors
 *
 * End-to-end tests for lumac-core, driving the Preprocessor facade over
 * template files on disk.
 */

use std::fs;
use std::path::PathBuf;

use lumac_core::{ExpandError, Preprocessor, Tokenizer};
use tempfile::TempDir;

/// Helper to create a template file inside the fixture directory.
fn write_template(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write template fixture");
    path
}

/// True if `needle` appears in the message of `err` or any error below it.
fn error_chain_contains(err: &dyn std::error::Error, needle: &str) -> bool {
    let mut current: Option<&dyn std::error::Error> = Some(err);
    while let Some(e) = current {
        if e.to_string().contains(needle) {
            return true;
        }
        current = e.source();
    }
    false
}

#[test]
fn test_pure_text_expands_to_itself() {
    let dir = TempDir::new().unwrap();
    let content = "no macros\nanywhere here\n";
    let path = write_template(&dir, "plain.tpl", content);
    let pp = Preprocessor::new();
    assert_eq!(pp.expand_file(&path).unwrap(), content);
    // Expanding the expansion changes nothing either.
    assert_eq!(pp.expand_str("again", content).unwrap(), content);
}

#[test]
fn test_block_macro_output_is_rebased() {
    let dir = TempDir::new().unwrap();
    let path = write_template(
        &dir,
        "list.tpl",
        "'''$$\nfunction items()\n    for i = 1, 2 do\n        insert(\"- i\" .. i .. \"\\n\")\n    end\nend\n$$'''\nlist:\n    # $$ items()\n",
    );
    let pp = Preprocessor::new();
    assert_eq!(
        pp.expand_file(&path).unwrap(),
        "list:\n    - i1\n    - i2\n"
    );
}

#[test]
fn test_embedded_macro_first_line_stays_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "emb.tpl", "total = '$$ insert(\"a\\nb\\n\") $$' end\n");
    let pp = Preprocessor::new();
    assert_eq!(
        pp.expand_file(&path).unwrap(),
        "total = a\n        b\n end\n"
    );
}

#[test]
fn test_suite_sections_drive_template_text() {
    let dir = TempDir::new().unwrap();
    let path = write_template(
        &dir,
        "rows.tpl",
        "# $$ for i = 1, 3 do:\nrow '$$ insert(i) $$'\n# $$ :end\n",
    );
    let pp = Preprocessor::new();
    assert_eq!(pp.expand_file(&path).unwrap(), "row 1\nrow 2\nrow 3\n");
}

#[test]
fn test_insert_from_is_cached_per_expansion() {
    let dir = TempDir::new().unwrap();
    let sub = write_template(
        &dir,
        "sub.tpl",
        "'$$ _G.n = (_G.n or 0) + 1 insert(_G.n) $$'",
    );
    let top = write_template(
        &dir,
        "top.tpl",
        &format!(
            "# $$ insert_from(\"{0}\")\n# $$ insert_from(\"{0}\")\n",
            sub.display()
        ),
    );
    let pp = Preprocessor::new();
    // The second inclusion replays the cached text instead of re-counting.
    assert_eq!(pp.expand_file(&top).unwrap(), "11");
}

#[test]
fn test_insert_from_with_namespace_reevaluates() {
    let dir = TempDir::new().unwrap();
    let sub = write_template(&dir, "sub.tpl", "'$$ insert(greeting) $$'");
    let top = write_template(
        &dir,
        "top.tpl",
        &format!(
            "# $$ insert_from(\"{0}\", {{ greeting = \"hey\" }})\n# $$ insert_from(\"{0}\")\n",
            sub.display()
        ),
    );
    let pp = Preprocessor::new();
    // The namespaced run is not cached, so the plain run still evaluates.
    assert_eq!(pp.expand_file(&top).unwrap(), "heynil");
}

#[test]
fn test_import_from_shares_definitions() {
    let dir = TempDir::new().unwrap();
    let defs = write_template(
        &dir,
        "defs.tpl",
        "# $$ function shout(s) return string.upper(s) .. \"!\" end\n",
    );
    let top = write_template(
        &dir,
        "top.tpl",
        &format!(
            "# $$ import_from(\"{}\")\n'$$ insert(shout(\"ready\")) $$'\n",
            defs.display()
        ),
    );
    let pp = Preprocessor::new();
    assert_eq!(pp.expand_file(&top).unwrap(), "READY!");
}

#[test]
fn test_nested_inclusion_two_levels() {
    let dir = TempDir::new().unwrap();
    let inner = write_template(&dir, "inner.tpl", "core\n");
    let mid = write_template(
        &dir,
        "mid.tpl",
        &format!("mid[\n# $$ insert_from(\"{}\")\n]\n", inner.display()),
    );
    let top = write_template(
        &dir,
        "top.tpl",
        &format!("top{{\n# $$ insert_from(\"{}\")\n}}\n", mid.display()),
    );
    let pp = Preprocessor::new();
    assert_eq!(pp.expand_file(&top).unwrap(), "top{\nmid[\ncore\n]\n}\n");
}

#[test]
fn test_included_output_follows_call_site_indentation() {
    let dir = TempDir::new().unwrap();
    let inner = write_template(&dir, "inner.tpl", "alpha:\n  beta\n");
    let outer = write_template(
        &dir,
        "outer.tpl",
        &format!(
            "items:\n    # $$ insert_from(\"{}\")\ntail\n",
            inner.display()
        ),
    );
    let pp = Preprocessor::new();
    assert_eq!(
        pp.expand_file(&outer).unwrap(),
        "items:\n    alpha:\n      beta\ntail\n"
    );
}

#[test]
fn test_insert_content_copies_verbatim() {
    let dir = TempDir::new().unwrap();
    let body = write_template(&dir, "body.txt", "kept '$$ as is $$'\n");
    let top = write_template(
        &dir,
        "top.tpl",
        &format!("# $$ insert_content(\"{}\")\n", body.display()),
    );
    let pp = Preprocessor::new();
    // No expansion happens inside inserted content.
    assert_eq!(pp.expand_file(&top).unwrap(), "kept '$$ as is $$'\n");
}

#[test]
fn test_unterminated_macro_names_its_line() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "broken.tpl", "line one\nline two\nx = '$$ broken\n");
    let pp = Preprocessor::new();
    match pp.expand_file(&path).unwrap_err() {
        ExpandError::Lexical { origin, content } => {
            assert_eq!(origin, format!("{}:3", path.display()));
            assert_eq!(content, "'$$ broken\n");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_end_is_a_nesting_error() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "open.tpl", "# $$ if true then:\na\n");
    let pp = Preprocessor::new();
    match pp.expand_file(&path).unwrap_err() {
        ExpandError::Nesting { message } => {
            assert!(message.contains(":end somewhere missing"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_script_is_persisted_for_inspection() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "fail.tpl", "before\n# $$ error(\"kaput\")\n");
    let pp = Preprocessor::new();
    match pp.expand_file(&path).unwrap_err() {
        ExpandError::Execution { script, source } => {
            let kept = fs::read_to_string(&script).unwrap();
            assert!(kept.contains("insert(\"before\\n\")"));
            assert!(error_chain_contains(&source, "kaput"));
            fs::remove_file(script).unwrap();
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_expand_file_to_file_writes_output() {
    let dir = TempDir::new().unwrap();
    let input = write_template(&dir, "in.tpl", "# $$ for i = 1, 2 do:\nline\n# $$ :end\n");
    let output = dir.path().join("out.txt");
    let pp = Preprocessor::new();
    pp.expand_file_to_file(&input, &output).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "line\nline\n");
}

#[test]
fn test_template_script_renders_the_lua_source() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "t.tpl", "# $$ for i = 1, 2 do:\nx\n# $$ :end\n");
    let pp = Preprocessor::new();
    assert_eq!(
        pp.template_script(&path).unwrap(),
        "for i = 1, 2 do\n    insert(\"x\\n\")\nend\n"
    );
}

#[test]
fn test_crlf_templates_are_normalized() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crlf.tpl");
    fs::write(&path, b"a\r\n'$$ insert(1) $$'\r\n").unwrap();
    let pp = Preprocessor::new();
    assert_eq!(pp.expand_file(&path).unwrap(), "a\n1");
}

#[test]
fn test_custom_macro_syntax() {
    let dir = TempDir::new().unwrap();
    let path = write_template(&dir, "custom.tpl", "x = `@@ insert(40 + 2) @@`\n");
    let tokenizer = Tokenizer::with_syntax("@@", &["`"], "//[ \t]*").unwrap();
    let pp = Preprocessor::new().with_tokenizer(tokenizer);
    assert_eq!(pp.expand_file(&path).unwrap(), "x = 42\n");
}

#[test]
fn test_stderr_handle_does_not_touch_the_output() {
    let pp = Preprocessor::new();
    let result = pp
        .expand_str("t", "a'$$ stderr:write(\"note for the log \"):write(\"stream\\n\") $$'b")
        .unwrap();
    assert_eq!(result, "ab");
}
