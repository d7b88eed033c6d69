//! Per-file text transforms applied before a file is framed and counted.
//!
//! Comment removal is a single language-agnostic regex pass, not a lexer:
//! it strips `//`, `#` and `--` line comments, `/* */` blocks and
//! single-line `"""..."""` spans wherever they appear, including inside
//! string literals (`"http://x"` loses its tail, `#include` lines vanish).

use crate::config::Config;
use crate::output_formats::format_file;
use once_cell::sync::Lazy;
use regex::Regex;

static COMMENTS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(//.*)|(/\*[\s\S]*?\*/)|(#.*)|(--.*)|(""".*?""")"#)
        .expect("comment regex is valid")
});

pub fn remove_comments(text: &str) -> String {
    COMMENTS_REGEX.replace_all(text, "").into_owned()
}

/// Drops blank and whitespace-only lines, keeping the order of the rest.
pub fn compact(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comment removal (if enabled) runs before compaction (if enabled).
pub fn transform(raw_text: &str, config: &Config) -> String {
    let mut text = if config.transform.remove_comments {
        remove_comments(raw_text)
    } else {
        raw_text.to_string()
    };
    if config.transform.compact_mode {
        text = compact(&text);
    }
    text
}

/// Transformed text framed for the configured output format.
pub fn transform_and_format(path: &str, raw_text: &str, config: &Config) -> String {
    let text = transform(raw_text, config);
    format_file(path, &text, config.output.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(remove_comments: bool, compact_mode: bool) -> Config {
        let mut config = Config::default();
        config.transform.remove_comments = remove_comments;
        config.transform.compact_mode = compact_mode;
        config
    }

    #[test]
    fn strips_leading_line_comment() {
        assert_eq!(transform("// comment\ncode();", &config(true, false)), "\ncode();");
    }

    #[test]
    fn strips_block_hash_and_dash_comments() {
        let text = "a /* one\ntwo */ b\n# shell\nselect 1; -- sql\n";
        assert_eq!(remove_comments(text), "a  b\n\nselect 1; \n");
    }

    #[test]
    fn strips_single_line_triple_quoted_span() {
        assert_eq!(remove_comments("x = \"\"\"doc\"\"\"\ny"), "x = \ny");
    }

    #[test]
    fn over_strips_inside_string_literals() {
        assert_eq!(remove_comments("url = \"http://example.com\""), "url = \"http:");
    }

    #[test]
    fn compaction_drops_blank_lines_only() {
        assert_eq!(compact("a\n\n   \n\tb\n\nc\n"), "a\n\tb\nc");
    }

    #[test]
    fn comments_removed_before_compaction() {
        assert_eq!(transform("// c\n\ncode();\n", &config(true, true)), "code();");
    }

    #[test]
    fn untouched_when_disabled() {
        let raw = "// keep\n\nme\n";
        assert_eq!(transform(raw, &config(false, false)), raw);
    }
}
