use crate::config::OutputFormat;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use std::path::Path;

const RULE: &str = "================================================";

pub const TRUNCATION_MARKER: &str = "\n\n[... file truncated, continued in next part ...]\n";

pub fn continuation_marker(path: &str) -> String {
    format!("[... continuation of file {} ...]\n\n", path)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExcludePreset {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub patterns: Vec<String>,
}

static EXCLUDE_PRESETS: Lazy<Vec<ExcludePreset>> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/presets.yaml"));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/presets.yaml")
});

pub fn get_exclude_presets() -> &'static [ExcludePreset] {
    &EXCLUDE_PRESETS
}

pub fn find_exclude_preset(name: &str) -> Option<&'static ExcludePreset> {
    let wanted = name.trim().to_lowercase();
    get_exclude_presets().iter().find(|preset| {
        preset.name == wanted || preset.aliases.iter().any(|alias| *alias == wanted)
    })
}

/// Header block opening every part.
pub fn format_header(
    project_name: &str,
    file_count: usize,
    part: Option<usize>,
    generated_at: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> String {
    let timestamp = generated_at.map(|t| t.to_rfc3339());
    match format {
        OutputFormat::Plain => {
            let mut out = format!("{RULE}\nProject: {project_name}\nFiles: {file_count}\n");
            if let Some(n) = part {
                out.push_str(&format!("Part: {n}\n"));
            }
            if let Some(ts) = &timestamp {
                out.push_str(&format!("Generated: {ts}\n"));
            }
            out.push_str(RULE);
            out.push_str("\n\n");
            out
        }
        OutputFormat::Markdown => {
            let mut out = format!("# Project: {project_name}\n\n- Files: {file_count}\n");
            if let Some(n) = part {
                out.push_str(&format!("- Part: {n}\n"));
            }
            if let Some(ts) = &timestamp {
                out.push_str(&format!("- Generated: {ts}\n"));
            }
            out.push('\n');
            out
        }
        OutputFormat::Xml => {
            let mut out = format!(
                "<digest project=\"{}\" files=\"{}\"",
                escape(project_name),
                file_count
            );
            if let Some(n) = part {
                out.push_str(&format!(" part=\"{n}\""));
            }
            if let Some(ts) = &timestamp {
                out.push_str(&format!(" generated=\"{ts}\""));
            }
            out.push_str(">\n");
            out
        }
    }
}

/// Closing text written just before a part is flushed.
pub fn format_footer(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Xml => "</digest>\n",
        OutputFormat::Plain | OutputFormat::Markdown => "",
    }
}

pub fn format_tree(tree_text: &str, format: OutputFormat) -> String {
    if tree_text.is_empty() {
        return String::new();
    }
    match format {
        OutputFormat::Plain => format!("Directory Structure:\n\n{tree_text}\n"),
        OutputFormat::Markdown => {
            format!("## Directory Structure\n\n```text\n{tree_text}```\n\n")
        }
        OutputFormat::Xml => format!("<directory_structure>\n{tree_text}</directory_structure>\n"),
    }
}

pub fn format_file(path: &str, content: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Plain => format!("{RULE}\nFile: {path}\n{RULE}\n{content}\n\n"),
        OutputFormat::Markdown => {
            let fence = fence_for(content);
            let lang = markdown_language(path);
            format!("## File: {path}\n\n{fence}{lang}\n{content}\n{fence}\n\n")
        }
        OutputFormat::Xml => format!("<file path=\"{}\">\n{content}\n</file>\n\n", escape(path)),
    }
}

// A fence one backtick longer than the longest run inside the content.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

pub fn markdown_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "kt" | "kts" => "kotlin",
        "java" => "java",
        "py" => "python",
        "rb" => "ruby",
        "go" => "go",
        "js" | "cjs" | "mjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "php" => "php",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "md" => "markdown",
        "gradle" => "groovy",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_file_section_frames_path_and_content() {
        let section = format_file("src/main.rs", "fn main() {}", OutputFormat::Plain);
        assert_eq!(
            section,
            format!("{RULE}\nFile: src/main.rs\n{RULE}\nfn main() {{}}\n\n")
        );
    }

    #[test]
    fn markdown_fence_grows_past_embedded_backticks() {
        let section = format_file("README.md", "```sh\nls\n```", OutputFormat::Markdown);
        assert!(section.starts_with("## File: README.md\n\n````markdown\n"));
        assert!(section.ends_with("\n````\n\n"));
    }

    #[test]
    fn xml_escapes_attributes() {
        let header = format_header("a&b", 2, Some(1), None, OutputFormat::Xml);
        assert_eq!(header, "<digest project=\"a&amp;b\" files=\"2\" part=\"1\">\n");
        let section = format_file("x\"y.rs", "body", OutputFormat::Xml);
        assert!(section.starts_with("<file path=\"x&quot;y.rs\">\n"));
        assert_eq!(format_footer(OutputFormat::Xml), "</digest>\n");
    }

    #[test]
    fn plain_header_omits_part_when_unsplit() {
        let header = format_header("demo", 3, None, None, OutputFormat::Plain);
        assert!(header.contains("Project: demo\nFiles: 3\n"));
        assert!(!header.contains("Part:"));
    }

    #[test]
    fn empty_tree_renders_nothing() {
        assert_eq!(format_tree("", OutputFormat::Markdown), "");
    }

    #[test]
    fn presets_resolve_by_name_and_alias() {
        assert_eq!(find_exclude_preset("Android").unwrap().name, "android");
        assert_eq!(find_exclude_preset("python/ai").unwrap().name, "python");
        assert!(find_exclude_preset("unknown").is_none());
        assert_eq!(get_exclude_presets().len(), 4);
    }
}
