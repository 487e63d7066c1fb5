// `coreport textmap` — flatten a rich-text document and map text ranges
// (e.g. spell-check annotations) back to structured positions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use coreport_common::textmap::{Node, NodeSchema, PositionRange, TextMap, TextRange};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct TextmapArgs {
    /// Document JSON file (ProseMirror node tree).
    document: PathBuf,

    /// Text range to convert, as START:END in characters. Repeatable.
    #[arg(long = "range", value_parser = parse_range)]
    ranges: Vec<TextRange>,

    /// Node schema JSON file; defaults to the report editor schema.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextmapResult {
    text: String,
    doc_size: usize,
    ranges: Vec<ConvertedRange>,
}

#[derive(Debug, Serialize)]
struct ConvertedRange {
    text: TextRange,
    /// `None` when the range was dropped.
    position: Option<PositionRange>,
}

pub fn run(args: TextmapArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match build(&args) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn build(args: &TextmapArgs) -> anyhow::Result<TextmapResult> {
    let document: Node = read_json(&args.document, "document")?;
    let schema = match &args.schema {
        Some(path) => read_json(path, "schema")?,
        None => NodeSchema::report_editor(),
    };

    let map = TextMap::build(&document, &schema);
    let ranges = args
        .ranges
        .iter()
        .map(|range| ConvertedRange {
            text: *range,
            position: map.convert_range(range.start, range.end),
        })
        .collect();
    Ok(TextmapResult { text: map.text().to_string(), doc_size: map.doc_size(), ranges })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid {what} JSON in {}", path.display()))
}

fn parse_range(raw: &str) -> anyhow::Result<TextRange> {
    let Some((start, end)) = raw.split_once(':') else {
        bail!("expected START:END, got `{raw}`");
    };
    let start = start.trim().parse().with_context(|| format!("invalid range start in `{raw}`"))?;
    let end = end.trim().parse().with_context(|| format!("invalid range end in `{raw}`"))?;
    Ok(TextRange { start, end })
}

fn format_human(result: &TextmapResult) -> String {
    let mut lines = vec![format!("{} chars, document size {}", result.text.chars().count(), result.doc_size)];
    lines.push(result.text.clone());
    for range in &result.ranges {
        let mapped = match range.position {
            Some(position) => format!("{}..{}", position.from, position.to),
            None => "dropped".to_string(),
        };
        lines.push(format!("  {}:{} -> {mapped}", range.text.start, range.text.end));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_doc(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("finding.json");
        let doc = serde_json::json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Hello"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "World"}]}
            ]
        });
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    #[test]
    fn parse_range_accepts_start_end() {
        assert_eq!(parse_range("3:7").unwrap(), TextRange { start: 3, end: 7 });
        assert!(parse_range("3-7").is_err());
        assert!(parse_range("a:7").is_err());
    }

    #[test]
    fn build_maps_ranges_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = TextmapArgs {
            document: write_doc(&dir),
            ranges: vec![TextRange { start: 0, end: 5 }, TextRange { start: 6, end: 11 }, TextRange { start: 4, end: 4 }],
            schema: None,
            json: true,
        };

        let result = build(&args).unwrap();
        assert_eq!(result.text, "Hello\nWorld");
        assert_eq!(result.doc_size, 14);
        assert_eq!(result.ranges[0].position, Some(PositionRange { from: 0, to: 7 }));
        assert_eq!(result.ranges[1].position, Some(PositionRange { from: 8, to: 14 }));
        assert_eq!(result.ranges[2].position, None);
    }

    #[test]
    fn missing_file_is_reported() {
        let args = TextmapArgs {
            document: PathBuf::from("/nonexistent/finding.json"),
            ranges: Vec::new(),
            schema: None,
            json: true,
        };
        let error = build(&args).unwrap_err();
        assert!(format!("{error:#}").contains("failed to read document"));
    }

    #[test]
    fn human_format_marks_dropped_ranges() {
        let result = TextmapResult {
            text: "ab".into(),
            doc_size: 4,
            ranges: vec![ConvertedRange { text: TextRange { start: 1, end: 1 }, position: None }],
        };
        assert!(format_human(&result).contains("1:1 -> dropped"));
    }
}
