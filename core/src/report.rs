use std::{fmt::Write, fs, path::Path};

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_REPORT_TEMPLATE: &str = r"# Traffic Sign Classifier Notebook

<!-- SECTION:overview start -->
<!-- Summarize what the latest run did. -->
<!-- SECTION:overview end -->

## Configuration

<!-- SECTION:configuration start -->
<!-- Populated automatically with the parameters from the latest run. -->
<!-- SECTION:configuration end -->

## Training Data

<!-- SECTION:class-distribution start -->
<!-- Images per class in the training split. -->
<!-- SECTION:class-distribution end -->

## Learning Curve

<!-- SECTION:learning-curve start -->
<!-- Cost and validation accuracy per epoch. -->
<!-- SECTION:learning-curve end -->

## Test Evaluation

<!-- SECTION:evaluation start -->
<!-- Batched test accuracy. -->
<!-- SECTION:evaluation end -->

<!-- SECTION:confusion-matrix start -->
<!-- Per-class recall and the most frequent confusions. -->
<!-- SECTION:confusion-matrix end -->

## Failed Cases

<!-- SECTION:failed-cases start -->
<!-- Misclassified test images. -->
<!-- SECTION:failed-cases end -->

## Activations

<!-- SECTION:activations start -->
<!-- Feature maps after each convolution for one sample image. -->
<!-- SECTION:activations end -->

## New Image Predictions

<!-- SECTION:predictions start -->
<!-- Top-k predictions for ad-hoc images. -->
<!-- SECTION:predictions end -->

> Sections are rewritten in place between their `<!-- SECTION:name start/end -->` markers; text outside the
> markers is left alone.
";

#[derive(Clone, Debug)]
pub struct ReportSection {
    id: String,
    content: String,
}

impl ReportSection {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    fn start_marker(&self) -> String {
        format!("<!-- SECTION:{} start -->", self.id)
    }

    fn end_marker(&self) -> String {
        format!("<!-- SECTION:{} end -->", self.id)
    }
}

pub fn ensure_report_file(path: &Path, template: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    if !path.exists() {
        fs::write(path, template)
            .with_context(|| format!("failed to write report template to {}", path.display()))?;
    }

    Ok(())
}

pub fn update_sections(path: &Path, sections: &[ReportSection]) -> Result<()> {
    let mut content = fs::read_to_string(path)
        .with_context(|| format!("failed to read report at {}", path.display()))?;

    for section in sections {
        content = replace_section(&content, section)?;
    }

    fs::write(path, content)
        .with_context(|| format!("failed to write updated report to {}", path.display()))?;
    Ok(())
}

/// Render a GitHub-flavoured markdown table. Rows shorter than the header are padded.
pub fn markdown_table<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> String {
    let mut output = String::new();
    let _ = writeln!(&mut output, "| {} |", headers.join(" | "));
    let _ = writeln!(
        &mut output,
        "|{}",
        headers.iter().map(|_| " --- |").collect::<String>()
    );

    for row in rows {
        let mut cells: Vec<&str> = row.iter().map(AsRef::as_ref).collect();
        cells.resize(headers.len(), "");
        let _ = writeln!(&mut output, "| {} |", cells.join(" | "));
    }

    output
}

fn replace_section(content: &str, section: &ReportSection) -> Result<String> {
    let start_marker = section.start_marker();
    let end_marker = section.end_marker();

    let start_idx = content
        .find(&start_marker)
        .ok_or_else(|| anyhow!("missing start marker: {}", start_marker))?;
    let after_start = start_idx + start_marker.len();
    let end_relative = content[after_start..]
        .find(&end_marker)
        .ok_or_else(|| anyhow!("missing end marker: {}", end_marker))?;
    let end_idx = after_start + end_relative;

    let mut updated = String::with_capacity(content.len() + section.content.len());
    updated.push_str(&content[..start_idx]);
    updated.push_str(&start_marker);

    let trimmed = section.content.trim_matches('\n');
    updated.push('\n');
    if !trimmed.is_empty() {
        updated.push_str(trimmed);
        updated.push('\n');
    }

    updated.push_str(&content[end_idx..]);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_only_marked_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        ensure_report_file(&path, DEFAULT_REPORT_TEMPLATE).unwrap();

        update_sections(&path, &[ReportSection::new("evaluation", "accuracy 97%")]).unwrap();
        update_sections(&path, &[ReportSection::new("evaluation", "accuracy 98%")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(
            "<!-- SECTION:evaluation start -->\naccuracy 98%\n<!-- SECTION:evaluation end -->"
        ));
        assert!(!content.contains("97%"));
        assert!(content.starts_with("# Traffic Sign Classifier Notebook"));
    }

    #[test]
    fn unknown_section_is_an_error() {
        let section = ReportSection::new("metrics", "x");
        let err = replace_section("no markers here", &section).unwrap_err();
        assert!(err.to_string().contains("SECTION:metrics start"));
    }

    #[test]
    fn table_pads_short_rows() {
        let table = markdown_table(&["Class", "Count"], &[vec!["1", "20"], vec!["2"]]);
        assert_eq!(table, "| Class | Count |\n| --- | --- |\n| 1 | 20 |\n| 2 |  |\n");
    }
}
