//! Note export helpers shared by clients.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{Attachment, Note};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Serializable note representation used in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNote {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub updated_at: i64,
}

/// Convert a note into an export record.
#[must_use]
pub fn note_to_export_item(note: &Note) -> ExportNote {
    ExportNote {
        id: note.id.to_string(),
        title: note.title.clone(),
        content: note.content.clone(),
        tags: note.tags.iter().cloned().collect(),
        sources: note.sources.iter().cloned().collect(),
        attachments: note.attachments.clone(),
        updated_at: note.updated_at,
    }
}

/// Render notes as pretty-printed JSON.
pub fn render_json_export(notes: &[Note]) -> serde_json::Result<String> {
    let items = notes
        .iter()
        .map(note_to_export_item)
        .collect::<Vec<ExportNote>>();
    serde_json::to_string_pretty(&items)
}

/// Render notes in Markdown with frontmatter blocks.
#[must_use]
pub fn render_markdown_export(notes: &[Note]) -> String {
    let mut output = String::new();

    for (index, note) in notes.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let item = note_to_export_item(note);
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", item.id);
        let _ = writeln!(output, "title: {}", item.title);
        let _ = writeln!(output, "updated_at: {}", item.updated_at);
        write_list(&mut output, "tags", &item.tags);
        write_list(&mut output, "sources", &item.sources);
        if !item.attachments.is_empty() {
            let _ = writeln!(output, "attachments:");
            for attachment in &item.attachments {
                let _ = writeln!(output, "  - {} ({})", attachment.name, attachment.kind);
            }
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        let _ = writeln!(output, "# {}", item.title);
        let _ = writeln!(output);
        output.push_str(&item.content);
        output.push('\n');
    }

    output
}

fn write_list(output: &mut String, label: &str, values: &[String]) {
    let _ = writeln!(output, "{label}:");
    for value in values {
        let _ = writeln!(output, "  - {value}");
    }
}

/// Render notes based on selected export format.
pub fn render_notes_export(notes: &[Note], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(notes),
        ExportFormat::Markdown => Ok(render_markdown_export(notes)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("notelm-export-{timestamp_ms}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentKind, NotePatch};

    fn sample_note() -> Note {
        let mut note = Note::new(456);
        note.merge(
            NotePatch::default()
                .title("Ownership")
                .content("Moves and borrows")
                .tags(["zeta", "alpha"])
                .sources(["https://doc.rust-lang.org"])
                .attachments(vec![
                    Attachment::new("chapter4.pdf", AttachmentKind::Pdf, 100).unwrap()
                ]),
        );
        note
    }

    #[test]
    fn note_to_export_item_sorts_tags() {
        let export = note_to_export_item(&sample_note());
        assert_eq!(export.tags, vec!["alpha", "zeta"]);
    }

    #[test]
    fn render_markdown_export_includes_frontmatter_and_content() {
        let note = sample_note();
        let rendered = render_markdown_export(&[note.clone()]);

        assert!(rendered.contains(&format!("id: {}", note.id)));
        assert!(rendered.contains("title: Ownership"));
        assert!(rendered.contains("updated_at: 456"));
        assert!(rendered.contains("tags:\n  - alpha\n  - zeta"));
        assert!(rendered.contains("sources:\n  - https://doc.rust-lang.org"));
        assert!(rendered.contains("attachments:\n  - chapter4.pdf (pdf)"));
        assert!(rendered.contains("# Ownership\n\nMoves and borrows\n"));
    }

    #[test]
    fn render_json_export_uses_camel_case() {
        let rendered = render_json_export(&[sample_note()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value[0]["updatedAt"], 456);
        assert_eq!(value[0]["attachments"][0]["type"], "pdf");
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "notelm-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "notelm-export-456.md"
        );
    }
}
