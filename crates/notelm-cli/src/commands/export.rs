use std::path::Path;

use notelm_core::export::{render_notes_export, ExportFormat as CoreExportFormat};

use crate::cli::ExportFormat;
use crate::commands::common::list_all_notes;
use crate::error::CliError;

impl From<ExportFormat> for CoreExportFormat {
    fn from(value: ExportFormat) -> Self {
        match value {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let notes = list_all_notes(db_path).await?;
    let rendered = render_notes_export(&notes, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
