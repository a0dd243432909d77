use std::path::{Path, PathBuf};

use flomo_core::export::{suggested_export_file_name, ExportFormat, ExportOptions};
use flomo_core::services::ExportSelection;

use crate::cli::{sort_order, ExportFormatArg, OrderByArg, OrderDirArg, UrlModeArg};
use crate::commands::common::open_local;
use crate::config::Settings;
use crate::error::CliError;

/// Flags of `flomo export`
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub format: ExportFormatArg,
    pub compact: bool,
    pub no_meta: bool,
    pub min: bool,
    pub url: UrlModeArg,
    pub order_by: OrderByArg,
    pub order_dir: OrderDirArg,
    pub limit: Option<usize>,
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    pub fn options(&self, settings: &Settings) -> ExportOptions {
        let mut options = ExportOptions {
            compact: self.compact,
            include_metadata: !self.no_meta,
            minimal: self.min,
            url_mode: self.url.into(),
            ..ExportOptions::default()
        };
        if let Some(offset) = settings
            .timezone_offset_hours
            .and_then(|hours| chrono::FixedOffset::east_opt(hours * 3600))
        {
            options.timezone = offset;
        }
        options
    }

    pub const fn selection(&self) -> ExportSelection {
        ExportSelection {
            order: sort_order(self.order_by, self.order_dir),
            limit: self.limit,
        }
    }
}

pub async fn run_export(args: ExportArgs, settings: &Settings) -> Result<(), CliError> {
    let format = ExportFormat::from(args.format);
    let service = open_local(settings).await?;
    let rendered = service
        .export_selection(args.selection(), format, &args.options(settings))
        .await?;

    if let Some(path) = args.output.as_deref() {
        let path = resolve_output_path(path, format, chrono::Local::now().naive_local());
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// A directory gets a timestamped file name inside it; anything else is used as-is.
pub fn resolve_output_path(
    path: &Path,
    format: ExportFormat,
    now: chrono::NaiveDateTime,
) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(format, now))
    } else {
        path.to_path_buf()
    }
}
