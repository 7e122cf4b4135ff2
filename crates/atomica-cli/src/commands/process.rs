use crate::cli::ProcessArgs;
use crate::config::build_process_config;
use crate::error::{CliError, Result};
use crate::progress::CliProgressHandler;
use atomica::workflows::index::read_index;
use atomica::workflows::process::{DatasetItem, process_all_pdbs};
use atomica::workflows::progress::ProgressReporter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: ProcessArgs, quiet: bool) -> Result<()> {
    let config = build_process_config(&args)?;
    info!(
        "Processing with dist_th={} and fragmentation={:?}",
        config.dist_th, config.fragmentation_method
    );

    let rows = read_index(&args.index).map_err(|e| CliError::FileParsing {
        path: args.index.clone(),
        source: e.into(),
    })?;
    info!("Loaded {} row(s) from {:?}", rows.len(), &args.index);

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let items = process_all_pdbs(&rows, &config, &reporter)?;

    if items.is_empty() {
        warn!("No interface items were produced.");
    }
    write_items(&args.out, &items)?;
    println!(
        "✓ Wrote {} item(s) from {} row(s) to {}",
        items.len(),
        rows.len(),
        args.out.display()
    );
    Ok(())
}

/// Writes one JSON object per line.
pub fn write_items(path: &Path, items: &[DatasetItem]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
