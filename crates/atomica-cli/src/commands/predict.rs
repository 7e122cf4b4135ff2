use crate::cli::PredictArgs;
use crate::error::{CliError, Result};
use crate::progress::CliProgressHandler;
use atomica::nn::affinity::AffinityPredictor;
use atomica::nn::batch::Batch;
use atomica::nn::error::ModelError;
use atomica::workflows::process::DatasetItem;
use atomica::workflows::progress::{Progress, ProgressReporter};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// One line of the prediction output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub pred_energy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<f64>,
}

/// Reads the JSON Lines written by `process`, skipping blank lines.
pub fn read_items(path: &Path) -> Result<Vec<DatasetItem>> {
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("line {}: {}", line_no + 1, e),
        })?;
        items.push(item);
    }
    Ok(items)
}

pub fn predict_items(
    model: &mut AffinityPredictor,
    items: &[DatasetItem],
    batch_size: usize,
    reporter: &ProgressReporter,
) -> Result<Vec<PredictionRecord>> {
    if batch_size == 0 {
        return Err(CliError::Argument("batch size must be at least 1".into()));
    }

    reporter.start_counted_phase("Predicting", items.len().div_ceil(batch_size) as u64);

    let mut records = Vec::with_capacity(items.len());
    for chunk in items.chunks(batch_size) {
        let batch = Batch::collate(chunk.iter().map(|item| (&item.data, item.label)))?;
        let energies = model
            .infer(&batch)?
            .to_vec1::<f32>()
            .map_err(ModelError::from)?;
        debug!(items = chunk.len(), "Predicted batch");
        records.extend(chunk.iter().zip(energies).map(|(item, energy)| PredictionRecord {
            id: item.id.clone(),
            pred_energy: f64::from(energy),
            label: item.label,
        }));
        reporter.report(Progress::TaskIncrement);
    }

    reporter.finish_counted_phase(None);
    Ok(records)
}

pub fn run(args: PredictArgs, quiet: bool) -> Result<()> {
    let device = Device::Cpu;
    let mut model = AffinityPredictor::load(&args.model_dir, &device)?;
    let items = read_items(&args.input)?;
    info!("Loaded {} item(s) from {:?}", items.len(), &args.input);

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let records = predict_items(&mut model, &items, args.batch_size, &reporter)?;

    let mut writer = BufWriter::new(File::create(&args.out)?);
    for record in &records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    println!(
        "✓ Wrote {} prediction(s) to {}",
        records.len(),
        args.out.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{InitArgs, ProcessArgs};
    use crate::commands::{init, process};
    use std::path::PathBuf;

    const PDB: &str = "\
ATOM      1  N   ALA A   1      -1.200   0.400   0.000  1.00  0.00           N
ATOM      2  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C
ATOM      3  CA  GLY B   1       4.000   0.000   0.000  1.00  0.00           C
ATOM      4  CA  SER B   2       4.500   3.000   0.000  1.00  0.00           C
END
";

    fn process_fixture(dir: &Path) -> PathBuf {
        let pdb_path = dir.join("complex.pdb");
        std::fs::write(&pdb_path, PDB).unwrap();
        let index = dir.join("index.csv");
        std::fs::write(
            &index,
            format!(
                "pdb_id,pdb_path,chain1,chain2,label\n\
                 c1,{path},A,B,6.0\n\
                 c2,{path},B,A,\n",
                path = pdb_path.display()
            ),
        )
        .unwrap();
        let items = dir.join("items.jsonl");
        process::run(
            ProcessArgs {
                index,
                out: items.clone(),
                config: None,
                dist_th: None,
                fragmentation: None,
            },
            true,
        )
        .unwrap();
        items
    }

    fn init_model(dir: &Path) -> PathBuf {
        let model_dir = dir.join("model");
        init::run(InitArgs {
            out: model_dir.clone(),
            config: None,
            pretrained: None,
            k_neighbors: None,
            dropout: None,
            bottom_global_message_passing: None,
            global_message_passing: None,
            partial_finetune: false,
        })
        .unwrap();
        model_dir
    }

    #[test]
    fn predicts_every_processed_item() {
        let dir = tempfile::tempdir().unwrap();
        let items = process_fixture(dir.path());
        let model_dir = init_model(dir.path());
        let out = dir.path().join("predictions.jsonl");

        run(
            PredictArgs {
                model_dir,
                input: items,
                out: out.clone(),
                batch_size: 1,
            },
            true,
        )
        .unwrap();

        let records: Vec<PredictionRecord> = std::fs::read_to_string(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "c1_A_B");
        assert_eq!(records[0].label, Some(6.0));
        assert_eq!(records[1].label, None);
        assert!(records.iter().all(|r| r.pred_energy.is_finite()));
    }

    #[test]
    fn batching_does_not_change_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let items = read_items(&process_fixture(dir.path())).unwrap();
        let mut model = AffinityPredictor::load(&init_model(dir.path()), &Device::Cpu).unwrap();
        let reporter = ProgressReporter::new();

        let one_by_one = predict_items(&mut model, &items, 1, &reporter).unwrap();
        let together = predict_items(&mut model, &items, 8, &reporter).unwrap();
        for (a, b) in one_by_one.iter().zip(&together) {
            assert_eq!(a.id, b.id);
            assert!((a.pred_energy - b.pred_energy).abs() < 1e-4);
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = AffinityPredictor::load(&init_model(dir.path()), &Device::Cpu).unwrap();
        let result = predict_items(&mut model, &[], 0, &ProgressReporter::new());
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn malformed_lines_report_their_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.jsonl");
        std::fs::write(&path, "\n{not json}\n").unwrap();
        match read_items(&path) {
            Err(CliError::FileParsing { source, .. }) => {
                assert!(source.to_string().starts_with("line 2:"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
