use crate::cli::InitArgs;
use crate::error::{CliError, Result};
use atomica::nn::affinity::AffinityPredictor;
use atomica::nn::config::AffinityConfig;
use atomica::nn::pretrained::{FinetuneOptions, PretrainedCheckpoint};
use candle_core::Device;
use std::path::Path;
use tracing::{info, warn};

pub fn read_model_config(path: &Path) -> Result<AffinityConfig> {
    let text = std::fs::read_to_string(path)?;
    AffinityConfig::from_toml_str(&text).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

pub fn run(args: InitArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => read_model_config(path)?,
        None => AffinityConfig::default(),
    };
    let device = Device::Cpu;

    let model = match &args.pretrained {
        Some(dir) => {
            info!("Loading pretrained checkpoint from {:?}", dir);
            let checkpoint = PretrainedCheckpoint::load(dir, &device)?;
            let options = FinetuneOptions {
                k_neighbors: args.k_neighbors,
                dropout: args.dropout,
                bottom_global_message_passing: args.bottom_global_message_passing,
                global_message_passing: args.global_message_passing,
                head: config.head,
                partial_finetune: args.partial_finetune,
            };
            let (model, report) =
                AffinityPredictor::from_pretrained(&checkpoint, options, &device)?;
            if !report.missing.is_empty() {
                warn!(
                    "{} backbone parameter(s) were not in the checkpoint and keep their initialization",
                    report.missing.len()
                );
            }
            println!(
                "✓ Transferred {} parameter(s); {} fresh, {} missing, {} unused",
                report.transferred.len(),
                report.fresh.len(),
                report.missing.len(),
                report.unexpected.len()
            );
            model
        }
        None => AffinityPredictor::new(config, &device)?,
    };

    info!("Trainable parameter groups: {:?}", model.trainable_groups());
    model.save(&args.out)?;
    println!("✓ Model written to {}", args.out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomica::nn::affinity::CONFIG_FILE;
    use std::path::PathBuf;

    fn args(out: PathBuf) -> InitArgs {
        InitArgs {
            out,
            config: None,
            pretrained: None,
            k_neighbors: None,
            dropout: None,
            bottom_global_message_passing: None,
            global_message_passing: None,
            partial_finetune: false,
        }
    }

    #[test]
    fn writes_a_fresh_model_from_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("model.toml");
        std::fs::write(
            &config_path,
            "[encoder]\nhidden_size = 16\natom_hidden_size = 16\n\n[head]\nnonlinearity = \"elu\"\n",
        )
        .unwrap();
        let out = dir.path().join("model");

        let mut init = args(out.clone());
        init.config = Some(config_path);
        run(init).unwrap();

        let saved = read_model_config(&out.join(CONFIG_FILE)).unwrap();
        assert_eq!(saved.encoder.hidden_size, 16);
        let model = AffinityPredictor::load(&out, &Device::Cpu).unwrap();
        assert_eq!(model.get_config(), &saved);
    }

    #[test]
    fn finetunes_from_a_saved_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let pretrained = dir.path().join("pretrained");
        run(args(pretrained.clone())).unwrap();

        let out = dir.path().join("finetuned");
        let mut init = args(out.clone());
        init.pretrained = Some(pretrained);
        init.k_neighbors = Some(4);
        init.global_message_passing = Some(true);
        run(init).unwrap();

        let model = AffinityPredictor::load(&out, &Device::Cpu).unwrap();
        assert_eq!(model.get_config().encoder.k_neighbors, 4);
        assert!(model.get_config().encoder.global_message_passing);
    }

    #[test]
    fn malformed_model_config_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("model.toml");
        std::fs::write(&config_path, "[head]\nnonlinearity = 3\n").unwrap();
        assert!(matches!(
            read_model_config(&config_path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
