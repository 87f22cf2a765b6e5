// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `infer` — edits a latent file with a trained mapper
//   2. `init`  — writes a freshly initialised checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, InitArgs};

#[derive(Parser, Debug)]
#[command(
    name = "latent-edit",
    version = "0.1.0",
    about = "Edit generator latents with a trained text-driven mapper and render the results."
)]
pub struct Cli {
    /// The subcommand to run (infer or init)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Infer(args) => run_infer(args),
            Commands::Init(args)  => run_init(args),
        }
    }
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    tracing::info!("Editing latents from: {}", args.latents_test_path);

    let use_case = InferUseCase::new(args.to_test_options()?, args.device.into());
    let summary  = use_case.execute()?;

    println!(
        "Inference complete: {} samples in {} batches.",
        summary.samples_written, summary.batches
    );
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    use crate::application::init_use_case::InitUseCase;

    InitUseCase::new(args.to_config()?, args.device.into()).execute()?;
    println!("Checkpoint written to '{}'.", args.checkpoint_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ComputeDevice;

    #[test]
    fn test_infer_defaults() {
        let cli = Cli::try_parse_from([
            "latent-edit", "infer", "--exp-dir", "out", "--checkpoint-path", "ckpt",
        ])
        .unwrap();
        let Commands::Infer(args) = cli.command else { panic!("expected infer") };

        let opts = args.to_test_options().unwrap();
        assert_eq!(opts.test_batch_size, 2);
        assert_eq!(opts.test_workers, 2);
        assert_eq!(opts.stylegan_size, 1024);
        assert_eq!(opts.n_images, None);
        assert!(!opts.couple_outputs);
        assert!(opts.fourier_features_transforms_path.is_none());
        assert_eq!(ComputeDevice::from(args.device), ComputeDevice::Wgpu);
    }

    #[test]
    fn test_infer_flags() {
        let cli = Cli::try_parse_from([
            "latent-edit", "infer",
            "--exp-dir", "out",
            "--checkpoint-path", "ckpt",
            "--couple-outputs",
            "--no-fine-mapper",
            "--mapper-type", "SingleMapper",
            "--n-images", "5",
            "--device", "cpu",
        ])
        .unwrap();
        let Commands::Infer(args) = cli.command else { panic!("expected infer") };

        let opts = args.to_test_options().unwrap();
        assert!(opts.couple_outputs);
        assert!(opts.no_fine_mapper);
        assert_eq!(opts.n_images, Some(5));
        assert_eq!(ComputeDevice::from(args.device), ComputeDevice::Cpu);
    }

    #[test]
    fn test_unknown_mapper_type_is_rejected() {
        let cli = Cli::try_parse_from([
            "latent-edit", "infer", "--exp-dir", "o", "--checkpoint-path", "c",
            "--mapper-type", "DeepMapper",
        ])
        .unwrap();
        let Commands::Infer(args) = cli.command else { panic!("expected infer") };
        assert!(args.to_test_options().is_err());
    }

    #[test]
    fn test_init_requires_checkpoint_path() {
        assert!(Cli::try_parse_from(["latent-edit", "init"]).is_err());
    }
}
