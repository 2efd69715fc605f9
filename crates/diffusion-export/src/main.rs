use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use diffusion_export::logger;
use diffusion_export::pipeline::{self, ConvertRequest, FixIoRequest};
use diffusion_export::registry::ModelFamily;

#[derive(Parser)]
#[command(name = "diffusion-export")]
#[command(about = "Package optimizer output into runnable diffusion pipeline directories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch and package the submodels of an exported pipeline
    Convert {
        /// Model family of the pipeline
        #[arg(long)]
        family: ModelFamily,

        /// Source pipeline directory
        #[arg(long)]
        input: PathBuf,

        /// Output directory (defaults to `{input}/_onnx`)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Comma-separated module list (defaults to the family's modules)
        #[arg(long, value_delimiter = ',')]
        modules: Option<Vec<String>>,

        /// Optimizer cache directory (defaults to `{input}/.export-cache`)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Delete the optimizer cache after packaging
        #[arg(long)]
        clean: bool,

        /// Write large tensors into a sibling `.data` file
        #[arg(long)]
        external_data: bool,
    },

    /// Widen the float16 boundaries of a single graph file
    FixIo {
        /// Graph definition file to patch
        #[arg(long)]
        input: PathBuf,

        /// Output file (defaults to `converted.onnx` next to the input)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write large tensors into a sibling `.data` file
        #[arg(long)]
        external_data: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_log().context("logger already initialized")?;

    match cli.command {
        Commands::Convert {
            family,
            input,
            output,
            modules,
            cache_dir,
            clean,
            external_data,
        } => {
            let request = ConvertRequest {
                family,
                input,
                output,
                modules,
                cache_dir,
                clean,
                external_data,
            };

            println!("{} Conversion", family.title());
            println!("--------------------------------------");
            println!("Input: {}", request.input.display());
            if let Some(output) = &request.output {
                println!("Output: {}", output.display());
            }
            println!("External Data: {}", request.external_data);
            println!("--------------------------------------");

            let converted = pipeline::convert(&request)
                .with_context(|| format!("{} conversion failed", family.title()))?;
            for module in &converted {
                println!("Saved {} -> {}", module.name, module.path.display());
            }
            println!("{} Conversion Complete.", family.title());
        }
        Commands::FixIo {
            input,
            output,
            external_data,
        } => {
            let request = FixIoRequest {
                input,
                output,
                external_data,
            };

            println!("IO/16 to IO/32 Conversion");
            println!("--------------------------------------");
            println!("Input: {}", request.input.display());
            println!("External Data: {}", request.external_data);
            println!("--------------------------------------");

            let (output, rewritten) =
                pipeline::fix_io(&request).context("IO conversion failed")?;
            println!("Rewrote {rewritten} boundaries -> {}", output.display());
            println!("IO/16 to IO/32 Conversion Complete.");
        }
    }
    Ok(())
}
