//! Trestle bridge compiler CLI
//!
//! Generates a JVM bridge class for a hosted class: one bridge method per
//! manifest entry, marshaled onto the runtime's dynamic dispatch protocol,
//! written out as a `.class` file.

mod output;

use anyhow::{Context, Result};
use clap::Parser;
use output::{resolve_color_choice, StyledOutput};
use std::path::{Path, PathBuf};
use trestle_compiler::{BridgeCompiler, BridgeManifest, GeneratedClass};

#[derive(Parser)]
#[command(name = "trestle")]
#[command(about = "Ahead-of-time bridge class compiler for the Trestle runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Name of the generated class (simple name; see --package)
    class_name: String,

    /// Hosted class path to bind, e.g. "Geo::Point"
    host_class: String,

    /// Bridge manifest describing the exposed methods
    manifest: PathBuf,

    /// Package for the generated class
    #[arg(long)]
    package: Option<String>,

    /// Output directory for generated class files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Color output: auto, always, never
    #[arg(long)]
    color: Option<String>,
}

fn main() {
    // Missing arguments are a usage problem, not a tool failure: print
    // the usage text and exit 1. Requested help/version output stays a
    // success.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            print!("{}", err.render());
            let requested = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            std::process::exit(if requested { 0 } else { 1 });
        }
    };

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
    if let Err(err) = run(&cli, &mut out) {
        out.error_line(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(cli: &Cli, out: &mut StyledOutput) -> Result<()> {
    let manifest = BridgeManifest::from_path(&cli.manifest)?;
    let source_file = cli.manifest.file_name().and_then(|name| name.to_str());
    let spec = manifest.class_spec(
        &cli.class_name,
        &cli.host_class,
        cli.package.as_deref(),
        source_file,
    )?;

    let compiler = BridgeCompiler::new(manifest.binding());
    let generated = compiler.compile(&spec)?;

    write_artifacts(&[generated], &cli.out_dir, out)
}

/// Write each artifact to its package path under the output directory.
///
/// Sequential and fail-fast: the first I/O error aborts the run with no
/// cleanup of already-written files.
fn write_artifacts(
    classes: &[GeneratedClass],
    out_dir: &Path,
    out: &mut StyledOutput,
) -> Result<()> {
    for class in classes {
        let path = out_dir.join(class.relative_path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let bytes = class.encode();
        std::fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;

        out.success("Wrote");
        out.plain(&format!(
            " {} ({} bytes, {} methods)\n",
            path.display(),
            bytes.len(),
            class.class_file.methods().len()
        ));
    }
    Ok(())
}
