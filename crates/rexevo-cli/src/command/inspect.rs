use std::path::PathBuf;

use anyhow::{Context, ensure};
use rexevo_engine::select_action;

use crate::util;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Genome set JSON file
    file: PathBuf,
    /// Feature vector `distance,width,height,speed` to run through each genome
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    input: Option<Vec<f32>>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { file, input } = arg;
    if let Some(input) = input {
        ensure!(
            input.len() == 4,
            "--input needs 4 comma-separated values, got {}",
            input.len()
        );
    }

    let loaded = util::read_genome_file(file)?;
    println!(
        "{}: {} genomes loaded, {} skipped",
        file.display(),
        loaded.genomes.len(),
        loaded.errors.len()
    );
    for (index, err) in &loaded.errors {
        println!("  record {index:2}: {err}");
    }

    for (i, genome) in loaded.genomes.iter().enumerate() {
        let fitness = genome
            .fitness()
            .map_or_else(|| "-".to_owned(), |f| format!("{f:.1}"));
        println!("{i:2}: {} (fitness {fitness})", genome.topology());

        if let Some(input) = input {
            let outputs = genome
                .predict(input)
                .with_context(|| format!("Failed to run genome {i}"))?;
            let Ok(logits) = <[f32; 3]>::try_from(outputs.as_slice()) else {
                println!("    {outputs:.3?} => (not a controller)");
                continue;
            };
            println!("    {outputs:.3?} => {}", select_action(logits));
        }
    }

    Ok(())
}
