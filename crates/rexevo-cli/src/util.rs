use std::{fs, path::Path};

use anyhow::Context;
use rexevo_genome::{LoadedGenomes, load_records};

/// Reads a genome set, skipping (and logging) records that fail to decode.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a JSON array
pub fn read_genome_file<P>(path: P) -> anyhow::Result<LoadedGenomes>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to open genome file: {}", path.display()))?;
    let loaded = load_records(&json)
        .with_context(|| format!("Failed to parse genome JSON file: {}", path.display()))?;
    Ok(loaded)
}
