use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::config::RunConfig;

pub fn save_config(path: &Path, config: &RunConfig) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, config)
        .with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

/// Missing fields take their [`RunConfig::default`] values.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let reader = BufReader::new(file);
    let config =
        serde_json::from_reader(reader).with_context(|| format!("failed to parse {:?}", path))?;
    Ok(config)
}
