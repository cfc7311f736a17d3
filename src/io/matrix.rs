use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
    let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Reads a dense matrix, one row per line.
///
/// Fields are separated by whitespace or commas. Blank lines and lines
/// starting with `#` are skipped. `.gz` files are decompressed on the fly.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let reader = open_reader(path)?;
    let mut data = Vec::new();
    let mut n_cols: Option<usize> = None;
    let mut n_rows = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {path:?}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let before = data.len();
        for field in line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
        {
            let v: f64 = field.parse().with_context(|| {
                format!("{path:?} line {}: bad number {field:?}", line_no + 1)
            })?;
            data.push(v);
        }
        let cols = data.len() - before;
        match n_cols {
            None => n_cols = Some(cols),
            Some(expected) if expected != cols => bail!(
                "{path:?} line {}: expected {expected} columns, found {cols}",
                line_no + 1
            ),
            Some(_) => {}
        }
        n_rows += 1;
    }

    let Some(n_cols) = n_cols else {
        bail!("{path:?} contains no matrix rows");
    };
    Array2::from_shape_vec((n_rows, n_cols), data)
        .with_context(|| format!("failed to reshape {path:?} into {n_rows}x{n_cols}"))
}
