// Dataset loading
// Documents and their vectors are stored as two JSON Lines files. Blank lines
// are skipped, so the n-th record of one file pairs with the n-th of the other

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::database::Document;

fn read_json_lines<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file {}", what, path.display()))?;

    let mut items = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| {
            format!("Failed to read line {} of {}", line_number, path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).with_context(|| {
            format!(
                "Invalid {} on line {} of {}",
                what,
                line_number,
                path.display()
            )
        })?;
        items.push(item);
    }

    debug!("Read {} {} records from {}", items.len(), what, path.display());
    Ok(items)
}

/// Read one JSON document per line. Blank lines are skipped.
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    read_json_lines(path.as_ref(), "document")
}

/// Read one JSON array of floats per line. Blank lines are skipped.
pub fn load_vectors<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    let vectors: Vec<Vec<f32>> = read_json_lines(path, "vector")?;

    if let Some(first) = vectors.first() {
        if let Some((index, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != first.len())
        {
            bail!(
                "Vector {} in {} has {} dimensions, expected {}",
                index + 1,
                path.display(),
                v.len(),
                first.len()
            );
        }
    }
    Ok(vectors)
}
