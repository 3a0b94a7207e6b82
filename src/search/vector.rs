// Element-wise vector helpers used when composing a query vector

use crate::{Result, SearchError};

fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SearchError::DimensionMismatch { expected, actual })
    }
}

/// Element-wise mean of a set of vectors. Returns `None` for an empty set.
pub fn mean_vector<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Option<Vec<f32>>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };

    let mut sum = vec![0.0_f32; first.as_ref().len()];
    for vector in vectors {
        let vector = vector.as_ref();
        check_dimension(sum.len(), vector.len())?;
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
    }

    let n = vectors.len() as f32;
    for value in &mut sum {
        *value /= n;
    }
    Ok(Some(sum))
}

/// `text + reference * weight`, element-wise.
pub fn blend(text: &[f32], reference: &[f32], weight: f32) -> Result<Vec<f32>> {
    check_dimension(text.len(), reference.len())?;
    Ok(text
        .iter()
        .zip(reference)
        .map(|(t, r)| t + r * weight)
        .collect())
}
