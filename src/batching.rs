//! Sub-batch partitioning for oversized inputs
//!
//! Splits the example axis into chunks of a configured size so the full
//! pipeline runs per chunk; attributions are concatenated back in order.

use crate::error::{AttributionError, Result};
use ndarray::{concatenate, Array2, Axis};

/// Half-open example ranges covering `total` in chunks of `chunk_size`
pub fn chunk_ranges(total: usize, chunk_size: usize) -> Result<Vec<(usize, usize)>> {
    if chunk_size == 0 {
        return Err(AttributionError::Config(
            "internal batch size must be at least 1".to_string(),
        ));
    }
    let mut ranges = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        ranges.push((start, end));
        start = end;
    }
    Ok(ranges)
}

/// Slice rows `start..end` out of every tensor
pub fn slice_examples(tensors: &[Array2<f32>], start: usize, end: usize) -> Vec<Array2<f32>> {
    tensors
        .iter()
        .map(|t| t.slice(ndarray::s![start..end, ..]).to_owned())
        .collect()
}

/// Concatenate per-chunk attribution tuples along the example axis
pub fn concat_attributions(chunks: Vec<Vec<Array2<f32>>>) -> Result<Vec<Array2<f32>>> {
    let n_tensors = chunks
        .first()
        .ok_or_else(|| AttributionError::Config("no sub-batches produced".to_string()))?
        .len();

    let mut out = Vec::with_capacity(n_tensors);
    for t in 0..n_tensors {
        let views: Vec<_> = chunks.iter().map(|chunk| chunk[t].view()).collect();
        let joined = concatenate(Axis(0), &views).map_err(|e| {
            AttributionError::ShapeMismatch(format!("cannot concatenate sub-batch results: {e}"))
        })?;
        out.push(joined);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_chunk_ranges_cover_total() {
        assert_eq!(chunk_ranges(10, 4).unwrap(), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(chunk_ranges(4, 4).unwrap(), vec![(0, 4)]);
        assert_eq!(chunk_ranges(0, 4).unwrap(), vec![]);
    }

    #[test]
    fn test_chunk_ranges_rejects_zero() {
        assert!(chunk_ranges(10, 0).is_err());
    }

    #[test]
    fn test_slice_examples() {
        let t = arr2(&[[1.0], [2.0], [3.0], [4.0]]);
        let sliced = slice_examples(&[t], 1, 3);
        assert_eq!(sliced[0].nrows(), 2);
        assert_eq!(sliced[0][[0, 0]], 2.0);
        assert_eq!(sliced[0][[1, 0]], 3.0);
    }

    #[test]
    fn test_concat_round_trip() {
        let t = arr2(&[[1.0], [2.0], [3.0], [4.0], [5.0]]);
        let ranges = chunk_ranges(5, 2).unwrap();
        let chunks: Vec<Vec<Array2<f32>>> = ranges
            .iter()
            .map(|&(a, b)| slice_examples(std::slice::from_ref(&t), a, b))
            .collect();
        let joined = concat_attributions(chunks).unwrap();
        assert_eq!(joined[0], t);
    }

    #[test]
    fn test_concat_empty_is_config_error() {
        assert!(concat_attributions(vec![]).is_err());
    }
}
