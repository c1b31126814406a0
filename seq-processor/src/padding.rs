use ndarray::{Array2, Array3};

use crate::vocab::PAD_INDEX;

/// A padding and truncation strategy.
///
/// Sequences are truncated and padded at their end with the padding index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Padding(Paddings);

/// The available padding strategies.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Paddings {
    /// Padding to a fixed length.
    Fixed { len: usize },
    /// Padding to a percentile of the sequence lengths.
    Percentile { percentile: f64 },
}

impl Padding {
    /// Creates a fixed-length padding strategy.
    pub fn fixed(len: usize) -> Self {
        Self(Paddings::Fixed { len })
    }

    /// Creates a padding strategy to the recommended length of the padded sequences.
    ///
    /// See [`recommended_len()`].
    pub fn percentile(percentile: f64) -> Self {
        Self(Paddings::Percentile { percentile })
    }

    /// Gets the length the sequences are padded to.
    pub fn target_len(&self, sequences: &[Vec<u32>]) -> usize {
        match self.0 {
            Paddings::Fixed { len } => len,
            Paddings::Percentile { percentile } => {
                recommended_len(sequences.iter().map(Vec::len), percentile)
            }
        }
    }

    /// Pads and truncates the sequences.
    ///
    /// The padded sequences are of shape `(sequences.len(), target_len)`.
    pub fn pad(&self, sequences: &[Vec<u32>]) -> Array2<i64> {
        let shape = (sequences.len(), self.target_len(sequences));
        Array2::from_shape_fn(shape, |(i, j)| {
            i64::from(sequences[i].get(j).copied().unwrap_or(PAD_INDEX))
        })
    }
}

/// Computes the recommended sequence length.
///
/// This is the length at the percentile of the sorted lengths, or zero if there are no lengths.
pub fn recommended_len(lens: impl IntoIterator<Item = usize>, percentile: f64) -> usize {
    let mut lens = lens.into_iter().collect::<Vec<_>>();
    if lens.is_empty() {
        return 0;
    }
    lens.sort_unstable();
    let position = ((percentile * lens.len() as f64) as usize).min(lens.len() - 1);

    lens[position]
}

/// One-hot encodes the padded indices.
///
/// The encoding is of shape `(batch_size, sequence_len, classes)`.
pub fn one_hot(indices: &Array2<i64>, classes: usize) -> Array3<f32> {
    let (batch_size, len) = indices.dim();
    Array3::from_shape_fn((batch_size, len, classes), |(i, j, k)| {
        if indices[[i, j]] == k as i64 {
            1.
        } else {
            0.
        }
    })
}
