use displaydoc::Display;
use thiserror::Error;

use crate::vocab::Vocab;

/// The potential errors of the numerization.
#[derive(Debug, Display, Error, PartialEq)]
pub enum NumerizerError {
    /// The label `{0}` is not part of the label vocabulary
    UnknownLabel(String),
    /// The index {0} is not part of the label vocabulary
    UnknownIndex(u32),
}

impl Vocab {
    /// Numerizes the sequence and replaces missing tokens with the fallback index.
    pub fn numerize_or(&self, sequence: &[String], fallback: u32) -> Vec<u32> {
        sequence
            .iter()
            .map(|token| self.get(token).unwrap_or(fallback))
            .collect()
    }

    /// Numerizes the sequence.
    ///
    /// # Errors
    /// Fails if any label is missing from the vocabulary.
    pub fn numerize(&self, sequence: &[String]) -> Result<Vec<u32>, NumerizerError> {
        sequence
            .iter()
            .map(|label| {
                self.get(label)
                    .ok_or_else(|| NumerizerError::UnknownLabel(label.clone()))
            })
            .collect()
    }

    /// Reverses the numerization of the sequence, keeping at most `len` entries if given.
    ///
    /// # Errors
    /// Fails if any kept index is missing from the vocabulary.
    pub fn denumerize(
        &self,
        sequence: &[u32],
        len: Option<usize>,
    ) -> Result<Vec<String>, NumerizerError> {
        let len = len.map_or(sequence.len(), |len| len.min(sequence.len()));
        sequence[..len]
            .iter()
            .map(|&index| {
                self.token(index)
                    .map(ToString::to_string)
                    .ok_or(NumerizerError::UnknownIndex(index))
            })
            .collect()
    }
}
