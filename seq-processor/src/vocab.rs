use std::{collections::HashMap, convert::TryFrom};

use displaydoc::Display;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::processor::Sentence;

/// The index of the padding token in the token vocabulary and of the padding label in the label
/// vocabulary.
pub const PAD_INDEX: u32 = 0;

/// The index of the unknown token in the token vocabulary.
pub const UNK_INDEX: u32 = 1;

/// The index of the sequence-start token in the token vocabulary.
pub const BOS_INDEX: u32 = 2;

/// The index of the sequence-end token in the token vocabulary.
pub const EOS_INDEX: u32 = 3;

/// A dense and bijective vocabulary.
///
/// Maps strings to the indices `0..len()` and back. Both directions are always built or loaded
/// together.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(try_from = "HashMap<String, u32>")]
pub struct Vocab {
    indices: HashMap<String, u32>,
    tokens: Vec<String>,
}

/// The potential errors of a vocabulary.
#[derive(Debug, Display, Error, PartialEq)]
pub enum VocabError {
    /// The index {index} of `{token}` leaves a gap in a vocabulary of {len} entries
    Sparse {
        token: String,
        index: u32,
        len: usize,
    },
    /// The index {index} is assigned to both `{first}` and `{second}`
    Ambiguous {
        index: u32,
        first: String,
        second: String,
    },
}

impl Vocab {
    /// Builds a vocabulary from the token frequencies of the corpora.
    ///
    /// The reserved tokens occupy the first indices in the given order, whether they occur in the
    /// corpora or not. The remaining tokens follow in order of descending frequency pooled over
    /// all corpora, where ties keep the order of their first occurrence.
    pub fn build<'c>(reserved: &[&str], corpora: impl IntoIterator<Item = &'c [Sentence]>) -> Self {
        let counts = count(corpora);
        let mut vocab = Self {
            indices: HashMap::with_capacity(reserved.len() + counts.len()),
            tokens: Vec::with_capacity(reserved.len() + counts.len()),
        };
        for token in reserved.iter().copied().chain(counts.into_iter().map(|(token, _)| token)) {
            vocab.push(token);
        }

        vocab
    }

    /// Appends the token unless it is already part of the vocabulary.
    fn push(&mut self, token: &str) {
        if !self.indices.contains_key(token) {
            self.indices.insert(token.into(), self.tokens.len() as u32);
            self.tokens.push(token.into());
        }
    }

    /// Gets the number of entries.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Checks if the vocabulary has no entries.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Gets the index of the token.
    pub fn get(&self, token: &str) -> Option<u32> {
        self.indices.get(token).copied()
    }

    /// Gets the token at the index.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    /// Iterates over the entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(index, token)| (token.as_str(), index as u32))
    }
}

/// Counts the tokens of the corpora.
///
/// The counts are ordered by descending frequency, ties by first occurrence.
fn count<'c>(corpora: impl IntoIterator<Item = &'c [Sentence]>) -> Vec<(&'c str, usize)> {
    let mut positions = HashMap::<&str, usize>::new();
    let mut counts = Vec::<(&str, usize)>::new();
    for token in corpora.into_iter().flatten().flatten() {
        let position = *positions.entry(token.as_str()).or_insert_with(|| {
            counts.push((token.as_str(), 0));
            counts.len() - 1
        });
        counts[position].1 += 1;
    }
    // stable, so equal counts stay in order of first occurrence
    counts.sort_by(|(_, left), (_, right)| right.cmp(left));

    counts
}

impl TryFrom<HashMap<String, u32>> for Vocab {
    type Error = VocabError;

    fn try_from(indices: HashMap<String, u32>) -> Result<Self, Self::Error> {
        let len = indices.len();
        let mut tokens = vec![None; len];
        for (token, &index) in &indices {
            let slot = tokens
                .get_mut(index as usize)
                .ok_or_else(|| VocabError::Sparse {
                    token: token.clone(),
                    index,
                    len,
                })?;
            if let Some(first) = *slot {
                return Err(VocabError::Ambiguous {
                    index,
                    first: String::clone(first),
                    second: token.clone(),
                });
            }
            *slot = Some(token);
        }
        let tokens = tokens.into_iter().flatten().cloned().collect();

        Ok(Self { indices, tokens })
    }
}

impl Serialize for Vocab {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.iter())
    }
}
