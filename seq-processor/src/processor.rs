use std::{
    borrow::Cow,
    iter::{once, FromIterator},
    path::Path,
};

use derive_more::{Deref, From};
use displaydoc::Display;
use log::debug;
use ndarray::{Array2, Array3};
use thiserror::Error;

use crate::{
    config::{Config, ReservedTokens},
    io::{load_vocabs, save_vocabs, PersistenceError},
    numerizer::NumerizerError,
    padding::recommended_len,
    vocab::{Vocab, BOS_INDEX, EOS_INDEX, PAD_INDEX, UNK_INDEX},
};

/// A tokenized sentence or its label sequence.
pub type Sentence = Vec<String>;

/// The task a processor prepares corpora for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Task {
    /// One label per token.
    Labeling,
}

/// The potential errors of a processor.
#[derive(Debug, Display, Error)]
pub enum ProcessorError {
    /// The processor doesn't implement `{0}`
    Unimplemented(&'static str),
    /// The token vocabulary hasn't been built or loaded yet
    MissingTokenVocab,
    /// The label vocabulary hasn't been built or loaded yet
    MissingLabelVocab,
    /// The token vocabulary doesn't contain the reserved token `{0}`
    MissingReservedToken(String),
    /// The {vocab} vocabulary holds {actual:?} at the reserved index {index} of `{expected}`
    ReservedMismatch {
        vocab: &'static str,
        index: u32,
        expected: String,
        actual: Option<String>,
    },
    /// Expected {expected} label partitions, one per corpus partition, but got {actual}
    Partitions { expected: usize, actual: usize },
    /// Expected {expected} label sequences in partition {partition}, but got {actual}
    Samples {
        partition: usize,
        expected: usize,
        actual: usize,
    },
    /// Expected {expected} labels for sample {sample} of partition {partition}, but got {actual}
    SampleLength {
        partition: usize,
        sample: usize,
        expected: usize,
        actual: usize,
    },
    /// Expected {expected} maximum lengths, one per partition, but got {actual}
    MaxLens { expected: usize, actual: usize },
    /// The subset index {index} is out of range for a partition of {len} samples
    Subset { index: usize, len: usize },
    /// Expected {expected} lengths, one per sequence, but got {actual}
    Lengths { expected: usize, actual: usize },
    /// Failed to numerize the sequences: {0}
    Numerizer(#[from] NumerizerError),
    /// Failed to persist the vocabularies: {0}
    Persistence(#[from] PersistenceError),
}

/// The padded token ids of a partition.
///
/// The token ids are of shape `(batch_size, sequence_len)`.
#[derive(Clone, Debug, Deref, From, PartialEq)]
pub struct TokenIds(pub Array2<i64>);

/// The padded and one-hot encoded labels of a partition.
///
/// The labels are of shape `(batch_size, sequence_len, label_count)`.
#[derive(Clone, Debug, Deref, From, PartialEq)]
pub struct LabelOneHots(pub Array3<f32>);

/// The processed partitions of a dataset.
///
/// A single input partition is processed into a single output, several into one output each.
#[derive(Clone, Debug, PartialEq)]
pub enum Partitioned<A> {
    Single(A),
    Multiple(Vec<A>),
}

impl<A> Partitioned<A> {
    /// Gets the output of a single input partition.
    pub fn single(self) -> Option<A> {
        match self {
            Self::Single(output) => Some(output),
            Self::Multiple(_) => None,
        }
    }

    /// Gets the outputs in the order of the input partitions.
    pub fn into_vec(self) -> Vec<A> {
        match self {
            Self::Single(output) => vec![output],
            Self::Multiple(outputs) => outputs,
        }
    }

    /// Gets the number of outputs.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(outputs) => outputs.len(),
        }
    }

    /// Checks if there are no outputs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A> FromIterator<A> for Partitioned<A> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        let mut outputs = iter.into_iter().collect::<Vec<_>>();
        if outputs.len() == 1 {
            if let Some(output) = outputs.pop() {
                return Self::Single(output);
            }
        }
        Self::Multiple(outputs)
    }
}

/// Statistics of the analyzed corpus.
///
/// The statistics are advisory and only used if no explicit sequence lengths are given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DatasetInfo {
    /// The recommended sequence length of each analyzed partition.
    pub recommended_lens: Vec<usize>,
    /// The size of the token vocabulary.
    pub token_count: usize,
    /// The size of the label vocabulary.
    pub label_count: usize,
}

/// The state of a processor.
///
/// The vocabularies are empty until they are built or loaded and stay untouched afterwards until
/// the state is reset.
#[derive(Clone, Debug)]
pub struct ProcessorState {
    reserved: ReservedTokens,
    percentile: f64,
    tokens: Option<Vocab>,
    labels: Option<Vocab>,
    info: DatasetInfo,
}

impl ProcessorState {
    /// Creates an empty state.
    pub fn new(config: &Config) -> Self {
        Self {
            reserved: config.reserved.clone(),
            percentile: config.percentile,
            tokens: None,
            labels: None,
            info: DatasetInfo::default(),
        }
    }

    /// Gets the reserved tokens.
    pub fn reserved_tokens(&self) -> &ReservedTokens {
        &self.reserved
    }

    /// Gets the percentile of the recommended sequence lengths.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Gets the token vocabulary if it exists.
    pub fn token_vocab(&self) -> Option<&Vocab> {
        self.tokens.as_ref()
    }

    /// Gets the label vocabulary if it exists.
    pub fn label_vocab(&self) -> Option<&Vocab> {
        self.labels.as_ref()
    }

    /// Gets the token vocabulary.
    ///
    /// # Errors
    /// Fails if the token vocabulary hasn't been built or loaded yet.
    pub fn require_token_vocab(&self) -> Result<&Vocab, ProcessorError> {
        self.token_vocab().ok_or(ProcessorError::MissingTokenVocab)
    }

    /// Gets the label vocabulary.
    ///
    /// # Errors
    /// Fails if the label vocabulary hasn't been built or loaded yet.
    pub fn require_label_vocab(&self) -> Result<&Vocab, ProcessorError> {
        self.label_vocab().ok_or(ProcessorError::MissingLabelVocab)
    }

    /// Gets the dataset statistics.
    pub fn dataset_info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Sets the token vocabulary and records its size.
    pub fn set_token_vocab(&mut self, vocab: Vocab) {
        self.info.token_count = vocab.len();
        self.tokens = Some(vocab);
    }

    /// Sets the label vocabulary and records its size.
    pub fn set_label_vocab(&mut self, vocab: Vocab) {
        self.info.label_count = vocab.len();
        self.labels = Some(vocab);
    }

    /// Clears the token vocabulary and its recorded size.
    pub(crate) fn clear_token_vocab(&mut self) {
        self.info.token_count = 0;
        self.tokens = None;
    }

    /// Sets the recommended sequence lengths of the partitions.
    pub fn set_recommended_lens(&mut self, lens: Vec<usize>) {
        self.info.recommended_lens = lens;
    }

    /// Clears the vocabularies and the statistics.
    pub fn reset(&mut self) {
        self.tokens = None;
        self.labels = None;
        self.info = DatasetInfo::default();
    }
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// The capabilities of a processor.
///
/// The token vocabulary, the corpus analysis and the persistence are shared by all processors.
/// The label semantics and the dataset processing are specific to a [`Task`] and fail with
/// [`ProcessorError::Unimplemented`] unless the processor provides them.
pub trait Processor {
    /// Gets the state.
    fn state(&self) -> &ProcessorState;

    /// Gets the mutable state.
    fn state_mut(&mut self) -> &mut ProcessorState;

    /// Gets the task.
    fn task(&self) -> Task;

    /// Analyzes the corpus and labels partitions.
    ///
    /// Records the recommended sequence length of each partition and builds the token and label
    /// vocabularies unless they already exist. A token vocabulary built by this call is discarded
    /// again if the label vocabulary can't be built.
    ///
    /// # Errors
    /// Fails if the labels don't mirror the shape of the corpus or if the label vocabulary can't
    /// be built.
    fn analyze_corpus(
        &mut self,
        corpus: &[&[Sentence]],
        labels: &[&[Sentence]],
    ) -> Result<(), ProcessorError> {
        validate_labels(corpus, labels)?;

        let percentile = self.state().percentile();
        let lens = corpus
            .iter()
            .map(|partition| recommended_len(partition.iter().map(Vec::len), percentile))
            .collect();
        self.state_mut().set_recommended_lens(lens);

        let built_tokens = self.state().token_vocab().is_none();
        if built_tokens {
            self.build_token_dict(corpus);
        }
        if self.state().label_vocab().is_none() {
            if let Err(error) = self.build_label_dict(labels) {
                if built_tokens {
                    self.state_mut().clear_token_vocab();
                }
                return Err(error);
            }
        }

        Ok(())
    }

    /// Analyzes a single corpus and labels partition.
    ///
    /// See [`analyze_corpus()`](Processor::analyze_corpus).
    fn prepare_dicts_if_need(
        &mut self,
        corpus: &[Sentence],
        labels: &[Sentence],
    ) -> Result<(), ProcessorError> {
        self.analyze_corpus(&[corpus], &[labels])
    }

    /// Builds the token vocabulary from the corpus partitions.
    fn build_token_dict(&mut self, corpus: &[&[Sentence]]) {
        let state = self.state_mut();
        let vocab = Vocab::build(&state.reserved_tokens().tokens(), corpus.iter().copied());
        debug!("built the token vocabulary with {} tokens", vocab.len());
        state.set_token_vocab(vocab);
    }

    /// Builds the label vocabulary from the labels partitions.
    fn build_label_dict(&mut self, _labels: &[&[Sentence]]) -> Result<(), ProcessorError> {
        Err(ProcessorError::Unimplemented("build_label_dict"))
    }

    /// Processes the corpus partitions into padded token ids.
    ///
    /// The optional `maxlens` are the sequence lengths per partition and the optional `subset`
    /// selects the samples of each partition by index.
    fn process_x_dataset(
        &self,
        _data: &[&[Sentence]],
        _maxlens: Option<&[usize]>,
        _subset: Option<&[usize]>,
    ) -> Result<Partitioned<TokenIds>, ProcessorError> {
        Err(ProcessorError::Unimplemented("process_x_dataset"))
    }

    /// Processes the labels partitions into padded and one-hot encoded labels.
    ///
    /// See [`process_x_dataset()`](Processor::process_x_dataset).
    fn process_y_dataset(
        &self,
        _data: &[&[Sentence]],
        _maxlens: Option<&[usize]>,
        _subset: Option<&[usize]>,
    ) -> Result<Partitioned<LabelOneHots>, ProcessorError> {
        Err(ProcessorError::Unimplemented("process_y_dataset"))
    }

    /// Numerizes the token sequences.
    fn numerize_token_sequences(
        &self,
        _sequences: &[Sentence],
    ) -> Result<Vec<Vec<u32>>, ProcessorError> {
        Err(ProcessorError::Unimplemented("numerize_token_sequences"))
    }

    /// Numerizes the label sequences.
    fn numerize_label_sequences(
        &self,
        _sequences: &[Sentence],
    ) -> Result<Vec<Vec<u32>>, ProcessorError> {
        Err(ProcessorError::Unimplemented("numerize_label_sequences"))
    }

    /// Reverses the numerization of the label sequences.
    ///
    /// Each sequence is truncated to its length if `lengths` are given.
    fn reverse_numerize_label_sequences(
        &self,
        _sequences: &[Vec<u32>],
        _lengths: Option<&[usize]>,
    ) -> Result<Vec<Vec<String>>, ProcessorError> {
        Err(ProcessorError::Unimplemented(
            "reverse_numerize_label_sequences",
        ))
    }

    /// Saves the token and label vocabularies into the directory.
    ///
    /// # Errors
    /// Fails if any vocabulary doesn't exist yet or can't be written.
    fn save_dicts(&self, dir: &Path) -> Result<(), ProcessorError> {
        let state = self.state();
        save_vocabs(
            dir,
            state.require_token_vocab()?,
            state.require_label_vocab()?,
        )
        .map_err(Into::into)
    }

    /// Loads the token and label vocabularies from the directory.
    ///
    /// Replaces the current vocabularies only if both can be loaded and hold the configured
    /// reserved tokens at their fixed indices.
    fn load_dicts(&mut self, dir: &Path) -> Result<(), ProcessorError> {
        let (tokens, labels) = load_vocabs(dir)?;
        validate_reserved(self.state().reserved_tokens(), &tokens, &labels)?;
        let state = self.state_mut();
        state.set_token_vocab(tokens);
        state.set_label_vocab(labels);

        Ok(())
    }

    /// Clears the vocabularies and statistics, so that they are rebuilt on the next analysis.
    fn reset(&mut self) {
        self.state_mut().reset();
    }
}

/// Checks that the vocabularies hold the reserved tokens at their fixed indices.
fn validate_reserved(
    reserved: &ReservedTokens,
    tokens: &Vocab,
    labels: &Vocab,
) -> Result<(), ProcessorError> {
    let indices = [PAD_INDEX, UNK_INDEX, BOS_INDEX, EOS_INDEX];
    let reserved_tokens = reserved.tokens();
    let slots = indices
        .iter()
        .zip(reserved_tokens.iter())
        .map(|(&index, &token)| ("token", tokens, index, token))
        .chain(once(("label", labels, PAD_INDEX, reserved.pad.as_str())));

    for (vocab, entries, index, expected) in slots {
        let actual = entries.token(index);
        if actual != Some(expected) {
            return Err(ProcessorError::ReservedMismatch {
                vocab,
                index,
                expected: expected.into(),
                actual: actual.map(Into::into),
            });
        }
    }

    Ok(())
}

/// Checks that the labels mirror the shape of the corpus.
fn validate_labels(corpus: &[&[Sentence]], labels: &[&[Sentence]]) -> Result<(), ProcessorError> {
    if corpus.len() != labels.len() {
        return Err(ProcessorError::Partitions {
            expected: corpus.len(),
            actual: labels.len(),
        });
    }

    for (partition, (sentences, sequences)) in corpus.iter().zip(labels).enumerate() {
        if sentences.len() != sequences.len() {
            return Err(ProcessorError::Samples {
                partition,
                expected: sentences.len(),
                actual: sequences.len(),
            });
        }
        for (sample, (sentence, sequence)) in sentences.iter().zip(sequences.iter()).enumerate() {
            if sentence.len() != sequence.len() {
                return Err(ProcessorError::SampleLength {
                    partition,
                    sample,
                    expected: sentence.len(),
                    actual: sequence.len(),
                });
            }
        }
    }

    Ok(())
}

/// Selects the samples of the partition by index.
pub(crate) fn select_subset<'a>(
    partition: &'a [Sentence],
    subset: Option<&[usize]>,
) -> Result<Cow<'a, [Sentence]>, ProcessorError> {
    match subset {
        Some(subset) => subset
            .iter()
            .map(|&index| {
                partition
                    .get(index)
                    .cloned()
                    .ok_or(ProcessorError::Subset {
                        index,
                        len: partition.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Cow::Owned),
        None => Ok(Cow::Borrowed(partition)),
    }
}
