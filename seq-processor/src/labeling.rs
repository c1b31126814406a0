use std::path::Path;

use log::debug;
use ndarray::Array2;

use crate::{
    config::Config,
    padding::{one_hot, Padding},
    processor::{
        select_subset,
        LabelOneHots,
        Partitioned,
        Processor,
        ProcessorError,
        ProcessorState,
        Sentence,
        Task,
        TokenIds,
    },
    vocab::Vocab,
};

/// A processor for sequence labeling.
///
/// Tokens missing from the token vocabulary are numerized as the unknown token, whereas labels
/// missing from the label vocabulary are an error.
#[derive(Clone, Debug, Default)]
pub struct LabelingProcessor {
    state: ProcessorState,
}

impl LabelingProcessor {
    /// Creates an empty processor with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a processor from the configuration.
    ///
    /// # Errors
    /// Fails if the configured cache directory can't be loaded.
    pub fn from_config(config: Config) -> Result<Self, ProcessorError> {
        let mut processor = Self {
            state: ProcessorState::new(&config),
        };
        if let Some(dir) = config.cache_dir {
            processor.load_dicts(&dir)?;
        }

        Ok(processor)
    }

    /// Creates a processor with the vocabularies cached in the directory.
    ///
    /// # Errors
    /// Fails if any vocabulary is missing or malformed, or if the reserved tokens aren't at their
    /// fixed indices.
    pub fn load_cached(dir: impl AsRef<Path>) -> Result<Self, ProcessorError> {
        Self::from_config(Config::new().with_cache_dir(dir.as_ref()))
    }

    /// Numerizes, pads and truncates each partition.
    fn process_sequences(
        &self,
        numerize: impl Fn(&[Sentence]) -> Result<Vec<Vec<u32>>, ProcessorError>,
        data: &[&[Sentence]],
        maxlens: Option<&[usize]>,
        subset: Option<&[usize]>,
    ) -> Result<Vec<Array2<i64>>, ProcessorError> {
        if let Some(maxlens) = maxlens {
            if maxlens.len() != data.len() {
                return Err(ProcessorError::MaxLens {
                    expected: data.len(),
                    actual: maxlens.len(),
                });
            }
        }

        let recommended_lens = &self.state.dataset_info().recommended_lens;
        data.iter()
            .enumerate()
            .map(|(index, partition)| {
                let target = select_subset(partition, subset)?;
                let sequences = numerize(&*target)?;
                let padding = match maxlens
                    .map(|maxlens| maxlens[index])
                    .or_else(|| recommended_lens.get(index).copied())
                {
                    Some(len) => Padding::fixed(len),
                    None => Padding::percentile(self.state.percentile()),
                };

                Ok(padding.pad(&sequences))
            })
            .collect()
    }
}

impl Processor for LabelingProcessor {
    fn state(&self) -> &ProcessorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProcessorState {
        &mut self.state
    }

    fn task(&self) -> Task {
        Task::Labeling
    }

    fn build_label_dict(&mut self, labels: &[&[Sentence]]) -> Result<(), ProcessorError> {
        let pad = self.state.reserved_tokens().pad.as_str();
        let vocab = Vocab::build(&[pad], labels.iter().copied());
        debug!("built the label vocabulary with {} labels", vocab.len());
        self.state.set_label_vocab(vocab);

        Ok(())
    }

    fn process_x_dataset(
        &self,
        data: &[&[Sentence]],
        maxlens: Option<&[usize]>,
        subset: Option<&[usize]>,
    ) -> Result<Partitioned<TokenIds>, ProcessorError> {
        let token_ids = self.process_sequences(
            |sequences| self.numerize_token_sequences(sequences),
            data,
            maxlens,
            subset,
        )?;

        Ok(token_ids.into_iter().map(TokenIds::from).collect())
    }

    fn process_y_dataset(
        &self,
        data: &[&[Sentence]],
        maxlens: Option<&[usize]>,
        subset: Option<&[usize]>,
    ) -> Result<Partitioned<LabelOneHots>, ProcessorError> {
        let label_count = self.state.require_label_vocab()?.len();
        let label_ids = self.process_sequences(
            |sequences| self.numerize_label_sequences(sequences),
            data,
            maxlens,
            subset,
        )?;

        Ok(label_ids
            .iter()
            .map(|label_ids| LabelOneHots::from(one_hot(label_ids, label_count)))
            .collect())
    }

    fn numerize_token_sequences(
        &self,
        sequences: &[Sentence],
    ) -> Result<Vec<Vec<u32>>, ProcessorError> {
        let vocab = self.state.require_token_vocab()?;
        let unk = &self.state.reserved_tokens().unk;
        let unk_index = vocab
            .get(unk)
            .ok_or_else(|| ProcessorError::MissingReservedToken(unk.clone()))?;

        Ok(sequences
            .iter()
            .map(|sequence| vocab.numerize_or(sequence, unk_index))
            .collect())
    }

    fn numerize_label_sequences(
        &self,
        sequences: &[Sentence],
    ) -> Result<Vec<Vec<u32>>, ProcessorError> {
        let vocab = self.state.require_label_vocab()?;
        sequences
            .iter()
            .map(|sequence| vocab.numerize(sequence).map_err(Into::into))
            .collect()
    }

    fn reverse_numerize_label_sequences(
        &self,
        sequences: &[Vec<u32>],
        lengths: Option<&[usize]>,
    ) -> Result<Vec<Vec<String>>, ProcessorError> {
        let vocab = self.state.require_label_vocab()?;
        if let Some(lengths) = lengths {
            if lengths.len() != sequences.len() {
                return Err(ProcessorError::Lengths {
                    expected: sequences.len(),
                    actual: lengths.len(),
                });
            }
        }

        sequences
            .iter()
            .enumerate()
            .map(|(index, sequence)| {
                vocab
                    .denumerize(sequence, lengths.map(|lengths| lengths[index]))
                    .map_err(Into::into)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use ndarray::{arr2, arr3, Axis};
    use tempfile::tempdir;
    use test_utils::{corpus::sentences, ner};

    use super::*;
    use crate::{
        io::{LABEL_VOCAB_FILE, TOKEN_VOCAB_FILE},
        numerizer::NumerizerError,
        vocab::UNK_INDEX,
    };

    fn corpus() -> (Vec<Sentence>, Vec<Sentence>) {
        (
            sentences(&[&["I", "love", "NLP"], &["I", "love", "cats"]]),
            sentences(&[&["O", "O", "B"], &["O", "O", "B"]]),
        )
    }

    fn processor() -> LabelingProcessor {
        let (x, y) = corpus();
        let mut processor = LabelingProcessor::new();
        processor.prepare_dicts_if_need(&x, &y).unwrap();
        processor
    }

    #[test]
    fn test_task() {
        assert_eq!(LabelingProcessor::new().task(), Task::Labeling);
    }

    #[test]
    fn test_prepare_dicts() {
        let processor = processor();
        let tokens = processor.state().token_vocab().unwrap();
        let labels = processor.state().label_vocab().unwrap();
        assert_eq!(
            tokens.iter().collect::<Vec<_>>(),
            [
                ("<PAD>", 0),
                ("<UNK>", 1),
                ("<BOS>", 2),
                ("<EOS>", 3),
                ("I", 4),
                ("love", 5),
                ("NLP", 6),
                ("cats", 7),
            ],
        );
        assert_eq!(
            labels.iter().collect::<Vec<_>>(),
            [("<PAD>", 0), ("O", 1), ("B", 2)],
        );

        let info = processor.state().dataset_info();
        assert_eq!(info.recommended_lens, [3]);
        assert_eq!(info.token_count, 8);
        assert_eq!(info.label_count, 3);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let mut processor = processor();
        let tokens = processor.state().token_vocab().cloned();
        let labels = processor.state().label_vocab().cloned();

        let x = sentences(&[&["dogs", "bark"], &["dogs", "bark"], &["cats", "meow"]]);
        let y = sentences(&[&["B", "I"], &["B", "I"], &["B", "I"]]);
        processor.analyze_corpus(&[&x, &x[..1]], &[&y, &y[..1]]).unwrap();

        assert_eq!(processor.state().token_vocab().cloned(), tokens);
        assert_eq!(processor.state().label_vocab().cloned(), labels);
        assert_eq!(processor.state().dataset_info().recommended_lens, [2, 2]);
    }

    #[test]
    fn test_reset_rebuilds() {
        let mut processor = processor();
        processor.reset();
        assert!(processor.state().token_vocab().is_none());

        let x = sentences(&[&["dogs", "bark"]]);
        let y = sentences(&[&["B", "I"]]);
        processor.prepare_dicts_if_need(&x, &y).unwrap();
        assert_eq!(processor.state().token_vocab().unwrap().get("dogs"), Some(4));
        assert_eq!(processor.state().label_vocab().unwrap().get("I"), Some(2));
    }

    #[test]
    fn test_process_x() {
        let processor = processor();
        let x = sentences(&[&["I", "love", "NLP"]]);
        let token_ids = processor
            .process_x_dataset(&[&x], Some(&[5]), None)
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(token_ids.0, arr2(&[[4, 5, 6, 0, 0]]));
    }

    #[test]
    fn test_process_x_unknown_tokens() {
        let processor = processor();
        let x = sentences(&[&["I", "love", "dogs", "and", "NLP"]]);
        let token_ids = processor
            .process_x_dataset(&[&x], Some(&[4]), None)
            .unwrap()
            .single()
            .unwrap();
        let unk = i64::from(UNK_INDEX);
        assert_eq!(token_ids.0, arr2(&[[4, 5, unk, unk]]));
    }

    #[test]
    fn test_process_x_partitions() {
        let processor = processor();
        let (x, _) = corpus();
        let valid = sentences(&[&["cats", "love", "I", "too", "much"]]);
        let outputs = processor
            .process_x_dataset(&[&x, &valid], Some(&[2, 6]), None)
            .unwrap()
            .into_vec();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, arr2(&[[4, 5], [4, 5]]));
        assert_eq!(outputs[1].0, arr2(&[[7, 5, 4, 1, 1, 0]]));
    }

    #[test]
    fn test_process_x_recommended_lens() {
        let processor = processor();
        let x = sentences(&[&["I"], &["I", "love", "NLP", "and", "cats"]]);

        // the recommended length of the analyzed partition
        let token_ids = processor.process_x_dataset(&[&x], None, None).unwrap().single().unwrap();
        assert_eq!(token_ids.dim(), (2, 3));

        // no recommendation for a second partition, so its own lengths are used
        let outputs = processor
            .process_x_dataset(&[&x, &x], None, None)
            .unwrap()
            .into_vec();
        assert_eq!(outputs[0].dim(), (2, 3));
        assert_eq!(outputs[1].dim(), (2, 5));
    }

    #[test]
    fn test_process_x_subset() {
        let processor = processor();
        let (x, _) = corpus();
        let token_ids = processor
            .process_x_dataset(&[&x], Some(&[3]), Some(&[1]))
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(token_ids.0, arr2(&[[4, 5, 7]]));

        assert!(matches!(
            processor.process_x_dataset(&[&x], Some(&[3]), Some(&[0, 2])).unwrap_err(),
            ProcessorError::Subset { index: 2, len: 2 },
        ));
    }

    #[test]
    fn test_process_x_maxlens_mismatch() {
        let processor = processor();
        let (x, _) = corpus();
        assert!(matches!(
            processor.process_x_dataset(&[&x, &x], Some(&[3]), None).unwrap_err(),
            ProcessorError::MaxLens {
                expected: 2,
                actual: 1,
            },
        ));
        assert!(matches!(
            processor.process_x_dataset(&[&x], Some(&[3, 3]), None).unwrap_err(),
            ProcessorError::MaxLens {
                expected: 1,
                actual: 2,
            },
        ));
    }

    #[test]
    fn test_process_x_without_vocab() {
        let (x, _) = corpus();
        assert!(matches!(
            LabelingProcessor::new().process_x_dataset(&[&x], None, None).unwrap_err(),
            ProcessorError::MissingTokenVocab,
        ));
    }

    #[test]
    fn test_process_y() {
        let processor = processor();
        let y = sentences(&[&["O", "O", "B"]]);
        let labels = processor
            .process_y_dataset(&[&y], Some(&[5]), None)
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(labels.shape(), [1, 5, 3]);
        assert_eq!(
            labels.0,
            arr3(&[[
                [0., 1., 0.],
                [0., 1., 0.],
                [0., 0., 1.],
                [1., 0., 0.],
                [1., 0., 0.],
            ]]),
        );
    }

    #[test]
    fn test_process_y_unknown_label() {
        let processor = processor();
        let y = sentences(&[&["O", "B-LOC", "B"]]);
        assert!(matches!(
            processor.process_y_dataset(&[&y], Some(&[5]), None).unwrap_err(),
            ProcessorError::Numerizer(NumerizerError::UnknownLabel(label)) if label == "B-LOC",
        ));
    }

    #[test]
    fn test_reverse_numerize() {
        let processor = processor();
        let y = sentences(&[&["O", "O", "B"], &["B", "O"]]);
        let mut indices = processor.numerize_label_sequences(&y).unwrap();
        assert_eq!(indices, [vec![1, 1, 2], vec![2, 1]]);
        for sequence in indices.iter_mut() {
            sequence.resize(5, 0);
        }

        let lengths = y.iter().map(Vec::len).collect::<Vec<_>>();
        assert_eq!(
            processor
                .reverse_numerize_label_sequences(&indices, Some(&lengths))
                .unwrap(),
            y,
        );
        assert_eq!(
            processor
                .reverse_numerize_label_sequences(&indices[1..], None)
                .unwrap(),
            [["B", "O", "<PAD>", "<PAD>", "<PAD>"]],
        );
    }

    #[test]
    fn test_reverse_numerize_errors() {
        let processor = processor();
        assert!(matches!(
            processor
                .reverse_numerize_label_sequences(&[vec![1], vec![2]], Some(&[1]))
                .unwrap_err(),
            ProcessorError::Lengths {
                expected: 2,
                actual: 1,
            },
        ));
        assert!(matches!(
            processor
                .reverse_numerize_label_sequences(&[vec![1, 3]], None)
                .unwrap_err(),
            ProcessorError::Numerizer(NumerizerError::UnknownIndex(3)),
        ));
    }

    #[test]
    fn test_save_load_cached() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let processor = processor();
        processor.save_dicts(dir.path())?;

        let loaded = LabelingProcessor::load_cached(dir.path())?;
        assert_eq!(loaded.state().token_vocab(), processor.state().token_vocab());
        assert_eq!(loaded.state().label_vocab(), processor.state().label_vocab());
        assert_eq!(loaded.state().dataset_info().token_count, 8);
        assert_eq!(loaded.state().dataset_info().label_count, 3);

        let x = sentences(&[&["I", "love", "NLP"]]);
        assert_eq!(
            loaded.process_x_dataset(&[&x], Some(&[5]), None)?,
            processor.process_x_dataset(&[&x], Some(&[5]), None)?,
        );

        Ok(())
    }

    #[test]
    fn test_load_cached_skips_building() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        processor().save_dicts(dir.path())?;

        let config = Config::new().with_cache_dir(dir.path());
        let mut processor = LabelingProcessor::from_config(config)?;
        let x = sentences(&[&["dogs", "bark"]]);
        let y = sentences(&[&["B", "O"]]);
        processor.prepare_dicts_if_need(&x, &y)?;

        assert_eq!(processor.state().token_vocab().unwrap().get("dogs"), None);
        assert_eq!(processor.state().token_vocab().unwrap().get("cats"), Some(7));

        Ok(())
    }

    #[test]
    fn test_load_is_atomic() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let mut processor = processor();
        processor.save_dicts(dir.path())?;
        std::fs::write(dir.path().join(TOKEN_VOCAB_FILE), "not json")?;

        let mut other = LabelingProcessor::new();
        assert!(other.load_dicts(dir.path()).is_err());
        assert!(other.state().token_vocab().is_none());
        assert!(other.state().label_vocab().is_none());

        let before = processor.state().token_vocab().cloned();
        assert!(processor.load_dicts(dir.path()).is_err());
        assert_eq!(processor.state().token_vocab().cloned(), before);

        Ok(())
    }

    #[test]
    fn test_load_misplaced_pad_token() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        processor().save_dicts(dir.path())?;
        std::fs::write(
            dir.path().join(TOKEN_VOCAB_FILE),
            r#"{"I": 0, "<UNK>": 1, "<BOS>": 2, "<EOS>": 3, "<PAD>": 4}"#,
        )?;

        match LabelingProcessor::load_cached(dir.path()).unwrap_err() {
            ProcessorError::ReservedMismatch {
                vocab,
                index,
                expected,
                actual,
            } => {
                assert_eq!(vocab, "token");
                assert_eq!(index, 0);
                assert_eq!(expected, "<PAD>");
                assert_eq!(actual.as_deref(), Some("I"));
            }
            error => panic!("unexpected error: {}", error),
        }

        Ok(())
    }

    #[test]
    fn test_load_misplaced_pad_label() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let mut processor = processor();
        processor.save_dicts(dir.path())?;
        std::fs::write(
            dir.path().join(LABEL_VOCAB_FILE),
            r#"{"O": 0, "B": 1, "<PAD>": 2}"#,
        )?;

        let tokens = processor.state().token_vocab().cloned();
        let labels = processor.state().label_vocab().cloned();
        assert!(matches!(
            processor.load_dicts(dir.path()).unwrap_err(),
            ProcessorError::ReservedMismatch {
                vocab: "label",
                index: 0,
                ..
            },
        ));
        assert_eq!(processor.state().token_vocab().cloned(), tokens);
        assert_eq!(processor.state().label_vocab().cloned(), labels);

        Ok(())
    }

    #[test]
    fn test_load_other_reserved_tokens() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        processor().save_dicts(dir.path())?;

        let config = Config::new()
            .with_reserved_tokens("[PAD]", "[UNK]", "[CLS]", "[SEP]")?
            .with_cache_dir(dir.path());
        assert!(matches!(
            LabelingProcessor::from_config(config).unwrap_err(),
            ProcessorError::ReservedMismatch {
                vocab: "token",
                index: 0,
                ..
            },
        ));

        // a cache built with the same reserved tokens loads fine
        let config = Config::new().with_reserved_tokens("[PAD]", "[UNK]", "[CLS]", "[SEP]")?;
        let mut custom = LabelingProcessor::from_config(config.clone())?;
        let (x, y) = corpus();
        custom.prepare_dicts_if_need(&x, &y)?;
        custom.save_dicts(dir.path())?;
        let loaded = LabelingProcessor::from_config(config.with_cache_dir(dir.path()))?;
        assert_eq!(loaded.state().token_vocab(), custom.state().token_vocab());

        Ok(())
    }

    #[test]
    fn test_save_without_vocab() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            LabelingProcessor::new().save_dicts(dir.path()).unwrap_err(),
            ProcessorError::MissingTokenVocab,
        ));
    }

    #[test]
    fn test_custom_reserved_tokens() -> Result<(), Box<dyn Error>> {
        let config = Config::new().with_reserved_tokens("[PAD]", "[UNK]", "[CLS]", "[SEP]")?;
        let mut processor = LabelingProcessor::from_config(config)?;
        let (x, y) = corpus();
        processor.prepare_dicts_if_need(&x, &y)?;

        assert_eq!(processor.state().token_vocab().unwrap().get("[UNK]"), Some(UNK_INDEX));
        assert_eq!(
            processor.state().label_vocab().unwrap().iter().next(),
            Some(("[PAD]", 0)),
        );

        Ok(())
    }

    #[test]
    fn test_send_sync() {
        fn is_send_sync<P: Send + Sync>(_: &P) {}
        is_send_sync(&processor());
    }

    #[test]
    fn test_dyn_processor() {
        let (x, _) = corpus();
        let processor: Box<dyn Processor> = Box::new(processor());
        assert_eq!(
            processor.numerize_token_sequences(&x).unwrap(),
            [vec![4, 5, 6], vec![4, 5, 7]],
        );
    }

    #[test]
    fn test_ner_corpus() -> Result<(), Box<dyn Error>> {
        let (train_x, train_y) = ner::train()?;
        let (valid_x, valid_y) = ner::valid()?;

        let mut processor = LabelingProcessor::new();
        processor.analyze_corpus(&[&train_x, &valid_x], &[&train_y, &valid_y])?;
        let info = processor.state().dataset_info().clone();
        assert_eq!(info.recommended_lens.len(), 2);

        let x = processor.process_x_dataset(&[&train_x, &valid_x], None, None)?.into_vec();
        let y = processor.process_y_dataset(&[&train_y, &valid_y], None, None)?.into_vec();
        for (partition, (x, y)) in x.iter().zip(y.iter()).enumerate() {
            let len = info.recommended_lens[partition];
            assert_eq!(x.dim().1, len);
            assert_eq!(y.shape()[1..], [len, info.label_count]);
            assert_eq!(x.dim().0, y.shape()[0]);
            // every position is one-hot, including the padding
            for position in y.lanes(Axis(2)) {
                assert_eq!(position.sum(), 1.);
            }
        }

        // the labels of each sample survive a round trip up to its padded length
        let indices = processor.numerize_label_sequences(&valid_y)?;
        let lengths = valid_y.iter().map(Vec::len).collect::<Vec<_>>();
        assert_eq!(
            processor.reverse_numerize_label_sequences(&indices, Some(&lengths))?,
            valid_y,
        );

        Ok(())
    }
}
