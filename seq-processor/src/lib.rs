#![cfg_attr(doc, forbid(broken_intra_doc_links, private_intra_doc_links))]

//! Preprocessing of tokenized corpora for sequence labeling models.
//!
//! A processor analyzes the corpus partitions to build a token and a label vocabulary and to
//! recommend a sequence length per partition. Afterwards it turns the partitions into padded
//! token ids and one-hot encoded labels, and turns predicted label ids back into labels.
//!
//! ```
//! use seq_processor::{LabelingProcessor, Processor};
//!
//! let corpus = vec![
//!     vec!["I".to_string(), "love".to_string(), "NLP".to_string()],
//!     vec!["I".to_string(), "love".to_string(), "cats".to_string()],
//! ];
//! let labels = vec![
//!     vec!["O".to_string(), "O".to_string(), "B".to_string()],
//!     vec!["O".to_string(), "O".to_string(), "B".to_string()],
//! ];
//!
//! let mut processor = LabelingProcessor::new();
//! processor.prepare_dicts_if_need(&corpus, &labels)?;
//!
//! let token_ids = processor
//!     .process_x_dataset(&[&corpus[..1]], Some(&[5]), None)?
//!     .into_vec();
//! assert_eq!(token_ids[0].row(0).to_vec(), [4, 5, 6, 0, 0]);
//!
//! let one_hots = processor
//!     .process_y_dataset(&[&labels[..1]], Some(&[5]), None)?
//!     .into_vec();
//! assert_eq!(one_hots[0].shape(), [1, 5, 3]);
//! # Ok::<(), seq_processor::ProcessorError>(())
//! ```

mod config;
mod io;
mod labeling;
mod numerizer;
mod padding;
mod processor;
mod vocab;

pub use crate::{
    config::{Config, ConfigError, ReservedTokens},
    io::{PersistenceError, LABEL_VOCAB_FILE, TOKEN_VOCAB_FILE},
    labeling::LabelingProcessor,
    numerizer::NumerizerError,
    padding::{one_hot, recommended_len, Padding},
    processor::{
        DatasetInfo,
        LabelOneHots,
        Partitioned,
        Processor,
        ProcessorError,
        ProcessorState,
        Sentence,
        Task,
        TokenIds,
    },
    vocab::{Vocab, VocabError, BOS_INDEX, EOS_INDEX, PAD_INDEX, UNK_INDEX},
};
