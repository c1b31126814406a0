use std::{
    fs::{create_dir_all, File},
    io::{BufReader, BufWriter, Error as IoError, Write},
    path::{Path, PathBuf},
};

use displaydoc::Display;
use log::debug;
use thiserror::Error;

use crate::vocab::Vocab;

/// The file name of the persisted token vocabulary.
pub const TOKEN_VOCAB_FILE: &str = "token2idx.json";

/// The file name of the persisted label vocabulary.
pub const LABEL_VOCAB_FILE: &str = "label2idx.json";

/// The potential errors of persisting vocabularies.
#[derive(Debug, Display, Error)]
pub enum PersistenceError {
    /// Failed to access {path:?}: {source}
    Io { path: PathBuf, source: IoError },
    /// Failed to (de)serialize {path:?}: {source}
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Saves the token and label vocabularies into the directory.
///
/// The directory is created if it doesn't exist yet. Existing vocabularies are overwritten.
pub fn save_vocabs(dir: &Path, tokens: &Vocab, labels: &Vocab) -> Result<(), PersistenceError> {
    create_dir_all(dir).map_err(|source| PersistenceError::Io {
        path: dir.into(),
        source,
    })?;
    save_vocab(&dir.join(TOKEN_VOCAB_FILE), tokens)?;
    save_vocab(&dir.join(LABEL_VOCAB_FILE), labels)?;
    debug!(
        "saved {} tokens and {} labels to {:?}",
        tokens.len(),
        labels.len(),
        dir,
    );

    Ok(())
}

/// Loads the token and label vocabularies from the directory.
///
/// Either both vocabularies are loaded or none.
pub fn load_vocabs(dir: &Path) -> Result<(Vocab, Vocab), PersistenceError> {
    let tokens = load_vocab(&dir.join(TOKEN_VOCAB_FILE))?;
    let labels = load_vocab(&dir.join(LABEL_VOCAB_FILE))?;
    debug!(
        "loaded {} tokens and {} labels from {:?}",
        tokens.len(),
        labels.len(),
        dir,
    );

    Ok((tokens, labels))
}

fn save_vocab(path: &Path, vocab: &Vocab) -> Result<(), PersistenceError> {
    let io_error = |source| PersistenceError::Io {
        path: path.into(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    serde_json::to_writer_pretty(&mut writer, vocab).map_err(|source| {
        PersistenceError::Json {
            path: path.into(),
            source,
        }
    })?;
    writer.flush().map_err(io_error)
}

fn load_vocab(path: &Path) -> Result<Vocab, PersistenceError> {
    let reader = BufReader::new(File::open(path).map_err(|source| PersistenceError::Io {
        path: path.into(),
        source,
    })?);
    serde_json::from_reader(reader).map_err(|source| PersistenceError::Json {
        path: path.into(),
        source,
    })
}
