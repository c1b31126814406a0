use std::{
    fs::File,
    io::{BufReader, Error, ErrorKind, Result},
};

use serde::Deserialize;
use serde_json::from_reader;

use crate::asset::resolve_data;

const DIR: &str = "ner";

/// A tokenized corpus partition with one label per token.
#[derive(Deserialize)]
struct Partition {
    tokens: Vec<Vec<String>>,
    labels: Vec<Vec<String>>,
}

fn read(file: &str) -> Result<(Vec<Vec<String>>, Vec<Vec<String>>)> {
    let reader = BufReader::new(File::open(resolve_data(DIR, file)?)?);
    from_reader::<_, Partition>(reader)
        .map(|partition| (partition.tokens, partition.labels))
        .map_err(|error| Error::new(ErrorKind::InvalidData, error.to_string()))
}

/// Reads the tokens and labels of the training partition.
pub fn train() -> Result<(Vec<Vec<String>>, Vec<Vec<String>>)> {
    read("train.json")
}

/// Reads the tokens and labels of the validation partition.
pub fn valid() -> Result<(Vec<Vec<String>>, Vec<Vec<String>>)> {
    read("valid.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions() {
        for (tokens, labels) in [train().unwrap(), valid().unwrap()].iter() {
            assert!(!tokens.is_empty());
            assert_eq!(tokens.len(), labels.len());
            for (tokens, labels) in tokens.iter().zip(labels) {
                assert_eq!(tokens.len(), labels.len());
            }
        }
    }
}
