/// Creates an owned sentence from the tokens.
pub fn sentence(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| token.to_string()).collect()
}

/// Creates owned sentences from the tokens of each sentence.
pub fn sentences(sentences: &[&[&str]]) -> Vec<Vec<String>> {
    sentences.iter().map(|tokens| sentence(tokens)).collect()
}
