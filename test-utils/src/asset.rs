use std::{
    io::{Error, ErrorKind, Result},
    path::{Path, PathBuf},
};

pub const DATA_DIR: &str = "data";

/// Gets the workspace directory, which contains the manifest directory of this crate.
fn workspace_dir() -> Result<&'static Path> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "missing cargo workspace dir"))
}

/// Resolves the path to a file in a subdirectory of the workspace data directory.
pub fn resolve_data(dir: &str, file: &str) -> Result<PathBuf> {
    workspace_dir()?
        .join(DATA_DIR)
        .join(dir)
        .join(file)
        .canonicalize()
}
