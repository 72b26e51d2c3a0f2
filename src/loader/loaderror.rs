use std::{error::Error, fmt::Display, path::PathBuf};

/// A problem reading a module off disk: distinct from the diagnostic sink
/// because it is a plumbing failure (missing file, I/O error), not a
/// language-level one.
#[derive(Debug)]
pub struct FileLoadError {
    pub message: String,
    pub path: PathBuf,
}

impl Display for FileLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.path.display())
    }
}

impl Error for FileLoadError {}
