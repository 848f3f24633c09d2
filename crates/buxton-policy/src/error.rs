//! Errors raised while loading or watching the MAC rules file.

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt rules file at line {line}: {content:?}")]
    Corrupt { line: usize, content: String },

    #[error("failed to watch rules file: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
