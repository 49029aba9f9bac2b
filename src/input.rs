//! Input source abstraction for file and stdin.
//!
//! This module provides the [`Input`] enum for abstracting over the places an
//! eventalign table can come from, so `nanopolish eventalign | eventalign-collapse`
//! works the same as reading a file.
//!
//! # Example
//!
//! ```rust
//! use eventalign_collapse::input::Input;
//! use std::path::Path;
//!
//! // From a file path
//! let input = Input::from_path(Path::new("eventalign.tsv"));
//! assert!(matches!(input, Input::File(_)));
//!
//! // From stdin marker
//! let input = Input::from_path(Path::new("-"));
//! assert!(matches!(input, Input::Stdin));
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::error::{CollapseError, Result};

/// Buffered line source handed to the reader stage.
pub type LineSource = Box<dyn BufRead + Send>;

/// Input source for collapsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Input {
    /// Read from a file at the specified path.
    File(PathBuf),
    /// Read from standard input.
    #[default]
    Stdin,
}

impl Input {
    /// Creates an `Input` from a path.
    ///
    /// If the path is "-", returns [`Self::Stdin`].
    /// Otherwise, returns [`Self::File`] with the given path.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdin
        } else {
            Self::File(path.to_path_buf())
        }
    }

    /// Creates an `Input` from an optional path.
    ///
    /// If `None` or "-", returns [`Self::Stdin`].
    #[must_use]
    pub fn from_option(path: Option<&Path>) -> Self {
        path.map_or(Self::Stdin, Self::from_path)
    }

    /// Returns `true` if this input is stdin.
    #[must_use]
    pub const fn is_stdin(&self) -> bool {
        matches!(self, Self::Stdin)
    }

    /// Returns `true` if this input is a file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Returns the file path if this is a file input.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdin => None,
        }
    }

    /// Path used in error messages; `-` for stdin.
    pub(crate) fn display_path(&self) -> PathBuf {
        self.as_path().map_or_else(|| PathBuf::from("-"), Path::to_path_buf)
    }

    /// Checks that a file input exists and can be opened.
    pub(crate) fn check_readable(&self) -> Result<()> {
        if let Self::File(path) = self {
            File::open(path).map_err(|source| CollapseError::InputUnreadable {
                source,
                path: path.clone(),
            })?;
        }
        Ok(())
    }

    /// Opens the input as a buffered line source.
    ///
    /// With the `gzip` feature, files ending in `.gz` are decompressed on the fly.
    pub fn open(&self) -> Result<LineSource> {
        match self {
            Self::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            Self::File(path) => {
                let file = File::open(path).map_err(|source| CollapseError::InputUnreadable {
                    source,
                    path: path.clone(),
                })?;

                #[cfg(feature = "gzip")]
                if is_gzip_path(path) {
                    return Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file))));
                }

                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Check if a path has a gzip extension (.gz).
#[cfg(feature = "gzip")]
fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdin => write!(f, "<stdin>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_path_stdin() {
        let input = Input::from_path(Path::new("-"));
        assert!(input.is_stdin());
        assert!(!input.is_file());
        assert!(input.as_path().is_none());
        assert_eq!(input.display_path(), PathBuf::from("-"));
    }

    #[test]
    fn from_path_file() {
        let input = Input::from_path(Path::new("eventalign.tsv"));
        assert!(input.is_file());
        assert!(!input.is_stdin());
        assert_eq!(input.as_path(), Some(Path::new("eventalign.tsv")));
    }

    #[test]
    fn from_option_none() {
        let input = Input::from_option(None);
        assert!(input.is_stdin());
    }

    #[test]
    fn from_option_some_stdin() {
        let input = Input::from_option(Some(Path::new("-")));
        assert!(input.is_stdin());
    }

    #[test]
    fn display_stdin() {
        assert_eq!(Input::Stdin.to_string(), "<stdin>");
    }

    #[test]
    fn display_file() {
        let input = Input::File(PathBuf::from("eventalign.tsv"));
        assert_eq!(input.to_string(), "eventalign.tsv");
    }

    #[test]
    fn missing_file_is_unreadable() {
        let input = Input::from_path(Path::new("/nonexistent/eventalign.tsv"));
        assert!(matches!(
            input.check_readable(),
            Err(CollapseError::InputUnreadable { .. })
        ));
    }

    #[test]
    fn open_reads_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "contig\tposition").unwrap();
        let input = Input::from_path(file.path());
        let mut line = String::new();
        input.open().unwrap().read_line(&mut line).unwrap();
        assert_eq!(line, "contig\tposition\n");
    }
}
