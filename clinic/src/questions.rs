//! Question bank: the static question lists a fresh event starts with.
//!
//! The bank is configuration data, loaded once at startup and handed to the
//! reducer through its environment. A JSON file has the same shape as the
//! question fields of a snapshot:
//!
//! ```json
//! {
//!   "round1Questions": [{ "title": "The Grade Averager", "content": "..." }],
//!   "round2Questions": []
//! }
//! ```

use crate::types::Question;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUNDLED: &str = include_str!("../questions/default.json");

/// Errors loading a question bank.
#[derive(Error, Debug)]
pub enum QuestionBankError {
    /// The file could not be read
    #[error("Failed to read question bank {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a question bank
    #[error("Invalid question bank: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankFile {
    #[serde(default)]
    round1_questions: Vec<Question>,
    #[serde(default)]
    round2_questions: Vec<Question>,
}

/// Question lists for both rounds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestionBank {
    round1: Vec<Question>,
    round2: Vec<Question>,
}

impl QuestionBank {
    /// Creates a bank from explicit lists
    #[must_use]
    pub const fn new(round1: Vec<Question>, round2: Vec<Question>) -> Self {
        Self { round1, round2 }
    }

    /// A bank with no questions
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// The bank shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionBankError::Parse`] if the bundled file is invalid.
    pub fn bundled() -> Result<Self, QuestionBankError> {
        Self::from_json(BUNDLED)
    }

    /// Parse a bank from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionBankError::Parse`] if the text is not a bank.
    pub fn from_json(json: &str) -> Result<Self, QuestionBankError> {
        let file: BankFile = serde_json::from_str(json)?;
        Ok(Self::new(file.round1_questions, file.round2_questions))
    }

    /// Load a bank from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionBankError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, QuestionBankError> {
        let json = std::fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `path` when given, otherwise use the bundled bank.
    ///
    /// # Errors
    ///
    /// Returns [`QuestionBankError`] if the chosen bank cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self, QuestionBankError> {
        let bank = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::bundled()?,
        };
        tracing::info!(
            source = %path.map_or_else(|| "bundled".into(), |p| p.display().to_string()),
            round1 = bank.round1.len(),
            round2 = bank.round2.len(),
            "Question bank loaded"
        );
        Ok(bank)
    }

    /// Round one questions
    #[must_use]
    pub fn round1(&self) -> &[Question] {
        &self.round1
    }

    /// Round two questions
    #[must_use]
    pub fn round2(&self) -> &[Question] {
        &self.round2
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bundled_bank_parses() {
        let bank = QuestionBank::bundled().unwrap();
        assert_eq!(bank.round1().len(), 15);
        assert_eq!(bank.round1()[0].title, "The Grade Averager");
        assert!(bank.round1().iter().all(|q| !q.content.is_empty()));
    }

    #[test]
    fn missing_rounds_default_to_empty() {
        let bank = QuestionBank::from_json(
            r#"{ "round2Questions": [{ "title": "T", "content": "C" }] }"#,
        )
        .unwrap();
        assert!(bank.round1().is_empty());
        assert_eq!(bank.round2(), &[Question::new("T", "C")]);
    }

    #[test]
    fn invalid_json_is_rejected() {
        let err = QuestionBank::from_json(r#"{ "round1Questions": "nope" }"#).unwrap_err();
        assert!(matches!(err, QuestionBankError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = QuestionBank::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, QuestionBankError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn load_reads_override_file() {
        let path = std::env::temp_dir().join(format!(
            "code-clinic-bank-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{ "round1Questions": [{ "title": "Only", "content": "One" }] }"#,
        )
        .unwrap();

        let bank = QuestionBank::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(bank.round1(), &[Question::new("Only", "One")]);
        assert!(bank.round2().is_empty());
    }
}
