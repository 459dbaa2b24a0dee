use std::{fs, path::Path, sync::Arc};

use crate::{errors::Error, Result};

/// Label the preamble expects in front of the user's word or phrase.
const USER_INPUT_LABEL: &str = "Слово/фраза: ";

/// Wrap raw user input into the prompt sent to the completion service.
pub fn build_user_input(word: &str) -> String {
    format!("{USER_INPUT_LABEL}{word}")
}

/// Instructional preamble sent with every completion request.
///
/// Loaded once at startup; cloning shares the same text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preamble(Arc<str>);

impl Preamble {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Read the preamble from `path`, trimmed. Missing or blank files are config errors.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read system prompt {}: {e}",
                path.display()
            ))
        })?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(Error::Config(format!(
                "system prompt {} is empty",
                path.display()
            )));
        }

        Ok(Self::new(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn shared(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn tmp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dicky-{name}-{}.txt", std::process::id()))
    }

    #[test]
    fn user_input_is_labelled() {
        assert_eq!(build_user_input("hello"), "Слово/фраза: hello");
    }

    #[test]
    fn preamble_is_trimmed_on_load() {
        let path = tmp_file("preamble-ok");
        fs::write(&path, "\n  You are a cat who translates words.  \n\n").unwrap();

        let p = Preamble::load(&path).unwrap();
        assert_eq!(p.as_str(), "You are a cat who translates words.");

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_preamble_is_a_config_error() {
        let err = Preamble::load(Path::new("/nonexistent/dicky/system_prompt.txt")).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("system_prompt.txt")));
    }

    #[test]
    fn blank_preamble_is_a_config_error() {
        let path = tmp_file("preamble-blank");
        fs::write(&path, "   \n\t").unwrap();

        let err = Preamble::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("empty")));

        let _ = fs::remove_file(&path);
    }
}
