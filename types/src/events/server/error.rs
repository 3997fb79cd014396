/// Error code the endpoint uses when a commit arrived with no buffered audio.
/// Treated as recoverable: the engine resumes listening without surfacing it.
pub const EMPTY_COMMIT_CODE: &str = "input_audio_buffer_commit_empty";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetails {
    code: Option<String>,
    message: String,
}

impl ErrorDetails {
    pub fn new(message: &str) -> Self {
        Self {
            code: None,
            message: message.to_string(),
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is the benign empty-commit rejection.
    pub fn is_empty_commit(&self) -> bool {
        self.code.as_deref() == Some(EMPTY_COMMIT_CODE)
    }
}
