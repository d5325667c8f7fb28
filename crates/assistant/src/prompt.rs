use serde::{Deserialize, Serialize};
use settings::constants::assistant::DEFAULT_MODEL;

const PREAMBLE: &str = "You are an AI assistant helping a developer. \
Be concise and use the following context to help the user:";

/// A file open in the editor, passed to the model as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    pub path: String,
    pub content: String,
}

impl OpenFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Body of a streaming generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    /// A streaming request for `question` with `files` as context.
    pub fn new(model: impl Into<String>, files: &[OpenFile], question: &str) -> Self {
        Self {
            model: model.into(),
            prompt: build_prompt(files, question),
            stream: true,
        }
    }

    /// Same as [`GenerateRequest::new`] with the default model.
    pub fn with_default_model(files: &[OpenFile], question: &str) -> Self {
        Self::new(DEFAULT_MODEL, files, question)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Every file as a `### File: <path>` heading followed by its content,
/// separated by blank lines.
pub fn format_context(files: &[OpenFile]) -> String {
    files
        .iter()
        .map(|file| format!("### File: {}\n{}", file.path, file.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(files: &[OpenFile], question: &str) -> String {
    format!(
        "{PREAMBLE}\n\n{}\n\nUser: {question}\nAssistant:",
        format_context(files)
    )
}
