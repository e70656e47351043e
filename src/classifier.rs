// Single place that decides whether a provider failure means skip, retry or stop

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClassifierConfig;
use crate::providers::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// The offer itself is gone. Move to the next candidate, no delay.
    Skip,
    /// Availability moved under us. The same candidate may be asked again.
    RetrySame,
    /// Anything unrecognised. Stop.
    Fatal,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Skip => write!(f, "skip"),
            Classification::RetrySame => write!(f, "retry_same"),
            Classification::Fatal => write!(f, "fatal"),
        }
    }
}

// Places the provider has been seen to put an error code
const CODE_POINTERS: &[&str] = &[
    "/error/errorCode",
    "/details/error/errorCode",
    "/details/details/error/errorCode",
    "/response/data/error/errorCode",
    "/response/data/details/error/errorCode",
];

// Places holding either a message string or a list of message strings
const MESSAGE_POINTERS: &[&str] = &[
    "/error/errors",
    "/details/error/errors",
    "/response/data/error/errors",
    "/error/errorMessage",
    "/details/error/errorMessage",
    "/details/details/error/errorMessage",
    "/message",
];

#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    skip_codes: Vec<String>,
    availability_patterns: Vec<String>,
}

impl ErrorClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            skip_codes: config.skip_codes.clone(),
            availability_patterns: config
                .availability_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Skip codes win over availability messages; no recognised marker is fatal.
    pub fn classify(&self, error: &ProviderError) -> Classification {
        if error_codes(&error.payload)
            .iter()
            .any(|code| self.skip_codes.iter().any(|skip| skip == code))
        {
            return Classification::Skip;
        }

        if self.is_availability_error(error) {
            return Classification::RetrySame;
        }

        Classification::Fatal
    }

    pub fn is_availability_error(&self, error: &ProviderError) -> bool {
        let mut messages = error_messages(&error.payload);
        messages.push(error.message.clone());

        messages.iter().any(|message| {
            let message = message.to_lowercase();
            self.availability_patterns
                .iter()
                .any(|pattern| message.contains(pattern))
        })
    }
}

pub fn error_codes(payload: &Value) -> Vec<String> {
    CODE_POINTERS
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

pub fn error_messages(payload: &Value) -> Vec<String> {
    let mut messages = Vec::new();
    for value in MESSAGE_POINTERS
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
    {
        match value {
            Value::String(s) => messages.push(s.clone()),
            Value::Array(items) => messages.extend(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string)),
            ),
            _ => {}
        }
    }
    messages
}
