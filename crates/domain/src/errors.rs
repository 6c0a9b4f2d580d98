//! Domain-level error types.

/// Input that violates an entity's constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Field validation failed
    #[error("Field validation failed: {field} - {message}")]
    FieldValidation { field: String, message: String },

    /// Multiple validation errors
    #[error("Multiple validation errors: {}", .0.join("; "))]
    Multiple(Vec<String>),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FieldValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Human readable messages, one per failed rule
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::FieldValidation { field, message } => vec![format!("{field}: {message}")],
            Self::Multiple(messages) => messages.clone(),
        }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| {
                    let detail = failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| failure.code.to_string());
                    format!("{field}: {detail}")
                })
            })
            .collect();
        messages.sort();

        match messages.len() {
            1 => {
                let (field, message) = messages[0]
                    .split_once(": ")
                    .map(|(f, m)| (f.to_string(), m.to_string()))
                    .unwrap_or_default();
                Self::FieldValidation { field, message }
            }
            _ => Self::Multiple(messages),
        }
    }
}

/// Result type for domain validation
pub type ValidationResult<T> = Result<T, ValidationError>;
