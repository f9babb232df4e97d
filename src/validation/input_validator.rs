use crate::api::middleware::AppError;
use crate::services::loader::FileKind;

/// Input validation for questions and uploaded file names
pub struct InputValidator;

impl InputValidator {
    /// Trim a question and reject it when nothing is left
    pub fn validate_question(question: &str) -> Result<String, AppError> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(AppError::EmptyQuestion);
        }
        Ok(trimmed.to_string())
    }

    /// Sanitize an upload's file name and check it has a supported extension
    pub fn validate_file_name(file_name: &str) -> Result<String, AppError> {
        let sanitized = Self::sanitize_file_name(file_name);
        if sanitized.is_empty() {
            return Err(AppError::Validation("File name cannot be empty".to_string()));
        }
        FileKind::from_file_name(&sanitized)?;
        Ok(sanitized)
    }

    /// Keep only the last path component and replace characters outside `[A-Za-z0-9._-]`
    pub fn sanitize_file_name(file_name: &str) -> String {
        let base = file_name
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or_default();

        let cleaned: String = base
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        cleaned.trim_start_matches('.').to_string()
    }
}
