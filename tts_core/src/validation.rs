use crate::error::SynthesisError;

/// Default maximum text length (in characters) for a synthesis request
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Validate request text before it reaches the acoustic model
pub fn validate_text(text: &str, max_chars: usize) -> Result<(), SynthesisError> {
    if text.is_empty() {
        return Err(SynthesisError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.trim().is_empty() {
        return Err(SynthesisError::InvalidInput(
            "Text cannot be whitespace only".to_string(),
        ));
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(SynthesisError::InvalidInput(format!(
            "Text too long ({} characters, max {})",
            chars, max_chars
        )));
    }
    if text.contains('\0') {
        return Err(SynthesisError::InvalidInput(
            "Text cannot contain NUL characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text_valid() {
        assert!(validate_text("Hello", MAX_TEXT_LENGTH).is_ok());
        assert!(validate_text("  padded  ", MAX_TEXT_LENGTH).is_ok());
    }

    #[test]
    fn test_validate_text_empty() {
        let result = validate_text("", MAX_TEXT_LENGTH);
        if let Err(SynthesisError::InvalidInput(msg)) = result {
            assert!(msg.contains("empty"));
        } else {
            panic!("expected InvalidInput");
        }
    }

    #[test]
    fn test_validate_text_whitespace_only() {
        assert!(matches!(
            validate_text(" \n\t ", MAX_TEXT_LENGTH),
            Err(SynthesisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_text_too_long() {
        let long_text = "a".repeat(6000);
        let result = validate_text(&long_text, MAX_TEXT_LENGTH);
        if let Err(SynthesisError::InvalidInput(msg)) = result {
            assert!(msg.contains("too long"));
        } else {
            panic!("expected InvalidInput");
        }
    }

    #[test]
    fn test_validate_text_counts_chars_not_bytes() {
        // 4 characters, 12 bytes
        assert!(validate_text("日本語だ", 4).is_ok());
        assert!(validate_text("日本語だ", 3).is_err());
    }
}
