/// Upper bound on the byte length of a [`NonEmptyText`] value.
pub const MAX_TEXT_LEN: usize = 2_048;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,
    /// The trimmed input exceeded [`MAX_TEXT_LEN`] bytes
    #[error("text exceeds {MAX_TEXT_LEN} bytes")]
    TooLong,
    /// The input contained a control character other than newline or tab
    #[error("text contains control characters")]
    ControlCharacter,
}

/// A trimmed string that always has content.
///
/// Used for organization and user names, vehicle call signs, crew role labels and trip notes.
/// Construction trims surrounding whitespace and rejects empty, oversized or control-laden input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// - [`TextError::Empty`] if the trimmed input is empty
    /// - [`TextError::TooLong`] if it is longer than [`MAX_TEXT_LEN`] bytes
    /// - [`TextError::ControlCharacter`] if it contains control characters besides `\n`/`\t`
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > MAX_TEXT_LEN {
            return Err(TextError::TooLong);
        }
        if trimmed
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t')
        {
            return Err(TextError::ControlCharacter);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_content() {
        let text = NonEmptyText::new("  Unit 7  ").expect("valid text");
        assert_eq!(text.as_str(), "Unit 7");
    }

    #[test]
    fn rejects_blank_oversized_and_control_input() {
        assert_eq!(NonEmptyText::new("   \n"), Err(TextError::Empty));
        assert_eq!(
            NonEmptyText::new("x".repeat(MAX_TEXT_LEN + 1)),
            Err(TextError::TooLong)
        );
        assert_eq!(
            NonEmptyText::new("bad\u{0007}bell"),
            Err(TextError::ControlCharacter)
        );
        assert!(NonEmptyText::new("line one\nline two").is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let err = serde_json::from_str::<NonEmptyText>("\"   \"");
        assert!(err.is_err());
        let ok: NonEmptyText = serde_json::from_str("\"Paramedic lead\"").expect("valid");
        assert_eq!(ok.as_str(), "Paramedic lead");
    }
}
