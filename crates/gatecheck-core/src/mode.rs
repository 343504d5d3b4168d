use std::fmt;
use std::str::FromStr;

use crate::errors::UsageError;

/// Schema revision under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    /// Baseline revision: golden artifacts plus the decision triple.
    M09,
    /// Contract v2: adds contract id, evidence, consumers, blockers, handoffs.
    M10,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::M09, Mode::M10];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::M09 => "m09",
            Mode::M10 => "m10",
        }
    }

    /// `<m09|m10>`, for usage lines.
    pub fn choices() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
        format!("<{}>", names.join("|"))
    }

    /// Parse an optional CLI token; absent or blank is a usage error.
    pub fn from_token(token: Option<&str>) -> Result<Self, UsageError> {
        match token.map(str::trim) {
            None | Some("") => Err(UsageError::MissingMode),
            Some(t) => t.parse(),
        }
    }
}

impl FromStr for Mode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == trimmed)
            .ok_or_else(|| UsageError::UnknownMode(trimmed.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("m09".parse::<Mode>().unwrap(), Mode::M09);
        assert_eq!(" m10 ".parse::<Mode>().unwrap(), Mode::M10);
    }

    #[test]
    fn mode_tokens_are_case_sensitive() {
        assert_eq!(
            "M09".parse::<Mode>(),
            Err(UsageError::UnknownMode("M09".into()))
        );
    }

    #[test]
    fn missing_token_is_usage_error() {
        assert_eq!(Mode::from_token(None), Err(UsageError::MissingMode));
        assert_eq!(Mode::from_token(Some("  ")), Err(UsageError::MissingMode));
    }

    #[test]
    fn choices_lists_every_mode() {
        assert_eq!(Mode::choices(), "<m09|m10>");
    }
}
