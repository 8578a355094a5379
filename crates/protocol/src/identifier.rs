use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hex digits in the address part of an identifier.
pub const ADDRESS_WIDTH: usize = 8;

/// Address-derived routine name such as `func_8001B3E4`.
///
/// An identifier is an opaque token: equality is exact text equality, so
/// `func_8001b3e4`, `func_8001B3E4` and `D_8001B3E4` are three different
/// identifiers even though they share a numeric address. Corrections never do
/// arithmetic on the address; they only substitute its leading digits or the
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Recognise `<prefix><8 hex digits>` where the prefix is an ASCII word
    /// ending in `_`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.is_ascii() || text.len() <= ADDRESS_WIDTH + 1 {
            return None;
        }
        let (prefix, address) = text.split_at(text.len() - ADDRESS_WIDTH);
        if !is_valid_prefix(prefix) || !address.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Textual prefix including the trailing `_`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..self.0.len() - ADDRESS_WIDTH]
    }

    /// The fixed-width hex address exactly as spelled.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.0[self.0.len() - ADDRESS_WIDTH..]
    }

    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.prefix() == prefix
    }

    /// Same address under a different prefix. Returns `None` when the prefix
    /// is not a valid identifier prefix.
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Option<Self> {
        if !is_valid_prefix(prefix) {
            return None;
        }
        Some(Self(format!("{prefix}{}", self.address())))
    }

    /// Replace the leading `high.len()` digits of the address with `high`.
    ///
    /// Returns `None` when `high` is empty, longer than the address or not
    /// hex.
    #[must_use]
    pub fn with_address_high_bits(&self, high: &str) -> Option<Self> {
        if high.is_empty()
            || high.len() > ADDRESS_WIDTH
            || !high.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return None;
        }
        let low = &self.address()[high.len()..];
        Some(Self(format!("{}{high}{low}", self.prefix())))
    }

    /// True when the address starts with `high` (exact text match).
    #[must_use]
    pub fn address_starts_with(&self, high: &str) -> bool {
        self.address().starts_with(high)
    }
}

/// Prefix shape: ASCII letter, then letters/digits, ending in a single `_`.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    let Some(body) = prefix.strip_suffix('_') else {
        return false;
    };
    let mut chars = body.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| anyhow::anyhow!("not an identifier: {s:?}"))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn parses_prefix_and_address() {
        let id = Identifier::parse("func_8001B3E4").expect("identifier");
        assert_eq!(id.prefix(), "func_");
        assert_eq!(id.address(), "8001B3E4");
        assert!(id.has_prefix("func_"));
        assert!(!id.has_prefix("D_"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for text in [
            "",
            "func_",
            "func_8001B3E",
            "func_8001B3E4X",
            "func8001B3E4",
            "_8001B3E4",
            "Cd_read_comb",
            "func_8001G3E4",
            "1x_8001B3E4",
        ] {
            assert!(Identifier::parse(text).is_none(), "{text} should not parse");
        }
    }

    #[test]
    fn equality_is_textual() {
        let upper = Identifier::parse("func_8001B3E4").unwrap();
        let lower = Identifier::parse("func_8001b3e4").unwrap();
        let alias = Identifier::parse("D_8001B3E4").unwrap();
        assert_ne!(upper, lower);
        assert_ne!(upper, alias);
        assert_eq!(alias.with_prefix("func_"), Some(upper));
    }

    #[test]
    fn high_bits_substitution_keeps_low_offset() {
        let id = Identifier::parse("ROUTINE_80011234").unwrap();
        let shifted = id.with_address_high_bits("8003").unwrap();
        assert_eq!(shifted.as_str(), "ROUTINE_80031234");
        assert!(id.address_starts_with("8001"));
        assert!(id.with_address_high_bits("").is_none());
        assert!(id.with_address_high_bits("8003XYZ").is_none());
        assert!(id.with_address_high_bits("800312345").is_none());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = Identifier::parse("func_80013420").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"func_80013420\"");
    }

    proptest! {
        #[test]
        fn proptest_parse_accepts_every_canonical_token(
            prefix in "[A-Za-z][A-Za-z0-9]{0,8}_",
            address in "[0-9A-F]{8}",
        ) {
            let text = format!("{prefix}{address}");
            let id = Identifier::parse(&text).expect("identifier");
            prop_assert_eq!(id.prefix(), prefix.as_str());
            prop_assert_eq!(id.address(), address.as_str());
            prop_assert_eq!(id.to_string(), text);
        }
    }
}
