use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a phone number so log output only shows its last four characters.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn masked(&self) -> String {
        let raw = self.0.as_ref();
        let count = raw.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }
        let visible: String = raw.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), visible)
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.masked())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Serialization is for storage and provider payloads, which need the real value.
        self.0.serialize(serializer)
    }
}

/// Shorthand for logging a phone number: `info!(phone = %mask(phone), ...)`.
pub fn mask(phone: &str) -> Masked<&str> {
    Masked(phone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_last_four_digits_are_shown() {
        assert_eq!(mask("919876543210").to_string(), "********3210");
        assert_eq!(format!("{:?}", mask("919876543210")), "\"********3210\"");
        assert_eq!(mask("123").to_string(), "***");
    }
}
