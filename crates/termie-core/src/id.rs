//! Server-issued ids.
//!
//! The server sends member and message ids either as JSON numbers or as strings.
//! Both forms normalise to the same `Id`, so lookups never depend on the encoding a
//! particular event happened to use.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Equality, ordering and hashing use the textual form only; the wire form is kept so
/// the id goes back out exactly as the server sent it.
#[derive(Debug, Clone)]
pub struct Id {
    raw: String,
    numeric: bool,
}

impl Id {
    /// Id that serializes as a JSON string.
    pub fn new(raw: impl Into<String>) -> Self {
        Id {
            raw: raw.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric value, when the id is all digits.
    pub fn as_u64(&self) -> Option<u64> {
        self.raw.parse().ok()
    }

    /// True when the id travels as a JSON number.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<u64> for Id {
    fn from(v: u64) -> Self {
        Id {
            raw: v.to_string(),
            numeric: true,
        }
    }
}

impl From<&str> for Id {
    fn from(v: &str) -> Self {
        Id::new(v)
    }
}

impl From<String> for Id {
    fn from(v: String) -> Self {
        Id::new(v)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.as_u64() {
            Some(n) if self.numeric => s.serialize_u64(n),
            _ if self.numeric => match self.raw.parse::<i64>() {
                Ok(n) => s.serialize_i64(n),
                Err(_) => s.serialize_str(&self.raw),
            },
            _ => s.serialize_str(&self.raw),
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Unsigned(u64),
            Signed(i64),
            Float(f64),
            Text(String),
        }

        let number = |raw: String| Id { raw, numeric: true };
        match Raw::deserialize(d)? {
            Raw::Unsigned(n) => Ok(number(n.to_string())),
            Raw::Signed(n) => Ok(number(n.to_string())),
            Raw::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(number(format!("{f:.0}"))),
            Raw::Float(f) => Err(de::Error::custom(format!("non-integral id: {f}"))),
            Raw::Text(s) if s.is_empty() => Err(de::Error::custom("empty id")),
            Raw::Text(s) => Ok(Id::new(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn wire_form_survives_a_round_trip() {
        let text: Id = serde_json::from_str(r#""007""#).unwrap();
        assert_eq!(serde_json::to_string(&text).unwrap(), r#""007""#);

        let number: Id = serde_json::from_str("42").unwrap();
        assert_eq!(serde_json::to_string(&number).unwrap(), "42");

        let quoted: Id = serde_json::from_str(r#""42""#).unwrap();
        assert_eq!(serde_json::to_string(&quoted).unwrap(), r#""42""#);
        assert_eq!(quoted, number);
    }
}
