use std::fmt;

use crate::protocol::ParseError;

/// Protocol versions the engine speaks.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Converts the minor version reported by `httparse`.
impl TryFrom<u8> for Version {
    type Error = ParseError;

    fn try_from(minor: u8) -> Result<Self, Self::Error> {
        match minor {
            0 => Ok(Version::Http10),
            1 => Ok(Version::Http11),
            v => Err(ParseError::InvalidVersion(Some(v))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
