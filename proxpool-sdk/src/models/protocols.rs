use std::{
    fmt::{Display, Formatter},
    ops::{BitAnd, BitOr, BitOrAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Flag set of the wire protocols a proxy endpoint speaks.
///
/// The empty set is a valid default and means "unspecified", not "supports
/// nothing".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct Protocols(u8);

impl Protocols {
    pub const NONE: Self = Self(0);
    pub const HTTP: Self = Self(1);
    pub const HTTPS: Self = Self(1 << 1);
    pub const SOCKS4: Self = Self(1 << 2);
    pub const SOCKS5: Self = Self(1 << 3);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::HTTP, "http"),
        (Self::HTTPS, "https"),
        (Self::SOCKS4, "socks4"),
        (Self::SOCKS5, "socks5"),
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses a comma separated list of flag names, e.g. `http,socks5`.
    /// Blank entries are skipped; an unknown name fails the whole list.
    pub fn parse_list(s: &str) -> Result<Self, Error> {
        let mut flags = Self::NONE;
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            flags |= part.parse::<Self>()?;
        }
        Ok(flags)
    }
}

impl BitOr for Protocols {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Protocols {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Protocols {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Display for Protocols {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Protocols {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::HTTP),
            "https" => Ok(Self::HTTPS),
            "socks4" => Ok(Self::SOCKS4),
            "socks5" => Ok(Self::SOCKS5),
            "none" | "" => Ok(Self::NONE),
            other => Err(Error::Validation(format!("unknown protocol: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Protocols;

    #[test]
    fn composition_and_test() {
        let combined = Protocols::HTTP | Protocols::HTTPS;
        assert_ne!(combined & Protocols::HTTPS, Protocols::NONE);
        assert_eq!(combined & Protocols::SOCKS4, Protocols::NONE);
    }

    #[test]
    fn none_is_identity() {
        for flag in [
            Protocols::HTTP,
            Protocols::HTTPS,
            Protocols::SOCKS4,
            Protocols::SOCKS5,
        ] {
            assert_eq!(Protocols::NONE | flag, flag);
        }
    }

    #[test]
    fn default_is_empty() {
        assert!(Protocols::default().is_empty());
        assert_eq!(Protocols::default(), Protocols::NONE);
    }

    #[test]
    fn parse_list_accumulates() {
        let flags = Protocols::parse_list("http, socks5").unwrap();
        assert!(flags.contains(Protocols::HTTP));
        assert!(flags.contains(Protocols::SOCKS5));
        assert!(!flags.contains(Protocols::HTTPS));
        assert!(Protocols::parse_list("http,ftp").is_err());
    }

    #[test]
    fn display_lists_flags() {
        assert_eq!(Protocols::NONE.to_string(), "none");
        assert_eq!((Protocols::HTTP | Protocols::SOCKS5).to_string(), "http|socks5");
    }
}
