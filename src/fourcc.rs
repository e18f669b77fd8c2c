//! four-character codes used for format and chunk identifiers

use std::fmt;

/// a big-endian four-byte code ("lpcm", "aac ", "kuki", ...)
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(into = "String")]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// make a code from a 4-byte string literal
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCc(*code)
    }

    /// raw bytes, big-endian order
    pub fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// parse from a string, must be exactly 4 ASCII bytes
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii()) {
            return None;
        }
        Some(FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc(\"{}\")", self)
    }
}

impl From<FourCc> for String {
    fn from(code: FourCc) -> String {
        code.to_string()
    }
}
