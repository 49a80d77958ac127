use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use super::errors::{CharsetError, UnknownCharset};

use serde::{Deserialize, Serialize};

/// Byte substituted for characters a `Charset` cannot represent
pub const REPLACEMENT: u8 = b'?';

/// Turns text into the bytes handed to a sink
pub trait Encoder: Send + Sync {
    /// Encode `text`. This must accept any valid `str`.
    fn encode(&self, text: &str) -> Vec<u8>;
}

impl<F> Encoder for F
where
    F: Fn(&str) -> Vec<u8> + Send + Sync,
{
    fn encode(&self, text: &str) -> Vec<u8> {
        self(text)
    }
}

/// UTF-8 `Encoder`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Utf8;

impl Encoder for Utf8 {
    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }
}

/// ISO-8859-1 `Encoder`. Characters above `U+00FF` become [`REPLACEMENT`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Latin1;

impl Encoder for Latin1 {
    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT))
            .collect()
    }
}

/// Character sets that can be selected from configuration
///
/// # Example
/// ```
/// use iosink::text::Charset;
///
/// let charset: Charset = "latin1".parse().expect("unknown charset");
/// assert_eq!(charset, Charset::Latin1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    /// See [`Utf8`]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// See [`Latin1`]
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Utf8
    }
}

impl Encoder for Charset {
    fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => Utf8.encode(text),
            Charset::Latin1 => Latin1.encode(text),
        }
    }
}

impl FromStr for Charset {
    type Err = CharsetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Charset::Latin1),
            _ => UnknownCharset { name }.fail(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Charset::Utf8 => write!(f, "utf-8"),
            Charset::Latin1 => write!(f, "latin-1"),
        }
    }
}
