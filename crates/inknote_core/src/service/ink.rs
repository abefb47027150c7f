//! Ink data seam to the stylus collaborator.
//!
//! The core never interprets stroke data. A codec turns the stored blob into
//! whatever the capture surface works with and back; the default codec keeps
//! the bytes exactly as stored.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// In-memory ink layer handed to and from the capture surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InkDrawing {
    data: Vec<u8>,
}

impl InkDrawing {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stored ink blob could not be turned into a drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InkDecodeError(pub String);

impl Display for InkDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid ink data: {}", self.0)
    }
}

impl Error for InkDecodeError {}

/// Converts between stored ink blobs and live drawings.
pub trait InkCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<InkDrawing, InkDecodeError>;
    fn encode(&self, drawing: &InkDrawing) -> Vec<u8>;
}

/// Byte-preserving codec used when the host supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueInkCodec;

impl InkCodec for OpaqueInkCodec {
    fn decode(&self, data: &[u8]) -> Result<InkDrawing, InkDecodeError> {
        Ok(InkDrawing::from_bytes(data))
    }

    fn encode(&self, drawing: &InkDrawing) -> Vec<u8> {
        drawing.as_bytes().to_vec()
    }
}
