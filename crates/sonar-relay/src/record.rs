//! Binary reading records sent over UDP.
//!
//! A record carries a channel id and one `u64` value, little endian.
//!
//! ```text
//! Aligned (16 bytes):  | id | 0 0 0 0 0 0 0 | value (u64 LE) |
//! Packed   (9 bytes):  | id | value (u64 LE) |
//! ```
//!
//! `Aligned` matches a natural `{ u8, u64 }` struct layout on 64-bit
//! receivers and is the default.

use crate::{RelayError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sonar_core::ChannelId;

const ALIGNED_PADDING: usize = 7;

/// Wire layout of a [`ReadingRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLayout {
    #[default]
    Aligned,
    Packed,
}

impl RecordLayout {
    /// Encoded size in bytes.
    pub const fn len(self) -> usize {
        match self {
            RecordLayout::Aligned => 16,
            RecordLayout::Packed => 9,
        }
    }
}

/// What the value field of a record means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadUnit {
    /// Round-trip nanoseconds after dead-zone adjustment and clamping.
    #[default]
    AdjustedNanos,

    /// Whole centimetres.
    Centimeters,
}

/// One relayed reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingRecord {
    pub channel: ChannelId,
    pub value: u64,
}

impl ReadingRecord {
    pub fn new(channel: ChannelId, value: u64) -> Self {
        Self { channel, value }
    }

    /// Append the encoded record to `dst`.
    pub fn encode(&self, layout: RecordLayout, dst: &mut BytesMut) {
        dst.reserve(layout.len());
        dst.put_u8(self.channel.as_u8());
        if layout == RecordLayout::Aligned {
            dst.put_bytes(0, ALIGNED_PADDING);
        }
        dst.put_u64_le(self.value);
    }

    pub fn to_bytes(&self, layout: RecordLayout) -> Bytes {
        let mut buf = BytesMut::with_capacity(layout.len());
        self.encode(layout, &mut buf);
        buf.freeze()
    }

    /// Decode a record occupying all of `src`.
    ///
    /// # Errors
    ///
    /// - `RelayError::InvalidRecord` if `src` is not exactly one record long
    /// - `RelayError::Driver` if the channel id is out of range
    pub fn decode(layout: RecordLayout, mut src: &[u8]) -> Result<Self> {
        if src.len() != layout.len() {
            return Err(RelayError::InvalidRecord {
                expected: layout.len(),
                actual: src.len(),
            });
        }

        let channel = ChannelId::new(src.get_u8())?;
        if layout == RecordLayout::Aligned {
            src.advance(ALIGNED_PADDING);
        }
        let value = src.get_u64_le();
        Ok(Self { channel, value })
    }
}
