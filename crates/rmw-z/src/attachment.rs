// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-message attachment: sequence number, source timestamp, source GID.
//!
//! Every user payload and every RPC request/reply carries this record. The
//! wire layout is a fixed sequence of three key/value pairs, each key a
//! length-prefixed string, in exactly this order:
//!
//! ```text
//! "sequence_number"  -> i64, little-endian
//! "source_timestamp" -> i64, little-endian
//! "source_gid"       -> length-prefixed byte sequence, length == 16
//! ```
//!
//! The attachment is not a general-purpose map: the decoder rejects
//! missing, misordered or mistyped keys instead of tolerating them.

use crate::{Error, Result};

/// Size of a source GID in bytes.
pub const GID_SIZE: usize = 16;

const KEY_SEQUENCE_NUMBER: &str = "sequence_number";
const KEY_SOURCE_TIMESTAMP: &str = "source_timestamp";
const KEY_SOURCE_GID: &str = "source_gid";

/// Decoded attachment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    /// Per-publisher monotonically increasing sequence number.
    pub sequence_number: i64,
    /// Publisher-side timestamp, nanoseconds since the Unix epoch.
    pub source_timestamp: i64,
    /// GID of the publishing entity.
    pub source_gid: [u8; GID_SIZE],
}

impl Attachment {
    #[must_use]
    pub fn new(sequence_number: i64, source_timestamp: i64, source_gid: [u8; GID_SIZE]) -> Self {
        Self {
            sequence_number,
            source_timestamp,
            source_gid,
        }
    }

    /// Serialize to the wire layout. Always succeeds.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            3 * 4 + KEY_SEQUENCE_NUMBER.len() + KEY_SOURCE_TIMESTAMP.len() + KEY_SOURCE_GID.len()
                + 8
                + 8
                + 4
                + GID_SIZE,
        );
        put_str(&mut out, KEY_SEQUENCE_NUMBER);
        out.extend_from_slice(&self.sequence_number.to_le_bytes());
        put_str(&mut out, KEY_SOURCE_TIMESTAMP);
        out.extend_from_slice(&self.source_timestamp.to_le_bytes());
        put_str(&mut out, KEY_SOURCE_GID);
        out.extend_from_slice(&u32::try_from(GID_SIZE).unwrap_or(16).to_le_bytes());
        out.extend_from_slice(&self.source_gid);
        out
    }

    /// Parse the wire layout, rejecting any deviation from it.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };

        cursor.expect_key(KEY_SEQUENCE_NUMBER)?;
        let sequence_number = cursor.read_i64(KEY_SEQUENCE_NUMBER)?;

        cursor.expect_key(KEY_SOURCE_TIMESTAMP)?;
        let source_timestamp = cursor.read_i64(KEY_SOURCE_TIMESTAMP)?;

        cursor.expect_key(KEY_SOURCE_GID)?;
        let gid_bytes = cursor.read_sequence(KEY_SOURCE_GID)?;
        if gid_bytes.len() != GID_SIZE {
            return Err(Error::MalformedAttachment("source_gid length mismatch"));
        }
        let mut source_gid = [0u8; GID_SIZE];
        source_gid.copy_from_slice(gid_bytes);

        if cursor.pos != cursor.bytes.len() {
            return Err(Error::MalformedAttachment("trailing bytes"));
        }

        Ok(Self {
            sequence_number,
            source_timestamp,
            source_gid,
        })
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&u32::try_from(s.len()).unwrap_or(0).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(Error::MalformedAttachment(what))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_len(&mut self, what: &'static str) -> Result<usize> {
        let raw = self.take(4, what)?;
        let mut len = [0u8; 4];
        len.copy_from_slice(raw);
        Ok(u32::from_le_bytes(len) as usize)
    }

    fn expect_key(&mut self, key: &'static str) -> Result<()> {
        let len = self.read_len(key)?;
        let raw = self.take(len, key)?;
        if raw != key.as_bytes() {
            return Err(Error::MalformedAttachment(key));
        }
        Ok(())
    }

    fn read_i64(&mut self, what: &'static str) -> Result<i64> {
        let raw = self.take(8, what)?;
        let mut value = [0u8; 8];
        value.copy_from_slice(raw);
        Ok(i64::from_le_bytes(value))
    }

    fn read_sequence(&mut self, what: &'static str) -> Result<&'a [u8]> {
        let len = self.read_len(what)?;
        self.take(len, what)
    }
}
