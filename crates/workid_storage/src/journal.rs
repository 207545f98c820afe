//! Journal framing for the file backend.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "WJNL" (4) | length u32 LE (4) | CBOR payload (N) | crc32 LE (4) |
//! ```
//!
//! The CRC covers the payload only.
//!
//! ## Recovery Policy
//!
//! - **Truncated frame** at the end of the file (header, payload or CRC cut
//!   short) is a crash mid-write: replay stops cleanly at the last complete
//!   frame and the caller truncates the tail.
//! - **Bad magic**, **CRC mismatch** or an undecodable payload is corruption
//!   and is fatal. No heuristic repair is attempted.

use crate::error::{StorageError, StorageResult};
use crate::keyspace::Mutation;

/// Magic bytes starting every journal frame.
pub(crate) const JOURNAL_MAGIC: [u8; 4] = *b"WJNL";

const HEADER_LEN: usize = 8;
const CRC_LEN: usize = 4;

/// Encodes one mutation into a complete frame.
pub(crate) fn encode_frame(mutation: &Mutation) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(mutation, &mut payload)
        .map_err(|err| StorageError::Encoding(err.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StorageError::Encoding("journal entry exceeds 4 GiB".to_string()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    frame.extend_from_slice(&JOURNAL_MAGIC);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    Ok(frame)
}

/// Result of decoding a whole journal image.
#[derive(Debug)]
pub(crate) struct Replay {
    /// Mutations in journal order.
    pub mutations: Vec<Mutation>,
    /// Byte length of the valid prefix of the journal.
    pub valid_len: u64,
    /// True when trailing bytes were dropped as an incomplete frame.
    pub truncated_tail: bool,
}

/// Decodes every complete frame in `data`.
pub(crate) fn decode_all(data: &[u8]) -> StorageResult<Replay> {
    let mut mutations = Vec::new();
    let mut offset = 0usize;

    loop {
        let remaining = &data[offset..];
        if remaining.is_empty() {
            break;
        }
        if remaining.len() < HEADER_LEN {
            return Ok(truncated(mutations, offset));
        }
        if remaining[..4] != JOURNAL_MAGIC {
            return Err(StorageError::corrupted(format!(
                "bad journal magic at offset {offset}"
            )));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&remaining[4..8]);
        let length = u32::from_le_bytes(len_bytes) as usize;

        let frame_len = HEADER_LEN + length + CRC_LEN;
        if remaining.len() < frame_len {
            return Ok(truncated(mutations, offset));
        }

        let payload = &remaining[HEADER_LEN..HEADER_LEN + length];
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&remaining[HEADER_LEN + length..frame_len]);
        let expected = u32::from_le_bytes(crc_bytes);
        let actual = compute_crc32(payload);
        if expected != actual {
            return Err(StorageError::corrupted(format!(
                "journal checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}"
            )));
        }

        let mutation: Mutation = ciborium::from_reader(payload).map_err(|err| {
            StorageError::corrupted(format!("undecodable journal entry at offset {offset}: {err}"))
        })?;
        mutations.push(mutation);
        offset += frame_len;
    }

    Ok(Replay {
        mutations,
        valid_len: offset as u64,
        truncated_tail: false,
    })
}

fn truncated(mutations: Vec<Mutation>, offset: usize) -> Replay {
    Replay {
        mutations,
        valid_len: offset as u64,
        truncated_tail: true,
    }
}

/// Computes the CRC32 (IEEE polynomial) of `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
