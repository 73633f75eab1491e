//! Length-prefixed, CRC32-checked record framing shared by every on-disk log
//! this crate writes (`len(4) ver(1) payload crc(4)`, per [`crate::record`]'s
//! layout diagram). Extracted so the outbox log can reuse the exact same
//! framing as the commit log instead of re-deriving it.

use crate::error::DurabilityError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

/// Current record format version (allows payload evolution independent of
/// the header).
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Encode `record` as `len(4) | format_version(1) | payload | crc32(4)` and
/// write it. Returns the number of bytes written.
pub fn write_record<W: Write, T: Serialize>(w: &mut W, record: &T) -> Result<u64, DurabilityError> {
    let payload = serde_json::to_vec(record)?;
    let mut body = Vec::with_capacity(1 + payload.len());
    body.push(RECORD_FORMAT_VERSION);
    body.extend_from_slice(&payload);

    let crc = crc32fast::hash(&body);

    w.write_u32::<LittleEndian>(body.len() as u32)?;
    w.write_all(&body)?;
    w.write_u32::<LittleEndian>(crc)?;
    Ok(4 + body.len() as u64 + 4)
}

/// Read one record at `offset`. Returns `None` at clean end-of-file.
pub fn read_record<R: Read, T: DeserializeOwned>(
    r: &mut R,
    offset: u64,
) -> Result<Option<(T, u64)>, DurabilityError> {
    let len = match r.read_u32::<LittleEndian>() {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body)
        .map_err(|_| DurabilityError::Truncated(offset))?;
    let stored_crc = r
        .read_u32::<LittleEndian>()
        .map_err(|_| DurabilityError::Truncated(offset))?;
    let computed_crc = crc32fast::hash(&body);
    if stored_crc != computed_crc {
        return Err(DurabilityError::CrcMismatch {
            offset,
            stored: stored_crc,
            computed: computed_crc,
        });
    }
    let payload = &body[1..]; // skip format_version byte
    let record: T = serde_json::from_slice(payload)?;
    let consumed = 4 + body.len() as u64 + 4;
    Ok(Some((record, consumed)))
}
