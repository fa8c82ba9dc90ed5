#![forbid(unsafe_code)]

use docket_kernel_contracts::record::DomainRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes are not valid output of `encode` (bad hex, bad UTF-8 or bad
    /// JSON). Batch readers must skip-and-count, never abort.
    MalformedRecord { detail: String },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRecord { detail } => write!(f, "malformed record: {detail}"),
        }
    }
}

/// Encodes a domain record as lowercase hex over compact UTF-8 JSON, the
/// byte shape the chain stores for every stream item.
pub fn encode(record: &DomainRecord) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_vec(record).map_err(|e| CodecError::MalformedRecord {
        detail: format!("serialize: {e}"),
    })?;
    Ok(to_hex(&json).into_bytes())
}

/// Exact inverse of `encode`.
pub fn decode(bytes: &[u8]) -> Result<DomainRecord, CodecError> {
    let hex = std::str::from_utf8(bytes).map_err(|_| CodecError::MalformedRecord {
        detail: "payload is not utf-8".to_string(),
    })?;
    let json = from_hex(hex.trim())?;
    serde_json::from_slice(&json).map_err(|e| CodecError::MalformedRecord {
        detail: format!("deserialize: {e}"),
    })
}

pub fn to_hex(bytes: &[u8]) -> String {
    const TABLE: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(TABLE[usize::from(b >> 4)] as char);
        out.push(TABLE[usize::from(b & 0x0f)] as char);
    }
    out
}

pub fn from_hex(hex: &str) -> Result<Vec<u8>, CodecError> {
    if hex.len() % 2 != 0 {
        return Err(CodecError::MalformedRecord {
            detail: "odd-length hex payload".to_string(),
        });
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    let raw = hex.as_bytes();
    for pair in raw.chunks_exact(2) {
        let hi = nibble(pair[0])?;
        let lo = nibble(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn nibble(c: u8) -> Result<u8, CodecError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(CodecError::MalformedRecord {
            detail: "non-hex byte in payload".to_string(),
        }),
    }
}
