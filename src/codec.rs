//! Wire codec — pure encode/decode functions for the two framings the core
//! speaks, grounded on `src-tauri/src/runtime/lan/protocol.rs`'s
//! `encode_beacon`/`decode_beacon`/`encode_peer_message` shape.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Width of the ASCII decimal length prefix in front of every transfer
/// frame's metadata blob (spec §3 invariant).
pub const LENGTH_PREFIX_WIDTH: usize = 16;

/// Default cap on a single transfer frame's declared payload size.
pub const DEFAULT_MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024 * 1024;

// ── Discovery datagram ───────────────────────────────────────────────────

/// Advertised address of a candidate peer (spec §3 `PeerDescriptor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerDescriptor {
    pub ip: String,
    pub port: u16,
    pub name: String,
}

/// Encode a [`PeerDescriptor`] as the compact UTF-8 JSON discovery payload.
pub fn encode_discovery(peer: &PeerDescriptor) -> Vec<u8> {
    serde_json::to_vec(peer).expect("PeerDescriptor serialization is infallible")
}

/// Decode a discovery datagram, trimming trailing NUL bytes (datagram
/// buffers are over-provisioned per spec §4.1).
pub fn decode_discovery(bytes: &[u8]) -> Result<PeerDescriptor, CoreError> {
    let trimmed = trim_trailing_nuls(bytes);
    serde_json::from_slice(trimmed)
        .map_err(|e| CoreError::MalformedFrame(format!("BadDiscoveryJson: {e}")))
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

// ── Transfer frame ───────────────────────────────────────────────────────

/// Header for one file or directory entry in the transfer stream
/// (spec §3 `FileFrame`). Rust field names stay `snake_case`; the wire
/// keys are the lowerCamel names spec §4.1 mandates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFrame {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    #[serde(rename = "fullPath", default)]
    pub full_path: String,
}

/// Encode a [`FileFrame`] as its length-prefixed metadata blob: a
/// `LENGTH_PREFIX_WIDTH`-byte zero-padded ASCII decimal length followed by
/// the UTF-8 JSON body.
pub fn encode_frame_header(frame: &FileFrame) -> Vec<u8> {
    let json = serde_json::to_vec(frame).expect("FileFrame serialization is infallible");
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_WIDTH + json.len());
    buf.extend_from_slice(format!("{:0width$}", json.len(), width = LENGTH_PREFIX_WIDTH).as_bytes());
    buf.extend_from_slice(&json);
    buf
}

/// Parse a raw `LENGTH_PREFIX_WIDTH`-byte length prefix into the byte
/// length of the metadata blob that follows.
///
/// Rejects non-digit characters (after trimming whitespace), a zero
/// length, and any length exceeding `max_frame_bytes`.
pub fn decode_length_prefix(raw: &[u8; LENGTH_PREFIX_WIDTH], max_frame_bytes: u64) -> Result<u64, CoreError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| CoreError::MalformedFrame("length prefix is not valid UTF-8".into()))?
        .trim();

    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::MalformedFrame(format!(
            "length prefix is not ASCII decimal: {text:?}"
        )));
    }

    let len: u64 = text
        .parse()
        .map_err(|e| CoreError::MalformedFrame(format!("length prefix overflow: {e}")))?;

    if len == 0 {
        return Err(CoreError::MalformedFrame("length prefix is zero".into()));
    }
    if len > max_frame_bytes {
        return Err(CoreError::MalformedFrame(format!(
            "FrameTooLarge: {len} exceeds cap {max_frame_bytes}"
        )));
    }

    Ok(len)
}

/// Decode a [`FileFrame`] from its metadata blob (the bytes following the
/// length prefix, already of the declared length).
pub fn decode_frame_metadata(bytes: &[u8]) -> Result<FileFrame, CoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| CoreError::MalformedFrame(format!("bad FileFrame JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_roundtrip() {
        let peer = PeerDescriptor {
            ip: "10.0.0.7".into(),
            port: 8888,
            name: "beta".into(),
        };
        let bytes = encode_discovery(&peer);
        assert_eq!(decode_discovery(&bytes).unwrap(), peer);
    }

    #[test]
    fn discovery_trims_trailing_nuls() {
        let peer = PeerDescriptor {
            ip: "10.0.0.7".into(),
            port: 8888,
            name: "beta".into(),
        };
        let mut bytes = encode_discovery(&peer);
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(decode_discovery(&bytes).unwrap(), peer);
    }

    #[test]
    fn discovery_bad_json_is_rejected() {
        let err = decode_discovery(b"not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedFrame(_)));
    }

    #[test]
    fn frame_header_roundtrip() {
        let frame = FileFrame {
            file_name: "notes.txt".into(),
            file_type: "txt".into(),
            file_size: 1_048_576,
            is_dir: false,
            full_path: "notes.txt".into(),
        };
        let encoded = encode_frame_header(&frame);
        let mut prefix = [0u8; LENGTH_PREFIX_WIDTH];
        prefix.copy_from_slice(&encoded[..LENGTH_PREFIX_WIDTH]);
        let len = decode_length_prefix(&prefix, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let metadata = &encoded[LENGTH_PREFIX_WIDTH..LENGTH_PREFIX_WIDTH + len as usize];
        assert_eq!(decode_frame_metadata(metadata).unwrap(), frame);
    }

    #[test]
    fn frame_header_uses_lower_camel_wire_keys() {
        let frame = FileFrame {
            file_name: "a.txt".into(),
            file_type: "txt".into(),
            file_size: 3,
            is_dir: false,
            full_path: "docs/a.txt".into(),
        };
        let encoded = encode_frame_header(&frame);
        let json = std::str::from_utf8(&encoded[LENGTH_PREFIX_WIDTH..]).unwrap();
        for key in ["fileName", "fileType", "fileSize", "isDir", "fullPath"] {
            assert!(json.contains(key), "missing wire key {key} in {json}");
        }
    }

    #[test]
    fn length_prefix_rejects_zero() {
        let raw = *b"0000000000000000";
        assert!(decode_length_prefix(&raw, DEFAULT_MAX_FRAME_BYTES).is_err());
    }

    #[test]
    fn length_prefix_rejects_non_digits() {
        let raw = *b"000000000000abcd";
        assert!(decode_length_prefix(&raw, DEFAULT_MAX_FRAME_BYTES).is_err());
    }

    #[test]
    fn length_prefix_rejects_oversize() {
        let raw = *b"9999999999999999";
        assert!(decode_length_prefix(&raw, 1024).is_err());
    }

    #[test]
    fn missing_full_path_defaults_to_empty() {
        let json = br#"{"fileName":"x.txt","fileType":"txt","fileSize":1,"isDir":false}"#;
        let frame = decode_frame_metadata(json).unwrap();
        assert_eq!(frame.full_path, "");
    }
}
