//! Snapshot frame codec
//!
//! Layout: `[32-byte SHA-256 of the remainder][1-byte compression tag][body]`.
//! The checksum covers the tag and the body, so a flipped tag is detected the
//! same way as a flipped body byte.

use crate::errors::{Result, WireTunerError};
use crate::snapshot::digest::sha256;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const CHECKSUM_LEN: usize = 32;

/// Checksum plus compression tag
pub const FRAME_HEADER_LEN: usize = CHECKSUM_LEN + 1;

/// Compression applied to the frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    pub fn tag(&self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
        }
    }

    /// # Errors
    ///
    /// Returns `WireTunerError::UnknownCompressionTag` for tags this build
    /// does not know.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Gzip),
            other => Err(WireTunerError::UnknownCompressionTag { tag: other }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }

    fn compress(&self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(body.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(body).map_err(compression_error)?;
                encoder.finish().map_err(compression_error)
            }
        }
    }

    fn decompress(&self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(body.to_vec()),
            Compression::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(body)
                    .read_to_end(&mut out)
                    .map_err(compression_error)?;
                Ok(out)
            }
        }
    }
}

fn compression_error(err: std::io::Error) -> WireTunerError {
    WireTunerError::Compression {
        message: err.to_string(),
    }
}

/// Compress `state_bytes` and wrap them in a checksummed frame
///
/// # Errors
///
/// Returns `WireTunerError::Compression` if the encoder fails.
pub fn encode_frame(state_bytes: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let body = compression.compress(state_bytes)?;

    let mut remainder = Vec::with_capacity(body.len() + 1);
    remainder.push(compression.tag());
    remainder.extend_from_slice(&body);

    let mut frame = Vec::with_capacity(CHECKSUM_LEN + remainder.len());
    frame.extend_from_slice(&sha256(&remainder));
    frame.extend_from_slice(&remainder);
    Ok(frame)
}

/// Verify a frame's checksum and return the decompressed state bytes
///
/// The checksum is checked before anything else is interpreted.
///
/// # Errors
///
/// - `SnapshotFrameTruncated` if the frame cannot hold a header
/// - `SnapshotChecksumMismatch` if the stored checksum is wrong
/// - `UnknownCompressionTag` / `Compression` if the body cannot be unpacked
pub fn decode_frame(frame: &[u8]) -> Result<Vec<u8>> {
    let (compression, body) = verify_frame(frame)?;
    compression.decompress(body)
}

/// Check the frame checksum without decompressing
///
/// # Errors
///
/// Same as `decode_frame`, minus decompression failures.
pub fn verify_frame(frame: &[u8]) -> Result<(Compression, &[u8])> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(WireTunerError::SnapshotFrameTruncated { len: frame.len() });
    }

    let (stored, remainder) = frame.split_at(CHECKSUM_LEN);
    let computed = sha256(remainder);
    if stored != computed.as_slice() {
        return Err(WireTunerError::SnapshotChecksumMismatch {
            expected: hex::encode(stored),
            actual: hex::encode(computed),
        });
    }

    let compression = Compression::from_tag(remainder[0])?;
    Ok((compression, &remainder[1..]))
}

/// Whether bytes already form a valid frame
pub fn is_valid_frame(bytes: &[u8]) -> bool {
    verify_frame(bytes).is_ok()
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Wrap a pre-frame snapshot payload into a verified frame
///
/// Payloads that already form a valid frame are returned unchanged. Older
/// payloads were either raw gzip or raw serialized state; both are reframed
/// with `compression`.
///
/// # Errors
///
/// Returns `WireTunerError::Compression` if a gzip payload cannot be inflated.
pub fn frame_legacy_payload(payload: &[u8], compression: Compression) -> Result<Vec<u8>> {
    if is_valid_frame(payload) {
        return Ok(payload.to_vec());
    }
    let state_bytes = if payload.starts_with(&GZIP_MAGIC) {
        Compression::Gzip.decompress(payload)?
    } else {
        payload.to_vec()
    };
    encode_frame(&state_bytes, compression)
}
