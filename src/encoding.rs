//! Byte-encoding detection with a ranked fallback chain.
//!
//! Statements arrive as UTF-8 (with or without a byte-order mark) or in the
//! CP932 / Shift-JIS family. Detection produces a label with a confidence;
//! weak or wrong detections fall through to the fixed chain
//! `utf-8-sig → utf-8 → cp932`.

use crate::constants::ENCODING_CONFIDENCE_THRESHOLD;
use crate::error::{Result, SaisonError};
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use std::path::Path;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Candidate encodings understood by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// UTF-8 prefixed by a byte-order mark
    Utf8Bom,
    /// UTF-8 without a byte-order mark
    Utf8,
    /// Windows-31J, the WHATWG Shift_JIS decoder
    Cp932,
}

impl Codec {
    /// Fallback order applied when detection is not trusted
    pub const FALLBACK_CHAIN: [Codec; 3] = [Codec::Utf8Bom, Codec::Utf8, Codec::Cp932];

    pub fn label(&self) -> &'static str {
        match self {
            Codec::Utf8Bom => "utf-8-sig",
            Codec::Utf8 => "utf-8",
            Codec::Cp932 => "cp932",
        }
    }

    fn encoding(&self) -> &'static Encoding {
        match self {
            Codec::Utf8Bom | Codec::Utf8 => UTF_8,
            Codec::Cp932 => SHIFT_JIS,
        }
    }

    /// Strict decode: `None` on any malformed sequence or a missing BOM
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let payload = match self {
            Codec::Utf8Bom => bytes.strip_prefix(UTF8_BOM)?,
            Codec::Utf8 | Codec::Cp932 => bytes,
        };
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(payload)
            .map(|text| text.into_owned())
    }
}

/// Result of running the detector over raw bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub codec: Codec,
    pub confidence: f32,
}

/// Text decoded from a file along with the codec that succeeded
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub codec: Codec,
    pub detection: Detection,
}

/// Guess the encoding of `bytes`.
///
/// A byte-order mark is conclusive. Valid UTF-8 containing multi-byte
/// sequences is near-certain; pure ASCII decodes identically everywhere.
/// Bytes that only make sense as CP932 get a moderate score, and anything
/// else scores zero so the caller walks the fallback chain.
pub fn detect(bytes: &[u8]) -> Detection {
    if bytes.starts_with(UTF8_BOM) {
        return Detection {
            codec: Codec::Utf8Bom,
            confidence: 1.0,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        let confidence = if bytes.is_ascii() { 0.75 } else { 0.99 };
        return Detection {
            codec: Codec::Utf8,
            confidence,
        };
    }

    if Codec::Cp932.decode(bytes).is_some() {
        return Detection {
            codec: Codec::Cp932,
            confidence: cp932_confidence(bytes),
        };
    }

    Detection {
        codec: Codec::Utf8,
        confidence: 0.0,
    }
}

/// Share of non-ASCII bytes that sit in well-formed double-byte pairs.
fn cp932_confidence(bytes: &[u8]) -> f32 {
    let mut pairs = 0usize;
    let mut high = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            i += 1;
            continue;
        }
        high += 1;
        let lead = matches!(b, 0x81..=0x9F | 0xE0..=0xFC);
        if lead && i + 1 < bytes.len() {
            let trail = bytes[i + 1];
            if matches!(trail, 0x40..=0x7E | 0x80..=0xFC) {
                pairs += 1;
                high += 1;
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    if high == 0 {
        return 0.5;
    }
    (0.5 + 0.49 * (pairs * 2) as f32 / high as f32).min(0.99)
}

/// Decode raw bytes, trusting the detector only above the confidence threshold.
pub fn decode_bytes(bytes: &[u8], path: &Path) -> Result<DecodedText> {
    let detection = detect(bytes);
    debug!(
        "Detected {} ({:.2}) for {}",
        detection.codec.label(),
        detection.confidence,
        path.display()
    );

    if detection.confidence >= ENCODING_CONFIDENCE_THRESHOLD {
        if let Some(text) = detection.codec.decode(bytes) {
            return Ok(DecodedText {
                text,
                codec: detection.codec,
                detection,
            });
        }
        warn!(
            "Detected encoding {} failed to decode {}, using fallback chain",
            detection.codec.label(),
            path.display()
        );
    } else {
        debug!(
            "Low confidence ({:.2}) for {}, using fallback chain",
            detection.confidence,
            path.display()
        );
    }

    for codec in Codec::FALLBACK_CHAIN {
        if let Some(text) = codec.decode(bytes) {
            return Ok(DecodedText {
                text,
                codec,
                detection,
            });
        }
    }

    Err(SaisonError::Encoding {
        path: path.to_path_buf(),
        tried: Codec::FALLBACK_CHAIN
            .iter()
            .map(Codec::label)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Read a file and decode it with [`decode_bytes`].
pub fn read_decoded(path: &Path) -> Result<DecodedText> {
    let bytes = std::fs::read(path).map_err(|e| SaisonError::io(path, e))?;
    decode_bytes(&bytes, path)
}
