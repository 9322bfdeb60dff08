//! Compression detection for index files.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;

use crate::error::ParseError;

pub const GZIP_MAGIC_BYTES: [u8; 2] = [0x1f, 0x8b];
pub const ZST_MAGIC_BYTES: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Wraps raw index bytes in a streaming decompressor.
///
/// The format is detected from magic bytes rather than the file extension.
/// Data matching neither format is passed through unchanged, which covers
/// repositories that publish uncompressed metadata.
pub fn decompress(data: Vec<u8>) -> Result<Box<dyn Read + Send>, ParseError> {
    if data.len() >= 4 && data[..4] == ZST_MAGIC_BYTES {
        let decoder = zstd::Decoder::new(Cursor::new(data)).map_err(ParseError::Decompress)?;
        return Ok(Box::new(decoder));
    }
    if data.len() >= 2 && data[..2] == GZIP_MAGIC_BYTES {
        return Ok(Box::new(GzDecoder::new(Cursor::new(data))));
    }
    Ok(Box::new(Cursor::new(data)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    const SAMPLE: &[u8] = b"<metadata packages=\"0\"></metadata>";

    fn read_all(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_gzip_detected() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE).unwrap();
        let compressed = encoder.finish().unwrap();

        let reader = decompress(compressed).unwrap();
        assert_eq!(read_all(reader), SAMPLE);
    }

    #[test]
    fn test_zstd_detected() {
        let compressed = zstd::encode_all(SAMPLE, 3).unwrap();
        let reader = decompress(compressed).unwrap();
        assert_eq!(read_all(reader), SAMPLE);
    }

    #[test]
    fn test_plain_passthrough() {
        let reader = decompress(SAMPLE.to_vec()).unwrap();
        assert_eq!(read_all(reader), SAMPLE);
    }
}
