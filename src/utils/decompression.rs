use std::io::Read;

use bytes::Bytes;

/// Compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Magic byte detection and decompression for feed payloads
///
/// Some hosts serve `feed.xml.gz` style payloads without a `Content-Encoding`
/// header, so reqwest hands us the compressed bytes verbatim.
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        if data.starts_with(&GZIP_MAGIC) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Uncompressed
        }
    }

    /// Decompress `data` if it carries a known magic prefix, never growing past `max_size`
    pub fn decompress(data: Bytes, max_size: usize) -> Result<Vec<u8>, String> {
        match Self::detect_compression_format(&data) {
            CompressionFormat::Gzip => Self::decompress_gzip(data, max_size),
            CompressionFormat::Uncompressed => Ok(data.to_vec()),
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(data: Bytes, max_size: usize) -> Result<Vec<u8>, String> {
        let decoder = flate2::read::GzDecoder::new(data.as_ref());
        let mut decompressed = Vec::new();
        // One byte past the cap tells us the payload was truncated
        decoder
            .take(max_size as u64 + 1)
            .read_to_end(&mut decompressed)
            .map_err(|e| format!("Failed to decompress gzip data: {e}"))?;
        if decompressed.len() > max_size {
            return Err(format!(
                "Decompressed payload exceeds {max_size} bytes"
            ));
        }
        Ok(decompressed)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(_data: Bytes, _max_size: usize) -> Result<Vec<u8>, String> {
        Err("Gzip payload received but gzip support is not compiled in".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_plain_xml() {
        assert_eq!(
            DecompressionService::detect_compression_format(b"<?xml version=\"1.0\"?>"),
            CompressionFormat::Uncompressed
        );
        assert_eq!(
            DecompressionService::detect_compression_format(b""),
            CompressionFormat::Uncompressed
        );
    }

    #[cfg(feature = "compression-gzip")]
    fn gzip(data: &[u8]) -> Vec<u8> {
        use flate2::{Compression, write::GzEncoder};
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_roundtrip_and_cap() {
        let body = b"<rss><channel><title>Show</title></channel></rss>";
        let compressed = gzip(body);
        assert_eq!(
            DecompressionService::detect_compression_format(&compressed),
            CompressionFormat::Gzip
        );

        let out = DecompressionService::decompress(Bytes::from(compressed.clone()), 1024).unwrap();
        assert_eq!(out, body);

        assert!(DecompressionService::decompress(Bytes::from(compressed), 10).is_err());
    }

    #[test]
    fn test_plain_payload_passes_through() {
        let out = DecompressionService::decompress(Bytes::from_static(b"<rss/>"), 1024).unwrap();
        assert_eq!(out, b"<rss/>");
    }
}
