//! Response body normalisation.
//!
//! Some sites compress a body without saying so, or say so without doing it.
//! Decoding is driven by the Content-Encoding header but falls back to the raw
//! bytes whenever they already look like a document.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use log::debug;
use std::io::Read;

use crate::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Undo transport-level compression on `body`.
pub fn decode_body(content_encoding: Option<&str>, body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let encodings: Vec<String> = content_encoding
        .unwrap_or_default()
        .split(',')
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e != "identity")
        .collect();

    if encodings.is_empty() {
        if body.starts_with(&GZIP_MAGIC) {
            debug!("body is gzip without a Content-Encoding header");
            return gunzip(body);
        }
        return Ok(body.to_vec());
    }

    // encodings are listed in the order they were applied
    let mut data = body.to_vec();
    for encoding in encodings.iter().rev() {
        data = match encoding.as_str() {
            "gzip" | "x-gzip" => {
                if data.starts_with(&GZIP_MAGIC) {
                    gunzip(&data)?
                } else {
                    debug!("Content-Encoding gzip but body is not gzip, using raw bytes");
                    data
                }
            }
            "br" => match unbrotli(&data) {
                Ok(decoded) => decoded,
                Err(_) if looks_like_document(&data) => {
                    debug!("Content-Encoding br but body is plain, using raw bytes");
                    data
                }
                Err(e) => return Err(e),
            },
            "deflate" => match inflate(&data) {
                Ok(decoded) => decoded,
                Err(_) if looks_like_document(&data) => data,
                Err(e) => return Err(e),
            },
            other => {
                debug!("unknown Content-Encoding {}, using raw bytes", other);
                data
            }
        };
    }
    Ok(data)
}

/// Transcode `body` to UTF-8 using the declared charset, if any.
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> String {
    match declared_encoding(body, content_type) {
        Some(encoding) if encoding != UTF_8 => {
            let (text, _, _) = encoding.decode(body);
            text.into_owned()
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

/// True when `body` is UTF-16, by byte order mark or declared charset.
/// Such bodies legitimately contain NUL bytes.
pub fn is_utf16(body: &[u8], content_type: Option<&str>) -> bool {
    declared_encoding(body, content_type).is_some_and(|e| e == UTF_16LE || e == UTF_16BE)
}

// BOM, then Content-Type, then a meta tag in the first kilobyte
fn declared_encoding(body: &[u8], content_type: Option<&str>) -> Option<&'static Encoding> {
    Encoding::for_bom(body)
        .map(|(encoding, _)| encoding)
        .or_else(|| content_type.and_then(charset_from_content_type))
        .or_else(|| charset_from_meta(body))
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    read_all(MultiGzDecoder::new(body), "gzip")
}

fn unbrotli(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    read_all(brotli::Decompressor::new(body, 4096), "br")
}

fn inflate(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // "deflate" is zlib-wrapped per the RFC, but plenty of servers send raw deflate
    read_all(ZlibDecoder::new(body), "deflate").or_else(|_| read_all(DeflateDecoder::new(body), "deflate"))
}

fn read_all<R: Read>(mut reader: R, encoding: &str) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Decompress {
            encoding: encoding.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out)
}

fn looks_like_document(body: &[u8]) -> bool {
    let body = body.strip_prefix(&[0xef, 0xbb, 0xbf]).unwrap_or(body);
    matches!(
        body.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'<') | Some(b'{') | Some(b'[')
    )
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_ascii_lowercase();
    let label = lower
        .split("charset=")
        .nth(1)?
        .trim_start_matches(['"', '\''])
        .split(['"', '\'', ';', ',', ' '])
        .next()?;
    Encoding::for_label(label.as_bytes())
}

fn charset_from_meta(body: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&body[..body.len().min(1024)]).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label = head[start..]
        .trim_start_matches(['"', '\''])
        .split(['"', '\'', ';', ' ', '/', '>'])
        .next()?;
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const PAGE: &[u8] = b"<html><body><p>1 cup flour</p></body></html>";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli_compress(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            writer.write_all(data).unwrap();
        }
        out
    }

    #[test]
    fn test_plain_body_passes_through() {
        assert_eq!(decode_body(None, PAGE).unwrap(), PAGE);
        assert_eq!(decode_body(Some("identity"), PAGE).unwrap(), PAGE);
    }

    #[test]
    fn test_gzip_declared() {
        assert_eq!(decode_body(Some("gzip"), &gzip(PAGE)).unwrap(), PAGE);
    }

    #[test]
    fn test_gzip_undeclared_is_sniffed() {
        assert_eq!(decode_body(None, &gzip(PAGE)).unwrap(), PAGE);
    }

    #[test]
    fn test_gzip_declared_but_plain() {
        assert_eq!(decode_body(Some("gzip"), PAGE).unwrap(), PAGE);
    }

    #[test]
    fn test_brotli_declared() {
        assert_eq!(decode_body(Some("br"), &brotli_compress(PAGE)).unwrap(), PAGE);
    }

    #[test]
    fn test_brotli_declared_but_plain() {
        assert_eq!(decode_body(Some("br"), PAGE).unwrap(), PAGE);
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let mut data = gzip(PAGE);
        data.truncate(12);
        assert!(decode_body(Some("gzip"), &data).is_err());
    }

    #[test]
    fn test_decode_text_uses_declared_charset() {
        // "crème" in ISO-8859-1
        let latin1 = b"<p>cr\xe8me fra\xeeche</p>";
        assert_eq!(
            decode_text(latin1, Some("text/html; charset=ISO-8859-1")),
            "<p>crème fraîche</p>"
        );
        let with_meta = b"<meta charset=\"windows-1252\"><p>cr\xe8me</p>";
        assert!(decode_text(with_meta, None).contains("crème"));
    }

    #[test]
    fn test_utf16_detection() {
        let wide: Vec<u8> = "<p>egg</p>".encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert!(is_utf16(&wide, Some("text/html; charset=UTF-16BE")));
        assert!(!is_utf16(&wide, Some("text/html; charset=utf-8")));
        assert!(is_utf16(&[0xff, 0xfe, b'<', 0x00], None));
        assert_eq!(decode_text(&wide, Some("text/html; charset=utf-16be")), "<p>egg</p>");
    }

    #[test]
    fn test_decode_text_defaults_to_utf8() {
        assert_eq!(decode_text("<p>½ cup</p>".as_bytes(), None), "<p>½ cup</p>");
    }
}
