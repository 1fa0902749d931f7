//! Pseudo-header extraction rules
//!
//! Request pseudo-headers are matched byte-exact as transmitted. The
//! method value is ASCII-decoded and upper-cased; the path is kept as raw
//! bytes so percent-encoding survives untouched.

use crate::error::{MuxError, Result};
use crate::events::Header;
use bytes::Bytes;

/// Pull `:method` and `:path` out of a request header block
///
/// Fails fast when either pseudo-header is absent or the method is not
/// valid ASCII.
pub fn extract_method_and_path(headers: &[Header]) -> Result<(String, Bytes)> {
    let mut method = None;
    let mut raw_path = None;

    for (name, value) in headers {
        match name.as_ref() {
            b":method" => {
                let decoded = std::str::from_utf8(value)
                    .ok()
                    .filter(|s| s.is_ascii())
                    .ok_or_else(|| MuxError::Protocol("non-ASCII :method value".to_string()))?;
                method = Some(decoded.to_ascii_uppercase());
            }
            b":path" => raw_path = Some(value.clone()),
            _ => {}
        }
    }

    let method = method.ok_or(MuxError::MissingPseudoHeader(":method"))?;
    let raw_path = raw_path.ok_or(MuxError::MissingPseudoHeader(":path"))?;
    Ok((method, raw_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &'static [u8], value: &'static [u8]) -> Header {
        (Bytes::from_static(name), Bytes::from_static(value))
    }

    #[test]
    fn test_extract_basic_request() {
        let headers = vec![
            header(b":method", b"get"),
            header(b":path", b"/a%20b?x=1"),
            header(b"host", b"example.com"),
        ];
        let (method, raw_path) = extract_method_and_path(&headers).unwrap();
        assert_eq!(method, "GET");
        assert_eq!(raw_path, Bytes::from_static(b"/a%20b?x=1"));
    }

    #[test]
    fn test_missing_method_fails() {
        let headers = vec![header(b":path", b"/")];
        match extract_method_and_path(&headers) {
            Err(MuxError::MissingPseudoHeader(":method")) => {}
            other => panic!("Expected missing :method, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_path_fails() {
        let headers = vec![header(b":method", b"POST")];
        match extract_method_and_path(&headers) {
            Err(MuxError::MissingPseudoHeader(":path")) => {}
            other => panic!("Expected missing :path, got {:?}", other),
        }
    }

    #[test]
    fn test_pseudo_header_names_are_case_sensitive() {
        let headers = vec![header(b":METHOD", b"GET"), header(b":path", b"/")];
        assert!(extract_method_and_path(&headers).is_err());
    }

    #[test]
    fn test_non_ascii_method_rejected() {
        let headers = vec![header(b":method", b"G\xc3\x89T"), header(b":path", b"/")];
        assert!(extract_method_and_path(&headers).is_err());
    }
}
