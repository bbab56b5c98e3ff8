//! Small helpers shared across services.

use crate::error::{GravityError, Result};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Random ASCII alphanumeric string of `length` characters.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hex digest of `data`.
///
/// Supported algorithms: `sha256`, `sha384`, `sha512`.
///
/// # Errors
///
/// Returns a bad request error for any other algorithm.
pub fn generate_hash(data: &str, algorithm: &str) -> Result<String> {
    let bytes = data.as_bytes();
    match algorithm.to_lowercase().as_str() {
        "sha256" => Ok(format!("{:x}", Sha256::digest(bytes))),
        "sha384" => Ok(format!("{:x}", Sha384::digest(bytes))),
        "sha512" => Ok(format!("{:x}", Sha512::digest(bytes))),
        other => Err(GravityError::bad_request(format!(
            "Unsupported hash algorithm: {other}"
        ))),
    }
}

/// Current UTC time.
#[must_use]
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Replace path separators, `..` and NUL with `_`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    ["/", "\\", "..", "\0"]
        .iter()
        .fold(filename.to_string(), |acc, bad| acc.replace(bad, "_"))
}

/// Form-encode `params`, skipping null values.
///
/// Strings are used verbatim; other values use their JSON text.
#[must_use]
pub fn dict_to_query_string(params: &Map<String, Value>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::String(s) => {
                serializer.append_pair(key, s);
            }
            other => {
                serializer.append_pair(key, &other.to_string());
            }
        }
    }
    serializer.finish()
}

/// Keep the first `visible_chars` characters and mask the rest with `*`.
///
/// Strings no longer than `visible_chars` are masked entirely.
#[must_use]
pub fn mask_sensitive_data(data: &str, visible_chars: usize) -> String {
    let len = data.chars().count();
    if len <= visible_chars {
        return "*".repeat(len);
    }
    let visible: String = data.chars().take(visible_chars).collect();
    visible + &"*".repeat(len - visible_chars)
}

/// Human readable size, e.g. `"1.5 MB"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} PB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_random_string() {
        let s = generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, generate_random_string(32));
    }

    #[test]
    fn test_generate_hash() {
        assert_eq!(
            generate_hash("abc", "sha256").unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(generate_hash("abc", "SHA512").unwrap().len(), 128);
        assert!(generate_hash("abc", "md4").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../etc/passwd"), "__etc_passwd");
        assert_eq!(sanitize_filename("a\\b\0c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_query_string() {
        let params = json!({"page": 2, "q": "rust lang", "skip": null});
        let query = dict_to_query_string(params.as_object().unwrap());
        assert_eq!(query, "page=2&q=rust+lang");
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("4111111111111111", 4), "4111************");
        assert_eq!(mask_sensitive_data("abc", 4), "***");
        assert_eq!(mask_sensitive_data("pässwort", 2), "pä******");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(u64::MAX), "16384.0 PB");
    }
}
