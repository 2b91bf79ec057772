//! Module name → object file mapping.
//!
//! Separators are escaped instead of dropped, so `lexer/token` and
//! `lexer_token` land on different files:
//!
//! | input          | output   |
//! |----------------|----------|
//! | `A-Z a-z 0-9 . -` | unchanged |
//! | `_`            | `__`     |
//! | `/`            | `_s`     |
//! | `\`            | `_b`     |
//! | any other byte | `_xHH`   |

use std::path::{Path, PathBuf};

pub const OBJECT_EXT: &str = "o";

pub fn escape(module: &str) -> String {
    let mut out = String::with_capacity(module.len() + 8);
    for b in module.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => out.push(b as char),
            b'_' => out.push_str("__"),
            b'/' => out.push_str("_s"),
            b'\\' => out.push_str("_b"),
            other => out.push_str(&format!("_x{:02x}", other)),
        }
    }
    out
}

pub fn unescape(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                match *bytes.get(i + 1)? {
                    b'_' => out.push(b'_'),
                    b's' => out.push(b'/'),
                    b'b' => out.push(b'\\'),
                    b'x' => {
                        let hex = stem.get(i + 2..i + 4)?;
                        let byte = u8::from_str_radix(hex, 16).ok()?;
                        // Only bytes escape() would have hex-encoded.
                        if escape_is_plain(byte) || matches!(byte, b'_' | b'/' | b'\\') {
                            return None;
                        }
                        if hex.bytes().any(|c| c.is_ascii_uppercase()) {
                            return None;
                        }
                        out.push(byte);
                        i += 2;
                    }
                    _ => return None,
                }
                i += 2;
            }
            b if escape_is_plain(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

fn escape_is_plain(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-'
}

/// Object path of `module`, relative to the project root.
pub fn name_for(obj_dir: &Path, module: &str) -> PathBuf {
    obj_dir.join(format!("{}.{}", escape(module), OBJECT_EXT))
}

/// Reverse of [`name_for`]; `clean` uses it to name the modules whose
/// leftover objects it removes. Takes a path or a bare file name.
pub fn module_for(artifact: &Path) -> Option<String> {
    if artifact.extension()? != OBJECT_EXT {
        return None;
    }
    unescape(artifact.file_stem()?.to_str()?)
}
