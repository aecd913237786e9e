//! Interned, UTF-8-sanitized strings and byte blobs (§4.2).
//!
//! Strings are deduplicated by `(length, content)` and returned as a
//! [`StringHandle`] — effectively a `(&str, &[u8])` pair the arena owns. The
//! raw bytes are always retrievable even when the sanitized text diverges
//! from them (REPLACE/UNDERSCORE/RAW policies).

use std::collections::HashMap;

use crate::arena::Arena;
use crate::error::{Error, ErrorKind, Result};
use crate::options::UnicodeErrorHandling;

/// An interned string: a sanitized `&str` view plus the original raw bytes.
#[derive(Clone, Copy, Debug)]
pub struct StringHandle<'a> {
    pub text: &'a str,
    pub raw: &'a [u8],
}

impl<'a> StringHandle<'a> {
    pub fn as_str(&self) -> &'a str {
        self.text
    }
}

impl<'a> PartialEq for StringHandle<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl<'a> Eq for StringHandle<'a> {}

impl<'a> std::hash::Hash for StringHandle<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state)
    }
}

/// Interner scoped to a single arena (typically the scene's result arena, so
/// interned strings live exactly as long as the scene does).
pub struct StringPool<'a> {
    arena: &'a Arena,
    // Keyed by the sanitized text so repeated identifiers such as "Lcl
    // Translation" intern once across an entire file.
    table: HashMap<String, StringHandle<'a>>,
}

impl<'a> StringPool<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        Self { arena, table: HashMap::new() }
    }

    /// Interns `bytes`, sanitizing according to `policy` if `sanitize` is
    /// set. Returns `OUT_OF_MEMORY` only if the arena is.
    pub fn intern(&mut self, bytes: &[u8], sanitize: bool, policy: UnicodeErrorHandling, warnings: &mut Vec<crate::error::Warning>) -> Result<StringHandle<'a>> {
        let sanitized = if sanitize {
            self.sanitize(bytes, policy, warnings)?
        } else {
            // Caller asserts `bytes` is already valid UTF-8 (e.g. ASCII
            // tokenizer output, which never admits invalid bytes into an
            // identifier).
            match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => self.sanitize(bytes, policy, warnings)?,
            }
        };
        if let Some(existing) = self.table.get(&sanitized) {
            return Ok(*existing);
        }
        let raw = self.arena.alloc_copy(bytes)?;
        let text = self.arena.alloc_copy(sanitized.as_bytes())?;
        // SAFETY: `text` was copied verbatim from a `String`, which is valid UTF-8.
        let text_str: &'a str = unsafe { std::str::from_utf8_unchecked(text) };
        let handle = StringHandle { text: text_str, raw };
        self.table.insert(sanitized, handle);
        Ok(handle)
    }

    fn sanitize(&self, bytes: &[u8], policy: UnicodeErrorHandling, warnings: &mut Vec<crate::error::Warning>) -> Result<String> {
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => match policy {
                UnicodeErrorHandling::Abort => Err(Error::new(ErrorKind::InvalidUtf8)),
                UnicodeErrorHandling::Raw => {
                    warnings.push(crate::error::Warning { kind: ErrorKind::InvalidUtf8, offset: None });
                    Ok(String::from_utf8_lossy(bytes).into_owned())
                }
                UnicodeErrorHandling::Replace => {
                    warnings.push(crate::error::Warning { kind: ErrorKind::InvalidUtf8, offset: None });
                    Ok(replace_invalid(bytes, '\u{FFFD}'))
                }
                UnicodeErrorHandling::Underscore => {
                    warnings.push(crate::error::Warning { kind: ErrorKind::InvalidUtf8, offset: None });
                    Ok(replace_invalid(bytes, '_'))
                }
            },
        }
    }
}

/// Walks `bytes`, copying valid UTF-8 runs verbatim and substituting `with`
/// for each byte that fails to decode.
fn replace_invalid(bytes: &[u8], with: char) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                break;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                out.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap());
                out.push(with);
                let skip = e.error_len().unwrap_or(1).max(1);
                rest = &rest[valid_up_to + skip..];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AllocatorOptions;

    #[test]
    fn interns_and_dedups() {
        let arena = Arena::new(AllocatorOptions::default());
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let a = pool.intern(b"Lcl Translation", false, UnicodeErrorHandling::Replace, &mut warnings).unwrap();
        let b = pool.intern(b"Lcl Translation", false, UnicodeErrorHandling::Replace, &mut warnings).unwrap();
        assert_eq!(a.as_str(), "Lcl Translation");
        assert_eq!(a.text.as_ptr(), b.text.as_ptr());
    }

    #[test]
    fn replace_policy_emits_fffd_and_warns() {
        let arena = Arena::new(AllocatorOptions::default());
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let h = pool.intern(&[0x41, 0xFF, 0x42], true, UnicodeErrorHandling::Replace, &mut warnings).unwrap();
        assert_eq!(h.as_str(), "A\u{FFFD}B");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn underscore_policy_substitutes_underscore() {
        let arena = Arena::new(AllocatorOptions::default());
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let h = pool.intern(&[0x41, 0xFF, 0x42], true, UnicodeErrorHandling::Underscore, &mut warnings).unwrap();
        assert_eq!(h.as_str(), "A_B");
    }

    #[test]
    fn abort_policy_fails() {
        let arena = Arena::new(AllocatorOptions::default());
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let err = pool.intern(&[0xFF], true, UnicodeErrorHandling::Abort, &mut warnings);
        assert!(err.is_err());
    }

    #[test]
    fn raw_bytes_always_retrievable() {
        let arena = Arena::new(AllocatorOptions::default());
        let mut pool = StringPool::new(&arena);
        let mut warnings = Vec::new();
        let h = pool.intern(&[0x41, 0xFF], true, UnicodeErrorHandling::Raw, &mut warnings).unwrap();
        assert_eq!(h.raw, &[0x41, 0xFF]);
    }
}
