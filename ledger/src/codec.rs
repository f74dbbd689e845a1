//! Wire codec helpers
//!
//! Every entity serialises to a compact delimiter-separated string. The
//! delimiters nest: `,` between fields, `;` ends a record, `$` ends a block,
//! `%` starts a group, `/` and `|` frame proof sub-records, and `-`
//! introduces the proof tx-count suffix. `to_wire` must be deterministic for
//! identical inputs because the batch digest hashes the concatenated
//! transaction wire forms.

use crate::errors::WireError;

/// Hex digest width in characters (160 bits).
pub const DIGEST_LEN: usize = 40;

/// Hash arbitrary bytes to the protocol digest form.
pub fn hash_hex(bytes: &[u8]) -> String {
    let mut out = hex::encode(blake3::hash(bytes).as_bytes());
    out.truncate(DIGEST_LEN);
    out
}

/// Cursor over a wire string, consuming fields up to known delimiters.
pub struct Cursor<'a> {
    entity: &'static str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(entity: &'static str, s: &'a str) -> Self {
        Self { entity, rest: s }
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a str {
        self.rest
    }

    pub fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn err(&self, detail: impl Into<String>) -> WireError {
        WireError::new(self.entity, detail)
    }

    /// Consume up to (and including) `delim`, returning the prefix.
    pub fn until(&mut self, delim: char) -> Result<&'a str, WireError> {
        match self.rest.find(delim) {
            Some(at) => {
                let field = &self.rest[..at];
                self.rest = &self.rest[at + delim.len_utf8()..];
                Ok(field)
            }
            None => Err(self.err(format!("missing `{delim}` delimiter"))),
        }
    }

    /// Consume a `u64` field ending at `delim`.
    pub fn u64_field(&mut self, delim: char) -> Result<u64, WireError> {
        let field = self.until(delim)?;
        field
            .parse::<u64>()
            .map_err(|_| WireError::new(self.entity, format!("bad integer `{field}`")))
    }

    /// Consume an `i64` field ending at `delim`.
    pub fn i64_field(&mut self, delim: char) -> Result<i64, WireError> {
        let field = self.until(delim)?;
        field
            .parse::<i64>()
            .map_err(|_| WireError::new(self.entity, format!("bad integer `{field}`")))
    }

    /// Consume an `f64` field ending at `delim`.
    pub fn f64_field(&mut self, delim: char) -> Result<f64, WireError> {
        let field = self.until(delim)?;
        field
            .parse::<f64>()
            .map_err(|_| WireError::new(self.entity, format!("bad float `{field}`")))
    }

    /// Parse the remainder as a `u64`, consuming it.
    pub fn u64_rest(&mut self) -> Result<u64, WireError> {
        let field = std::mem::take(&mut self.rest);
        field
            .parse::<u64>()
            .map_err(|_| WireError::new(self.entity, format!("bad integer `{field}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_width_and_determinism() {
        let a = hash_hex(b"batch bytes");
        let b = hash_hex(b"batch bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), DIGEST_LEN);
        assert_ne!(a, hash_hex(b"other bytes"));
    }

    #[test]
    fn test_cursor_fields() {
        let mut c = Cursor::new("tx", "12,7,0;rest");
        assert_eq!(c.u64_field(',').unwrap(), 12);
        assert_eq!(c.u64_field(',').unwrap(), 7);
        assert_eq!(c.u64_field(';').unwrap(), 0);
        assert_eq!(c.rest(), "rest");
    }

    #[test]
    fn test_cursor_missing_delimiter() {
        let mut c = Cursor::new("tx", "12");
        assert!(c.u64_field(',').is_err());
    }
}
