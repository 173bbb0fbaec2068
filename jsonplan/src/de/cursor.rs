//! Byte cursor over the input, with the escape hint.

use alloc::vec::Vec;

use memchr::{memchr, memchr2};

use super::number::{self, Number};
use crate::error::{JsonError, Malformed, Result};

/// Read position plus the offset of the next backslash at or after it.
///
/// A string whose closing quote comes before `next_escape` has no escapes
/// and is taken straight from the input.
pub(crate) struct Cursor<'i> {
    input: &'i [u8],
    pos: usize,
    next_escape: usize,
}

impl<'i> Cursor<'i> {
    pub fn new(input: &'i [u8]) -> Self {
        Self {
            input,
            pos: 0,
            next_escape: memchr(b'\\', input).unwrap_or(input.len()),
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// A malformed-input error at the current position.
    #[cold]
    pub fn error(&self, reason: Malformed) -> JsonError {
        JsonError::malformed(reason, self.input, self.pos)
    }

    #[cold]
    pub fn error_at(&self, reason: Malformed, offset: usize) -> JsonError {
        JsonError::malformed(reason, self.input, offset)
    }

    #[cold]
    pub fn unexpected(&self, expected: &'static str) -> JsonError {
        match self.input.get(self.pos) {
            Some(&got) => self.error(Malformed::UnexpectedByte { got, expected }),
            None => self.error(Malformed::UnexpectedEof { expected }),
        }
    }

    #[inline]
    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\n' | b'\r' | b'\t') = self.input.get(self.pos) {
            self.pos += 1;
        }
    }

    /// Next non-whitespace byte, without consuming it.
    #[inline]
    pub fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.input.get(self.pos).copied()
    }

    /// Next non-whitespace byte; end of input is an error.
    #[inline]
    pub fn peek_or_eof(&mut self, expected: &'static str) -> Result<u8> {
        self.peek()
            .ok_or_else(|| self.error(Malformed::UnexpectedEof { expected }))
    }

    /// Consumes `byte`, which must come next.
    #[inline]
    pub fn expect(&mut self, byte: u8, expected: &'static str) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// After an element: consumes `,` (returning true) or `close`
    /// (returning false).
    #[inline]
    pub fn comma_or(&mut self, close: u8, expected: &'static str) -> Result<bool> {
        match self.peek() {
            Some(b',') => {
                self.pos += 1;
                Ok(true)
            }
            Some(b) if b == close => {
                self.pos += 1;
                Ok(false)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Consumes `close` if it comes next. Used right after an opening bracket.
    #[inline]
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes a `null` literal if one comes next.
    #[inline]
    pub fn eat_null(&mut self) -> Result<bool> {
        if self.peek() != Some(b'n') {
            return Ok(false);
        }
        self.literal(b"null")?;
        Ok(true)
    }

    fn literal(&mut self, lit: &[u8]) -> Result<()> {
        if self.input[self.pos..].starts_with(lit) {
            self.pos += lit.len();
            Ok(())
        } else {
            Err(self.error(Malformed::InvalidLiteral))
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek() {
            Some(b't') => self.literal(b"true").map(|()| true),
            Some(b'f') => self.literal(b"false").map(|()| false),
            _ => Err(self.unexpected("a boolean")),
        }
    }

    /// Scans a number, leaving the cursor after it. Returns the number and
    /// its source bytes.
    pub fn number(&mut self) -> Result<(Number, &'i [u8])> {
        self.skip_ws();
        match self.input.get(self.pos) {
            Some(b'-' | b'0'..=b'9') => {}
            _ => return Err(self.unexpected("a number")),
        }
        let n = number::scan(self.input, self.pos)
            .map_err(|(reason, at)| self.error_at(reason, at))?;
        self.pos = n.end;
        Ok((n, &self.input[n.start..n.end]))
    }

    /// Error for a number that scanned fine but does not fit.
    #[cold]
    pub fn number_error(&self, n: &Number, reason: Malformed) -> JsonError {
        self.error_at(reason, n.start)
    }

    /// Reads a string and returns its raw body followed by the closing
    /// quote, the form key lookup expects. Escaped keys are unescaped into
    /// `scratch` first.
    pub fn key<'s>(&'s mut self, scratch: &'s mut Vec<u8>) -> Result<&'s [u8]>
    where
        'i: 's,
    {
        self.string_bytes(scratch, true)
    }

    /// Reads a string and returns its unescaped, UTF-8 checked contents.
    pub fn str<'s>(&'s mut self, scratch: &'s mut Vec<u8>) -> Result<&'s str>
    where
        'i: 's,
    {
        let input = self.input;
        let start = self.pos;
        let bytes = self.string_bytes(scratch, false)?;
        core::str::from_utf8(bytes)
            .map_err(|_| JsonError::malformed(Malformed::InvalidUtf8, input, start))
    }

    fn string_bytes<'s>(&'s mut self, scratch: &'s mut Vec<u8>, with_quote: bool) -> Result<&'s [u8]>
    where
        'i: 's,
    {
        self.expect(b'"', "a string")?;
        let start = self.pos;
        let Some(len) = memchr(b'"', &self.input[start..]) else {
            self.pos = self.input.len();
            return Err(self.error(Malformed::UnexpectedEof { expected: "`\"`" }));
        };
        let close = start + len;
        if close < self.next_escape {
            self.pos = close + 1;
            let end = if with_quote { close + 1 } else { close };
            return Ok(&self.input[start..end]);
        }

        scratch.clear();
        self.unescape(scratch)?;
        if with_quote {
            scratch.push(b'"');
        }
        Ok(scratch)
    }

    /// Copies the rest of a string into `out`, resolving escapes, and
    /// consumes the closing quote.
    #[cold]
    fn unescape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let rest = &self.input[self.pos..];
            let Some(i) = memchr2(b'"', b'\\', rest) else {
                self.pos = self.input.len();
                return Err(self.error(Malformed::UnexpectedEof { expected: "`\"`" }));
            };
            out.extend_from_slice(&rest[..i]);
            self.pos += i;
            if rest[i] == b'"' {
                self.pos += 1;
                self.sync_escape();
                return Ok(());
            }

            let escape_at = self.pos;
            let Some(&kind) = self.input.get(self.pos + 1) else {
                return Err(self.error(Malformed::UnexpectedEof {
                    expected: "an escape",
                }));
            };
            self.pos += 2;
            let byte = match kind {
                b'"' => b'"',
                b'\\' => b'\\',
                b'/' => b'/',
                b'b' => 0x08,
                b'f' => 0x0c,
                b'n' => b'\n',
                b'r' => b'\r',
                b't' => b'\t',
                b'u' => {
                    let c = self.unicode_escape(escape_at)?;
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    continue;
                }
                _ => return Err(self.error_at(Malformed::InvalidEscape, escape_at)),
            };
            out.push(byte);
        }
    }

    /// Decodes the hex digits of a `\u` escape (and its low surrogate, if
    /// it starts a pair). The cursor is just past `\u`.
    fn unicode_escape(&mut self, escape_at: usize) -> Result<char> {
        let high = self.hex4(escape_at)?;
        let code = match high {
            0xD800..=0xDBFF => {
                if !self.input[self.pos..].starts_with(b"\\u") {
                    return Err(self.error_at(Malformed::InvalidUnicodeEscape, escape_at));
                }
                self.pos += 2;
                let low = self.hex4(escape_at)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(self.error_at(Malformed::InvalidUnicodeEscape, escape_at));
                }
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            0xDC00..=0xDFFF => {
                return Err(self.error_at(Malformed::InvalidUnicodeEscape, escape_at));
            }
            _ => high,
        };
        char::from_u32(code).ok_or_else(|| self.error_at(Malformed::InvalidUnicodeEscape, escape_at))
    }

    fn hex4(&mut self, escape_at: usize) -> Result<u32> {
        let Some(digits) = self.input.get(self.pos..self.pos + 4) else {
            return Err(self.error_at(Malformed::InvalidUnicodeEscape, escape_at));
        };
        let mut v = 0u32;
        for &d in digits {
            let nibble = match d {
                b'0'..=b'9' => d - b'0',
                b'a'..=b'f' => d - b'a' + 10,
                b'A'..=b'F' => d - b'A' + 10,
                _ => return Err(self.error_at(Malformed::InvalidUnicodeEscape, escape_at)),
            };
            v = (v << 4) | nibble as u32;
        }
        self.pos += 4;
        Ok(v)
    }

    /// Moves the escape hint forward once the cursor has passed it.
    #[inline]
    fn sync_escape(&mut self) {
        if self.pos > self.next_escape {
            self.next_escape = memchr(b'\\', &self.input[self.pos..])
                .map_or(self.input.len(), |i| self.pos + i);
        }
    }

    /// Skips one value of any type, tracking nesting without decoding.
    pub fn skip_value(&mut self) -> Result<()> {
        match self.peek_or_eof("a value")? {
            b'"' => self.skip_string()?,
            b'{' | b'[' => self.skip_nested()?,
            b't' => self.literal(b"true")?,
            b'f' => self.literal(b"false")?,
            b'n' => self.literal(b"null")?,
            b'-' | b'0'..=b'9' => {
                self.number()?;
            }
            _ => return Err(self.unexpected("a value")),
        }
        Ok(())
    }

    fn skip_string(&mut self) -> Result<()> {
        self.pos += 1;
        loop {
            let Some(i) = memchr2(b'"', b'\\', &self.input[self.pos..]) else {
                self.pos = self.input.len();
                return Err(self.error(Malformed::UnexpectedEof { expected: "`\"`" }));
            };
            self.pos += i;
            if self.input[self.pos] == b'"' {
                self.pos += 1;
                self.sync_escape();
                return Ok(());
            }
            self.pos = (self.pos + 2).min(self.input.len());
        }
    }

    fn skip_nested(&mut self) -> Result<()> {
        let mut depth = 0usize;
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'"' => self.skip_string()?,
                _ => self.pos += 1,
            }
        }
        Err(self.error(Malformed::UnexpectedEof {
            expected: "a closing bracket",
        }))
    }

    /// Fails unless only whitespace is left.
    pub fn finish(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error(Malformed::TrailingCharacters)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn plain_and_escaped_strings() {
        let mut scratch = Vec::new();
        let mut c = Cursor::new(br#" "plain" "a\"b\\c\nd" "after""#);
        assert_eq!(c.str(&mut scratch).unwrap(), "plain");
        assert_eq!(c.str(&mut scratch).unwrap(), "a\"b\\c\nd");
        // the hint moved past the escapes, so this is the fast path again
        assert_eq!(c.str(&mut scratch).unwrap(), "after");
        assert_eq!(c.finish(), Ok(()));
    }

    #[test]
    fn keys_keep_their_closing_quote() {
        let mut scratch = Vec::new();
        let mut c = Cursor::new(br#""id" "id""#);
        assert_eq!(c.key(&mut scratch).unwrap(), b"id\"");
        assert_eq!(c.key(&mut scratch).unwrap(), b"id\"");
    }

    #[test]
    fn unicode_escapes() {
        let mut scratch = Vec::new();
        let mut c = Cursor::new(r#""é😀\/""#.as_bytes());
        assert_eq!(c.str(&mut scratch).unwrap(), "é😀/");

        for bad in [r#""\ud83d""#, r#""\ude00""#, r#""\u12""#, r#""\uzzzz""#] {
            let mut c = Cursor::new(bad.as_bytes());
            let err = c.str(&mut scratch).unwrap_err();
            assert_eq!(
                err.kind,
                crate::error::JsonErrorKind::MalformedInput(Malformed::InvalidUnicodeEscape),
                "{bad}"
            );
            assert_eq!(err.offset, Some(1));
        }
        let mut c = Cursor::new(br#""\x""#);
        assert_eq!(
            c.str(&mut scratch).unwrap_err().kind,
            crate::error::JsonErrorKind::MalformedInput(Malformed::InvalidEscape)
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut scratch = Vec::new();
        let mut c = Cursor::new(b"\"\xff\"");
        assert_eq!(
            c.str(&mut scratch).unwrap_err().kind,
            crate::error::JsonErrorKind::MalformedInput(Malformed::InvalidUtf8)
        );
    }

    #[test]
    fn skip_balances_nesting() {
        let mut c = Cursor::new(br#"{"a":[1,{"b":"]}\""}],"c":null} ,"#);
        c.skip_value().unwrap();
        assert_eq!(c.peek(), Some(b','));

        for v in ["true", "-1.5e3", "\"x\"", "[]", "null"] {
            let mut c = Cursor::new(v.as_bytes());
            c.skip_value().unwrap();
            assert_eq!(c.finish(), Ok(()), "{v}");
        }
        let mut c = Cursor::new(b"[1,2");
        assert!(c.skip_value().is_err());
    }

    #[test]
    fn literals_and_delimiters() {
        let mut c = Cursor::new(b" true , nul");
        assert_eq!(c.bool(), Ok(true));
        assert_eq!(c.comma_or(b'}', "`,` or `}`"), Ok(true));
        let err = c.eat_null().unwrap_err();
        assert_eq!(err.offset, Some(8));
        assert_eq!(err.kind, crate::error::JsonErrorKind::MalformedInput(Malformed::InvalidLiteral));
    }
}
