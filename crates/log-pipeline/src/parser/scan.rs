//! Minimal left-to-right scanner shared by the text grammars.

/// Consumes a line piece by piece; every method returns `None` without
/// guaranteeing the position when the expected piece is absent.
pub(crate) struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    pub(crate) fn rest(&self) -> &'a str {
        self.rest
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// One or more non-whitespace characters.
    pub(crate) fn token(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(char::is_whitespace)
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }

    /// Exactly the character `c`.
    pub(crate) fn expect(&mut self, c: char) -> Option<()> {
        self.rest = self.rest.strip_prefix(c)?;
        Some(())
    }

    /// One or more whitespace characters.
    pub(crate) fn whitespace(&mut self) -> Option<()> {
        let trimmed = self.rest.trim_start();
        if trimmed.len() == self.rest.len() {
            return None;
        }
        self.rest = trimmed;
        Some(())
    }

    /// Zero or more characters up to `close`, consuming `close`.
    pub(crate) fn until(&mut self, close: char) -> Option<&'a str> {
        let end = self.rest.find(close)?;
        let value = &self.rest[..end];
        self.rest = &self.rest[end + close.len_utf8()..];
        Some(value)
    }

    /// Between `min` and `max` ASCII digits.
    pub(crate) fn digits(&mut self, min: usize, max: usize) -> Option<&'a str> {
        let len = self
            .rest
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if len < min || len > max {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(digits)
    }

    /// The longest prefix whose characters satisfy `pred`, at least one.
    pub(crate) fn take_while<P>(&mut self, pred: P) -> Option<&'a str>
    where
        P: Fn(char) -> bool,
    {
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(taken)
    }
}
