//! Pipeline traits: extension points for decoders.

use crate::error::DecodeError;
use crate::types::ParsedEntry;

/// Line decoder.
///
/// Implement this trait to support a new log format. Decoders are pure: the
/// same line always yields the same entry or the same failure.
pub trait LogParser: Send + Sync {
    /// Name of the format this parser handles
    fn format_name(&self) -> &str;

    /// Decodes one raw line (without its trailing newline)
    fn parse(&self, line: &str) -> Result<ParsedEntry, DecodeError>;
}
