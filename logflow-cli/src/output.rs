//! Output formatting for text vs JSON rendering
//!
//! Subcommand output flows through [`OutputWriter`], which keeps the format
//! switch out of the command handlers.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes CLI payloads to stdout in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Renders a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Renders a payload to `w`: `Render::render_text` for text, pretty
    /// `serde_json` for JSON.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }

    /// Writes an already-rendered body followed by a newline. An empty body
    /// writes nothing.
    pub fn write_body(&self, body: &str) -> Result<(), CliError> {
        if body.is_empty() {
            return Ok(());
        }
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{body}")?;
        Ok(())
    }
}

/// Human-readable text rendering.
///
/// Implemented by every CLI payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}
