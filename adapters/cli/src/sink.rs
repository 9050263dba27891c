//! Command sink that records fleet commands as JSON lines.

use std::io::Write;

use fleet_console_core::{CommandSink, SinkCommand, SinkError};

/// Writes each submitted command as one JSON object per line.
#[derive(Debug)]
pub(crate) struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> CommandSink for JsonLinesSink<W> {
    fn submit(&mut self, command: &SinkCommand) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, command).map_err(|error| {
            SinkError::Transport {
                message: error.to_string(),
            }
        })?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|error| SinkError::Transport {
                message: error.to_string(),
            })
    }
}
