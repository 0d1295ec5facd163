//! Incremental `text/event-stream` decoding.

/// Collects `data:` payloads from a byte stream split at arbitrary points.
///
/// Lines may end in `\n` or `\r\n`; a blank line terminates an event and
/// multiple `data:` lines of one event are joined with `\n`. Comment lines and
/// other fields are ignored.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes; returns every payload completed by them.
    pub(crate) fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.handle_line(&line[..end], &mut payloads)?;
        }
        Ok(payloads)
    }

    /// Flush whatever remains once the body ends.
    pub(crate) fn finish(mut self) -> Result<Vec<String>, String> {
        let mut payloads = Vec::new();
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle_line(&line, &mut payloads)?;
        }
        self.dispatch(&mut payloads);
        Ok(payloads)
    }

    fn handle_line(&mut self, line: &[u8], payloads: &mut Vec<String>) -> Result<(), String> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            self.dispatch(payloads);
            return Ok(());
        }
        let Some(value) = line.strip_prefix(b"data:") else {
            return Ok(());
        };
        let value = value.strip_prefix(b" ").unwrap_or(value);
        let value =
            std::str::from_utf8(value).map_err(|err| format!("invalid UTF-8 in event data: {err}"))?;
        self.data.push(value.to_string());
        Ok(())
    }

    fn dispatch(&mut self, payloads: &mut Vec<String>) {
        if !self.data.is_empty() {
            payloads.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}
