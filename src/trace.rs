//! Indented access-trace log (`log_system.lgs`)
//!
//! Every entry into the access engine opens a frame, decision points
//! add status notes, and every exit closes the frame. The frames must
//! stay balanced; an underflow is a fatal invariant violation.

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use crate::error::InvariantFailure;
use crate::error::SimulatorResult;

/// Sink for the hierarchical trace. One tab per open frame.
pub struct TraceLog {
    out: Box<dyn Write>,
    depth: usize,
}

impl TraceLog {
    pub fn make(out: Box<dyn Write>) -> Self {
        Self { out, depth: 0 }
    }

    /// Open the trace over a file, buffered
    pub fn to_file(path: &Path) -> SimulatorResult<Self> {
        let file = File::create(path)?;
        Ok(Self::make(Box::new(BufWriter::new(file))))
    }

    /// A 32-bit binary rendering with leading zeros stripped,
    /// keeping at least one character
    fn bin(value: u32) -> String {
        let full = format!("{:032b}", value);
        let stripped = full.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    }

    fn tabs(&self) -> String {
        "\t".repeat(self.depth)
    }

    /// Open a call frame: decoded address fields plus the raw address
    pub fn call(
        &mut self,
        clock: u64,
        frame: &str,
        operation: &str,
        decoded: (u32, u32, u32),
        address: u32,
    ) -> SimulatorResult<()> {
        let (tag, index, offset) = decoded;
        writeln!(
            self.out,
            "{}{}\u{2192}{}::{}({{{}({}):{}({}):{}({})}}={}){{",
            self.tabs(),
            clock,
            frame,
            operation,
            tag,
            Self::bin(tag),
            index,
            Self::bin(index),
            offset,
            Self::bin(offset),
            address,
        )?;
        self.depth += 1;
        Ok(())
    }

    /// A status note inside the current frame
    pub fn note(&mut self, clock: u64, status: &str) -> SimulatorResult<()> {
        if self.depth == 0 {
            return Err(InvariantFailure::TraceUnderflow.into());
        }
        writeln!(
            self.out,
            "{}\u{2193}[{}\u{2190}{}]",
            self.tabs(),
            clock,
            status,
        )?;
        Ok(())
    }

    /// Close the current frame with its final status
    pub fn close(&mut self, clock: u64, status: &str) -> SimulatorResult<()> {
        if self.depth == 0 {
            return Err(InvariantFailure::TraceUnderflow.into());
        }
        self.depth -= 1;
        writeln!(
            self.out,
            "{}}}{}\u{2190}{}",
            self.tabs(),
            clock,
            status,
        )?;
        Ok(())
    }

    /// Blank separator line between completed tasks
    pub fn task_gap(&mut self) -> SimulatorResult<()> {
        writeln!(self.out)?;
        Ok(())
    }

    pub fn flush(&mut self) -> SimulatorResult<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Number of currently open frames
    pub fn depth(&self) -> usize {
        self.depth
    }
}
