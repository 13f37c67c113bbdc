//! Instruction-file front end
//!
//! The instruction program is a stream of whitespace-separated
//! tokens. Tokens that are not a recognized opcode are skipped until
//! the next recognized one, so noisy input is tolerated. Numeric
//! arguments carry a `$` prefix and decode as decimal u32.

use std::str::SplitWhitespace;

use crate::error::ParseError;
use crate::error::SimulatorResult;

/// A fully decoded instruction record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `con`: cache count, block size, policy number (1=WBWA, 2=WTNWA)
    Configure { cache_count: u32, block_size: u32, policy_num: u32 },
    /// `scd`: level, total size in bytes, set associativity
    SetDimension { level: u32, total_size: u32, set_assoc: u32 },
    /// `scl`: level, latency in cycles
    SetLatency { level: u32, latency: u32 },
    /// `sml`: memory latency in cycles
    SetMemoryLatency { latency: u32 },
    /// `inc`: materialize the level's block array
    InitCache { level: u32 },
    /// `tre`: enqueue a read
    EnqueueRead { address: u32, arrive_time: u32 },
    /// `twr`: enqueue a write
    EnqueueWrite { address: u32, arrive_time: u32 },
    /// `pcr`: enqueue a hit/miss-rate report
    EnqueueRateReport { level: u32, arrive_time: u32 },
    /// `pci`: enqueue a cache-image report
    EnqueueImageReport { level: u32, arrive_time: u32 },
    /// `ins`: sort the queue and run
    InitSystem,
    /// `hat`: stop reading further instructions
    Halt,
}

/// Pulls commands out of an instruction program one at a time
pub struct CommandReader<'a> {
    tokens: SplitWhitespace<'a>,
}

impl<'a> CommandReader<'a> {
    pub fn make(program: &'a str) -> Self {
        Self { tokens: program.split_whitespace() }
    }

    /// Argument count for a recognized opcode
    fn arity(opcode: &str) -> Option<(&'static str, usize)> {
        match opcode {
            "con" => Some(("con", 3)),
            "scd" => Some(("scd", 3)),
            "scl" => Some(("scl", 2)),
            "sml" => Some(("sml", 1)),
            "inc" => Some(("inc", 1)),
            "tre" => Some(("tre", 2)),
            "twr" => Some(("twr", 2)),
            "pcr" => Some(("pcr", 2)),
            "pci" => Some(("pci", 2)),
            "ins" => Some(("ins", 0)),
            "hat" => Some(("hat", 0)),
            _ => None,
        }
    }

    /// Strip the `$` prefix and decode the decimal argument
    fn decode_argument(token: &str) -> Result<u32, ParseError> {
        let digits = token
            .strip_prefix('$')
            .ok_or_else(|| ParseError::MissingPrefix(token.to_string()))?;
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ParseError::NotDecimal(token.to_string()));
        }
        digits
            .parse::<u32>()
            .map_err(|_| ParseError::NotDecimal(token.to_string()))
    }

    /// The next recognized record, or `None` at end of input.
    /// A malformed argument surfaces as a `ParseError`; the caller
    /// skips the record and keeps reading.
    pub fn next_command(&mut self) -> SimulatorResult<Option<Command>> {
        let (opcode, arity) = loop {
            let token = match self.tokens.next() {
                Some(token) => token,
                None => return Ok(None),
            };
            if let Some(found) = Self::arity(token) {
                break found;
            }
            log::warn!("unidentified instruction token '{}'", token);
        };

        let mut args = [0u32; 3];
        for slot in args.iter_mut().take(arity) {
            let token = self
                .tokens
                .next()
                .ok_or(ParseError::TruncatedRecord(opcode))?;
            *slot = Self::decode_argument(token)?;
        }

        let command = match opcode {
            "con" => Command::Configure {
                cache_count: args[0],
                block_size: args[1],
                policy_num: args[2],
            },
            "scd" => Command::SetDimension {
                level: args[0],
                total_size: args[1],
                set_assoc: args[2],
            },
            "scl" => Command::SetLatency { level: args[0], latency: args[1] },
            "sml" => Command::SetMemoryLatency { latency: args[0] },
            "inc" => Command::InitCache { level: args[0] },
            "tre" => Command::EnqueueRead {
                address: args[0],
                arrive_time: args[1],
            },
            "twr" => Command::EnqueueWrite {
                address: args[0],
                arrive_time: args[1],
            },
            "pcr" => Command::EnqueueRateReport {
                level: args[0],
                arrive_time: args[1],
            },
            "pci" => Command::EnqueueImageReport {
                level: args[0],
                arrive_time: args[1],
            },
            "ins" => Command::InitSystem,
            "hat" => Command::Halt,
            _ => unreachable!("arity() only admits the opcodes above"),
        };
        Ok(Some(command))
    }
}
