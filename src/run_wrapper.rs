//! A simulator wrapper
//!
//! Glue between the instruction-file front end and the system
//! facade. During the load phase, malformed records and out-of-range
//! levels are reported and skipped; everything else is fatal.

use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::instruction::Command;
use crate::instruction::CommandReader;
use crate::system::System;

/// Run the given instruction file against a fresh system.
/// Report and trace files are created in the working directory.
pub fn run(instruction_file: &str) -> SimulatorResult<()> {
    let program = std::fs::read_to_string(instruction_file)?;
    let mut system = System::make(".");
    load_program(&mut system, &program)
}

/// Feed an instruction program into a prepared system
pub fn load_program(
    system: &mut System,
    program: &str,
) -> SimulatorResult<()> {
    let mut reader = CommandReader::make(program);
    loop {
        match reader.next_command() {
            Ok(None) => break,
            Ok(Some(Command::Halt)) => {
                log::info!("hat");
                break;
            }
            Ok(Some(command)) => apply_command(system, command)?,
            Err(SimulatorError::ParseError(e)) => {
                log::warn!("skipping malformed record: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn apply_command(
    system: &mut System,
    command: Command,
) -> SimulatorResult<()> {
    let applied = match command {
        Command::Configure { cache_count, block_size, policy_num } => {
            system.set_config(cache_count, block_size, policy_num)?;
            true
        }
        Command::SetDimension { level, total_size, set_assoc } => {
            system.set_cache_dimension(level, total_size, set_assoc)?
        }
        Command::SetLatency { level, latency } => {
            system.set_cache_latency(level, u64::from(latency))?
        }
        Command::SetMemoryLatency { latency } => {
            system.set_memory_latency(u64::from(latency))?;
            true
        }
        Command::InitCache { level } => system.init_cache(level)?,
        Command::EnqueueRead { address, arrive_time } => {
            system.task_read(address, u64::from(arrive_time))?;
            true
        }
        Command::EnqueueWrite { address, arrive_time } => {
            system.task_write(address, u64::from(arrive_time))?;
            true
        }
        Command::EnqueueRateReport { level, arrive_time } => {
            system.task_report_rate(level, u64::from(arrive_time))?
        }
        Command::EnqueueImageReport { level, arrive_time } => {
            system.task_report_image(level, u64::from(arrive_time))?
        }
        Command::InitSystem => {
            system.init_system()?;
            true
        }
        // Handled by the load loop
        Command::Halt => true,
    };
    if !applied {
        log::warn!("skipping {:?}: cache level out of range", command);
    }
    Ok(())
}
