//! Recursive read/write propagation across the hierarchy
//!
//! Both operations walk the level vector from the top; index `n`
//! (one past the last level) is memory and terminates the recursion.
//! Each call returns the updated simulated clock.

use crate::error::InvariantFailure;
use crate::error::SimulatorResult;
use crate::hierarchy::cache::CacheLevel;
use crate::hierarchy::AccessKind;
use crate::hierarchy::WritePolicy;
use crate::trace::TraceLog;

/// Drives one access at a time through the level chain
pub struct AccessEngine<'a> {
    levels: &'a mut [CacheLevel],
    policy: WritePolicy,
    memory_latency: u64,
    trace: &'a mut TraceLog,
}

impl<'a> AccessEngine<'a> {
    pub fn make(
        levels: &'a mut [CacheLevel],
        policy: WritePolicy,
        memory_latency: u64,
        trace: &'a mut TraceLog,
    ) -> Self {
        Self { levels, policy, memory_latency, trace }
    }

    fn open_frame(
        &mut self,
        k: usize,
        kind: AccessKind,
        address: u32,
        clock: u64,
    ) -> SimulatorResult<()> {
        if k == self.levels.len() {
            self.trace.call(clock, "MEM", kind.label(), (0, 0, 0), address)
        } else {
            let level = &self.levels[k];
            let frame = format!("L{}", level.id());
            self.trace.call(
                clock,
                &frame,
                kind.label(),
                level.decode(address),
                address,
            )
        }
    }

    /// Read `address` starting at level index `k`
    pub fn read(
        &mut self,
        k: usize,
        address: u32,
        clock_in: u64,
    ) -> SimulatorResult<u64> {
        self.open_frame(k, AccessKind::Read, address, clock_in)?;
        if k == self.levels.len() {
            let clock = clock_in + self.memory_latency;
            self.trace.note(clock, "M_R_SUCCESS")?;
            self.trace.close(clock, "M_R_SUCCESS")?;
            return Ok(clock);
        }

        let mut clock = clock_in;
        let status;
        if self.levels[k].probe(address, clock, false) {
            status = "C_R_HIT";
            self.trace.note(clock, status)?;
        } else {
            self.trace.note(clock, "C_R_MISS$GENERAL")?;
            clock = self.read(k + 1, address, clock)?;
            if self.levels[k].allocate(address, false, clock) {
                status = "C_R_MISS$ALLOC_SUCCESS";
                self.trace.note(clock, status)?;
            } else {
                let (was_dirty, victim) = self.levels[k].evict_lru(address);
                if was_dirty {
                    status = "C_R_MISS$ALLOC_FAILED$POP_DIRTY";
                    self.trace.note(clock, status)?;
                    clock = self.write(k + 1, victim, clock)?;
                } else {
                    status = "C_R_MISS$ALLOC_FAILED$POP_CLEAN";
                    self.trace.note(clock, status)?;
                }
                if !self.levels[k].allocate(address, false, clock) {
                    return Err(InvariantFailure::AllocAfterEvict.into());
                }
            }
        }
        clock += self.levels[k].latency();
        self.trace.close(clock, status)?;
        Ok(clock)
    }

    /// Write `address` starting at level index `k`
    pub fn write(
        &mut self,
        k: usize,
        address: u32,
        clock_in: u64,
    ) -> SimulatorResult<u64> {
        self.open_frame(k, AccessKind::Write, address, clock_in)?;
        if k == self.levels.len() {
            self.trace.note(clock_in, "M_W_SUCCESS")?;
            let clock = clock_in + self.memory_latency;
            self.trace.close(clock, "M_W_SUCCESS")?;
            return Ok(clock);
        }
        match self.policy {
            WritePolicy::WriteBackWriteAllocate => {
                self.write_back_allocate(k, address, clock_in)
            }
            WritePolicy::WriteThroughNoAllocate => {
                self.write_through(k, address, clock_in)
            }
        }
    }

    /// WBWA: the level latency is charged up front; a hit marks the
    /// way dirty, a miss allocates dirty, evicting (and writing back)
    /// the LRU way when the set is full.
    fn write_back_allocate(
        &mut self,
        k: usize,
        address: u32,
        clock_in: u64,
    ) -> SimulatorResult<u64> {
        let mut clock = clock_in + self.levels[k].latency();
        let status;
        if self.levels[k].probe(address, clock, true) {
            status = "C_R_HIT$MARKED_DIRTY$WB";
            self.trace.note(clock, status)?;
        } else if self.levels[k].allocate(address, true, clock) {
            status = "C_W_MISS$ALLOC_SUCCESS$WB";
            self.trace.note(clock, status)?;
        } else {
            let (was_dirty, victim) = self.levels[k].evict_lru(address);
            if was_dirty {
                status = "C_W_MISS$ALLOC_FAILED$POP_DIRTY$WB";
                self.trace.note(clock, status)?;
                clock = self.write(k + 1, victim, clock)?;
            } else {
                status = "C_W_MISS$ALLOC_FAILED$POP_CLEAN$WB";
                self.trace.note(clock, status)?;
            }
            if !self.levels[k].allocate(address, true, clock) {
                return Err(InvariantFailure::AllocAfterEvict.into());
            }
        }
        self.trace.close(clock, status)?;
        Ok(clock)
    }

    /// WTNWA: a hit costs the level latency; a miss never touches
    /// this level and propagates the write toward memory.
    fn write_through(
        &mut self,
        k: usize,
        address: u32,
        clock_in: u64,
    ) -> SimulatorResult<u64> {
        let mut clock = clock_in;
        let status;
        if self.levels[k].probe(address, clock, false) {
            status = "C_W_HIT$WT";
            self.trace.note(clock, status)?;
            clock += self.levels[k].latency();
        } else {
            status = "C_W_MISS$PROPAGATE$WT";
            self.trace.note(clock, status)?;
            clock = self.write(k + 1, address, clock)?;
        }
        self.trace.close(clock, status)?;
        Ok(clock)
    }
}
