//! Configuration facade and the run-phase dispatch loop
//!
//! The system starts in the build phase: configuration commands shape
//! the hierarchy and task commands accumulate in the queue. `ins`
//! verifies readiness, switches to the run phase, and drains the
//! queue in timestamp order.

use std::path::Path;
use std::path::PathBuf;

use crate::error::InvariantFailure;
use crate::error::SimulatorResult;
use crate::hierarchy::engine::AccessEngine;
use crate::hierarchy::AccessKind;
use crate::hierarchy::Hierarchy;
use crate::hierarchy::WritePolicy;
use crate::report::CsvReportSink;
use crate::report::ReportSink;
use crate::task::Task;
use crate::task::TaskKind;
use crate::task::TaskQueue;
use crate::trace::TraceLog;

/// Values fixed by the `con` command
#[derive(Clone, Copy)]
struct SystemConfig {
    policy: WritePolicy,
    cache_count: u32,
    block_size: u32,
}

/// The simulated machine: hierarchy, clock, queue, and output sinks
pub struct System {
    config: Option<SystemConfig>,
    memory_latency: Option<u64>,
    hierarchy: Hierarchy,
    tasks: TaskQueue,
    clock: u64,

    out_dir: PathBuf,
    trace: Option<TraceLog>,
    reports: Box<dyn ReportSink>,

    initialized: bool,
}

impl System {
    /// Production system: trace and reports land in `out_dir`
    pub fn make(out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        let reports = Box::new(CsvReportSink::make(&out_dir));
        Self::with_sinks(out_dir, None, reports)
    }

    /// System with injected sinks; the trace log defaults to a file
    /// opened at configuration time when not supplied
    pub fn with_sinks(
        out_dir: impl Into<PathBuf>,
        trace: Option<TraceLog>,
        reports: Box<dyn ReportSink>,
    ) -> Self {
        Self {
            config: None,
            memory_latency: None,
            hierarchy: Hierarchy::default(),
            tasks: TaskQueue::default(),
            clock: 0,
            out_dir: out_dir.into(),
            trace,
            reports,
            initialized: false,
        }
    }

    /// Build-phase commands need a configuration and must not run
    /// once the queue has been dispatched
    fn build_phase_config(
        &self,
        command: &'static str,
    ) -> Result<SystemConfig, InvariantFailure> {
        if self.initialized {
            return Err(InvariantFailure::ConfiguredAfterRun { command });
        }
        self.config
            .ok_or(InvariantFailure::NotConfigured { command })
    }

    fn forbid_tasking(
        &self,
        command: &'static str,
    ) -> Result<(), InvariantFailure> {
        if self.initialized {
            return Err(InvariantFailure::TaskAfterInit { command });
        }
        Ok(())
    }

    /// True when the given 1-based level is outside the configured
    /// chain; such commands are skipped without touching state
    fn out_of_range(&self, level: u32) -> bool {
        level == 0 || level > self.hierarchy.cache_count()
    }

    /// `con`: fix the policy, level count, and block size, create the
    /// bare levels, and open the trace log
    pub fn set_config(
        &mut self,
        cache_count: u32,
        block_size: u32,
        policy_num: u32,
    ) -> SimulatorResult<()> {
        if self.config.is_some() || self.initialized {
            return Err(InvariantFailure::Reconfigured.into());
        }
        let policy = WritePolicy::from_policy_num(policy_num)
            .ok_or(InvariantFailure::UnknownPolicy(policy_num))?;
        if cache_count < 1 {
            return Err(InvariantFailure::NoCacheLevels.into());
        }
        self.config = Some(SystemConfig { policy, cache_count, block_size });
        self.hierarchy = Hierarchy::make(cache_count);
        if self.trace.is_none() {
            let path = self.out_dir.join("log_system.lgs");
            self.trace = Some(TraceLog::to_file(&path)?);
        }
        log::info!(
            "con {:<10}{:<10}{:<10}",
            cache_count,
            block_size,
            policy_num
        );
        Ok(())
    }

    /// `scd`: dimension one level. Returns false when the level is
    /// out of range (the command is skipped).
    pub fn set_cache_dimension(
        &mut self,
        level: u32,
        total_size: u32,
        set_assoc: u32,
    ) -> SimulatorResult<bool> {
        let config = self.build_phase_config("scd")?;
        if self.out_of_range(level) {
            return Ok(false);
        }
        self.hierarchy
            .level_mut(level)?
            .set_dimensions(config.block_size, total_size, set_assoc)?;
        log::info!("scd {:<10}{:<10}{:<10}", level, total_size, set_assoc);
        Ok(true)
    }

    /// `scl`: set one level's access latency
    pub fn set_cache_latency(
        &mut self,
        level: u32,
        latency: u64,
    ) -> SimulatorResult<bool> {
        self.build_phase_config("scl")?;
        if self.out_of_range(level) {
            return Ok(false);
        }
        self.hierarchy.level_mut(level)?.set_latency(latency)?;
        log::info!("scl {:<10}{:<10}", level, latency);
        Ok(true)
    }

    /// `sml`: set the latency of the memory behind the last level
    pub fn set_memory_latency(&mut self, latency: u64) -> SimulatorResult<()> {
        self.build_phase_config("sml")?;
        self.memory_latency = Some(latency);
        log::info!("sml {:<10}", latency);
        Ok(())
    }

    /// `inc`: materialize one level's block array
    pub fn init_cache(&mut self, level: u32) -> SimulatorResult<bool> {
        self.build_phase_config("inc")?;
        if self.out_of_range(level) {
            return Ok(false);
        }
        self.hierarchy.level_mut(level)?.init_array()?;
        log::info!("inc {:<10}", level);
        Ok(true)
    }

    /// `tre`: enqueue a read access
    pub fn task_read(
        &mut self,
        address: u32,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        self.forbid_tasking("tre")?;
        self.tasks.push(Task::make(TaskKind::Read { address }, arrive_time));
        log::info!("tre {:<10}{:<10}", address, arrive_time);
        Ok(())
    }

    /// `twr`: enqueue a write access
    pub fn task_write(
        &mut self,
        address: u32,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        self.forbid_tasking("twr")?;
        self.tasks.push(Task::make(TaskKind::Write { address }, arrive_time));
        log::info!("twr {:<10}{:<10}", address, arrive_time);
        Ok(())
    }

    /// `pcr`: enqueue a hit/miss-rate report for one level
    pub fn task_report_rate(
        &mut self,
        level: u32,
        arrive_time: u64,
    ) -> SimulatorResult<bool> {
        self.forbid_tasking("pcr")?;
        if self.out_of_range(level) {
            return Ok(false);
        }
        self.tasks
            .push(Task::make(TaskKind::ReportRate { level }, arrive_time));
        log::info!("pcr {:<10}{:<10}", level, arrive_time);
        Ok(true)
    }

    /// `pci`: enqueue a cache-image report for one level
    pub fn task_report_image(
        &mut self,
        level: u32,
        arrive_time: u64,
    ) -> SimulatorResult<bool> {
        self.forbid_tasking("pci")?;
        if self.out_of_range(level) {
            return Ok(false);
        }
        self.tasks
            .push(Task::make(TaskKind::ReportImage { level }, arrive_time));
        log::info!("pci {:<10}{:<10}", level, arrive_time);
        Ok(true)
    }

    /// `ins`: verify readiness, sort the queue, run every task
    pub fn init_system(&mut self) -> SimulatorResult<()> {
        if self.initialized {
            return Err(InvariantFailure::Reinitialized.into());
        }
        self.check_ready()?;
        self.tasks.sort_for_run();
        self.initialized = true;
        log::info!("ins");
        self.run_task_queue()
    }

    fn check_ready(&self) -> SimulatorResult<()> {
        let not_ready = |what: String| {
            SimulatorResult::<()>::Err(
                InvariantFailure::SystemNotReady(what).into(),
            )
        };
        if self.config.is_none() {
            return not_ready("'con' was never issued".to_string());
        }
        if self.memory_latency.is_none() {
            return not_ready("memory latency is not set ('sml' missing)".to_string());
        }
        for level in self.hierarchy.levels() {
            if !level.has_geometry() {
                return not_ready(format!(
                    "cache level {} has no dimensions ('scd' missing)",
                    level.id()
                ));
            }
            if !level.has_latency() {
                return not_ready(format!(
                    "cache level {} has no latency ('scl' missing)",
                    level.id()
                ));
            }
            if !level.is_initialized() {
                return not_ready(format!(
                    "cache level {} is not initialized ('inc' missing)",
                    level.id()
                ));
            }
        }
        Ok(())
    }

    fn dispatch_access(
        &mut self,
        kind: AccessKind,
        address: u32,
    ) -> SimulatorResult<()> {
        let policy = self
            .config
            .ok_or(InvariantFailure::NotConfigured { command: "ins" })?
            .policy;
        let memory_latency = self.memory_latency.ok_or_else(|| {
            InvariantFailure::SystemNotReady(
                "memory latency is not set ('sml' missing)".to_string(),
            )
        })?;
        let trace = self.trace.as_mut().ok_or_else(|| {
            InvariantFailure::SystemNotReady(
                "trace log is not open".to_string(),
            )
        })?;
        let mut engine = AccessEngine::make(
            self.hierarchy.levels_mut(),
            policy,
            memory_latency,
            trace,
        );
        self.clock = match kind {
            AccessKind::Read => engine.read(0, address, self.clock)?,
            AccessKind::Write => engine.write(0, address, self.clock)?,
        };
        if let Some(trace) = self.trace.as_mut() {
            trace.task_gap()?;
        }
        Ok(())
    }

    fn run_task_queue(&mut self) -> SimulatorResult<()> {
        let tasks = std::mem::take(&mut self.tasks).into_tasks();
        for task in tasks {
            // Idle until the task arrives; the engine only reads the
            // clock at entry, so jumping ahead matches advancing by 1
            if self.clock < task.arrive_time() {
                self.clock = task.arrive_time();
            }
            match task.kind() {
                TaskKind::Read { address } => {
                    self.dispatch_access(AccessKind::Read, address)?;
                }
                TaskKind::Write { address } => {
                    self.dispatch_access(AccessKind::Write, address)?;
                }
                TaskKind::ReportRate { level } => {
                    let cache = self.hierarchy.level(level)?;
                    self.reports.hit_miss_rate(cache, task.arrive_time())?;
                }
                TaskKind::ReportImage { level } => {
                    let cache = self.hierarchy.level(level)?;
                    self.reports.cache_image(cache, task.arrive_time())?;
                }
                TaskKind::Halt => break,
            }
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.flush()?;
        }
        Ok(())
    }

    /// Current simulated cycle
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Where report and trace files are created
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}
