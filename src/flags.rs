use std::path::PathBuf;

xflags::xflags! {
    /// Trace-driven multi-level cache hierarchy simulator.
    cmd CacheSimArgs {
        /// Path to the instruction file to execute.
        required instruction_file: PathBuf
    }
}
