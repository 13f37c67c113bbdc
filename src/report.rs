//! Report file writers
//!
//! Reports are consumed through the `ReportSink` seam so the engine
//! and scheduler never touch the filesystem directly; the production
//! sink renders CSV files next to the trace log.

use std::path::PathBuf;

use crate::error::SimulatorResult;
use crate::hierarchy::cache::CacheLevel;

/// Destination for report tasks
pub trait ReportSink {
    /// Hit/miss counters and rates for one level
    fn hit_miss_rate(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()>;

    /// Full tag-array image of one level
    fn cache_image(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()>;
}

/// CSV files named `hmr_l{id}_{arrive_time}.csv` and
/// `img_l{id}_{arrive_time}.csv` in the output directory
pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn make(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for CsvReportSink {
    fn hit_miss_rate(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        let name = format!("hmr_l{}_{}.csv", level.id(), arrive_time);
        let mut writer = csv::Writer::from_path(self.dir.join(name))?;
        writer.write_record(["HITS", "MISSES", "HIT_R", "MISS_R"])?;
        let hits = level.hits();
        let misses = level.misses();
        let total = (hits + misses) as f64;
        // 0/0 renders as NaN rather than erroring out
        writer.write_record([
            hits.to_string(),
            misses.to_string(),
            format!("{:.6}", hits as f64 / total),
            format!("{:.6}", misses as f64 / total),
        ])?;
        writer.flush()?;
        Ok(())
    }

    fn cache_image(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        let name = format!("img_l{}_{}.csv", level.id(), arrive_time);
        let mut writer = csv::Writer::from_path(self.dir.join(name))?;

        let mut header = vec!["B_IND".to_string()];
        for way in 0..level.set_assoc() {
            header.push(format!("VALID[{}]", way));
            header.push(format!("DIRTY[{}]", way));
            header.push(format!("TAG[{}]", way));
            header.push(format!("LRU[{}]", way));
        }
        writer.write_record(&header)?;

        for set in 0..level.num_sets() {
            let mut row = vec![format!("B[{}]", set)];
            for way in level.set_ways(set) {
                row.push(u8::from(way.valid()).to_string());
                row.push(u8::from(way.dirty()).to_string());
                row.push(way.tag().to_string());
                row.push(way.last_use().to_string());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Captures report rows in memory; test builds only
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryReportSink {
    inner: std::rc::Rc<std::cell::RefCell<MemoryReports>>,
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryReports {
    /// (level id, arrive_time, hits, misses)
    pub rates: Vec<(u32, u64, u64, u64)>,
    /// (level id, arrive_time, per-way (valid, dirty, tag, last_use))
    pub images: Vec<(u32, u64, Vec<(bool, bool, u32, u64)>)>,
}

#[cfg(test)]
impl MemoryReportSink {
    pub fn with<T>(&self, read: impl FnOnce(&MemoryReports) -> T) -> T {
        read(&self.inner.borrow())
    }
}

#[cfg(test)]
impl ReportSink for MemoryReportSink {
    fn hit_miss_rate(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        self.inner.borrow_mut().rates.push((
            level.id(),
            arrive_time,
            level.hits(),
            level.misses(),
        ));
        Ok(())
    }

    fn cache_image(
        &mut self,
        level: &CacheLevel,
        arrive_time: u64,
    ) -> SimulatorResult<()> {
        let mut ways = Vec::new();
        for set in 0..level.num_sets() {
            for way in level.set_ways(set) {
                ways.push((
                    way.valid(),
                    way.dirty(),
                    way.tag(),
                    way.last_use(),
                ));
            }
        }
        self.inner.borrow_mut().images.push((
            level.id(),
            arrive_time,
            ways,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::cache::CacheLevel;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("cache-sim-report-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn make_level() -> CacheLevel {
        let mut level = CacheLevel::make(1);
        level.set_dimensions(4, 16, 2).unwrap();
        level.set_latency(1).unwrap();
        level.init_array().unwrap();
        level
    }

    #[test]
    fn test_rate_file_layout() {
        let dir = scratch_dir("rate");
        let mut level = make_level();
        level.allocate(0, false, 1);
        level.probe(0, 2, false);
        level.probe(4, 3, false);
        let mut sink = CsvReportSink::make(&dir);
        sink.hit_miss_rate(&level, 10).unwrap();
        let text =
            std::fs::read_to_string(dir.join("hmr_l1_10.csv")).unwrap();
        assert_eq!(
            text,
            "HITS,MISSES,HIT_R,MISS_R\n1,1,0.500000,0.500000\n"
        );
    }

    #[test]
    fn test_rate_with_no_lookups_emits_nan() {
        let dir = scratch_dir("nan");
        let level = make_level();
        let mut sink = CsvReportSink::make(&dir);
        sink.hit_miss_rate(&level, 0).unwrap();
        let text = std::fs::read_to_string(dir.join("hmr_l1_0.csv")).unwrap();
        assert_eq!(text, "HITS,MISSES,HIT_R,MISS_R\n0,0,NaN,NaN\n");
    }

    #[test]
    fn test_image_file_layout() {
        let dir = scratch_dir("image");
        let mut level = make_level();
        level.allocate(8, true, 4);
        let mut sink = CsvReportSink::make(&dir);
        sink.cache_image(&level, 7).unwrap();
        let text = std::fs::read_to_string(dir.join("img_l1_7.csv")).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "B_IND,VALID[0],DIRTY[0],TAG[0],LRU[0],\
             VALID[1],DIRTY[1],TAG[1],LRU[1]"
        );
        // Address 8: set 0, tag 1, installed dirty at cycle 4
        assert_eq!(lines.next().unwrap(), "B[0],1,1,1,4,0,0,0,0");
        assert_eq!(lines.next().unwrap(), "B[1],0,0,0,0,0,0,0,0");
        assert!(lines.next().is_none());
    }
}
