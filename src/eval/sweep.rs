use sim_lib::hierarchy::engine::AccessEngine;
use sim_lib::hierarchy::Hierarchy;
use sim_lib::hierarchy::WritePolicy;
use sim_lib::trace::TraceLog;

const BLOCK_SIZE: u32 = 64;
const LEVEL_LATENCY: u64 = 1;
const MEMORY_LATENCY: u64 = 100;

/// A deterministic mix of sequential sweeps and a hot working set,
/// enough to separate the configurations
fn synthetic_pattern() -> Vec<u32> {
    let mut addresses = Vec::new();
    for round in 0u32..8 {
        // Streaming pass over 16 KiB
        for step in 0u32..256 {
            addresses.push(step * BLOCK_SIZE);
        }
        // Hot loop over a few conflicting lines
        for repeat in 0u32..64 {
            addresses.push(((repeat % 6) * 4096) + round * BLOCK_SIZE);
        }
    }
    addresses
}

/// Replay the pattern against a single-level cache and return its
/// miss rate. Every fourth access is a write.
fn miss_rate_for(
    total_size: u32,
    set_assoc: u32,
    addresses: &[u32],
) -> Result<f64, Box<dyn std::error::Error>> {
    let mut hierarchy = Hierarchy::make(1);
    {
        let level = hierarchy.level_mut(1)?;
        level.set_dimensions(BLOCK_SIZE, total_size, set_assoc)?;
        level.set_latency(LEVEL_LATENCY)?;
        level.init_array()?;
    }

    let mut trace = TraceLog::make(Box::new(std::io::sink()));
    let mut engine = AccessEngine::make(
        hierarchy.levels_mut(),
        WritePolicy::WriteBackWriteAllocate,
        MEMORY_LATENCY,
        &mut trace,
    );
    let mut clock = 0;
    for (i, address) in addresses.iter().enumerate() {
        clock = if i % 4 == 3 {
            engine.write(0, *address, clock)?
        } else {
            engine.read(0, *address, clock)?
        };
    }

    let level = hierarchy.level(1)?;
    let total = (level.hits() + level.misses()) as f64;
    Ok(level.misses() as f64 / total)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cache_sizes: Vec<u32> =
        vec![4 * 1024, 16 * 1024, 64 * 1024, 256 * 1024];
    let set_assocs: Vec<u32> = vec![1, 2, 4, 8];
    let addresses = synthetic_pattern();

    let mut writer = csv::Writer::from_path("sweep_eval.csv")?;
    writer.write_record(["Cache size", "Set assoc", "Miss rate"])?;

    let mut data: Vec<Vec<(u32, f64)>> = vec![vec![]; cache_sizes.len()];
    let mut y_max: f64 = 0.;
    for (i, cache_size) in cache_sizes.iter().enumerate() {
        for set_assoc in set_assocs.iter() {
            let miss_rate =
                miss_rate_for(*cache_size, *set_assoc, &addresses)?;
            writer.write_record([
                cache_size.to_string(),
                set_assoc.to_string(),
                format!("{:.4}", miss_rate),
            ])?;
            data[i].push((*set_assoc, miss_rate));
            y_max = y_max.max(miss_rate);
        }
    }
    writer.flush()?;

    // Plot the data
    use plotters::prelude::*;

    let root =
        SVGBackend::new("sweep_eval.svg", (800, 600)).into_drawing_area();
    root.fill(&WHITE).unwrap();

    let mut ctx = ChartBuilder::on(&root)
        .caption(
            "Single level sweep (miss rate)",
            ("sans-serif", 40).into_font(),
        )
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..9, 0.0..y_max * 1.1)
        .unwrap();
    ctx.configure_mesh()
        .x_desc("Set associativity")
        .y_desc("Miss rate")
        .draw()
        .unwrap();

    for (i, cache_size) in cache_sizes.iter().enumerate() {
        let series = data[i].iter().map(|(x, y)| (*x as i32, *y));
        let label = format!("Cache size = {}", cache_size);
        let color = Palette99::pick(i).to_rgba();
        ctx.draw_series(LineSeries::new(series, color))
            .unwrap()
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .unwrap();

    Ok(())
}
