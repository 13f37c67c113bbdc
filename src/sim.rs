use sim_lib::error::SimulatorResult;
use sim_lib::flags::CacheSimArgs;
use sim_lib::run_wrapper;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> SimulatorResult<()> {
    let args = CacheSimArgs::from_env_or_exit();
    let instruction_file_path_str = args.instruction_file.display().to_string();
    run_wrapper::run(&instruction_file_path_str)?;

    Ok(())
}
