//! End-to-end scenario runs: instruction text in, report and trace
//! files out.

use std::path::Path;
use std::path::PathBuf;

use sim_lib::run_wrapper::load_program;
use sim_lib::system::System;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("cache-sim-scenario-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_in(dir: &Path, program: &str) -> System {
    let mut system = System::make(dir);
    load_program(&mut system, program).unwrap();
    system
}

fn read_file(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

fn assert_trace_is_balanced(trace: &str) {
    let calls = trace
        .lines()
        .filter(|line| line.contains("::READ(") || line.contains("::WRITE("))
        .count();
    let closes = trace
        .lines()
        .filter(|line| line.trim_start_matches('\t').starts_with('}'))
        .count();
    assert_eq!(calls, closes);
}

const S1_PROGRAM: &str = "con $1 $4 $1\n\
     scd $1 $16 $1\n\
     scl $1 $1\n\
     sml $100\n\
     inc $1\n\
     tre $0 $0\n\
     tre $0 $1\n\
     pcr $1 $10\n\
     ins\n";

#[test]
fn s1_single_level_direct_mapped_hit() {
    let dir = scratch_dir("s1");
    let system = run_in(&dir, S1_PROGRAM);
    assert_eq!(system.clock(), 102);

    assert_eq!(
        read_file(&dir, "hmr_l1_10.csv"),
        "HITS,MISSES,HIT_R,MISS_R\n1,1,0.500000,0.500000\n"
    );

    let trace = read_file(&dir, "log_system.lgs");
    assert_eq!(
        trace,
        "0\u{2192}L1::READ({0(0):0(0):0(0)}=0){\n\
         \t\u{2193}[0\u{2190}C_R_MISS$GENERAL]\n\
         \t0\u{2192}MEM::READ({0(0):0(0):0(0)}=0){\n\
         \t\t\u{2193}[100\u{2190}M_R_SUCCESS]\n\
         \t}100\u{2190}M_R_SUCCESS\n\
         \t\u{2193}[100\u{2190}C_R_MISS$ALLOC_SUCCESS]\n\
         }101\u{2190}C_R_MISS$ALLOC_SUCCESS\n\
         \n\
         101\u{2192}L1::READ({0(0):0(0):0(0)}=0){\n\
         \t\u{2193}[101\u{2190}C_R_HIT]\n\
         }102\u{2190}C_R_HIT\n\
         \n"
    );
    assert_trace_is_balanced(&trace);
}

#[test]
fn s2_lru_eviction_in_two_way_set() {
    let dir = scratch_dir("s2");
    // 2 sets x 2 ways; 0, 8, 16 share set 0 with distinct tags.
    // Touching 0 before reading 16 makes 8 the LRU victim, so the
    // final read of 8 misses again.
    let system = run_in(
        &dir,
        "con $1 $4 $1\n\
         scd $1 $16 $2\n\
         scl $1 $1\n\
         sml $10\n\
         inc $1\n\
         tre $0 $0\n\
         tre $8 $1\n\
         tre $0 $2\n\
         tre $16 $3\n\
         tre $8 $4\n\
         pcr $1 $50\n\
         ins\n",
    );
    // Hits: the re-read of 0; misses: 0, 8, 16, and 8 again after
    // its eviction
    assert_eq!(
        read_file(&dir, "hmr_l1_50.csv"),
        "HITS,MISSES,HIT_R,MISS_R\n1,4,0.200000,0.800000\n"
    );
    assert_trace_is_balanced(&read_file(&dir, "log_system.lgs"));
    let _ = system;
}

#[test]
fn s3_wbwa_dirty_write_back() {
    let dir = scratch_dir("s3");
    // 1 set x 1 way; 0 and 4 collide. The second write must push the
    // dirty victim to memory before allocating.
    let system = run_in(
        &dir,
        "con $1 $4 $1\n\
         scd $1 $4 $1\n\
         scl $1 $1\n\
         sml $100\n\
         inc $1\n\
         twr $0 $0\n\
         twr $4 $1\n\
         ins\n",
    );
    // 1 (latency) + 1 (latency) + 100 (dirty write-back)
    assert_eq!(system.clock(), 102);
    let trace = read_file(&dir, "log_system.lgs");
    assert!(trace.contains("\t2\u{2192}MEM::WRITE({0(0):0(0):0(0)}=0){\n"));
    assert!(trace
        .ends_with("}102\u{2190}C_W_MISS$ALLOC_FAILED$POP_DIRTY$WB\n\n"));
    assert_trace_is_balanced(&trace);
}

#[test]
fn s4_wtnwa_write_miss_leaves_cache_unchanged() {
    let dir = scratch_dir("s4");
    let system = run_in(
        &dir,
        "con $1 $4 $2\n\
         scd $1 $16 $1\n\
         scl $1 $1\n\
         sml $100\n\
         inc $1\n\
         twr $8 $0\n\
         pci $1 $5\n\
         ins\n",
    );
    // The write went straight to memory
    assert_eq!(system.clock(), 100);
    let image = read_file(&dir, "img_l1_5.csv");
    let mut lines = image.lines();
    assert_eq!(
        lines.next().unwrap(),
        "B_IND,VALID[0],DIRTY[0],TAG[0],LRU[0]"
    );
    for (set, line) in lines.enumerate() {
        assert_eq!(line, format!("B[{}],0,0,0,0", set));
    }
}

#[test]
fn s5_multi_level_read_miss() {
    let dir = scratch_dir("s5");
    let system = run_in(
        &dir,
        "con $2 $4 $1\n\
         scd $1 $16 $1\n\
         scd $2 $64 $2\n\
         scl $1 $1\n\
         scl $2 $8\n\
         sml $100\n\
         inc $1\n\
         inc $2\n\
         tre $0 $0\n\
         pci $1 $500\n\
         pci $2 $500\n\
         ins\n",
    );
    // memory + L2 + L1 latencies
    assert_eq!(system.clock(), 109);
    // One lookup miss counted at each level
    assert_eq!(system.hierarchy().level(1).unwrap().misses(), 1);
    assert_eq!(system.hierarchy().level(2).unwrap().misses(), 1);
    // Both levels hold the block, clean. L2 installed when memory
    // returned at 100; L1 installed once L2 finished at 108.
    let l1 = read_file(&dir, "img_l1_500.csv");
    assert!(l1.contains("B[0],1,0,0,108"));
    let l2 = read_file(&dir, "img_l2_500.csv");
    assert!(l2.contains("B[0],1,0,0,100"));
    let trace = read_file(&dir, "log_system.lgs");
    assert!(trace.ends_with("}109\u{2190}C_R_MISS$ALLOC_SUCCESS\n\n"));
    assert_trace_is_balanced(&trace);
}

#[test]
fn s6_same_cycle_report_runs_after_access() {
    let dir = scratch_dir("s6");
    // The report is listed before the read but shares its cycle
    run_in(
        &dir,
        "con $1 $4 $1\n\
         scd $1 $16 $1\n\
         scl $1 $1\n\
         sml $100\n\
         inc $1\n\
         pcr $1 $5\n\
         tre $0 $5\n\
         ins\n",
    );
    assert_eq!(
        read_file(&dir, "hmr_l1_5.csv"),
        "HITS,MISSES,HIT_R,MISS_R\n0,1,0.000000,1.000000\n"
    );
}

#[test]
fn hat_stops_the_load_before_ins() {
    let dir = scratch_dir("hat");
    let system = run_in(
        &dir,
        "con $1 $4 $1\n\
         scd $1 $16 $1\n\
         scl $1 $1\n\
         sml $100\n\
         inc $1\n\
         tre $0 $0\n\
         hat\n\
         ins\n",
    );
    // 'ins' was never reached: nothing ran
    assert_eq!(system.clock(), 0);
    assert_eq!(system.out_dir(), dir);
    assert!(!dir.join("hmr_l1_0.csv").exists());
}

#[test]
fn noisy_input_still_runs() {
    let dir = scratch_dir("noise");
    let system = run_in(
        &dir,
        "# a comment-ish token stream\n\
         con $1 $4 $1\n\
         scd $1 $16 $1 bogus tokens here\n\
         scl $1 $1\n\
         scd $9 $16 $1\n\
         sml $100\n\
         inc $1\n\
         tre $0 $0\n\
         ins\n",
    );
    assert_eq!(system.clock(), 101);
}

#[test]
fn repeated_runs_are_byte_stable() {
    let dir_a = scratch_dir("stable-a");
    let dir_b = scratch_dir("stable-b");
    run_in(&dir_a, S1_PROGRAM);
    run_in(&dir_b, S1_PROGRAM);
    assert_eq!(
        read_file(&dir_a, "log_system.lgs"),
        read_file(&dir_b, "log_system.lgs")
    );
    assert_eq!(
        read_file(&dir_a, "hmr_l1_10.csv"),
        read_file(&dir_b, "hmr_l1_10.csv")
    );
}
