use std::fs;

use swarmtree_app::logging::{LEADERS_FILE, LOG_FILE, TIMINGS_FILE};
use swarmtree_app::{RunOptions, run};
use swarmtree_core::{SwarmConfig, SwarmWorld};

fn small_world() -> SwarmWorld {
    let config = SwarmConfig {
        num_agents: 150,
        lx: 30.0,
        ly: 30.0,
        lz: 30.0,
        leader_layer: 4,
        rng_seed: Some(0xFACADE),
        ..SwarmConfig::default()
    };
    SwarmWorld::new(config).expect("world")
}

#[test]
fn run_writes_logs_and_frames() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out");
    let mut world = small_world();
    let options = RunOptions {
        check: true,
        frame_width: 160,
        frame_height: 90,
        ..RunOptions::new(3, &out)
    };

    let summaries = run(&mut world, &options).expect("run");
    assert_eq!(summaries.len(), 3);
    assert!(world.combat_enabled());
    assert_eq!(summaries.last().map(|s| s.tick.0), Some(3));

    for iteration in 0..3 {
        let frame = out.join(format!("iteration.{iteration:04}.png"));
        let bytes = fs::read(&frame).expect("frame written");
        assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");
    }

    let log = fs::read_to_string(out.join(LOG_FILE)).expect("log");
    assert_eq!(log.lines().count(), 4);
    let leaders = fs::read_to_string(out.join(LEADERS_FILE)).expect("leaders log");
    let last = leaders.lines().last().expect("row");
    let counts: Vec<usize> = last
        .split_whitespace()
        .skip(1)
        .map(|n| n.parse().expect("count"))
        .collect();
    assert_eq!(counts.len(), world.leaders().len());
    let timings = fs::read_to_string(out.join(TIMINGS_FILE)).expect("timings log");
    assert_eq!(timings.lines().count(), 4);
}

#[test]
fn run_without_images_only_logs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut world = small_world();
    let options = RunOptions {
        images: false,
        ..RunOptions::new(2, dir.path())
    };
    run(&mut world, &options).expect("run");

    let pngs = fs::read_dir(dir.path())
        .expect("listing")
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "png"))
        .count();
    assert_eq!(pngs, 0);
    assert!(dir.path().join(LOG_FILE).exists());
}
