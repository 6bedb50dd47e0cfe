//! The iteration loop: step, render, log.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use swarmtree_core::{ChainLink, StepSummary, SwarmConfig, SwarmWorld};
use swarmtree_render::{
    FRAME_EXTENT, FRAME_HEIGHT, FRAME_WIDTH, frame_angle, frame_file_name, render_png_offscreen,
};
use tracing::info;

use crate::logging::RunLog;
use crate::timing::Sections;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub iterations: usize,
    pub output_dir: PathBuf,
    /// Write `iteration.NNNN.png` after every step.
    pub images: bool,
    /// Verify the tree invariant after every step.
    pub check: bool,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_extent: f32,
}

impl RunOptions {
    #[must_use]
    pub fn new(iterations: usize, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            iterations,
            output_dir: output_dir.into(),
            images: true,
            check: false,
            frame_width: FRAME_WIDTH,
            frame_height: FRAME_HEIGHT,
            frame_extent: FRAME_EXTENT,
        }
    }
}

/// Reads a JSON configuration; absent fields keep their defaults.
pub fn load_config(path: &Path) -> Result<SwarmConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("config file {} did not contain valid JSON", path.display()))
}

/// Runs `options.iterations` steps. Rivalry starts with the first step.
pub fn run(world: &mut SwarmWorld, options: &RunOptions) -> Result<Vec<StepSummary>> {
    let mut log = RunLog::create(&options.output_dir)?;
    let mut sections = Sections::new();
    let mut summaries = Vec::with_capacity(options.iterations);

    for iteration in 0..options.iterations {
        if iteration == 0 {
            world.enable_combat_phase();
        }
        let summary = sections
            .time("model", || world.step())
            .with_context(|| format!("simulation aborted in iteration {iteration}"))?;
        if options.check {
            world
                .check_invariants()
                .with_context(|| format!("tree invariant broken after iteration {iteration}"))?;
        }
        if options.images {
            sections.time("image", || save_frame(world, options, iteration))?;
        }
        let leader_counts = world.leader_agent_counts()?;
        log.record(iteration, &summary, &leader_counts, &sections)?;
        sections.next_iteration();
        info!(
            iteration,
            leaders = summary.leader_count,
            enemy_links = summary.enemy_links,
            reparented = summary.reparented,
            "iteration complete"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

fn save_frame(world: &SwarmWorld, options: &RunOptions, iteration: usize) -> Result<()> {
    let png = render_png_offscreen(
        world,
        options.frame_width,
        options.frame_height,
        frame_angle(iteration),
        options.frame_extent,
    )?;
    let path = options.output_dir.join(frame_file_name(iteration));
    fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))
}

/// One line per hop, starting at the inspected agent.
#[must_use]
pub fn format_parent_chain(chain: &[ChainLink]) -> String {
    let mut out = String::new();
    for link in chain {
        let (leader_id, leader_agent) = match link.leader {
            Some(leader) => (i64::from(leader.id.0), leader.agent as i64),
            None => (-1, -1),
        };
        let children = link
            .children
            .iter()
            .map(|c| format!("{c:5}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{:6} (leader_id={leader_id}, leader_agent={leader_agent}, children={{{children}}})",
            link.index
        );
    }
    out
}
