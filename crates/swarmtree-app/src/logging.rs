//! Plain-text run logs written next to the rendered frames.
//!
//! * `log.txt`: centre of mass, its velocity, total mass and kinetic energy.
//! * `log-leaders.txt`: agents per leader.
//! * `log-timings.txt`: the `model` and `image` timing sections.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use swarmtree_core::StepSummary;

use crate::timing::Sections;

pub const LOG_FILE: &str = "log.txt";
pub const LEADERS_FILE: &str = "log-leaders.txt";
pub const TIMINGS_FILE: &str = "log-timings.txt";

/// Sections reported in the timings log, in column order.
pub const TIMED_SECTIONS: [&str; 2] = ["model", "image"];

pub struct RunLog {
    dir: PathBuf,
    log: BufWriter<File>,
    leaders: BufWriter<File>,
    timings: BufWriter<File>,
}

fn create(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = dir.join(name);
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

impl RunLog {
    /// Creates `dir` if needed and truncates the three log files.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        let mut log = create(dir, LOG_FILE)?;
        let mut leaders = create(dir, LEADERS_FILE)?;
        let mut timings = create(dir, TIMINGS_FILE)?;

        writeln!(
            log,
            "# iteration cms_x cms_y cms_z cms_vx cms_vy cms_vz mass kinetic_energy"
        )?;
        writeln!(leaders, "# iteration [agent_counts]")?;
        write!(timings, "# iteration")?;
        for name in TIMED_SECTIONS {
            write!(
                timings,
                " {name}.count {name}.time {name}.count_total {name}.time_total"
            )?;
        }
        writeln!(timings)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            log,
            leaders,
            timings,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends one line to each log and flushes them.
    pub fn record(
        &mut self,
        iteration: usize,
        summary: &StepSummary,
        leader_counts: &[usize],
        sections: &Sections,
    ) -> Result<()> {
        let [x, y, z] = summary.center_of_mass;
        let [vx, vy, vz] = summary.center_of_mass_velocity;
        writeln!(
            self.log,
            "{iteration:4} {x:+.9e} {y:+.9e} {z:+.9e} {vx:+.9e} {vy:+.9e} {vz:+.9e} {:.9e} {:.9e}",
            summary.total_mass, summary.kinetic_energy
        )?;

        write!(self.leaders, "{iteration}")?;
        for count in leader_counts {
            write!(self.leaders, " {count}")?;
        }
        writeln!(self.leaders)?;

        write!(self.timings, "{iteration:3}")?;
        for name in TIMED_SECTIONS {
            match sections.get(name) {
                Some(section) => write!(
                    self.timings,
                    " {:2} {:e} {:2} {:e}",
                    section.count_iteration(),
                    section.total_iteration().as_secs_f64(),
                    section.count(),
                    section.total().as_secs_f64()
                )?,
                None => write!(self.timings, " {:2} {:e} {:2} {:e}", 0, 0.0, 0, 0.0)?,
            }
        }
        writeln!(self.timings)?;

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.log.flush()?;
        self.leaders.flush()?;
        self.timings.flush()?;
        Ok(())
    }
}
