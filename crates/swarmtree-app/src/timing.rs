//! Named wall-clock sections with per-iteration and cumulative totals.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct Section {
    name: String,
    started: Option<Instant>,
    count: u64,
    count_iteration: u64,
    total: Duration,
    total_iteration: Duration,
}

impl Section {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Completed runs since the clock was created.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Completed runs since the last [`Sections::next_iteration`].
    #[must_use]
    pub const fn count_iteration(&self) -> u64 {
        self.count_iteration
    }

    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }

    #[must_use]
    pub const fn total_iteration(&self) -> Duration {
        self.total_iteration
    }
}

/// Handle returned by [`Sections::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionId(usize);

#[derive(Debug, Default)]
pub struct Sections {
    sections: Vec<Section>,
}

impl Sections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing `name`, registering the section on first use.
    pub fn start(&mut self, name: &str) -> SectionId {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    ..Section::default()
                });
                self.sections.len() - 1
            }
        };
        self.sections[index].started = Some(Instant::now());
        SectionId(index)
    }

    /// Stops the section and returns the elapsed time. Ending a section that
    /// was never started records nothing.
    pub fn end(&mut self, id: SectionId) -> Duration {
        let Some(section) = self.sections.get_mut(id.0) else {
            return Duration::ZERO;
        };
        let Some(started) = section.started.take() else {
            return Duration::ZERO;
        };
        let elapsed = started.elapsed();
        section.count += 1;
        section.count_iteration += 1;
        section.total += elapsed;
        section.total_iteration += elapsed;
        elapsed
    }

    /// Times `work` under `name`.
    pub fn time<T>(&mut self, name: &str, work: impl FnOnce() -> T) -> T {
        let id = self.start(name);
        let out = work();
        self.end(id);
        out
    }

    /// Clears the per-iteration counters of every section.
    pub fn next_iteration(&mut self) {
        for section in &mut self.sections {
            section.count_iteration = 0;
            section.total_iteration = Duration::ZERO;
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }
}
