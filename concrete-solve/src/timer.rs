//! A simple timer for the phases of a solve.

use std::{
    io::Write,
    time::{Duration, Instant},
};

/// Accumulates named phase durations of a solve.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last: Instant,
    phases: Vec<(String, Duration)>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Starts a timer.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            phases: Vec::new(),
        }
    }

    /// Closes the current phase under `name`.
    pub fn phase(&mut self, name: &str) {
        let now = Instant::now();
        self.phases.push((name.to_string(), now - self.last));
        self.last = now;
    }

    /// Returns the recorded phases.
    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    /// Writes the phase table to `out`.
    ///
    /// # Errors
    ///
    /// Returns any error of the underlying writer.
    pub fn write(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "Time:")?;
        for (phase, duration) in &self.phases {
            writeln!(out, "    {:<15}{:.4}", format!("{phase}:"), duration.as_secs_f64())?;
        }
        writeln!(out, "Total: {:.4}", self.start.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_recorded_in_order() {
        let mut timer = Timer::new();
        timer.phase("setup");
        timer.phase("solve");
        let names: Vec<&str> = timer.phases().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["setup", "solve"]);
    }
}
