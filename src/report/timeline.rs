//! Execution Timeline
//!
//! Tracks step start/end times for the end-of-run summary.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::execution::StepKind;

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
    /// Step was not run
    Skipped,
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub step: StepKind,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Records when each provisioning step starts and finishes.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step: StepKind, event_type: EventType) {
        self.events.push(TimelineEvent {
            step,
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Time from timeline creation to the last recorded event.
    pub fn total(&self) -> Duration {
        self.events
            .last()
            .map(|e| e.timestamp.duration_since(self.start_time))
            .unwrap_or_default()
    }

    /// Returns step durations in milliseconds, for steps that finished.
    pub fn get_durations(&self) -> HashMap<StepKind, u128> {
        self.spans()
            .into_iter()
            .map(|(step, start, end)| (step, end - start))
            .collect()
    }

    /// Generates an ASCII chart with one bar per finished step.
    ///
    /// Steps run sequentially, so the bars form a staircase.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.total().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        for (step, start, end) in self.spans() {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:18} |{:<50}| ({} ms)\n",
                truncate(step.name(), 18),
                bar,
                end - start
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    /// (step, start ms, end ms) in start order.
    fn spans(&self) -> Vec<(StepKind, u128, u128)> {
        let mut starts: HashMap<StepKind, u128> = HashMap::new();
        let mut spans = Vec::new();

        for event in &self.events {
            let elapsed = event.timestamp.duration_since(self.start_time).as_millis();

            match event.event_type {
                EventType::Started => {
                    starts.insert(event.step, elapsed);
                }
                EventType::Completed | EventType::Failed => {
                    if let Some(start) = starts.remove(&event.step) {
                        spans.push((event.step, start, elapsed));
                    }
                }
                EventType::Skipped => {}
            }
        }

        spans.sort_by_key(|(_, start, _)| *start);
        spans
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events.is_empty());
        assert_eq!(timeline.total(), Duration::ZERO);
    }

    #[test]
    fn test_get_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(StepKind::CleanCache, EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event(StepKind::CleanCache, EventType::Completed);

        let durations = timeline.get_durations();
        assert!(*durations.get(&StepKind::CleanCache).unwrap() >= 50);
    }

    #[test]
    fn test_failed_step_has_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(StepKind::UpdateEnvironment, EventType::Started);
        timeline.add_event(StepKind::UpdateEnvironment, EventType::Failed);

        assert!(timeline.get_durations().contains_key(&StepKind::UpdateEnvironment));
    }

    #[test]
    fn test_skipped_and_unfinished_steps_have_no_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(StepKind::ShellInit, EventType::Started);
        timeline.add_event(StepKind::Activate, EventType::Skipped);

        let durations = timeline.get_durations();
        assert!(durations.is_empty());
        assert_eq!(timeline.get_events().len(), 2);
    }

    #[test]
    fn test_step_can_run_twice() {
        let mut timeline = ExecutionTimeline::new();
        for _ in 0..2 {
            timeline.add_event(StepKind::Activate, EventType::Started);
            timeline.add_event(StepKind::Activate, EventType::Completed);
        }
        assert_eq!(timeline.spans().len(), 2);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event(StepKind::ShellInit, EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event(StepKind::ShellInit, EventType::Completed);

        timeline.add_event(StepKind::UpdateEnvironment, EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event(StepKind::UpdateEnvironment, EventType::Completed);

        let chart = timeline.gantt_chart();
        assert!(chart.contains("shell-init"));
        assert!(chart.contains("update-environment"));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let chart = ExecutionTimeline::new().gantt_chart();
        assert!(chart.contains("Timeline"));
        assert!(!chart.contains("Total:"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc  ");
        assert_eq!(truncate("update-environment", 10), "update-...");
    }
}
