use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::utils::logging::info_ctx;

pub trait ProgressSink: Send + Sync {
    fn start_indeterminate(&self, message: Option<&str>);
    fn set(&self, progress_0_1: f32, message: Option<&str>);
    fn finish(&self, message: Option<&str>);
    fn reset(&self);
}

/// Progress reported as console log lines
pub struct LogProgress {
    context: String,
    last_update: Mutex<Option<Instant>>, // throttling
    min_interval: Duration,
}

impl LogProgress {
    pub fn new(context: impl Into<String>) -> Self {
        Self::with_interval(context, Duration::from_millis(500))
    }

    pub fn with_interval(context: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            context: context.into(),
            last_update: Mutex::new(None),
            min_interval,
        }
    }

    fn emit(&self, text: String) {
        info_ctx(&self.context, text);
        if let Ok(mut last) = self.last_update.lock() {
            *last = Some(Instant::now());
        }
    }

    fn due(&self) -> bool {
        self.last_update
            .lock()
            .map(|last| last.map_or(true, |t| t.elapsed() >= self.min_interval))
            .unwrap_or(true)
    }
}

fn format_progress(progress_0_1: f32, message: Option<&str>) -> String {
    let percent = (progress_0_1.clamp(0.0, 1.0) * 100.0).round() as u32;
    match message {
        Some(m) => format!("{:>3}% {}", percent, m),
        None => format!("{:>3}%", percent),
    }
}

impl ProgressSink for LogProgress {
    fn start_indeterminate(&self, message: Option<&str>) {
        if let Some(m) = message {
            self.emit(m.to_string());
        }
    }

    fn set(&self, progress_0_1: f32, message: Option<&str>) {
        // Messages mark stage boundaries and are never throttled
        if message.is_some() || self.due() {
            self.emit(format_progress(progress_0_1, message));
        }
    }

    fn finish(&self, message: Option<&str>) {
        self.emit(format_progress(1.0, message));
    }

    fn reset(&self) {
        if let Ok(mut last) = self.last_update.lock() {
            *last = None;
        }
    }
}

pub struct NoopProgress;
impl ProgressSink for NoopProgress {
    fn start_indeterminate(&self, _message: Option<&str>) {}
    fn set(&self, _progress_0_1: f32, _message: Option<&str>) {}
    fn finish(&self, _message: Option<&str>) {}
    fn reset(&self) {}
}

/// Maps a stage's own `[0, 1]` progress onto a `[start, end]` slice of the parent
pub struct StageProgress<'a> {
    parent: &'a dyn ProgressSink,
    start: f32,
    end: f32,
}

impl<'a> StageProgress<'a> {
    pub fn new(parent: &'a dyn ProgressSink, start: f32, end: f32) -> Self {
        Self { parent, start, end }
    }

    fn map(&self, progress_0_1: f32) -> f32 {
        self.start + (self.end - self.start) * progress_0_1.clamp(0.0, 1.0)
    }
}

impl ProgressSink for StageProgress<'_> {
    fn start_indeterminate(&self, message: Option<&str>) {
        self.parent.set(self.start, message);
    }

    fn set(&self, progress_0_1: f32, message: Option<&str>) {
        self.parent.set(self.map(progress_0_1), message);
    }

    fn finish(&self, message: Option<&str>) {
        self.parent.set(self.end, message);
    }

    fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0.5, Some("Denoising")), " 50% Denoising");
        assert_eq!(format_progress(2.0, None), "100%");
        assert_eq!(format_progress(-1.0, None), "  0%");
    }

    #[test]
    fn test_throttling() {
        let progress = LogProgress::with_interval("test", Duration::from_secs(3600));
        assert!(progress.due());
        progress.set(0.1, None);
        assert!(!progress.due());
        progress.reset();
        assert!(progress.due());
    }

    struct Recorder(Mutex<Vec<f32>>);

    impl ProgressSink for Recorder {
        fn start_indeterminate(&self, _message: Option<&str>) {}
        fn set(&self, progress_0_1: f32, _message: Option<&str>) {
            self.0.lock().unwrap().push(progress_0_1);
        }
        fn finish(&self, _message: Option<&str>) {}
        fn reset(&self) {}
    }

    #[test]
    fn test_stage_progress_maps_into_range() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let stage = StageProgress::new(&recorder, 0.25, 0.75);
        stage.set(0.0, None);
        stage.set(0.5, None);
        stage.finish(None);
        stage.set(3.0, None);
        assert_eq!(*recorder.0.lock().unwrap(), vec![0.25, 0.5, 0.75, 0.75]);
    }
}
