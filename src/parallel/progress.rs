use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Records processed across all workers, updated atomically
#[derive(Debug, Default)]
pub struct RecordStats {
    written: AtomicU64,
    skipped: AtomicU64,
}

impl RecordStats {
    pub fn add(&self, written: u64, skipped: u64) {
        self.written.fetch_add(written, Ordering::Relaxed);
        self.skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn counts(&self) -> (u64, u64) {
        (
            self.written.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
        )
    }
}

/// Progress bar over completed chunks for the map phase
#[derive(Clone)]
pub struct ChunkProgress {
    bar: ProgressBar,
    stats: Arc<RecordStats>,
}

impl ChunkProgress {
    pub fn new(total_chunks: usize, workers: usize) -> Self {
        let bar = ProgressBar::new(total_chunks as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} chunks {msg}",
        ) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        bar.set_message(format!("({workers} workers)"));
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            stats: Arc::new(RecordStats::default()),
        }
    }

    /// A progress bar that never draws, for tests and non-interactive runs
    pub fn hidden(total_chunks: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_chunks as u64), ProgressDrawTarget::hidden());
        Self {
            bar,
            stats: Arc::new(RecordStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RecordStats> {
        self.stats.clone()
    }

    /// Called by the executor after every finished chunk
    pub fn update(&self, completed: usize, total: usize) {
        self.bar.set_position(completed as u64);
        let (written, skipped) = self.stats.counts();
        self.bar
            .set_message(format!("{written} records written, {skipped} skipped ({completed}/{total})"));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracks_position_and_stats() {
        let progress = ChunkProgress::hidden(3);
        progress.stats().add(10, 2);
        progress.update(2, 3);

        assert_eq!(progress.position(), 2);
        assert_eq!(progress.stats().counts(), (10, 2));
        progress.finish();
    }
}
