//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display progress bars in the terminal while an archive is being indexed.
//!
//! Indexing has two phases:
//!
//! * `walking` - a spinner counting files found so far
//! * `fingerprinting` - a bar over the files found, with byte throughput

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for the indexing phases.
///
/// Implement this trait to receive progress updates while an archive is
/// walked and fingerprinted. Fingerprinting calls may arrive from several
/// threads at once.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase ("walking" or "fingerprinting")
    /// * `total` - Total number of items to process, 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of items processed so far (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when an item has been processed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    walking: Mutex<Option<ProgressBar>>,
    fingerprinting: Mutex<Option<ProgressBar>>,
    prefix: Mutex<String>,
    bytes: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use archman::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            walking: Mutex::new(None),
            fingerprinting: Mutex::new(None),
            prefix: Mutex::new(String::new()),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    /// Label the bars of the next phases, e.g. with the archive root.
    pub fn set_prefix(&self, prefix: &str) {
        *lock(&self.prefix) = prefix.to_string();
    }

    /// Bytes fingerprinted since the fingerprinting phase started.
    #[must_use]
    pub fn bytes_completed(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Create a style for the walking phase (spinner).
    fn walking_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    /// Create a style for the fingerprinting phase (progress bar).
    fn fingerprinting_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} ({percent}%) {prefix} {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(&self, path: &str) -> String {
        let prefix = lock(&self.prefix);
        if prefix.is_empty() {
            truncate_path(path, 30)
        } else {
            format!("{}: {}", *prefix, truncate_path(path, 30))
        }
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        lock(&self.fingerprinting)
            .clone()
            .or_else(|| lock(&self.walking).clone())
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            "walking" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::walking_style());
                pb.set_message("Walking archive");
                pb.enable_steady_tick(Duration::from_millis(100));
                *lock(&self.walking) = Some(pb);
            }
            "fingerprinting" => {
                self.bytes.store(0, Ordering::Relaxed);
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::fingerprinting_style());
                pb.set_message("Fingerprinting");
                *lock(&self.fingerprinting) = Some(pb);
            }
            other => log::debug!("Ignoring unknown progress phase '{}'", other),
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.active_bar() {
            pb.set_position(current as u64);
            pb.set_message(self.label(path));
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }

        let total = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if let Some(pb) = lock(&self.fingerprinting).as_ref() {
            let secs = pb.elapsed().as_secs_f64();
            let rate = if secs > 0.0 { (total as f64 / secs) as u64 } else { 0 };
            pb.set_prefix(format!("{} @ {}/s", ByteSize(total), ByteSize(rate)));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let (slot, message) = match phase {
            "walking" => (&self.walking, "Walking complete"),
            "fingerprinting" => (&self.fingerprinting, "Fingerprinting complete"),
            _ => return,
        };
        if let Some(pb) = lock(slot).take() {
            pb.finish_with_message(message);
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }

        self.set_prefix(message);
        if let Some(pb) = self.active_bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
