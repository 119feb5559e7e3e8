//! Progress reporting service
//!
//! Keeps progress reporting out of the pipeline logic so the CLI and library
//! callers can each decide how stage transitions are surfaced.

use crate::types::StageTimings;
use instant::Instant;
use std::sync::Arc;

/// Stages of a thumbnail pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Downloading and decoding the source image
    ImageFetch,
    /// Separating the product from its background
    Segmentation,
    /// Deriving the binary matte from transparency
    Masking,
    /// Placing product and matte on the canvas
    Composition,
    /// Waiting on the inpainting engine
    Generation,
    /// Downloading and resizing the engine result
    Rescale,
    /// Pipeline finished
    Completed,
}

impl PipelineStage {
    /// Stages in execution order
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::ImageFetch,
        PipelineStage::Segmentation,
        PipelineStage::Masking,
        PipelineStage::Composition,
        PipelineStage::Generation,
        PipelineStage::Rescale,
        PipelineStage::Completed,
    ];

    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::ImageFetch => "Fetching source image",
            PipelineStage::Segmentation => "Removing background",
            PipelineStage::Masking => "Building inpainting matte",
            PipelineStage::Composition => "Composing studio canvas",
            PipelineStage::Generation => "Generating studio scene",
            PipelineStage::Rescale => "Rescaling thumbnail",
            PipelineStage::Completed => "Thumbnail completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            PipelineStage::ImageFetch => 5,
            PipelineStage::Segmentation => 15,
            PipelineStage::Masking => 25,
            PipelineStage::Composition => 30,
            // Generation dominates wall-clock time
            PipelineStage::Generation => 40,
            PipelineStage::Rescale => 95,
            PipelineStage::Completed => 100,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: PipelineStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the run started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: PipelineStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(stage: PipelineStage, description: String, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Trait for reporting progress during a pipeline run
pub trait ProgressReporter: Send + Sync {
    /// Report a stage transition
    fn report_progress(&self, update: ProgressUpdate);

    /// Report completion with final timings
    fn report_completion(&self, timings: &StageTimings);

    /// Report an error raised during `stage`
    fn report_error(&self, stage: PipelineStage, error: &str);
}

/// Progress reporter that discards everything
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &StageTimings) {}

    fn report_error(&self, _stage: PipelineStage, _error: &str) {}
}

/// Reporter that forwards progress to the log
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a console reporter; `verbose` adds elapsed times and the
    /// per-stage timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &StageTimings) {
        log::info!("✅ Thumbnail generated in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Fetch: {}ms", timings.fetch_ms);
            log::info!("    • Segmentation: {}ms", timings.segmentation_ms);
            log::info!("    • Mask: {}ms", timings.mask_ms);
            log::info!("    • Composition: {}ms", timings.composition_ms);
            log::info!(
                "    • Generation: {}ms ({:.0}%)",
                timings.generation_ms,
                timings.generation_ratio() * 100.0
            );
            log::info!("    • Rescale: {}ms", timings.rescale_ms);
        }
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Tracks the current stage and elapsed time for a single run
#[derive(Clone)]
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<PipelineStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Tracker with a no-op reporter
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    /// Tracker with a console reporter
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Arc::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report entering a stage
    pub fn report_stage(&mut self, stage: PipelineStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report entering a stage with a custom description
    pub fn report_stage_with_description(&mut self, stage: PipelineStage, description: String) {
        self.current_stage = Some(stage);
        self.reporter.report_progress(ProgressUpdate::with_description(
            stage,
            description,
            self.start_time,
        ));
    }

    pub fn report_completion(&self, timings: &StageTimings) {
        self.reporter.report_completion(timings);
    }

    /// Report an error, attributed to `stage` or the current stage
    pub fn report_error(&self, stage: Option<PipelineStage>, error: &str) {
        let stage = stage
            .or(self.current_stage)
            .unwrap_or(PipelineStage::ImageFetch);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<PipelineStage> {
        self.current_stage
    }
}
