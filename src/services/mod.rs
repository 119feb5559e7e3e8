//! Services separating I/O and progress concerns from the pipeline stages

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, PipelineStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
