//! Thumbnail pipeline orchestrator
//!
//! Runs fetch → segmentation → matte → composition → inpainting → rescale as
//! one linear sequence. Any failure ends the run with a single typed error;
//! nothing is retried and no placeholder output is produced.

use crate::{
    backends::PassthroughSegmenter,
    compositor::CanvasCompositor,
    config::ThumbnailConfig,
    error::{Result, ThumbnailError},
    fetch::{HttpImageFetcher, ImageSource},
    inpainting::{InpaintRequest, InpaintingEngine, StudioPrompt},
    mask::MaskBuilder,
    payload::ProductPayload,
    rescale::ResultRescaler,
    segmentation::SharedSegmenter,
    services::{ImageIOService, NoOpProgressReporter, PipelineStage, ProgressReporter, ProgressTracker},
    tracing_config::events,
    types::{Composition, PlacementRect, StageTimings, ThumbnailOutput},
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use log::info;
use std::sync::Arc;
use tracing::{debug, info_span, instrument, span, Instrument, Level, Span};

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Run CPU-bound work on tokio's blocking pool
async fn blocking<T, F>(on_panic: impl FnOnce(String) -> ThumbnailError, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| on_panic(format!("Worker task failed: {}", e)))?
}

/// End-to-end thumbnail generator
///
/// Cheap to clone; clones share the segmentation session, engine, image source
/// and progress reporter.
#[derive(Clone)]
pub struct ThumbnailPipeline {
    config: ThumbnailConfig,
    segmenter: SharedSegmenter,
    engine: Option<Arc<dyn InpaintingEngine>>,
    source: Arc<dyn ImageSource>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ThumbnailPipeline {
    /// Create a new pipeline builder
    #[must_use]
    pub fn builder() -> ThumbnailPipelineBuilder {
        ThumbnailPipelineBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Run the local stages on an already loaded image
    ///
    /// Blocks the calling thread for the duration of the segmentation call.
    ///
    /// # Errors
    /// - Segmentation failure
    /// - Degenerate image dimensions
    pub fn compose(&self, image: &DynamicImage) -> Result<Composition> {
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let mut timings = StageTimings::default();
        let result =
            Self::local_stages(&self.segmenter, &self.config, image, &mut tracker, &mut timings);
        if let Err(ref e) = result {
            tracker.report_error(e.stage(), &e.to_string());
        }
        result
    }

    fn local_stages(
        segmenter: &SharedSegmenter,
        config: &ThumbnailConfig,
        image: &DynamicImage,
        tracker: &mut ProgressTracker,
        timings: &mut StageTimings,
    ) -> Result<Composition> {
        let dimensions = image.dimensions();

        tracker.report_stage(PipelineStage::Segmentation);
        let foreground = {
            let _span = span!(
                Level::DEBUG,
                "segmentation",
                width = %dimensions.0,
                height = %dimensions.1
            )
            .entered();
            let start = Instant::now();
            let foreground = segmenter.segment(image)?;
            timings.segmentation_ms = elapsed_ms(start);
            events::stage_timing("segmentation", timings.segmentation_ms);
            foreground
        };

        tracker.report_stage(PipelineStage::Masking);
        let start = Instant::now();
        let matte = MaskBuilder::build_with_policy(&foreground, &config.mask);
        timings.mask_ms = elapsed_ms(start);
        events::stage_timing("masking", timings.mask_ms);
        debug!(
            preserved = matte.preserve_count(),
            regenerated = matte.regenerate_count(),
            "Matte built"
        );

        tracker.report_stage(PipelineStage::Composition);
        let start = Instant::now();
        let composition = CanvasCompositor::compose_with_framing(
            &foreground,
            &matte,
            &config.canvas,
            &config.framing,
        )?;
        timings.composition_ms = elapsed_ms(start);
        events::stage_timing("composition", timings.composition_ms);

        Ok(composition)
    }

    /// Run the local stages and encode the engine request on the blocking pool
    ///
    /// The segmentation session lock is held for the whole model call, so
    /// neither the wait for it nor the call itself may occupy an async worker.
    async fn compose_blocking(
        &self,
        image: DynamicImage,
        prompt: String,
        tracker: &mut ProgressTracker,
        timings: &mut StageTimings,
    ) -> Result<(PlacementRect, InpaintRequest)> {
        let segmenter = self.segmenter.clone();
        let config = self.config.clone();
        let mut worker_tracker = tracker.clone();
        let mut worker_timings = timings.clone();
        let span = Span::current();

        let work = move || -> Result<_> {
            let _entered = span.entered();
            let result = Self::local_stages(
                &segmenter,
                &config,
                &image,
                &mut worker_tracker,
                &mut worker_timings,
            )
            .and_then(|composition| {
                let placement = composition.placement;
                Self::inpaint_request(composition, prompt, &config)
                    .map(|request| (placement, request))
            });
            Ok((worker_tracker, worker_timings, result))
        };
        let (worker_tracker, worker_timings, result) =
            blocking(ThumbnailError::segmentation, work).await?;

        *tracker = worker_tracker;
        *timings = worker_timings;
        result
    }

    /// Produce a publication-size thumbnail for the image at `image_url`
    ///
    /// # Errors
    /// - No inpainting engine configured
    /// - Any stage failure, typed by stage
    #[instrument(skip(self, prompt), fields(url = %image_url))]
    pub async fn run(&self, image_url: &str, prompt: &StudioPrompt) -> Result<ThumbnailOutput> {
        let mut tracker = ProgressTracker::new(Arc::clone(&self.reporter));
        let result = self.execute(image_url, prompt, &mut tracker).await;

        match result {
            Ok(ref output) => {
                tracker.report_stage(PipelineStage::Completed);
                tracker.report_completion(&output.timings);
                info!("{}", output.timings.summary());
            },
            Err(ref e) => tracker.report_error(e.stage(), &e.to_string()),
        }
        result
    }

    /// Validate a product payload and run the pipeline for it
    ///
    /// `style` is the visual description of the product, if one is known.
    ///
    /// # Errors
    /// - Invalid payload
    /// - Any [`ThumbnailPipeline::run`] failure
    pub async fn run_payload(
        &self,
        payload: &ProductPayload,
        style: Option<&str>,
    ) -> Result<ThumbnailOutput> {
        payload.validate()?;
        let prompt = StudioPrompt::new(payload.post_title.as_str(), style);
        self.run(payload.product_image.trim(), &prompt).await
    }

    async fn execute(
        &self,
        image_url: &str,
        prompt: &StudioPrompt,
        tracker: &mut ProgressTracker,
    ) -> Result<ThumbnailOutput> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            ThumbnailError::invalid_config("No inpainting engine configured for this pipeline")
        })?;
        let total_start = Instant::now();
        let mut timings = StageTimings::default();

        tracker.report_stage(PipelineStage::ImageFetch);
        let start = Instant::now();
        let image = self
            .source
            .fetch_image(image_url)
            .instrument(info_span!("fetch", url = %image_url))
            .await?;
        timings.fetch_ms = elapsed_ms(start);
        events::stage_timing("fetch", timings.fetch_ms);

        let (placement, request) = self
            .compose_blocking(image, prompt.render(), tracker, &mut timings)
            .await?;

        tracker.report_stage(PipelineStage::Generation);
        let start = Instant::now();
        let urls = engine
            .generate(&request)
            .instrument(info_span!("generation", engine = %engine.name()))
            .await?;
        let result_url = urls
            .into_iter()
            .next()
            .ok_or_else(|| ThumbnailError::engine("Engine returned no output"))?;
        timings.generation_ms = elapsed_ms(start);
        events::stage_timing("generation", timings.generation_ms);
        info!("Scene generated: {}", result_url);

        tracker.report_stage(PipelineStage::Rescale);
        let start = Instant::now();
        let generated = self
            .source
            .fetch_bytes(&result_url)
            .instrument(info_span!("download_result", url = %result_url))
            .await
            .map_err(|e| ThumbnailError::engine(format!("Failed to download result: {}", e)))?;
        let output_size = self.config.output_size;
        let png_bytes = blocking(ThumbnailError::rescale, move || {
            ResultRescaler::rescale_bytes(&generated, &output_size)
        })
        .await?;
        timings.rescale_ms = elapsed_ms(start);
        events::stage_timing("rescale", timings.rescale_ms);
        timings.total_ms = elapsed_ms(total_start);

        Ok(ThumbnailOutput {
            png_bytes,
            dimensions: (self.config.output_size.width, self.config.output_size.height),
            placement,
            source_url: result_url,
            timings,
        })
    }

    /// Encode the composition for the engine
    fn inpaint_request(
        composition: Composition,
        prompt: String,
        config: &ThumbnailConfig,
    ) -> Result<InpaintRequest> {
        let encode_error =
            |e: image::ImageError| ThumbnailError::composition(format!("Failed to encode canvas: {}", e));
        let canvas_png = ImageIOService::encode_png(&DynamicImage::ImageRgba8(composition.image))
            .map_err(encode_error)?;
        let mask_png = ImageIOService::encode_png(&DynamicImage::ImageLuma8(
            composition.matte.into_image(),
        ))
        .map_err(encode_error)?;

        Ok(InpaintRequest {
            canvas_png,
            mask_png,
            prompt,
            parameters: config.generation.clone(),
        })
    }
}

impl std::fmt::Debug for ThumbnailPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailPipeline")
            .field("config", &self.config)
            .field("segmenter", &self.segmenter)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`ThumbnailPipeline`]
#[derive(Default)]
pub struct ThumbnailPipelineBuilder {
    config: ThumbnailConfig,
    segmenter: Option<SharedSegmenter>,
    engine: Option<Arc<dyn InpaintingEngine>>,
    source: Option<Arc<dyn ImageSource>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl ThumbnailPipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: ThumbnailConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared segmentation session; defaults to pass-through
    #[must_use]
    pub fn segmenter(mut self, segmenter: SharedSegmenter) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    #[must_use]
    pub fn engine<E: InpaintingEngine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    #[must_use]
    pub fn shared_engine(mut self, engine: Arc<dyn InpaintingEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Image source; defaults to an HTTP fetcher using the configured timeout
    #[must_use]
    pub fn image_source<S: ImageSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn progress_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// - Invalid configuration
    /// - The default HTTP fetcher could not be created
    pub fn build(self) -> Result<ThumbnailPipeline> {
        self.config.validate()?;

        let source: Arc<dyn ImageSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpImageFetcher::new(self.config.request_timeout())?),
        };

        Ok(ThumbnailPipeline {
            segmenter: self
                .segmenter
                .unwrap_or_else(|| SharedSegmenter::new(PassthroughSegmenter)),
            engine: self.engine,
            source,
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(NoOpProgressReporter)),
            config: self.config,
        })
    }
}
