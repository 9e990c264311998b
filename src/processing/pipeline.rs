use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::io::image_io::{get_file_name, load_image, save_image, save_preview, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::processing::contrast::{enhance_contrast, ClaheParams};
use crate::processing::denoise::{denoise_colored, DenoiseParams};
use crate::processing::exposure::generate_exposure_images;
use crate::processing::fusion::{merge_mertens, FusionParams};
use crate::processing::tone_mapping::to_8bit;
use crate::progress::{ProgressSink, StageProgress};
use crate::utils::error_handling::{NightModeError, Result};
use crate::utils::logging::{debug_ctx, info_ctx, success_ctx, warn_ctx};

/// Parameters of one night-mode run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightModeConfig {
    pub exposure_count: usize,
    pub exposure_step: f64,
    pub fusion: FusionParams,
    pub denoise: DenoiseParams,
    pub clahe: ClaheParams,
}

impl Default for NightModeConfig {
    fn default() -> Self {
        Self {
            exposure_count: 30,
            exposure_step: 0.1,
            fusion: FusionParams::default(),
            denoise: DenoiseParams::default(),
            clahe: ClaheParams::default(),
        }
    }
}

impl NightModeConfig {
    pub fn with_exposure_count(mut self, count: usize) -> Self {
        self.exposure_count = count;
        self
    }

    pub fn with_exposure_step(mut self, step: f64) -> Self {
        self.exposure_step = step;
        self
    }

    pub fn with_denoise(mut self, denoise: DenoiseParams) -> Self {
        self.denoise = denoise;
        self
    }

    /// Checks every parameter before any pixel work starts
    pub fn validate(&self) -> Result<()> {
        if self.exposure_count < 1 {
            return Err(NightModeError::invalid("exposure_count", "at least one exposure is required"));
        }
        if !self.exposure_step.is_finite() || self.exposure_step <= 0.0 {
            return Err(NightModeError::invalid(
                "exposure_step",
                format!("must be a positive number, got {}", self.exposure_step),
            ));
        }
        self.fusion.validate()?;
        self.denoise.validate()?;
        self.clahe.validate()
    }
}

/// Input, optional outputs and parameters of one run
#[derive(Debug, Clone)]
pub struct NightModeJob {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    pub config: NightModeConfig,
}

impl NightModeJob {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self { input: input.into(), output: None, preview: None, config: NightModeConfig::default() }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_preview(mut self, preview: impl Into<PathBuf>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    pub fn with_config(mut self, config: NightModeConfig) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug)]
pub struct NightModeOutput {
    pub image: RgbImage,
    pub written: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

// Stage boundaries on the overall progress bar
const EXPOSURES_END: f32 = 0.05;
const FUSION_END: f32 = 0.25;
const DENOISE_END: f32 = 0.9;

/// Runs exposures, fusion, tone mapping, denoising and CLAHE on a decoded image
pub fn process_image(image: &RgbImage, config: &NightModeConfig, progress: &dyn ProgressSink) -> Result<RgbImage> {
    config.validate()?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(NightModeError::invalid("image", "input has zero area"));
    }

    let ctx = "pipeline";
    let total = Instant::now();

    progress.set(0.0, Some("Generating exposures"));
    let t = Instant::now();
    let exposures = generate_exposure_images(image, config.exposure_count, config.exposure_step)?;
    debug_ctx(ctx, format!("{} exposures in {:.2?}", exposures.len(), t.elapsed()));
    debug_ctx(ctx, format!("Exposure factors: {:.2?}", exposures.factors()));

    progress.set(EXPOSURES_END, Some("Fusing exposures"));
    let t = Instant::now();
    let fused = merge_mertens(&exposures, &config.fusion)?;
    drop(exposures);
    debug_ctx(ctx, format!("Mertens fusion in {:.2?}", t.elapsed()));

    let ldr = to_8bit(&fused);
    drop(fused);

    progress.set(FUSION_END, Some("Denoising"));
    let t = Instant::now();
    let denoise_progress = StageProgress::new(progress, FUSION_END, DENOISE_END);
    let denoised = denoise_colored(&ldr, &config.denoise, Some(&denoise_progress as &dyn ProgressSink))?;
    debug_ctx(ctx, format!("Non-local means in {:.2?}", t.elapsed()));

    progress.set(DENOISE_END, Some("Enhancing contrast"));
    let t = Instant::now();
    let enhanced = enhance_contrast(&denoised, &config.clahe)?;
    debug_ctx(ctx, format!("CLAHE in {:.2?}", t.elapsed()));

    info_ctx(ctx, format!("{}x{} processed in {:.2?}", width, height, total.elapsed()));
    Ok(enhanced)
}

/// Full run: load, process, then write the requested files. Nothing is written on failure.
pub fn hdr_night_mode(job: &NightModeJob, progress: &dyn ProgressSink) -> Result<NightModeOutput> {
    job.config.validate()?;

    progress.start_indeterminate(Some(&format!("Loading {}", get_file_name(&job.input))));
    let image = load_image(&job.input)?;
    info_ctx(
        "load",
        format!("{} ({}x{})", job.input.display(), image.width(), image.height()),
    );

    let result = process_image(&image, &job.config, progress)?;

    if let Some(path) = &job.output {
        save_image(&result, path)?;
        success_ctx("save", format!("Wrote {}", path.display()));
    }
    if let Some(path) = &job.preview {
        if let Err(e) = save_preview(&result, path, PREVIEW_WIDTH, PREVIEW_HEIGHT) {
            // no partial results
            if let Some(output) = &job.output {
                if let Err(cleanup) = fs::remove_file(output) {
                    warn_ctx("save", format!("Could not remove {}: {}", output.display(), cleanup));
                }
            }
            return Err(e);
        }
        success_ctx("save", format!("Wrote preview {}", path.display()));
    }

    progress.finish(Some("Done"));
    Ok(NightModeOutput { image: result, written: job.output.clone(), preview: job.preview.clone() })
}
