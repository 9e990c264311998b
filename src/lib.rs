//! Single-image HDR "night mode".
//!
//! A photo is brightened into a stack of synthetic exposures, fused with
//! Mertens exposure fusion, tone mapped to 8 bits, denoised with color
//! non-local means and finished with CLAHE on the Lab lightness channel.

pub mod io;
pub mod processing;
pub mod progress;
pub mod utils;

pub use processing::contrast::ClaheParams;
pub use processing::denoise::DenoiseParams;
pub use processing::fusion::FusionParams;
pub use processing::pipeline::{hdr_night_mode, process_image, NightModeConfig, NightModeJob, NightModeOutput};
pub use utils::error_handling::{NightModeError, Result};
