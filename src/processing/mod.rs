pub mod border;
pub mod color_processing;
pub mod contrast;
pub mod denoise;
pub mod exposure;
pub mod fusion;
pub mod histogram;
pub mod pipeline;
pub mod pyramid;
pub mod tone_mapping;
