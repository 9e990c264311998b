pub mod image_io;

pub use image_io::{get_file_name, load_image, save_image, save_preview};
