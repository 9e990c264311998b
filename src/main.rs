use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use hdr_nightmode::progress::LogProgress;
use hdr_nightmode::utils::error_handling::{report_error, report_night_mode_error};
use hdr_nightmode::utils::logging::init_logging;
use hdr_nightmode::utils::pipeline_config::{default_config_path, load_config, save_config};
use hdr_nightmode::{hdr_night_mode, NightModeConfig, NightModeError, NightModeJob};

#[derive(Parser)]
#[command(name = "hdr-nightmode")]
#[command(version, about = "Single-image HDR night mode enhancer", long_about = None)]
struct Cli {
    /// Input image
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output image; the format follows the extension
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of synthetic exposures
    #[arg(short = 'n', long = "exposures", value_name = "N")]
    exposures: Option<usize>,

    /// Brightness increment between exposures
    #[arg(short, long, value_name = "FLOAT")]
    step: Option<f64>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration as JSON and exit
    #[arg(long, value_name = "FILE")]
    dump_config: Option<PathBuf>,

    /// Also write a 960x540 preview of the result
    #[arg(long, value_name = "FILE")]
    preview: Option<PathBuf>,

    /// Number of parallel threads
    #[arg(short = 'j', long, value_name = "N")]
    threads: Option<usize>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn effective_config(&self) -> Result<NightModeConfig, NightModeError> {
        self.effective_config_with(&default_config_path())
    }

    /// Defaults, then the config file, then explicit flags.
    /// Without `--config`, `fallback` is used when it exists.
    fn effective_config_with(&self, fallback: &Path) -> Result<NightModeConfig, NightModeError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None if fallback.is_file() => load_config(fallback)?,
            None => NightModeConfig::default(),
        };
        if let Some(n) = self.exposures {
            config = config.with_exposure_count(n);
        }
        if let Some(step) = self.step {
            config = config.with_exposure_step(step);
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        report_error("threads", e);
    }

    let config = match cli.effective_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    if let Some(path) = &cli.dump_config {
        return match save_config(&config, path) {
            Ok(()) => {
                println!("OK: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    let Some(input) = cli.input.clone() else {
        report_error("params", "no input image given");
        return ExitCode::from(2);
    };

    let mut job = NightModeJob::new(input).with_config(config);
    job.output = cli.output.clone();
    job.preview = cli.preview.clone();

    let progress = LogProgress::new("progress");
    match hdr_night_mode(&job, &progress) {
        Ok(result) => {
            match &result.written {
                Some(path) => println!("OK: {}", path.display()),
                None => println!("OK: {}x{}", result.image.width(), result.image.height()),
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn fail(error: &NightModeError) -> ExitCode {
    report_night_mode_error(error);
    ExitCode::from(error.exit_code() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from(["hdr-nightmode", "in.jpg", "-n", "4", "--step", "0.3", "-vv"]);
        let config = cli.effective_config_with(Path::new("/nonexistent/nightmode.json")).unwrap();
        assert_eq!(config.exposure_count, 4);
        assert_eq!(config.exposure_step, 0.3);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "exposure_count": 9, "exposure_step": 0.5 }"#).unwrap();

        let cli = Cli::parse_from(["hdr-nightmode", "in.jpg", "--config", path.to_str().unwrap(), "-n", "3"]);
        let config = cli.effective_config().unwrap();
        assert_eq!(config.exposure_count, 3);
        assert_eq!(config.exposure_step, 0.5);
    }

    #[test]
    fn test_config_beside_executable_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("nightmode.json");

        let cli = Cli::parse_from(["hdr-nightmode", "in.jpg"]);
        assert_eq!(cli.effective_config_with(&fallback).unwrap(), NightModeConfig::default());

        std::fs::write(&fallback, r#"{ "exposure_count": 7 }"#).unwrap();
        assert_eq!(cli.effective_config_with(&fallback).unwrap().exposure_count, 7);

        let explicit = dir.path().join("explicit.json");
        std::fs::write(&explicit, r#"{ "exposure_count": 11 }"#).unwrap();
        let cli = Cli::parse_from(["hdr-nightmode", "in.jpg", "--config", explicit.to_str().unwrap()]);
        assert_eq!(cli.effective_config_with(&fallback).unwrap().exposure_count, 11);
    }

    #[test]
    fn test_zero_exposures_is_invocation_error() {
        let cli = Cli::parse_from(["hdr-nightmode", "in.jpg", "-n", "0"]);
        let err = cli.effective_config_with(Path::new("/nonexistent/nightmode.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
