use clap::Parser;

/// Command-line flags. Everything else comes from the configuration file and environment.
#[derive(Parser, Debug)]
#[command(author, version, about = "Receive WAV uploads, resample to PCM and forward them to a player")]
pub struct Args {
    /// Enable debug logging (overridden by RUST_LOG when set)
    #[arg(short, long)]
    pub debug: bool,

    /// Configuration file name without extension (config.toml, config.json, ...)
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

impl Args {
    /// Default tracing filter when RUST_LOG is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "audio_relay_backend=debug,actix_web=debug"
        } else {
            "audio_relay_backend=info,actix_web=info"
        }
    }
}
