use anyhow::Result;

pub use swlc::config::Config;

/// Reads `.env` and the `SWLC_*` environment variables.
pub fn load() -> Result<Config> {
    Ok(swlc::config::load()?)
}
