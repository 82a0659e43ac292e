//! Run preparation: credentials, config overrides and the output layout.
//!
//! Nothing is created on disk until the credentials check has passed.

use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::layout::OutputLayout;

/// Command-line values that take precedence over `config.yml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
    pub limit: Option<usize>,
}

/// Load the configuration through `lookup`, then create today's layout under
/// the absolute base directory.
pub fn prepare<F>(lookup: F, overrides: &Overrides) -> Result<(Config, OutputLayout)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::load_with(lookup, overrides.config.as_deref())?;
    if let Some(base_dir) = &overrides.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(limit) = overrides.limit {
        config.message_limit = limit;
    }

    fs::create_dir_all(&config.base_dir)?;
    config.base_dir = fs::canonicalize(&config.base_dir)?;

    let layout = OutputLayout::today(&config.base_dir);
    layout.ensure()?;
    Ok((config, layout))
}
