// src/config.rs
// =============================================================================
// Runtime configuration, validated from the command line.
//
// Everything that can stop the program before the crawl starts is checked
// here: the degree of parallelism, the mirror root and the seeds.
// =============================================================================

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::cli::{canonical_seed, Cli};

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub parallelism: usize,
    pub max_depth: usize,
    /// Absolute mirror root
    pub root: PathBuf,
    /// Canonical seed URLs
    pub seeds: Vec<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub json: bool,
}

impl MirrorConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.par == 0 {
            bail!("the degree of parallelism must be positive");
        }

        let cwd = std::env::current_dir().context("reading the current directory")?;
        let root = resolve_root(&cwd, cli.path.as_deref());

        // A bad seed is not fatal, the others can still be crawled
        let seeds = cli
            .seeds
            .iter()
            .filter_map(|raw| match canonical_seed(raw) {
                Ok(seed) => Some(seed),
                Err(error) => {
                    warn!(url = %raw, %error, "ignoring invalid seed");
                    None
                }
            })
            .collect();

        Ok(Self {
            parallelism: cli.par,
            max_depth: cli.depth,
            root,
            seeds,
            timeout: Duration::from_secs(cli.timeout),
            user_agent: cli.user_agent,
            json: cli.json,
        })
    }
}

// Absolute, lexically cleaned mirror root
fn resolve_root(cwd: &Path, path: Option<&Path>) -> PathBuf {
    let joined = match path {
        Some(path) => cwd.join(path),
        None => cwd.to_path_buf(),
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}
