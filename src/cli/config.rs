use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::args::{OutputFormat, StoreBackendArg, DEFAULT_SERVE_ADDR};
use crate::cli::{AddArgs, Cli, QueryArgs, ServeArgs};

/// Top-level representation of `.markdir/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub store: Option<StoreSection>,

    #[serde(default)]
    pub query: Option<QuerySection>,

    #[serde(default)]
    pub serve: Option<ServeSection>,

    #[serde(default)]
    pub http: Option<HttpSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub backend: Option<StoreBackendArg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuerySection {
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    #[serde(default)]
    pub addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    #[serde(default)]
    pub server_url: Option<String>,
}

impl CliConfig {
    fn server_url(&self) -> Option<&String> {
        self.http.as_ref().and_then(|http| http.server_url.as_ref())
    }
}

/// Discover and load a project-local `.markdir/config.toml` (or
/// `.markdir/markdir.toml`) starting from the current working
/// directory and walking up parent directories.
pub fn load_cli_config() -> Result<Option<CliConfig>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let Some(path) = find_project_config(&cwd) else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse TOML config at {}", path.display()))?;

    tracing::debug!(path = %path.display(), "loaded project config");
    Ok(Some(config))
}

fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);

    while let Some(current) = dir {
        let markdir_dir = current.join(".markdir");
        let config_toml = markdir_dir.join("config.toml");
        if config_toml.is_file() {
            return Some(config_toml);
        }

        let markdir_toml = markdir_dir.join("markdir.toml");
        if markdir_toml.is_file() {
            return Some(markdir_toml);
        }

        dir = current.parent();
    }

    None
}

pub fn apply_store_config_defaults(config: &CliConfig, cli: &mut Cli) {
    let Some(store) = &config.store else {
        return;
    };

    if cli.store.is_none() {
        if let Some(path) = &store.path {
            cli.store = Some(path.clone());
        }
    }

    if cli.backend.is_none() {
        if let Some(backend) = store.backend {
            cli.backend = Some(backend);
        }
    }
}

pub fn apply_query_config_defaults(config: &CliConfig, args: &mut QueryArgs) {
    if let Some(query) = &config.query {
        if matches!(args.format, OutputFormat::Text) {
            if let Some(format) = query.format {
                args.format = format;
            }
        }

        if args.server.is_none() {
            args.server = query.server.as_ref().or(config.server_url()).cloned();
        }

        if !args.no_server {
            if let Some(true) = query.no_server {
                args.no_server = true;
            }
        }
    } else if args.server.is_none() {
        args.server = config.server_url().cloned();
    }
}

pub fn apply_add_config_defaults(config: &CliConfig, args: &mut AddArgs) {
    if args.server.is_none() {
        args.server = config.server_url().cloned();
    }
}

pub fn apply_serve_config_defaults(config: &CliConfig, args: &mut ServeArgs) {
    if let Some(serve) = &config.serve {
        if args.addr == DEFAULT_SERVE_ADDR {
            if let Some(addr) = &serve.addr {
                args.addr = addr.clone();
            }
        }
    }
}
