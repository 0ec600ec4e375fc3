use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};

use crate::logging;
use crate::models::{Locator, StoreConfig, QUERY_RESULT_VERSION};
use crate::query;
use crate::server;
use crate::store::BookmarkStore;

mod args;
mod config;
mod format;
mod http_backend;

pub use args::{
    AddArgs, BookmarkFields, Cli, Commands, GetArgs, ImportArgs, OutputFormat, QueryArgs,
    RemoveArgs, ReplaceArgs, ServeArgs, StoreBackendArg, VisitArgs,
};

use config::{
    apply_add_config_defaults, apply_query_config_defaults, apply_serve_config_defaults,
    apply_store_config_defaults, load_cli_config,
};
use http_backend::HttpStoreBackend;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let mut cli = Cli::parse();

    let serving = matches!(cli.command, Some(Commands::Serve(_)));
    logging::init(cli.verbose, serving);

    if cli.schema_version {
        println!("Query result JSON schema version: {QUERY_RESULT_VERSION}");
        return Ok(());
    }

    let cli_config = load_cli_config()?;
    if let Some(ref config) = cli_config {
        apply_store_config_defaults(config, &mut cli);
    }
    let store_config = args::store_config_from_args(&cli);

    match cli.command {
        Some(Commands::Add(mut add_args)) => {
            if let Some(ref config) = cli_config {
                apply_add_config_defaults(config, &mut add_args);
            }

            let bookmark = add_args.to_bookmark()?;
            let stored = if let Some(server_url) =
                effective_server_url(add_args.server.as_deref(), add_args.no_server)
            {
                HttpStoreBackend::new(server_url)?.add(&bookmark)?
            } else {
                open_store(&store_config)?.add(bookmark)?
            };

            match add_args.format {
                OutputFormat::Json => print_json(&stored),
                OutputFormat::Text | OutputFormat::Table => format::print_bookmark(&stored),
            }
        }
        Some(Commands::Get(get_args)) => {
            let locator = Locator::parse(&get_args.url)?;
            let bookmark = open_store(&store_config)?
                .get(&locator)?
                .ok_or_else(|| missing(&locator))?;

            match get_args.format {
                OutputFormat::Json => print_json(&bookmark),
                OutputFormat::Text | OutputFormat::Table => format::print_bookmark(&bookmark),
            }
        }
        Some(Commands::Remove(remove_args)) => {
            let locator = Locator::parse(&remove_args.url)?;
            let removed = open_store(&store_config)?
                .remove(&locator)?
                .ok_or_else(|| missing(&locator))?;

            println!("Removed {}", removed.url);
            Ok(())
        }
        Some(Commands::Replace(replace_args)) => {
            let old = Locator::parse(&replace_args.old_url)?;
            let new = Locator::parse(&replace_args.new_url)?;
            let store = open_store(&store_config)?;

            // Carry the existing record over to the new locator; the
            // modification timestamp is refreshed by the store.
            let mut bookmark = store.get(&old)?.ok_or_else(|| missing(&old))?;
            bookmark.url = new;
            bookmark.modified = None;
            let bookmark = replace_args.fields.apply(bookmark)?;

            let stored = store.replace(&old, bookmark)?;
            println!("Replaced {old} with {}", stored.url);
            Ok(())
        }
        Some(Commands::Visit(visit_args)) => {
            let locator = Locator::parse(&visit_args.url)?;
            let visited = open_store(&store_config)?
                .visit(&locator)?
                .ok_or_else(|| missing(&locator))?;

            println!(
                "Visited {} ({} visits)",
                visited.url,
                visited.visit_count.unwrap_or(0)
            );
            Ok(())
        }
        Some(Commands::Query(mut query_args)) => {
            if let Some(ref config) = cli_config {
                apply_query_config_defaults(config, &mut query_args);
            }

            let request = query_args.to_request();
            let result = if let Some(server_url) =
                effective_server_url(query_args.server.as_deref(), query_args.no_server)
            {
                HttpStoreBackend::new(server_url)?.query(&request)?
            } else {
                query::run_query(&open_store(&store_config)?, &request)?
            };

            match query_args.format {
                OutputFormat::Text => format::print_text(&result),
                OutputFormat::Table => format::print_table(&result),
                OutputFormat::Json => print_json(&result),
            }
        }
        Some(Commands::Import(import_args)) => {
            let bookmarks = import_args.read_bookmarks()?;
            let total = bookmarks.len();
            let summary = open_store(&store_config)?.import(bookmarks)?;

            println!(
                "Imported {total} bookmarks ({} added, {} updated)",
                summary.added, summary.updated
            );
            Ok(())
        }
        Some(Commands::Serve(mut serve_args)) => {
            if let Some(ref config) = cli_config {
                apply_serve_config_defaults(config, &mut serve_args);
            }

            let addr: SocketAddr = serve_args
                .addr
                .parse()
                .with_context(|| format!("invalid listen address '{}'", serve_args.addr))?;
            let store = Arc::new(open_store(&store_config)?);
            println!("Starting markdir HTTP server on http://{addr}");

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(server::run(addr, store))?;
            Ok(())
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<BookmarkStore> {
    BookmarkStore::open(config).with_context(|| {
        format!(
            "failed to open {:?} bookmark store at {}",
            config.backend,
            config.path.display()
        )
    })
}

fn missing(locator: &Locator) -> anyhow::Error {
    anyhow!("no bookmark for '{locator}'")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    serde_json::to_writer(std::io::stdout(), value)?;
    println!();
    Ok(())
}

fn effective_server_url(server_flag: Option<&str>, no_server: bool) -> Option<String> {
    if no_server {
        None
    } else {
        server_flag.map(|s| s.to_string())
    }
}
