pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod item;
pub mod render;
pub mod storage;
pub mod store;
pub mod watch;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;
    info!(verbose = cli.verbose, quiet = cli.quiet, "starting memo CLI");

    let mut cfg = config::Config::load(cli.memorc.as_deref())?;
    cfg.apply_overrides(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value)));

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let storage = storage::FileStorage::open(&data_dir)
        .with_context(|| format!("failed to open storage at {}", data_dir.display()))?;

    let list_key = cfg.get("list.key").unwrap_or_else(|| "todolist".to_string());
    let mut store = store::TodoStore::rehydrate(Box::new(storage), &list_key)
        .with_context(|| format!("failed to load todo list {list_key:?}"))?;

    let mut renderer = render::Renderer::new(&cfg)?;
    let inv = cli::Invocation::parse(&cfg, cli.rest)?;

    commands::dispatch(&mut store, &cfg, &mut renderer, inv)?;

    info!("done");
    Ok(())
}
