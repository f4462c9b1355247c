use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::parse_date_expr;
use crate::item::TodoItem;
use crate::render::Renderer;
use crate::store::TodoStore;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "all", "check", "edit", "delete", "purge", "info", "_show", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut TodoStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        ids = ?inv.ids,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "add" => cmd_add(store, &inv.command_args, now),
        "list" => cmd_list(store, renderer, now),
        "all" => cmd_all(store, renderer, now),
        "check" => cmd_check(store, &inv.ids),
        "edit" => cmd_edit(store, &inv.ids, &inv.command_args, now),
        "delete" => cmd_delete(store, &inv.ids),
        "purge" => cmd_purge(store),
        "info" => cmd_info(store, renderer, &inv.ids),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Split command args into the title words and an optional trailing
/// `due:EXPR` modifier (any position, last one wins).
fn parse_title_and_due(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(String, Option<DateTime<Utc>>)> {
    let mut words = Vec::with_capacity(args.len());
    let mut due = None;

    for arg in args {
        if let Some(expr) = arg.strip_prefix("due:") {
            due = Some(
                parse_date_expr(expr, now)
                    .with_context(|| format!("invalid due date expression: {expr}"))?,
            );
        } else {
            words.push(arg.as_str());
        }
    }

    Ok((words.join(" "), due))
}

/// Capture the durable uids behind a set of positional ids before any
/// mutation runs, so a batch cannot act on stale positions.
fn resolve_uids(store: &TodoStore, ids: &[usize]) -> anyhow::Result<Vec<Uuid>> {
    let mut uids = Vec::with_capacity(ids.len());
    for &id in ids {
        uids.push(store.get(id)?.uid);
    }
    Ok(uids)
}

#[instrument(skip(store, args, now))]
fn cmd_add(store: &mut TodoStore, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let (title, due) = parse_title_and_due(args, now)?;
    let id = store.add(title, due.unwrap_or(now))?;

    println!("Created todo {id}.");
    Ok(())
}

#[instrument(skip(store, renderer, now))]
fn cmd_list(store: &TodoStore, renderer: &mut Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command list");

    renderer.print_item_table(&store.visible(), now, false)?;
    Ok(())
}

#[instrument(skip(store, renderer, now))]
fn cmd_all(store: &TodoStore, renderer: &mut Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command all");

    let rows: Vec<&TodoItem> = store.records().iter().collect();
    renderer.print_item_table(&rows, now, true)?;

    println!(
        "{} shown, {} total (soft-deleted included).",
        store.visible().len(),
        store.len()
    );
    Ok(())
}

#[instrument(skip(store, ids))]
fn cmd_check(store: &mut TodoStore, ids: &[usize]) -> anyhow::Result<()> {
    info!("command check");

    if ids.is_empty() {
        return Err(anyhow!("check requires at least one todo id"));
    }

    let uids = resolve_uids(store, ids)?;
    let mut toggled = 0_u64;
    for uid in uids {
        let Some(id) = store.position_of(uid) else {
            warn!(%uid, "todo vanished mid-batch; skipping");
            continue;
        };
        store.toggle_done(id)?;
        toggled += 1;
    }

    println!("Toggled {toggled} todo(s).");
    Ok(())
}

#[instrument(skip(store, ids, args, now))]
fn cmd_edit(
    store: &mut TodoStore,
    ids: &[usize],
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command edit");

    let &[id] = ids else {
        return Err(anyhow!("edit requires exactly one todo id"));
    };
    if args.is_empty() {
        return Err(anyhow!("edit requires replacement text"));
    }

    let (title, due) = parse_title_and_due(args, now)?;
    // the edit form pre-populates the existing due date; keep it unless
    // the user gave a new one
    let due = match due {
        Some(due) => due,
        None => store.get(id)?.due,
    };

    store.edit(id, title, due)?;
    println!("Modified todo {id}.");
    Ok(())
}

#[instrument(skip(store, ids))]
fn cmd_delete(store: &mut TodoStore, ids: &[usize]) -> anyhow::Result<()> {
    info!("command delete");

    if ids.is_empty() {
        return Err(anyhow!("delete requires at least one todo id"));
    }

    let uids = resolve_uids(store, ids)?;
    let mut deleted = 0_u64;
    for uid in uids {
        let Some(id) = store.position_of(uid) else {
            warn!(%uid, "todo vanished mid-batch; skipping");
            continue;
        };
        store.delete(id)?;
        deleted += 1;
    }

    println!("Deleted {deleted} todo(s) (soft-delete).");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_purge(store: &mut TodoStore) -> anyhow::Result<()> {
    info!("command purge");

    let dropped = store.purge()?;
    println!("Purged {dropped} todo(s).");
    Ok(())
}

#[instrument(skip(store, renderer, ids))]
fn cmd_info(store: &TodoStore, renderer: &mut Renderer, ids: &[usize]) -> anyhow::Result<()> {
    info!("command info");

    if ids.is_empty() {
        return Err(anyhow!("info requires at least one todo id"));
    }

    for &id in ids {
        let item = store.get(id)?;
        renderer.print_item_info(item)?;
        println!();
    }

    Ok(())
}

#[instrument(skip(cfg))]
fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (key, value) in cfg.entries() {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: memo [ids] <command> [args]\n\n\
         commands:\n\
         \x20 add <title words> [due:EXPR]    create a todo (due defaults to now)\n\
         \x20 list                            show open and done todos by due date\n\
         \x20 all                             show every record, soft-deleted included\n\
         \x20 <id...> check                   toggle a todo's checkbox\n\
         \x20 <id> edit <title> [due:EXPR]    replace title/due; unchecks the todo\n\
         \x20 <id...> delete                  soft-delete todos\n\
         \x20 purge                           drop soft-deleted records for good\n\
         \x20 <id...> info                    field-by-field dump\n\
         \x20 _show                           print effective configuration\n\n\
         due expressions: now, today, tomorrow, 17:30, 5:30pm, +Nd/+Nh/+Nm,\n\
         RFC3339, YYYY-MM-DD, YYYY-MM-DD HH:MM"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    #[test]
    fn abbreviations_expand_when_unambiguous() {
        let known = known_command_names();

        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("ch", &known), Some("check"));
        assert_eq!(expand_command_abbrev("list", &known), Some("list"));
        // "a" could be add or all
        assert_eq!(expand_command_abbrev("a", &known), None);
        assert_eq!(expand_command_abbrev("frobnicate", &known), None);
    }

    #[test]
    fn title_and_due_split_from_args() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");
        let args = vec![
            "Buy".to_string(),
            "milk".to_string(),
            "due:+2d".to_string(),
        ];

        let (title, due) = parse_title_and_due(&args, now).expect("parse args");
        assert_eq!(title, "Buy milk");
        assert_eq!(due, Some(now + Duration::days(2)));
    }

    #[test]
    fn missing_due_modifier_is_none() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");
        let args = vec!["Pay".to_string(), "rent".to_string()];

        let (title, due) = parse_title_and_due(&args, now).expect("parse args");
        assert_eq!(title, "Pay rent");
        assert!(due.is_none());
    }
}
