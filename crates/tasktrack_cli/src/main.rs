//! Command-line entry point for the tracker core.
//!
//! # Responsibility
//! - Wire configuration, logging and storage from `TASKTRACK_*` variables.
//! - Expose list/export/import over the configured database.

use log::error;
use std::process::ExitCode;
use tasktrack_core::{
    export_to_path, import_from_path, init_logging, open_db, open_db_in_memory, NotificationBus,
    Repository, SqliteTodoRepository, SqliteUserRepository, Todo, TodoVariant, TrackerConfig,
    UserContext, ViewSynchronizer,
};

const USAGE: &str = "usage: tasktrack <version|list|export <file>|import <file>>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("tasktrack: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let command = args.first().map(String::as_str).unwrap_or("list");
    if command == "version" {
        println!("tasktrack_core version={}", tasktrack_core::core_version());
        return Ok(());
    }

    let config = TrackerConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = match &config.db_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let users = SqliteUserRepository::try_new(&conn)
        .map_err(|err| err.to_string())?
        .with_policy(config.add_policy);
    let ctx = UserContext::bootstrap(&users, &config.default_user_name)
        .map_err(|err| err.to_string())?;
    let todos = SqliteTodoRepository::<Todo>::try_new(&conn)
        .map_err(|err| err.to_string())?
        .with_policy(config.add_policy);

    match (command, args.get(1)) {
        ("list", None) => list(&todos, &ctx),
        ("export", Some(path)) => {
            let count = export_to_path(&todos, path).map_err(|err| err.to_string())?;
            println!("exported {count} item(s) to {path}");
            Ok(())
        }
        ("import", Some(path)) => {
            let bus = NotificationBus::new();
            let report = import_from_path(&todos, &bus, path).map_err(|err| err.to_string())?;
            println!(
                "imported={} replaced={} ignored={}",
                report.imported, report.replaced, report.ignored
            );
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn list<R: Repository<Todo>>(todos: &R, ctx: &UserContext) -> Result<(), String> {
    let views = ViewSynchronizer::new();
    views.initialize::<Todo, R>(todos).map_err(|err| err.to_string())?;

    println!("user: {}", ctx.current_user().name);
    println!("unfinished:");
    for item in views.unfinished() {
        println!("  [{}] {} {}", item.kind(), item.id(), item.title());
    }
    println!("completed:");
    for item in views.completed() {
        println!("  [{}] {} {}", item.kind(), item.id(), item.title());
    }
    Ok(())
}
