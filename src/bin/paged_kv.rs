//! Interactive shell for a paged-kv store.
//!
//! Usage:
//!   paged-kv [db_path] [--cache-pages <n>]
//!
//! Commands are read from stdin one per line; see `help`.

use clap::Parser;
use paged_kv::{Config, Result, Store};
use std::io::{self, BufRead, Write};
use std::process::exit;
use tracing_subscriber::{fmt, EnvFilter};

/// paged-kv shell
#[derive(Parser, Debug)]
#[command(name = "paged-kv")]
#[command(about = "Interactive shell for the paged-kv store")]
struct Args {
    /// Base path of the store (opens <path>.idx and <path>.dat)
    #[arg(default_value = "mydb")]
    path: String,

    /// Page slots per file
    #[arg(short, long, default_value_t = 100)]
    cache_pages: usize,

    /// Sync every page write to disk
    #[arg(long)]
    sync: bool,
}

fn print_help() {
    println!("\nCommands:");
    println!("  insert <key> <value>  - Insert key-value pair");
    println!("  find <key>            - Find value by key");
    println!("  delete <key>          - Delete key");
    println!("  print                 - Print B-tree structure");
    println!("  scan [start] [end]    - List keys in [start, end)");
    println!("  stats                 - Show store statistics");
    println!("  dump                  - Print B-tree structure as JSON");
    println!("  help                  - Show this help");
    println!("  exit                  - Exit program");
}

fn parse_key(arg: Option<&str>) -> Option<u32> {
    arg.and_then(|s| s.parse().ok())
}

/// Run one command line. Returns `Ok(false)` when the shell should exit.
fn execute(store: &Store, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(true);
    };

    match command {
        "insert" => match (parse_key(parts.next()), parts.next()) {
            (Some(key), Some(value)) => {
                store.put(key, value.as_bytes())?;
                println!("Inserted: {} -> {}", key, value);
            }
            _ => println!("Usage: insert <key> <value>"),
        },

        "find" => match parse_key(parts.next()) {
            Some(key) => match store.get(key)? {
                Some(value) => println!("Found: {} -> {}", key, String::from_utf8_lossy(&value)),
                None => println!("Key {} not found", key),
            },
            None => println!("Usage: find <key>"),
        },

        "delete" => match parse_key(parts.next()) {
            Some(key) => {
                if store.delete(key)? {
                    println!("Deleted key {}", key);
                } else {
                    println!("Key {} not found", key);
                }
            }
            None => println!("Usage: delete <key>"),
        },

        "print" => {
            let stdout = io::stdout();
            store.print_tree(&mut stdout.lock())?;
        }

        "scan" => {
            let start = parse_key(parts.next());
            let end = parse_key(parts.next());
            let results = store.range(start, end)?;
            println!("COUNT: {}", results.len());
            for (key, value) in results {
                println!("{} -> {}", key, String::from_utf8_lossy(&value));
            }
        }

        "stats" => {
            let stats = store.stats()?;
            println!("index_pages: {}", stats.index_pages);
            println!("heap_pages: {}", stats.heap_pages);
            println!("cache_pages: {}", stats.cache_pages);
            println!("tree_height: {}", stats.tree_height);
            println!("key_count: {}", stats.key_count);
            println!("live_records: {}", stats.live_records);
            println!("deleted_records: {}", stats.deleted_records);
        }

        "dump" => {
            let tree = store.export_tree()?;
            match serde_json::to_string_pretty(&tree) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("ERROR: {}", e),
            }
        }

        "help" => print_help(),

        "exit" | "quit" => return Ok(false),

        _ => println!("Unknown command. Type 'help' for commands."),
    }

    Ok(true)
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    println!("Opening store: {}", args.path);
    let config = Config::new(&args.path)
        .cache_pages(args.cache_pages)
        .sync_on_write(args.sync);
    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: Failed to open store: {}", e);
            exit(1);
        }
    };
    println!("Store ready. Type 'help' for commands.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\ndb> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("ERROR: {}", e);
                break;
            }
            None => break,
        };

        match execute(&store, line.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("ERROR: {}", e),
        }
    }

    println!("\nClosing store...");
    if let Err(e) = store.close() {
        eprintln!("ERROR: {}", e);
        exit(1);
    }
}
