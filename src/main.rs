//! abcsession CLI - inspect scene archives through an import session.

use std::env;
use std::process;

use abc_import::session::{NodeId, Session, SessionRegistry};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    match args[1].as_str() {
        "info" | "i" => {
            require_path(&args, "info");
            cmd_info(&args[2]);
        }
        "tree" | "t" => {
            require_path(&args, "tree");
            cmd_tree(&args[2]);
        }
        "help" | "h" | "-h" | "--help" => print_usage(&args[0]),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}

fn require_path(args: &[String], cmd: &str) {
    if args.len() < 3 {
        eprintln!("Usage: {} {} <file.abc>", args[0], cmd);
        process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("abcsession - Inspect scene archives");
    println!();
    println!("Usage: {} <command> <file.abc>", prog);
    println!();
    println!("Commands:");
    println!("  i, info    Show archive info and time range");
    println!("  t, tree    Show the materialized object hierarchy");
    println!("  h, help    Show this help");
}

fn load_or_exit<'a>(registry: &'a mut SessionRegistry, path: &str) -> &'a mut Session {
    let session = registry.get_or_create(1);
    if !session.load(path) {
        eprintln!("Failed to load archive: {}", path);
        process::exit(1);
    }
    session
}

fn cmd_info(path: &str) {
    let mut registry = SessionRegistry::new();
    let session = load_or_exit(&mut registry, path);

    println!("Path:           {}", session.path());
    if let Some(archive) = session.archive() {
        println!("File version:   {}", archive.version());
        println!("Frozen:         {}", archive.is_frozen());
        if !archive.metadata().is_empty() {
            println!("Metadata:       {}", archive.metadata());
        }
    }
    println!("Nodes:          {}", session.node_count());
    println!("Time samplings: {}", session.time_sampling_count());
    for i in 0..session.time_sampling_count() {
        if let Some(ts) = session.time_sampling(i) {
            let (begin, end) = ts.time_range();
            println!(
                "  [{}] max samples {}, range {:.4} .. {:.4}",
                i, ts.max_num_samples, begin, end
            );
        }
    }
    let (begin, end) = session.time_range();
    println!("Time range:     {:.4} .. {:.4}", begin, end);
}

fn cmd_tree(path: &str) {
    let mut registry = SessionRegistry::new();
    let session = load_or_exit(&mut registry, path);

    if let Some(top) = session.top_node() {
        print_node(session, top, 0);
    }
}

fn print_node(session: &Session, id: NodeId, depth: usize) {
    if let Some(node) = session.node(id) {
        let name = if node.name().is_empty() { "/" } else { node.name() };
        let schema = node.object().schema();
        if schema.is_empty() {
            println!("{}{}", "  ".repeat(depth), name);
        } else {
            println!("{}{} [{}]", "  ".repeat(depth), name, schema);
        }
        for &child in node.children() {
            print_node(session, child, depth + 1);
        }
    }
}
