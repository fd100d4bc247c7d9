//! Node group interface editing CLI.
//!
//! Provides the `nodeface` binary. `apply` runs a JSON edit script against a
//! fresh interface and prints the resulting outline; `types` lists the socket
//! kinds a tree type offers.
//!
//! Uses the same `EditSession` pipeline a host application would, so reports
//! and fallback behavior match what an embedding sees.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use nodeface_core::{
    registry, BuiltinTreeType, CustomTreeType, EditSession, InterfaceEdit, InterfaceOutline,
    InterfaceTree, Report, SocketTypeRegistry, TreeType, UpdateTags,
};

/// Node group interface tools.
#[derive(Parser)]
#[command(name = "nodeface", about = "Node group interface tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Apply an edit script to an empty interface and print the outline.
    Apply {
        /// Path to a JSON array of edits.
        script: PathBuf,

        /// Tree type idname the interface belongs to.
        #[arg(short = 't', long, env = "NODEFACE_TREE_TYPE", default_value = "GeometryNodeTree")]
        tree_type: String,

        /// Print compact JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,
    },
    /// List the socket types usable in a tree type.
    Types {
        /// Tree type idname.
        #[arg(short = 't', long, env = "NODEFACE_TREE_TYPE", default_value = "GeometryNodeTree")]
        tree_type: String,
    },
}

/// Machine-readable result of `apply`.
#[derive(Serialize)]
struct ApplyOutput<'a> {
    outline: InterfaceOutline,
    reports: Vec<&'a Report>,
    changed: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Apply {
            script,
            tree_type,
            compact,
        } => run_apply(&script, &tree_type, compact),
        Commands::Types { tree_type } => run_types(&tree_type),
    };
    process::exit(exit_code);
}

/// Builtin tree types by idname; anything else is an unrestricted custom type.
fn tree_type_for(idname: &str) -> Box<dyn TreeType> {
    match BuiltinTreeType::from_idname(idname) {
        Some(builtin) => Box::new(builtin),
        None => Box::new(CustomTreeType::new(idname)),
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    let json = json
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

/// Execute the apply subcommand.
///
/// Returns exit code: 0 = success, 1 = one or more edits failed,
/// 3 = I/O or parse error.
fn run_apply(script: &Path, tree_type: &str, compact: bool) -> i32 {
    let text = match fs::read_to_string(script) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", script.display(), e);
            return 3;
        }
    };
    let edits: Vec<InterfaceEdit> = match serde_json::from_str(&text) {
        Ok(edits) => edits,
        Err(e) => {
            eprintln!("Error: invalid edit script '{}': {}", script.display(), e);
            return 3;
        }
    };

    let registry = match registry::global().read() {
        Ok(guard) => guard,
        Err(_) => {
            eprintln!("Error: socket type registry is poisoned");
            return 3;
        }
    };
    let tree_type = tree_type_for(tree_type);
    let mut tree = InterfaceTree::new();
    let mut tags = UpdateTags::new();

    let mut session = EditSession::new(&mut tree, &registry, tree_type.as_ref());
    let failures = session.apply_all(&edits);
    let reports = session.finish(&mut tags);
    tracing::info!(edits = edits.len(), failures, "applied edit script");

    let output = ApplyOutput {
        outline: tree.outline(),
        reports: reports.iter().collect(),
        changed: tags.is_interface_dirty(),
    };
    print_json(&output, compact);

    if failures > 0 {
        1
    } else {
        0
    }
}

/// Execute the types subcommand.
fn run_types(tree_type: &str) -> i32 {
    let registry = match registry::global().read() {
        Ok(guard) => guard,
        Err(_) => {
            eprintln!("Error: socket type registry is poisoned");
            return 3;
        }
    };
    let tree_type = tree_type_for(tree_type);
    let names = supported_type_names(&registry, tree_type.as_ref());
    print_json(&names, false);
    0
}

fn supported_type_names<'a>(
    registry: &'a SocketTypeRegistry,
    tree_type: &'a dyn TreeType,
) -> Vec<&'a str> {
    registry
        .supported_types(tree_type)
        .map(|info| info.idname())
        .collect()
}
