mod shell;

use clap::Parser;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use wayfinder::PopPolicy;
use wayfinder::core::config::{self, CliOverrides, WayfinderConfig};

#[derive(Parser)]
#[command(name = "wayfinder", about = "Component-tree navigation shell")]
struct Args {
    /// What popping the last screen does
    #[arg(long, value_enum)]
    pop_policy: Option<PopPolicy>,

    /// Where session snapshots are kept
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    /// Start in multi-pane layout
    #[arg(long)]
    multi_pane: bool,

    /// Neither restore nor save the session
    #[arg(long)]
    no_persistence: bool,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}; using defaults");
            WayfinderConfig::default()
        }
    };
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            pop_policy: args.pop_policy,
            state_dir: args.state_dir,
            log_level: args.log_level,
            multi_pane: args.multi_pane.then_some(true),
            no_persistence: args.no_persistence,
        },
    );

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(resolved.log_level, log_config, log_file);
    }

    log::info!(
        "Wayfinder starting up (pop policy {:?}, state dir {})",
        resolved.pop_policy,
        resolved.state_dir.display()
    );

    shell::run(resolved)
}
