use anyhow::{Context, bail};
use memsim::{
    Config,
    cli::{
        shell::run_shell,
        utils::{read_process_csv, render_snapshot, run_batch, write_finished_csv},
    },
    net::server::run_server,
};
use std::path::PathBuf;
use tokio::runtime::Runtime;

const USAGE: &str = "Usage: memsim [--config <file.json>] <server|shell [url]|run <processes.csv> [finished.csv]>";

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path: Option<PathBuf> = None;
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if pos + 1 >= args.len() {
            bail!("--config needs a path\n{}", USAGE);
        }
        config_path = Some(PathBuf::from(args.remove(pos + 1)));
        args.remove(pos);
    }

    let config = Config::load(config_path.as_deref())?;
    let level: tracing::Level = config.log_level.parse().context("log_level")?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    match command.as_str() {
        "server" => {
            let rt = Runtime::new()?;
            rt.block_on(run_server(config))?;
        }
        "shell" => {
            let url = args
                .get(1)
                .cloned()
                .unwrap_or_else(|| format!("http://{}", config.listen_addr));
            let rt = Runtime::new()?;
            rt.block_on(run_shell(&url))?;
        }
        "run" => {
            let Some(input) = args.get(1) else {
                bail!("run needs a CSV file\n{}", USAGE);
            };
            let specs = read_process_csv(input)?;
            let snapshot = run_batch(&config, &specs)?;
            print!("{}", render_snapshot(&snapshot));
            if let Some(out) = args.get(2) {
                write_finished_csv(&snapshot, out)?;
            }
        }
        other => {
            eprintln!("Unknown command: {}\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
    Ok(())
}
