use crate::cli::utils::{read_process_csv, render_snapshot, write_finished_csv};
use crate::memory::fit::FitStrategy;
use crate::net::client::SimClient;
use crate::sched::process::ProcessSpec;
use anyhow::{Context, Result, anyhow, bail};
use rustyline::{Editor, error::ReadlineError};

const HELP: &str = "\
commands:
  add <name> <priority> <burst> <size>   queue a process
  tick [n]                                advance the clock n times (default 1)
  start | stop                            let the server tick on its own
  strategy <first|best|worst>             change the fit strategy (stopped only)
  defrag                                  compact dynamic memory (stopped only)
  show                                    print memory and queues
  load <file.csv>                         queue processes from name,priority,burst,size
  export <file.csv>                       write finished processes
  reset                                   clear everything
  exit";

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(ProcessSpec),
    Tick(u32),
    Start,
    Stop,
    Strategy(FitStrategy),
    Defrag,
    Show,
    Load(String),
    Export(String),
    Reset,
    Help,
    Exit,
}

pub fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        bail!("empty command");
    };
    let rest: Vec<&str> = words.collect();
    let number = |s: &str, what: &str| -> Result<i64> {
        s.parse::<i64>()
            .with_context(|| format!("{} must be a number, got '{}'", what, s))
    };

    let cmd = match (head.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("add", [name, prio, burst, size]) => Command::Add(ProcessSpec::new(
            *name,
            number(*prio, "priority")?,
            number(*burst, "burst")?,
            number(*size, "size")?,
        )),
        ("add", _) => bail!("usage: add <name> <priority> <burst> <size>"),
        ("tick", []) => Command::Tick(1),
        ("tick", [n]) => Command::Tick(
            n.parse()
                .with_context(|| format!("tick count must be a number, got '{}'", n))?,
        ),
        ("start", []) => Command::Start,
        ("stop", []) => Command::Stop,
        ("strategy", [s]) => Command::Strategy(s.parse().map_err(|e: String| anyhow!(e))?),
        ("defrag" | "defragment", []) => Command::Defrag,
        ("show" | "ls", []) => Command::Show,
        ("load", [path]) => Command::Load(path.to_string()),
        ("export", [path]) => Command::Export(path.to_string()),
        ("reset", []) => Command::Reset,
        ("help" | "?", _) => Command::Help,
        ("exit" | "quit", _) => Command::Exit,
        (other, _) => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(cmd)
}

pub async fn run_shell(base_url: &str) -> Result<()> {
    let client = SimClient::new(base_url);
    client
        .snapshot()
        .await
        .with_context(|| format!("No simulator reachable at {}", base_url))?;

    let mut rl = Editor::<()>::new()?;
    println!("Connected to {}. Type 'help' for commands.", base_url);
    loop {
        match rl.readline("memsim> ") {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                let cmd = match parse_command(&line) {
                    Ok(c) => c,
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                if cmd == Command::Exit {
                    break;
                }
                if let Err(e) = execute(&client, cmd).await {
                    println!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn execute(client: &SimClient, cmd: Command) -> Result<()> {
    match cmd {
        Command::Add(spec) => {
            let id = client.add_process(&spec).await?;
            println!("queued P{} ({})", id, spec.name);
        }
        Command::Tick(n) => {
            for _ in 0..n {
                let report = client.tick().await?;
                println!(
                    "tick {}: completed {:?}, placed {:?}, waiting {:?}",
                    report.tick, report.completed, report.placed, report.still_waiting
                );
            }
        }
        Command::Start => {
            client.start().await?;
            println!("running");
        }
        Command::Stop => {
            client.stop().await?;
            println!("stopped");
        }
        Command::Strategy(s) => {
            client.set_strategy(s).await?;
            println!("strategy set to {}", s);
        }
        Command::Defrag => {
            let report = client.defragment().await?;
            for (tag, outcome) in report.regions {
                println!("{}: {:?}", tag, outcome);
            }
        }
        Command::Show => print!("{}", render_snapshot(&client.snapshot().await?)),
        Command::Load(path) => {
            for spec in read_process_csv(&path)? {
                match client.add_process(&spec).await {
                    Ok(id) => println!("queued P{} ({})", id, spec.name),
                    Err(e) => println!("skipped {}: {}", spec.name, e),
                }
            }
        }
        Command::Export(path) => {
            let snap = client.snapshot().await?;
            write_finished_csv(&snap, &path)?;
            println!("wrote {} finished process(es) to {}", snap.finished.len(), path);
        }
        Command::Reset => {
            client.reset().await?;
            println!("reset");
        }
        Command::Help => println!("{}", HELP),
        Command::Exit => {}
    }
    Ok(())
}
