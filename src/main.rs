use std::io::{BufRead, Write};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use palaver::core::config::{ChatBackend, Config};
use palaver::core::factory::build_services;
use palaver::core::message::Role;
use palaver::core::orchestrator::{Orchestrator, SendOutcome};
use palaver::core::session::ChatMode;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "A line-oriented chat client with standard and multi-agent modes")]
#[command(long_about = "Palaver drives a conversation against a chat backend and keeps \
your sessions on disk.\n\n\
Commands inside the prompt:\n\
  /new              Start a fresh conversation\n\
  /list             List saved sessions for the current mode\n\
  /open <n>         Open the n-th listed session\n\
  /delete <n>       Delete the n-th listed session\n\
  /mode             Toggle between standard and multi-agent mode\n\
  /cancel           Abort a pending reply (Ctrl-C also works while waiting)\n\
  /quit             Exit\n\
Anything else is sent as a message.")]
struct Args {
    /// Start in multi-agent mode
    #[arg(short, long)]
    multi_agent: bool,

    /// Use the offline mock backend regardless of configuration
    #[arg(long)]
    mock: bool,

    /// Directory for the file-backed session store
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if args.mock {
        config.chat_backend = ChatBackend::Mock;
    }
    if args.data_dir.is_some() {
        config.data_dir = args.data_dir;
    }

    let services = build_services(&config)?;
    let mut orchestrator = Orchestrator::from_services(services);
    if args.multi_agent {
        orchestrator.set_mode(ChatMode::MultiAgent);
    }

    if let Err(err) = orchestrator.refresh_sessions().await {
        eprintln!("Could not load saved sessions: {}", err.user_message());
    }
    println!(
        "palaver — {} mode, {} saved session(s). Type /help for commands.",
        orchestrator.mode(),
        orchestrator.sessions().len()
    );

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("Commands: /new /list /open <n> /delete <n> /mode /cancel /quit")
            }
            "/cancel" => {
                if orchestrator.is_pending() {
                    orchestrator.cancel();
                } else {
                    println!("Nothing to cancel. Press Ctrl-C while a reply is pending.");
                }
            }
            "/new" => {
                orchestrator.new_conversation();
                println!("Started a new conversation.");
            }
            "/list" => print_sessions(&orchestrator),
            "/mode" => {
                let next = match orchestrator.mode() {
                    ChatMode::Standard => ChatMode::MultiAgent,
                    ChatMode::MultiAgent => ChatMode::Standard,
                };
                orchestrator.set_mode(next);
                if let Err(err) = orchestrator.refresh_sessions().await {
                    eprintln!("Could not load saved sessions: {}", err.user_message());
                }
                println!("Switched to {} mode.", orchestrator.mode());
            }
            _ if input.starts_with("/open") => {
                match parse_index(input, orchestrator.sessions().len()) {
                    Some(index) => {
                        let id = orchestrator.sessions()[index].id.clone();
                        match orchestrator.select_session(&id).await {
                            Ok(()) => print_transcript(&orchestrator),
                            Err(err) => eprintln!("{}", err.user_message()),
                        }
                    }
                    None => println!("Usage: /open <n> (see /list)"),
                }
            }
            _ if input.starts_with("/delete") => {
                match parse_index(input, orchestrator.sessions().len()) {
                    Some(index) => {
                        let id = orchestrator.sessions()[index].id.clone();
                        match orchestrator.delete_session(&id).await {
                            Ok(()) => println!("Deleted."),
                            Err(err) => eprintln!("{}", err.user_message()),
                        }
                    }
                    None => println!("Usage: /delete <n> (see /list)"),
                }
            }
            _ if input.starts_with('/') => println!("Unknown command. Try /help."),
            message => {
                let before = orchestrator.transcript().len();
                // Ctrl-C aborts the pending send instead of the process; the
                // watcher only lives as long as the send does.
                let cancel = orchestrator.cancel_handle();
                let watcher = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                });
                let outcome = orchestrator.send_message(message).await;
                watcher.abort();
                match outcome {
                    SendOutcome::Sent { .. } | SendOutcome::Failed => {
                        // Skip echoing the turn the user just typed.
                        for turn in orchestrator
                            .transcript()
                            .turns()
                            .iter()
                            .skip(before)
                            .filter(|turn| !turn.is_user())
                        {
                            print_turn(turn);
                        }
                    }
                    SendOutcome::Cancelled => println!("(cancelled)"),
                    SendOutcome::Busy => println!("(still waiting for the previous reply)"),
                }
            }
        }
    }

    Ok(())
}

fn parse_index(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.split_whitespace().nth(1)?.parse().ok()?;
    (n >= 1 && n <= len).then(|| n - 1)
}

fn print_sessions(orchestrator: &Orchestrator) {
    if orchestrator.sessions().is_empty() {
        println!("No saved sessions in {} mode.", orchestrator.mode());
        return;
    }
    for (i, session) in orchestrator.sessions().iter().enumerate() {
        let marker = if orchestrator.active_session_id() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker}{:>3}. {} ({} turns) — {}",
            i + 1,
            session.title,
            session.turn_count,
            session.last_turn_preview
        );
    }
}

fn print_transcript(orchestrator: &Orchestrator) {
    for turn in orchestrator.transcript().iter() {
        print_turn(turn);
    }
}

fn print_turn(turn: &palaver::core::message::Turn) {
    match (&turn.role, &turn.source_agent) {
        (Role::User, _) => println!("You: {}", turn.content),
        (Role::Assistant, Some(agent)) => println!("[{agent}] {}", turn.content),
        (Role::Assistant, None) => println!("Assistant: {}", turn.content),
        _ => println!("! {}", turn.content),
    }
}
