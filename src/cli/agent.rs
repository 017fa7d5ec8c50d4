//! Agent command handlers (single message + interactive REPL).

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use arborclaw::agent::{Agent, Navigation};
use arborclaw::session::SiblingDirection;
use arborclaw::tree::NodeId;
use arborclaw::utils::string::preview;

use super::common::create_agent;

/// One line of REPL input.
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Message(String),
    Navigate(Navigation),
    /// Branch an alternate version of the current node
    BranchHere,
    Path,
    Sessions,
    New(String),
    Switch(String),
    Close,
    Help,
    Quit,
    Invalid(String),
}

fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line == "quit" || line == "exit" {
        return ReplCommand::Quit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Message(line.to_string());
    };

    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();
    match name {
        "back" => ReplCommand::Navigate(Navigation::Back),
        "forward" => ReplCommand::Navigate(Navigation::Forward),
        "parent" => ReplCommand::Navigate(Navigation::Parent),
        "next" => ReplCommand::Navigate(Navigation::Sibling(SiblingDirection::Next)),
        "prev" => ReplCommand::Navigate(Navigation::Sibling(SiblingDirection::Previous)),
        "child" => match arg.parse::<usize>() {
            Ok(index) => ReplCommand::Navigate(Navigation::Child(index)),
            Err(_) => ReplCommand::Invalid("usage: /child N".into()),
        },
        "branch" => ReplCommand::BranchHere,
        "path" => ReplCommand::Path,
        "sessions" => ReplCommand::Sessions,
        "new" if !arg.is_empty() => ReplCommand::New(arg.to_string()),
        "new" => ReplCommand::Invalid("usage: /new NAME".into()),
        "switch" if !arg.is_empty() => ReplCommand::Switch(arg.to_string()),
        "switch" => ReplCommand::Invalid("usage: /switch ID".into()),
        "close" => ReplCommand::Close,
        "help" => ReplCommand::Help,
        other => ReplCommand::Invalid(format!("unknown command /{}", other)),
    }
}

const HELP: &str = "\
Commands:
  /back /forward        walk navigation history
  /parent /child N      move up or into the N-th child
  /prev /next           move between siblings
  /branch               alternate version of the current turn
  /path                 show root-to-current path
  /sessions             list sessions
  /new NAME             create a session and switch to it
  /switch ID            switch to a session (id prefix is enough)
  /close                close the current session
  quit | exit           leave";

/// Interactive or single-message agent mode.
pub(crate) async fn cmd_agent(message: Option<String>, session_name: &str) -> Result<()> {
    let (_config, agent) = create_agent()?;
    let mut current = agent.create_session(session_name).await;

    if let Some(msg) = message {
        let reply = agent
            .process_message(&current, &msg)
            .await
            .with_context(|| "Failed to process message")?;
        println!("{}", reply);
        return Ok(());
    }

    println!("ArborClaw Interactive Agent");
    println!("Type your message and press Enter. /help lists commands, 'quit' exits.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }
        if input.trim().is_empty() {
            continue;
        }

        match parse_line(&input) {
            ReplCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Invalid(msg) => eprintln!("{}", msg),
            ReplCommand::Message(text) => match agent.process_message(&current, &text).await {
                Ok(reply) => println!("\n{}\n", reply),
                Err(e) => eprintln!("Error: {}\n", e),
            },
            ReplCommand::Navigate(nav) => report(&agent, &current, agent.navigate(&current, nav).await).await,
            ReplCommand::BranchHere => {
                let here = agent.with_session(&current, |s| s.current()).await?;
                let moved = agent.navigate(&current, Navigation::Branch(here)).await;
                report(&agent, &current, moved).await;
            }
            ReplCommand::Path => print_path(&agent, &current).await?,
            ReplCommand::Sessions => {
                for info in agent.list_sessions().await {
                    let marker = if info.id == current { "*" } else { " " };
                    println!(
                        "{} {}  {:<16} {} messages, {} tokens",
                        marker, info.id, info.name, info.total_messages, info.total_tokens
                    );
                }
            }
            ReplCommand::New(name) => {
                current = agent.create_session(&name).await;
                agent.set_active(&current).await?;
                println!("Created session {} ({})", name, current);
            }
            ReplCommand::Switch(prefix) => match find_session(&agent, &prefix).await {
                Some(id) => {
                    agent.set_active(&id).await?;
                    current = id;
                    println!("Switched to {}", current);
                }
                None => eprintln!("No session matches '{}'", prefix),
            },
            ReplCommand::Close => {
                agent.close_session(&current).await;
                match agent.active_session_id().await {
                    Some(next) => {
                        current = next;
                        println!("Closed. Now in {}", current);
                    }
                    None => {
                        current = agent.create_session(session_name).await;
                        println!("Closed. Started fresh session {}", current);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn find_session(agent: &Agent, prefix: &str) -> Option<String> {
    let mut matches = agent
        .list_sessions()
        .await
        .into_iter()
        .filter(|info| info.id.starts_with(prefix) || info.name == prefix);
    let first = matches.next()?;
    matches.next().is_none().then_some(first.id)
}

async fn report(agent: &Agent, session: &str, moved: arborclaw::Result<NodeId>) {
    match moved {
        Ok(node) => {
            let line = agent
                .with_session(session, |s| {
                    s.tree()
                        .get(node)
                        .map(|n| format!("{} [{:?}] {}", node, n.kind(), preview(n.content(), 60)))
                })
                .await;
            match line {
                Ok(Ok(line)) => println!("at {}", line),
                Ok(Err(e)) | Err(e) => eprintln!("Error: {}", e),
            }
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn print_path(agent: &Agent, session: &str) -> Result<()> {
    let lines = agent
        .with_session(session, |s| -> arborclaw::Result<Vec<String>> {
            let mut lines = Vec::new();
            for id in s.path_to_current()? {
                let node = s.tree().get(id)?;
                let siblings = s
                    .tree()
                    .parent(id)?
                    .map(|p| s.tree().children(p).map(|c| c.len()))
                    .transpose()?
                    .unwrap_or(1);
                lines.push(format!(
                    "{} [{:?}] ({} version(s)) {}",
                    id,
                    node.kind(),
                    siblings,
                    preview(node.content(), 60)
                ));
            }
            Ok(lines)
        })
        .await??;
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
