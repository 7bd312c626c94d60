//! Interactive chat loop.
//!
//! Lines are questions unless they start with `/`:
//!
//! | Command | Action |
//! |---------|--------|
//! | `/upload <path>` | Upload and process a text file |
//! | `/clear` | Forget all files and the index |
//! | `/history` | Print the conversation so far |
//! | `/help` | List commands |
//! | `/quit` | Leave |

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use textgpt_core::ConversationSession;

use crate::app::{describe_upload, upload_file};

const HELP: &str = "Commands:
  /upload <path>   upload and process a text file
  /clear           remove all files and the index
  /history         show the conversation
  /help            show this help
  /quit            exit
Anything else is sent as a question.";

#[derive(Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    Upload(PathBuf),
    Clear,
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ChatCommand::Ask(line.to_string());
    };

    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    match cmd {
        "upload" if !arg.is_empty() => ChatCommand::Upload(PathBuf::from(arg)),
        "clear" => ChatCommand::Clear,
        "history" => ChatCommand::History,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(line.to_string()),
    }
}

/// Run the loop until `/quit` or end of input.
///
/// Per-line failures are printed and the loop continues.
pub async fn run_loop<R, W>(session: &mut ConversationSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if let Some(greeting) = session.history().last() {
        writeln!(out, "AI: {}", greeting.content)?;
    }

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match parse_command(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Help => writeln!(out, "{}", HELP)?,
            ChatCommand::Unknown(cmd) => writeln!(out, "Unknown command: {} (try /help)", cmd)?,
            ChatCommand::History => {
                for turn in session.history().turns() {
                    writeln!(out, "{}: {}", turn.role.label(), turn.content)?;
                }
            }
            ChatCommand::Clear => match session.clear_files().await {
                Ok(()) => writeln!(out, "AI: {}", last_turn(session))?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            ChatCommand::Upload(path) => {
                writeln!(out, "Processing {}...", path.display())?;
                match upload_file(session, &path).await {
                    Ok(report) => {
                        writeln!(out, "{}", describe_upload(&report))?;
                        writeln!(out, "AI: {}", last_turn(session))?;
                    }
                    Err(e) => writeln!(out, "Error: {:#}", e)?,
                }
            }
            ChatCommand::Ask(question) => match session.ask(&question).await {
                Ok(answer) => writeln!(out, "AI: {}", answer.text)?,
                Err(e) if e.is_user_error() => writeln!(out, "AI: {}", e)?,
                Err(e) => writeln!(out, "Error: {}\nAI: {}", e, last_turn(session))?,
            },
        }
    }
    Ok(())
}

fn last_turn(session: &ConversationSession) -> &str {
    session
        .history()
        .last()
        .map(|t| t.content.as_str())
        .unwrap_or_default()
}

/// Run the loop on stdin/stdout.
pub async fn run_chat(session: &mut ConversationSession) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_loop(session, stdin, &mut stdout).await
}
