//! Interactive management console.
//!
//! Reads one command per line:
//! ```text
//! add <server>      register a backend, e.g. add localhost:8081
//! remove <server>   deregister a backend
//! list              show registered backends and their health
//! ```
//!
//! Membership operations are synchronous, so the console runs on a plain
//! thread with blocking I/O and never holds up runtime shutdown.

use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::balancer::Balancer;
use crate::load_balancer::{AddOutcome, RemoveOutcome};

pub const USAGE: &str = "Type 'add <server>' to add a server or 'remove <server>' to remove a server.\n\
Example: add localhost:8081 or remove localhost:8082";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("")]
    Empty,

    #[error("Invalid command. Use 'add <server>' or 'remove <server>'.")]
    Malformed,

    #[error("Invalid action. Use 'add' or 'remove'.")]
    UnknownAction(String),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(CommandError::Empty),
        ["list"] => Ok(Command::List),
        ["add", server] => Ok(Command::Add(server.to_string())),
        ["remove", server] => Ok(Command::Remove(server.to_string())),
        [_, _] => Err(CommandError::UnknownAction(parts[0].to_string())),
        _ => Err(CommandError::Malformed),
    }
}

/// Apply one console line to the balancer and return the reply, if any.
pub fn execute(balancer: &Balancer, line: &str) -> Option<String> {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(CommandError::Empty) => return None,
        Err(e) => return Some(e.to_string()),
    };

    let reply = match command {
        Command::Add(server) => match balancer.add_server(&server) {
            Ok(AddOutcome::Added) => format!("Server {} added to the pool.", server),
            Ok(AddOutcome::AlreadyPresent) => format!("Server {} is already in the pool.", server),
            Err(e) => format!("Invalid server address: {}", e),
        },
        Command::Remove(server) => match balancer.remove_server(&server) {
            RemoveOutcome::Removed => format!("Server {} removed from the pool.", server),
            RemoveOutcome::NotPresent => format!("Server {} is not in the pool.", server),
        },
        Command::List => {
            let backends = balancer.backends();
            if backends.is_empty() {
                "No servers in the pool.".to_string()
            } else {
                backends
                    .iter()
                    .map(|b| format!("{} {:?}", b.address, b.state))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    };
    Some(reply)
}

/// Run the console until `input` reaches end of file.
pub fn run_console<R: BufRead, W: Write>(balancer: &Balancer, input: R, mut output: W) -> io::Result<()> {
    writeln!(output, "Load Balancer Management CLI")?;
    writeln!(output, "{}", USAGE)?;

    let mut lines = input.lines();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        if let Some(reply) = execute(balancer, &line?) {
            writeln!(output, "{}", reply)?;
        }
    }

    tracing::debug!("Console input closed");
    Ok(())
}
