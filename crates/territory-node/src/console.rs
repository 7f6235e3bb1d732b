//! Line-oriented operator console.
//!
//! Each line on stdin is one command:
//!
//! ```text
//! claim   <region> <x> <z> <owner>
//! unclaim <region> <x> <z>
//! release <region> <x> <z> <owner>
//! owner   <region> <x> <z>
//! stats
//! help
//! ```

use std::sync::Arc;

use territory_ledger::{Cell, ClaimLedger};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::info;

const USAGE: &str = "commands: claim <region> <x> <z> <owner> | unclaim <region> <x> <z> | \
                     release <region> <x> <z> <owner> | owner <region> <x> <z> | stats | help";

/// Console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Assign a cell to an owner
    Claim { cell: Cell, owner: String },
    /// Free a cell regardless of owner
    Unclaim { cell: Cell },
    /// Free a cell only if `owner` holds it
    Release { cell: Cell, owner: String },
    /// Look up a cell's owner
    Owner { cell: Cell },
    /// Print ledger statistics
    Stats,
    /// Print usage
    Help,
}

/// Why a console line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

impl Command {
    /// Parse one console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (verb, args) {
            ("claim", [region, x, z, owner]) => Self::Claim {
                cell: cell(region, x, z)?,
                owner: owner.to_string(),
            },
            ("claim", _) => return Err(ParseError::Usage("claim <region> <x> <z> <owner>")),
            ("unclaim", [region, x, z]) => Self::Unclaim {
                cell: cell(region, x, z)?,
            },
            ("unclaim", _) => return Err(ParseError::Usage("unclaim <region> <x> <z>")),
            ("release", [region, x, z, owner]) => Self::Release {
                cell: cell(region, x, z)?,
                owner: owner.to_string(),
            },
            ("release", _) => return Err(ParseError::Usage("release <region> <x> <z> <owner>")),
            ("owner", [region, x, z]) => Self::Owner {
                cell: cell(region, x, z)?,
            },
            ("owner", _) => return Err(ParseError::Usage("owner <region> <x> <z>")),
            ("stats", []) => Self::Stats,
            ("help", _) => Self::Help,
            (other, _) => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn cell(region: &str, x: &str, z: &str) -> Result<Cell, ParseError> {
    let coord = |s: &str| {
        s.parse::<i32>()
            .map_err(|_| ParseError::InvalidCoordinate(s.to_string()))
    };
    Ok(Cell::new(region, coord(x)?, coord(z)?))
}

/// Run a command against the ledger and render the reply.
pub fn execute_command(command: Command, ledger: &ClaimLedger) -> String {
    match command {
        Command::Claim { cell, owner } => match ledger.claim(cell.clone(), owner.as_str()) {
            Ok(version) => {
                info!(%cell, %owner, version, "claimed via console");
                format!("ok: {} claimed by {} (version {})", cell, owner, version)
            }
            Err(e) => format!("error: {}", e),
        },

        Command::Unclaim { cell } => match ledger.unclaim(&cell) {
            Some(version) => {
                info!(%cell, version, "unclaimed via console");
                format!("ok: {} unclaimed (version {})", cell, version)
            }
            None => format!("ok: {} was not claimed", cell),
        },

        Command::Release { cell, owner } => match ledger.release(&cell, &owner) {
            Ok(Some(version)) => {
                info!(%cell, %owner, version, "released via console");
                format!("ok: {} released by {} (version {})", cell, owner, version)
            }
            Ok(None) => format!("ok: {} is not held by {}", cell, owner),
            Err(e) => format!("error: {}", e),
        },

        Command::Owner { cell } => match ledger.owner_at(&cell) {
            Some(owner) => format!("{} -> {}", cell, owner),
            None => format!("{} -> unclaimed", cell),
        },

        Command::Stats => {
            let stats = ledger.stats();
            format!(
                "version={} claimed={} owners={} log={}/{}",
                stats.version, stats.claimed_cells, stats.owners, stats.log_len, stats.log_capacity
            )
        }

        Command::Help => USAGE.to_string(),
    }
}

/// Read commands from `input` until EOF, printing each reply to stdout.
pub async fn run<R>(input: R, ledger: Arc<ClaimLedger>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match Command::parse(&line) {
            Ok(Some(command)) => execute_command(command, &ledger),
            Ok(None) => continue,
            Err(e) => format!("error: {}", e),
        };
        println!("{}", reply);
    }
    Ok(())
}
