//! The line-oriented command loop.
//!
//! Commands: `moneyTransfer <src> <dst> <amt>`, `failProcess`,
//! `fixProcess`, `printBlockchain`, `printBalance`. Malformed lines are
//! reported and the loop continues; EOF exits cleanly.

use tokio::io::{AsyncBufReadExt, BufReader};

use paxbank_consensus::{ConsensusError, RoundOutcome};

use crate::{Node, NodeError};

/// A parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoneyTransfer {
        sender_id: u64,
        receiver_id: u64,
        amount: i64,
    },
    FailProcess,
    FixProcess,
    PrintBlockchain,
    PrintBalance,
}

/// Parses one input line. Empty lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, NodeError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head {
        "moneyTransfer" => {
            let mut next_word = || -> Result<&str, NodeError> {
                words.next().ok_or_else(|| {
                    NodeError::InvalidCommand("usage: moneyTransfer <src> <dst> <amt>".into())
                })
            };
            let sender_id = next_word()?;
            let receiver_id = next_word()?;
            let amount = next_word()?;

            Command::MoneyTransfer {
                sender_id: sender_id
                    .parse()
                    .map_err(|_| NodeError::InvalidCommand(format!("bad sender id: {sender_id}")))?,
                receiver_id: receiver_id.parse().map_err(|_| {
                    NodeError::InvalidCommand(format!("bad receiver id: {receiver_id}"))
                })?,
                amount: amount
                    .parse()
                    .map_err(|_| NodeError::InvalidCommand(format!("bad amount: {amount}")))?,
            }
        }
        "failProcess" => Command::FailProcess,
        "fixProcess" => Command::FixProcess,
        "printBlockchain" => Command::PrintBlockchain,
        "printBalance" => Command::PrintBalance,
        other => return Err(NodeError::InvalidCommand(other.to_string())),
    };

    if words.next().is_some() {
        return Err(NodeError::InvalidCommand(format!(
            "trailing input after {head}"
        )));
    }
    Ok(Some(command))
}

/// Reads commands from stdin until EOF, driving the proposer synchronously:
/// a `moneyTransfer` blocks the loop until its round decides or aborts.
pub async fn run(node: &Node) -> Result<(), NodeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(Some(command)) => execute(node, command).await,
            Ok(None) => {}
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}

async fn execute(node: &Node, command: Command) {
    match command {
        Command::MoneyTransfer {
            sender_id,
            receiver_id,
            amount,
        } => match node.money_transfer(sender_id, receiver_id, amount).await {
            Ok(RoundOutcome::Decided(block)) => {
                let value = &block.value;
                if value.sender_id == sender_id
                    && value.receiver_id == receiver_id
                    && value.amount == amount
                {
                    println!("Money transferred.");
                } else {
                    // an earlier accepted value won this slot instead
                    println!(
                        "Slot already carried {}; retry the transfer.",
                        value
                    );
                }
            }
            Ok(RoundOutcome::NotElected { promises }) => {
                println!("Consensus failed ({promises} promises); retry the transfer.");
            }
            Ok(RoundOutcome::NotAccepted { accepted }) => {
                println!("Consensus failed ({accepted} accepts); retry the transfer.");
            }
            Err(
                err @ (ConsensusError::NotProposer { .. }
                | ConsensusError::InsufficientFunds { .. }
                | ConsensusError::Failed),
            ) => println!("{err}"),
            Err(err) => println!("transfer error: {err}"),
        },
        Command::FailProcess => {
            node.fail_process();
            println!("Process failed.");
        }
        Command::FixProcess => {
            node.fix_process();
            println!("Process fixed.");
        }
        Command::PrintBlockchain => {
            print!("{}", node.print_blockchain());
        }
        Command::PrintBalance => {
            println!("{}", node.print_balance());
        }
    }
}
