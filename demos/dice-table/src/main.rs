//! A command-line dice table for a Coterie play-together session.
//!
//! Joins a session, prints what everyone rolls and says, and reads
//! commands from stdin. Type `help` for the list.

use std::path::PathBuf;

use clap::Parser;
use coterie::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  roll <pool> [hunger]         roll a pool, <hunger> of them blood dice
  reroll <i> [j] [k]           willpower reroll of up to three regular dice
  rouse <hunger>               rouse the blood
  remorse <humanity> <stains>  remorse check
  say <text>                   chat
  who                          list participants
  reconnect                    connect again after giving up
  leave                        leave the session and forget it
  quit                         exit, remembering the session";

#[derive(Parser)]
#[command(
    name = "dice-table",
    about = "Shared dice table for a Coterie play-together session",
    version
)]
struct Cli {
    /// Session server endpoint
    #[arg(long, default_value = coterie::DEFAULT_URL)]
    url: String,

    /// Character name shown on your rolls and messages
    #[arg(short, long)]
    character: Option<String>,

    /// Join the session of this coterie
    #[arg(long, conflicts_with = "session")]
    coterie: Option<String>,

    /// Join this temporary session
    #[arg(long)]
    session: Option<String>,

    /// Where the last joined session is remembered between runs
    #[arg(long, default_value = "coterie-session.json")]
    state_file: PathBuf,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum TableCommand {
    Roll { pool: usize, hunger: u8 },
    Reroll(Vec<usize>),
    Rouse(u8),
    Remorse { humanity: u8, stains: u8 },
    Say(String),
    Who,
    Reconnect,
    Leave,
    Quit,
    Help,
}

/// Parses one input line. Blank lines yield `None`.
fn parse(line: &str) -> Result<Option<TableCommand>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word {
        "" => return Ok(None),
        "roll" => match args.as_slice() {
            [pool] => TableCommand::Roll {
                pool: number(pool)?,
                hunger: 0,
            },
            [pool, hunger] => TableCommand::Roll {
                pool: number(pool)?,
                hunger: number(hunger)?,
            },
            _ => return Err("usage: roll <pool> [hunger]".into()),
        },
        "reroll" => {
            let indices = args
                .iter()
                .map(|a| number::<usize>(a))
                .collect::<Result<Vec<_>, _>>()?;
            if indices.is_empty() {
                return Err("usage: reroll <i> [j] [k]".into());
            }
            TableCommand::Reroll(indices)
        }
        "rouse" => match args.as_slice() {
            [hunger] => TableCommand::Rouse(number(hunger)?),
            _ => return Err("usage: rouse <hunger>".into()),
        },
        "remorse" => match args.as_slice() {
            [humanity, stains] => TableCommand::Remorse {
                humanity: number(humanity)?,
                stains: number(stains)?,
            },
            _ => return Err("usage: remorse <humanity> <stains>".into()),
        },
        "say" => TableCommand::Say(rest.to_owned()),
        "who" => TableCommand::Who,
        "reconnect" => TableCommand::Reconnect,
        "leave" => TableCommand::Leave,
        "quit" | "exit" => TableCommand::Quit,
        "help" | "?" => TableCommand::Help,
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };
    Ok(Some(command))
}

fn number<T: std::str::FromStr>(arg: &str) -> Result<T, String> {
    arg.parse().map_err(|_| format!("`{arg}` is not a number"))
}

/// Runs one command. Returns `false` when the table should close.
async fn run(
    client: &ClientHandle,
    command: TableCommand,
    last_roll: &mut Option<RollRecord>,
) -> Result<bool, CoterieError> {
    match command {
        TableCommand::Roll { pool, hunger } => {
            *last_roll = Some(client.roll_pool(pool, hunger).await?);
        }
        TableCommand::Reroll(indices) => match last_roll.clone() {
            Some(record) => {
                *last_roll = Some(client.reroll(record, indices).await?);
            }
            None => println!("nothing to reroll yet"),
        },
        TableCommand::Rouse(hunger) => {
            client.rouse_check(hunger).await?;
        }
        TableCommand::Remorse { humanity, stains } => {
            client.remorse_check(humanity, stains).await?;
        }
        TableCommand::Say(text) => client.send_chat(text).await?,
        TableCommand::Who => {
            let snapshot = client.snapshot().await?;
            for participant in &snapshot.participants {
                println!("  {}", participant_name(participant));
            }
        }
        TableCommand::Reconnect => client.connect().await?,
        TableCommand::Leave => {
            client.leave_session().await?;
            return Ok(false);
        }
        TableCommand::Quit => return Ok(false),
        TableCommand::Help => println!("{HELP}"),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn participant_name(p: &Participant) -> String {
    match &p.character_name {
        Some(character) => format!("{character} ({})", p.user_name),
        None => p.user_name.clone(),
    }
}

fn author_name(author: &Author) -> &str {
    author
        .character_name
        .as_deref()
        .or(author.user_name.as_deref())
        .unwrap_or("someone")
}

fn describe(event: &Event) -> String {
    match event {
        Event::ChatMessage(e) => format!(
            "<{}> {}",
            author_name(&e.author),
            e.message
        ),
        Event::DiceRoll(e) => {
            let roll = &e.roll_data;
            let dice: Vec<String> =
                roll.dice.iter().map(ToString::to_string).collect();
            let outcomes: Vec<String> =
                roll.results.iter().map(|r| r.kind.to_string()).collect();
            format!(
                "{} rolled [{}] for {} successes ({})",
                author_name(&e.author),
                dice.join(" "),
                roll.total_successes,
                outcomes.join(", ")
            )
        }
        Event::RouseCheck(e) => format!(
            "{} rouses the blood: {} ({}), hunger now {}",
            author_name(&e.author),
            e.roll,
            if e.success { "steady" } else { "hungrier" },
            e.new_hunger
        ),
        Event::RemorseCheck(e) => format!(
            "{} feels remorse: {:?} {}, humanity now {}",
            author_name(&e.author),
            e.rolls,
            if e.passed { "passed" } else { "failed" },
            e.new_humanity
        ),
        Event::Error(e) => format!("! server: {}", e.message),
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::StateChanged(state) => println!("* {state}"),
        ClientEvent::SessionJoined {
            session_id,
            session_type,
        } => println!("* joined {session_type} session {session_id}"),
        ClientEvent::ParticipantJoined(p) => {
            println!("* {} sits down", participant_name(p))
        }
        ClientEvent::ParticipantLeft(p) => {
            println!("* {} leaves", participant_name(p))
        }
        ClientEvent::EventAppended { event, .. } => {
            println!("{}", describe(event))
        }
        ClientEvent::EventReplaced { event, .. } => {
            println!("(reroll) {}", describe(event))
        }
        ClientEvent::ReconnectScheduled { attempt, delay } => println!(
            "* connection lost, retry {attempt} in {}s",
            delay.as_secs()
        ),
        ClientEvent::ReconnectExhausted => {
            println!("* could not reconnect, type `reconnect` to try again")
        }
        ClientEvent::ProtocolViolation(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::new(cli.url);
    if let Some(name) = cli.character {
        config = config.with_character_name(name);
    }
    let (client, task) =
        coterie::spawn_websocket(config, FileStorage::new(cli.state_file));

    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let reference = match (cli.coterie, cli.session) {
        (Some(coterie), _) => Some(SessionReference::coterie(coterie)),
        (None, Some(session)) => Some(SessionReference::session(session)),
        (None, None) => None,
    };
    let remembered = client.snapshot().await?.last_join.is_some();
    match reference {
        Some(reference) => client.join_session(reference).await?,
        // Resume the session remembered from the last run.
        None if remembered => client.connect().await?,
        None => client.join_session(SessionReference::default()).await?,
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_roll = None;
    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                eprintln!("{usage}");
                continue;
            }
        };
        match run(&client, command, &mut last_roll).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    client.shutdown().await?;
    task.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roll_defaults_hunger_to_zero() {
        assert_eq!(
            parse("roll 6"),
            Ok(Some(TableCommand::Roll { pool: 6, hunger: 0 }))
        );
        assert_eq!(
            parse("  roll 5 2 "),
            Ok(Some(TableCommand::Roll { pool: 5, hunger: 2 }))
        );
    }

    #[test]
    fn test_parse_say_keeps_text() {
        assert_eq!(
            parse("say the prince is late"),
            Ok(Some(TableCommand::Say("the prince is late".into())))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse("roll").is_err());
        assert!(parse("roll x").is_err());
        assert!(parse("reroll").is_err());
        assert!(parse("dance").is_err());
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_describe_roll_lists_dice_and_outcomes() {
        let record = RollRecord::from_dice(vec![
            DieFace::blood(10).unwrap(),
            DieFace::regular(10).unwrap(),
            DieFace::regular(7).unwrap(),
        ]);
        let event = Event::DiceRoll(DiceRollEvent {
            roll_data: record,
            author: Default::default(),
            timestamp: Default::default(),
        });
        let text = describe(&event);
        assert!(text.starts_with("someone rolled [10* 10 7] for 3 successes"));
    }
}
