use crate::{
    report,
    storage::{Config, Storage},
    supply::{apply, Command, Dataset, ErrorMessage::*, Outcome, SupplyError},
};
use clap::{ArgAction, Parser, Subcommand};
use log::debug;
use std::{error::Error, path::PathBuf};

#[derive(Parser, Debug)]
#[command(name = "scom", version, about = "Keep count of named supplies in a JSON file")]
pub struct Cli {
    /// Data file to read and write
    #[arg(long, global = true, env = "SCOM_DATA")]
    pub data: Option<PathBuf>,
    /// Log more detail to stderr (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    /// Print without colors
    #[arg(long, global = true)]
    pub no_color: bool,
    #[clap(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a supply with amount 0
    Create {
        #[arg(long, short)]
        name: Option<String>,
    },
    /// Print the amount and identifier of a supply
    Show { name: Option<String> },
    /// Print every supply
    ShowAll,
    /// Add the sum of every -e to a supply
    Increase {
        name: Option<String>,
        #[arg(short = 'e', long = "element", allow_negative_numbers = true)]
        elements: Vec<String>,
        #[arg(short, long)]
        identifier: Option<String>,
    },
    /// Subtract the sum of every -e from a supply
    Decrease {
        name: Option<String>,
        #[arg(short = 'e', long = "element", allow_negative_numbers = true)]
        elements: Vec<String>,
        #[arg(short, long)]
        identifier: Option<String>,
    },
    /// Set the amount of a supply explicitly
    Set {
        name: Option<String>,
        #[arg(short = 'e', long = "element", allow_negative_numbers = true)]
        elements: Vec<String>,
        #[arg(short, long)]
        identifier: Option<String>,
    },
    /// Tag a supply with an identifier
    SetIdentifier {
        name: Option<String>,
        #[arg(short, long)]
        identifier: Option<String>,
    },
    /// Remove a supply
    Delete { name: Option<String> },
    /// Remove every supply
    DeleteAll {
        #[arg(long)]
        force: bool,
    },
    #[command(external_subcommand)]
    External(Vec<String>),
}

struct Usage;

impl Usage {
    const CREATE: &'static str = "Usage: scom create --name [-n] <name>";
    const SHOW: &'static str = "Usage: scom show <supply>";
    const INCREASE: &'static str =
        "Usage: scom increase <supply> [-i [--identifier] <identifier>] [-e [--element] <element>]...";
    const DECREASE: &'static str =
        "Usage: scom decrease <supply> [-i [--identifier] <identifier>] -e [--element] <element>...";
    const SET: &'static str =
        "Usage: scom set <supply> [-i [--identifier] <identifier>] -e [--element] <amount>";
    const SET_IDENTIFIER: &'static str =
        "Usage: scom set-identifier <supply> -i [--identifier] <identifier>";
    const DELETE: &'static str = "Usage: scom delete <supply>";
    const UNKNOWN: &'static str = "Unknown command. See scom --help";
}

fn required<T>(value: Option<T>, usage: &str) -> Result<T, Box<dyn Error>> {
    value.ok_or_else(|| SupplyError::boxed(MissingArgument, Some(usage.to_string())))
}

struct Parsing;

impl Parsing {
    /// A value is numeric when, trimmed, it reads as a whole `i64`.
    fn amount(value: &str) -> Result<i64, Box<dyn Error>> {
        match value.trim().parse::<i64>() {
            Ok(amount) => Ok(amount),
            Err(_) => Err(SupplyError::boxed(
                InvalidAmount,
                Some(format!("'{}'", value)),
            )),
        }
    }

    fn sum(elements: &[String]) -> Result<i64, Box<dyn Error>> {
        elements.iter().try_fold(0i64, |total, element| {
            let amount = Parsing::amount(element)?;
            total.checked_add(amount).ok_or_else(|| {
                SupplyError::boxed(InvalidAmount, Some("sum of elements overflows".to_string()))
            })
        })
    }

    fn elements(elements: Vec<String>, usage: &str) -> Result<i64, Box<dyn Error>> {
        if elements.is_empty() {
            return Err(SupplyError::boxed(MissingArgument, Some(usage.to_string())));
        }
        Parsing::sum(&elements)
    }
}

fn resolve_cmd(cmd: Commands) -> Result<Command, Box<dyn Error>> {
    use Commands::*;
    let command = match cmd {
        Create { name } => Command::Create {
            name: required(name, Usage::CREATE)?,
        },
        Show { name } => Command::Show {
            name: required(name, Usage::SHOW)?,
        },
        ShowAll => Command::ShowAll,
        Increase {
            name,
            elements,
            identifier,
        } => Command::Increase {
            name: required(name, Usage::INCREASE)?,
            delta: Parsing::sum(&elements)?,
            identifier,
        },
        Decrease {
            name,
            elements,
            identifier,
        } => Command::Decrease {
            name: required(name, Usage::DECREASE)?,
            delta: Parsing::elements(elements, Usage::DECREASE)?,
            identifier,
        },
        Set {
            name,
            elements,
            identifier,
        } => Command::Set {
            name: required(name, Usage::SET)?,
            amount: Parsing::elements(elements, Usage::SET)?,
            identifier,
        },
        SetIdentifier { name, identifier } => Command::SetIdentifier {
            name: required(name, Usage::SET_IDENTIFIER)?,
            identifier: required(identifier, Usage::SET_IDENTIFIER)?,
        },
        Delete { name } => Command::Delete {
            name: required(name, Usage::DELETE)?,
        },
        DeleteAll { force } => {
            if !force {
                report::destroy_warning();
                return Err(SupplyError::boxed(
                    MissingArgument,
                    Some("--force".to_string()),
                ));
            }
            Command::DeleteAll
        }
        External(args) => {
            debug!("Unrecognized arguments {:?}", args);
            return Err(SupplyError::boxed(
                MissingArgument,
                Some(Usage::UNKNOWN.to_string()),
            ));
        }
    };
    debug!("Resolved {:?}", command);
    Ok(command)
}

/// Resolves one command, loads the dataset when the command depends on it,
/// applies the command and writes the file back when anything changed.
/// `delete-all` never reads the file, so it also clears one that fails to load.
pub fn run(cli: Cli) -> Result<Outcome, Box<dyn Error>> {
    let config = Config::new(cli.data);
    Storage::init_empty(&config.data_path)?;

    let command = match cli.cmd {
        Some(cmd) => resolve_cmd(cmd)?,
        None => return Err(SupplyError::boxed(MissingArgument, Some(Usage::UNKNOWN.to_string()))),
    };

    let mut dataset = if command.reads() {
        Storage::load(&config.data_path)?
    } else {
        Dataset::new()
    };

    let outcome = apply(&command, &mut dataset)?;
    if command.mutates() {
        Storage::save(&config.data_path, &dataset)?;
    }
    Ok(outcome)
}
