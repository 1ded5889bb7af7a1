//! Colorized messages shown to the user.

use crate::supply::Outcome;
use colored::Colorize;
use std::error::Error;

pub fn failure(message: &str) {
    println!("{}", message.red());
}

pub fn error(error: &dyn Error) {
    failure(&error.to_string());
}

/// Renders an outcome as the lines printed after a command.
pub fn lines(outcome: &Outcome) -> Vec<String> {
    use Outcome::*;
    match outcome {
        Created { name } => vec![format!("{} {}", "Created a new supply".blue(), name.yellow())],
        Increased { name, from, to } => vec![format!(
            "{} {} {} {} {} {}",
            "Increased".blue(),
            name.yellow(),
            "from".blue(),
            from.to_string().white(),
            "to".blue(),
            to.to_string().white()
        )],
        Decreased { name, from, to } => vec![format!(
            "{} {} {} {} {} {}",
            "Decreased".blue(),
            name.yellow(),
            "from".blue(),
            from.to_string().white(),
            "to".blue(),
            to.to_string().white()
        )],
        Updated { name, amount } => vec![format!(
            "{} {} {} {}",
            "Updated".blue(),
            name.yellow(),
            "to".blue(),
            amount.to_string().white()
        )],
        IdentifierSet { name, identifier } => vec![format!(
            "{} {} {}",
            name.yellow(),
            "is now tagged".blue(),
            identifier.white()
        )],
        Deleted { name } => vec![format!("{} {}", "Deleted".blue(), name.yellow())],
        Shown { name, record } => {
            let mut shown = vec![format!(
                "{} {} {}",
                name.yellow(),
                "is currently".blue(),
                record.amount.to_string().white()
            )];
            if let Some(identifier) = &record.identifier {
                shown.push(format!(
                    "{} {} {}",
                    name.yellow(),
                    "has data".blue(),
                    identifier.white()
                ));
            }
            shown
        }
        Listed(entries) if entries.is_empty() => vec!["No supplies tracked yet".blue().to_string()],
        Listed(entries) => {
            let mut listed = vec!["All Supplies".blue().bold().to_string()];
            listed.extend(entries.iter().map(|(name, record)| {
                format!("{} {}", name.yellow(), record.to_string().white())
            }));
            listed
        }
        Reset => vec!["Data reset".blue().to_string()],
    }
}

pub fn outcome(outcome: &Outcome) {
    for line in lines(outcome) {
        println!("{}", line);
    }
}

pub fn destroy_warning() {
    failure("This will destroy all saved data!");
    failure("If you wish to destroy everything, rerun this command with --force");
}
