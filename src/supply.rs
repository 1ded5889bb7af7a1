use hashlink::LinkedHashMap;
use log::{debug, info};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};
use ErrorMessage::*;

/// Stored value of a single supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub amount: i64,
    pub identifier: Option<String>,
}

/// Reads a record as older versions of the tool wrote it: a bare number,
/// or an object whose amount may be fractional or quoted and whose
/// identifier may be a number or a boolean. Fractions are truncated.
impl TryFrom<Value> for Record {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(mut fields) => {
                let amount = match fields.remove("amount") {
                    Some(amount) => amount_from(&amount)?,
                    None => return Err("missing field `amount`".to_string()),
                };
                let identifier = identifier_from(fields.remove("identifier").unwrap_or(Value::Null))?;
                Ok(Record { amount, identifier })
            }
            number @ Value::Number(_) => Ok(Record {
                amount: amount_from(&number)?,
                identifier: None,
            }),
            other => Err(format!(
                "expected an amount or {{\"amount\", \"identifier\"}}, found {}",
                other
            )),
        }
    }
}

fn amount_from(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(amount), _) => Ok(amount),
            (None, Some(amount))
                if amount.is_finite()
                    && amount.trunc() >= i64::MIN as f64
                    && amount.trunc() < i64::MAX as f64 =>
            {
                Ok(amount.trunc() as i64)
            }
            _ => Err(format!("amount {} is out of range", number)),
        },
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("amount '{}' is not a number", text)),
        other => Err(format!("amount must be a number, found {}", other)),
    }
}

fn identifier_from(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        other => Err(format!("identifier must be text, found {}", other)),
    }
}

impl Record {
    pub fn new() -> Self {
        Record {
            amount: 0,
            identifier: None,
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Record::new()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.identifier {
            Some(identifier) => write!(f, "{} ({})", self.amount, identifier),
            None => write!(f, "{}", self.amount),
        }
    }
}

/// Every tracked supply, keyed by name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    pub supplies: LinkedHashMap<String, Record>,
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = LinkedHashMap::<String, Value>::deserialize(deserializer)?;
        let mut supplies = LinkedHashMap::new();
        for (name, value) in stored {
            let record = Record::try_from(value)
                .map_err(|e| <D::Error as de::Error>::custom(format!("supply '{}': {}", name, e)))?;
            supplies.insert(name, record);
        }
        Ok(Dataset { supplies })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ErrorMessage {
    MissingRecord,
    DuplicateRecord,
    InvalidAmount,
    MissingArgument,
    IoFailure,
    ParseFailure,
}

impl ErrorMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingRecord => "That supply does not exist",
            DuplicateRecord => "A supply with that name already exists",
            InvalidAmount => "Amounts must be numbers",
            MissingArgument => "Missing argument",
            IoFailure => "Could not access the data file",
            ParseFailure => "The data file is malformed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            MissingArgument => 2,
            MissingRecord => 3,
            DuplicateRecord => 4,
            InvalidAmount => 5,
            IoFailure => 6,
            ParseFailure => 7,
        }
    }
}

impl PartialEq for ErrorMessage {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
pub struct SupplyError {
    pub kind: ErrorMessage,
    pub details: Option<String>,
}

impl Display for SupplyError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.kind, details),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Error for SupplyError {}

impl SupplyError {
    pub fn boxed(kind: ErrorMessage, details: Option<String>) -> Box<dyn Error> {
        Box::new(SupplyError { kind, details })
    }

    pub fn named(kind: ErrorMessage, name: &str) -> Box<dyn Error> {
        SupplyError::boxed(kind, Some(name.to_string()))
    }

    /// Exit code for any error surfaced by the pipeline.
    pub fn exit_code_of(error: &(dyn Error + 'static)) -> i32 {
        match error.downcast_ref::<SupplyError>() {
            Some(e) => e.kind.exit_code(),
            None => 1,
        }
    }
}

/// A validated request against the dataset, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        name: String,
    },
    Show {
        name: String,
    },
    ShowAll,
    Increase {
        name: String,
        delta: i64,
        identifier: Option<String>,
    },
    Decrease {
        name: String,
        delta: i64,
        identifier: Option<String>,
    },
    Set {
        name: String,
        amount: i64,
        identifier: Option<String>,
    },
    SetIdentifier {
        name: String,
        identifier: String,
    },
    Delete {
        name: String,
    },
    DeleteAll,
}

impl Command {
    /// Whether the command needs the stored dataset to be loaded first.
    pub fn reads(&self) -> bool {
        !matches!(self, Command::DeleteAll)
    }

    /// Whether applying the command changes what is on disk.
    pub fn mutates(&self) -> bool {
        !matches!(self, Command::Show { .. } | Command::ShowAll)
    }
}

/// What a command did, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { name: String },
    Increased { name: String, from: i64, to: i64 },
    Decreased { name: String, from: i64, to: i64 },
    Updated { name: String, amount: i64 },
    IdentifierSet { name: String, identifier: String },
    Deleted { name: String },
    Shown { name: String, record: Record },
    Listed(Vec<(String, Record)>),
    Reset,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset {
            supplies: LinkedHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.supplies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supplies.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.supplies.contains_key(name)
    }

    pub fn record(&self, name: &str) -> Result<&Record, Box<dyn Error>> {
        self.supplies
            .get(name)
            .ok_or_else(|| SupplyError::named(MissingRecord, name))
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut Record, Box<dyn Error>> {
        self.supplies
            .get_mut(name)
            .ok_or_else(|| SupplyError::named(MissingRecord, name))
    }

    pub fn create(&mut self, name: &str) -> Result<(), Box<dyn Error>> {
        if self.contains(name) {
            return Err(SupplyError::named(DuplicateRecord, name));
        }
        self.supplies.insert(name.to_string(), Record::new());
        info!("Supply {} created", name);
        Ok(())
    }

    /// Sets the amount and/or identifier of an existing supply. An empty
    /// identifier leaves the stored one in place.
    pub fn update(
        &mut self,
        name: &str,
        amount: Option<i64>,
        identifier: Option<&str>,
    ) -> Result<(), Box<dyn Error>> {
        let record = self.record_mut(name)?;
        if let Some(amount) = amount {
            record.amount = amount;
        }
        if let Some(identifier) = identifier.filter(|i| !i.is_empty()) {
            record.identifier = Some(identifier.to_string());
        }
        debug!("Supply {} now {}", name, record);
        Ok(())
    }

    /// Adds `delta` to the amount, returning the old and new amounts.
    pub fn increase(
        &mut self,
        name: &str,
        delta: i64,
        identifier: Option<&str>,
    ) -> Result<(i64, i64), Box<dyn Error>> {
        self.step(name, identifier, |from| from.checked_add(delta))
    }

    /// Subtracts `delta` from the amount, returning the old and new amounts.
    pub fn decrease(
        &mut self,
        name: &str,
        delta: i64,
        identifier: Option<&str>,
    ) -> Result<(i64, i64), Box<dyn Error>> {
        self.step(name, identifier, |from| from.checked_sub(delta))
    }

    fn step(
        &mut self,
        name: &str,
        identifier: Option<&str>,
        next: impl FnOnce(i64) -> Option<i64>,
    ) -> Result<(i64, i64), Box<dyn Error>> {
        let from = self.record(name)?.amount;
        let to = next(from)
            .ok_or_else(|| SupplyError::boxed(InvalidAmount, Some(format!("{} overflows", name))))?;
        self.update(name, Some(to), identifier)?;
        info!("Supply {} stepped from {} to {}", name, from, to);
        Ok((from, to))
    }

    pub fn delete(&mut self, name: &str) -> Result<Record, Box<dyn Error>> {
        match self.supplies.remove(name) {
            Some(record) => {
                info!("Supply {} removed", name);
                Ok(record)
            }
            None => Err(SupplyError::named(MissingRecord, name)),
        }
    }

    pub fn reset(&mut self) {
        info!("Dropping {} supplies", self.len());
        self.supplies.clear();
    }

    pub fn entries(&self) -> Vec<(String, Record)> {
        self.supplies
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }
}

/// Applies one command to the dataset. Every check runs before anything is
/// written, so a failed command leaves the dataset as it was.
pub fn apply(command: &Command, dataset: &mut Dataset) -> Result<Outcome, Box<dyn Error>> {
    use Command::*;
    match command {
        Create { name } => {
            dataset.create(name)?;
            Ok(Outcome::Created { name: name.clone() })
        }
        Show { name } => {
            let record = dataset.record(name)?.clone();
            Ok(Outcome::Shown {
                name: name.clone(),
                record,
            })
        }
        ShowAll => Ok(Outcome::Listed(dataset.entries())),
        Increase {
            name,
            delta,
            identifier,
        } => {
            let (from, to) = dataset.increase(name, *delta, identifier.as_deref())?;
            Ok(Outcome::Increased {
                name: name.clone(),
                from,
                to,
            })
        }
        Decrease {
            name,
            delta,
            identifier,
        } => {
            let (from, to) = dataset.decrease(name, *delta, identifier.as_deref())?;
            Ok(Outcome::Decreased {
                name: name.clone(),
                from,
                to,
            })
        }
        Set {
            name,
            amount,
            identifier,
        } => {
            dataset.update(name, Some(*amount), identifier.as_deref())?;
            Ok(Outcome::Updated {
                name: name.clone(),
                amount: *amount,
            })
        }
        SetIdentifier { name, identifier } => {
            if identifier.is_empty() {
                return Err(SupplyError::boxed(
                    MissingArgument,
                    Some("--identifier".to_string()),
                ));
            }
            dataset.update(name, None, Some(identifier))?;
            Ok(Outcome::IdentifierSet {
                name: name.clone(),
                identifier: identifier.clone(),
            })
        }
        Delete { name } => {
            dataset.delete(name)?;
            Ok(Outcome::Deleted { name: name.clone() })
        }
        DeleteAll => {
            dataset.reset();
            Ok(Outcome::Reset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(error: Box<dyn Error>) -> ErrorMessage {
        error.downcast_ref::<SupplyError>().unwrap().kind
    }

    fn with_widgets(amount: i64) -> Dataset {
        let mut dataset = Dataset::new();
        dataset.create("widgets").unwrap();
        dataset.update("widgets", Some(amount), None).unwrap();
        dataset
    }

    #[test]
    fn create_starts_at_zero() {
        let mut dataset = Dataset::new();
        apply(&Command::Create { name: "widgets".into() }, &mut dataset).unwrap();
        let shown = apply(&Command::Show { name: "widgets".into() }, &mut dataset).unwrap();
        assert_eq!(
            shown,
            Outcome::Shown {
                name: "widgets".into(),
                record: Record { amount: 0, identifier: None },
            }
        );
    }

    #[test]
    fn create_duplicate_leaves_dataset_alone() {
        let mut dataset = with_widgets(5);
        let before = dataset.clone();
        let err = apply(&Command::Create { name: "widgets".into() }, &mut dataset).unwrap_err();
        assert_eq!(kind_of(err), DuplicateRecord);
        assert_eq!(dataset, before);
    }

    #[test]
    fn increase_then_decrease_restores_amount() {
        let mut dataset = with_widgets(5);
        for delta in [0, 3, -7, 1_000_000] {
            let increase = Command::Increase { name: "widgets".into(), delta, identifier: None };
            let decrease = Command::Decrease { name: "widgets".into(), delta, identifier: None };
            apply(&increase, &mut dataset).unwrap();
            apply(&decrease, &mut dataset).unwrap();
            assert_eq!(dataset.record("widgets").unwrap().amount, 5);
        }
    }

    #[test]
    fn increase_reports_transition() {
        let mut dataset = with_widgets(5);
        let command = Command::Increase { name: "widgets".into(), delta: 3, identifier: None };
        let outcome = apply(&command, &mut dataset).unwrap();
        assert_eq!(outcome, Outcome::Increased { name: "widgets".into(), from: 5, to: 8 });
    }

    #[test]
    fn increase_missing_supply() {
        let mut dataset = Dataset::new();
        let command = Command::Increase { name: "missing".into(), delta: 3, identifier: None };
        let err = apply(&command, &mut dataset).unwrap_err();
        assert_eq!(err.to_string(), "That supply does not exist: missing");
        assert!(dataset.is_empty());
    }

    #[test]
    fn overflow_is_rejected_without_change() {
        let mut dataset = with_widgets(i64::MAX - 1);
        let command = Command::Increase { name: "widgets".into(), delta: 2, identifier: Some("x".into()) };
        let err = apply(&command, &mut dataset).unwrap_err();
        assert_eq!(kind_of(err), InvalidAmount);
        assert_eq!(dataset.record("widgets").unwrap(), &Record { amount: i64::MAX - 1, identifier: None });
    }

    #[test]
    fn set_and_identifier() {
        let mut dataset = with_widgets(5);
        let set = Command::Set { name: "widgets".into(), amount: 42, identifier: Some("shelf-a".into()) };
        apply(&set, &mut dataset).unwrap();
        assert_eq!(dataset.record("widgets").unwrap().to_string(), "42 (shelf-a)");

        let blank = Command::Set { name: "widgets".into(), amount: 1, identifier: Some(String::new()) };
        apply(&blank, &mut dataset).unwrap();
        assert_eq!(dataset.record("widgets").unwrap().identifier.as_deref(), Some("shelf-a"));

        let tag = Command::SetIdentifier { name: "widgets".into(), identifier: "shelf-b".into() };
        apply(&tag, &mut dataset).unwrap();
        assert_eq!(dataset.record("widgets").unwrap(), &Record { amount: 1, identifier: Some("shelf-b".into()) });
    }

    #[test]
    fn delete_then_show_is_missing() {
        let mut dataset = with_widgets(5);
        apply(&Command::Delete { name: "widgets".into() }, &mut dataset).unwrap();
        let err = apply(&Command::Show { name: "widgets".into() }, &mut dataset).unwrap_err();
        assert_eq!(kind_of(err), MissingRecord);
    }

    #[test]
    fn show_all_keeps_insertion_order() {
        let mut dataset = Dataset::new();
        for name in ["zinc", "apples", "mangoes"] {
            dataset.create(name).unwrap();
        }
        match apply(&Command::ShowAll, &mut dataset).unwrap() {
            Outcome::Listed(entries) => {
                let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, ["zinc", "apples", "mangoes"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn legacy_amounts_load_as_records() {
        let dataset: Dataset = serde_json::from_str(r#"{"bolts":7,"nuts":{"amount":2,"identifier":"bin"}}"#).unwrap();
        assert_eq!(dataset.record("bolts").unwrap(), &Record { amount: 7, identifier: None });
        assert_eq!(
            serde_json::to_string(&dataset).unwrap(),
            r#"{"bolts":{"amount":7,"identifier":null},"nuts":{"amount":2,"identifier":"bin"}}"#
        );
    }

    #[test]
    fn decrease_by_most_negative_delta() {
        let mut dataset = with_widgets(-1);
        let command = Command::Decrease { name: "widgets".into(), delta: i64::MIN, identifier: None };
        let outcome = apply(&command, &mut dataset).unwrap();
        assert_eq!(outcome, Outcome::Decreased { name: "widgets".into(), from: -1, to: i64::MAX });

        let again = apply(&command, &mut dataset).unwrap_err();
        assert_eq!(kind_of(again), InvalidAmount);
        assert_eq!(dataset.record("widgets").unwrap().amount, i64::MAX);
    }

    #[test]
    fn loose_records_are_coerced() {
        let dataset: Dataset = serde_json::from_str(
            r#"{"bolts":{"amount":1,"identifier":42},"tape":{"amount":2.9,"identifier":true},"glue":{"amount":"4"}}"#,
        )
        .unwrap();
        assert_eq!(dataset.record("bolts").unwrap(), &Record { amount: 1, identifier: Some("42".into()) });
        assert_eq!(dataset.record("tape").unwrap(), &Record { amount: 2, identifier: Some("true".into()) });
        assert_eq!(dataset.record("glue").unwrap(), &Record { amount: 4, identifier: None });
    }

    #[test]
    fn bad_record_is_named() {
        let err = serde_json::from_str::<Dataset>(r#"{"ok":1,"paint":{"amount":"lots"}}"#).unwrap_err();
        assert!(err.to_string().contains("supply 'paint'"), "{}", err);
        assert!(err.to_string().contains("amount 'lots' is not a number"), "{}", err);

        let err = serde_json::from_str::<Dataset>(r#"{"paint":{"identifier":"x"}}"#).unwrap_err();
        assert!(err.to_string().contains("supply 'paint': missing field `amount`"), "{}", err);

        let err = serde_json::from_str::<Dataset>(r#"{"paint":[1,2]}"#).unwrap_err();
        assert!(err.to_string().contains("supply 'paint': expected an amount"), "{}", err);
    }

    #[test]
    fn read_only_commands_do_not_mutate() {
        assert!(!Command::ShowAll.mutates());
        assert!(!Command::Show { name: "a".into() }.mutates());
        assert!(Command::DeleteAll.mutates());
        assert!(!Command::DeleteAll.reads());
        assert!(Command::Delete { name: "a".into() }.reads());
    }
}
