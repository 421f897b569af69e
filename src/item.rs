//! Item model for tasks and notes.
//!
//! Items are stored as JSON records keyed by id. A record carries an `isTask`
//! discriminant which selects between the [`Task`] and [`Note`] shapes.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Board assigned to items created without an explicit board
pub const DEFAULT_BOARD: &str = "My Board";

/// Default chrono format for the human readable creation date
pub const DEFAULT_DATE_FORMAT: &str = "%a %b %d %Y";

fn default_boards() -> Vec<String> {
    vec![DEFAULT_BOARD.to_string()]
}

/// Normalizes a list of board names: trims, strips a leading `@`,
/// drops empties and duplicates while keeping order.
pub fn normalize_boards<I, S>(boards: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for board in boards {
        let name = board.as_ref().trim();
        let name = name.strip_prefix('@').unwrap_or(name).trim();
        if !name.is_empty() && !out.iter().any(|b| b == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn deserialize_boards<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let boards = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    let boards = normalize_boards(boards);
    Ok(if boards.is_empty() { default_boards() } else { boards })
}

// 0 and null both mean "no due date"
fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.filter(|&ms| ms != 0))
}

/// Task priority tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    #[default]
    Normal = 1,
    Medium = 2,
    High = 3,
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Normal),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(format!("invalid priority: {}", other)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Normal => "normal",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

/// A task with progress state, priority and an optional due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default = "default_boards", deserialize_with = "deserialize_boards")]
    pub boards: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default)]
    pub is_canceled: bool,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_due_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<i64>,
}

impl Task {
    /// Creates a pending, normal priority task on the default board, stamped now.
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        let now = Local::now();
        Task {
            id,
            date: now.format(DEFAULT_DATE_FORMAT).to_string(),
            timestamp: now.timestamp_millis(),
            description: description.into(),
            is_starred: false,
            boards: default_boards(),
            priority: Priority::default(),
            in_progress: false,
            is_canceled: false,
            is_complete: false,
            due_date: None,
        }
    }

    pub fn with_boards(mut self, boards: Vec<String>) -> Self {
        let boards = normalize_boards(boards);
        if !boards.is_empty() {
            self.boards = boards;
        }
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<i64>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Re-stamps the creation date using the given instant and chrono format.
    pub fn stamped(mut self, at: DateTime<Local>, date_format: &str) -> Self {
        self.date = at.format(date_format).to_string();
        self.timestamp = at.timestamp_millis();
        self
    }

    /// Toggles the in-progress flag and clears the other two states.
    pub fn begin(&mut self) {
        self.in_progress = !self.in_progress;
        self.is_complete = false;
        self.is_canceled = false;
    }

    /// Toggles the complete flag and clears the other two states.
    pub fn check(&mut self) {
        self.is_complete = !self.is_complete;
        self.in_progress = false;
        self.is_canceled = false;
    }

    /// Toggles the canceled flag and clears the other two states.
    pub fn cancel(&mut self) {
        self.is_canceled = !self.is_canceled;
        self.in_progress = false;
        self.is_complete = false;
    }

    pub fn is_pending(&self) -> bool {
        !self.in_progress && !self.is_complete && !self.is_canceled
    }
}

/// A plain note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default = "default_boards", deserialize_with = "deserialize_boards")]
    pub boards: Vec<String>,
}

impl Note {
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        let now = Local::now();
        Note {
            id,
            date: now.format(DEFAULT_DATE_FORMAT).to_string(),
            timestamp: now.timestamp_millis(),
            description: description.into(),
            is_starred: false,
            boards: default_boards(),
        }
    }

    pub fn with_boards(mut self, boards: Vec<String>) -> Self {
        let boards = normalize_boards(boards);
        if !boards.is_empty() {
            self.boards = boards;
        }
        self
    }

    pub fn stamped(mut self, at: DateTime<Local>, date_format: &str) -> Self {
        self.date = at.format(date_format).to_string();
        self.timestamp = at.timestamp_millis();
        self
    }
}

/// A stored item, either a task or a note.
///
/// Serializes as the inner record plus the `isTask` discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Task(Task),
    Note(Note),
}

impl Item {
    pub fn id(&self) -> u64 {
        match self {
            Item::Task(t) => t.id,
            Item::Note(n) => n.id,
        }
    }

    pub fn set_id(&mut self, id: u64) {
        match self {
            Item::Task(t) => t.id = id,
            Item::Note(n) => n.id = id,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Item::Task(t) => &t.date,
            Item::Note(n) => &n.date,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Item::Task(t) => t.timestamp,
            Item::Note(n) => n.timestamp,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Item::Task(t) => &t.description,
            Item::Note(n) => &n.description,
        }
    }

    pub fn set_description(&mut self, description: String) {
        match self {
            Item::Task(t) => t.description = description,
            Item::Note(n) => n.description = description,
        }
    }

    pub fn is_starred(&self) -> bool {
        match self {
            Item::Task(t) => t.is_starred,
            Item::Note(n) => n.is_starred,
        }
    }

    /// Toggles the starred flag.
    pub fn star(&mut self) {
        match self {
            Item::Task(t) => t.is_starred = !t.is_starred,
            Item::Note(n) => n.is_starred = !n.is_starred,
        }
    }

    pub fn boards(&self) -> &[String] {
        match self {
            Item::Task(t) => &t.boards,
            Item::Note(n) => &n.boards,
        }
    }

    pub fn set_boards(&mut self, boards: Vec<String>) {
        match self {
            Item::Task(t) => t.boards = boards,
            Item::Note(n) => n.boards = boards,
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Item::Task(_))
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Item::Task(t) => Some(t),
            Item::Note(_) => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Item::Task(t) => Some(t),
            Item::Note(_) => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.as_task().is_some_and(|t| t.is_complete)
    }

    /// Converts the item into its JSON record including the discriminant.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let mut value = match self {
            Item::Task(t) => serde_json::to_value(t)?,
            Item::Note(n) => serde_json::to_value(n)?,
        };
        if let Value::Object(map) = &mut value {
            map.insert("isTask".to_string(), Value::Bool(self.is_task()));
        }
        Ok(value)
    }

    /// Rebuilds an item from a record in the current schema.
    ///
    /// Records without a discriminant are read as tasks. Legacy records must
    /// go through [`crate::migration::migrate_record`] first.
    pub fn from_value(mut value: Value) -> serde_json::Result<Item> {
        let is_task = value
            .get("isTask")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if let Value::Object(map) = &mut value {
            map.remove("isTask");
        }
        if is_task {
            serde_json::from_value(value).map(Item::Task)
        } else {
            serde_json::from_value(value).map(Item::Note)
        }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Item::from_value(value).map_err(serde::de::Error::custom)
    }
}
