//! Task and note operations.
//!
//! Every operation is a short read-modify-write against the active storage
//! module: read the collection, validate the whole request, mutate in memory
//! and write the full collection back. Nothing is written when validation
//! fails.

use crate::config::Config;
use crate::date;
use crate::error::{Result, TasklineError};
use crate::ids::{next_id, parse_ids, parse_single_id, validate_ids};
use crate::item::{normalize_boards, Item, Note, Priority, Task};
use crate::storage::StorageManager;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use tracing::debug;

/// Items shown under one heading (a board or a date)
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub title: String,
    pub items: Vec<Item>,
}

/// Result of a toggle: which ids were switched on and which off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toggled {
    pub on: Vec<u64>,
    pub off: Vec<u64>,
}

/// An item moved between storage and archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    pub from: u64,
    pub to: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub complete: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub canceled: usize,
    pub notes: usize,
    /// Share of complete tasks among tasks that are not canceled
    pub percent: usize,
}

/// Attribute keywords understood by `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Starred,
    Complete,
    InProgress,
    Pending,
    Canceled,
    Task,
    Note,
    Priority(Priority),
}

impl Attribute {
    pub fn parse(term: &str) -> Option<Attribute> {
        let attribute = match term.to_lowercase().as_str() {
            "star" | "starred" => Attribute::Starred,
            "done" | "checked" | "complete" | "completed" => Attribute::Complete,
            "progress" | "in-progress" | "inprogress" | "started" | "begun" => Attribute::InProgress,
            "pending" | "unchecked" | "incomplete" | "todo" => Attribute::Pending,
            "canceled" | "cancelled" => Attribute::Canceled,
            "task" | "tasks" => Attribute::Task,
            "note" | "notes" => Attribute::Note,
            "normal" | "low" => Attribute::Priority(Priority::Normal),
            "medium" => Attribute::Priority(Priority::Medium),
            "high" => Attribute::Priority(Priority::High),
            _ => return None,
        };
        Some(attribute)
    }

    pub fn matches(&self, item: &Item) -> bool {
        let task = item.as_task();
        match self {
            Attribute::Starred => item.is_starred(),
            Attribute::Complete => task.is_some_and(|t| t.is_complete),
            Attribute::InProgress => task.is_some_and(|t| t.in_progress),
            Attribute::Pending => task.is_some_and(Task::is_pending),
            Attribute::Canceled => task.is_some_and(|t| t.is_canceled),
            Attribute::Task => item.is_task(),
            Attribute::Note => !item.is_task(),
            Attribute::Priority(priority) => task.is_some_and(|t| t.priority == *priority),
        }
    }
}

/// Validate a priority argument; only 1, 2 and 3 are accepted
pub fn parse_priority(input: &str) -> Result<Priority> {
    input
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|value| Priority::try_from(value).ok())
        .ok_or_else(|| TasklineError::InvalidPriority(input.trim().to_string()))
}

fn join_description<S: AsRef<str>>(words: &[S]) -> Result<String> {
    let description = words
        .iter()
        .map(|w| w.as_ref().trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if description.is_empty() {
        return Err(TasklineError::MissingDescription);
    }
    Ok(description)
}

/// Split `a,b` style board arguments into normalized board names
pub fn parse_boards<S: AsRef<str>>(inputs: &[S]) -> Vec<String> {
    normalize_boards(inputs.iter().flat_map(|input| {
        input
            .as_ref()
            .split(',')
            .map(str::to_string)
            .collect::<Vec<_>>()
    }))
}

/// Group items by board, boards in order of first appearance.
///
/// An item on several boards appears under each of them.
pub fn group_by_board(items: &[Item]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for item in items {
        for board in item.boards() {
            match groups.iter_mut().find(|g| &g.title == board) {
                Some(group) => group.items.push(item.clone()),
                None => groups.push(Group {
                    title: board.clone(),
                    items: vec![item.clone()],
                }),
            }
        }
    }
    groups
}

/// Group items by creation date, oldest first
pub fn group_by_date(items: &[Item]) -> Vec<Group> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by_key(|item| (item.timestamp(), item.id()));

    let mut groups: Vec<Group> = Vec::new();
    for item in sorted {
        match groups.iter_mut().find(|g| g.title == item.date()) {
            Some(group) => group.items.push(item.clone()),
            None => groups.push(Group {
                title: item.date().to_string(),
                items: vec![item.clone()],
            }),
        }
    }
    groups
}

pub fn stats(items: &[Item]) -> Stats {
    let mut stats = Stats::default();
    for item in items {
        match item.as_task() {
            None => stats.notes += 1,
            Some(t) if t.is_complete => stats.complete += 1,
            Some(t) if t.in_progress => stats.in_progress += 1,
            Some(t) if t.is_canceled => stats.canceled += 1,
            Some(_) => stats.pending += 1,
        }
    }
    let countable = stats.complete + stats.in_progress + stats.pending;
    if countable > 0 {
        stats.percent = stats.complete * 100 / countable;
    }
    stats
}

/// The operations of the `tl` command
pub struct Taskline<'a> {
    storage: &'a mut StorageManager,
    config: &'a Config,
}

impl<'a> Taskline<'a> {
    pub fn new(storage: &'a mut StorageManager, config: &'a Config) -> Self {
        Taskline { storage, config }
    }

    pub fn items(&self) -> Result<Vec<Item>> {
        Ok(self.storage.get_data(None)?)
    }

    pub fn archived(&self) -> Result<Vec<Item>> {
        Ok(self.storage.get_archive(None)?)
    }

    fn save(&mut self, items: &[Item]) -> Result<()> {
        self.storage.set_data(items)?;
        Ok(())
    }

    /// Read storage and resolve the id arguments against it
    fn load_with_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<(Vec<Item>, Vec<u64>)> {
        let ids = parse_ids(ids)?;
        let items = self.items()?;
        validate_ids(&ids, &items)?;
        Ok((items, ids))
    }

    pub fn create_task<S: AsRef<str>>(
        &mut self,
        description: &[S],
        boards: &[S],
        priority: Option<&str>,
        due: Option<&str>,
    ) -> Result<Item> {
        let description = join_description(description)?;
        let priority = priority.map(parse_priority).transpose()?.unwrap_or_default();
        let due_date = due
            .map(|expr| self.resolve_due(expr))
            .transpose()?
            .map(|due| due.timestamp_millis());

        let mut items = self.items()?;
        let task = Task::new(next_id(&items), description)
            .stamped(Local::now(), &self.config.dateformat)
            .with_boards(parse_boards(boards))
            .with_priority(priority)
            .with_due_date(due_date);
        let item = Item::Task(task);

        items.push(item.clone());
        self.save(&items)?;
        debug!("Created task {}", item.id());
        Ok(item)
    }

    pub fn create_note<S: AsRef<str>>(&mut self, description: &[S], boards: &[S]) -> Result<Item> {
        let description = join_description(description)?;

        let mut items = self.items()?;
        let note = Note::new(next_id(&items), description)
            .stamped(Local::now(), &self.config.dateformat)
            .with_boards(parse_boards(boards));
        let item = Item::Note(note);

        items.push(item.clone());
        self.save(&items)?;
        debug!("Created note {}", item.id());
        Ok(item)
    }

    /// Apply a task toggle to every task among `ids`; notes are skipped.
    fn toggle_tasks<S, F, G>(&mut self, ids: &[S], toggle: F, state: G) -> Result<Toggled>
    where
        S: AsRef<str>,
        F: Fn(&mut Task),
        G: Fn(&Task) -> bool,
    {
        let (mut items, ids) = self.load_with_ids(ids)?;
        let mut result = Toggled::default();

        for id in &ids {
            if let Some(task) = items
                .iter_mut()
                .find(|item| item.id() == *id)
                .and_then(Item::as_task_mut)
            {
                toggle(task);
                if state(task) {
                    result.on.push(*id);
                } else {
                    result.off.push(*id);
                }
            }
        }

        self.save(&items)?;
        Ok(result)
    }

    pub fn check_tasks<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Toggled> {
        self.toggle_tasks(ids, Task::check, |t| t.is_complete)
    }

    pub fn begin_tasks<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Toggled> {
        self.toggle_tasks(ids, Task::begin, |t| t.in_progress)
    }

    pub fn cancel_tasks<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Toggled> {
        self.toggle_tasks(ids, Task::cancel, |t| t.is_canceled)
    }

    pub fn star_items<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Toggled> {
        let (mut items, ids) = self.load_with_ids(ids)?;
        let mut result = Toggled::default();

        for item in items.iter_mut().filter(|item| ids.contains(&item.id())) {
            item.star();
            if item.is_starred() {
                result.on.push(item.id());
            } else {
                result.off.push(item.id());
            }
        }

        self.save(&items)?;
        Ok(result)
    }

    /// Descriptions of the given items, one per line, in argument order
    pub fn copy_descriptions<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<String>> {
        let (items, ids) = self.load_with_ids(ids)?;
        Ok(ids
            .iter()
            .filter_map(|id| items.iter().find(|item| item.id() == *id))
            .map(|item| item.description().to_string())
            .collect())
    }

    /// Move items from `source` to `target`, assigning target-local ids.
    fn relocate(source: &mut Vec<Item>, target: &mut Vec<Item>, ids: &[u64]) -> Result<Vec<Moved>> {
        let mut moved = Vec::new();
        for id in ids {
            let index = source
                .iter()
                .position(|item| item.id() == *id)
                .ok_or_else(|| TasklineError::InvalidId(id.to_string()))?;
            let mut item = source.remove(index);
            let new_id = next_id(target);
            item.set_id(new_id);
            target.push(item);
            moved.push(Moved { from: *id, to: new_id });
        }
        Ok(moved)
    }

    /// Move items to the archive
    pub fn delete_items<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Vec<Moved>> {
        let (items, ids) = self.load_with_ids(ids)?;
        self.archive_ids(items, &ids)
    }

    fn archive_ids(&mut self, mut items: Vec<Item>, ids: &[u64]) -> Result<Vec<Moved>> {
        let mut archive = self.archived()?;
        let moved = Self::relocate(&mut items, &mut archive, ids)?;

        // Archive first: a failure in between leaves a copy, never a loss
        self.storage.set_archive(&archive)?;
        self.storage.set_data(&items)?;
        Ok(moved)
    }

    /// Move items from the archive back to storage
    pub fn restore_items<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<Vec<Moved>> {
        let ids = parse_ids(ids)?;
        let mut archive = self.archived()?;
        validate_ids(&ids, &archive)?;
        let mut items = self.items()?;

        let moved = Self::relocate(&mut archive, &mut items, &ids)?;

        self.storage.set_data(&items)?;
        self.storage.set_archive(&archive)?;
        Ok(moved)
    }

    /// Archive every complete task; a no-op when there is none
    pub fn clear(&mut self) -> Result<Vec<Moved>> {
        let items = self.items()?;
        let ids: Vec<u64> = items
            .iter()
            .filter(|item| item.is_complete())
            .map(Item::id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.archive_ids(items, &ids)
    }

    pub fn edit_description<S: AsRef<str>>(&mut self, id: &str, description: &[S]) -> Result<u64> {
        let id = parse_single_id(id)?;
        let description = join_description(description)?;
        let (mut items, _) = self.load_with_ids(&[id.to_string()])?;

        if let Some(item) = items.iter_mut().find(|item| item.id() == id) {
            item.set_description(description);
        }
        self.save(&items)?;
        Ok(id)
    }

    /// Replace the boards of the given items
    pub fn move_boards<S: AsRef<str>>(&mut self, ids: &[S], boards: &[S]) -> Result<(Vec<u64>, Vec<String>)> {
        let boards = parse_boards(boards);
        if boards.is_empty() {
            return Err(TasklineError::MissingBoards);
        }
        let (mut items, ids) = self.load_with_ids(ids)?;

        for item in items.iter_mut().filter(|item| ids.contains(&item.id())) {
            item.set_boards(boards.clone());
        }
        self.save(&items)?;
        Ok((ids, boards))
    }

    pub fn update_priority<S: AsRef<str>>(&mut self, ids: &[S], priority: &str) -> Result<(Vec<u64>, Priority)> {
        let priority = parse_priority(priority)?;
        let (mut items, ids) = self.load_with_ids(ids)?;

        let mut updated = Vec::new();
        for item in items.iter_mut().filter(|item| ids.contains(&item.id())) {
            if let Some(task) = item.as_task_mut() {
                task.priority = priority;
                updated.push(task.id);
            }
        }
        self.save(&items)?;
        Ok((updated, priority))
    }

    fn resolve_due(&self, expr: &str) -> Result<DateTime<Local>> {
        date::resolve_due_date(expr, Local::now())
            .ok_or_else(|| TasklineError::InvalidDate(expr.trim().to_string()))
    }

    pub fn update_due_date<S: AsRef<str>>(&mut self, ids: &[S], expr: &str) -> Result<(Vec<u64>, DateTime<Local>)> {
        let due = self.resolve_due(expr)?;
        let (mut items, ids) = self.load_with_ids(ids)?;

        let mut updated = Vec::new();
        for item in items.iter_mut().filter(|item| ids.contains(&item.id())) {
            if let Some(task) = item.as_task_mut() {
                task.due_date = Some(due.timestamp_millis());
                updated.push(task.id);
            }
        }
        self.save(&items)?;
        Ok((updated, due))
    }

    /// Items whose description contains any of the terms, grouped by board
    pub fn find_items<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<Group>> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let items: Vec<Item> = self
            .items()?
            .into_iter()
            .filter(|item| {
                let description = item.description().to_lowercase();
                terms.iter().any(|term| description.contains(term))
            })
            .collect();
        Ok(group_by_board(&items))
    }

    /// Items matching every attribute keyword, grouped by board.
    ///
    /// Terms that are not attributes select boards.
    pub fn list_by_attributes<S: AsRef<str>>(&self, terms: &[S]) -> Result<Vec<Group>> {
        let mut attributes = Vec::new();
        let mut boards = Vec::new();
        for term in terms {
            match Attribute::parse(term.as_ref().trim()) {
                Some(attribute) => attributes.push(attribute),
                None => boards.push(term.as_ref().to_string()),
            }
        }
        let boards: HashSet<String> = normalize_boards(boards).into_iter().collect();

        let items: Vec<Item> = self
            .items()?
            .into_iter()
            .filter(|item| attributes.iter().all(|a| a.matches(item)))
            .collect();

        let groups = group_by_board(&items);
        if boards.is_empty() {
            return Ok(groups);
        }
        Ok(groups.into_iter().filter(|g| boards.contains(&g.title)).collect())
    }

    /// The default view
    pub fn board_view(&self) -> Result<Vec<Group>> {
        Ok(group_by_board(&self.items()?))
    }

    pub fn timeline(&self) -> Result<Vec<Group>> {
        Ok(group_by_date(&self.items()?))
    }

    pub fn archive_view(&self) -> Result<Vec<Group>> {
        Ok(group_by_date(&self.archived()?))
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(stats(&self.items()?))
    }
}
