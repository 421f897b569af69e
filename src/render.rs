//! Terminal output.
//!
//! Colors come from the configured theme and are written as 24-bit termion
//! escapes. Formatting functions return strings so views can be tested
//! without a terminal.

use crate::config::{parse_hex_color, Config, Theme};
use crate::item::{Item, Priority, DEFAULT_BOARD};
use crate::storage::manager::StorageEntry;
use crate::storage::StorageStatus;
use crate::taskline::{stats, Group, Moved, Stats, Toggled};
use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use termion::{color, style};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A theme color ready for printing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shade(u8, u8, u8);

impl Shade {
    fn from_hex(hex: &str, fallback: &str) -> Shade {
        let (r, g, b) = parse_hex_color(hex)
            .or_else(|| parse_hex_color(fallback))
            .unwrap_or((255, 255, 255));
        Shade(r, g, b)
    }

    /// `text` wrapped in this color
    pub fn paint(&self, text: impl fmt::Display) -> String {
        format!(
            "{}{}{}",
            color::Fg(color::Rgb(self.0, self.1, self.2)),
            text,
            color::Fg(color::Reset)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub pale: Shade,
    pub error: Shade,
    pub success: Shade,
    pub warning: Shade,
    pub priority_medium: Shade,
    pub priority_high: Shade,
}

impl Palette {
    pub fn new(theme: &Theme) -> Palette {
        let defaults = Theme::default();
        Palette {
            pale: Shade::from_hex(&theme.pale, &defaults.pale),
            error: Shade::from_hex(&theme.error, &defaults.error),
            success: Shade::from_hex(&theme.success, &defaults.success),
            warning: Shade::from_hex(&theme.warning, &defaults.warning),
            priority_medium: Shade::from_hex(&theme.priority_medium, &defaults.priority_medium),
            priority_high: Shade::from_hex(&theme.priority_high, &defaults.priority_high),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new(&Theme::default())
    }
}

/// Whole days from `from` to `to`, rounded toward negative infinity
fn days_between(from: i64, to: i64) -> i64 {
    (to - from).div_euclid(MILLIS_PER_DAY)
}

fn format_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}

pub struct Renderer {
    palette: Palette,
    display_complete_tasks: bool,
    display_progress_overview: bool,
}

impl Renderer {
    pub fn new(config: &Config) -> Renderer {
        Renderer {
            palette: Palette::new(&config.theme),
            display_complete_tasks: config.display_complete_tasks,
            display_progress_overview: config.display_progress_overview,
        }
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.palette.success.paint(format!("✓ {}", message)));
    }

    pub fn warning(&self, message: &str) {
        println!("{}", self.palette.warning.paint(message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.palette.error.paint(format!("✘ {}", message)));
    }

    fn symbol(&self, item: &Item) -> String {
        match item.as_task() {
            None => self.palette.pale.paint("●"),
            Some(t) if t.is_complete => self.palette.success.paint("✔"),
            Some(t) if t.in_progress => self.palette.warning.paint("…"),
            Some(t) if t.is_canceled => self.palette.error.paint("✘"),
            Some(_) => self.palette.pale.paint("☐"),
        }
    }

    fn description(&self, item: &Item) -> String {
        let text = item.description();
        let Some(task) = item.as_task() else {
            return text.to_string();
        };
        if task.is_complete || task.is_canceled {
            return self.palette.pale.paint(text);
        }
        match task.priority {
            Priority::High => format!(
                "{}{}{}",
                style::Bold,
                self.palette.priority_high.paint(format!("{} (!!)", text)),
                style::Reset
            ),
            Priority::Medium => self.palette.priority_medium.paint(format!("{} (!)", text)),
            Priority::Normal => text.to_string(),
        }
    }

    /// `(due in 2 days)`, `(overdue 1 day)`; nothing for finished tasks
    pub fn due_hint(&self, item: &Item, now: DateTime<Local>) -> Option<String> {
        let task = item.as_task()?;
        let due = task.due_date?;
        if task.is_complete || task.is_canceled {
            return None;
        }

        let due_day = Local.timestamp_millis_opt(due).single()?.date_naive();
        if due < now.timestamp_millis() {
            let late = (now.date_naive() - due_day).num_days();
            let hint = match late {
                0 => "(overdue)".to_string(),
                1 => "(overdue 1 day)".to_string(),
                n => format!("(overdue {} days)", n),
            };
            return Some(self.palette.error.paint(hint));
        }

        let hint = match (due_day - now.date_naive()).num_days() {
            0 => "(due today)".to_string(),
            1 => "(due tomorrow)".to_string(),
            d => format!("(due in {} days)", d),
        };
        Some(self.palette.warning.paint(hint))
    }

    /// One item line
    pub fn item_line(&self, item: &Item, now: DateTime<Local>, show_boards: bool) -> String {
        let mut parts = vec![
            self.palette.pale.paint(format!("{:>4}.", item.id())),
            self.symbol(item),
            self.description(item),
        ];

        if show_boards {
            let boards: Vec<String> = item
                .boards()
                .iter()
                .filter(|b| b.as_str() != DEFAULT_BOARD)
                .map(|b| format!("@{}", b))
                .collect();
            if !boards.is_empty() {
                parts.push(self.palette.pale.paint(boards.join(" ")));
            }
        }

        if let Some(hint) = self.due_hint(item, now) {
            parts.push(hint);
        }

        let age = days_between(item.timestamp(), now.timestamp_millis());
        if age > 0 {
            parts.push(self.palette.pale.paint(format!("{}d", age)));
        }

        if item.is_starred() {
            parts.push(self.palette.warning.paint("★"));
        }

        parts.join(" ")
    }

    fn header(&self, title: &str, items: &[Item]) -> String {
        let tasks = items.iter().filter(|i| i.is_task()).count();
        let done = items.iter().filter(|i| i.is_complete()).count();
        format!(
            "\n  {}{}{} {}",
            style::Underline,
            title,
            style::Reset,
            self.palette.pale.paint(format!("[{}/{}]", done, tasks))
        )
    }

    fn visible<'a>(&self, items: &'a [Item]) -> impl Iterator<Item = &'a Item> {
        let show_complete = self.display_complete_tasks;
        items.iter().filter(move |item| show_complete || !item.is_complete())
    }

    /// Items grouped under board headings
    pub fn board_view(&self, groups: &[Group], now: DateTime<Local>) -> String {
        let mut lines = Vec::new();
        for group in groups {
            lines.push(self.header(&format!("@{}", group.title), &group.items));
            for item in self.visible(&group.items) {
                lines.push(format!("  {}", self.item_line(item, now, false)));
            }
        }
        lines.join("\n")
    }

    /// Items grouped under creation dates
    pub fn timeline_view(&self, groups: &[Group], now: DateTime<Local>) -> String {
        let mut lines = Vec::new();
        for group in groups {
            lines.push(self.header(&group.title, &group.items));
            for item in self.visible(&group.items) {
                lines.push(format!("  {}", self.item_line(item, now, true)));
            }
        }
        lines.join("\n")
    }

    pub fn stats_view(&self, stats: &Stats) -> String {
        if !self.display_progress_overview {
            return String::new();
        }
        let sep = self.palette.pale.paint("·");
        format!(
            "\n  {}\n  {} {} {} {} {} {} {} {} {}\n",
            self.palette.pale.paint(format!("{}% of all tasks complete.", stats.percent)),
            self.palette.success.paint(format!("{} done", stats.complete)),
            sep,
            self.palette.warning.paint(format!("{} in-progress", stats.in_progress)),
            sep,
            self.palette.pale.paint(format!("{} pending", stats.pending)),
            sep,
            self.palette.error.paint(format!("{} canceled", stats.canceled)),
            sep,
            self.palette.pale.paint(format!("{} notes", stats.notes)),
        )
    }

    /// Board view followed by stats over `items`
    pub fn overview(&self, groups: &[Group], items: &[Item], now: DateTime<Local>) -> String {
        if items.is_empty() {
            return format!(
                "\n  {}\n",
                self.palette.pale.paint("Type `tl --help` to get started")
            );
        }
        format!("{}\n{}", self.board_view(groups, now), self.stats_view(&stats(items)))
    }

    pub fn toggled(&self, toggled: &Toggled, on: &str, off: &str) {
        if !toggled.on.is_empty() {
            self.success(&format!("{} {}", on, format_ids(&toggled.on)));
        }
        if !toggled.off.is_empty() {
            self.success(&format!("{} {}", off, format_ids(&toggled.off)));
        }
        if toggled.on.is_empty() && toggled.off.is_empty() {
            self.warning("No tasks among the given ids");
        }
    }

    pub fn moved(&self, moved: &[Moved], verb: &str) {
        for m in moved {
            self.success(&format!("{} item {} as {}", verb, m.from, m.to));
        }
    }

    pub fn storage_list(&self, entries: &[StorageEntry]) -> String {
        let mut lines = Vec::new();
        for entry in entries {
            let marker = if entry.active { "*" } else { " " };
            let status = match &entry.status {
                StorageStatus::Online => self.palette.success.paint(&entry.status),
                StorageStatus::Offline(_) => self.palette.error.paint(&entry.status),
            };
            lines.push(format!(
                "  {} {} {} {}",
                marker,
                entry.name,
                self.palette.pale.paint(format!("({})", entry.kind)),
                status
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Note, Task};
    use crate::storage::StorageKind;

    fn strip(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_item_line_symbols_and_markers() {
        let renderer = Renderer::new(&Config::default());
        let now = now();

        let mut task = Task::new(3, "ship it").with_priority(Priority::High);
        task.timestamp = now.timestamp_millis();
        task.is_starred = true;
        let line = strip(&renderer.item_line(&Item::Task(task), now, false));
        assert_eq!(line, "   3. ☐ ship it (!!) ★");

        let mut note = Note::new(4, "remember");
        note.timestamp = now.timestamp_millis() - 3 * MILLIS_PER_DAY;
        let line = strip(&renderer.item_line(&Item::Note(note), now, false));
        assert_eq!(line, "   4. ● remember 3d");
    }

    #[test]
    fn test_due_hints() {
        let renderer = Renderer::new(&Config::default());
        let now = now();
        let at = |days: i64| Item::Task(Task::new(1, "x").with_due_date(Some(now.timestamp_millis() + days * MILLIS_PER_DAY)));

        assert_eq!(strip(&renderer.due_hint(&at(2), now).unwrap()), "(due in 2 days)");
        assert_eq!(strip(&renderer.due_hint(&at(1), now).unwrap()), "(due tomorrow)");
        assert_eq!(strip(&renderer.due_hint(&at(-2), now).unwrap()), "(overdue 2 days)");

        let mut done = Task::new(2, "y").with_due_date(Some(now.timestamp_millis() - MILLIS_PER_DAY));
        done.check();
        assert!(renderer.due_hint(&Item::Task(done), now).is_none());
    }

    #[test]
    fn test_board_view_hides_complete_when_configured() {
        let config = Config {
            display_complete_tasks: false,
            ..Config::default()
        };
        let renderer = Renderer::new(&config);
        let mut done = Task::new(1, "finished");
        done.check();
        let groups = vec![Group {
            title: "work".into(),
            items: vec![Item::Task(done), Item::Task(Task::new(2, "open"))],
        }];

        let view = strip(&renderer.board_view(&groups, now()));
        assert!(view.contains("@work [1/2]"));
        assert!(view.contains("open"));
        assert!(!view.contains("finished"));
    }

    #[test]
    fn test_stats_view_respects_overview_flag() {
        let stats = Stats {
            complete: 1,
            pending: 1,
            percent: 50,
            ..Stats::default()
        };
        let view = strip(&Renderer::new(&Config::default()).stats_view(&stats));
        assert!(view.contains("50% of all tasks complete."));
        assert!(view.contains("1 done"));

        let config = Config {
            display_progress_overview: false,
            ..Config::default()
        };
        assert!(Renderer::new(&config).stats_view(&stats).is_empty());
    }

    #[test]
    fn test_storage_list_marks_active() {
        let renderer = Renderer::new(&Config::default());
        let entries = vec![StorageEntry {
            name: "local".into(),
            kind: StorageKind::Local,
            active: true,
            status: StorageStatus::Online,
        }];
        assert_eq!(strip(&renderer.storage_list(&entries)), "  * local (local) Online");
    }

    #[test]
    fn test_invalid_theme_color_falls_back() {
        let mut theme = Theme::default();
        theme.pale = "nope".into();
        assert_eq!(Palette::new(&theme).pale, Palette::default().pale);
    }
}
