//! Command implementations for the tl command line.
//!
//! Each function runs one operation of [`Taskline`] and prints its outcome.

use crate::config::Config;
use crate::render::Renderer;
use crate::storage::{StorageKind, StorageManager, StorageModuleConfig};
use crate::taskline::Taskline;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clipboard_rs::{Clipboard, ClipboardContext};
use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Default view: every board followed by the progress overview
pub fn show_boards(taskline: &Taskline, renderer: &Renderer) -> Result<()> {
    let items = taskline.items()?;
    let groups = taskline.board_view()?;
    println!("{}", renderer.overview(&groups, &items, Local::now()));
    Ok(())
}

pub fn show_timeline(taskline: &Taskline, renderer: &Renderer) -> Result<()> {
    let groups = taskline.timeline()?;
    println!("{}", renderer.timeline_view(&groups, Local::now()));
    println!("{}", renderer.stats_view(&taskline.stats()?));
    Ok(())
}

pub fn show_archive(taskline: &Taskline, renderer: &Renderer) -> Result<()> {
    let groups = taskline.archive_view()?;
    if groups.is_empty() {
        renderer.warning("The archive is empty");
        return Ok(());
    }
    println!("{}", renderer.timeline_view(&groups, Local::now()));
    Ok(())
}

pub fn create_task(
    taskline: &mut Taskline,
    renderer: &Renderer,
    description: &[String],
    boards: &[String],
    priority: Option<&str>,
    due: Option<&str>,
) -> Result<()> {
    let item = taskline.create_task(description, boards, priority, due)?;
    renderer.success(&format!("Created task: {}", item.id()));
    Ok(())
}

pub fn create_note(taskline: &mut Taskline, renderer: &Renderer, description: &[String], boards: &[String]) -> Result<()> {
    let item = taskline.create_note(description, boards)?;
    renderer.success(&format!("Created note: {}", item.id()));
    Ok(())
}

pub fn check_tasks(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let toggled = taskline.check_tasks(ids)?;
    renderer.toggled(&toggled, "Checked task:", "Unchecked task:");
    Ok(())
}

pub fn begin_tasks(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let toggled = taskline.begin_tasks(ids)?;
    renderer.toggled(&toggled, "Started task:", "Paused task:");
    Ok(())
}

pub fn cancel_tasks(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let toggled = taskline.cancel_tasks(ids)?;
    renderer.toggled(&toggled, "Canceled task:", "Revived task:");
    Ok(())
}

pub fn star_items(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let toggled = taskline.star_items(ids)?;
    renderer.toggled(&toggled, "Starred item:", "Unstarred item:");
    Ok(())
}

/// Put the descriptions of the given items on the system clipboard
pub fn copy_to_clipboard(taskline: &Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let descriptions = taskline.copy_descriptions(ids)?;
    let clipboard = ClipboardContext::new().map_err(|e| anyhow!("Clipboard unavailable: {}", e))?;
    clipboard
        .set_text(descriptions.join("\n"))
        .map_err(|e| anyhow!("Failed to copy to clipboard: {}", e))?;
    renderer.success(&format!(
        "Copied the description of {} item(s) to the clipboard",
        descriptions.len()
    ));
    Ok(())
}

pub fn delete_items(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let moved = taskline.delete_items(ids)?;
    renderer.moved(&moved, "Archived");
    Ok(())
}

pub fn restore_items(taskline: &mut Taskline, renderer: &Renderer, ids: &[String]) -> Result<()> {
    let moved = taskline.restore_items(ids)?;
    renderer.moved(&moved, "Restored");
    Ok(())
}

pub fn clear(taskline: &mut Taskline, renderer: &Renderer) -> Result<()> {
    let moved = taskline.clear()?;
    if moved.is_empty() {
        renderer.warning("No completed tasks to clear");
    } else {
        renderer.moved(&moved, "Archived");
    }
    Ok(())
}

pub fn edit_description(taskline: &mut Taskline, renderer: &Renderer, id: &str, description: &[String]) -> Result<()> {
    let id = taskline.edit_description(id, description)?;
    renderer.success(&format!("Updated description of item: {}", id));
    Ok(())
}

pub fn move_boards(taskline: &mut Taskline, renderer: &Renderer, ids: &str, boards: &[String]) -> Result<()> {
    let (ids, boards) = taskline.move_boards(&[ids.to_string()], boards)?;
    let boards: Vec<String> = boards.iter().map(|b| format!("@{}", b)).collect();
    for id in ids {
        renderer.success(&format!("Moved item {} to {}", id, boards.join(", ")));
    }
    Ok(())
}

pub fn update_priority(taskline: &mut Taskline, renderer: &Renderer, ids: &str, priority: &str) -> Result<()> {
    let (ids, priority) = taskline.update_priority(&[ids], priority)?;
    for id in ids {
        renderer.success(&format!("Updated priority of task {} to {}", id, priority));
    }
    Ok(())
}

pub fn update_due_date(taskline: &mut Taskline, renderer: &Renderer, ids: &str, expr: &[String]) -> Result<()> {
    let (ids, due) = taskline.update_due_date(&[ids], &expr.join(" "))?;
    for id in ids {
        renderer.success(&format!("Task {} is due {}", id, due.format("%a %b %d %Y %H:%M")));
    }
    Ok(())
}

pub fn find_items(taskline: &Taskline, renderer: &Renderer, terms: &[String]) -> Result<()> {
    let groups = taskline.find_items(terms)?;
    if groups.is_empty() {
        renderer.warning("No items match");
        return Ok(());
    }
    println!("{}", renderer.board_view(&groups, Local::now()));
    Ok(())
}

pub fn list_items(taskline: &Taskline, renderer: &Renderer, terms: &[String]) -> Result<()> {
    let groups = taskline.list_by_attributes(terms)?;
    if groups.is_empty() {
        renderer.warning("No items match");
        return Ok(());
    }
    println!("{}", renderer.board_view(&groups, Local::now()));
    Ok(())
}

/// Open the config file in $EDITOR
pub fn edit_config(config_path: &Path, renderer: &Renderer) -> Result<()> {
    let editor = env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());
    debug!("Opening {:?} with {}", config_path, editor);

    let status = Command::new(&editor)
        .arg(config_path)
        .status()
        .with_context(|| format!("Failed to start editor '{}'", editor))?;

    if !status.success() {
        renderer.warning(&format!("Editor exited with error code: {}", status.code().unwrap_or(-1)));
        return Ok(());
    }

    // Catch mistakes now rather than on the next run
    Config::load_or_create(config_path)?;
    Ok(())
}

/// Arguments of `tl storage`
pub struct StorageArgs {
    pub name: Option<String>,
    pub add: Option<StorageKind>,
    pub dir: Option<PathBuf>,
    pub project: Option<String>,
    pub remove: bool,
}

fn module_settings(args: &StorageArgs, kind: StorageKind) -> Result<Value> {
    let settings = match kind {
        StorageKind::Local | StorageKind::Git => match &args.dir {
            Some(dir) => json!({ "directory": dir }),
            None => Value::Null,
        },
        StorageKind::Firestore => match &args.project {
            Some(project) => json!({ "projectId": project }),
            None => bail!("A firestore storage module needs --project"),
        },
    };
    Ok(settings)
}

/// List, switch, add or remove storage modules; changes are saved to the config
pub fn storage(
    manager: &mut StorageManager,
    config: &mut Config,
    config_path: &Path,
    renderer: &Renderer,
    args: StorageArgs,
) -> Result<()> {
    let Some(name) = args.name.clone() else {
        if args.add.is_some() || args.remove {
            bail!("A storage module name is required");
        }
        println!("{}", renderer.storage_list(&manager.list()));
        return Ok(());
    };

    if let Some(kind) = args.add {
        let module = StorageModuleConfig::new(name.as_str(), kind, module_settings(&args, kind)?);
        manager.add(module)?;
        config.storage_modules = manager.modules().to_vec();
        config.save(config_path)?;
        renderer.success(&format!("Added {} storage module: {}", kind, name));
        return Ok(());
    }

    if args.remove {
        manager.remove(&name)?;
        config.storage_modules = manager.modules().to_vec();
        config.save(config_path)?;
        renderer.success(&format!("Removed storage module: {}", name));
        return Ok(());
    }

    manager.set_active(&name)?;
    config.storage_module = name.clone();
    config.save(config_path)?;
    renderer.success(&format!("Switched to storage module: {}", name));
    Ok(())
}
