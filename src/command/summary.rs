use crate::fs::{PlannedChange, TransactionStats};
use colored::Colorize;
use std::path::Path;

/// Shortens `path` relative to `root` and normalizes separators.
pub fn display_path(path: &Path, root: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    relative.to_string_lossy().replace('\\', "/")
}

/// Prints what a transaction did, or would have done for a dry run.
pub fn print_summary(
    changes: &[PlannedChange],
    stats: &TransactionStats,
    root: &Path,
    dry_run: bool,
) {
    if changes.is_empty() {
        println!("\n{}", "No changes needed".yellow());
        return;
    }

    if dry_run {
        println!("{}", "DRY RUN - No changes were kept".yellow().bold());
    } else {
        println!("\n{}", "Changes applied:".green().bold());
    }

    let bullet = if dry_run {
        "•".to_string()
    } else {
        "✓".green().to_string()
    };

    let mut written = Vec::new();
    let mut created = Vec::new();
    let mut moved = Vec::new();
    let mut deleted = Vec::new();

    for change in changes {
        match change {
            PlannedChange::Write(path) => written.push(display_path(path, root)),
            PlannedChange::Append(path, len) => {
                written.push(format!("{} (+{} bytes)", display_path(path, root), len));
            }
            PlannedChange::Create(path) => created.push(display_path(path, root)),
            PlannedChange::Rename(from, to) | PlannedChange::Convert(from, to) => {
                moved.push((display_path(from, root), display_path(to, root)));
            }
            PlannedChange::Delete(path) => deleted.push(display_path(path, root)),
        }
    }

    if !written.is_empty() {
        println!("\n{} Modified", "📝".bold());
        for path in &written {
            println!("   {} {}", bullet, path.dimmed());
        }
    }

    if !created.is_empty() {
        println!("\n{} Created", "✨".bold());
        for path in &created {
            println!("   {} {}", bullet, path.dimmed());
        }
    }

    if !moved.is_empty() {
        println!("\n{} Moved", "📁".bold());
        for (from, to) in &moved {
            if dry_run {
                println!("   {} → {}", from.yellow(), to.green());
            } else {
                println!("   {} {} → {}", bullet, from, to.green());
            }
        }
    }

    if !deleted.is_empty() {
        println!(
            "\n{} Deleted ({} item{})",
            "🗑".bold(),
            deleted.len(),
            if deleted.len() == 1 { "" } else { "s" }
        );
        for path in deleted.iter().take(10) {
            println!("   {} {}", bullet, path.dimmed());
        }
        if deleted.len() > 10 {
            println!("   {} {} more...", bullet, deleted.len() - 10);
        }
    }

    println!(
        "\n{} {} operation{} recorded",
        "Σ".bold(),
        stats.total,
        if stats.total == 1 { "" } else { "s" }
    );
}
