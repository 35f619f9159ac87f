pub mod file;
pub mod image;
pub mod summary;

use crate::cli::FlourishCli;
use crate::error::Result;
use crate::fs::FilesystemSession;
use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;

#[derive(Subcommand, Debug)]
pub enum FlourishCommand {
    /// Replace the contents of a file
    Write(file::WriteArgs),
    /// Append text to a file
    Append(file::AppendArgs),
    /// Create a new file
    Create(file::CreateArgs),
    /// Rename or move a file or directory
    Rename(file::RenameArgs),
    /// Copy a file, picking a free `_copyN` name unless told to overwrite
    Duplicate(file::DuplicateArgs),
    /// Delete files or directories
    Delete(file::DeleteArgs),
    /// Queue image modifications and save them
    Image(image::ImageArgs),
}

impl FlourishCommand {
    fn apply(&self, session: &FilesystemSession) -> Result<()> {
        match self {
            FlourishCommand::Write(args) => file::write(session, args),
            FlourishCommand::Append(args) => file::append(session, args),
            FlourishCommand::Create(args) => file::create(session, args),
            FlourishCommand::Rename(args) => file::rename(session, args),
            FlourishCommand::Duplicate(args) => file::duplicate(session, args),
            FlourishCommand::Delete(args) => file::delete(session, args),
            FlourishCommand::Image(args) => image::execute(session, args),
        }
    }
}

/// Runs one command inside a transaction.
///
/// The transaction is committed on success, or rolled back on failure and for
/// dry runs.
pub fn execute(cli: &FlourishCli) -> Result<()> {
    let root = std::env::current_dir().context("Failed to read the working directory")?;
    let session = FilesystemSession::new();

    session.begin()?;
    log::debug!("Running {:?}", cli.command);

    if let Err(e) = cli.command.apply(&session) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        rollback(&session);
        return Err(e);
    }

    let changes = session.preview();
    let stats = session.stats();

    if cli.dry_run {
        session.rollback()?;
    } else if let Err(e) = session.commit() {
        eprintln!("{} {}", "Error during commit:".red().bold(), e);
        rollback(&session);
        return Err(e);
    }

    summary::print_summary(&changes, &stats, &root, cli.dry_run);
    Ok(())
}

fn rollback(session: &FilesystemSession) {
    if !session.is_inside_transaction() {
        return;
    }

    eprintln!("{}", "Rolling back changes...".yellow().bold());
    match session.rollback() {
        Ok(()) => eprintln!("{}", "✓ Rollback successful.".green()),
        Err(e) => eprintln!("{} {}", "✗ Rollback failed:".red().bold(), e),
    }
}
