use crate::error::{FsError, Result};
use crate::fs::{FilesystemSession, FsObject};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct WriteArgs {
    /// File to overwrite
    pub file: PathBuf,

    /// New contents
    pub text: String,
}

#[derive(Parser, Debug, Clone)]
pub struct AppendArgs {
    /// File to append to
    pub file: PathBuf,

    /// Text to add at the end
    pub text: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CreateArgs {
    /// Path of the new file; its directory must exist
    pub file: PathBuf,

    /// Initial contents
    #[arg(default_value = "")]
    pub text: String,
}

#[derive(Parser, Debug, Clone)]
#[clap(verbatim_doc_comment)]
pub struct RenameArgs {
    /// File or directory to rename
    pub path: PathBuf,

    /// New name or path
    ///
    /// A bare name keeps the file in its directory. Anything else is
    /// resolved against the working directory.
    #[arg(verbatim_doc_comment)]
    pub new_path: PathBuf,

    /// Replace an existing file instead of picking a `_copyN` name
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DuplicateArgs {
    /// File to copy
    pub file: PathBuf,

    /// Directory to place the copy in (defaults to the file's own)
    #[arg(long, value_name = "DIR")]
    pub into: Option<PathBuf>,

    /// Replace an existing file of the same name in `--into`
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteArgs {
    /// Files or directories to delete
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

pub fn write(session: &FilesystemSession, args: &WriteArgs) -> Result<()> {
    session.open_file(&args.file)?.write(&args.text)?;
    Ok(())
}

pub fn append(session: &FilesystemSession, args: &AppendArgs) -> Result<()> {
    session.open_file(&args.file)?.append(&args.text)?;
    Ok(())
}

pub fn create(session: &FilesystemSession, args: &CreateArgs) -> Result<()> {
    session.create_file(&args.file, &args.text)?;
    Ok(())
}

pub fn rename(session: &FilesystemSession, args: &RenameArgs) -> Result<()> {
    match session.create_object_from_path(&args.path)? {
        FsObject::Directory(dir) => {
            if args.overwrite {
                return Err(FsError::validation(
                    "--overwrite is not supported when renaming directories",
                ));
            }
            dir.rename(&args.new_path)?;
        }
        FsObject::Image(image) => {
            image.rename(&args.new_path, args.overwrite)?;
        }
        FsObject::File(file) => {
            file.rename(&args.new_path, args.overwrite)?;
        }
    }
    Ok(())
}

pub fn duplicate(session: &FilesystemSession, args: &DuplicateArgs) -> Result<()> {
    let copy = session
        .open_file(&args.file)?
        .duplicate(args.into.as_deref(), args.overwrite)?;
    log::info!("Copy written to {}", copy.path().display());
    Ok(())
}

pub fn delete(session: &FilesystemSession, args: &DeleteArgs) -> Result<()> {
    for path in &args.paths {
        if !path.exists() {
            return Err(FsError::validation(format!(
                "The path specified, {}, does not exist",
                path.display()
            )));
        }
        session.create_object_from_path(path)?.delete()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_rename_directory_refuses_overwrite_flag() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        fs::create_dir(&dir).unwrap();

        let session = FilesystemSession::new();
        let args = RenameArgs {
            path: dir.clone(),
            new_path: PathBuf::from("archive"),
            overwrite: true,
        };
        assert!(matches!(
            rename(&session, &args),
            Err(FsError::Validation(_))
        ));
        assert!(dir.is_dir());
    }

    #[test]
    fn test_delete_missing_path_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let session = FilesystemSession::new();
        let args = DeleteArgs {
            paths: vec![temp.path().join("ghost.txt")],
        };
        assert!(matches!(
            delete(&session, &args),
            Err(FsError::Validation(_))
        ));
    }

    #[test]
    fn test_delete_mixed_paths_inside_transaction() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        let dir = temp.path().join("sub");
        fs::write(&file, "a").unwrap();
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("b.txt"), "b").unwrap();

        let session = FilesystemSession::new();
        session.begin().unwrap();
        let args = DeleteArgs {
            paths: vec![file.clone(), dir.clone()],
        };
        delete(&session, &args).unwrap();
        assert!(file.exists());
        assert_eq!(session.stats().deletes_pending, 3);

        session.commit().unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }
}
