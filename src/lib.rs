#![doc = include_str!("../README.md")]

pub mod cli;
pub mod command;
pub mod error;
pub mod fs;
pub mod image;

pub use error::*;
pub use fs::{
    DirectoryHandle, FileHandle, FilesystemSession, FsObject, PlannedChange, TransactionState,
    TransactionStats, make_unique_name,
};
pub use image::{
    Dimensions, HorizontalPosition, ImageBackend, ImageHandle, ImageType, Modification,
    PnmBackend, ProcessRequest, VerticalPosition,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = cli::FlourishCli::parse();

    // Logging goes to stderr; the summary goes to stdout
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_filter()),
    )
    .format_timestamp(None)
    .try_init();

    command::execute(&cli)
}
