//! Image handles: pending modification queue and saving through the netpbm backend.

mod common;

use common::{pnm_size, workspace, write_pgm};
use flourish_fs::{Dimensions, FilesystemSession, FsError, ImageType};
use std::fs;

#[test]
fn test_resize_is_validated_against_cropped_size() {
    let (_temp, root) = workspace();
    let path = root.join("square.pgm");
    write_pgm(&path, 200, 200);

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();

    image.crop(0, 0, 100, 100).unwrap().resize(50, 0, false).unwrap();
    assert_eq!(image.dimensions().unwrap(), Dimensions::new(50, 50));
    assert_eq!(image.source_dimensions().unwrap(), Dimensions::new(200, 200));

    image.save_changes(None, None, false).unwrap();
    assert_eq!(pnm_size(&path), (50, 50));
    assert!(image.pending().is_empty());
}

#[test]
fn test_save_in_transaction_rolls_back() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 40, 20);
    let before = fs::read(&path).unwrap();

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();

    session.begin().unwrap();
    image.rotate(90).unwrap();
    image.save_changes(None, None, false).unwrap();
    assert_eq!(pnm_size(&path), (20, 40));
    session.rollback().unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_format_conversion_commits() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 8, 8);

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();

    session.begin().unwrap();
    image.save_changes(Some(ImageType::Ppm), None, false).unwrap();
    let converted = root.join("photo.ppm");
    assert_eq!(image.path(), converted);
    // The original is only tombstoned until commit
    assert!(path.exists());
    session.commit().unwrap();

    assert!(!path.exists());
    assert_eq!(image.image_type().unwrap(), ImageType::Ppm);
    assert_eq!(pnm_size(&converted), (8, 8));
}

#[test]
fn test_format_conversion_rolls_back() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 8, 8);
    let before = fs::read(&path).unwrap();

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();

    session.begin().unwrap();
    image.desaturate().unwrap();
    image.save_changes(Some(ImageType::Ppm), None, false).unwrap();
    session.rollback().unwrap();

    assert_eq!(image.path(), path);
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!root.join("photo.ppm").exists());
    assert_eq!(image.image_type().unwrap(), ImageType::Pgm);
}

#[test]
fn test_conversion_picks_unique_name() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 4, 4);
    fs::write(root.join("photo.ppm"), "taken").unwrap();

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();
    image.save_changes(Some(ImageType::Ppm), None, false).unwrap();

    assert_eq!(image.path(), root.join("photo_copy1.ppm"));
    assert_eq!(fs::read_to_string(root.join("photo.ppm")).unwrap(), "taken");
}

#[test]
fn test_operations_on_deleted_image_fail() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 4, 4);

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();
    image.delete().unwrap();

    assert!(matches!(image.rotate(90), Err(FsError::Deleted { .. })));
    assert!(matches!(
        image.save_changes(None, None, false),
        Err(FsError::Deleted { .. })
    ));
}

#[test]
fn test_open_image_rejects_text() {
    let (_temp, root) = workspace();
    let path = root.join("notes.txt");
    fs::write(&path, "hello").unwrap();

    let session = FilesystemSession::new();
    assert!(matches!(
        session.open_image(&path),
        Err(FsError::Validation(_))
    ));
}

#[test]
fn test_converted_name_usable_after_rollback() {
    let (_temp, root) = workspace();
    let path = root.join("photo.pgm");
    write_pgm(&path, 4, 4);

    let session = FilesystemSession::new();
    let mut image = session.open_image(&path).unwrap();

    session.begin().unwrap();
    image.save_changes(Some(ImageType::Ppm), None, false).unwrap();
    session.rollback().unwrap();

    let converted = root.join("photo.ppm");
    assert!(!converted.exists());

    write_pgm(&converted, 2, 2);
    let reopened = session.open_file(&converted).unwrap();
    assert!(!reopened.is_deleted());
    assert_eq!(reopened.size().unwrap(), fs::metadata(&converted).unwrap().len());
}
