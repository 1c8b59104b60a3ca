use super::*;
use tempfile::TempDir;

#[test]
fn short_text_previews_unchanged() {
    assert_eq!(preview(""), "");
    assert_eq!(preview("short text"), "short text");

    let exactly: String = "x".repeat(PREVIEW_CHARS);
    assert_eq!(preview(&exactly), exactly);
}

#[test]
fn long_text_is_truncated_with_ellipsis() {
    let long: String = "y".repeat(PREVIEW_CHARS + 1);
    let short = preview(&long);

    assert!(short.ends_with("..."));
    assert_eq!(short.chars().count(), PREVIEW_CHARS + 3);
}

#[test]
fn preview_counts_characters_not_bytes() {
    // Multibyte characters near the cut must not split.
    let long: String = "é".repeat(PREVIEW_CHARS + 10);
    let short = preview(&long);

    assert!(short.ends_with("..."));
    assert_eq!(short.chars().count(), PREVIEW_CHARS + 3);
}

fn seed_index(root: &Path) -> std::path::PathBuf {
    let index_dir = root.join("index");
    fs::create_dir_all(index_dir.join("chunks.lance")).expect("should create dirs");
    fs::write(index_dir.join("chunks.lance").join("data.bin"), b"0123456789")
        .expect("should write file");
    fs::write(index_dir.join("manifest"), b"abc").expect("should write file");
    index_dir
}

#[test]
fn backup_copies_the_whole_tree() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index_dir = seed_index(temp_dir.path());
    let dest = temp_dir.path().join("backup");

    let stats = backup_index(&index_dir, &dest).expect("should back up");

    assert_eq!(stats.files, 2);
    assert_eq!(stats.bytes, 13);
    assert_eq!(
        fs::read(dest.join("chunks.lance").join("data.bin")).expect("should read copy"),
        b"0123456789"
    );
    assert_eq!(fs::read(dest.join("manifest")).expect("should read copy"), b"abc");
}

#[test]
fn backup_replaces_an_existing_destination() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index_dir = seed_index(temp_dir.path());
    let dest = temp_dir.path().join("backup");
    fs::create_dir_all(&dest).expect("should create dest");
    fs::write(dest.join("stale"), b"old").expect("should write file");

    backup_index(&index_dir, &dest).expect("should back up");

    assert!(!dest.join("stale").exists());
    assert!(dest.join("manifest").exists());
}

#[test]
fn backup_requires_an_index_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("index");
    let dest = temp_dir.path().join("backup");

    let err = backup_index(&missing, &dest).expect_err("should fail");
    assert!(matches!(err, SemdexError::Store(_)));
}

#[test]
fn backup_rejects_destination_inside_the_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index_dir = seed_index(temp_dir.path());

    let err = backup_index(&index_dir, &index_dir.join("backup")).expect_err("should fail");
    assert!(matches!(err, SemdexError::Store(_)));
}

#[test]
fn restore_replaces_the_index_wholesale() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index_dir = seed_index(temp_dir.path());
    let dest = temp_dir.path().join("backup");
    backup_index(&index_dir, &dest).expect("should back up");

    // Mutate the live index, then restore the backup over it.
    fs::write(index_dir.join("extra"), b"junk").expect("should write file");
    fs::remove_file(index_dir.join("manifest")).expect("should remove file");

    let stats = restore_index(&dest, &index_dir).expect("should restore");

    assert_eq!(stats.files, 2);
    assert!(!index_dir.join("extra").exists());
    assert_eq!(
        fs::read(index_dir.join("manifest")).expect("should read restored file"),
        b"abc"
    );
}

#[test]
fn restore_requires_a_backup_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("backup");
    let index_dir = temp_dir.path().join("index");

    let err = restore_index(&missing, &index_dir).expect_err("should fail");
    assert!(matches!(err, SemdexError::Store(_)));
}
