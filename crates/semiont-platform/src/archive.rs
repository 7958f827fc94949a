//! tar.gz archives of service data directories

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

fn entry_name(index: usize) -> String {
    format!("data-{}", index)
}

/// Pack each directory under `data-<index>/` in one gzip'd tarball
///
/// Returns the archive size in bytes.
pub fn pack_dirs(dirs: &[PathBuf], dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for (index, dir) in dirs.iter().enumerate() {
        builder.append_dir_all(entry_name(index), dir)?;
    }

    builder.into_inner()?.finish()?;
    Ok(std::fs::metadata(dest)?.len())
}

/// Unpack an archive made by [`pack_dirs`] back onto the same directories
///
/// Each directory is rebuilt in a sibling staging directory first and only
/// swapped in once that copy is complete, so a failed restore leaves the
/// live data in place.
pub fn unpack_dirs(archive: &Path, dirs: &[PathBuf]) -> io::Result<()> {
    let parent = archive.parent().unwrap_or_else(|| Path::new("."));
    let unpacked = tempfile::Builder::new()
        .prefix(".restore-")
        .tempdir_in(parent)?;
    let decoder = GzDecoder::new(File::open(archive)?);
    tar::Archive::new(decoder).unpack(unpacked.path())?;

    for (index, dir) in dirs.iter().enumerate() {
        let source = unpacked.path().join(entry_name(index));
        if !source.exists() {
            continue;
        }
        let dir_parent = dir.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir_parent)?;
        let staged = tempfile::Builder::new()
            .prefix(".restore-")
            .tempdir_in(dir_parent)?;
        copy_dir(&source, staged.path())?;

        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        // `staged` no longer exists after the rename; its drop is a no-op
        std::fs::rename(staged.path(), dir)?;
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(uploads.join("docs")).unwrap();
        std::fs::write(uploads.join("docs/a.txt"), "alpha").unwrap();

        let archive = dir.path().join("backups/uploads.tar.gz");
        let size = pack_dirs(&[uploads.clone()], &archive).unwrap();
        assert!(size > 0);

        std::fs::write(uploads.join("docs/a.txt"), "changed").unwrap();
        std::fs::write(uploads.join("stray.txt"), "stray").unwrap();

        unpack_dirs(&archive, &[uploads.clone()]).unwrap();
        assert_eq!(
            std::fs::read_to_string(uploads.join("docs/a.txt")).unwrap(),
            "alpha"
        );
        assert!(!uploads.join("stray.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".restore-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_archive_keeps_live_data() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("live.txt"), "live").unwrap();

        let archive = dir.path().join("broken.tar.gz");
        std::fs::write(&archive, b"not a gzip stream").unwrap();

        assert!(unpack_dirs(&archive, &[uploads.clone()]).is_err());
        assert_eq!(
            std::fs::read_to_string(uploads.join("live.txt")).unwrap(),
            "live"
        );
        let staging: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".restore-"))
            .collect();
        assert!(staging.is_empty());
    }
}
