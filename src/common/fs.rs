use std::{
    fs::{self, File},
    io::{self, Cursor, Read, Seek},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

/// Names of every file entry in the archive (directories skipped).
pub(crate) fn zip_entry_names<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)
            .with_context(|| format!("failed to read zip entry {i}"))?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

/// Lower-cased extension of a zip entry name, including the leading dot.
pub(crate) fn entry_suffix(name: &str) -> Option<String> {
    Path::new(name).extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Extracts every file entry into `dest_dir`, flattened to its base name.
/// Returns the paths written, in archive order.
pub(crate) fn extract_flat<R: Read + Seek>(archive: &mut ZipArchive<R>, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)
            .with_context(|| format!("failed to read zip entry {i}"))?;
        if entry.is_dir() { continue }

        // entries escaping the archive root have no enclosed name
        let Some(file_name) = entry.enclosed_name()
            .and_then(|path| path.file_name().map(|name| name.to_os_string()))
        else { continue };

        let dest = dest_dir.join(file_name);
        let mut out = File::create(&dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to extract {}", dest.display()))?;
        written.push(dest);
    }
    Ok(written)
}

/// Find `<stem>.<ext>` in `dir`, comparing the extension case-insensitively.
pub(crate) fn find_companion(dir: &Path, stem: &str, ext: &str) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        let same_stem = path.file_stem().and_then(|s| s.to_str()) == Some(stem);
        let same_ext = path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if same_stem && same_ext { return Ok(Some(path)) }
    }
    Ok(None)
}

/// Zip every file under `dir` (flat, names relative to `dir`) into an in-memory archive.
pub(crate) fn zip_dir(dir: &Path) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    let mut files = WalkDir::new(dir).min_depth(1).max_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to walk {}", dir.display()))?;
    files.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    for entry in files.into_iter().filter(|e| e.file_type().is_file()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        writer.start_file(name.as_str(), options)
            .with_context(|| format!("failed to add {name} to archive"))?;
        let mut file = File::open(entry.path())
            .with_context(|| format!("failed to open {}", entry.path().display()))?;
        io::copy(&mut file, &mut writer)?;
    }

    Ok(writer.finish().context("failed to finish zip archive")?.into_inner())
}
