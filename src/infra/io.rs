use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::core::mapping::ReferenceMapping;

/// Read a UTF-8 document
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))
}

/// Load a JSON mapping file; a missing file is an empty mapping
pub fn read_mapping<P: AsRef<Path>>(path: P) -> Result<ReferenceMapping> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ReferenceMapping::new());
    }
    let raw = read_text(path)?;
    if raw.trim().is_empty() {
        return Ok(ReferenceMapping::new());
    }
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse mapping JSON in {}", path.display()))
}

/// Write a mapping as pretty JSON
pub fn write_mapping<P: AsRef<Path>>(path: P, mapping: &ReferenceMapping) -> Result<()> {
    let mut json = serde_json::to_string_pretty(mapping).context("Failed to serialize mapping")?;
    json.push('\n');
    write_atomic(path.as_ref(), json.as_bytes())
}

/// Atomic write with robust temp file strategy
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    // Prefer same-dir tempfile; fall back to OS temp on EPERM/ENOENT
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Preserve original permissions
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = match tempfile::NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?, // fallback to /tmp
    };

    use std::io::Write;
    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    // Atomically replace the destination
    if let Err(e) = tmp.persist(path) {
        // Different filesystem? Try copy fallback
        fs::copy(e.file.path(), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("doc.txt");
        fs::write(&p, "old").unwrap();
        write_atomic(&p, b"new [1]").unwrap();
        assert_eq!(read_text(&p).unwrap(), "new [1]");
    }

    #[test]
    fn mapping_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("map.json");
        assert!(read_mapping(&p).unwrap().is_empty());

        let mut m = ReferenceMapping::new();
        m.link("Alpha", "[1]");
        write_mapping(&p, &m).unwrap();
        assert_eq!(read_mapping(&p).unwrap(), m);
    }

    #[test]
    fn bad_mapping_json_is_an_error() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("map.json");
        fs::write(&p, "[1, 2]").unwrap();
        let err = read_mapping(&p).unwrap_err();
        assert!(err.to_string().contains("Failed to parse mapping JSON"));
    }
}
