use std::fs;
use std::path::{Path, PathBuf};

use filebank_proto::BankError;

use crate::home::io_internal;

/// Expand a path into the files below it, recursing through directories.
/// A plain file yields itself.
pub fn collect_file_paths(root: &Path) -> Result<Vec<PathBuf>, BankError> {
    if !root.exists() {
        return Err(BankError::NotFoundLocal(format!("{}", root.display())));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .map_err(io_internal)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_internal)?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut paths = Vec::new();
    for entry in entries {
        paths.extend(collect_file_paths(&entry)?);
    }
    Ok(paths)
}

/// Read every path, returning display names alongside contents.
pub fn read_files(paths: &[PathBuf]) -> Result<(Vec<String>, Vec<Vec<u8>>), BankError> {
    let mut names = Vec::with_capacity(paths.len());
    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BankError::Malformed(format!("unusable file name {path:?}")))?;
        names.push(name.to_string());
        contents.push(fs::read(path).map_err(io_internal)?);
    }
    Ok((names, contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("sub/c.txt"), b"c").unwrap();

        let paths = collect_file_paths(dir.path()).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("b.txt"),
                dir.path().join("sub/c.txt"),
            ]
        );
    }

    #[test]
    fn test_collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.bin");
        fs::write(&file, b"1").unwrap();

        assert_eq!(collect_file_paths(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_collect_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = collect_file_paths(&dir.path().join("missing"));
        assert!(matches!(result, Err(BankError::NotFoundLocal(_))));
    }

    #[test]
    fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.txt"), b"xx").unwrap();
        let paths = vec![dir.path().join("x.txt")];

        let (names, contents) = read_files(&paths).unwrap();
        assert_eq!(names, vec!["x.txt"]);
        assert_eq!(contents, vec![b"xx".to_vec()]);
    }
}
