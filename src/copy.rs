use std::path::Path;

use filetime::FileTime;

use crate::error::{Error, Result};
use crate::fs::TreeWrite;
use crate::paths::{join_prefix, parse_source_spec};
use crate::tree;
use crate::types::{ChangeReport, FileEntry, FileType, WalkEntry, MODE_BLOB, MODE_LINK, MODE_TREE};

/// Read a disk file's mode and content. Symlinks are represented by their
/// target string, matching how they're stored as blobs in the tree.
fn read_disk_entry(path: &Path) -> Result<(u32, Vec<u8>)> {
    let mode = tree::mode_from_disk(path).unwrap_or(MODE_BLOB);
    let data = if mode == MODE_LINK {
        let target = std::fs::read_link(path).map_err(|e| Error::io(path, e))?;
        target.to_string_lossy().into_owned().into_bytes()
    } else {
        std::fs::read(path).map_err(|e| Error::io(path, e))?
    };
    Ok((mode, data))
}

/// Whether a disk file should be presumed unchanged without hashing its
/// content (mtime-mode fingerprinting, the default for disk sources): a file
/// whose mtime is at or before the destination commit's timestamp is taken
/// on faith rather than re-hashed. `commit_time` of `None` (no commit yet,
/// e.g. an empty snapshot) means nothing can be presumed unchanged.
fn mtime_presumed_unchanged(path: &Path, commit_time: Option<i64>) -> Result<bool> {
    let commit_time = match commit_time {
        Some(t) => t,
        None => return Ok(false),
    };
    let meta = std::fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    Ok(FileTime::from_last_modification_time(&meta).seconds() <= commit_time)
}

/// Write a tree blob to disk, preserving symlinks and the executable bit.
fn write_blob_to_disk(repo: &git2::Repository, oid: git2::Oid, mode: u32, dest_path: &Path) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let blob = repo.find_blob(oid).map_err(Error::git)?;
    if mode == MODE_LINK {
        let target = String::from_utf8_lossy(blob.content());
        #[cfg(unix)]
        {
            use std::os::unix::fs::symlink;
            let _ = std::fs::remove_file(dest_path);
            symlink(target.as_ref(), dest_path).map_err(|e| Error::io(dest_path, e))?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(dest_path, target.as_bytes()).map_err(|e| Error::io(dest_path, e))?;
        }
    } else {
        std::fs::write(dest_path, blob.content()).map_err(|e| Error::io(dest_path, e))?;

        #[cfg(unix)]
        if mode == crate::types::MODE_BLOB_EXEC {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            std::fs::set_permissions(dest_path, perms).map_err(|e| Error::io(dest_path, e))?;
        }
    }
    Ok(())
}

/// Copy files from a local directory or file into a git tree.
///
/// Resolves `src` through the `/./` pivot and trailing-slash "contents mode"
/// rules (same convention as `Fs::copy_from_ref`): a bare directory or file
/// source contributes its own basename as a prefix under `dest`; a trailing
/// `/` drops that prefix; `/./` overrides the prefix with whatever follows
/// it. Writes blobs to the object store and returns a list of
/// `(store_path, TreeWrite)` pairs that the caller should apply to the tree,
/// along with a [`ChangeReport`] describing what was added.
///
/// # Arguments
/// * `repo` - The git repository to write blobs into.
/// * `base_tree` - Root tree OID of the current commit (used for checksum dedup).
/// * `src` - Local file or directory to copy from.
/// * `dest` - Destination path prefix inside the repo (e.g. `"data"` or `""`).
/// * `include` - Optional glob patterns; only matching files are copied.
/// * `exclude` - Optional glob patterns; matching files are skipped.
/// * `checksum` - When `true`, every disk file is hashed regardless of mtime
///   (checksum mode). When `false`, a file whose mtime is at or before
///   `commit_time` is presumed unchanged and never hashed (mtime mode);
///   newer files, and files with no existing tree entry, are always hashed
///   and compared against the existing entry's OID and mode.
/// * `commit_time` - Destination commit's timestamp (seconds since epoch),
///   used by mtime mode. `None` disables the mtime fast path.
///
/// # Errors
/// Returns [`Error::NotADirectory`] if `src` ends in `/` but is a file.
pub fn copy_in(
    repo: &git2::Repository,
    base_tree: git2::Oid,
    src: &Path,
    dest: &str,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
    checksum: bool,
    commit_time: Option<i64>,
) -> Result<(Vec<(String, TreeWrite)>, ChangeReport)> {
    let mut writes = Vec::new();
    let mut report = ChangeReport::new();
    let dest_norm = crate::paths::normalize_path(dest)?;

    let spec = parse_source_spec(&src.to_string_lossy());
    let locator = Path::new(&spec.locator);
    let full_prefix = join_prefix(&dest_norm, &spec.dest_prefix);

    let meta = std::fs::symlink_metadata(locator).map_err(|e| Error::io(locator, e))?;
    if spec.contents_mode && !meta.is_dir() {
        return Err(Error::not_a_directory(spec.locator.clone()));
    }

    if meta.is_dir() {
        let existing = subtree_map(repo, base_tree, &full_prefix)?;

        for rel_path in &disk_glob(locator, include, exclude)? {
            let full_disk = locator.join(rel_path);
            let store_path = join_prefix(&full_prefix, rel_path);
            let existing_entry = existing.get(rel_path);

            if !checksum
                && existing_entry.is_some()
                && mtime_presumed_unchanged(&full_disk, commit_time)?
            {
                continue;
            }

            let (mode, data) = read_disk_entry(&full_disk)?;
            let file_type = FileType::from_mode(mode).unwrap_or(FileType::Blob);
            let blob_oid = repo.blob(&data).map_err(Error::git)?;

            if let Some((existing_oid, existing_mode)) = existing_entry {
                if *existing_oid == blob_oid && *existing_mode == mode {
                    continue;
                }
            }

            writes.push((store_path.clone(), TreeWrite { data, oid: blob_oid, mode }));
            report.add.push(FileEntry::with_src(&store_path, file_type, &full_disk));
        }
    } else if matches_filters(&spec.dest_prefix, include, exclude) {
        let existing_entry = tree::entry_at_path(repo, base_tree, &full_prefix)?;

        if !checksum
            && existing_entry.is_some()
            && mtime_presumed_unchanged(locator, commit_time)?
        {
            return Ok((writes, report));
        }

        let (mode, data) = read_disk_entry(locator)?;
        let file_type = FileType::from_mode(mode).unwrap_or(FileType::Blob);
        let blob_oid = repo.blob(&data).map_err(Error::git)?;

        let unchanged =
            matches!(&existing_entry, Some(e) if e.oid == blob_oid && e.mode == mode);

        if !unchanged {
            writes.push((full_prefix.clone(), TreeWrite { data, oid: blob_oid, mode }));
            report.add.push(FileEntry::with_src(&full_prefix, file_type, locator));
        }
    }

    Ok((writes, report))
}

/// Walk the tree subtree at `prefix` (root if empty) into a flat
/// `{relative_path: (oid, mode)}` map, or an empty map if `prefix` doesn't
/// resolve to a tree.
fn subtree_map(
    repo: &git2::Repository,
    base_tree: git2::Oid,
    prefix: &str,
) -> Result<std::collections::HashMap<String, (git2::Oid, u32)>> {
    let target_oid = if prefix.is_empty() {
        Some(base_tree)
    } else {
        match tree::entry_at_path(repo, base_tree, prefix)? {
            Some(entry) if entry.mode == MODE_TREE => Some(entry.oid),
            _ => None,
        }
    };
    match target_oid {
        Some(oid) => Ok(tree::walk_tree(repo, oid)?
            .into_iter()
            .map(|(p, e)| (p, (e.oid, e.mode)))
            .collect()),
        None => Ok(std::collections::HashMap::new()),
    }
}

/// Copy files from a git tree to a local directory.
///
/// Resolves `src` through the `/./` pivot and trailing-slash "contents mode"
/// rules (see [`copy_in`]). Reads blobs from the tree and writes them under
/// `dest` on disk. Symlinks and executable permissions are preserved on Unix.
///
/// # Arguments
/// * `repo` - The git repository to read objects from.
/// * `tree_oid` - Root tree OID of the commit to export from.
/// * `src` - Source path prefix inside the repo (e.g. `"data"` or `""`).
/// * `dest` - Local directory to write files into.
/// * `include` - Optional glob patterns; only matching files are copied.
/// * `exclude` - Optional glob patterns; matching files are skipped.
pub fn copy_out(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    src: &str,
    dest: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
) -> Result<ChangeReport> {
    copy_out_with_opts(repo, tree_oid, src, dest, include, exclude, false, false)
}

/// As [`copy_out`], with `ignore_existing` (skip files already present at
/// `dest`) and `ignore_errors` (collect per-file I/O failures in the report
/// instead of aborting; the call only fails if every file failed).
#[allow(clippy::too_many_arguments)]
pub fn copy_out_with_opts(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    src: &str,
    dest: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
    ignore_existing: bool,
    ignore_errors: bool,
) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();
    let spec = parse_source_spec(src);
    let locator_norm = crate::paths::normalize_path(&spec.locator)?;

    let (dir_oid, file_entry) = resolve_repo_source(repo, tree_oid, &locator_norm)?;
    if spec.contents_mode && file_entry.is_some() {
        return Err(Error::not_a_directory(&locator_norm));
    }

    let mut attempted = 0usize;

    if let Some(entry) = file_entry {
        if matches_filters(&spec.dest_prefix, include, exclude) {
            let dest_path = dest.join(&spec.dest_prefix);
            if !(ignore_existing && dest_path.symlink_metadata().is_ok()) {
                attempted += 1;
                match write_blob_to_disk(repo, entry.oid, entry.mode, &dest_path) {
                    Ok(()) => {
                        let file_type = FileType::from_mode(entry.mode).unwrap_or(FileType::Blob);
                        report.add.push(FileEntry::with_src(&spec.dest_prefix, file_type, &dest_path));
                    }
                    Err(e) if ignore_errors => {
                        report.errors.push(crate::types::ChangeError { path: spec.dest_prefix.clone(), error: e.to_string() });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    } else {
        let entries = tree::walk_tree(repo, dir_oid)?;
        for (rel_path, entry) in &entries {
            if !matches_filters(rel_path, include, exclude) {
                continue;
            }

            let store_path = join_prefix(&spec.dest_prefix, rel_path);
            let dest_path = dest.join(&store_path);
            if ignore_existing && dest_path.symlink_metadata().is_ok() {
                continue;
            }
            attempted += 1;

            match write_blob_to_disk(repo, entry.oid, entry.mode, &dest_path) {
                Ok(()) => {
                    let file_type = FileType::from_mode(entry.mode).unwrap_or(FileType::Blob);
                    report.add.push(FileEntry::with_src(&store_path, file_type, &dest_path));
                }
                Err(e) if ignore_errors => {
                    report.errors.push(crate::types::ChangeError { path: store_path.clone(), error: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
    }

    if ignore_errors && attempted > 0 && report.errors.len() == attempted {
        return Err(Error::io(dest, std::io::Error::other("all files failed")));
    }

    Ok(report)
}

/// Resolve a normalized repo-side source path to either a directory's tree
/// OID or a single file's entry.
fn resolve_repo_source(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    locator_norm: &str,
) -> Result<(git2::Oid, Option<WalkEntry>)> {
    if locator_norm.is_empty() {
        return Ok((tree_oid, None));
    }
    let entry = tree::entry_at_path(repo, tree_oid, locator_norm)?
        .ok_or_else(|| Error::not_found(locator_norm))?;
    if entry.mode == MODE_TREE {
        Ok((entry.oid, None))
    } else {
        let name = locator_norm.rsplit('/').next().unwrap_or(locator_norm).to_string();
        Ok((tree_oid, Some(WalkEntry { name, oid: entry.oid, mode: entry.mode })))
    }
}

/// Sync files from disk into a tree (add + update + delete).
///
/// Resolves `src` through the `/./` pivot and trailing-slash "contents mode"
/// rules (see [`copy_in`]). Makes the tree subtree at the resolved
/// destination prefix identical to the local `src`. Unlike [`copy_in`], this
/// also deletes files in the destination tree that are not present on disk
/// (directory sources only), and classifies changes as add/update/delete in
/// the returned [`ChangeReport`]. Entries with `None` in the returned vec
/// represent deletions.
///
/// # Arguments
/// * `repo` - The git repository.
/// * `base_tree` - Root tree OID of the current commit.
/// * `src` - Local file or directory to sync from.
/// * `dest` - Destination path prefix inside the repo.
/// * `include` - Optional glob patterns; only matching files are synced.
/// * `exclude` - Optional glob patterns; matching files are skipped.
/// * `checksum` - When `true`, every disk file is hashed regardless of mtime
///   (checksum mode). When `false`, a file whose mtime is at or before
///   `commit_time` is presumed unchanged and never hashed (mtime mode);
///   newer files, and files with no existing tree entry, are always hashed
///   and compared against the existing entry's OID and mode.
/// * `commit_time` - Destination commit's timestamp (seconds since epoch),
///   used by mtime mode. `None` disables the mtime fast path.
#[allow(clippy::too_many_arguments)]
pub fn sync_in(
    repo: &git2::Repository,
    base_tree: git2::Oid,
    src: &Path,
    dest: &str,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
    checksum: bool,
    commit_time: Option<i64>,
) -> Result<(Vec<(String, Option<TreeWrite>)>, ChangeReport)> {
    let mut writes: Vec<(String, Option<TreeWrite>)> = Vec::new();
    let mut report = ChangeReport::new();
    let dest_norm = crate::paths::normalize_path(dest)?;

    let spec = parse_source_spec(&src.to_string_lossy());
    let locator = Path::new(&spec.locator);
    let full_prefix = join_prefix(&dest_norm, &spec.dest_prefix);

    let meta = std::fs::symlink_metadata(locator).map_err(|e| Error::io(locator, e))?;
    if spec.contents_mode && !meta.is_dir() {
        return Err(Error::not_a_directory(spec.locator.clone()));
    }

    if !meta.is_dir() {
        if matches_filters(&spec.dest_prefix, include, exclude) {
            let existing = tree::entry_at_path(repo, base_tree, &full_prefix)?;

            if !checksum && existing.is_some() && mtime_presumed_unchanged(locator, commit_time)? {
                return Ok((writes, report));
            }

            let (mode, data) = read_disk_entry(locator)?;
            let file_type = FileType::from_mode(mode).unwrap_or(FileType::Blob);
            let blob_oid = repo.blob(&data).map_err(Error::git)?;

            let is_changed = match &existing {
                Some(e) => e.oid != blob_oid || e.mode != mode,
                None => true,
            };
            if is_changed {
                if existing.is_some() {
                    report.update.push(FileEntry::with_src(&full_prefix, file_type, locator));
                } else {
                    report.add.push(FileEntry::with_src(&full_prefix, file_type, locator));
                }
                writes.push((full_prefix.clone(), Some(TreeWrite { data, oid: blob_oid, mode })));
            }
        }
        return Ok((writes, report));
    }

    // Collect disk files
    let disk_files = disk_glob(locator, include, exclude)?;
    let disk_set: std::collections::HashSet<&str> = disk_files.iter().map(|s| s.as_str()).collect();

    // Collect existing tree entries at the resolved destination prefix
    let existing = {
        let target_oid = if full_prefix.is_empty() {
            Some(base_tree)
        } else {
            match tree::entry_at_path(repo, base_tree, &full_prefix)? {
                Some(entry) if entry.mode == MODE_TREE => Some(entry.oid),
                _ => None,
            }
        };
        match target_oid {
            Some(oid) => tree::walk_tree(repo, oid)?,
            None => Vec::new(),
        }
    };

    let existing_map: std::collections::HashMap<&str, &WalkEntry> =
        existing.iter().map(|(p, e)| (p.as_str(), e)).collect();

    // Process disk files: add or update
    for rel_path in &disk_files {
        let full_disk = locator.join(rel_path);
        let store_path = join_prefix(&full_prefix, rel_path);
        let existing_entry = existing_map.get(rel_path.as_str());

        if !checksum
            && existing_entry.is_some()
            && mtime_presumed_unchanged(&full_disk, commit_time)?
        {
            continue;
        }

        let (mode, data) = read_disk_entry(&full_disk)?;
        let blob_oid = repo.blob(&data).map_err(Error::git)?;
        let file_type = FileType::from_mode(mode).unwrap_or(FileType::Blob);

        let is_changed = if let Some(existing_entry) = existing_entry {
            existing_entry.oid != blob_oid || existing_entry.mode != mode
        } else {
            true
        };

        if is_changed {
            writes.push((store_path.clone(), Some(TreeWrite { data, oid: blob_oid, mode })));

            if existing_map.contains_key(rel_path.as_str()) {
                report.update.push(FileEntry::with_src(&store_path, file_type, &full_disk));
            } else {
                report.add.push(FileEntry::with_src(&store_path, file_type, &full_disk));
            }
        }
    }

    // Delete files in tree that are not on disk
    for (rel_path, entry) in &existing {
        if !disk_set.contains(rel_path.as_str()) {
            if !matches_filters(rel_path, include, exclude) {
                continue;
            }
            let store_path = join_prefix(&full_prefix, rel_path);
            let file_type = FileType::from_mode(entry.mode).unwrap_or(FileType::Blob);
            writes.push((store_path.clone(), None));
            report.delete.push(FileEntry::new(&store_path, file_type));
        }
    }

    Ok((writes, report))
}

/// Sync files from a tree to disk (add + update + delete).
///
/// Resolves `src` through the `/./` pivot and trailing-slash "contents mode"
/// rules (see [`copy_in`]). Makes the local directory `dest` (or a prefix
/// subfolder of it) identical to the resolved source. Unlike [`copy_out`],
/// this also deletes local files that are not present in the repo tree
/// (directory sources only), prunes empty directories, and classifies all
/// changes as add/update/delete in the returned [`ChangeReport`].
///
/// # Arguments
/// * `repo` - The git repository.
/// * `tree_oid` - Root tree OID of the commit to export from.
/// * `src` - Source path prefix inside the repo.
/// * `dest` - Local directory to sync into.
/// * `include` - Optional glob patterns; only matching files are synced.
/// * `exclude` - Optional glob patterns; matching files are skipped.
/// * `checksum` - When `true`, skip unchanged files (content comparison).
pub fn sync_out(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    src: &str,
    dest: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
    checksum: bool,
) -> Result<ChangeReport> {
    sync_out_with_opts(repo, tree_oid, src, dest, include, exclude, checksum, false, false)
}

/// As [`sync_out`], with `ignore_existing` (skip add/update of paths already
/// present at `dest`; deletes still apply) and `ignore_errors` (collect
/// per-file I/O failures in the report instead of aborting; the call only
/// fails if every file failed).
#[allow(clippy::too_many_arguments)]
pub fn sync_out_with_opts(
    repo: &git2::Repository,
    tree_oid: git2::Oid,
    src: &str,
    dest: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
    checksum: bool,
    ignore_existing: bool,
    ignore_errors: bool,
) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();
    let spec = parse_source_spec(src);
    let locator_norm = crate::paths::normalize_path(&spec.locator)?;

    let (dir_oid, file_entry) = resolve_repo_source(repo, tree_oid, &locator_norm)?;
    if spec.contents_mode && file_entry.is_some() {
        return Err(Error::not_a_directory(&locator_norm));
    }

    if let Some(entry) = file_entry {
        let mut attempted = 0usize;
        if matches_filters(&spec.dest_prefix, include, exclude) {
            let dest_path = dest.join(&spec.dest_prefix);
            let existed = dest_path.symlink_metadata().is_ok();
            if !(ignore_existing && existed) {
                attempted += 1;
                match write_blob_to_disk(repo, entry.oid, entry.mode, &dest_path) {
                    Ok(()) => {
                        let file_type = FileType::from_mode(entry.mode).unwrap_or(FileType::Blob);
                        if existed {
                            report.update.push(FileEntry::with_src(&spec.dest_prefix, file_type, &dest_path));
                        } else {
                            report.add.push(FileEntry::with_src(&spec.dest_prefix, file_type, &dest_path));
                        }
                    }
                    Err(e) if ignore_errors => {
                        report.errors.push(crate::types::ChangeError { path: spec.dest_prefix.clone(), error: e.to_string() });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if ignore_errors && attempted > 0 && report.errors.len() == attempted {
            return Err(Error::io(dest, std::io::Error::other("all files failed")));
        }
        return Ok(report);
    }

    // Walk repo tree to get source files
    let repo_entries = tree::walk_tree(repo, dir_oid)?;
    let repo_map: std::collections::HashMap<&str, &WalkEntry> =
        repo_entries.iter().map(|(p, e)| (p.as_str(), e)).collect();

    // Walk local destination to get existing disk files
    let dest_root = if spec.dest_prefix.is_empty() { dest.to_path_buf() } else { dest.join(&spec.dest_prefix) };
    let disk_files = if dest_root.exists() {
        disk_glob(&dest_root, None, None)?
    } else {
        Vec::new()
    };
    let disk_set: std::collections::HashSet<&str> = disk_files.iter().map(|s| s.as_str()).collect();

    let mut attempted = 0usize;

    // Process repo files: write new/updated files to disk
    for (rel_path, entry) in &repo_entries {
        if !matches_filters(rel_path, include, exclude) {
            continue;
        }
        if ignore_existing && disk_set.contains(rel_path.as_str()) {
            continue;
        }

        let dest_path = dest_root.join(rel_path);
        let file_type = FileType::from_mode(entry.mode).unwrap_or(FileType::Blob);

        let needs_write = if disk_set.contains(rel_path.as_str()) {
            if checksum {
                let existing_data = if entry.mode == MODE_LINK {
                    match std::fs::read_link(&dest_path) {
                        Ok(target) => target.to_string_lossy().into_owned().into_bytes(),
                        Err(_) => vec![],
                    }
                } else {
                    std::fs::read(&dest_path).unwrap_or_default()
                };
                let existing_oid = repo.blob(&existing_data).map_err(Error::git)?;
                existing_oid != entry.oid
            } else {
                true
            }
        } else {
            true
        };

        if needs_write {
            attempted += 1;
            let result = write_blob_to_disk(repo, entry.oid, entry.mode, &dest_path);

            match result {
                Ok(()) => {
                    let store_path = join_prefix(&spec.dest_prefix, rel_path);
                    if disk_set.contains(rel_path.as_str()) {
                        report.update.push(FileEntry::with_src(&store_path, file_type, &dest_path));
                    } else {
                        report.add.push(FileEntry::with_src(&store_path, file_type, &dest_path));
                    }
                }
                Err(e) if ignore_errors => {
                    report.errors.push(crate::types::ChangeError { path: rel_path.clone(), error: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }
    }

    // Delete disk files not in repo tree
    for rel_path in &disk_files {
        if !matches_filters(rel_path, include, exclude) {
            continue;
        }
        if !repo_map.contains_key(rel_path.as_str()) {
            let full_path = dest_root.join(rel_path);
            if full_path.exists() || full_path.symlink_metadata().is_ok() {
                std::fs::remove_file(&full_path).map_err(|e| Error::io(&full_path, e))?;
                let store_path = join_prefix(&spec.dest_prefix, rel_path);
                report.delete.push(FileEntry::with_src(&store_path, FileType::Blob, &full_path));
            }
        }
    }

    // Prune empty directories
    prune_empty_dirs(&dest_root)?;

    if ignore_errors && attempted > 0 && report.errors.len() == attempted {
        return Err(Error::io(dest, std::io::Error::other("all files failed")));
    }

    Ok(report)
}

/// Remove empty directories under `root`, bottom-up. Silently skips
/// directories that still contain files.
fn prune_empty_dirs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    // Collect all directories first, then try to remove bottom-up
    let mut dirs = Vec::new();
    collect_dirs(root, root, &mut dirs)?;
    // Sort by depth (deepest first) for bottom-up removal
    dirs.sort_by(|a, b| b.len().cmp(&a.len()));
    for dir in dirs {
        let full = root.join(&dir);
        // Try to remove — will fail silently if not empty
        let _ = std::fs::remove_dir(&full);
    }
    Ok(())
}

fn collect_dirs(root: &Path, dir: &Path, results: &mut Vec<String>) -> Result<()> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return Ok(()),
    };
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            results.push(rel);
            collect_dirs(root, &path, results)?;
        }
    }
    Ok(())
}

/// Remove files from disk that match the given include/exclude patterns.
///
/// # Arguments
/// * `dest` - Root directory to scan for files.
/// * `include` - Optional glob patterns; only matching files are removed.
/// * `exclude` - Optional glob patterns; matching files are kept.
pub fn remove_from_disk(
    dest: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
) -> Result<ChangeReport> {
    let mut report = ChangeReport::new();
    let files = disk_glob(dest, include, exclude)?;
    for rel in &files {
        let full = dest.join(rel);
        if full.exists() {
            std::fs::remove_file(&full).map_err(|e| Error::io(&full, e))?;
            report.delete.push(FileEntry::with_src(rel.as_str(), FileType::Blob, &full));
        }
    }
    Ok(report)
}

/// Rename a path within a tree, returning tree writes for the move.
///
/// Handles both single-file renames and directory renames (moving all
/// children). Each returned entry is either a deletion (`None`) of the
/// old path or a write (`Some(TreeWrite)`) at the new path.
///
/// # Arguments
/// * `repo` - The git repository.
/// * `base_tree` - Root tree OID of the current commit.
/// * `src` - Normalized source path in the tree.
/// * `dest` - Normalized destination path in the tree.
///
/// # Errors
/// Returns [`Error::NotFound`] if `src` does not exist in the tree.
pub fn rename(
    repo: &git2::Repository,
    base_tree: git2::Oid,
    src: &str,
    dest: &str,
) -> Result<Vec<(String, Option<TreeWrite>)>> {
    let src_norm = crate::paths::normalize_path(src)?;
    let dest_norm = crate::paths::normalize_path(dest)?;

    let entry = tree::entry_at_path(repo, base_tree, &src_norm)?
        .ok_or_else(|| Error::not_found(&src_norm))?;

    let mut writes = Vec::new();

    if entry.mode == MODE_TREE {
        // Rename directory: move all entries and delete originals
        let sub_entries = tree::walk_tree(repo, entry.oid)?;
        for (rel_path, we) in &sub_entries {
            let old_path = format!("{}/{}", src_norm, rel_path);
            let new_path = format!("{}/{}", dest_norm, rel_path);
            let blob = repo.find_blob(we.oid).map_err(Error::git)?;
            // Delete old path
            writes.push((old_path, None));
            // Write new path
            writes.push((
                new_path,
                Some(TreeWrite {
                    data: blob.content().to_vec(),
                    oid: we.oid,
                    mode: we.mode,
                }),
            ));
        }
    } else {
        // Rename single file: delete old, write new
        let blob = repo.find_blob(entry.oid).map_err(Error::git)?;
        writes.push((src_norm, None));
        writes.push((
            dest_norm,
            Some(TreeWrite {
                data: blob.content().to_vec(),
                oid: entry.oid,
                mode: entry.mode,
            }),
        ));
    }

    Ok(writes)
}

/// Recursively list all files under `root`, filtered by include/exclude
/// glob patterns. Returns sorted relative paths.
///
/// # Arguments
/// * `root` - Directory to walk.
/// * `include` - Optional glob patterns; only matching files are returned.
/// * `exclude` - Optional glob patterns; matching files are excluded.
pub fn disk_glob(
    root: &Path,
    include: Option<&[&str]>,
    exclude: Option<&[&str]>,
) -> Result<Vec<String>> {
    let mut results = Vec::new();
    walk_disk(root, root, &mut results)?;

    // Filter by include/exclude
    if include.is_some() || exclude.is_some() {
        results.retain(|path| matches_filters(path, include, exclude));
    }

    results.sort();
    Ok(results)
}

fn walk_disk(root: &Path, dir: &Path, results: &mut Vec<String>) -> Result<()> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let meta = std::fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;

        if meta.is_dir() {
            walk_disk(root, &path, results)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            results.push(rel);
        }
    }
    Ok(())
}

fn matches_filters(path: &str, include: Option<&[&str]>, exclude: Option<&[&str]>) -> bool {
    if let Some(patterns) = include {
        if !patterns.iter().any(|pat| path_matches_glob(path, pat)) {
            return false;
        }
    }
    if let Some(patterns) = exclude {
        if patterns.iter().any(|pat| path_matches_glob(path, pat)) {
            return false;
        }
    }
    true
}

fn path_matches_glob(path: &str, pattern: &str) -> bool {
    // Simple: match the filename part against the pattern
    let filename = path.rsplit('/').next().unwrap_or(path);
    crate::glob::glob_match(pattern, filename) || crate::glob::glob_match(pattern, path)
}
