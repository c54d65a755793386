//! Ref-set diff and local-to-local mirroring between two bare repositories.
//!
//! `backup`/`restore` transfer refs and objects between the store's
//! repository and another bare repository on disk, using git2's built-in
//! local transport. Destination repositories are auto-created if missing.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{MirrorDiff, RefChange};

/// Resolve short or full ref names against a set of known full ref names.
///
/// A name already starting with `refs/` is used as-is. A bare name (e.g.
/// `"main"`) is tried against `refs/heads/`, `refs/tags/`, `refs/notes/`, in
/// that order, falling back to `refs/heads/<name>` if none match.
fn resolve_ref_names(names: &[String], available: &HashMap<String, String>) -> HashSet<String> {
    let available_keys: HashSet<&str> = available.keys().map(|s| s.as_str()).collect();
    let mut result = HashSet::new();
    for name in names {
        if name.starts_with("refs/") {
            result.insert(name.clone());
            continue;
        }
        let mut found = false;
        for prefix in &["refs/heads/", "refs/tags/", "refs/notes/"] {
            let candidate = format!("{}{}", prefix, name);
            if available_keys.contains(candidate.as_str()) {
                result.insert(candidate);
                found = true;
                break;
            }
        }
        if !found {
            result.insert(format!("refs/heads/{}", name));
        }
    }
    result
}

/// Auto-create a bare repository at `path` if it doesn't exist.
fn auto_create_bare_repo(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
    git2::Repository::init_bare(path).map_err(Error::git)?;
    Ok(())
}

/// Get all refs in a bare repo as `{full_ref_name: 40-char hex SHA}`.
///
/// Skips `HEAD` (a symbolic ref, not a content ref to mirror).
fn get_refs(repo_path: &Path) -> Result<HashMap<String, String>> {
    if !repo_path.exists() {
        return Ok(HashMap::new());
    }
    let repo = git2::Repository::open_bare(repo_path).map_err(Error::git)?;
    let mut refs = HashMap::new();

    for r in repo.references().map_err(Error::git)?.flatten() {
        let name = match r.name() {
            Some(n) => n.to_string(),
            None => continue,
        };
        if name == "HEAD" {
            continue;
        }
        if let Some(oid) = r.target() {
            refs.insert(name, oid.to_string());
        }
    }

    Ok(refs)
}

/// Diff two ref maps: `src` is what should exist, `dest` is what currently does.
fn diff_refs(src: &HashMap<String, String>, dest: &HashMap<String, String>) -> MirrorDiff {
    let mut add = Vec::new();
    let mut update = Vec::new();
    let mut delete = Vec::new();

    for (ref_name, sha) in src {
        match dest.get(ref_name) {
            None => add.push(RefChange {
                ref_name: ref_name.clone(),
                old_target: None,
                new_target: Some(sha.clone()),
            }),
            Some(dest_sha) if dest_sha != sha => update.push(RefChange {
                ref_name: ref_name.clone(),
                old_target: Some(dest_sha.clone()),
                new_target: Some(sha.clone()),
            }),
            _ => {}
        }
    }

    for (ref_name, sha) in dest {
        if !src.contains_key(ref_name) {
            delete.push(RefChange {
                ref_name: ref_name.clone(),
                old_target: Some(sha.clone()),
                new_target: None,
            });
        }
    }

    MirrorDiff { add, update, delete }
}

/// Force-push all refs in `src_path` to `dest_path`, deleting any ref at
/// `dest_path` that no longer exists in `src_path`.
fn mirror_push(src_path: &Path, dest_path: &Path, src_refs: &HashMap<String, String>, dest_refs: &HashMap<String, String>) -> Result<()> {
    let repo = git2::Repository::open_bare(src_path).map_err(Error::git)?;
    let dest_url = dest_path.to_string_lossy().into_owned();
    let mut remote = repo.remote_anonymous(&dest_url).map_err(Error::git)?;

    let mut refspecs: Vec<String> = src_refs.keys().map(|r| format!("+{}:{}", r, r)).collect();
    for name in dest_refs.keys() {
        if !src_refs.contains_key(name) {
            refspecs.push(format!(":{}", name));
        }
    }
    let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
    remote.push(&refspec_strs, None).map_err(Error::git)?;
    Ok(())
}

/// Fetch all refs from `src_path` into `dest_path`. Additive only — never
/// deletes refs at the destination.
fn additive_fetch(dest_path: &Path, src_path: &Path, src_refs: &HashMap<String, String>) -> Result<()> {
    if src_refs.is_empty() {
        return Ok(());
    }
    let repo = git2::Repository::open_bare(dest_path).map_err(Error::git)?;
    let src_url = src_path.to_string_lossy().into_owned();
    let mut remote = repo.remote_anonymous(&src_url).map_err(Error::git)?;

    let refspecs: Vec<String> = src_refs.keys().map(|r| format!("+{}:{}", r, r)).collect();
    let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
    remote.fetch(&refspec_strs, None, None).map_err(Error::git)?;
    Ok(())
}

/// Push only the refs in `ref_set` from `src_path` to `dest_path`. Never
/// deletes — used when a caller restricts `backup` to specific refs.
fn targeted_push(src_path: &Path, dest_path: &Path, ref_set: &HashSet<String>) -> Result<()> {
    if ref_set.is_empty() {
        return Ok(());
    }
    let repo = git2::Repository::open_bare(src_path).map_err(Error::git)?;
    let dest_url = dest_path.to_string_lossy().into_owned();
    let mut remote = repo.remote_anonymous(&dest_url).map_err(Error::git)?;

    let refspecs: Vec<String> = ref_set.iter().map(|r| format!("+{}:{}", r, r)).collect();
    let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
    remote.push(&refspec_strs, None).map_err(Error::git)?;
    Ok(())
}

/// Fetch only the refs in `ref_set` from `src_path` into `dest_path`. Never
/// deletes — used when a caller restricts `restore` to specific refs.
fn targeted_fetch(dest_path: &Path, src_path: &Path, ref_set: &HashSet<String>) -> Result<()> {
    if ref_set.is_empty() {
        return Ok(());
    }
    let repo = git2::Repository::open_bare(dest_path).map_err(Error::git)?;
    let src_url = src_path.to_string_lossy().into_owned();
    let mut remote = repo.remote_anonymous(&src_url).map_err(Error::git)?;

    let refspecs: Vec<String> = ref_set.iter().map(|r| format!("+{}:{}", r, r)).collect();
    let refspec_strs: Vec<&str> = refspecs.iter().map(|s| s.as_str()).collect();
    remote.fetch(&refspec_strs, None, None).map_err(Error::git)?;
    Ok(())
}

/// Mirror-push this repository's refs to the bare repo at `dest`.
///
/// A full mirror: refs that exist only at `dest` are deleted. When
/// `ref_filter` is given, only the named refs are pushed and no deletes are
/// performed, regardless of what exists only at `dest`. Names may be bare
/// (`"main"`) or fully qualified (`"refs/heads/main"`); bare names are
/// resolved against `refs/heads/`, `refs/tags/`, then `refs/notes/`. When
/// `dry_run` is true, computes the diff without writing anything.
///
/// # Arguments
/// * `repo_path` - Path to the local bare repository being backed up.
/// * `dest` - Path to the destination bare repository (created if absent).
/// * `dry_run` - Compute the diff only; perform no writes.
/// * `ref_filter` - Restrict the operation to these ref names, if given.
pub fn backup(
    repo_path: &Path,
    dest: &Path,
    dry_run: bool,
    ref_filter: Option<&[String]>,
) -> Result<MirrorDiff> {
    if !dry_run {
        auto_create_bare_repo(dest)?;
    }

    let local_refs = get_refs(repo_path)?;
    let remote_refs = get_refs(dest)?;
    let mut diff = diff_refs(&local_refs, &remote_refs);

    let ref_set = ref_filter.map(|names| {
        let set = resolve_ref_names(names, &local_refs);
        diff.add.retain(|r| set.contains(&r.ref_name));
        diff.update.retain(|r| set.contains(&r.ref_name));
        diff.delete.clear();
        set
    });

    if !diff.in_sync() {
        log::info!(
            "backup to {}: {} add, {} update, {} delete{}",
            dest.display(),
            diff.add.len(),
            diff.update.len(),
            diff.delete.len(),
            if dry_run { " (dry run)" } else { "" }
        );
    }

    if !dry_run && !diff.in_sync() {
        match &ref_set {
            Some(set) => targeted_push(repo_path, dest, set)?,
            None => mirror_push(repo_path, dest, &local_refs, &remote_refs)?,
        }
    }

    Ok(diff)
}

/// Fetch refs from the bare repo at `src` into this repository.
///
/// Additive only: refs that exist locally but not at `src` are left alone,
/// and the returned diff never reports deletes. When `ref_filter` is given,
/// only the named refs are fetched (same name resolution as `backup`). When
/// `dry_run` is true, computes the diff without writing anything.
///
/// # Arguments
/// * `repo_path` - Path to the local bare repository being restored into.
/// * `src` - Path to the source bare repository.
/// * `dry_run` - Compute the diff only; perform no writes.
/// * `ref_filter` - Restrict the operation to these ref names, if given.
pub fn restore(
    repo_path: &Path,
    src: &Path,
    dry_run: bool,
    ref_filter: Option<&[String]>,
) -> Result<MirrorDiff> {
    let src_refs = get_refs(src)?;
    let local_refs = get_refs(repo_path)?;
    let mut diff = diff_refs(&src_refs, &local_refs);

    let ref_set = ref_filter.map(|names| resolve_ref_names(names, &src_refs));
    if let Some(set) = &ref_set {
        diff.add.retain(|r| set.contains(&r.ref_name));
        diff.update.retain(|r| set.contains(&r.ref_name));
    }
    diff.delete.clear(); // restore is always additive, filtered or not

    if !diff.in_sync() {
        log::info!(
            "restore from {}: {} add, {} update, {} delete{}",
            src.display(),
            diff.add.len(),
            diff.update.len(),
            diff.delete.len(),
            if dry_run { " (dry run)" } else { "" }
        );
    }

    if !dry_run && !diff.in_sync() {
        match &ref_set {
            Some(set) => targeted_fetch(repo_path, src, set)?,
            None => additive_fetch(repo_path, src, &src_refs)?,
        }
    }

    Ok(diff)
}
