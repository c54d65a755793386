use crate::error::{Error, Result};
use crate::fs::Fs;
use crate::paths::validate_ref_name;
use crate::store::GitStore;
use crate::types::ReflogEntry;

/// A keyed view over a set of git references sharing a common prefix
/// (`refs/heads/` or `refs/tags/`).
///
/// `get` returns a bound [`Fs`] snapshot rather than a raw hash: branches
/// come back writable, tags read-only.
pub struct RefDict<'a> {
    store: &'a GitStore,
    prefix: &'static str,
    writable_kind: bool,
}

impl<'a> RefDict<'a> {
    pub(crate) fn new(store: &'a GitStore, prefix: &'static str) -> Self {
        Self {
            store,
            prefix,
            writable_kind: prefix == "refs/heads/",
        }
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn target_oid(&self, name: &str) -> Result<Option<git2::Oid>> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;
        let refname = self.full_name(name);
        match repo.find_reference(refname.as_str()) {
            Ok(reference) => Ok(reference.target()),
            Err(_) => Ok(None),
        }
    }

    /// Get the snapshot bound to `name`. Branches come back writable, tags
    /// read-only.
    ///
    /// # Errors
    /// Returns [`Error::KeyNotFound`] if `name` does not exist.
    pub fn get(&self, name: &str) -> Result<Fs> {
        let oid = self
            .target_oid(name)?
            .ok_or_else(|| Error::key_not_found(name))?;
        Fs::from_commit(
            std::sync::Arc::clone(&self.store.inner),
            oid,
            Some(name.to_string()),
            Some(self.writable_kind),
        )
    }

    /// Point `name` at `fs`'s commit.
    ///
    /// For tags, fails with [`Error::KeyExists`] if `name` already exists
    /// (tags are never overwritten via `set`). For branches, CAS against the
    /// ref's current value (or create if absent). Rejects a snapshot from a
    /// different store.
    pub fn set(&self, name: &str, fs: &Fs) -> Result<()> {
        validate_ref_name(name)?;
        if !std::sync::Arc::ptr_eq(&self.store.inner, &fs.inner) {
            return Err(Error::git_msg("snapshot belongs to a different store"));
        }
        let commit_oid = fs
            .commit_hash()
            .ok_or_else(|| Error::git_msg("cannot bind a ref to an empty snapshot"))?;
        let new_oid = git2::Oid::from_str(&commit_oid).map_err(Error::git)?;
        let refname = self.full_name(name);

        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        if !self.writable_kind {
            if repo.find_reference(refname.as_str()).is_ok() {
                return Err(Error::key_exists(name));
            }
            repo.reference(refname.as_str(), new_oid, false, "tag: created")
                .map_err(Error::git)?;
            return Ok(());
        }

        let prev = repo
            .find_reference(refname.as_str())
            .ok()
            .and_then(|r| r.target());
        let message = match prev {
            Some(old) => format!("branch: forked from {}", old),
            None => "branch: created".to_string(),
        };
        repo.reference(refname.as_str(), new_oid, true, &message)
            .map_err(Error::git)?;
        Ok(())
    }

    /// `set` followed by re-reading the bound snapshot.
    pub fn set_and_get(&self, name: &str, fs: &Fs) -> Result<Fs> {
        self.set(name, fs)?;
        self.get(name)
    }

    /// Delete `name`.
    pub fn delete(&self, name: &str) -> Result<()> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;
        let refname = self.full_name(name);

        let mut reference = repo
            .find_reference(refname.as_str())
            .map_err(|_| Error::key_not_found(name))?;
        reference.delete().map_err(Error::git)?;
        Ok(())
    }

    /// Returns `true` if `name` exists.
    pub fn has(&self, name: &str) -> Result<bool> {
        Ok(self.target_oid(name)?.is_some())
    }

    /// List all names under this prefix, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        let glob = format!("{}*", self.prefix);
        let refs = repo.references_glob(&glob).map_err(Error::git)?;
        let mut names = Vec::new();
        for r in refs.flatten() {
            if let Some(full_name) = r.name() {
                if let Some(short) = full_name.strip_prefix(self.prefix) {
                    names.push(short.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Iterate over `(name, commit_hash)` pairs, sorted by name.
    pub fn iter(&self) -> Result<Vec<(String, String)>> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        let glob = format!("{}*", self.prefix);
        let refs = repo.references_glob(&glob).map_err(Error::git)?;
        let mut pairs = Vec::new();
        for r in refs.flatten() {
            if let (Some(full_name), Some(oid)) = (r.name(), r.target()) {
                if let Some(short) = full_name.strip_prefix(self.prefix) {
                    pairs.push((short.to_string(), oid.to_string()));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(pairs)
    }

    /// The ref name HEAD currently points to, stripped of this dict's
    /// prefix (branches only — tags are never HEAD's target).
    pub fn current_name(&self) -> Result<Option<String>> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        match repo.find_reference("HEAD") {
            Ok(head) => match head.symbolic_target() {
                Some(name) => Ok(name.strip_prefix(self.prefix).map(|s| s.to_string())),
                None => Ok(None),
            },
            Err(_) => Ok(None),
        }
    }

    /// Point HEAD at `name` (does not require `name` to already exist).
    pub fn set_current(&self, name: &str) -> Result<()> {
        let repo = self
            .store
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        let target_refname = self.full_name(name);
        let log_msg = format!("HEAD: set current to {}", name);
        repo.reference_symbolic("HEAD", &target_refname, true, &log_msg)
            .map_err(Error::git)?;
        Ok(())
    }

    /// The snapshot HEAD currently resolves to, or `None` if HEAD is
    /// dangling (points at a ref that does not exist).
    pub fn current(&self) -> Result<Option<Fs>> {
        match self.current_name()? {
            Some(name) => match self.get(&name) {
                Ok(fs) => Ok(Some(fs)),
                Err(Error::KeyNotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// Read the reflog for `name`.
    pub fn reflog(&self, name: &str) -> Result<Vec<ReflogEntry>> {
        let refname = self.full_name(name);
        crate::reflog::read_reflog(&self.store.inner.path, &refname)
    }
}
