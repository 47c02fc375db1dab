//! Tier synchronization: publish, download, delete, and bulk update.
//!
//! Everything that moves directive content between tiers lives here. Local
//! writes are whole-file overwrites into the tier layout
//! (`<tier>/<category>[/<subcategory>]/<name>.md`); registry-installed files
//! are tracked in the lockfile so later syncs can tell a stale install from
//! a local edit.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::directive::finder;
use crate::directive::loader::DirectiveResolver;
use crate::directive::lockfile::{compute_content_hash, LockFile, UpdateReason};
use crate::directive::types::Source;
use crate::directive::validate::validate_for_publish;
use crate::error::DirigentError;
use crate::registry::{DirectiveRecord, NewDirective, RegistryStore, VersionRecord};

/// Category synced by the bulk update path. Everything else is installed
/// explicitly, one directive at a time.
const SYNCED_CATEGORY: &str = "core";

/// Local tier a download lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallTarget {
    Project,
    User,
}

impl std::str::FromStr for InstallTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            _ => Err(format!(
                "unknown destination: {s} (expected 'project' or 'user')"
            )),
        }
    }
}

/// Which tiers a delete touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFrom {
    Project,
    User,
    Registry,
    All,
}

impl std::str::FromStr for DeleteFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "registry" => Ok(Self::Registry),
            "all" => Ok(Self::All),
            _ => Err(format!(
                "unknown tier: {s} (expected 'project', 'user', 'registry', or 'all')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct TierOutcome {
    pub tier: Source,
    pub outcome: DeleteOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteReport {
    pub name: String,
    /// `deleted`, `partial`, or `error`.
    pub status: String,
    pub tiers: Vec<TierOutcome>,
    pub lockfile_updated: bool,
}

#[derive(Debug, Serialize)]
pub struct PublishReport {
    pub name: String,
    pub version: String,
    pub category: String,
    /// `created` for a first publication, `updated` for a new version.
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadReport {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    /// `installed` for a first download, `updated` for an overwrite.
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    pub registry_version: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateCheck {
    pub updates_available: Vec<UpdateInfo>,
    pub up_to_date: Vec<String>,
    pub new_directives: Vec<String>,
    pub summary: UpdateSummary,
}

#[derive(Debug, Serialize)]
pub struct UpdateSummary {
    pub updates: usize,
    pub current: usize,
    pub new: usize,
}

#[derive(Debug, Serialize, Default)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<SyncError>,
}

#[derive(Debug, Serialize)]
pub struct SyncError {
    pub name: String,
    pub error: String,
}

pub struct TierSyncEngine {
    resolver: Arc<DirectiveResolver>,
    lockfile_path: PathBuf,
    max_content_bytes: usize,
}

impl TierSyncEngine {
    pub fn new(
        resolver: Arc<DirectiveResolver>,
        lockfile_path: PathBuf,
        max_content_bytes: usize,
    ) -> Self {
        Self {
            resolver,
            lockfile_path,
            max_content_bytes,
        }
    }

    fn registry(&self) -> Result<&Arc<dyn RegistryStore>, DirigentError> {
        self.resolver
            .registry()
            .ok_or_else(|| DirigentError::RegistryUnavailable("no registry configured".into()))
    }

    // ── Publish ──────────────────────────────────────────────────────────

    /// Publish content to the registry. A supplied version must agree with
    /// the version declared inside the content; the declared one is never
    /// silently overridden.
    pub fn publish(
        &self,
        supplied_version: Option<&str>,
        content: &str,
        changelog: Option<&str>,
    ) -> Result<PublishReport, DirigentError> {
        let validated = validate_for_publish(content, self.max_content_bytes)?;

        if let Some(supplied) = supplied_version {
            if supplied != validated.version {
                return Err(DirigentError::VersionMismatch {
                    supplied: supplied.to_string(),
                    declared: validated.version,
                });
            }
        }

        let registry = self.registry()?;
        let new = NewDirective {
            name: validated.name.clone(),
            version: validated.version.clone(),
            description: validated.description,
            category: validated.category.clone(),
            subcategory: validated.subcategory,
            tags: validated.tags,
            tech_stack: validated.tech_stack,
            content_hash: compute_content_hash(&validated.content),
            content: validated.content,
            changelog: changelog.map(str::to_string),
        };

        let status = match registry.get(&validated.name, None) {
            Ok(_) => {
                let already_published = registry
                    .versions(&validated.name)?
                    .iter()
                    .any(|v| v.version == validated.version);
                if already_published {
                    return Err(DirigentError::InvalidInput(format!(
                        "version {} of '{}' is already published",
                        validated.version, validated.name
                    )));
                }
                registry.add_version(&new)?;
                "updated"
            }
            Err(crate::registry::RegistryError::NotFound(_)) => {
                registry.create(&new)?;
                "created"
            }
            Err(err) => return Err(err.into()),
        };

        info!(name = %validated.name, version = %validated.version, status, "publish complete");
        Ok(PublishReport {
            name: validated.name,
            version: validated.version,
            category: validated.category,
            status: status.to_string(),
        })
    }

    // ── Download ─────────────────────────────────────────────────────────

    /// Fetch a directive from the registry into the user tier, overwriting
    /// any previous install, and record it in the lockfile.
    pub fn download(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<DownloadReport, DirigentError> {
        self.download_to(name, version, InstallTarget::User, None)
    }

    /// Fetch into a chosen local tier. Only user-tier installs go into the
    /// lockfile; project-tier files belong to the project's working tree.
    /// `sub_path` nests the file one directory deeper when the registry
    /// record carries no subcategory of its own.
    pub fn download_to(
        &self,
        name: &str,
        version: Option<&str>,
        target: InstallTarget,
        sub_path: Option<&str>,
    ) -> Result<DownloadReport, DirigentError> {
        let registry = self.registry()?;
        let record = registry.get(name, version)?;

        let report = self.install_record_to(&record, target, sub_path)?;
        registry.record_download(name)?;
        Ok(report)
    }

    /// All published versions of a registry directive, newest first.
    pub fn list_versions(&self, name: &str) -> Result<Vec<VersionRecord>, DirigentError> {
        Ok(self.registry()?.versions(name)?)
    }

    /// Write a record into the user tier and update the lockfile. The
    /// registry's category and subcategory decide placement; whatever was on
    /// disk is replaced wholesale.
    fn install_record(&self, record: &DirectiveRecord) -> Result<DownloadReport, DirigentError> {
        self.install_record_to(record, InstallTarget::User, None)
    }

    fn install_record_to(
        &self,
        record: &DirectiveRecord,
        target: InstallTarget,
        sub_path: Option<&str>,
    ) -> Result<DownloadReport, DirigentError> {
        let root = match target {
            InstallTarget::User => self.resolver.user_dir(),
            InstallTarget::Project => self.resolver.project_dir().ok_or_else(|| {
                DirigentError::InvalidInput(
                    "no project tier configured; pass project_path".to_string(),
                )
            })?,
        };
        let path = install_path(root, record, sub_path);
        let existed = path.exists();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &record.content)?;

        // Project-tier files belong to the project's working tree and are
        // not tracked by the lockfile.
        if target == InstallTarget::User {
            let hash = record
                .content_hash
                .clone()
                .unwrap_or_else(|| compute_content_hash(&record.content));
            let mut lock = LockFile::load(&self.lockfile_path);
            lock.set(&record.name, &record.latest_version, &hash, Source::Registry.as_str());
            lock.save(&self.lockfile_path)?;
        }

        debug!(name = %record.name, path = %path.display(), "directive installed");
        Ok(DownloadReport {
            name: record.name.clone(),
            version: record.latest_version.clone(),
            path,
            action: if existed { "updated" } else { "installed" }.to_string(),
        })
    }

    // ── Delete ───────────────────────────────────────────────────────────

    /// Delete a directive from the selected tiers. Each tier reports its own
    /// outcome; one failing tier never hides what happened in the others.
    /// With `cleanup_empty_dirs`, directories emptied by a local delete are
    /// removed as well.
    pub fn delete(&self, name: &str, from: DeleteFrom, cleanup_empty_dirs: bool) -> DeleteReport {
        let mut tiers = Vec::new();
        let mut lockfile_updated = false;

        if matches!(from, DeleteFrom::Project | DeleteFrom::All) {
            match self.resolver.project_dir() {
                Some(root) => tiers.push(delete_from_tier(
                    root.to_path_buf(),
                    Source::Project,
                    name,
                    cleanup_empty_dirs,
                )),
                None => tiers.push(TierOutcome {
                    tier: Source::Project,
                    outcome: DeleteOutcome::NotFound,
                    path: None,
                    error: None,
                }),
            }
        }

        if matches!(from, DeleteFrom::User | DeleteFrom::All) {
            let outcome = delete_from_tier(
                self.resolver.user_dir().to_path_buf(),
                Source::User,
                name,
                cleanup_empty_dirs,
            );
            // Drop the lock entry whenever the user tier is in scope, even if
            // the file itself was already gone.
            let mut lock = LockFile::load(&self.lockfile_path);
            if lock.remove(name) {
                match lock.save(&self.lockfile_path) {
                    Ok(()) => lockfile_updated = true,
                    Err(err) => warn!(error = %err, "failed to save lockfile after delete"),
                }
            }
            tiers.push(outcome);
        }

        if matches!(from, DeleteFrom::Registry | DeleteFrom::All) {
            tiers.push(self.delete_from_registry(name));
        }

        let deleted = tiers
            .iter()
            .filter(|t| t.outcome == DeleteOutcome::Deleted)
            .count();
        let failed = tiers
            .iter()
            .filter(|t| t.outcome == DeleteOutcome::Failed)
            .count();

        let status = if deleted > 0 && failed > 0 {
            "partial"
        } else if failed > 0 {
            "error"
        } else if deleted > 0 {
            "deleted"
        } else if from == DeleteFrom::All {
            // Asked everywhere, found nowhere.
            "error"
        } else {
            // Single-tier delete of something already absent is idempotent.
            "deleted"
        };

        DeleteReport {
            name: name.to_string(),
            status: status.to_string(),
            tiers,
            lockfile_updated,
        }
    }

    /// Cascade delete from the registry. Absence is idempotent, like the
    /// local tiers; an unconfigured registry is a failure, not a "not found".
    fn delete_from_registry(&self, name: &str) -> TierOutcome {
        let outcome = |outcome, error| TierOutcome {
            tier: Source::Registry,
            outcome,
            path: None,
            error,
        };
        match self.resolver.registry() {
            Some(registry) => match registry.delete(name) {
                Ok(true) => outcome(DeleteOutcome::Deleted, None),
                Ok(false) => outcome(DeleteOutcome::NotFound, None),
                Err(err) => outcome(DeleteOutcome::Failed, Some(err.to_string())),
            },
            None => outcome(
                DeleteOutcome::Failed,
                Some("no registry configured".to_string()),
            ),
        }
    }

    // ── Bulk update ──────────────────────────────────────────────────────

    /// Compare installed directives against the registry. With no category
    /// list the whole registry is in scope. Callers that track their own
    /// installs pass a name-to-version map and are judged against it;
    /// otherwise the lockfile decides, which also catches content drift.
    pub fn check_updates(
        &self,
        local_versions: Option<&HashMap<String, String>>,
        categories: Option<&[String]>,
    ) -> Result<UpdateCheck, DirigentError> {
        let registry = self.registry()?;
        let lock = LockFile::load(&self.lockfile_path);

        let mut records = Vec::new();
        match categories {
            Some(cats) => {
                for cat in cats {
                    records.extend(registry.list(Some(cat))?);
                }
            }
            None => records = registry.list(None)?,
        }

        let mut updates_available = Vec::new();
        let mut up_to_date = Vec::new();
        let mut new_directives = Vec::new();

        for record in records {
            let (reason, installed_version) = match local_versions {
                Some(map) => match map.get(&record.name) {
                    None => (UpdateReason::NotInstalled, None),
                    Some(v) if *v == record.latest_version => {
                        (UpdateReason::UpToDate, Some(v.clone()))
                    }
                    Some(v) => (UpdateReason::VersionChanged, Some(v.clone())),
                },
                None => {
                    let hash = record
                        .content_hash
                        .clone()
                        .unwrap_or_else(|| compute_content_hash(&record.content));
                    (
                        lock.needs_update(&record.name, &record.latest_version, &hash),
                        lock.get(&record.name).map(|e| e.version.clone()),
                    )
                }
            };
            match reason {
                UpdateReason::NotInstalled => new_directives.push(record.name),
                UpdateReason::UpToDate => up_to_date.push(record.name),
                reason => updates_available.push(UpdateInfo {
                    installed_version,
                    name: record.name,
                    registry_version: record.latest_version,
                    reason: reason.as_str().to_string(),
                }),
            }
        }

        let summary = UpdateSummary {
            updates: updates_available.len(),
            current: up_to_date.len(),
            new: new_directives.len(),
        };
        Ok(UpdateCheck {
            updates_available,
            up_to_date,
            new_directives,
            summary,
        })
    }

    /// Install or refresh every directive in the synced category. A lock
    /// entry that claims up-to-date but has no file behind it is re-installed
    /// rather than trusted.
    pub fn update_all(&self) -> Result<SyncReport, DirigentError> {
        let registry = self.registry()?;
        let lock = LockFile::load(&self.lockfile_path);
        let mut report = SyncReport::default();

        for record in registry.list(Some(SYNCED_CATEGORY))? {
            let hash = record
                .content_hash
                .clone()
                .unwrap_or_else(|| compute_content_hash(&record.content));
            let reason = lock.needs_update(&record.name, &record.latest_version, &hash);
            let file_present = install_path(self.resolver.user_dir(), &record, None).is_file();

            if !reason.needs_update() && file_present {
                report.skipped.push(record.name);
                continue;
            }
            if !file_present && !reason.needs_update() {
                debug!(name = %record.name, "lock entry present but file missing, re-installing");
            }

            match self.install_record(&record) {
                Ok(_) => match reason {
                    UpdateReason::NotInstalled => report.added.push(record.name),
                    _ => report.updated.push(record.name),
                },
                Err(err) => report.errors.push(SyncError {
                    name: record.name,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "bulk update complete"
        );
        Ok(report)
    }
}

/// Where a registry record lands inside a tier root. The record's own
/// subcategory wins; a caller-supplied `sub_path` only fills in when the
/// record has none.
fn install_path(root: &Path, record: &DirectiveRecord, sub_path: Option<&str>) -> PathBuf {
    let mut path = root.join(&record.category);
    if let Some(sub) = record.subcategory.as_deref().or(sub_path) {
        path = path.join(sub);
    }
    path.join(format!("{}.md", record.name))
}

/// Delete one directive from one local tier.
fn delete_from_tier(root: PathBuf, tier: Source, name: &str, cleanup: bool) -> TierOutcome {
    let Some(path) = finder::find_directive_file(&root, name) else {
        return TierOutcome {
            tier,
            outcome: DeleteOutcome::NotFound,
            path: None,
            error: None,
        };
    };

    match std::fs::remove_file(&path) {
        Ok(()) => {
            if cleanup {
                if let Some(parent) = path.parent() {
                    cleanup_empty_dirs(parent, &root);
                }
            }
            TierOutcome {
                tier,
                outcome: DeleteOutcome::Deleted,
                path: Some(path),
                error: None,
            }
        }
        Err(err) => TierOutcome {
            tier,
            outcome: DeleteOutcome::Failed,
            path: Some(path),
            error: Some(err.to_string()),
        },
    }
}

/// Remove now-empty directories from `start` up toward (never including)
/// `root`. When the tier root itself is a `directives` directory, its
/// first-level category directories are kept even when empty so the standard
/// layout survives deletes.
fn cleanup_empty_dirs(start: &Path, root: &Path) {
    let keep_first_level = root.file_name().is_some_and(|n| n == "directives");
    let mut current = start.to_path_buf();

    while current != *root && current.starts_with(root) {
        if keep_first_level && current.parent() == Some(root) {
            break;
        }
        let is_empty = std::fs::read_dir(&current)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            break;
        }
        if std::fs::remove_dir(&current).is_err() {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
}
