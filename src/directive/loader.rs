//! Tiered directive resolution.
//!
//! [`DirectiveResolver`] walks project, then user, then registry, returning
//! the first hit. Local results are cached together with a content hash;
//! a cache hit re-hashes the file on disk and silently reloads when someone
//! edited it underneath us. Registry results are never cached so a fetch
//! always reflects the current published state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::directive::finder;
use crate::directive::lockfile::compute_content_hash;
use crate::directive::parser::{self, DocValue};
use crate::directive::types::{Directive, Source};
use crate::error::DirigentError;
use crate::registry::{RegistryError, RegistryStore};

pub struct DirectiveResolver {
    project_dir: Option<PathBuf>,
    user_dir: PathBuf,
    registry: Option<Arc<dyn RegistryStore>>,
    /// name -> (directive, content hash at load time)
    cache: Mutex<HashMap<String, (Directive, String)>>,
}

impl DirectiveResolver {
    pub fn new(
        project_dir: Option<PathBuf>,
        user_dir: PathBuf,
        registry: Option<Arc<dyn RegistryStore>>,
    ) -> Self {
        Self {
            project_dir,
            user_dir,
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.project_dir.as_deref()
    }

    pub fn registry(&self) -> Option<&Arc<dyn RegistryStore>> {
        self.registry.as_ref()
    }

    /// Resolve a directive across all tiers. Local tiers hold exactly one
    /// snapshot each and are never version-filtered; the optional version
    /// constraint applies only to the registry fetch that runs when no
    /// local tier has the name.
    pub fn load(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<Directive>, DirigentError> {
        if let Some(directive) = self.load_local(name) {
            return Ok(Some(directive));
        }

        let Some(registry) = &self.registry else {
            return Ok(None);
        };
        match registry.get(name, version) {
            Ok(record) => Ok(Some(record_to_directive(&record))),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(RegistryError::Unavailable(why)) => {
                warn!(name, why, "registry unavailable, resolving local-only");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolve from local tiers only. Used by execution paths that must
    /// never run un-downloaded registry content.
    pub fn load_local(&self, name: &str) -> Option<Directive> {
        if let Some(cached) = self.cache_lookup(name) {
            return Some(cached);
        }

        let tiers = [
            (self.project_dir.clone(), Source::Project),
            (Some(self.user_dir.clone()), Source::User),
        ];
        for (root, source) in tiers {
            let Some(root) = root else { continue };
            let Some(path) = finder::find_directive_file(&root, name) else {
                continue;
            };
            match load_file(&path, source) {
                Some(directive) => {
                    self.cache_store(name, &directive);
                    return Some(directive);
                }
                // Malformed file: log and keep walking tiers.
                None => warn!(path = %path.display(), "skipping malformed directive file"),
            }
        }
        None
    }

    /// Cache hit only counts when the backing file still hashes the same.
    fn cache_lookup(&self, name: &str) -> Option<Directive> {
        let mut cache = self.cache.lock().ok()?;
        let (directive, cached_hash) = cache.get(name)?;
        let path = directive.path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(content) if compute_content_hash(&content) == *cached_hash => {
                Some(directive.clone())
            }
            _ => {
                debug!(name, "cached directive changed on disk, evicting");
                cache.remove(name);
                None
            }
        }
    }

    fn cache_store(&self, name: &str, directive: &Directive) {
        if directive.path.is_none() {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                name.to_string(),
                (directive.clone(), compute_content_hash(&directive.content)),
            );
        }
    }
}

/// Read and parse one directive file. `None` when unreadable or malformed.
pub fn load_file(path: &Path, source: Source) -> Option<Directive> {
    let content = std::fs::read_to_string(path).ok()?;
    let parsed = parser::parse_document(&content)?;
    Some(build_directive(content, parsed, source, Some(path.to_path_buf())))
}

/// Convert a registry record into a loaded directive. Falls back to record
/// metadata when the content block doesn't parse.
pub fn record_to_directive(record: &crate::registry::DirectiveRecord) -> Directive {
    match parser::parse_document(&record.content) {
        Some(parsed) => build_directive(record.content.clone(), parsed, Source::Registry, None),
        None => Directive {
            name: record.name.clone(),
            version: record.latest_version.clone(),
            description: record.description.clone(),
            content: record.content.clone(),
            parsed: DocValue::Text(String::new()),
            source: Source::Registry,
            path: None,
            tech_stack: record.tech_stack.clone(),
        },
    }
}

fn build_directive(
    content: String,
    parsed: DocValue,
    source: Source,
    path: Option<PathBuf>,
) -> Directive {
    let name = parsed
        .attr("name")
        .map(str::to_string)
        .or_else(|| {
            path.as_deref()
                .and_then(Path::file_stem)
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    let version = parsed.attr("version").unwrap_or("0.0.0").to_string();
    let description = parser::description(&parsed);
    let tech_stack = parser::tech_stack(&parsed);
    Directive {
        name,
        version,
        description,
        content,
        parsed,
        source,
        path,
        tech_stack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_directive(root: &Path, rel: &str, name: &str, version: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!(
                "<directive name=\"{name}\" version=\"{version}\">\n\
                 <metadata><description>{name} directive</description>\
                 <category>actions</category></metadata>\n\
                 </directive>\n"
            ),
        )
        .unwrap();
        path
    }

    fn resolver(project: Option<&Path>, user: &Path) -> DirectiveResolver {
        DirectiveResolver::new(project.map(Path::to_path_buf), user.to_path_buf(), None)
    }

    #[test]
    fn project_beats_user() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_directive(project.path(), "core/deploy.md", "deploy", "2.0.0");
        write_directive(user.path(), "core/deploy.md", "deploy", "1.0.0");

        let r = resolver(Some(project.path()), user.path());
        let d = r.load("deploy", None).unwrap().unwrap();
        assert_eq!(d.source, Source::Project);
        assert_eq!(d.version, "2.0.0");
    }

    #[test]
    fn falls_through_to_user() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_directive(user.path(), "core/lint.md", "lint", "1.0.0");

        let r = resolver(Some(project.path()), user.path());
        let d = r.load("lint", None).unwrap().unwrap();
        assert_eq!(d.source, Source::User);
    }

    #[test]
    fn local_snapshot_wins_regardless_of_version_constraint() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_directive(project.path(), "core/deploy.md", "deploy", "1.0.0");
        write_directive(user.path(), "core/deploy.md", "deploy", "2.1.0");

        // Local tiers hold one snapshot each; the constraint never makes
        // resolution skip past what is installed.
        let r = resolver(Some(project.path()), user.path());
        let d = r.load("deploy", Some("^2.0.0")).unwrap().unwrap();
        assert_eq!(d.source, Source::Project);
        assert_eq!(d.version, "1.0.0");
    }

    #[test]
    fn missing_everywhere_is_none() {
        let user = TempDir::new().unwrap();
        let r = resolver(None, user.path());
        assert!(r.load("ghost", None).unwrap().is_none());
    }

    #[test]
    fn malformed_project_file_falls_through() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let bad = project.path().join("core/deploy.md");
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, "<directive name=\"deploy\"><broken></directive>").unwrap();
        write_directive(user.path(), "core/deploy.md", "deploy", "1.0.0");

        let r = resolver(Some(project.path()), user.path());
        let d = r.load("deploy", None).unwrap().unwrap();
        assert_eq!(d.source, Source::User);
    }

    #[test]
    fn cache_evicts_on_edit() {
        let user = TempDir::new().unwrap();
        let path = write_directive(user.path(), "core/deploy.md", "deploy", "1.0.0");

        let r = resolver(None, user.path());
        assert_eq!(r.load("deploy", None).unwrap().unwrap().version, "1.0.0");

        // Edit the file; next load must see the new version.
        write_directive(user.path(), "core/deploy.md", "deploy", "1.1.0");
        let reloaded = r.load("deploy", None).unwrap().unwrap();
        assert_eq!(reloaded.version, "1.1.0");
        assert_eq!(reloaded.path, Some(path));
    }

    #[test]
    fn load_local_skips_registry() {
        let user = TempDir::new().unwrap();
        let registry = crate::registry::SqliteRegistry::open_in_memory().unwrap();
        registry
            .create(&crate::registry::NewDirective {
                name: "remote_only".to_string(),
                version: "1.0.0".to_string(),
                description: String::new(),
                category: "actions".to_string(),
                subcategory: None,
                tags: vec![],
                tech_stack: vec![],
                content: "<directive name=\"remote_only\" version=\"1.0.0\"></directive>"
                    .to_string(),
                content_hash: compute_content_hash("x"),
                changelog: None,
            })
            .unwrap();

        let r = DirectiveResolver::new(
            None,
            user.path().to_path_buf(),
            Some(Arc::new(registry)),
        );
        assert!(r.load_local("remote_only").is_none());
        let remote = r.load("remote_only", None).unwrap().unwrap();
        assert_eq!(remote.source, Source::Registry);
        assert!(remote.path.is_none());
    }
}
