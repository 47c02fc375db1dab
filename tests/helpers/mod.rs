#![allow(dead_code)]

use dirigent::directive::loader::DirectiveResolver;
use dirigent::directive::lockfile::compute_content_hash;
use dirigent::directive::search::SearchOrchestrator;
use dirigent::directive::sync::TierSyncEngine;
use dirigent::registry::{NewDirective, RegistryStore, SqliteRegistry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Full engine stack over temp directories and an in-memory registry.
pub struct TestEnv {
    pub project_dir: PathBuf,
    pub user_dir: PathBuf,
    pub lockfile_path: PathBuf,
    pub resolver: Arc<DirectiveResolver>,
    pub search: Arc<SearchOrchestrator>,
    pub sync: Arc<TierSyncEngine>,
    pub registry: Arc<dyn RegistryStore>,
    _project_root: TempDir,
    _user_root: TempDir,
}

pub fn test_env() -> TestEnv {
    let project_root = TempDir::new().unwrap();
    let user_root = TempDir::new().unwrap();
    let project_dir = project_root.path().join(".ai/directives");
    let user_dir = user_root.path().join("directives");
    fs::create_dir_all(&project_dir).unwrap();
    fs::create_dir_all(&user_dir).unwrap();
    let lockfile_path = user_root.path().join("directives.lock.json");

    let registry: Arc<dyn RegistryStore> = Arc::new(SqliteRegistry::open_in_memory().unwrap());
    let resolver = Arc::new(DirectiveResolver::new(
        Some(project_dir.clone()),
        user_dir.clone(),
        Some(Arc::clone(&registry)),
    ));
    let search = Arc::new(SearchOrchestrator::new(Arc::clone(&resolver)));
    let sync = Arc::new(TierSyncEngine::new(
        Arc::clone(&resolver),
        lockfile_path.clone(),
        102_400,
    ));

    TestEnv {
        project_dir,
        user_dir,
        lockfile_path,
        resolver,
        search,
        sync,
        registry,
        _project_root: project_root,
        _user_root: user_root,
    }
}

/// Seed a curated core-category directive straight into the registry. The
/// publish path reroutes the reserved `core` category, so shipped content is
/// inserted at the store level.
pub fn seed_core(env: &TestEnv, name: &str, version: &str, description: &str) {
    let content = directive_doc(name, version, "core", description, &[]);
    let new = NewDirective {
        name: name.to_string(),
        version: version.to_string(),
        description: description.to_string(),
        category: "core".to_string(),
        subcategory: None,
        tags: vec!["test".to_string()],
        tech_stack: vec![],
        content_hash: compute_content_hash(&content),
        content,
        changelog: None,
    };
    if env.registry.get(name, None).is_ok() {
        env.registry.add_version(&new).unwrap();
    } else {
        env.registry.create(&new).unwrap();
    }
}

/// A well-formed directive document with the given metadata.
pub fn directive_doc(
    name: &str,
    version: &str,
    category: &str,
    description: &str,
    tech_stack: &[&str],
) -> String {
    let stack = tech_stack.join(", ");
    format!(
        "# {name}\n\n\
         <directive name=\"{name}\" version=\"{version}\">\n\
           <metadata>\n\
             <description>{description}</description>\n\
             <category>{category}</category>\n\
             <tags>test</tags>\n\
           </metadata>\n\
           <context>\n\
             <tech_stack>{stack}</tech_stack>\n\
           </context>\n\
           <process>\n\
             <step>First step</step>\n\
             <step>Second step</step>\n\
           </process>\n\
         </directive>\n"
    )
}

/// Write a directive file under a tier directory. Returns its path.
pub fn write_directive(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}
