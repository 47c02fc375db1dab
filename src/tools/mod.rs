pub mod delete_directive;
pub mod get_directive;
pub mod help;
pub mod publish_directive;
pub mod run_directive;
pub mod search_directives;

use delete_directive::DeleteDirectiveParams;
use get_directive::GetDirectiveParams;
use help::HelpParams;
use publish_directive::PublishDirectiveParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use run_directive::RunDirectiveParams;
use search_directives::SearchDirectivesParams;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::directive::finder;
use crate::directive::loader::DirectiveResolver;
use crate::directive::parser::DocValue;
use crate::directive::search::{SearchOrchestrator, SearchParams};
use crate::directive::sync::{DeleteFrom, InstallTarget, TierSyncEngine};
use crate::directive::types::{SearchFilters, SearchSource, SortBy};
use crate::registry::RegistryStore;

/// Shared state behind every tool call. The engines built at startup are
/// rooted at the server's own working directory; a request that names a
/// `project_path` gets fresh engines rooted there instead, sharing the same
/// registry, user tier, and lockfile.
pub struct ToolContext {
    registry: Option<Arc<dyn RegistryStore>>,
    user_dir: PathBuf,
    lockfile_path: PathBuf,
    project_subdir: String,
    max_content_bytes: usize,
    resolver: Arc<DirectiveResolver>,
    search: Arc<SearchOrchestrator>,
    sync: Arc<TierSyncEngine>,
}

impl ToolContext {
    pub fn new(
        registry: Option<Arc<dyn RegistryStore>>,
        default_project_dir: Option<PathBuf>,
        user_dir: PathBuf,
        lockfile_path: PathBuf,
        project_subdir: String,
        max_content_bytes: usize,
    ) -> Self {
        let (resolver, search, sync) = build_engines(
            registry.clone(),
            default_project_dir,
            user_dir.clone(),
            lockfile_path.clone(),
            max_content_bytes,
        );
        Self {
            registry,
            user_dir,
            lockfile_path,
            project_subdir,
            max_content_bytes,
            resolver,
            search,
            sync,
        }
    }

    /// Engines rooted at the request's project, or the startup defaults when
    /// the request names none.
    pub fn engines_for(
        &self,
        project_path: Option<&str>,
    ) -> (
        Arc<DirectiveResolver>,
        Arc<SearchOrchestrator>,
        Arc<TierSyncEngine>,
    ) {
        match project_path {
            None => (
                Arc::clone(&self.resolver),
                Arc::clone(&self.search),
                Arc::clone(&self.sync),
            ),
            Some(root) => build_engines(
                self.registry.clone(),
                Some(Path::new(root).join(&self.project_subdir)),
                self.user_dir.clone(),
                self.lockfile_path.clone(),
                self.max_content_bytes,
            ),
        }
    }

    /// The default sync engine, for CLI paths that run outside a request.
    pub fn sync(&self) -> Arc<TierSyncEngine> {
        Arc::clone(&self.sync)
    }
}

fn build_engines(
    registry: Option<Arc<dyn RegistryStore>>,
    project_dir: Option<PathBuf>,
    user_dir: PathBuf,
    lockfile_path: PathBuf,
    max_content_bytes: usize,
) -> (
    Arc<DirectiveResolver>,
    Arc<SearchOrchestrator>,
    Arc<TierSyncEngine>,
) {
    let resolver = Arc::new(DirectiveResolver::new(project_dir, user_dir, registry));
    let search = Arc::new(SearchOrchestrator::new(Arc::clone(&resolver)));
    let sync = Arc::new(TierSyncEngine::new(
        Arc::clone(&resolver),
        lockfile_path,
        max_content_bytes,
    ));
    (resolver, search, sync)
}

/// The dirigent MCP tool handler. Exposes all MCP tools via the
/// `#[tool_router]` macro on top of a shared [`ToolContext`].
#[derive(Clone)]
pub struct DirigentTools {
    tool_router: ToolRouter<Self>,
    ctx: Arc<ToolContext>,
}

#[tool_router]
impl DirigentTools {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            ctx,
        }
    }

    /// Search directives across local tiers and the registry.
    #[tool(description = "Search for directives by query. Searches project and user tiers plus the shared registry, ranked by relevance with local results preferred on ties.")]
    async fn search_directives(
        &self,
        Parameters(params): Parameters<SearchDirectivesParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        let source = match &params.source {
            Some(s) => s.parse::<SearchSource>()?,
            None => SearchSource::All,
        };

        let search_params = SearchParams {
            query: params.query.clone(),
            source,
            tech_stack: params.tech_stack.unwrap_or_default(),
            category: params.category,
            limit: params.limit.unwrap_or(10).clamp(1, 50),
            sort_by: SortBy::from_param(params.sort_by.as_deref()),
            filters: SearchFilters {
                categories: params.categories,
                subcategories: params.subcategories,
                tags: params.tags,
                tech_stack: None,
                date_from: params.date_from,
                date_to: params.date_to,
            },
        };

        tracing::info!(query = %params.query, source = ?source, "search_directives called");

        let (_, search, _) = self.ctx.engines_for(params.project_path.as_deref());
        let matches = tokio::task::spawn_blocking(move || search.search(&search_params))
            .await
            .map_err(|e| format!("search task failed: {e}"))?
            .map_err(|e| format!("search failed: {e}"))?;

        serde_json::to_string(&serde_json::json!({
            "query": params.query,
            "total": matches.len(),
            "results": matches,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Load an installed directive for execution.
    #[tool(description = "Load an installed directive (project or user tier) and return its content and process steps for execution. Registry content must be downloaded first via get_directive.")]
    async fn run_directive(
        &self,
        Parameters(params): Parameters<RunDirectiveParams>,
    ) -> Result<String, String> {
        tracing::info!(name = %params.name, "run_directive called");

        let (resolver, _, _) = self.ctx.engines_for(params.project_path.as_deref());
        let name = params.name.clone();
        let directive = tokio::task::spawn_blocking(move || resolver.load_local(&name))
            .await
            .map_err(|e| format!("load task failed: {e}"))?
            .ok_or_else(|| {
                format!(
                    "directive '{}' is not installed locally; use get_directive with \
                     action='download' to install it first",
                    params.name
                )
            })?;

        serde_json::to_string(&serde_json::json!({
            "name": directive.name,
            "version": directive.version,
            "description": directive.description,
            "source": directive.source,
            "path": directive.path,
            "tech_stack": directive.tech_stack,
            "steps": process_steps(&directive.parsed),
            "content": directive.content,
            "inputs": params.inputs,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Inspect, install, or bulk-sync registry directives.
    #[tool(description = "Fetch a directive from the registry. Default action shows it; 'download' installs it into the user tier; 'versions' lists published versions; 'check_updates' and 'update_all' sync installed directives against the registry.")]
    async fn get_directive(
        &self,
        Parameters(params): Parameters<GetDirectiveParams>,
    ) -> Result<String, String> {
        let action = params.action.as_deref().unwrap_or("info").to_string();
        tracing::info!(name = ?params.name, action = %action, "get_directive called");

        let (resolver, _, sync) = self.ctx.engines_for(params.project_path.as_deref());

        match action.as_str() {
            "check_updates" => {
                let local_versions = params.local_versions.clone();
                let categories = params.categories.clone();
                let check = tokio::task::spawn_blocking(move || {
                    sync.check_updates(local_versions.as_ref(), categories.as_deref())
                })
                .await
                .map_err(|e| format!("task failed: {e}"))?
                .map_err(|e| e.to_string())?;
                serde_json::to_string(&check).map_err(|e| format!("serialization failed: {e}"))
            }
            "update_all" => {
                let report = tokio::task::spawn_blocking(move || sync.update_all())
                    .await
                    .map_err(|e| format!("task failed: {e}"))?
                    .map_err(|e| e.to_string())?;
                serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
            }
            "versions" => {
                let name = require_name(&params.name)?;
                let versions =
                    tokio::task::spawn_blocking(move || sync.list_versions(&name))
                        .await
                        .map_err(|e| format!("task failed: {e}"))?
                        .map_err(|e| e.to_string())?;
                let listed: Vec<serde_json::Value> = versions
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "version": v.version,
                            "is_latest": v.is_latest,
                            "published_at": v.published_at,
                            "changelog": v.changelog,
                        })
                    })
                    .collect();
                serde_json::to_string(&serde_json::json!({
                    "name": params.name,
                    "versions": listed,
                }))
                .map_err(|e| format!("serialization failed: {e}"))
            }
            "download" => {
                let name = require_name(&params.name)?;
                let version = params.version.clone();
                let target = match params.to.as_deref() {
                    Some(s) => s.parse::<InstallTarget>()?,
                    None => InstallTarget::User,
                };
                let sub_path = params.path.clone();
                let report = tokio::task::spawn_blocking(move || {
                    sync.download_to(&name, version.as_deref(), target, sub_path.as_deref())
                })
                .await
                .map_err(|e| format!("task failed: {e}"))?
                .map_err(|e| e.to_string())?;
                serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
            }
            "info" => {
                let name = require_name(&params.name)?;
                let version = params.version.clone();
                let directive = tokio::task::spawn_blocking(move || {
                    resolver.load(&name, version.as_deref())
                })
                .await
                .map_err(|e| format!("task failed: {e}"))?
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("directive '{}' not found", params.name.as_deref().unwrap_or_default()))?;

                serde_json::to_string(&serde_json::json!({
                    "name": directive.name,
                    "version": directive.version,
                    "description": directive.description,
                    "source": directive.source,
                    "path": directive.path,
                    "tech_stack": directive.tech_stack,
                    "content": directive.content,
                }))
                .map_err(|e| format!("serialization failed: {e}"))
            }
            other => Err(format!(
                "unknown action: {other} (expected 'info', 'download', 'versions', \
                 'check_updates', or 'update_all')"
            )),
        }
    }

    /// Publish an installed directive to the registry.
    #[tool(description = "Publish a directive from a local tier to the shared registry. Names an installed directive; its file is located in the source tier ('project' by default, or 'user'), validated, and published. Publishing an already-published version is rejected.")]
    async fn publish_directive(
        &self,
        Parameters(params): Parameters<PublishDirectiveParams>,
    ) -> Result<String, String> {
        let name = params.directive.trim().to_string();
        if name.is_empty() {
            return Err("directive name must not be empty".into());
        }
        let source = params.source.as_deref().unwrap_or("project");
        tracing::info!(directive = %name, version = %params.version, source, "publish_directive called");

        let (resolver, _, sync) = self.ctx.engines_for(params.project_path.as_deref());
        let root = match source {
            "project" => resolver
                .project_dir()
                .ok_or_else(|| "no project tier configured; pass project_path".to_string())?
                .to_path_buf(),
            "user" => resolver.user_dir().to_path_buf(),
            other => {
                return Err(format!(
                    "unknown source tier: {other} (expected 'project' or 'user')"
                ))
            }
        };

        let version = params.version.clone();
        let changelog = params.changelog;
        let report = tokio::task::spawn_blocking(move || -> Result<_, String> {
            let path = finder::find_directive_file(&root, &name).ok_or_else(|| {
                format!("directive '{name}' not found under {}", root.display())
            })?;
            let content = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            sync.publish(Some(&version), &content, changelog.as_deref())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("publish task failed: {e}"))??;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Delete a directive from the selected tiers.
    #[tool(description = "Delete a directive from the project tier, user tier, the registry, or all of them. Requires confirm=true as a safety gate. Registry deletion removes the directive and its whole version history.")]
    async fn delete_directive(
        &self,
        Parameters(params): Parameters<DeleteDirectiveParams>,
    ) -> Result<String, String> {
        if !params.confirm.unwrap_or(false) {
            return Err(format!(
                "refusing to delete '{}' without confirm=true",
                params.name
            ));
        }
        let from = match params.from.as_deref() {
            Some(s) => s.parse::<DeleteFrom>()?,
            None => DeleteFrom::User,
        };
        tracing::info!(name = %params.name, from = ?from, "delete_directive called");

        let (_, _, sync) = self.ctx.engines_for(params.project_path.as_deref());
        let name = params.name.clone();
        let cleanup = params.cleanup_empty_dirs.unwrap_or(true);
        let report = tokio::task::spawn_blocking(move || sync.delete(&name, from, cleanup))
            .await
            .map_err(|e| format!("delete task failed: {e}"))?;

        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Explain the directive system and its tools.
    #[tool(description = "Get help on the directive system: tools, version constraints, and the directive file format.")]
    async fn directive_help(
        &self,
        Parameters(params): Parameters<HelpParams>,
    ) -> Result<String, String> {
        let text = match params.topic.as_deref() {
            None | Some("") => help::OVERVIEW,
            Some(topic) => help::topic_text(topic)
                .ok_or_else(|| format!("unknown help topic: {topic}"))?,
        };
        serde_json::to_string(&serde_json::json!({
            "topic": params.topic.unwrap_or_else(|| "overview".to_string()),
            "help": text,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }
}

fn require_name(name: &Option<String>) -> Result<String, String> {
    name.as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| "name is required for this action".to_string())
}

/// Ordered process step texts from a parsed directive, if it has any.
fn process_steps(parsed: &DocValue) -> Vec<String> {
    match parsed.get("process").and_then(|p| p.get("step")) {
        Some(DocValue::List(items)) => items
            .iter()
            .filter_map(|i| i.as_text())
            .map(str::to_string)
            .collect(),
        Some(step) => step.as_text().map(str::to_string).into_iter().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(default_project: Option<PathBuf>) -> (TempDir, ToolContext) {
        let dir = TempDir::new().unwrap();
        let user_dir = dir.path().join("directives");
        std::fs::create_dir_all(&user_dir).unwrap();
        let ctx = ToolContext::new(
            None,
            default_project,
            user_dir,
            dir.path().join("directives.lock.json"),
            ".ai/directives".to_string(),
            102_400,
        );
        (dir, ctx)
    }

    #[test]
    fn no_project_path_reuses_startup_engines() {
        let (_dir, ctx) = context(None);
        let (resolver, _, sync) = ctx.engines_for(None);
        assert!(Arc::ptr_eq(&resolver, &ctx.resolver));
        assert!(Arc::ptr_eq(&sync, &ctx.sync));
        assert!(resolver.project_dir().is_none());
    }

    #[test]
    fn project_path_roots_fresh_engines_at_the_request() {
        let (_dir, ctx) = context(None);
        let (resolver, _, _) = ctx.engines_for(Some("/work/app"));
        assert_eq!(
            resolver.project_dir(),
            Some(Path::new("/work/app/.ai/directives"))
        );
        // User tier and lockfile stay shared with the defaults.
        assert_eq!(resolver.user_dir(), ctx.resolver.user_dir());
    }

    #[test]
    fn request_project_overrides_server_default() {
        let (_dir, ctx) = context(Some(PathBuf::from("/srv/cwd/.ai/directives")));
        let (default_resolver, _, _) = ctx.engines_for(None);
        assert_eq!(
            default_resolver.project_dir(),
            Some(Path::new("/srv/cwd/.ai/directives"))
        );
        let (scoped, _, _) = ctx.engines_for(Some("/work/other"));
        assert_eq!(
            scoped.project_dir(),
            Some(Path::new("/work/other/.ai/directives"))
        );
    }
}

#[tool_handler]
impl ServerHandler for DirigentTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Dirigent manages reusable directives for coding agents across \
                 project, user, and registry tiers. Use search_directives to find \
                 directives, run_directive to execute installed ones, get_directive \
                 to inspect or install registry content, publish_directive to share, \
                 and delete_directive to remove directives from chosen tiers."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
