//! MCP `directive_help` tool: static usage topics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `directive_help` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HelpParams {
    /// Topic to explain. Omit for the overview.
    #[schemars(
        description = "Topic: 'search', 'run', 'get', 'publish', 'delete', 'versions', or 'format'. Omit for an overview."
    )]
    pub topic: Option<String>,
}

pub const OVERVIEW: &str = "\
Dirigent manages reusable directives — structured instruction documents for \
coding agents — across three tiers: project (.ai/directives/), user \
(~/.dirigent/directives/), and a shared registry. Project beats user beats \
registry when the same name exists in several tiers.\n\n\
Tools: search_directives finds directives, run_directive loads an installed \
one for execution, get_directive inspects/installs registry content, \
publish_directive shares a directive, delete_directive removes it from \
chosen tiers. \
Ask for a topic ('search', 'run', 'get', 'publish', 'delete', 'versions', \
'format') for details.";

pub fn topic_text(topic: &str) -> Option<&'static str> {
    match topic {
        "search" => Some(
            "search_directives matches your query against directive names, \
             descriptions, categories, and tech stacks. source='local' searches \
             installed tiers only, 'registry' the shared registry, 'all' both. \
             Pass tech_stack to boost compatible results, and use \
             categories/subcategories/tags/date filters to narrow. sort_by \
             accepts 'score', 'success_rate', 'date', or 'downloads'.",
        ),
        "run" => Some(
            "run_directive resolves a name through project then user tier and \
             returns its content plus process steps. Registry content is never \
             run directly — install it first with get_directive \
             action='download' so it can be reviewed.",
        ),
        "get" => Some(
            "get_directive without an action shows a registry directive. \
             action='download' installs it into the user tier (to='project' \
             targets the project tier instead; path nests the file one \
             directory deeper); only user-tier installs are lockfile-tracked. \
             action='versions' lists published versions. \
             action='check_updates' compares installed directives against the \
             registry, over all categories or the ones you list, judged by \
             your local_versions map when given; action='update_all' installs \
             or refreshes the core set. Version constraints: exact '1.2.0', \
             caret '^1.2.0', tilde '~1.2.0', or 'latest'.",
        ),
        "publish" => Some(
            "publish_directive names an installed directive, finds its file \
             in the source tier ('project' by default, or 'user'), validates \
             the content block (name and version attributes, metadata with \
             description, and a process with steps or a content section), and \
             stores it in the registry. The given version must match the one \
             declared in the file; re-publishing an existing version is \
             rejected.",
        ),
        "delete" => Some(
            "delete_directive removes a directive from the project tier, user \
             tier, registry, or everywhere (from='all'). Requires \
             confirm=true. Deleting from the user tier also drops the \
             lockfile entry. Registry deletion removes the full version \
             history; local-only deletes leave the registry copy available \
             for reinstall. Each tier reports its own outcome.",
        ),
        "versions" => Some(
            "Directives carry MAJOR.MINOR.PATCH versions. Constraints: exact \
             '1.2.0' matches only that version; '^1.2.0' allows compatible \
             upgrades within major 1; '~1.2.0' allows patch upgrades within \
             1.2; '*' or 'latest' matches anything.",
        ),
        "format" => Some(
            "A directive is a markdown file containing one <directive \
             name=\"...\" version=\"...\"> block with a <metadata> section \
             (description, category, optional subcategory and tags), an \
             optional <context> section (tech_stack), and either a <process> \
             with <step> elements or a <content> section. Wrap literal markup \
             examples in CDATA sections.",
        ),
        _ => None,
    }
}
