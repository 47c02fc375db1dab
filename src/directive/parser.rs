//! Directive document parsing.
//!
//! A directive is a markdown file embedding exactly one structured block
//! delimited by `<directive ...>` and `</directive>`. [`extract_block`] cuts
//! that block out of the surrounding markdown and [`parse_block`] converts it
//! into a [`DocValue`] tree.
//!
//! Extraction pairs the first opening tag with the *last* closing tag. Real
//! directives embed example snippets that contain the same tags, and pairing
//! with the first close would truncate them. The trade-off: trailing content
//! after the real block that happens to contain `</directive>` mis-parses.
//! Producers must escape nested CDATA markers (see [`escape_nested_cdata`]);
//! this is an authoring contract, not a parser responsibility.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::warn;

const OPEN_TAG: &str = "<directive";
const CLOSE_TAG: &str = "</directive>";

/// A parsed markup node.
///
/// Mirrors the document structure: attributes and text live on the node,
/// children are keyed by tag name, and repeated same-tag children collapse
/// into an ordered list. An element with only text content simplifies to
/// `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Text(String),
    List(Vec<DocValue>),
    Node(DocNode),
}

/// Children keep document order, so structured lists (process steps, tech
/// stacks) come back in the order they were written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocNode {
    pub attrs: HashMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<(String, DocValue)>,
}

impl DocValue {
    /// Text of this value: `Text` directly, or a node's own text content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Node(node) => node.text.as_deref(),
            Self::List(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&DocNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Child lookup on a node value; `None` for text and list values.
    pub fn get(&self, tag: &str) -> Option<&DocValue> {
        self.as_node()
            .and_then(|n| n.children.iter().find(|(k, _)| k.as_str() == tag))
            .map(|(_, v)| v)
    }

    /// Root attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.as_node().and_then(|n| n.attrs.get(name)).map(String::as_str)
    }
}

/// Extract the structured block from a markdown document.
///
/// Returns the span from the first `<directive ...>` opening tag through the
/// last `</directive>` occurrence, or `None` when either tag is missing or
/// the close precedes the open.
pub fn extract_block(markdown: &str) -> Option<&str> {
    let start = find_open_tag(markdown)?;
    let end = markdown.rfind(CLOSE_TAG)?;
    if end < start {
        return None;
    }
    Some(markdown[start..end + CLOSE_TAG.len()].trim())
}

/// Locate the byte offset of the first `<directive` opening tag, requiring a
/// tag boundary after the name so `<directives>` does not match.
fn find_open_tag(markdown: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = markdown[search_from..].find(OPEN_TAG) {
        let idx = search_from + rel;
        match markdown[idx + OPEN_TAG.len()..].chars().next() {
            Some(c) if c == '>' || c.is_whitespace() => return Some(idx),
            None => return None,
            _ => search_from = idx + OPEN_TAG.len(),
        }
    }
    None
}

/// Parse an extracted block into a [`DocValue`] tree.
///
/// Malformed markup is reported and yields `None` — callers treat the file
/// as "not a directive" rather than failing the whole operation.
pub fn parse_block(raw: &str) -> Option<DocValue> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let root = match element_to_value(&e, &mut reader) {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(error = %err, "malformed directive markup");
                        return None;
                    }
                };
                // The root is always a node, even when text-only.
                return Some(match root {
                    DocValue::Text(text) => DocValue::Node(DocNode {
                        text: Some(text),
                        ..DocNode::default()
                    }),
                    other => other,
                });
            }
            Ok(Event::Eof) => return None,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "malformed directive markup");
                return None;
            }
        }
    }
}

/// Extract and parse in one step.
pub fn parse_document(markdown: &str) -> Option<DocValue> {
    parse_block(extract_block(markdown)?)
}

/// Recursively convert an element into a [`DocValue`].
///
/// Elements with only text simplify to `Text`; repeated same-tag children
/// collapse into an ordered `List`.
fn element_to_value(
    element: &quick_xml::events::BytesStart,
    reader: &mut Reader<&[u8]>,
) -> Result<DocValue, String> {
    let mut node = DocNode::default();
    read_attrs(element, &mut node.attrs)?;

    let mut text = String::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let child = element_to_value(&e, reader)?;
                insert_child(&mut node, tag, child);
            }
            Event::Empty(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut empty = DocNode::default();
                read_attrs(&e, &mut empty.attrs)?;
                insert_child(&mut node, tag, DocValue::Node(empty));
            }
            Event::Text(e) => text.push_str(&e.unescape().map_err(|e| e.to_string())?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => break,
            Event::Eof => return Err("unexpected end of block".to_string()),
            _ => {}
        }
    }

    let trimmed = text.trim();
    if !trimmed.is_empty() {
        node.text = Some(trimmed.to_string());
    }

    // Text-only elements simplify to a plain string.
    if node.attrs.is_empty() && node.children.is_empty() {
        if let Some(t) = node.text {
            return Ok(DocValue::Text(t));
        }
    }
    Ok(DocValue::Node(node))
}

fn read_attrs(
    element: &quick_xml::events::BytesStart,
    into: &mut HashMap<String, String>,
) -> Result<(), String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        into.insert(key, value);
    }
    Ok(())
}

fn insert_child(node: &mut DocNode, tag: String, child: DocValue) {
    match node.children.iter_mut().find(|(k, _)| *k == tag) {
        Some((_, DocValue::List(items))) => items.push(child),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, DocValue::List(Vec::new()));
            if let DocValue::List(items) = existing {
                items.push(first);
                items.push(child);
            }
        }
        None => node.children.push((tag, child)),
    }
}

/// Escape nested CDATA markers so a block with example CDATA sections inside
/// a real CDATA section survives parsing.
///
/// XML has no nested CDATA: an inner `]]>` terminates the outer section
/// early. This walks CDATA sections tracking depth and entity-escapes the
/// inner markers. Used on the publish validation path.
pub fn escape_nested_cdata(raw: &str) -> String {
    const CDATA_START: &str = "<![CDATA[";
    const CDATA_END: &str = "]]>";

    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < bytes.len() {
        if raw[i..].starts_with(CDATA_START) {
            out.push_str(CDATA_START);
            i += CDATA_START.len();
            let mut depth = 1usize;
            while i < bytes.len() && depth > 0 {
                if raw[i..].starts_with(CDATA_START) {
                    out.push_str("&lt;![CDATA[");
                    i += CDATA_START.len();
                    depth += 1;
                } else if raw[i..].starts_with(CDATA_END) {
                    depth -= 1;
                    if depth == 0 {
                        out.push_str(CDATA_END);
                    } else {
                        out.push_str("]]&gt;");
                    }
                    i += CDATA_END.len();
                } else {
                    let ch = raw[i..].chars().next().unwrap_or('\u{FFFD}');
                    out.push(ch);
                    i += ch.len_utf8();
                }
            }
        } else {
            let ch = raw[i..].chars().next().unwrap_or('\u{FFFD}');
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

// ── Metadata accessors ───────────────────────────────────────────────────────

/// Description from `metadata/description`.
pub fn description(parsed: &DocValue) -> String {
    parsed
        .get("metadata")
        .and_then(|m| m.get("description"))
        .and_then(DocValue::as_text)
        .unwrap_or_default()
        .to_string()
}

/// Category from `metadata/category`.
pub fn category(parsed: &DocValue) -> String {
    parsed
        .get("metadata")
        .and_then(|m| m.get("category"))
        .and_then(DocValue::as_text)
        .unwrap_or_default()
        .to_string()
}

/// Subcategory from `metadata/subcategory`, `None` when missing or blank.
pub fn subcategory(parsed: &DocValue) -> Option<String> {
    parsed
        .get("metadata")
        .and_then(|m| m.get("subcategory"))
        .and_then(DocValue::as_text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Tags from `metadata/tags`: a comma-separated string, a repeated element
/// list, or a single element.
pub fn tags(parsed: &DocValue) -> Vec<String> {
    let Some(value) = parsed.get("metadata").and_then(|m| m.get("tags")) else {
        return Vec::new();
    };
    match value {
        DocValue::Text(s) => split_csv(s),
        DocValue::List(items) => items
            .iter()
            .filter_map(|item| item.as_text())
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .collect(),
        DocValue::Node(_) => value
            .as_text()
            .map(|t| vec![t.to_string()])
            .unwrap_or_default(),
    }
}

/// Tech stack from `context/tech_stack`: either a comma-separated string
/// ("React 18+, Zustand, Axios") or structured children
/// (`<framework>React</framework><language>TypeScript</language>`).
pub fn tech_stack(parsed: &DocValue) -> Vec<String> {
    let Some(value) = parsed.get("context").and_then(|c| c.get("tech_stack")) else {
        return Vec::new();
    };
    match value {
        DocValue::Text(s) => split_csv(s),
        DocValue::Node(node) => {
            let mut values: Vec<String> = Vec::new();
            for (_, child) in &node.children {
                match child {
                    DocValue::Text(s) => values.push(s.clone()),
                    DocValue::Node(n) => {
                        if let Some(t) = &n.text {
                            values.push(t.clone());
                        }
                    }
                    DocValue::List(items) => {
                        values.extend(
                            items.iter().filter_map(|i| i.as_text()).map(str::to_string),
                        );
                    }
                }
            }
            values
        }
        DocValue::List(_) => Vec::new(),
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# JWT Auth

Some intro text.

<directive name="jwt_auth_zustand" version="1.2.0">
  <metadata>
    <description>JWT authentication with Zustand store</description>
    <category>patterns</category>
    <subcategory>auth</subcategory>
    <tags>jwt, auth, react</tags>
  </metadata>
  <context>
    <tech_stack>React 18+, Zustand, Axios</tech_stack>
  </context>
  <process>
    <step>Install dependencies</step>
    <step>Create the auth store</step>
    <step>Wire the interceptor</step>
  </process>
</directive>

Trailing notes.
"#;

    #[test]
    fn extract_finds_block() {
        let block = extract_block(SAMPLE).unwrap();
        assert!(block.starts_with("<directive"));
        assert!(block.ends_with("</directive>"));
    }

    #[test]
    fn extract_none_without_tags() {
        assert!(extract_block("# just markdown").is_none());
        assert!(extract_block("<directive name=\"x\">no close").is_none());
        assert!(extract_block("</directive> before <directive name=\"x\">").is_none());
    }

    #[test]
    fn extract_uses_last_close_tag() {
        let doc = "<directive name=\"outer\" version=\"1.0.0\">\n\
                   example: </directive> appears mid-content\n\
                   </directive>";
        let block = extract_block(doc).unwrap();
        assert!(block.contains("appears mid-content"));
        assert!(block.ends_with("</directive>"));
    }

    #[test]
    fn parse_recovers_attributes() {
        let parsed = parse_document(SAMPLE).unwrap();
        assert_eq!(parsed.attr("name"), Some("jwt_auth_zustand"));
        assert_eq!(parsed.attr("version"), Some("1.2.0"));
    }

    #[test]
    fn parse_extracts_metadata() {
        let parsed = parse_document(SAMPLE).unwrap();
        assert_eq!(description(&parsed), "JWT authentication with Zustand store");
        assert_eq!(category(&parsed), "patterns");
        assert_eq!(subcategory(&parsed), Some("auth".to_string()));
        assert_eq!(tags(&parsed), vec!["jwt", "auth", "react"]);
        assert_eq!(tech_stack(&parsed), vec!["React 18+", "Zustand", "Axios"]);
    }

    #[test]
    fn repeated_children_collapse_to_list() {
        let parsed = parse_document(SAMPLE).unwrap();
        let steps = parsed.get("process").and_then(|p| p.get("step")).unwrap();
        match steps {
            DocValue::List(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].as_text(), Some("Install dependencies"));
                assert_eq!(items[2].as_text(), Some("Wire the interceptor"));
            }
            other => panic!("expected list of steps, got {other:?}"),
        }
    }

    #[test]
    fn text_only_element_simplifies_to_string() {
        let parsed = parse_block("<directive name=\"x\"><content>hello</content></directive>")
            .unwrap();
        assert_eq!(parsed.get("content"), Some(&DocValue::Text("hello".into())));
    }

    #[test]
    fn malformed_markup_returns_none() {
        assert!(parse_block("<directive name=\"x\"><unclosed></directive>").is_none());
        assert!(parse_block("not markup at all").is_none());
    }

    #[test]
    fn structured_tech_stack_keeps_document_order() {
        let doc = "<directive name=\"x\" version=\"1.0.0\">\
                   <context><tech_stack><language>TypeScript</language>\
                   <framework>React</framework>\
                   <state>Zustand</state></tech_stack></context>\
                   </directive>";
        let parsed = parse_block(doc).unwrap();
        assert_eq!(tech_stack(&parsed), vec!["TypeScript", "React", "Zustand"]);
    }

    #[test]
    fn cdata_content_preserved() {
        let doc = "<directive name=\"x\" version=\"1.0.0\">\
                   <content><![CDATA[raw <markdown> & code]]></content>\
                   </directive>";
        let parsed = parse_block(doc).unwrap();
        assert_eq!(
            parsed.get("content").and_then(DocValue::as_text),
            Some("raw <markdown> & code")
        );
    }

    #[test]
    fn escape_nested_cdata_markers() {
        let raw = "<template><![CDATA[outer <![CDATA[inner]]> rest]]></template>";
        let escaped = escape_nested_cdata(raw);
        assert_eq!(
            escaped,
            "<template><![CDATA[outer &lt;![CDATA[inner]]&gt; rest]]></template>"
        );
    }

    #[test]
    fn escape_leaves_plain_content_alone() {
        let raw = "<content><![CDATA[no nesting here]]></content>";
        assert_eq!(escape_nested_cdata(raw), raw);
    }
}
