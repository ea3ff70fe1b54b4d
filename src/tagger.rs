//! Keyword-category tagging of block content.
//!
//! A static table maps each tag to keywords; a category applies when any of
//! its keywords occurs as a substring of the lowercased content text. Block
//! types with structured descriptors (project tech stack, persona expertise,
//! user tools) also contribute those values directly as tags.

use serde::Serialize;
use serde_json::Value;

use crate::memory::types::{flatten_text, BlockType};

struct Category {
    tag: &'static str,
    keywords: &'static [&'static str],
    /// Orders matched tags; higher first.
    weight: f32,
}

const fn cat(tag: &'static str, keywords: &'static [&'static str], weight: f32) -> Category {
    Category {
        tag,
        keywords,
        weight,
    }
}

const CATEGORIES: &[Category] = &[
    // technology / ecosystem
    cat("rust", &["rust", "cargo", "tokio", "crates.io"], 1.0),
    cat("typescript", &["typescript", ".tsx", "tsconfig"], 1.0),
    cat("javascript", &["javascript", "node.js", "nodejs", "npm", "deno"], 0.9),
    cat("python", &["python", "pip ", "django", "flask", "fastapi", "pytest"], 1.0),
    cat("golang", &["golang", "go.mod", "goroutine"], 1.0),
    cat("jvm", &["kotlin", "spring", "maven", "gradle", "jvm"], 0.9),
    cat("frontend", &["react", "vue", "svelte", "tailwind", "css", "html", "component"], 0.8),
    cat("backend", &["server", "api", "endpoint", "middleware", "graphql", "grpc"], 0.8),
    cat("database", &["database", "sql", "postgres", "sqlite", "mongo", "redis", "migration"], 0.8),
    cat("testing", &["test", "jest", "vitest", "coverage", "mock"], 0.7),
    cat("devops", &["docker", "kubernetes", "deploy", "ci/cd", "pipeline", "terraform"], 0.7),
    cat("security", &["auth", "security", "jwt", "oauth", "encrypt", "password", "permission"], 0.9),
    // content / behavior
    cat("architecture", &["architecture", "pattern", "monolith", "microservice", "layered", "module"], 0.6),
    cat("performance", &["performance", "optimiz", "latency", "cache", "throughput"], 0.6),
    cat("code-style", &["style", "format", "lint", "naming", "convention", "indent"], 0.5),
    cat("communication", &["verbose", "concise", "explanation", "example", "tone"], 0.5),
    cat("documentation", &["documentation", "docs", "readme", "comment", "docstring"], 0.5),
    cat("debugging", &["bug", "error", "debug", "crash", "stack trace"], 0.5),
    cat("preference", &["prefer", "always", "never", "avoid"], 0.4),
    cat("workflow", &["workflow", "git", "commit", "review", "branch"], 0.4),
];

/// Tags for one block plus how confidently the category table matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagResult {
    pub tags: Vec<String>,
    /// `min(0.5 + 0.5 * matched / categories, 1.0)` to two decimals; 0 with no
    /// category match.
    pub confidence: f32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AutoTagger;

impl AutoTagger {
    pub fn new() -> Self {
        Self
    }

    /// Number of categories in the table.
    pub fn category_count(&self) -> usize {
        CATEGORIES.len()
    }

    pub fn extract_tags(&self, block_type: BlockType, content: &Value) -> TagResult {
        let mut text = String::new();
        flatten_text(content, &mut text);
        let matched = match_categories(&text.to_lowercase());

        let mut tags = vec![block_type.as_str().to_string()];
        for tag in matched.iter().map(|c| c.tag.to_string()).chain(mine_fields(block_type, content)) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        TagResult {
            tags,
            confidence: confidence(matched.len(), CATEGORIES.len()),
        }
    }

    /// Category matching over free text, without type-specific mining.
    pub fn suggest_tags(&self, text: &str) -> Vec<String> {
        match_categories(&text.to_lowercase())
            .into_iter()
            .map(|c| c.tag.to_string())
            .collect()
    }
}

fn match_categories(text: &str) -> Vec<&'static Category> {
    let mut matched: Vec<&Category> = CATEGORIES
        .iter()
        .filter(|c| c.keywords.iter().any(|k| text.contains(k)))
        .collect();
    // stable: equal weights keep table order
    matched.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    matched
}

fn confidence(matches: usize, total: usize) -> f32 {
    if matches == 0 || total == 0 {
        return 0.0;
    }
    let raw = (0.5 + 0.5 * matches as f32 / total as f32).min(1.0);
    (raw * 100.0).round() / 100.0
}

/// Structured descriptor fields that become tags verbatim.
fn mine_fields(block_type: BlockType, content: &Value) -> Vec<String> {
    let mut out = Vec::new();
    match block_type {
        BlockType::Project => {
            if let Some(stack) = content.get("tech_stack").and_then(Value::as_object) {
                for field in ["language", "framework", "database", "styling", "testing", "build_tool"] {
                    if let Some(v) = stack.get(field).and_then(Value::as_str) {
                        out.push(v);
                    }
                }
            }
        }
        BlockType::Persona => out.extend(string_list(content, "expertise_areas")),
        BlockType::User => out.extend(string_list(content, "tools")),
        BlockType::Corrections => {}
    }
    out.into_iter().filter_map(normalize_tag).collect()
}

fn string_list<'a>(content: &'a Value, key: &str) -> impl Iterator<Item = &'a str> {
    content
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    (!tag.is_empty()).then_some(tag)
}
