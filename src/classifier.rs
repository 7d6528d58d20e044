//! Keyword extraction and skill inference.
//!
//! Skills are inferred from free text (task names, commit messages) and from
//! changed file paths. The matcher table is configuration: [`PatternClassifier`]
//! is built from a list of `skill -> regex` rules plus an extension table, and
//! anything implementing [`SkillClassifier`] can be swapped in.

use anyhow::{Result, anyhow};
use regex_lite::Regex;
use std::collections::BTreeMap;

/// Infers skill names from text and file paths.
pub trait SkillClassifier: Send + Sync {
    /// Skills implied by free text.
    fn classify_text(&self, text: &str) -> Vec<String>;

    /// Skills implied by a changed file path.
    fn classify_path(&self, path: &str) -> Vec<String>;
}

/// Built-in `skill -> pattern` rules. Patterns are matched case-insensitively.
pub const DEFAULT_SKILL_PATTERNS: &[(&str, &str)] = &[
    ("react", r"\breact\b|\bjsx\b|\bhooks?\b|\bcomponents?\b"),
    ("typescript", r"\btypescript\b|\btsx?\b|\btypes?\b|\binterfaces?\b"),
    ("javascript", r"\bjavascript\b|\bjs\b|\bnode(\.js)?\b|\bnpm\b"),
    ("python", r"\bpython\b|\bpy\b|\bdjango\b|\bflask\b|\bpip\b"),
    ("rust", r"\brust\b|\bcargo\b|\bcrates?\b"),
    ("testing", r"\btests?\b|\btesting\b|\bspecs?\b|\bjest\b|\bpytest\b|\bcoverage\b"),
    ("database", r"\bsql\b|\bdatabase\b|\bdb\b|\bquer(y|ies)\b|\bschema\b|\bmigrations?\b|\bneo4j\b|\bcypher\b"),
    ("api", r"\bapi\b|\bendpoints?\b|\brest\b|\bgraphql\b|\broutes?\b"),
    ("css", r"\bcss\b|\bstyles?\b|\bstyling\b|\btailwind\b|\bscss\b|\blayout\b"),
    ("docker", r"\bdocker\b|\bcontainers?\b|\bkubernetes\b|\bk8s\b"),
    ("git", r"\bgit\b|\bmerge\b|\brebase\b|\bbranch(es)?\b"),
    ("documentation", r"\bdocs?\b|\breadme\b|\bdocumentation\b"),
    ("security", r"\bauth\b|\bauthentication\b|\bsecurity\b|\bjwt\b|\boauth\b|\bencrypt(ion)?\b"),
    ("performance", r"\bperf\b|\bperformance\b|\boptimi[sz]e\b|\bcach(e|ing)\b|\blatency\b"),
    ("devops", r"\bci\b|\bcd\b|\bdeploy(ment)?\b|\bpipelines?\b|\bworkflows?\b"),
];

/// Built-in `extension -> skills` rules. Extensions are lowercase, without dot.
pub const DEFAULT_EXTENSION_SKILLS: &[(&str, &[&str])] = &[
    ("rs", &["rust"]),
    ("ts", &["typescript"]),
    ("tsx", &["typescript", "react"]),
    ("js", &["javascript"]),
    ("jsx", &["javascript", "react"]),
    ("py", &["python"]),
    ("css", &["css"]),
    ("scss", &["css"]),
    ("sql", &["database"]),
    ("cypher", &["database"]),
    ("md", &["documentation"]),
    ("yml", &["devops"]),
    ("yaml", &["devops"]),
];

/// Words that carry no signal for keyword matching.
const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "both", "could", "does",
    "doing", "done", "each", "from", "have", "having", "into", "just", "like", "make", "more",
    "most", "much", "need", "only", "other", "over", "same", "should", "some", "such", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "under", "until", "very", "want", "were", "what", "when", "where", "which", "while", "will",
    "with", "would", "your",
];

/// Canonical skill label: trimmed, lowercased, inner whitespace collapsed.
/// Returns `None` for blank input.
pub fn normalize_skill(name: &str) -> Option<String> {
    let normalized = name
        .split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Keyword set for heuristic matching.
///
/// Splits on anything that is not alphanumeric, lowercases, drops stop-words
/// and tokens of three characters or fewer, and keeps first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        let token = token.to_lowercase();
        if token.chars().count() <= 3 || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if !keywords.contains(&token) {
            keywords.push(token);
        }
    }
    keywords
}

/// Extension key without its leading dot, lowercased.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Regex-table classifier.
pub struct PatternClassifier {
    patterns: Vec<(String, Regex)>,
    extensions: BTreeMap<String, Vec<String>>,
}

impl PatternClassifier {
    /// Build from explicit rules. Skill names are normalized; an invalid
    /// pattern is an error naming the skill.
    pub fn new<'a>(
        patterns: impl IntoIterator<Item = (&'a str, &'a str)>,
        extensions: impl IntoIterator<Item = (&'a str, Vec<String>)>,
    ) -> Result<Self> {
        let mut compiled = Vec::new();
        for (skill, pattern) in patterns {
            let Some(skill) = normalize_skill(skill) else {
                continue;
            };
            let regex = Regex::new(&format!("(?i){}", pattern))
                .map_err(|e| anyhow!("invalid pattern for skill '{}': {}", skill, e))?;
            compiled.push((skill, regex));
        }

        let extensions = extensions
            .into_iter()
            .map(|(ext, skills)| {
                let skills = skills.iter().filter_map(|s| normalize_skill(s)).collect();
                (normalize_extension(ext), skills)
            })
            .collect();

        Ok(Self {
            patterns: compiled,
            extensions,
        })
    }

    /// Built-in tables merged with overrides: an override replaces the
    /// built-in rule for the same skill or extension.
    pub fn with_overrides(
        pattern_overrides: &BTreeMap<String, String>,
        extension_overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut patterns: BTreeMap<String, String> = DEFAULT_SKILL_PATTERNS
            .iter()
            .map(|(skill, pattern)| (skill.to_string(), pattern.to_string()))
            .collect();
        patterns.extend(
            pattern_overrides
                .iter()
                .filter_map(|(skill, pattern)| Some((normalize_skill(skill)?, pattern.clone()))),
        );

        let mut extensions: BTreeMap<String, Vec<String>> = DEFAULT_EXTENSION_SKILLS
            .iter()
            .map(|(ext, skills)| {
                (
                    ext.to_string(),
                    skills.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        extensions.extend(
            extension_overrides
                .iter()
                .map(|(ext, skills)| (normalize_extension(ext), skills.clone())),
        );

        Self::new(
            patterns.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            extensions.iter().map(|(k, v)| (k.as_str(), v.clone())),
        )
    }

    /// Skill names this classifier can produce.
    pub fn skills(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patterns.iter().map(|(s, _)| s.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        let patterns = DEFAULT_SKILL_PATTERNS.iter().filter_map(|(skill, pattern)| {
            let regex = Regex::new(&format!("(?i){}", pattern)).ok()?;
            Some((skill.to_string(), regex))
        });
        let extensions = DEFAULT_EXTENSION_SKILLS
            .iter()
            .map(|(ext, skills)| {
                (
                    ext.to_string(),
                    skills.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self {
            patterns: patterns.collect(),
            extensions,
        }
    }
}

impl SkillClassifier for PatternClassifier {
    fn classify_text(&self, text: &str) -> Vec<String> {
        let mut skills: Vec<String> = self
            .patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(skill, _)| skill.clone())
            .collect();
        skills.dedup();
        skills
    }

    fn classify_path(&self, path: &str) -> Vec<String> {
        let lower = path.to_lowercase();
        let file_name = lower.rsplit(['/', '\\']).next().unwrap_or(&lower);

        let mut skills = Vec::new();
        if let Some((_, ext)) = file_name.rsplit_once('.')
            && let Some(mapped) = self.extensions.get(ext)
        {
            skills.extend(mapped.iter().cloned());
        }
        if file_name.contains(".test.") || file_name.contains(".spec.") || file_name.starts_with("test_")
        {
            skills.push("testing".to_string());
        }
        if file_name == "dockerfile" || file_name.starts_with("docker-compose") {
            skills.push("docker".to_string());
        }

        skills.sort();
        skills.dedup();
        skills
    }
}

/// Skills implied by a commit: message plus every changed file.
pub fn classify_commit(
    classifier: &dyn SkillClassifier,
    message: &str,
    files: &[String],
) -> Vec<String> {
    let mut skills = classifier.classify_text(message);
    for file in files {
        skills.extend(classifier.classify_path(file));
    }
    skills.sort();
    skills.dedup();
    skills
}
