//! Catalog of coaching tools a conversation can be bound to.

use std::path::Path;

use serde::Serialize;

use crate::prompts::{GROW_TOOL_PROMPT, TEAM_DIAGNOSIS_TOOL_PROMPT};

pub const TEAM_DIAGNOSIS_TOOL_ID: &str = "team-diagnosis";

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub id: String,
    pub title: String,
    pub tag_prefix: String,
    pub description: String,
    #[serde(skip)]
    pub prompt: String,
}

/// Built-in tools plus optional knowledge text appended to a tool's prompt.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
    /// Knowledge-base text for the team-diagnosis tool, if any was loaded.
    knowledge: Option<String>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolCatalog {
    pub fn builtin() -> Self {
        Self {
            tools: vec![
                Tool {
                    id: "grow".into(),
                    title: "GROW 目标管理".into(),
                    tag_prefix: "GROW".into(),
                    description: "目标清晰、现实校准与行动路径设计。".into(),
                    prompt: GROW_TOOL_PROMPT.into(),
                },
                Tool {
                    id: TEAM_DIAGNOSIS_TOOL_ID.into(),
                    title: "团队状态诊断".into(),
                    tag_prefix: "TEAM".into(),
                    description: "快速识别团队协作阻塞与改进切口。".into(),
                    prompt: TEAM_DIAGNOSIS_TOOL_PROMPT.into(),
                },
            ],
            knowledge: None,
        }
    }

    /// Load every `.txt` file in `dir` (sorted by name) as team-diagnosis
    /// knowledge. Missing or unreadable files are logged and skipped.
    pub fn with_knowledge_dir(mut self, dir: Option<&Path>) -> Self {
        if let Some(dir) = dir {
            self.knowledge = load_knowledge(dir);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn list(&self) -> &[Tool] {
        &self.tools
    }

    /// The prompt a turn bound to `tool_id` runs with: the tool prompt plus
    /// any knowledge-base text. `None` for no tool or an unknown tool.
    pub fn effective_prompt(&self, tool_id: Option<&str>) -> Option<String> {
        let tool = self.get(tool_id?)?;
        match (&self.knowledge, tool.id.as_str()) {
            (Some(kb), TEAM_DIAGNOSIS_TOOL_ID) => Some(format!("{}\n\n{kb}", tool.prompt)),
            _ => Some(tool.prompt.clone()),
        }
    }
}

fn load_knowledge(dir: &Path) -> Option<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "knowledge directory unreadable");
            return None;
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    let mut sections = Vec::new();
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sections.push(format!("=== {name} ===\n{}", text.trim()));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping knowledge file");
            }
        }
    }

    if sections.is_empty() {
        tracing::warn!(dir = %dir.display(), "no knowledge files found");
        return None;
    }
    tracing::info!(dir = %dir.display(), files = sections.len(), "loaded tool knowledge base");
    Some(format!(
        "[System Injection: Core Knowledge Base]\n\n{}",
        sections.join("\n\n")
    ))
}
