//! Dockerfile detection

use super::Probe;
use pipegen_core::{BuilderArtifact, BuilderKind};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

const INSTRUCTIONS: &[&str] = &[
    "ADD",
    "ARG",
    "CMD",
    "COPY",
    "ENTRYPOINT",
    "ENV",
    "EXPOSE",
    "FROM",
    "HEALTHCHECK",
    "LABEL",
    "MAINTAINER",
    "ONBUILD",
    "RUN",
    "SHELL",
    "STOPSIGNAL",
    "USER",
    "VOLUME",
    "WORKDIR",
];

fn heredoc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<<-?\s*["']?([A-Za-z_][A-Za-z0-9_]*)["']?"#).expect("valid regex")
    })
}

/// `Dockerfile`, `Dockerfile.<suffix>` and `<prefix>.Dockerfile`, any case.
pub fn claims(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower == "dockerfile" || lower.starts_with("dockerfile.") || lower.ends_with(".dockerfile")
}

pub fn probe(path: &Path, content: &str) -> Probe {
    match validate(content) {
        Ok(stages) => {
            debug!(path = %path.display(), stages, "Dockerfile detected");
            let dockerfile = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "Dockerfile".to_string());
            Probe::Artifact(BuilderArtifact::detected(
                path.to_path_buf(),
                BuilderKind::Docker { dockerfile },
                None,
            ))
        }
        Err(reason) => Probe::Unusable(reason),
    }
}

/// Instructions with continuations joined, comments and heredoc bodies removed.
fn instructions(content: &str) -> Vec<String> {
    let mut escape = '\\';
    let mut in_preamble = true;
    let mut result = Vec::new();
    let mut current = String::new();
    let mut heredoc: Option<String> = None;

    for raw in content.lines() {
        let line = raw.trim();

        if let Some(delimiter) = &heredoc {
            if line == delimiter {
                heredoc = None;
            }
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            // Parser directives only count before the first instruction
            if in_preamble {
                if let Some(value) = comment.trim().strip_prefix("escape=") {
                    if let Some(c) = value.trim().chars().next() {
                        escape = c;
                    }
                }
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        in_preamble = false;

        match line.strip_suffix(escape) {
            Some(head) => {
                current.push_str(head.trim_end());
                current.push(' ');
            }
            None => {
                current.push_str(line);
                if let Some(cap) = heredoc_re().captures(&current) {
                    heredoc = Some(cap[1].to_string());
                }
                result.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.trim().is_empty() {
        result.push(current);
    }
    result
}

/// Minimal structural check; returns the number of build stages.
pub fn validate(content: &str) -> Result<usize, String> {
    let instructions = instructions(content);
    if instructions.is_empty() {
        return Err("no instructions".to_string());
    }

    let mut stages = 0;
    for (idx, instruction) in instructions.iter().enumerate() {
        let mut parts = instruction.split_whitespace();
        let keyword = parts.next().unwrap_or_default().to_uppercase();

        if !INSTRUCTIONS.contains(&keyword.as_str()) {
            return Err(format!("unknown instruction '{}'", keyword));
        }
        if idx == 0 && keyword != "FROM" && keyword != "ARG" {
            return Err(format!(
                "first instruction must be FROM or ARG, found {}",
                keyword
            ));
        }
        if keyword == "FROM" {
            if parts.next().is_none() {
                return Err("FROM requires a base image".to_string());
            }
            stages += 1;
        }
    }

    if stages == 0 {
        return Err("no FROM instruction".to_string());
    }
    Ok(stages)
}
