//! Jib (Maven and Gradle plugin) detection

use super::Probe;
use pipegen_core::{BuilderArtifact, BuilderKind};
use regex::Regex;
use roxmltree::{Document, Node};
use std::path::Path;
use std::sync::OnceLock;

const MAVEN_PLUGIN: &str = "jib-maven-plugin";
const GRADLE_PLUGIN_ID: &str = "com.google.cloud.tools.jib";

fn gradle_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*jib\s*\{").expect("valid regex"))
}

fn gradle_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)\bto\s*(?:\{[^}]*?\bimage\s*=\s*|\.image\s*=\s*)['"]([^'"]+)['"]"#)
            .expect("valid regex")
    })
}

pub fn claims(file_name: &str) -> bool {
    matches!(file_name, "pom.xml" | "build.gradle" | "build.gradle.kts")
}

pub fn probe(path: &Path, content: &str) -> Probe {
    match path.file_name().and_then(|n| n.to_str()) {
        Some("pom.xml") => probe_maven(path, content),
        Some("build.gradle") | Some("build.gradle.kts") => probe_gradle(path, content),
        _ => Probe::NoMatch,
    }
}

fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|c| c.has_tag_name(tag))
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn probe_maven(path: &Path, content: &str) -> Probe {
    if !content.contains(MAVEN_PLUGIN) {
        return Probe::NoMatch;
    }

    let doc = match Document::parse(content) {
        Ok(doc) => doc,
        Err(e) => return Probe::Unusable(format!("invalid pom.xml: {}", e)),
    };

    let plugin = doc.descendants().find(|node| {
        node.has_tag_name("plugin")
            && child_text(*node, "artifactId").as_deref() == Some(MAVEN_PLUGIN)
    });
    let Some(plugin) = plugin else {
        // Mentioned in a comment or property only
        return Probe::NoMatch;
    };

    let image = plugin
        .descendants()
        .find(|n| n.has_tag_name("to"))
        .and_then(|to| child_text(to, "image"));

    // Modules of a multi-module build are addressed by artifactId
    let root = doc.root_element();
    let project = root
        .children()
        .any(|c| c.has_tag_name("parent"))
        .then(|| child_text(root, "artifactId"))
        .flatten();

    Probe::Artifact(BuilderArtifact::detected(
        path.to_path_buf(),
        BuilderKind::JibMaven { project },
        image,
    ))
}

fn probe_gradle(path: &Path, content: &str) -> Probe {
    if !content.contains(GRADLE_PLUGIN_ID) && !gradle_block_re().is_match(content) {
        return Probe::NoMatch;
    }

    let image = gradle_image_re()
        .captures(content)
        .map(|cap| cap[1].to_string());

    Probe::Artifact(BuilderArtifact::detected(
        path.to_path_buf(),
        BuilderKind::JibGradle { project: None },
        image,
    ))
}
