//! Layer B — local discovery. Walks an infrastructure root to a bounded
//! depth, categorizes files by kind, picks one SSOT file per kind, and
//! runs lightweight per-kind extractors plus internal coherence checks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_MAX_DEPTH: usize = 3;
const RAW_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Terraform,
    Kustomization,
    HelmRelease,
    Docker,
    GithubWorkflow,
    HelmValues,
    GitArtifacts,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::Kustomization => "kustomization",
            Self::HelmRelease => "helmrelease",
            Self::Docker => "docker",
            Self::GithubWorkflow => "github-workflow",
            Self::HelmValues => "helm-values",
            Self::GitArtifacts => "git-artifacts",
        }
    }

    /// True for kinds parsed with the shallow `key: value` extractor
    /// rather than a kind-specific or raw-passthrough one.
    fn is_yaml_shaped(self) -> bool {
        matches!(self, Self::Kustomization | Self::HelmRelease | Self::HelmValues | Self::GithubWorkflow)
    }

    fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tf") {
            return Some(Self::Terraform);
        }
        if lower == "kustomization.yaml" || lower == "kustomization.yml" {
            return Some(Self::Kustomization);
        }
        if lower == "dockerfile" || lower.starts_with("dockerfile.") {
            return Some(Self::Docker);
        }
        if lower == "values.yaml" || lower == "values.yml" {
            return Some(Self::HelmValues);
        }
        if (lower.ends_with(".yaml") || lower.ends_with(".yml"))
            && path.components().any(|c| c.as_os_str() == ".github")
        {
            return Some(Self::GithubWorkflow);
        }
        if lower == ".gitignore" || lower == ".gitattributes" || lower == ".gitmodules" {
            return Some(Self::GitArtifacts);
        }
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            // Cheap content sniff: a HelmRelease manifest names its kind.
            if let Ok(contents) = std::fs::read_to_string(path) {
                if contents.lines().any(|l| l.trim() == "kind: HelmRelease") {
                    return Some(Self::HelmRelease);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub kind: FileKind,
    pub path: PathBuf,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    pub discovered_files: Vec<DiscoveredFile>,
    pub ssot_files: HashMap<String, PathBuf>,
    pub configurations: HashMap<String, Configuration>,
    pub internal_coherence: Vec<String>,
    pub discrepancies: Vec<Discrepancy>,
}

/// Walk `root` to `max_depth` (root itself is depth 0), discover files by
/// kind, pick one SSOT per kind (root-level preferred, else first
/// encountered), extract each SSOT, and run coherence checks.
pub fn discover(root: &Path, max_depth: usize) -> DiscoveryResult {
    let mut discovered = Vec::new();
    walk(root, 0, max_depth, &mut discovered);

    let mut ssot_files: HashMap<String, PathBuf> = HashMap::new();
    for file in &discovered {
        let key = file.kind.as_str().to_string();
        match ssot_files.get(&key) {
            None => {
                ssot_files.insert(key, file.path.clone());
            }
            Some(existing) => {
                let existing_depth = existing.strip_prefix(root).map(|p| p.components().count()).unwrap_or(usize::MAX);
                let candidate_depth =
                    file.path.strip_prefix(root).map(|p| p.components().count()).unwrap_or(usize::MAX);
                if candidate_depth < existing_depth {
                    ssot_files.insert(key, file.path.clone());
                }
            }
        }
    }

    let mut configurations = HashMap::new();
    for (kind_str, path) in &ssot_files {
        let kind = discovered.iter().find(|f| &f.path == path).map(|f| f.kind).unwrap();
        let data = extract(kind, path);
        configurations.insert(kind_str.clone(), Configuration { kind, path: path.clone(), data });
    }

    let (internal_coherence, discrepancies) = check_coherence(&configurations);

    DiscoveryResult { discovered_files: discovered, ssot_files, configurations, internal_coherence, discrepancies }
}

pub fn discover_default(root: &Path) -> DiscoveryResult {
    discover(root, DEFAULT_MAX_DEPTH)
}

fn walk(dir: &Path, depth: usize, max_depth: usize, out: &mut Vec<DiscoveredFile>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
                continue;
            }
            walk(&path, depth + 1, max_depth, out);
        } else if let Some(kind) = FileKind::classify(&path) {
            out.push(DiscoveredFile { path, kind });
        }
    }
}

fn extract(kind: FileKind, path: &Path) -> Map<String, Value> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Map::new();
    };
    match kind {
        FileKind::Terraform => extract_terraform(&contents),
        FileKind::Docker | FileKind::GitArtifacts => extract_raw(&contents),
        _ if kind.is_yaml_shaped() => extract_shallow_yaml(&contents),
        _ => extract_raw(&contents),
    }
}

fn extract_terraform(contents: &str) -> Map<String, Value> {
    let mut out = Map::new();

    if let Some(locals_regex) = Regex::new(r"(?s)locals\s*\{(.*?)\n\}").ok() {
        if let Some(caps) = locals_regex.captures(contents) {
            let mut locals = Map::new();
            let assign = Regex::new(r#"(?m)^\s*([\w-]+)\s*=\s*(.+?)\s*$"#).unwrap();
            for cap in assign.captures_iter(&caps[1]) {
                locals.insert(cap[1].to_string(), Value::String(cap[2].trim().to_string()));
            }
            out.insert("locals".to_string(), Value::Object(locals));
        }
    }

    let var_regex = Regex::new(r#"(?m)^variable\s+"([^"]+)"\s*\{"#).unwrap();
    let variables: Vec<Value> = var_regex.captures_iter(contents).map(|c| Value::String(c[1].to_string())).collect();
    out.insert("variables".to_string(), Value::Array(variables));

    let resource_regex = Regex::new(r#"(?m)^resource\s+"([^"]+)"\s+"([^"]+)"\s*\{"#).unwrap();
    let resources: Vec<Value> = resource_regex
        .captures_iter(contents)
        .map(|c| Value::String(format!("{}.{}", &c[1], &c[2])))
        .collect();
    out.insert("resources".to_string(), Value::Array(resources));

    out
}

fn extract_shallow_yaml(contents: &str) -> Map<String, Value> {
    let mut out = Map::new();
    let line_regex = Regex::new(r"^([A-Za-z_][\w-]*):\s*(.+)$").unwrap();
    for line in contents.lines() {
        // Top-level only: no leading whitespace.
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some(caps) = line_regex.captures(line) {
            let value = caps[2].trim().trim_matches('"').trim_matches('\'');
            out.insert(caps[1].to_string(), Value::String(value.to_string()));
        }
    }
    out
}

fn extract_raw(contents: &str) -> Map<String, Value> {
    let mut out = Map::new();
    let preview: String = contents.chars().take(RAW_PREVIEW_CHARS).collect();
    out.insert("_raw".to_string(), Value::String(preview));
    out
}

/// HelmRelease `releaseName` should match the colocated `values.yaml`'s
/// `name`, when both exist.
fn check_coherence(configurations: &HashMap<String, Configuration>) -> (Vec<String>, Vec<Discrepancy>) {
    let mut ok = Vec::new();
    let mut bad = Vec::new();

    if let (Some(release), Some(values)) =
        (configurations.get(FileKind::HelmRelease.as_str()), configurations.get(FileKind::HelmValues.as_str()))
    {
        let release_name = release.data.get("releaseName").and_then(Value::as_str);
        let values_name = values.data.get("name").and_then(Value::as_str);
        match (release_name, values_name) {
            (Some(r), Some(v)) if r == v => ok.push("HelmRelease releaseName matches values.yaml name".to_string()),
            (Some(r), Some(v)) => bad.push(Discrepancy {
                description: format!("HelmRelease releaseName '{r}' does not match values.yaml name '{v}'"),
            }),
            _ => {}
        }
    }

    (ok, bad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_terraform_and_extracts_resources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("main.tf"),
            "locals {\n  env = \"prod\"\n}\n\nvariable \"region\" {\n  type = string\n}\n\nresource \"aws_s3_bucket\" \"data\" {\n  bucket = \"x\"\n}\n",
        )
        .unwrap();

        let result = discover_default(dir.path());
        assert_eq!(result.discovered_files.len(), 1);
        assert!(result.ssot_files.contains_key("terraform"));
        let config = &result.configurations["terraform"];
        assert_eq!(config.data["variables"], Value::Array(vec![Value::String("region".to_string())]));
        assert_eq!(
            config.data["resources"],
            Value::Array(vec![Value::String("aws_s3_bucket.data".to_string())])
        );
    }

    #[test]
    fn bounded_depth_stops_descending() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c/d");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("main.tf"), "").unwrap();

        let result = discover(dir.path(), 2);
        assert!(result.discovered_files.is_empty());
    }

    #[test]
    fn prefers_root_level_ssot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.tf"), "").unwrap();
        let nested = dir.path().join("modules/network");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("main.tf"), "").unwrap();

        let result = discover_default(dir.path());
        assert_eq!(result.ssot_files["terraform"], dir.path().join("main.tf"));
    }

    #[test]
    fn detects_helmrelease_values_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("release.yaml"), "kind: HelmRelease\nreleaseName: tcm-api\n").unwrap();
        fs::write(dir.path().join("values.yaml"), "name: pg-api\nreplicas: 2\n").unwrap();

        let result = discover_default(dir.path());
        assert_eq!(result.discrepancies.len(), 1);
        assert!(result.discrepancies[0].description.contains("tcm-api"));
    }

    #[test]
    fn unknown_extension_keeps_raw_preview() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM rust:1.88\nRUN cargo build\n").unwrap();

        let result = discover_default(dir.path());
        let config = &result.configurations["docker"];
        assert!(config.data["_raw"].as_str().unwrap().starts_with("FROM rust"));
    }
}
