//! Typed parsing of package-manager manifest files.
//!
//! Each ecosystem's manifest is parsed against an explicit schema; documents
//! that do not match produce a [`ReconError::Parse`] which the caller logs
//! and skips. Best-effort field poking is deliberately avoided.

use crate::types::{Ecosystem, ReconError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Manifest formats recognized by filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    NpmPackageJson,
    PipRequirements,
    Pipfile,
    Pyproject,
    Gemfile,
    GemfileLock,
    GoMod,
}

/// One declared dependency pulled out of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: Option<String>,
}

impl Dependency {
    fn new(ecosystem: Ecosystem, name: &str, version: Option<&str>) -> Self {
        Self {
            ecosystem,
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }
}

/// Map a filename onto a manifest format, if it is one we parse.
pub fn recognize(file_name: &str) -> Option<ManifestKind> {
    match file_name {
        "package.json" => Some(ManifestKind::NpmPackageJson),
        "Pipfile" => Some(ManifestKind::Pipfile),
        "pyproject.toml" => Some(ManifestKind::Pyproject),
        "Gemfile" => Some(ManifestKind::Gemfile),
        "Gemfile.lock" => Some(ManifestKind::GemfileLock),
        "go.mod" => Some(ManifestKind::GoMod),
        name if name.starts_with("requirements") && name.ends_with(".txt") => {
            Some(ManifestKind::PipRequirements)
        }
        _ => None,
    }
}

/// Parse `content` as the given manifest format.
pub fn parse(kind: ManifestKind, content: &str, path: &str) -> Result<Vec<Dependency>> {
    match kind {
        ManifestKind::NpmPackageJson => parse_package_json(content, path),
        ManifestKind::PipRequirements => Ok(parse_requirements(content)),
        ManifestKind::Pipfile => parse_pipfile(content, path),
        ManifestKind::Pyproject => parse_pyproject(content, path),
        ManifestKind::Gemfile => Ok(parse_gemfile(content)),
        ManifestKind::GemfileLock => Ok(parse_gemfile_lock(content)),
        ManifestKind::GoMod => Ok(parse_go_mod(content)),
    }
}

#[derive(Debug, Deserialize)]
struct NpmManifest {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies", default)]
    dev_dependencies: BTreeMap<String, String>,
}

fn parse_package_json(content: &str, path: &str) -> Result<Vec<Dependency>> {
    let manifest: NpmManifest =
        serde_json::from_str(content).map_err(|e| ReconError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    Ok(manifest
        .dependencies
        .iter()
        .chain(manifest.dev_dependencies.iter())
        .map(|(name, version)| Dependency::new(Ecosystem::Npm, name, Some(version)))
        .collect())
}

/// `requirements*.txt`: one requirement specifier per line. Only pinned
/// (`==`) versions are recorded; ranges leave the version empty.
fn parse_requirements(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some((name, version)) = parse_requirement_specifier(line) {
            deps.push(Dependency::new(Ecosystem::Pypi, &name, version.as_deref()));
        }
    }
    deps
}

/// Pull the distribution name (and `==`-pinned version) out of a PEP 508
/// requirement like `requests[socks]==2.31.0 ; python_version >= "3.8"`.
fn parse_requirement_specifier(spec: &str) -> Option<(String, Option<String>)> {
    let name_re = Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)").expect("static pattern");
    let name = name_re.captures(spec)?.get(1)?.as_str().to_string();

    let version_re = Regex::new(r"==\s*([^\s;#,\[\]]+)").expect("static pattern");
    let version = version_re
        .captures(spec)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Some((name, version))
}

#[derive(Debug, Deserialize)]
struct PipfileManifest {
    #[serde(default)]
    packages: BTreeMap<String, toml::Value>,
    #[serde(rename = "dev-packages", default)]
    dev_packages: BTreeMap<String, toml::Value>,
}

fn parse_pipfile(content: &str, path: &str) -> Result<Vec<Dependency>> {
    let manifest: PipfileManifest = toml::from_str(content).map_err(|e| ReconError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    Ok(manifest
        .packages
        .iter()
        .chain(manifest.dev_packages.iter())
        .map(|(name, value)| {
            Dependency::new(Ecosystem::Pypi, name, pipfile_version(value).as_deref())
        })
        .collect())
}

/// Pipfile values are either a version string (`"==1.0"`, `"*"`) or an
/// inline table with a `version` key.
fn pipfile_version(value: &toml::Value) -> Option<String> {
    let raw = match value {
        toml::Value::String(s) => s.as_str(),
        toml::Value::Table(t) => t.get("version")?.as_str()?,
        _ => return None,
    };
    if raw == "*" {
        None
    } else {
        Some(raw.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PyprojectManifest {
    #[serde(default)]
    project: Option<PyprojectProject>,
}

#[derive(Debug, Deserialize)]
struct PyprojectProject {
    #[serde(default)]
    dependencies: Vec<String>,
}

fn parse_pyproject(content: &str, path: &str) -> Result<Vec<Dependency>> {
    let manifest: PyprojectManifest = toml::from_str(content).map_err(|e| ReconError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let Some(project) = manifest.project else {
        return Ok(Vec::new());
    };

    Ok(project
        .dependencies
        .iter()
        .filter_map(|spec| parse_requirement_specifier(spec))
        .map(|(name, version)| Dependency::new(Ecosystem::Pypi, &name, version.as_deref()))
        .collect())
}

fn parse_gemfile(content: &str) -> Vec<Dependency> {
    let re = Regex::new(r#"^\s*gem\s+["']([A-Za-z0-9_.\-]+)["'](?:\s*,\s*["']([^"']+)["'])?"#)
        .expect("static pattern");

    content
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let version = caps.get(2).map(|m| m.as_str());
            Dependency::new(Ecosystem::Gem, name, version)
        })
        .collect()
}

/// `Gemfile.lock` resolved gems: four-space indented `name (version)`
/// entries under the specs section.
fn parse_gemfile_lock(content: &str) -> Vec<Dependency> {
    let re = Regex::new(r"^    ([A-Za-z0-9_.\-]+) \(([^)]+)\)$").expect("static pattern");

    content
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let version = caps.get(2).map(|m| m.as_str());
            Dependency::new(Ecosystem::Gem, name, version)
        })
        .collect()
}

/// `go.mod` requirements: inline `require path vN` statements and
/// `require ( ... )` blocks. Indirect dependencies are kept; they are still
/// resolvable names.
fn parse_go_mod(content: &str) -> Vec<Dependency> {
    let entry_re =
        Regex::new(r"^\s*([A-Za-z0-9._\-/~]+)\s+(v[0-9][^\s]*)").expect("static pattern");

    let mut deps = Vec::new();
    let mut in_require_block = false;

    for line in content.lines() {
        let line = line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with("require (") {
            in_require_block = true;
            continue;
        }
        if in_require_block && trimmed.starts_with(')') {
            in_require_block = false;
            continue;
        }

        let candidate = if in_require_block {
            trimmed
        } else if let Some(rest) = trimmed.strip_prefix("require ") {
            rest
        } else {
            continue;
        };

        if candidate.starts_with("//") {
            continue;
        }
        if let Some(caps) = entry_re.captures(candidate) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let version = caps.get(2).map(|m| m.as_str());
            deps.push(Dependency::new(Ecosystem::Go, name, version));
        }
    }

    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_manifest_filenames() {
        assert_eq!(recognize("package.json"), Some(ManifestKind::NpmPackageJson));
        assert_eq!(recognize("requirements.txt"), Some(ManifestKind::PipRequirements));
        assert_eq!(recognize("requirements-dev.txt"), Some(ManifestKind::PipRequirements));
        assert_eq!(recognize("Pipfile"), Some(ManifestKind::Pipfile));
        assert_eq!(recognize("pyproject.toml"), Some(ManifestKind::Pyproject));
        assert_eq!(recognize("Gemfile"), Some(ManifestKind::Gemfile));
        assert_eq!(recognize("Gemfile.lock"), Some(ManifestKind::GemfileLock));
        assert_eq!(recognize("go.mod"), Some(ManifestKind::GoMod));
        assert_eq!(recognize("main.go"), None);
        assert_eq!(recognize("package-lock.json"), None);
    }

    #[test]
    fn test_package_json_round_trip() {
        let content = r#"{"dependencies": {"left-pad": "^1.0.0"}}"#;
        let deps = parse(ManifestKind::NpmPackageJson, content, "package.json").unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].ecosystem, Ecosystem::Npm);
        assert_eq!(deps[0].name, "left-pad");
        assert_eq!(deps[0].version.as_deref(), Some("^1.0.0"));
    }

    #[test]
    fn test_package_json_includes_dev_dependencies() {
        let content = r#"{
            "dependencies": {"react": "^18.0.0"},
            "devDependencies": {"@acme/eslint-rules": "2.1.0"}
        }"#;
        let deps = parse(ManifestKind::NpmPackageJson, content, "package.json").unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();

        assert!(names.contains(&"react"));
        assert!(names.contains(&"@acme/eslint-rules"));
    }

    #[test]
    fn test_malformed_package_json_is_a_parse_error() {
        let result = parse(ManifestKind::NpmPackageJson, "{not json", "web/package.json");
        match result {
            Err(ReconError::Parse { path, .. }) => assert_eq!(path, "web/package.json"),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_requirements_lines() {
        let content = "\
# pinned
requests[socks]==2.31.0
flask>=2.0
-r base.txt

some-nonexistent-pkg==1.0
";
        let deps = parse(ManifestKind::PipRequirements, content, "requirements.txt").unwrap();

        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[0].version.as_deref(), Some("2.31.0"));
        assert_eq!(deps[1].name, "flask");
        assert_eq!(deps[1].version, None);
        assert_eq!(deps[2].name, "some-nonexistent-pkg");
        assert_eq!(deps[2].version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_pipfile_string_and_table_values() {
        let content = r#"
[packages]
requests = "==2.31.0"
celery = { version = "==5.3", extras = ["redis"] }
anything = "*"

[dev-packages]
pytest = "==7.4"
"#;
        let deps = parse(ManifestKind::Pipfile, content, "Pipfile").unwrap();
        assert_eq!(deps.len(), 4);

        let requests = deps.iter().find(|d| d.name == "requests").unwrap();
        assert_eq!(requests.version.as_deref(), Some("==2.31.0"));
        let celery = deps.iter().find(|d| d.name == "celery").unwrap();
        assert_eq!(celery.version.as_deref(), Some("==5.3"));
        let anything = deps.iter().find(|d| d.name == "anything").unwrap();
        assert_eq!(anything.version, None);
    }

    #[test]
    fn test_pyproject_project_dependencies() {
        let content = r#"
[project]
name = "svc"
dependencies = ["httpx==0.27.0", "pydantic>=2"]
"#;
        let deps = parse(ManifestKind::Pyproject, content, "pyproject.toml").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "httpx");
        assert_eq!(deps[0].version.as_deref(), Some("0.27.0"));
    }

    #[test]
    fn test_pyproject_without_project_table_is_empty() {
        let content = "[tool.black]\nline-length = 100\n";
        let deps = parse(ManifestKind::Pyproject, content, "pyproject.toml").unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_gemfile_lines() {
        let content = r#"
source "https://rubygems.org"

gem "rails", "7.1.0"
gem 'nokogiri'
  gem "puma", "~> 6.0"
# gem "commented-out"
"#;
        let deps = parse(ManifestKind::Gemfile, content, "Gemfile").unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "rails");
        assert_eq!(deps[0].version.as_deref(), Some("7.1.0"));
        assert_eq!(deps[1].name, "nokogiri");
        assert_eq!(deps[1].version, None);
    }

    #[test]
    fn test_gemfile_lock_specs() {
        let content = "\
GEM
  remote: https://rubygems.org/
  specs:
    rack (3.0.8)
    rails (7.1.0)
      actionpack (= 7.1.0)

DEPENDENCIES
  rails
";
        let deps = parse(ManifestKind::GemfileLock, content, "Gemfile.lock").unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names, vec!["rack", "rails"]);
        assert_eq!(deps[0].version.as_deref(), Some("3.0.8"));
    }

    #[test]
    fn test_go_mod_inline_and_block_requires() {
        let content = "\
module acme.dev/svc

go 1.21

require github.com/pkg/errors v0.9.1

require (
    github.com/acme/widget v1.2.3
    golang.org/x/sync v0.5.0 // indirect
)
";
        let deps = parse(ManifestKind::GoMod, content, "go.mod").unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "github.com/pkg/errors",
                "github.com/acme/widget",
                "golang.org/x/sync"
            ]
        );
        assert_eq!(deps[1].version.as_deref(), Some("v1.2.3"));
    }
}
