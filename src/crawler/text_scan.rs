//! Reference extraction from text-like assets.
//!
//! Shader sources, assembly definition files and shader graphs are not
//! described by the object model, so their references are pulled out of the
//! raw text. These functions only find candidate values; the crawler decides
//! which of them are searched objects.

use serde::Deserialize;
use std::collections::HashSet;

use crate::error::Result;

const INCLUDE_PREFIXES: &[&str] = &["#include ", "#include_with_pragmas "];
const GRAPH_GUID_PREFIX: &str = "\"guid\\\"";
const FUNCTION_SOURCE_PREFIX: &str = "\"m_FunctionSource\"";
const GRAPH_FORMAT_MARKER: &str = "\"m_ObjectId\"";

/// Extensions scanned for `#include` lines.
pub const INCLUDE_SOURCE_EXTENSIONS: &[&str] = &["compute", "cginc", "cg", "glslinc", "hlsl"];
/// Extensions that can be the target of an `#include`.
pub const INCLUDE_TARGET_EXTENSIONS: &[&str] = &["hlsl", "cginc", "cg", "glslinc"];
pub const ASSEMBLY_EXTENSIONS: &[&str] = &["asmdef", "asmref"];
pub const SHADER_GRAPH_EXTENSIONS: &[&str] = &["shadergraph", "shadersubgraph"];

/// Every value enclosed in `wrapper` that follows one of `prefixes`.
///
/// After a prefix, the value starts at the next `wrapper` and ends at the one
/// after it. Empty values are skipped. Scanning resumes after the value.
pub fn values_in_text(text: &str, prefixes: &[&str], wrapper: char) -> Vec<String> {
    let mut values = Vec::new();
    for prefix in prefixes {
        let mut position = 0;
        while let Some(found) = text[position..].find(prefix) {
            let after_prefix = position + found + prefix.len();
            let Some(open) = text[after_prefix..].find(wrapper) else {
                break;
            };
            let start = after_prefix + open + wrapper.len_utf8();
            let Some(close) = text[start..].find(wrapper) else {
                break;
            };
            let end = start + close;
            if end > start {
                values.push(text[start..end].to_string());
            }
            position = end;
        }
    }
    values
}

/// Project-relative paths of the `#include` targets in `source` that are in `targets`.
///
/// An include is first matched verbatim, then resolved relative to the
/// directory of `source_path`.
pub fn include_references(source: &str, source_path: &str, targets: &HashSet<String>) -> Vec<String> {
    let directory = source_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    values_in_text(source, INCLUDE_PREFIXES, '"')
        .into_iter()
        .filter_map(|include| {
            if targets.contains(&include) {
                return Some(include);
            }
            let resolved = normalize_path(&format!("{directory}/{include}"))?;
            targets.contains(&resolved).then_some(resolved)
        })
        .collect()
}

/// Collapse `.` and `..` segments. `None` if the path climbs above the project root.
fn normalize_path(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

#[derive(Debug, Default, Deserialize)]
struct AssemblyReferences {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    references: Vec<String>,
}

/// The assemblies an `.asmdef` (`references`) or `.asmref` (`reference`) points at.
pub fn assembly_references(text: &str) -> Result<Vec<String>> {
    let parsed: AssemblyReferences = serde_json::from_str(text)?;
    let mut references = parsed.references;
    references.extend(parsed.reference.filter(|r| !r.is_empty()));
    Ok(references)
}

#[derive(Deserialize)]
struct AssemblyName {
    #[serde(default)]
    name: Option<String>,
}

/// The `name` an assembly definition declares, if the text parses.
pub fn assembly_name(text: &str) -> Option<String> {
    serde_json::from_str::<AssemblyName>(text)
        .ok()
        .and_then(|parsed| parsed.name)
        .filter(|name| !name.is_empty())
}

/// GUIDs found in a shader graph.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GraphReferences {
    /// Nested `"guid\"` values: textures, sub-graphs and other assets.
    pub assets: Vec<String>,
    /// `"m_FunctionSource"` values of Custom Function nodes.
    pub function_sources: Vec<String>,
}

/// `None` for graphs saved in the legacy serialization format.
pub fn shader_graph_references(text: &str, include_function_sources: bool) -> Option<GraphReferences> {
    let head_end = text
        .char_indices()
        .nth(200)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    if !text[..head_end].contains(GRAPH_FORMAT_MARKER) {
        return None;
    }

    let assets = values_in_text(text, &[GRAPH_GUID_PREFIX], '"')
        .into_iter()
        .filter(|guid| guid.len() > 1)
        .map(|guid| guid.strip_suffix('\\').map(str::to_string).unwrap_or(guid))
        .collect();
    let function_sources = if include_function_sources {
        values_in_text(text, &[FUNCTION_SOURCE_PREFIX], '"')
    } else {
        Vec::new()
    };

    Some(GraphReferences {
        assets,
        function_sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_values_in_text() {
        let text = r#"#include "A.hlsl"
            #include_with_pragmas "B.cginc"
            #include "" #include "C.cg""#;
        let values = values_in_text(text, INCLUDE_PREFIXES, '"');
        assert_eq!(values, vec!["A.hlsl", "C.cg", "B.cginc"]);
        assert!(values_in_text("#include \"unterminated", INCLUDE_PREFIXES, '"').is_empty());
    }

    #[test]
    fn test_include_resolution() {
        let source = r#"
            #include "Assets/Shaders/Common.hlsl"
            #include "../Lib/Noise.cginc"
            #include "Local.glslinc"
            #include "Missing.hlsl"
        "#;
        let targets = set(&[
            "Assets/Shaders/Common.hlsl",
            "Assets/Lib/Noise.cginc",
            "Assets/Shaders/Effects/Local.glslinc",
        ]);
        let found = include_references(source, "Assets/Shaders/Effects/Glow.shader", &targets);
        assert_eq!(
            found,
            vec!["Assets/Shaders/Common.hlsl", "Assets/Shaders/Effects/Local.glslinc"],
            "../Lib resolves to Assets/Shaders/Lib, which is not searched"
        );
    }

    #[test]
    fn test_include_relative_to_parent() {
        let targets = set(&["Assets/Lib/Noise.cginc"]);
        let found = include_references(
            "#include \"../../Lib/Noise.cginc\"",
            "Assets/Shaders/Effects/Glow.shader",
            &targets,
        );
        assert_eq!(found, vec!["Assets/Lib/Noise.cginc"]);
        assert!(normalize_path("Assets/../../x").is_none());
        assert_eq!(
            normalize_path("Assets\\Shaders\\..\\Lib\\./Noise.cginc").as_deref(),
            Some("Assets/Lib/Noise.cginc")
        );
    }

    #[test]
    fn test_assembly_references() {
        let asmdef = r#"{ "name": "Game", "references": ["GUID:abc", "Core"] }"#;
        assert_eq!(assembly_references(asmdef).unwrap(), vec!["GUID:abc", "Core"]);
        assert_eq!(assembly_name(asmdef).as_deref(), Some("Game"));

        let asmref = r#"{ "reference": "Core" }"#;
        assert_eq!(assembly_references(asmref).unwrap(), vec!["Core"]);
        assert!(assembly_name(asmref).is_none());

        assert!(assembly_references("not json").is_err());
    }

    #[test]
    fn test_shader_graph_references() {
        let graph = r#"{ "m_ObjectId": "1",
            "m_SerializedTexture": "{\"texture\":{\"fileID\":2,\"guid\":\"tex0001\",\"type\":3}}",
            "m_SerializedSubGraph": "{\"subgraph\":{\"guid\":\"sub0002\"}}",
            "m_FunctionSource": "inc0003"
        }"#;
        let refs = shader_graph_references(graph, true).unwrap();
        assert_eq!(refs.assets, vec!["tex0001", "sub0002"]);
        assert_eq!(refs.function_sources, vec!["inc0003"]);

        let refs = shader_graph_references(graph, false).unwrap();
        assert!(refs.function_sources.is_empty());

        assert!(shader_graph_references(r#"{ "m_SerializableNodes": [] }"#, true).is_none());
    }
}
