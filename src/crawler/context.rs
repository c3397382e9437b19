//! What a search run looks for, derived once from its candidate set.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::text_scan::{self, ASSEMBLY_EXTENSIONS, INCLUDE_TARGET_EXTENSIONS};
use crate::world::{ObjectId, ObjectKind, ObjectWorld};

#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    /// A game object is searched: follow prefab connections.
    pub search_prefab_connections: bool,
    /// A script is searched: check which components instantiate it.
    pub search_scripts: bool,
    /// Non-sealed searched scripts, matched against base types of other scripts.
    pub inheritance_targets: Vec<ObjectId>,
    pub search_texture_references: bool,
    /// Searched `#include` targets, by path.
    pub shader_includes: HashSet<String>,
    /// A shader sub-graph is searched.
    pub search_subgraphs: bool,
    /// Searched assembly definitions, by path.
    pub assembly_definitions: HashMap<String, ObjectId>,
    /// Declared assembly name -> path, for the searched assembly definitions.
    pub assembly_names: HashMap<String, String>,
    /// Asset paths of every searched object.
    pub candidate_paths: HashSet<String>,
}

impl SearchContext {
    pub fn new(world: &ObjectWorld, candidates: &HashSet<ObjectId>) -> Self {
        let mut context = Self::default();

        // Sorted so the derived lists do not depend on hash order.
        let ordered: BTreeSet<ObjectId> = candidates.iter().copied().collect();
        for id in ordered {
            let Some(record) = world.get(id) else {
                continue;
            };
            if let Some(path) = &record.asset_path {
                context.candidate_paths.insert(path.clone());
            }

            match &record.kind {
                ObjectKind::Texture | ObjectKind::Sprite => context.search_texture_references = true,
                ObjectKind::Script { sealed, .. } => {
                    context.search_scripts = true;
                    if !sealed {
                        context.inheritance_targets.push(id);
                    }
                }
                ObjectKind::GameObject { .. } => context.search_prefab_connections = true,
                _ => {}
            }

            let Some(extension) = record.extension() else {
                continue;
            };
            let Some(path) = record.asset_path.as_deref() else {
                continue;
            };
            if INCLUDE_TARGET_EXTENSIONS.contains(&extension.as_str()) {
                context.shader_includes.insert(path.to_string());
            } else if extension == "shadersubgraph" {
                context.search_subgraphs = true;
            } else if ASSEMBLY_EXTENSIONS.contains(&extension.as_str()) && !record.sub_asset {
                context.assembly_definitions.insert(path.to_string(), id);
                if let Some(name) = world.source_text(id).and_then(|t| text_scan::assembly_name(&t)) {
                    context.assembly_names.insert(name, path.to_string());
                }
            }
        }

        context
    }

    /// File extensions whose assets must be crawled even when the dependency
    /// cache says they cannot reach a candidate.
    pub fn always_searched_extensions(&self) -> HashSet<&'static str> {
        let mut extensions = HashSet::new();
        if !self.inheritance_targets.is_empty() {
            extensions.extend(["cs", "dll"]);
        }
        if !self.shader_includes.is_empty() {
            extensions.extend(["shader", "compute", "cginc", "cg", "glslinc", "hlsl"]);
        }
        if !self.assembly_definitions.is_empty() {
            extensions.extend(ASSEMBLY_EXTENSIONS);
        }
        if self.searches_shader_graphs() {
            extensions.extend(text_scan::SHADER_GRAPH_EXTENSIONS);
        }
        extensions
    }

    pub fn searches_shader_graphs(&self) -> bool {
        self.search_texture_references || self.search_subgraphs || !self.shader_includes.is_empty()
    }
}
