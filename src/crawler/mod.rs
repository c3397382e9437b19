//! Graph crawler.
//!
//! Starting from a set of root objects, visits every object reachable through
//! kind-specific slots and generic members, and records each reference as a
//! forward link `referencing -> referenced`. Every object gets one node no
//! matter how many paths reach it; an object already on the current visit
//! path is not entered again.
//!
//! Dispatch is by [`ObjectKind`], except for a few text-like asset formats
//! whose references only exist in their source text; those are recognised by
//! file extension (see [`text_scan`]).

pub mod context;
pub mod fields;
pub mod text_scan;

pub use context::SearchContext;

use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::config::SearchOptions;
use crate::graph::{ForwardGraph, NodeArena, NodeId};
use crate::world::{
    ControllerLayer, DefaultReference, ObjectId, ObjectKind, ObjectRecord, ObjectWorld,
    ShaderProperty, TextureSlot,
};
use text_scan::{ASSEMBLY_EXTENSIONS, INCLUDE_SOURCE_EXTENSIONS, SHADER_GRAPH_EXTENSIONS};

const ASSEMBLY_GUID_PREFIX: &str = "GUID:";

/// Crawl `roots` looking for `candidates`.
pub fn search(
    world: &ObjectWorld,
    roots: &[ObjectId],
    candidates: &HashSet<ObjectId>,
    options: &SearchOptions,
) -> ForwardGraph {
    let context = SearchContext::new(world, candidates);
    Crawler::new(world, candidates, &context, options).crawl(roots)
}

pub struct Crawler<'a> {
    world: &'a ObjectWorld,
    candidates: &'a HashSet<ObjectId>,
    context: &'a SearchContext,
    options: &'a SearchOptions,
    arena: NodeArena,
    nodes: HashMap<ObjectId, NodeId>,
    /// Finished visits. `None` means the object leads nowhere.
    searched: HashMap<ObjectId, Option<NodeId>>,
    call_stack: Vec<ObjectId>,
    on_stack: HashSet<ObjectId>,
    /// Unique non-empty binding paths per animation clip.
    clip_paths: HashMap<ObjectId, Vec<String>>,
}

impl<'a> Crawler<'a> {
    pub fn new(
        world: &'a ObjectWorld,
        candidates: &'a HashSet<ObjectId>,
        context: &'a SearchContext,
        options: &'a SearchOptions,
    ) -> Self {
        Self {
            world,
            candidates,
            context,
            options,
            arena: NodeArena::new(),
            nodes: HashMap::new(),
            searched: HashMap::new(),
            call_stack: Vec::new(),
            on_stack: HashSet::new(),
            clip_paths: HashMap::new(),
        }
    }

    pub fn crawl(mut self, roots: &[ObjectId]) -> ForwardGraph {
        let mut root_nodes = Vec::new();
        let mut seen = HashSet::new();
        for &root in roots {
            if let Some(node) = self.search(root) {
                if seen.insert(node) {
                    root_nodes.push(node);
                }
            }
        }

        debug!(
            roots = roots.len(),
            nodes = self.arena.len(),
            "crawl finished"
        );
        ForwardGraph {
            arena: self.arena,
            roots: root_nodes,
        }
    }

    // ─── Core ───────────────────────────────────────────────────

    fn search(&mut self, id: ObjectId) -> Option<NodeId> {
        if !self.world.contains(id) {
            return None;
        }
        if let Some(&memo) = self.searched.get(&id) {
            return memo;
        }

        let is_candidate = self.candidates.contains(&id);
        if is_candidate && !self.options.search_candidates_themselves {
            let node = self.node_for(id);
            self.searched.insert(id, Some(node));
            return Some(node);
        }

        if self.on_stack.contains(&id) {
            return is_candidate.then(|| self.node_for(id));
        }

        self.call_stack.push(id);
        self.on_stack.insert(id);
        let mut result = self.visit(id);
        self.call_stack.pop();
        self.on_stack.remove(&id);

        if result.is_none() && is_candidate {
            result = Some(self.node_for(id));
        }
        self.searched.insert(id, result);
        result
    }

    fn node_for(&mut self, id: ObjectId) -> NodeId {
        if let Some(&node) = self.nodes.get(&id) {
            return node;
        }
        let node = self.arena.alloc(Some(id));
        self.nodes.insert(id, node);
        node
    }

    fn link(&mut self, from: NodeId, to: Option<NodeId>, description: Option<&str>) {
        if let Some(to) = to {
            self.arena.add_link(from, to, description, false);
        }
    }

    fn link_candidate(&mut self, from: NodeId, candidate: ObjectId, description: Option<&str>) {
        let to = self.node_for(candidate);
        self.arena.add_link(from, to, description, false);
    }

    fn call_path(&self) -> String {
        self.call_stack
            .iter()
            .map(|&id| self.world.label(id))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn visit(&mut self, id: ObjectId) -> Option<NodeId> {
        let world = self.world;
        let record = world.get(id)?;

        if let Some(extension) = record.extension().filter(|_| !record.sub_asset) {
            let extension = extension.as_str();
            if INCLUDE_SOURCE_EXTENSIONS.contains(&extension) {
                return self.visit_include_source(record);
            }
            if ASSEMBLY_EXTENSIONS.contains(&extension) {
                return self.visit_assembly_definition(record);
            }
            if SHADER_GRAPH_EXTENSIONS.contains(&extension) {
                return self.visit_shader_graph(record);
            }
        }

        match &record.kind {
            ObjectKind::GameObject {
                components,
                prefab_source,
                ..
            } => Some(self.visit_game_object(id, components, *prefab_source)),
            ObjectKind::Transform { .. } => None,
            ObjectKind::Component { .. }
            | ObjectKind::Animation { .. }
            | ObjectKind::Animator { .. } => Some(self.visit_component(record)),
            ObjectKind::Material { shader, textures } => {
                Some(self.visit_material(record, *shader, textures))
            }
            ObjectKind::Shader { properties } => Some(self.visit_shader(record, properties)),
            ObjectKind::Script {
                engine_object,
                defaults,
                ..
            } => {
                if !engine_object {
                    return None;
                }
                Some(self.visit_script(id, defaults))
            }
            ObjectKind::AnimatorController { layers } => {
                Some(self.visit_animator_controller(id, layers))
            }
            ObjectKind::AnimatorOverrideController { parent, .. } => {
                let node = self.node_for(id);
                if let Some(parent) = parent.filter(|p| self.candidates.contains(p)) {
                    self.link_candidate(node, parent, None);
                }
                for clip in world.controller_clips(id) {
                    let target = self.search(clip);
                    self.link(node, target, None);
                }
                Some(node)
            }
            ObjectKind::AnimatorStateMachine {
                child_machines,
                states,
                behaviours,
            } => {
                let node = self.node_for(id);
                for &machine in child_machines {
                    let target = self.search(machine);
                    self.link(node, target, Some("Child State Machine"));
                }
                for &state in states {
                    let target = self.search(state);
                    self.link(node, target, None);
                }
                self.link_behaviour_scripts(node, behaviours);
                Some(node)
            }
            ObjectKind::AnimatorState { motion, behaviours } => {
                let node = self.node_for(id);
                if let Some(motion) = *motion {
                    let target = self.search(motion);
                    self.link(node, target, Some("Motion"));
                }
                self.link_behaviour_scripts(node, behaviours);
                Some(node)
            }
            // Transitions only repeat what their state machine already shows.
            ObjectKind::AnimatorStateTransition => Some(self.node_for(id)),
            ObjectKind::BlendTree { motions } => {
                let node = self.node_for(id);
                for &motion in motions {
                    let target = self.search(motion);
                    self.link(node, target, Some("Motion"));
                }
                Some(node)
            }
            ObjectKind::AnimationClip { curves, events } => {
                let node = self.node_for(id);
                for curve in curves {
                    for keyframe in &curve.keyframes {
                        if let Some(value) = keyframe.value {
                            let target = self.search(value);
                            self.link(node, target, Some(format!("Keyframe: {}", keyframe.time).as_str()));
                        }
                    }
                }
                for event in events {
                    if let Some(object) = event.object {
                        let target = self.search(object);
                        self.link(node, target, Some(format!("AnimationEvent: {}", event.time).as_str()));
                    }
                }
                Some(node)
            }
            ObjectKind::SpriteAtlas {
                master_atlas,
                packables,
            } => {
                let node = self.node_for(id);
                if let Some(master) = master_atlas.filter(|m| self.candidates.contains(m)) {
                    let target = self.search(master);
                    self.link(node, target, Some("Master Atlas"));
                }
                let mut packed = HashSet::new();
                for &packable in packables {
                    self.visit_packable(node, packable, &mut packed);
                }
                Some(node)
            }
            ObjectKind::TerrainData
            | ObjectKind::Texture
            | ObjectKind::Sprite
            | ObjectKind::SceneAsset
            | ObjectKind::Folder
            | ObjectKind::TextAsset
            | ObjectKind::Generic { .. } => {
                let node = self.node_for(id);
                self.search_fields(node, record);
                Some(node)
            }
        }
    }

    // ─── Kind Visitors ──────────────────────────────────────────

    fn visit_game_object(
        &mut self,
        id: ObjectId,
        components: &[ObjectId],
        prefab_source: Option<ObjectId>,
    ) -> NodeId {
        let world = self.world;
        let node = self.node_for(id);

        if self.context.search_prefab_connections {
            let mut seen = HashSet::from([id]);
            let mut source = prefab_source;
            while let Some(prefab) = source {
                if !seen.insert(prefab) {
                    break;
                }
                if self.candidates.contains(&prefab) && world.is_main_asset(prefab) {
                    self.link_candidate(node, prefab, Some("Prefab object"));
                }
                source = match world.get(prefab).map(|r| &r.kind) {
                    Some(ObjectKind::GameObject { prefab_source, .. }) => *prefab_source,
                    _ => None,
                };
            }
        }

        for &component in components {
            if let Some(target) = self.search(component) {
                self.arena.add_link(node, target, None, true);
            }
        }

        node
    }

    fn visit_component(&mut self, record: &ObjectRecord) -> NodeId {
        let world = self.world;
        let node = self.node_for(record.id);

        match &record.kind {
            ObjectKind::Component {
                script: Some(script),
                ..
            } => {
                if self.context.search_scripts && self.candidates.contains(script) {
                    self.link_candidate(node, *script, None);
                }
            }
            ObjectKind::Animation { owner, clips } => {
                for &clip in clips {
                    let target = self.search(clip);
                    self.link(node, target, None);
                }
                self.search_animated_objects(node, *owner, clips);
            }
            ObjectKind::Animator { owner, controller } => {
                let clips = match *controller {
                    Some(controller) => {
                        let target = self.search(controller);
                        self.link(node, target, None);
                        world.controller_clips(controller)
                    }
                    None => Vec::new(),
                };
                self.search_animated_objects(node, *owner, &clips);
            }
            _ => {}
        }

        self.search_fields(node, record);
        node
    }

    /// Link the objects below `owner` that `clips` animate.
    fn search_animated_objects(&mut self, node: NodeId, owner: ObjectId, clips: &[ObjectId]) {
        let world = self.world;
        let mut seen = HashSet::new();
        for &clip in clips {
            if !seen.insert(clip) {
                continue;
            }
            let Some(record) = world.get(clip) else {
                continue;
            };
            let description = format!("Animated via clip: {}", record.name);
            for path in self.binding_paths(record) {
                if let Some(animated) = world.find_by_hierarchy_path(owner, &path) {
                    let target = self.search(animated);
                    self.link(node, target, Some(description.as_str()));
                }
            }
        }
    }

    fn binding_paths(&mut self, clip: &ObjectRecord) -> Vec<String> {
        if let Some(paths) = self.clip_paths.get(&clip.id) {
            return paths.clone();
        }
        let mut paths: Vec<String> = Vec::new();
        if let ObjectKind::AnimationClip { curves, .. } = &clip.kind {
            for curve in curves {
                if !curve.path.is_empty() && !paths.contains(&curve.path) {
                    paths.push(curve.path.clone());
                }
            }
        }
        self.clip_paths.insert(clip.id, paths.clone());
        paths
    }

    fn visit_material(
        &mut self,
        record: &ObjectRecord,
        shader: Option<ObjectId>,
        textures: &[TextureSlot],
    ) -> NodeId {
        let world = self.world;
        let node = self.node_for(record.id);
        self.search_fields(node, record);

        let declared: HashSet<&str> = match shader.and_then(|s| world.get(s)).map(|r| &r.kind) {
            Some(ObjectKind::Shader { properties }) => {
                properties.iter().map(|p| p.name.as_str()).collect()
            }
            _ => HashSet::new(),
        };
        if let Some(shader) = shader {
            let target = self.search(shader);
            self.link(node, target, Some("Shader"));
        }

        // Slots the shader no longer declares come after the live ones.
        let mut unused = Vec::new();
        for slot in textures {
            let Some(texture) = slot.texture else {
                continue;
            };
            if declared.contains(slot.property.as_str()) {
                let target = self.search(texture);
                self.link(node, target, Some(format!("Property: {}", slot.property).as_str()));
            } else if self.options.search_unused_material_properties {
                unused.push((texture, format!("Property (UNUSED): {}", slot.property)));
            }
        }
        for (texture, description) in unused {
            let target = self.search(texture);
            self.link(node, target, Some(description.as_str()));
        }

        node
    }

    fn visit_shader(&mut self, record: &ObjectRecord, properties: &[ShaderProperty]) -> NodeId {
        let node = self.node_for(record.id);

        if self.context.search_texture_references {
            for property in properties {
                if let Some(texture) = property.default_texture.filter(|t| self.candidates.contains(t)) {
                    let description = format!("Default Texture: {}", property.name);
                    self.link_candidate(node, texture, Some(description.as_str()));
                }
            }
        }
        if !self.context.shader_includes.is_empty() {
            self.scan_includes(node, record);
        }

        node
    }

    fn visit_script(&mut self, id: ObjectId, defaults: &[DefaultReference]) -> NodeId {
        let world = self.world;
        let context = self.context;
        let node = self.node_for(id);

        if !context.inheritance_targets.is_empty() {
            let ancestors = world.script_ancestors(id);
            for &target in context.inheritance_targets.iter().rev() {
                if target == id || !ancestors.contains(&target) {
                    continue;
                }
                let is_interface = matches!(
                    world.get(target).map(|r| &r.kind),
                    Some(ObjectKind::Script { interface: true, .. })
                );
                let description = if is_interface {
                    "Implements interface"
                } else {
                    "Extends class"
                };
                self.link_candidate(node, target, Some(description));
            }
        }

        for default in defaults {
            if let Some(value) = default.value.filter(|v| self.candidates.contains(v)) {
                let description = format!("Default variable value: {}", default.name);
                self.link_candidate(node, value, Some(description.as_str()));
            }
        }

        node
    }

    fn visit_animator_controller(&mut self, id: ObjectId, layers: &[ControllerLayer]) -> NodeId {
        let node = self.node_for(id);
        for layer in layers {
            if let Some(mask) = layer.avatar_mask.filter(|m| self.candidates.contains(m)) {
                let description = format!("{} Mask", layer.name);
                self.link_candidate(node, mask, Some(description.as_str()));
            }
            if let Some(machine) = layer.state_machine {
                let target = self.search(machine);
                self.link(node, target, None);
            }
        }
        node
    }

    fn link_behaviour_scripts(&mut self, node: NodeId, behaviours: &[ObjectId]) {
        if !self.context.search_scripts {
            return;
        }
        for &script in behaviours {
            if self.candidates.contains(&script) {
                self.link_candidate(node, script, None);
            }
        }
    }

    /// One packed entry of a sprite atlas. Textures that are not searched
    /// themselves stand for their sprites; folders for the textures inside.
    fn visit_packable(&mut self, node: NodeId, packable: ObjectId, packed: &mut HashSet<ObjectId>) {
        let world = self.world;
        let Some(record) = world.get(packable) else {
            return;
        };
        if !packed.insert(packable) {
            return;
        }

        let target = self.search(packable);
        self.link(node, target, Some("Packed Texture"));

        match &record.kind {
            ObjectKind::Texture
                if world.is_main_asset(packable) && !self.candidates.contains(&packable) =>
            {
                for sprite in world.sub_objects(packable) {
                    if matches!(world.get(sprite).map(|r| &r.kind), Some(ObjectKind::Sprite)) {
                        let target = self.search(sprite);
                        self.link(node, target, Some("Packed Texture"));
                    }
                }
            }
            ObjectKind::Folder => {
                let folder = record.asset_path.as_deref().unwrap_or_default();
                for asset in world.assets_under(folder) {
                    if matches!(world.get(asset).map(|r| &r.kind), Some(ObjectKind::Texture)) {
                        self.visit_packable(node, asset, packed);
                    }
                }
            }
            _ => {}
        }
    }

    // ─── Generic Members ────────────────────────────────────────

    fn search_fields(&mut self, node: NodeId, record: &ObjectRecord) {
        let world = self.world;
        let scan = fields::scan_fields(record, self.options);

        for fault in &scan.faults {
            if fault.fault.is_benign() {
                trace!(object = %record.id, member = %fault.member, fault = %fault.fault, "skipped unreadable member");
            } else {
                warn!(
                    object_type = record.kind.type_name(),
                    member = %fault.member,
                    call_path = %self.call_path(),
                    error = %fault.fault,
                    "unexpected error while reading member, skipped"
                );
            }
        }

        for reference in scan.references {
            let target = self.search(world.preferably_game_object(reference.target));
            self.link(node, target, Some(reference.description.as_str()));
        }
    }

    // ─── Extension Visitors ─────────────────────────────────────

    fn visit_include_source(&mut self, record: &ObjectRecord) -> Option<NodeId> {
        if self.context.shader_includes.is_empty() {
            return None;
        }
        let node = self.node_for(record.id);
        self.scan_includes(node, record);
        Some(node)
    }

    fn scan_includes(&mut self, node: NodeId, record: &ObjectRecord) {
        let world = self.world;
        let (Some(path), Some(source)) = (record.asset_path.as_deref(), world.source_text(record.id))
        else {
            debug!(object = %record.id, "no source text to scan for includes");
            return;
        };

        for include in text_scan::include_references(&source, path, &self.context.shader_includes) {
            if let Some(main) = world.main_asset_at(&include).filter(|m| self.candidates.contains(m)) {
                self.link_candidate(node, main, Some("Used with #include"));
            }
        }
    }

    fn visit_assembly_definition(&mut self, record: &ObjectRecord) -> Option<NodeId> {
        let world = self.world;
        let context = self.context;
        if context.assembly_definitions.is_empty() {
            return None;
        }
        let node = self.node_for(record.id);

        let Some(text) = world.source_text(record.id) else {
            debug!(object = %record.id, "assembly definition has no source text");
            return Some(node);
        };
        let references = match text_scan::assembly_references(&text) {
            Ok(references) => references,
            Err(error) => {
                warn!(path = record.asset_path.as_deref().unwrap_or_default(), %error, "unreadable assembly definition");
                return Some(node);
            }
        };

        for reference in references {
            let path = match reference.strip_prefix(ASSEMBLY_GUID_PREFIX) {
                Some(guid) => world.path_for_guid(guid),
                None => context.assembly_names.get(&reference).map(String::as_str),
            };
            if let Some(&target) = path.and_then(|p| context.assembly_definitions.get(p)) {
                self.link_candidate(node, target, Some("Referenced Assembly"));
            }
        }

        Some(node)
    }

    fn visit_shader_graph(&mut self, record: &ObjectRecord) -> Option<NodeId> {
        let world = self.world;
        let context = self.context;
        if !context.searches_shader_graphs() {
            return None;
        }
        let node = self.node_for(record.id);

        let Some(text) = world.source_text(record.id) else {
            debug!(object = %record.id, "shader graph has no source text");
            return Some(node);
        };
        let with_functions = !context.shader_includes.is_empty();
        let Some(references) = text_scan::shader_graph_references(&text, with_functions) else {
            debug!(object = %record.id, "legacy shader graph format, not scanned");
            return Some(node);
        };

        let found = [
            (references.assets, "Used in graph"),
            (references.function_sources, "Used in node: Custom Function"),
        ];
        for (guids, description) in found {
            for guid in guids {
                let Some(path) = world
                    .path_for_guid(&guid)
                    .filter(|p| context.candidate_paths.contains(*p))
                else {
                    continue;
                };
                if let Some(main) = world.main_asset_at(path).filter(|m| self.candidates.contains(m)) {
                    self.link_candidate(node, main, Some(description));
                }
            }
        }

        Some(node)
    }
}
