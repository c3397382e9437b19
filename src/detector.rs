//! Search orchestration.
//!
//! A run expands the searched objects into candidates, asks the dependency
//! cache which scenes and assets could possibly reference them, crawls those
//! and reverses each crawl into a [`ResultGroup`] of the [`SearchResult`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::cache::{AssetDatabase, DependencyCache};
use crate::config::{RefGraphConfig, SearchOptions};
use crate::crawler::{Crawler, SearchContext};
use crate::error::{RefGraphError, Result};
use crate::graph::unused::build_unused_group;
use crate::graph::result::used_objects;
use crate::graph::{reverse, GroupType, NodeArena, ResultGroup, SearchResult};
use crate::world::{ObjectId, ObjectKind, ObjectWorld, SearchTarget, DONT_DESTROY_ON_LOAD};

const ASSETS_PREFIX: &str = "Assets/";
const PROJECT_SETTINGS_PREFIX: &str = "ProjectSettings/";

pub const ASSETS_GROUP_TITLE: &str = "Project Window (Assets)";
pub const PROJECT_SETTINGS_GROUP_TITLE: &str = "Project Settings";

/// What to search for and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub objects_to_search: Vec<ObjectId>,
    pub search_in_scenes: bool,
    /// Only these scene paths, when set.
    pub scenes: Option<Vec<String>>,
    pub search_in_assets: bool,
    /// Only asset paths under these prefixes, when set.
    pub assets_subset: Option<Vec<String>>,
    /// Path prefixes that are never searched.
    pub excluded_paths: Vec<String>,
    pub search_in_project_settings: bool,
    pub search_dont_destroy_on_load: bool,
    pub calculate_unused_objects: bool,
}

impl SearchParameters {
    pub fn new(objects_to_search: Vec<ObjectId>) -> Self {
        Self {
            objects_to_search,
            search_in_scenes: true,
            scenes: None,
            search_in_assets: true,
            assets_subset: None,
            excluded_paths: Vec::new(),
            search_in_project_settings: false,
            search_dont_destroy_on_load: false,
            calculate_unused_objects: false,
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn in_assets_subset(&self, path: &str) -> bool {
        match &self.assets_subset {
            Some(prefixes) => prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())),
            None => true,
        }
    }

    fn wants_scene(&self, scene: &str) -> bool {
        match &self.scenes {
            Some(scenes) => scenes.iter().any(|s| s == scene),
            None => true,
        }
    }
}

// ─── Scopes ─────────────────────────────────────────────────────

/// One searchable domain; each becomes at most one result group.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Scene(String),
    Assets,
    ProjectSettings,
    DontDestroyOnLoad,
}

impl Scope {
    /// The scope a group was built from. `None` for the unused-objects report.
    fn of(group: &ResultGroup) -> Option<Self> {
        match group.group_type {
            GroupType::Scene => group.scene_path.clone().map(Scope::Scene),
            GroupType::Assets => Some(Scope::Assets),
            GroupType::ProjectSettings => Some(Scope::ProjectSettings),
            GroupType::DontDestroyOnLoad => Some(Scope::DontDestroyOnLoad),
            GroupType::UnusedObjects => None,
        }
    }

    fn empty_group(&self) -> ResultGroup {
        match self {
            Scope::Scene(path) => ResultGroup::new(path.clone(), GroupType::Scene, Some(path.clone())),
            Scope::Assets => ResultGroup::new(ASSETS_GROUP_TITLE, GroupType::Assets, None),
            Scope::ProjectSettings => {
                ResultGroup::new(PROJECT_SETTINGS_GROUP_TITLE, GroupType::ProjectSettings, None)
            }
            Scope::DontDestroyOnLoad => {
                ResultGroup::new(DONT_DESTROY_ON_LOAD, GroupType::DontDestroyOnLoad, None)
            }
        }
    }
}

/// Everything derived from the parameters that all scopes of a run share.
struct Plan<'a> {
    world: &'a ObjectWorld,
    parameters: &'a SearchParameters,
    targets: Vec<SearchTarget>,
    candidates: HashSet<ObjectId>,
    context: SearchContext,
    always_searched: HashSet<&'static str>,
}

impl<'a> Plan<'a> {
    fn new(world: &'a ObjectWorld, parameters: &'a SearchParameters) -> Result<Self> {
        let targets = world.expand_search_targets(&parameters.objects_to_search)?;
        let candidates: HashSet<ObjectId> = targets.iter().flat_map(|t| t.objects()).collect();
        if candidates.is_empty() {
            return Err(RefGraphError::InvalidTarget("nothing to search for".into()));
        }
        let context = SearchContext::new(world, &candidates);
        let always_searched = context.always_searched_extensions();

        Ok(Self {
            world,
            parameters,
            targets,
            candidates,
            context,
            always_searched,
        })
    }

    fn scopes(&self) -> Vec<Scope> {
        let mut scopes = Vec::new();
        if self.parameters.search_in_scenes {
            scopes.extend(
                self.world
                    .scene_paths()
                    .into_iter()
                    .filter(|scene| self.parameters.wants_scene(scene))
                    .map(|scene| Scope::Scene(scene.to_string())),
            );
        }
        if self.parameters.search_in_assets {
            scopes.push(Scope::Assets);
        }
        if self.parameters.search_in_project_settings {
            scopes.push(Scope::ProjectSettings);
        }
        if self.parameters.search_dont_destroy_on_load {
            scopes.push(Scope::DontDestroyOnLoad);
        }
        scopes
    }

    fn scene_has_candidate(&self, scene: &str) -> bool {
        self.world
            .scene_members(scene)
            .iter()
            .any(|id| self.candidates.contains(id))
    }
}

// ─── Detector ───────────────────────────────────────────────────

pub struct UsageDetector {
    cache: DependencyCache,
    options: SearchOptions,
}

impl UsageDetector {
    pub fn new(cache: DependencyCache, options: SearchOptions) -> Self {
        Self { cache, options }
    }

    pub fn from_config(config: &RefGraphConfig, state_dir: &Path) -> Self {
        let cache = DependencyCache::new(config.resolve_cache_path(state_dir))
            .with_progress_interval(config.scan_progress_interval);
        Self::new(cache, config.search.clone())
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DependencyCache {
        &mut self.cache
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search every requested scope for references to `parameters.objects_to_search`.
    pub fn run(
        &mut self,
        world: &ObjectWorld,
        db: &dyn AssetDatabase,
        parameters: SearchParameters,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let plan = Plan::new(world, &parameters)?;
        self.cache.ensure_loaded(db);
        self.cache.begin_search();

        let mut arena = NodeArena::new();
        let mut groups = Vec::new();
        for scope in plan.scopes() {
            if let Some(group) = self.search_scope(&plan, db, &scope, true, &mut arena) {
                groups.push(group);
            }
        }
        let used = used_objects(&arena, &groups);
        if parameters.calculate_unused_objects {
            groups.extend(build_unused_group(world, &plan.targets, &used, &mut arena));
        }
        let candidates = plan.candidates.len();

        self.cache.save_or_log();

        let mut result = SearchResult::new(parameters);
        result.arena = arena;
        result.groups = groups;
        result.used_objects = used;
        result.completed = true;

        info!(
            candidates,
            groups = result.groups.len(),
            nodes = result.node_count(),
            used = result.used_objects.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(result)
    }

    /// Search the scope of `result.groups()[index]` again, lazily deferred
    /// scenes included, and swap the new group in.
    ///
    /// A group that comes back empty is removed. The unused-objects report,
    /// if the result has one, is rebuilt afterwards.
    pub fn refresh_group(
        &mut self,
        world: &ObjectWorld,
        db: &dyn AssetDatabase,
        result: &mut SearchResult,
        index: usize,
    ) -> Result<()> {
        let group = result
            .groups
            .get(index)
            .ok_or_else(|| RefGraphError::InvalidResult(format!("no group at index {index}")))?;
        let scope = Scope::of(group);

        let parameters = result.parameters.clone();
        let plan = Plan::new(world, &parameters)?;

        if let Some(scope) = scope {
            self.cache.ensure_loaded(db);
            self.cache.begin_search();

            let mut arena = NodeArena::new();
            match self.search_scope(&plan, db, &scope, false, &mut arena) {
                Some(group) => result.replace_group(index, &arena, group),
                None => {
                    result.groups.remove(index);
                }
            }
            result.refresh_used_objects();
            self.cache.save_or_log();
            debug!(scope = ?scope, "refreshed result group");
        }

        let has_report = result
            .groups
            .iter()
            .any(|g| g.group_type == GroupType::UnusedObjects);
        if parameters.calculate_unused_objects || has_report {
            rebuild_unused_group(result, &plan);
        }
        result.compact();
        Ok(())
    }

    /// Crawl and reverse one scope. `None` when nothing in it references a candidate.
    fn search_scope(
        &mut self,
        plan: &Plan<'_>,
        db: &dyn AssetDatabase,
        scope: &Scope,
        allow_lazy: bool,
        arena: &mut NodeArena,
    ) -> Option<ResultGroup> {
        let world = plan.world;
        let mut group = scope.empty_group();

        let roots = match scope {
            Scope::Scene(scene) => {
                let has_candidate = plan.scene_has_candidate(scene);
                if !has_candidate
                    && !self
                        .cache
                        .references_any(scene, &plan.context.candidate_paths, db)
                {
                    debug!(scene = %scene, "scene cannot reference the searched objects, skipped");
                    return None;
                }
                if allow_lazy && self.options.lazy_scene_search && !has_candidate {
                    debug!(scene = %scene, "scene search deferred");
                    group.pending_search = true;
                    return Some(group);
                }
                world.scene_objects(scene)
            }
            Scope::Assets => self.path_roots(plan, db, ASSETS_PREFIX, true),
            Scope::ProjectSettings => self.path_roots(plan, db, PROJECT_SETTINGS_PREFIX, false),
            Scope::DontDestroyOnLoad => world.scene_objects(DONT_DESTROY_ON_LOAD),
        };
        if roots.is_empty() {
            return None;
        }

        let forward =
            Crawler::new(world, &plan.candidates, &plan.context, &self.options).crawl(&roots);
        let group = reverse(&forward, &plan.candidates, group, arena, world);

        debug!(
            group = %group.title,
            crawled = roots.len(),
            found = group.roots.len(),
            "searched scope"
        );
        (!group.is_empty()).then_some(group)
    }

    /// Objects stored at every path under `prefix` that may reference a candidate.
    fn path_roots(
        &mut self,
        plan: &Plan<'_>,
        db: &dyn AssetDatabase,
        prefix: &str,
        apply_subset: bool,
    ) -> Vec<ObjectId> {
        let world = plan.world;
        let mut roots = Vec::new();

        for path in world.asset_paths() {
            if !path.starts_with(prefix) || plan.parameters.is_excluded(path) {
                continue;
            }
            if apply_subset && !plan.parameters.in_assets_subset(path) {
                continue;
            }
            let Some(main) = world.main_asset_at(path).and_then(|id| world.get(id)) else {
                continue;
            };
            if matches!(main.kind, ObjectKind::Folder | ObjectKind::SceneAsset) {
                continue;
            }

            let always = main
                .extension()
                .is_some_and(|ext| plan.always_searched.contains(ext.as_str()));
            if always
                || self
                    .cache
                    .references_any(path, &plan.context.candidate_paths, db)
            {
                roots.extend_from_slice(world.objects_at(path));
            }
        }

        roots
    }
}

fn rebuild_unused_group(result: &mut SearchResult, plan: &Plan<'_>) {
    let existing = result
        .groups
        .iter()
        .position(|g| g.group_type == GroupType::UnusedObjects);
    let rebuilt = build_unused_group(plan.world, &plan.targets, &result.used_objects, &mut result.arena);

    match (existing, rebuilt) {
        (Some(index), Some(group)) => result.groups[index] = group,
        (Some(index), None) => {
            result.groups.remove(index);
        }
        (None, Some(group)) => result.groups.push(group),
        (None, None) => {}
    }
}
