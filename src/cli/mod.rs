//! CLI module for refgraph.
//!
//! Commands:
//! - Cache: scan, deps, clear-cache
//! - Search: search, show

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::path::PathBuf;

use crate::cache::{LoadOutcome, ScanControl};
use crate::config::{RefGraphConfig, STATE_DIR};
use crate::detector::{SearchParameters, UsageDetector};
use crate::graph::SearchResult;
use crate::world::{ObjectWorld, ProjectDatabase};

const CONFIG_FILE: &str = "config.toml";
const MANIFEST_FILE: &str = "objects.json";

#[derive(Parser, Debug)]
#[command(name = "refgraph")]
#[command(about = "Find what references your assets")]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Object manifest (default: ROOT/.refgraph/objects.json)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    // ─── Cache ────────────────────────────────────────────────────
    /// Load the dependency cache, scanning the project if there is none
    Scan,

    /// Show the cached direct dependencies of an asset
    Deps {
        /// Project-relative asset path
        asset: String,
    },

    /// Delete the dependency cache
    ClearCache,

    // ─── Search ───────────────────────────────────────────────────
    /// Find everything that references the given objects
    Search {
        /// Asset path, `path#SubName`, or unique object name
        #[arg(required = true)]
        targets: Vec<String>,

        /// Skip scenes
        #[arg(long)]
        no_scenes: bool,

        /// Skip project assets
        #[arg(long)]
        no_assets: bool,

        /// Also search ProjectSettings/
        #[arg(long)]
        project_settings: bool,

        /// Also search the DontDestroyOnLoad scene
        #[arg(long)]
        dont_destroy_on_load: bool,

        /// Report searched objects nothing references
        #[arg(long)]
        unused: bool,

        /// Save the result to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print a saved search result
    Show {
        /// Result file written by `search --out`
        file: PathBuf,
    },
}

/// Paths and settings of the project a command runs against.
struct Project {
    root: PathBuf,
    state_dir: PathBuf,
    manifest: PathBuf,
    config: RefGraphConfig,
}

impl Project {
    fn open(root: PathBuf, manifest: Option<PathBuf>) -> Self {
        let root = root.canonicalize().unwrap_or(root);
        let state_dir = root.join(STATE_DIR);
        let manifest = manifest.unwrap_or_else(|| state_dir.join(MANIFEST_FILE));
        let config = RefGraphConfig::load(&state_dir.join(CONFIG_FILE));
        Self {
            root,
            state_dir,
            manifest,
            config,
        }
    }

    fn load_world(&self) -> Result<ObjectWorld> {
        ObjectWorld::load(&self.manifest, Some(&self.root))
            .with_context(|| format!("failed to load manifest {}", self.manifest.display()))
    }

    fn detector(&self) -> UsageDetector {
        UsageDetector::from_config(&self.config, &self.state_dir)
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let project = Project::open(cli.root, cli.manifest);

    match cli.command {
        Commands::Scan => {
            let world = project.load_world()?;
            let db = ProjectDatabase::new(&world);
            let mut detector = project.detector();

            let outcome = detector.cache_mut().load_or_generate(&db, &mut |done, total| {
                eprint!("\rScanning assets {done}/{total}");
                let _ = std::io::stderr().flush();
                ScanControl::Continue
            });
            match outcome {
                LoadOutcome::Generated { entries } => {
                    eprintln!();
                    println!("Scanned {entries} assets");
                }
                LoadOutcome::Loaded { entries } => println!("Loaded {entries} cache entries"),
                LoadOutcome::AlreadyLoaded => println!("Cache already loaded"),
                LoadOutcome::Cancelled { scanned, total } => {
                    eprintln!();
                    println!("Scan cancelled after {scanned} of {total} assets");
                }
            }
            println!("Cache: {}", detector.cache().path().display());
        }

        Commands::Deps { asset } => {
            let world = project.load_world()?;
            let db = ProjectDatabase::new(&world);
            let mut detector = project.detector();
            let cache = detector.cache_mut();
            cache.ensure_loaded(&db);
            cache.begin_search();

            let (dependencies, sizes) = cache.get_or_refresh(&asset, &db);
            if dependencies.is_empty() {
                println!("{asset} has no dependencies");
            } else {
                println!("{asset}:");
                for (dependency, size) in dependencies.iter().zip(sizes) {
                    println!("  {dependency} ({size} bytes)");
                }
            }
            cache.save_or_log();
        }

        Commands::ClearCache => {
            let mut detector = project.detector();
            detector.cache_mut().clear()?;
            println!("Removed {}", detector.cache().path().display());
        }

        Commands::Search {
            targets,
            no_scenes,
            no_assets,
            project_settings,
            dont_destroy_on_load,
            unused,
            out,
        } => {
            let world = project.load_world()?;
            let db = ProjectDatabase::new(&world);
            let mut detector = project.detector();

            let objects = targets
                .iter()
                .map(|target| world.resolve_target(target))
                .collect::<crate::error::Result<Vec<_>>>()?;
            let mut parameters = SearchParameters::new(objects);
            parameters.search_in_scenes = !no_scenes;
            parameters.search_in_assets = !no_assets;
            parameters.search_in_project_settings = project_settings;
            parameters.search_dont_destroy_on_load = dont_destroy_on_load;
            parameters.calculate_unused_objects = unused;

            let result = detector.run(&world, &db, parameters)?;
            print_result(&result, detector.options().hide_duplicate_rows);

            if let Some(out) = out {
                result
                    .save(&out)
                    .with_context(|| format!("failed to save result to {}", out.display()))?;
                eprintln!("Saved result to {}", out.display());
            }
        }

        Commands::Show { file } => {
            let result = SearchResult::load(&file)
                .with_context(|| format!("failed to read result {}", file.display()))?;
            print_result(&result, project.config.search.hide_duplicate_rows);
        }
    }

    Ok(())
}

fn print_result(result: &SearchResult, hide_duplicate_rows: bool) {
    if result.groups().is_empty() {
        println!("No references found");
        return;
    }
    print!("{}", result.render_tree(hide_duplicate_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{asset, game_object, scene_object};
    use crate::world::{Field, FieldValue, Manifest, ObjectId, ObjectKind, ObjectRecord};
    use std::path::Path;

    fn write_project(root: &Path) {
        let manifest = Manifest {
            objects: vec![
                asset(1, "Icon", ObjectKind::Texture, "Assets/Icon.png"),
                scene_object(2, "Player", game_object(&[3], &[]), "Assets/Main.unity"),
                ObjectRecord {
                    fields: vec![Field::new("icon", FieldValue::Reference(ObjectId(1)))],
                    ..scene_object(
                        3,
                        "Holder",
                        ObjectKind::Component {
                            owner: ObjectId(2),
                            script: None,
                            class: Some("Holder".into()),
                        },
                        "Assets/Main.unity",
                    )
                },
            ],
        };
        std::fs::create_dir_all(root.join(STATE_DIR)).unwrap();
        std::fs::write(
            root.join(STATE_DIR).join(MANIFEST_FILE),
            serde_json::to_string(&manifest).unwrap(),
        )
        .unwrap();
    }

    fn cli(root: &Path, args: &[&str]) -> Cli {
        let root = root.to_string_lossy().into_owned();
        let mut argv = vec!["refgraph", "-r", root.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from([
            "refgraph",
            "search",
            "Assets/Icon.png",
            "Icon#Sub",
            "--no-scenes",
            "--unused",
            "--out",
            "result.bin",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("."));
        match cli.command {
            Commands::Search {
                targets,
                no_scenes,
                no_assets,
                unused,
                out,
                ..
            } => {
                assert_eq!(targets, vec!["Assets/Icon.png", "Icon#Sub"]);
                assert!(no_scenes && unused && !no_assets);
                assert_eq!(out, Some(PathBuf::from("result.bin")));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["refgraph", "search"]).is_err(), "targets are required");
    }

    #[test]
    fn test_search_save_and_show() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        let out = dir.path().join("result.bin");
        let out_arg = out.to_string_lossy().into_owned();

        run(cli(dir.path(), &["search", "Assets/Icon.png", "--out", out_arg.as_str()])).unwrap();
        assert!(out.exists());
        assert!(dir.path().join(STATE_DIR).join("dependency.cache").exists());

        let saved = SearchResult::load(&out).unwrap();
        assert_eq!(saved.groups().len(), 1);
        assert!(saved.render_tree(true).contains("[Variable: icon]"));

        run(cli(dir.path(), &["show", out_arg.as_str()])).unwrap();
        run(cli(dir.path(), &["clear-cache"])).unwrap();
        assert!(!dir.path().join(STATE_DIR).join("dependency.cache").exists());
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path());
        assert!(run(cli(dir.path(), &["search", "Assets/Nope.png"])).is_err());
        assert!(run(cli(dir.path(), &["-m", "missing.json", "scan"])).is_err());
    }
}
