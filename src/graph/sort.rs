//! Presentation order of nodes.
//!
//! Scene objects come first in hierarchy order, then assets by path (main
//! asset before its sub-assets, sub-assets by name), then everything else.

use std::cmp::Ordering;

use crate::world::{ObjectId, ObjectWorld};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Scene { scene: String, hierarchy: Vec<u32> },
    Asset { path: String, is_main: bool, name: String },
    Other,
}

impl SortKey {
    pub fn of(object: Option<ObjectId>, world: &ObjectWorld) -> Self {
        let Some(record) = object.and_then(|id| world.get(id)) else {
            return SortKey::Other;
        };

        if let Some(scene) = &record.scene {
            return SortKey::Scene {
                scene: scene.clone(),
                hierarchy: world.hierarchy_path(record.id),
            };
        }

        // Prefab components sort with the game object they are attached to.
        let asset = world
            .owner_of(record.id)
            .and_then(|owner| world.get(owner))
            .filter(|owner| owner.is_asset())
            .unwrap_or(record);
        match &asset.asset_path {
            Some(path) => SortKey::Asset {
                path: path.clone(),
                is_main: !asset.sub_asset,
                name: asset.name.clone(),
            },
            None => SortKey::Other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Scene { .. } => 0,
            SortKey::Asset { .. } => 1,
            SortKey::Other => 2,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                SortKey::Scene { scene: a, hierarchy: ha },
                SortKey::Scene { scene: b, hierarchy: hb },
            ) => a.cmp(b).then_with(|| ha.cmp(hb)),
            (
                SortKey::Asset { path: pa, is_main: ma, name: na },
                SortKey::Asset { path: pb, is_main: mb, name: nb },
            ) => natural_cmp(pa, pb)
                .then_with(|| mb.cmp(ma))
                .then_with(|| na.cmp(nb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare strings the way a file browser does: digit runs by numeric value,
/// letters case-insensitively. Falls back to byte order so distinct strings
/// never compare equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = take_digits(&mut left);
                let run_b = take_digits(&mut right);
                let trimmed_a = run_a.trim_start_matches('0');
                let trimmed_b = run_b.trim_start_matches('0');
                let ordering = trimmed_a
                    .len()
                    .cmp(&trimmed_b.len())
                    .then_with(|| trimmed_a.cmp(trimmed_b));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.to_lowercase().cmp(y.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}
