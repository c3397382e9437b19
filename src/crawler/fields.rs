//! Generic member visitor.
//!
//! Walks an object's [`Field`] tree and reports every object reference it
//! holds, with a member path such as `Variable: waves[2].prefab`.

use crate::config::SearchOptions;
use crate::world::{AccessFault, Field, FieldValue, ObjectId, ObjectKind, ObjectRecord};

/// Member paths ending like this hold renderer-internal textures.
const RENDER_DATA_TEXTURE_SUFFIX: &str = "m_RD.texture";

const COMPONENT_NOISE: &[&str] = &[
    "gameObject",
    "transform",
    "attachedRigidbody",
    "rectTransform",
    "mesh",
    "material",
    "materials",
];
const MATERIAL_NOISE: &[&str] = &["color", "mainTexture"];
const ANIMATOR_NOISE: &[&str] = &["parameters"];
const TERRAIN_NOISE: &[&str] = &["users"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    pub target: ObjectId,
    pub description: String,
}

/// A member that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFault {
    pub member: String,
    pub fault: AccessFault,
}

#[derive(Debug, Default)]
pub struct FieldScan {
    pub references: Vec<FieldReference>,
    pub faults: Vec<FieldFault>,
}

/// Collect the references held by the members of `record` that `options` allow.
pub fn scan_fields(record: &ObjectRecord, options: &SearchOptions) -> FieldScan {
    let noise = noise_members(&record.kind);
    let mut scan = FieldScan::default();

    for field in &record.fields {
        if noise.contains(&field.name.as_str()) || !is_searched(field, options) {
            continue;
        }
        let kind = if field.is_property { "Property" } else { "Variable" };
        let mut path = field.name.clone();
        walk(&field.value, &mut path, kind, options, &mut scan);
    }

    scan
}

fn noise_members(kind: &ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Material { .. } => MATERIAL_NOISE,
        ObjectKind::Animator { .. } => ANIMATOR_NOISE,
        ObjectKind::TerrainData => TERRAIN_NOISE,
        kind if kind.is_component_like() => COMPONENT_NOISE,
        _ => &[],
    }
}

fn is_searched(field: &Field, options: &SearchOptions) -> bool {
    if field.deprecated {
        return false;
    }
    if field.is_property && !options.search_properties {
        return false;
    }
    if !field.is_property && !options.search_fields {
        return false;
    }
    !(options.serializable_only && !field.serializable)
}

fn walk(
    value: &FieldValue,
    path: &mut String,
    kind: &str,
    options: &SearchOptions,
    scan: &mut FieldScan,
) {
    match value {
        FieldValue::Null | FieldValue::Primitive(_) => {}
        FieldValue::Reference(target) => {
            if !path.ends_with(RENDER_DATA_TEXTURE_SUFFIX) {
                scan.references.push(FieldReference {
                    target: *target,
                    description: format!("{kind}: {path}"),
                });
            }
        }
        FieldValue::List(items) => {
            let base = path.len();
            for (index, item) in items.iter().enumerate() {
                path.push_str(&format!("[{index}]"));
                walk(item, path, kind, options, scan);
                path.truncate(base);
            }
        }
        FieldValue::Struct(members) => {
            let base = path.len();
            for member in members.iter().filter(|m| is_searched(m, options)) {
                path.push('.');
                path.push_str(&member.name);
                walk(&member.value, path, kind, options, scan);
                path.truncate(base);
            }
        }
        FieldValue::Fault(fault) => scan.faults.push(FieldFault {
            member: path.clone(),
            fault: fault.clone(),
        }),
    }
}
