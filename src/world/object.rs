//! Object records: the closed set of object kinds the crawler understands.
//!
//! A project is described as a flat list of [`ObjectRecord`]s. Kind-specific
//! slots (a material's shader, a game object's components, ...) live on
//! [`ObjectKind`]; everything else an object serializes is exposed as a tree
//! of [`Field`]s that the generic visitor walks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scene name used for objects that outlive scene loads.
pub const DONT_DESTROY_ON_LOAD: &str = "DontDestroyOnLoad";

/// Identity handle of one engine object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    /// Project-relative path of the file storing this object, if it is an asset.
    #[serde(default)]
    pub asset_path: Option<String>,
    /// True for every object at `asset_path` except the main one.
    #[serde(default)]
    pub sub_asset: bool,
    #[serde(default)]
    pub guid: Option<String>,
    /// Scene path for scene objects.
    #[serde(default)]
    pub scene: Option<String>,
    /// Hidden objects are never reported as main references of the asset group.
    #[serde(default)]
    pub hidden: bool,
    /// Inline source for text-like assets. Falls back to the file on disk.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl ObjectRecord {
    /// Lowercased file extension of the asset path.
    pub fn extension(&self) -> Option<String> {
        let path = self.asset_path.as_deref()?;
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_asset(&self) -> bool {
        self.asset_path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    GameObject {
        #[serde(default)]
        components: Vec<ObjectId>,
        #[serde(default)]
        children: Vec<ObjectId>,
        /// The game object this one is a prefab instance of.
        #[serde(default)]
        prefab_source: Option<ObjectId>,
    },
    Transform {
        owner: ObjectId,
    },
    Component {
        owner: ObjectId,
        /// Script asset backing a script component.
        #[serde(default)]
        script: Option<ObjectId>,
        /// Engine class name (MeshRenderer, Light, ...).
        #[serde(default)]
        class: Option<String>,
    },
    Animation {
        owner: ObjectId,
        #[serde(default)]
        clips: Vec<ObjectId>,
    },
    Animator {
        owner: ObjectId,
        #[serde(default)]
        controller: Option<ObjectId>,
    },
    Material {
        #[serde(default)]
        shader: Option<ObjectId>,
        #[serde(default)]
        textures: Vec<TextureSlot>,
    },
    Shader {
        #[serde(default)]
        properties: Vec<ShaderProperty>,
    },
    Script {
        class_name: String,
        /// Direct base class and implemented interfaces, as script objects.
        #[serde(default)]
        base_types: Vec<ObjectId>,
        #[serde(default)]
        interface: bool,
        #[serde(default)]
        sealed: bool,
        /// Whether the class can be instantiated as an engine object.
        #[serde(default)]
        engine_object: bool,
        #[serde(default)]
        defaults: Vec<DefaultReference>,
    },
    AnimatorController {
        #[serde(default)]
        layers: Vec<ControllerLayer>,
    },
    AnimatorOverrideController {
        #[serde(default)]
        parent: Option<ObjectId>,
        #[serde(default)]
        clips: Vec<ObjectId>,
    },
    AnimatorStateMachine {
        #[serde(default)]
        child_machines: Vec<ObjectId>,
        #[serde(default)]
        states: Vec<ObjectId>,
        /// Scripts of the attached state machine behaviours.
        #[serde(default)]
        behaviours: Vec<ObjectId>,
    },
    AnimatorState {
        #[serde(default)]
        motion: Option<ObjectId>,
        #[serde(default)]
        behaviours: Vec<ObjectId>,
    },
    AnimatorStateTransition,
    BlendTree {
        #[serde(default)]
        motions: Vec<ObjectId>,
    },
    AnimationClip {
        #[serde(default)]
        curves: Vec<CurveBinding>,
        #[serde(default)]
        events: Vec<AnimationEvent>,
    },
    TerrainData,
    SpriteAtlas {
        #[serde(default)]
        master_atlas: Option<ObjectId>,
        #[serde(default)]
        packables: Vec<ObjectId>,
    },
    Texture,
    Sprite,
    SceneAsset,
    Folder,
    TextAsset,
    Generic {
        #[serde(default)]
        class: Option<String>,
    },
}

impl ObjectKind {
    /// Type name shown in node labels.
    pub fn type_name(&self) -> &str {
        match self {
            ObjectKind::GameObject { .. } => "GameObject",
            ObjectKind::Transform { .. } => "Transform",
            ObjectKind::Component { class, .. } => class.as_deref().unwrap_or("Component"),
            ObjectKind::Animation { .. } => "Animation",
            ObjectKind::Animator { .. } => "Animator",
            ObjectKind::Material { .. } => "Material",
            ObjectKind::Shader { .. } => "Shader",
            ObjectKind::Script { .. } => "MonoScript",
            ObjectKind::AnimatorController { .. } => "AnimatorController",
            ObjectKind::AnimatorOverrideController { .. } => "AnimatorOverrideController",
            ObjectKind::AnimatorStateMachine { .. } => "AnimatorStateMachine",
            ObjectKind::AnimatorState { .. } => "AnimatorState",
            ObjectKind::AnimatorStateTransition => "AnimatorStateTransition",
            ObjectKind::BlendTree { .. } => "BlendTree",
            ObjectKind::AnimationClip { .. } => "AnimationClip",
            ObjectKind::TerrainData => "TerrainData",
            ObjectKind::SpriteAtlas { .. } => "SpriteAtlas",
            ObjectKind::Texture => "Texture",
            ObjectKind::Sprite => "Sprite",
            ObjectKind::SceneAsset => "SceneAsset",
            ObjectKind::Folder => "DefaultAsset",
            ObjectKind::TextAsset => "TextAsset",
            ObjectKind::Generic { class } => class.as_deref().unwrap_or("Object"),
        }
    }

    /// The game object a component-like object is attached to.
    pub fn owner(&self) -> Option<ObjectId> {
        match self {
            ObjectKind::Transform { owner }
            | ObjectKind::Component { owner, .. }
            | ObjectKind::Animation { owner, .. }
            | ObjectKind::Animator { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    pub fn is_component_like(&self) -> bool {
        self.owner().is_some()
    }

    pub fn is_game_object(&self) -> bool {
        matches!(self, ObjectKind::GameObject { .. })
    }

    /// Every object referenced through a kind-specific slot.
    pub fn references(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        match self {
            ObjectKind::GameObject {
                components,
                children,
                prefab_source,
            } => {
                out.extend(components);
                out.extend(children);
                out.extend(prefab_source);
            }
            ObjectKind::Transform { .. } => {}
            ObjectKind::Component { script, .. } => out.extend(script),
            ObjectKind::Animation { clips, .. } => out.extend(clips),
            ObjectKind::Animator { controller, .. } => out.extend(controller),
            ObjectKind::Material { shader, textures } => {
                out.extend(shader);
                out.extend(textures.iter().filter_map(|slot| slot.texture));
            }
            ObjectKind::Shader { properties } => {
                out.extend(properties.iter().filter_map(|p| p.default_texture));
            }
            ObjectKind::Script {
                base_types,
                defaults,
                ..
            } => {
                out.extend(base_types);
                out.extend(defaults.iter().filter_map(|d| d.value));
            }
            ObjectKind::AnimatorController { layers } => {
                for layer in layers {
                    out.extend(layer.avatar_mask);
                    out.extend(layer.state_machine);
                }
            }
            ObjectKind::AnimatorOverrideController { parent, clips } => {
                out.extend(parent);
                out.extend(clips);
            }
            ObjectKind::AnimatorStateMachine {
                child_machines,
                states,
                behaviours,
            } => {
                out.extend(child_machines);
                out.extend(states);
                out.extend(behaviours);
            }
            ObjectKind::AnimatorState { motion, behaviours } => {
                out.extend(motion);
                out.extend(behaviours);
            }
            ObjectKind::BlendTree { motions } => out.extend(motions),
            ObjectKind::AnimationClip { curves, events } => {
                for curve in curves {
                    out.extend(curve.keyframes.iter().filter_map(|k| k.value));
                }
                out.extend(events.iter().filter_map(|e| e.object));
            }
            ObjectKind::SpriteAtlas {
                master_atlas,
                packables,
            } => {
                out.extend(master_atlas);
                out.extend(packables);
            }
            ObjectKind::AnimatorStateTransition
            | ObjectKind::TerrainData
            | ObjectKind::Texture
            | ObjectKind::Sprite
            | ObjectKind::SceneAsset
            | ObjectKind::Folder
            | ObjectKind::TextAsset
            | ObjectKind::Generic { .. } => {}
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSlot {
    pub property: String,
    #[serde(default)]
    pub texture: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    #[serde(default)]
    pub default_texture: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultReference {
    pub name: String,
    #[serde(default)]
    pub value: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerLayer {
    pub name: String,
    #[serde(default)]
    pub avatar_mask: Option<ObjectId>,
    #[serde(default)]
    pub state_machine: Option<ObjectId>,
}

/// One animated property. `path` is relative to the animated root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveBinding {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub keyframes: Vec<ObjectKeyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectKeyframe {
    pub time: f32,
    #[serde(default)]
    pub value: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationEvent {
    pub time: f32,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

// ─── Reflective Members ─────────────────────────────────────────

/// A member exposed to the generic visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Properties are accessors rather than stored variables.
    #[serde(default)]
    pub is_property: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default = "default_true")]
    pub serializable: bool,
    #[serde(default)]
    pub value: FieldValue,
}

fn default_true() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            is_property: false,
            deprecated: false,
            serializable: true,
            value,
        }
    }

    pub fn property(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            is_property: true,
            ..Self::new(name, value)
        }
    }
}

/// The value read from a member. Reading can fail, see [`AccessFault`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    #[default]
    Null,
    /// Any value type; never followed.
    Primitive(String),
    Reference(ObjectId),
    List(Vec<FieldValue>),
    Struct(Vec<Field>),
    Fault(AccessFault),
}

impl FieldValue {
    /// Collect every reference nested in this value.
    pub fn collect_references(&self, out: &mut Vec<ObjectId>) {
        match self {
            FieldValue::Reference(id) => out.push(*id),
            FieldValue::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            FieldValue::Struct(fields) => {
                for field in fields {
                    field.value.collect_references(out);
                }
            }
            FieldValue::Null | FieldValue::Primitive(_) | FieldValue::Fault(_) => {}
        }
    }
}

/// Why a member could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessFault {
    UnassignedReference,
    MissingReference,
    MissingComponent,
    NotImplemented,
    Unexpected(String),
}

impl AccessFault {
    /// Benign faults come from stale or broken serialized data and are skipped quietly.
    pub fn is_benign(&self) -> bool {
        !matches!(self, AccessFault::Unexpected(_))
    }
}

impl fmt::Display for AccessFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessFault::UnassignedReference => write!(f, "unassigned reference"),
            AccessFault::MissingReference => write!(f, "missing reference"),
            AccessFault::MissingComponent => write!(f, "missing component"),
            AccessFault::NotImplemented => write!(f, "not implemented"),
            AccessFault::Unexpected(message) => write!(f, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_json() {
        let json = r#"{
            "id": 7,
            "name": "Crate",
            "kind": { "type": "material", "shader": 3,
                      "textures": [{ "property": "_MainTex", "texture": 4 }] },
            "asset_path": "Assets/Materials/Crate.mat",
            "fields": [
                { "name": "m_Parent", "value": { "kind": "reference", "value": 9 } },
                { "name": "m_Broken", "value": { "kind": "fault", "value": "missing_reference" } },
                { "name": "m_Odd", "value": { "kind": "fault", "value": { "unexpected": "boom" } } }
            ]
        }"#;
        let record: ObjectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, ObjectId(7));
        assert_eq!(record.extension().as_deref(), Some("mat"));
        assert_eq!(record.kind.references(), vec![ObjectId(3), ObjectId(4)]);
        assert!(record.fields[0].serializable, "serializable defaults to true");
        assert_eq!(
            record.fields[1].value,
            FieldValue::Fault(AccessFault::MissingReference)
        );
        assert_eq!(
            record.fields[2].value,
            FieldValue::Fault(AccessFault::Unexpected("boom".to_string()))
        );
    }

    #[test]
    fn test_fault_classification() {
        assert!(AccessFault::MissingComponent.is_benign());
        assert!(AccessFault::NotImplemented.is_benign());
        assert!(!AccessFault::Unexpected("x".into()).is_benign());
    }

    #[test]
    fn test_nested_references_collected() {
        let value = FieldValue::List(vec![
            FieldValue::Reference(ObjectId(1)),
            FieldValue::Struct(vec![Field::new("inner", FieldValue::Reference(ObjectId(2)))]),
            FieldValue::Primitive("3".into()),
        ]);
        let mut out = Vec::new();
        value.collect_references(&mut out);
        assert_eq!(out, vec![ObjectId(1), ObjectId(2)]);
    }
}
