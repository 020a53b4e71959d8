//! Scene description handed to the renderer.
//!
//! The scene is plain data: a node tree with the loaded watch model, a light rig, and the
//! camera. The session updates it every frame (anchor pose and screen texture) and the renderer
//! draws it.
//!
//! ```text
//! root
//! ├── light × 7
//! └── anchor (driven by the pose solver)
//!     └── model (static asset calibration)
//!         ├── meshes from the model file
//!         └── ...
//! ```

use std::f32::consts::{PI, TAU};

use nalgebra::{Point3, UnitQuaternion};

use crate::{
    asset::{AssetParam, ColorVariant, WatchAsset},
    image::{Color, Image, Resolution},
    pose::RigidTransform,
};

/// Name of the group node the solved wrist pose is applied to.
pub const ANCHOR_NODE: &str = "anchor";
/// Name of the node holding the watch model inside the anchor.
pub const MODEL_NODE: &str = "model";
/// Meshes with this name only write depth, hiding the parts of the watch behind the wrist.
pub const OCCLUDER_MESH: &str = "occluder";
/// The mesh displaying the clock face texture.
pub const SCREEN_MESH: &str = "screen";

/// Render order of occluder meshes. Lower values are drawn first.
pub const OCCLUDER_RENDER_ORDER: u8 = 1;
/// Render order of all other meshes.
pub const DEFAULT_RENDER_ORDER: u8 = 2;

/// Surface properties of a mesh (physically based "standard" material).
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
    /// If `false`, the mesh only writes depth.
    pub color_write: bool,
    /// If `true`, the mesh samples the scene's screen texture.
    pub screen_texture: bool,
}

impl Material {
    pub fn standard(color: Color, roughness: f32, metalness: f32) -> Self {
        Self {
            color,
            roughness,
            metalness,
            color_write: true,
            screen_texture: false,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::standard(Color::WHITE, 1.0, 0.0)
    }
}

/// A drawable mesh. Geometry stays with the renderer; the scene only tracks what changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub material: Material,
    render_order: u8,
}

impl Mesh {
    pub fn new(material: Material) -> Self {
        Self {
            material,
            render_order: DEFAULT_RENDER_ORDER,
        }
    }

    /// Returns the draw order assigned when the scene was built.
    #[inline]
    pub fn render_order(&self) -> u8 {
        self.render_order
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// A light shining from the node position towards the origin.
    Directional { color: Color, intensity: f32 },
    Ambient { color: Color, intensity: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Mesh(Mesh),
    Group(Vec<Node>),
    Light(Light),
}

/// A named scene node with a transform relative to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: RigidTransform,
    pub kind: NodeKind,
}

impl Node {
    pub fn mesh(name: impl Into<String>, material: Material) -> Self {
        Self {
            name: name.into(),
            transform: RigidTransform::identity(),
            kind: NodeKind::Mesh(Mesh::new(material)),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            transform: RigidTransform::identity(),
            kind: NodeKind::Group(children),
        }
    }

    pub fn light(name: impl Into<String>, position: Point3<f32>, light: Light) -> Self {
        Self {
            name: name.into(),
            transform: RigidTransform::new(position, UnitQuaternion::identity(), 1.0),
            kind: NodeKind::Light(light),
        }
    }

    pub fn with_transform(self, transform: RigidTransform) -> Self {
        Self { transform, ..self }
    }

    /// Returns the child nodes (empty for anything but groups).
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Group(children) => children,
            NodeKind::Mesh(_) | NodeKind::Light(_) => &[],
        }
    }

    /// Finds the first node called `name` in this subtree, depth first.
    pub fn find(&self, name: &str) -> Option<&Node> {
        if self.name == name {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        if self.name == name {
            return Some(self);
        }
        match &mut self.kind {
            NodeKind::Group(children) => children
                .iter_mut()
                .find_map(|child| child.find_mut(name)),
            NodeKind::Mesh(_) | NodeKind::Light(_) => None,
        }
    }

    /// Calls `f` on every node in this subtree together with its transform relative to the
    /// parent of `self` composed with `parent`.
    pub fn visit<'a>(
        &'a self,
        parent: &RigidTransform,
        f: &mut impl FnMut(&'a Node, &RigidTransform),
    ) {
        let world = compose(parent, &self.transform);
        f(self, &world);
        for child in self.children() {
            child.visit(&world, f);
        }
    }

    fn visit_meshes_mut(&mut self, f: &mut impl FnMut(&str, &mut Mesh)) {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => f(&self.name, mesh),
            NodeKind::Group(children) => {
                for child in children {
                    child.visit_meshes_mut(f);
                }
            }
            NodeKind::Light(_) => {}
        }
    }
}

/// Composes a parent transform with a child transform (child applied first).
fn compose(parent: &RigidTransform, child: &RigidTransform) -> RigidTransform {
    RigidTransform {
        position: parent.transform_point(&child.position),
        rotation: parent.rotation * child.rotation,
        scale: parent.scale * child.scale,
    }
}

/// The perspective camera looking at the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub position: Point3<f32>,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraRig {
    /// Camera looking down -Z from `(0, 0, 2)` with a 90° vertical field of view.
    ///
    /// With this placement, one frame height covers 4 scene units on the plane `z = 0`, matching
    /// [`DEFAULT_FOV_CONSTANT`][crate::solver::DEFAULT_FOV_CONSTANT].
    pub fn for_frame(frame: Resolution) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 2.0),
            fov_y_degrees: 90.0,
            aspect: frame.aspect_ratio().unwrap_or(1.0),
            near: 1.0,
            far: 10.0,
        }
    }

    /// Returns the number of scene units one frame height spans at `z = 0`.
    pub fn fov_constant(&self) -> f32 {
        2.0 * self.position.z * (self.fov_y_degrees.to_radians() / 2.0).tan()
    }

    /// Projects a scene point to pixel coordinates of a frame of resolution `frame`.
    ///
    /// Returns `None` for points behind the camera.
    pub fn project(&self, point: &Point3<f32>, frame: Resolution) -> Option<(f32, f32)> {
        let rel = point - self.position;
        let depth = -rel.z;
        if depth <= 0.0 {
            return None;
        }
        let tan = (self.fov_y_degrees.to_radians() / 2.0).tan();
        let ndc_x = rel.x / depth / (tan * self.aspect);
        let ndc_y = rel.y / depth / tan;
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        Some(((ndc_x + 1.0) / 2.0 * w, (1.0 - ndc_y) / 2.0 * h))
    }
}

/// Six white directional lights on a ring around the origin, plus ambient light.
pub fn light_rig() -> Vec<Node> {
    let mut lights = (0..6)
        .map(|i| {
            let angle = TAU / 6.0 * i as f32 + PI / 2.0;
            Node::light(
                format!("light-{i}"),
                Point3::new(angle.cos() * 6.0, 0.0, angle.sin() * 6.0),
                Light::Directional {
                    color: Color::WHITE,
                    intensity: 1.0,
                },
            )
        })
        .collect::<Vec<_>>();
    lights.push(Node::light(
        "ambient",
        Point3::origin(),
        Light::Ambient {
            color: Color::WHITE,
            intensity: 1.0,
        },
    ));
    lights
}

/// The complete scene: lights, the anchored watch, camera and screen texture.
#[derive(Debug, Clone)]
pub struct Scene {
    camera: CameraRig,
    lights: Vec<Node>,
    anchor: Node,
    asset: WatchAsset,
    screen_texture: Option<Image>,
}

impl Scene {
    /// Builds the scene around a loaded watch model.
    ///
    /// Meshes get their render order and material flags assigned here, once.
    pub fn new(mut model: Node, asset: WatchAsset, frame: Resolution) -> Self {
        model.name = MODEL_NODE.into();
        model.transform = asset.model_transform();
        let mut occluders = 0;
        model.visit_meshes_mut(&mut |name, mesh| match name {
            OCCLUDER_MESH => {
                mesh.render_order = OCCLUDER_RENDER_ORDER;
                mesh.material.color_write = false;
                occluders += 1;
            }
            SCREEN_MESH => {
                mesh.render_order = DEFAULT_RENDER_ORDER;
                mesh.material.screen_texture = true;
            }
            _ => mesh.render_order = DEFAULT_RENDER_ORDER,
        });
        log::debug!("watch model prepared ({occluders} occluder meshes)");

        Self {
            camera: CameraRig::for_frame(frame),
            lights: light_rig(),
            anchor: Node::group(ANCHOR_NODE, vec![model]),
            asset,
            screen_texture: None,
        }
    }

    #[inline]
    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    #[inline]
    pub fn lights(&self) -> &[Node] {
        &self.lights
    }

    /// Returns the anchor node the watch model hangs off.
    #[inline]
    pub fn anchor(&self) -> &Node {
        &self.anchor
    }

    #[inline]
    pub fn asset(&self) -> &WatchAsset {
        &self.asset
    }

    #[inline]
    pub fn anchor_transform(&self) -> &RigidTransform {
        &self.anchor.transform
    }

    pub fn set_anchor_transform(&mut self, transform: RigidTransform) {
        self.anchor.transform = transform;
    }

    fn model_mut(&mut self) -> Option<&mut Node> {
        self.anchor.find_mut(MODEL_NODE)
    }

    /// Changes an asset calibration parameter and applies it to the model immediately.
    ///
    /// Returns the value that was set after clamping it to the parameter's range.
    pub fn set_asset_param(&mut self, param: AssetParam, value: f32) -> f32 {
        let value = self.asset.set(param, value);
        let transform = self.asset.model_transform();
        if let Some(model) = self.model_mut() {
            model.transform = transform;
        }
        log::debug!("{} = {value}", param.name());
        value
    }

    /// Replaces the materials of the meshes named in the variant's palette.
    pub fn apply_color_variant(&mut self, variant: ColorVariant) {
        let palette = self.asset.palette(variant);
        let mut replaced = 0;
        self.anchor.visit_meshes_mut(&mut |name, mesh| {
            if let Some((_, material)) = palette.iter().find(|(mesh_name, _)| mesh_name == name) {
                mesh.material = material.clone();
                replaced += 1;
            }
        });
        if replaced == 0 {
            log::warn!(
                "color variant {variant}: model has no mesh called '{}'",
                self.asset.strap_mesh
            );
        }
    }

    /// Sets the image displayed by meshes that sample the screen texture.
    pub fn set_screen_texture(&mut self, texture: &Image) {
        self.screen_texture = Some(texture.clone());
    }

    #[inline]
    pub fn screen_texture(&self) -> Option<&Image> {
        self.screen_texture.as_ref()
    }

    /// Calls `f` with every mesh node and its transform in scene space, in render order.
    pub fn for_each_mesh(&self, mut f: impl FnMut(&Node, &Mesh, &RigidTransform)) {
        let mut meshes = Vec::new();
        self.anchor.visit(&RigidTransform::identity(), &mut |node, world| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                meshes.push((node, mesh, *world));
            }
        });
        meshes.sort_by_key(|(_, mesh, _)| mesh.render_order());
        for (node, mesh, world) in meshes {
            f(node, mesh, &world);
        }
    }
}
