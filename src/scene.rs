//! A minimal entity/component scene that draws itself with the 2D renderer.
//!
//! Every entity has a [`TagComponent`] and a [`TransformComponent`]. A
//! [`QuadComponent`] makes it visible, a [`Camera`] lets it view the scene.
//! One camera can be primary; [`Scene::update`] renders through it.

use std::rc::Rc;

use cgmath::One;

use crate::{
    camera::Camera,
    error::Result,
    graphics::GraphicsBackend,
    math::{self, Mat4, Vec3, Vec4, color},
    renderer::{QuadSpec, Renderer},
};

/// Handle to an entity of one [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    /// Id written to the pick buffer for this entity's quad.
    pub fn id(self) -> i32 {
        self.0 as i32
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagComponent {
    pub tag: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransformComponent {
    pub transform: Mat4,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            transform: Mat4::one(),
        }
    }
}

impl TransformComponent {
    pub fn apply_translation(&mut self, offset: Vec3) {
        self.transform = math::translate(&self.transform, offset);
    }

    /// Rotates about `axis`. `angle` is in degrees unless `degrees` is false.
    pub fn apply_rotation_about(&mut self, angle: f32, axis: Vec3, degrees: bool) {
        let angle = if degrees { math::radians(angle) } else { angle };
        self.transform = math::rotate(&self.transform, angle, axis);
    }

    /// Rotates about −Z, clockwise on screen for a positive angle.
    pub fn apply_rotation(&mut self, angle: f32, degrees: bool) {
        self.apply_rotation_about(angle, -math::UNIT_Z, degrees);
    }

    pub fn apply_scale(&mut self, factors: Vec3) {
        self.transform = math::scale(&self.transform, factors);
    }
}

pub struct QuadComponent<T> {
    pub color: Vec4,
    pub texture: Option<Rc<T>>,
}

impl<T> Default for QuadComponent<T> {
    fn default() -> Self {
        Self {
            color: color::WHITE,
            texture: None,
        }
    }
}

impl<T> Clone for QuadComponent<T> {
    fn clone(&self) -> Self {
        Self {
            color: self.color,
            texture: self.texture.clone(),
        }
    }
}

struct EntityData<T> {
    tag: TagComponent,
    transform: TransformComponent,
    quad: Option<QuadComponent<T>>,
    camera: Option<Camera>,
}

/// Entities in creation order. `T` is the texture type quads refer to.
pub struct Scene<T> {
    entities: Vec<EntityData<T>>,
}

impl<T> Default for Scene<T> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
        }
    }
}

impl<T> Scene<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entity with an identity transform.
    pub fn create_entity(&mut self, tag: impl Into<String>) -> Entity {
        let entity = Entity(self.entities.len() as u32);
        self.entities.push(EntityData {
            tag: TagComponent { tag: tag.into() },
            transform: TransformComponent::default(),
            quad: None,
            camera: None,
        });
        log::trace!("created entity {}", entity.0);
        entity
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        (entity.0 as usize) < self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.entities.len() as u32).map(Entity)
    }

    /// Looks an entity up by the id its quad writes to the pick buffer.
    pub fn entity_from_id(&self, id: i32) -> Option<Entity> {
        let entity = Entity(u32::try_from(id).ok()?);
        self.contains(entity).then_some(entity)
    }

    fn data(&self, entity: Entity) -> Option<&EntityData<T>> {
        self.entities.get(entity.0 as usize)
    }

    fn data_mut(&mut self, entity: Entity) -> Option<&mut EntityData<T>> {
        self.entities.get_mut(entity.0 as usize)
    }

    pub fn tag(&self, entity: Entity) -> Option<&TagComponent> {
        self.data(entity).map(|data| &data.tag)
    }

    pub fn tag_mut(&mut self, entity: Entity) -> Option<&mut TagComponent> {
        self.data_mut(entity).map(|data| &mut data.tag)
    }

    pub fn transform(&self, entity: Entity) -> Option<&TransformComponent> {
        self.data(entity).map(|data| &data.transform)
    }

    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut TransformComponent> {
        self.data_mut(entity).map(|data| &mut data.transform)
    }

    /// Attaches `quad` unless the entity already has one; returns the
    /// component the entity ends up with.
    pub fn add_quad(
        &mut self,
        entity: Entity,
        quad: QuadComponent<T>,
    ) -> Option<&mut QuadComponent<T>> {
        self.data_mut(entity).map(|data| data.quad.get_or_insert(quad))
    }

    pub fn quad(&self, entity: Entity) -> Option<&QuadComponent<T>> {
        self.data(entity)?.quad.as_ref()
    }

    pub fn quad_mut(&mut self, entity: Entity) -> Option<&mut QuadComponent<T>> {
        self.data_mut(entity)?.quad.as_mut()
    }

    pub fn remove_quad(&mut self, entity: Entity) -> Option<QuadComponent<T>> {
        self.data_mut(entity)?.quad.take()
    }

    /// Attaches `camera` unless the entity already has one. The primary flag
    /// of the attached camera is cleared; use [`Scene::set_primary_camera`].
    pub fn add_camera(&mut self, entity: Entity, mut camera: Camera) -> Option<&mut Camera> {
        camera.primary = false;
        self.data_mut(entity).map(|data| data.camera.get_or_insert(camera))
    }

    pub fn camera(&self, entity: Entity) -> Option<&Camera> {
        self.data(entity)?.camera.as_ref()
    }

    pub fn camera_mut(&mut self, entity: Entity) -> Option<&mut Camera> {
        self.data_mut(entity)?.camera.as_mut()
    }

    pub fn remove_camera(&mut self, entity: Entity) -> Option<Camera> {
        self.data_mut(entity)?.camera.take()
    }

    /// Makes the camera of `entity` the only primary one. If `entity` has no
    /// camera, no camera is primary afterwards.
    pub fn set_primary_camera(&mut self, entity: Entity) {
        for (index, data) in self.entities.iter_mut().enumerate() {
            if let Some(camera) = &mut data.camera {
                camera.primary = index == entity.0 as usize;
            }
        }
    }

    pub fn primary_camera(&self) -> Option<Entity> {
        self.entities
            .iter()
            .position(|data| data.camera.as_ref().is_some_and(Camera::is_primary))
            .map(|index| Entity(index as u32))
    }

    /// `projection × transform⁻¹` of the primary camera. Identity when there
    /// is no primary camera or its transform cannot be inverted.
    pub fn camera_product(&self) -> Mat4 {
        let Some(data) = self.primary_camera().and_then(|entity| self.data(entity)) else {
            return Mat4::one();
        };
        let Some(camera) = &data.camera else {
            return Mat4::one();
        };
        match math::inverse(&data.transform.transform) {
            Some(inverse_view) => camera.projection() * inverse_view,
            None => {
                log::warn!(
                    "primary camera '{}' has a singular transform, rendering without camera",
                    data.tag.tag
                );
                Mat4::one()
            }
        }
    }

    /// Updates the aspect ratio of every camera to a new target size.
    pub fn resize_cameras(&mut self, width: u32, height: u32) {
        for camera in self.entities.iter_mut().filter_map(|data| data.camera.as_mut()) {
            camera.fit_to(width, height);
        }
    }

    /// Draws every entity that has a quad, in creation order, as one 2D
    /// scene seen through the primary camera.
    pub fn update<B>(&self, renderer: &mut Renderer<B>) -> Result<()>
    where
        B: GraphicsBackend<Texture = T>,
    {
        renderer.begin_scene_2d(&self.camera_product())?;
        for (index, data) in self.entities.iter().enumerate() {
            let Some(quad) = &data.quad else {
                continue;
            };
            let spec = QuadSpec {
                color: quad.color,
                texture: quad.texture.clone(),
                entity_id: Entity(index as u32).id(),
            };
            if let Err(err) = renderer.submit_quad_2d(&data.transform.transform, &spec) {
                // Close the scene so the renderer stays usable.
                if let Err(end_err) = renderer.end_scene_2d() {
                    log::warn!("closing scene after failed submission: {end_err}");
                }
                return Err(err);
            }
        }
        renderer.end_scene_2d()
    }
}
