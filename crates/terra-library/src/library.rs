//! [`MaterialLibrary`]: maps voxel material ids to render surfaces.
//!
//! Materials are registered first and packed into surfaces by
//! [`MaterialLibrary::finalize`]. Finalizing also builds a dense
//! material-id → [`SurfaceRef`] table so that lookups from the mesh pass
//! are a single index. Registering after finalize rebuilds the table
//! immediately from the provider retained at finalize time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use terra_voxel::{FaceDirection, MaterialId, VoxelCategory};

use crate::atlas::{AtlasBuilder, AtlasConfig, TextureArrayBuilder, UvRect};
use crate::error::LibraryError;
use crate::material::{MaterialDef, MaterialManifest};
use crate::surface::{FaceMapping, LibraryKind, Surface, SurfaceRef, SurfaceTexture};
use crate::texture::TextureProvider;

/// Registry of voxel materials and the surfaces they render into.
#[derive(Clone)]
pub struct MaterialLibrary {
    kind: LibraryKind,
    atlas_config: AtlasConfig,
    /// Dense array: index == `MaterialId.0`.
    materials: Vec<Option<MaterialDef>>,
    name_to_id: HashMap<String, MaterialId>,
    provider: Option<Arc<dyn TextureProvider>>,
    surfaces: Vec<Arc<Surface>>,
    table: Vec<Option<SurfaceRef>>,
}

impl std::fmt::Debug for MaterialLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialLibrary")
            .field("kind", &self.kind)
            .field("materials", &self.material_count())
            .field("surfaces", &self.surfaces.len())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl MaterialLibrary {
    /// Creates an empty library with the default atlas sizing.
    pub fn new(kind: LibraryKind) -> Self {
        Self::with_atlas_config(kind, AtlasConfig::default())
    }

    /// Creates an empty library with explicit atlas sizing.
    pub fn with_atlas_config(kind: LibraryKind, atlas_config: AtlasConfig) -> Self {
        Self {
            kind,
            atlas_config,
            materials: Vec::new(),
            name_to_id: HashMap::new(),
            provider: None,
            surfaces: Vec::new(),
            table: Vec::new(),
        }
    }

    /// Parses a RON manifest and registers every entry.
    pub fn from_manifest_str(
        kind: LibraryKind,
        atlas_config: AtlasConfig,
        ron_str: &str,
    ) -> Result<Self, LibraryError> {
        let manifest: MaterialManifest = ron::from_str(ron_str)?;
        let mut library = Self::with_atlas_config(kind, atlas_config);
        for entry in manifest.materials {
            library.register(entry.into())?;
        }
        Ok(library)
    }

    /// Reads and parses a RON manifest file.
    pub fn from_manifest_path(
        kind: LibraryKind,
        atlas_config: AtlasConfig,
        path: &Path,
    ) -> Result<Self, LibraryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_manifest_str(kind, atlas_config, &contents)
    }

    // -- registration --

    /// Registers a material. After [`Self::finalize`] the surface table is
    /// rebuilt before returning; on failure the registration is rolled back.
    pub fn register(&mut self, def: MaterialDef) -> Result<(), LibraryError> {
        if def.id.is_empty() {
            return Err(LibraryError::InvalidMaterialId(def.id));
        }
        if self.material(def.id).is_some() {
            return Err(LibraryError::DuplicateMaterial(format!("id {}", def.id.0)));
        }
        if self.name_to_id.contains_key(&def.name) {
            return Err(LibraryError::DuplicateMaterial(def.name));
        }

        let id = def.id;
        let slot = id.0 as usize;
        if self.materials.len() <= slot {
            self.materials.resize(slot + 1, None);
        }
        self.name_to_id.insert(def.name.clone(), id);
        self.materials[slot] = Some(def);

        if self.is_finalized()
            && let Err(err) = self.rebuild()
        {
            if let Some(def) = self.materials[slot].take() {
                self.name_to_id.remove(&def.name);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Packs textures into surfaces and builds the lookup table.
    pub fn finalize(&mut self, provider: Arc<dyn TextureProvider>) -> Result<(), LibraryError> {
        self.provider = Some(provider);
        if let Err(err) = self.rebuild() {
            self.provider = None;
            return Err(err);
        }
        tracing::info!(
            kind = ?self.kind,
            materials = self.material_count(),
            surfaces = self.surfaces.len(),
            "material library finalized"
        );
        Ok(())
    }

    /// Returns `true` once [`Self::finalize`] has succeeded.
    pub fn is_finalized(&self) -> bool {
        self.provider.is_some()
    }

    fn rebuild(&mut self) -> Result<(), LibraryError> {
        let Some(provider) = self.provider.clone() else {
            return Err(LibraryError::NotFinalized);
        };

        let mut fetched: HashMap<String, RgbaImage> = HashMap::new();
        let mut fetch = |name: &str| -> Result<RgbaImage, LibraryError> {
            if let Some(img) = fetched.get(name) {
                return Ok(img.clone());
            }
            let img = provider
                .texture(name)
                .ok_or_else(|| LibraryError::MissingTexture(name.to_string()))?;
            fetched.insert(name.to_string(), img.clone());
            Ok(img)
        };

        let mut surfaces = Vec::new();
        let mut table = vec![None; self.materials.len()];
        let repeats_uv = !matches!(self.kind, LibraryKind::Merger);

        for (index, (name, members)) in self.groups().into_iter().enumerate() {
            let mut mappings: Vec<(MaterialId, [FaceMapping; 6])> = Vec::with_capacity(members.len());
            let texture = match self.kind {
                LibraryKind::Merger => {
                    let mut builder = AtlasBuilder::new(self.atlas_config)?;
                    for def in &members {
                        let mut faces = [FaceMapping {
                            rect: UvRect::FULL,
                            layer: 0,
                        }; 6];
                        for face in FaceDirection::ALL {
                            let tex = def.textures.texture_for(face);
                            let tile = builder.add(tex, &fetch(tex)?)?;
                            faces[face.index()].rect = builder.tile_rect(tile);
                        }
                        mappings.push((def.id, faces));
                    }
                    SurfaceTexture::Atlas(builder.build())
                }
                LibraryKind::Simple | LibraryKind::MergerPcm => {
                    let mut builder = TextureArrayBuilder::new();
                    for def in &members {
                        let mut faces = [FaceMapping {
                            rect: UvRect::FULL,
                            layer: 0,
                        }; 6];
                        for face in FaceDirection::ALL {
                            let tex = def.textures.texture_for(face);
                            faces[face.index()].layer =
                                builder.add_fitted(tex, &fetch(tex)?, self.atlas_config.tile_size)?;
                        }
                        mappings.push((def.id, faces));
                    }
                    SurfaceTexture::Array(builder.build())
                }
            };

            for (id, faces) in mappings {
                table[id.0 as usize] = Some(SurfaceRef {
                    surface: index,
                    material: id,
                    faces,
                    repeats_uv,
                });
            }
            surfaces.push(Arc::new(Surface {
                index,
                name,
                materials: members.iter().map(|d| d.id).collect(),
                transparent: members.iter().any(|d| d.transparent),
                liquid: members.iter().any(|d| d.liquid),
                texture,
            }));
        }

        self.surfaces = surfaces;
        self.table = table;
        Ok(())
    }

    /// Surface groups in ascending order of their first member's id.
    fn groups(&self) -> Vec<(String, Vec<&MaterialDef>)> {
        let mut groups: Vec<(String, Vec<&MaterialDef>)> = Vec::new();
        for def in self.materials.iter().flatten() {
            let key = match self.kind {
                LibraryKind::Simple => def.name.as_str(),
                LibraryKind::Merger | LibraryKind::MergerPcm => def.group_key(),
            };
            match groups.iter_mut().find(|(name, _)| name == key) {
                Some((_, members)) => members.push(def),
                None => groups.push((key.to_string(), vec![def])),
            }
        }
        groups
    }

    // -- lookups --

    /// Resolves the surface a material renders into.
    pub fn get_surface_for_material(&self, id: MaterialId) -> Result<SurfaceRef, LibraryError> {
        if !self.is_finalized() {
            return Err(LibraryError::NotFinalized);
        }
        self.table
            .get(id.0 as usize)
            .copied()
            .flatten()
            .ok_or(LibraryError::UnknownMaterial(id))
    }

    /// Registered definition of a material.
    pub fn material(&self, id: MaterialId) -> Option<&MaterialDef> {
        self.materials.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Material id registered under `name`.
    pub fn id_by_name(&self, name: &str) -> Option<MaterialId> {
        self.name_to_id.get(name).copied()
    }

    /// Culling category. Empty space and unknown ids are [`VoxelCategory::Empty`].
    pub fn category(&self, id: MaterialId) -> VoxelCategory {
        self.material(id)
            .map_or(VoxelCategory::Empty, MaterialDef::category)
    }

    /// Transparency. Empty space and unknown ids count as transparent.
    pub fn is_transparent(&self, id: MaterialId) -> bool {
        self.material(id).is_none_or(|def| def.transparent)
    }

    /// Block light emitted by a material.
    pub fn light_emission(&self, id: MaterialId) -> u8 {
        self.material(id).map_or(0, |def| def.light_emission)
    }

    /// Every registered material, ascending by id.
    pub fn materials(&self) -> impl Iterator<Item = &MaterialDef> {
        self.materials.iter().flatten()
    }

    /// Number of registered materials.
    pub fn material_count(&self) -> usize {
        self.name_to_id.len()
    }

    /// All surfaces, indexed by [`SurfaceRef::surface`].
    pub fn surfaces(&self) -> &[Arc<Surface>] {
        &self.surfaces
    }

    /// One surface by index.
    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.surfaces.get(index).map(Arc::as_ref)
    }

    /// Number of surfaces.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Grouping strategy.
    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    /// Atlas sizing used by merging libraries and layer size of arrays.
    pub fn atlas_config(&self) -> AtlasConfig {
        self.atlas_config
    }

    /// Atlas image of a surface.
    pub fn atlas_image(&self, surface: usize) -> Option<&RgbaImage> {
        self.surface(surface).and_then(Surface::atlas_image)
    }

    /// Texture array layers of a surface.
    pub fn texture_layers(&self, surface: usize) -> Option<&[RgbaImage]> {
        self.surface(surface).and_then(Surface::texture_layers)
    }
}
