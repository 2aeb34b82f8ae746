//! Asynchronous asset loading and the stores that keep loaded data alive.
//!
//! Decoding runs on worker threads. Results come back to the main thread as
//! [`AssetEvent`]s through an [`AssetNotifier`]; the event loop hands them to
//! `RenderContext::complete_asset`, which owns all scene mutation.

use crate::scene::{MeshData, MeshVertex};
use glam::Mat4;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u32);

impl GeometryId {
    #[cfg(test)]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u32);

impl TextureHandle {
    #[cfg(test)]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Decoded RGBA8 image, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    /// Flip rows on load. glTF UVs assume the first row is the top, so the
    /// model textures are always loaded with this off.
    pub flip_y: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse,
    AmbientOcclusion,
}

/// One triangle primitive from a glTF file, with its node's world transform.
#[derive(Debug, Clone)]
pub struct MeshPrimitive {
    pub name: String,
    pub mesh: MeshData,
    pub transform: Mat4,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {source}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("glTF {path} has no triangle primitives")]
    NoPrimitives { path: String },
    #[error("primitive '{name}' has no POSITION attribute")]
    MissingPositions { name: String },
    #[error("failed to spawn asset worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Ties an in-flight load to the context that requested it.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    context: Weak<()>,
}

impl LoadTicket {
    pub fn new(lifetime: &Arc<()>) -> Self {
        Self {
            context: Arc::downgrade(lifetime),
        }
    }

    /// True while the requesting context is alive and is `lifetime`.
    pub fn is_for(&self, lifetime: &Arc<()>) -> bool {
        self.context
            .upgrade()
            .is_some_and(|live| Arc::ptr_eq(&live, lifetime))
    }
}

#[derive(Debug)]
pub enum AssetEvent {
    Mesh {
        ticket: LoadTicket,
        path: PathBuf,
        result: Result<Vec<MeshPrimitive>, AssetError>,
    },
    Texture {
        ticket: LoadTicket,
        slot: TextureSlot,
        path: PathBuf,
        result: Result<TextureImage, AssetError>,
    },
}

/// Delivers completed loads back to the thread that owns the scene.
pub trait AssetNotifier: Clone + Send + 'static {
    fn notify(&self, event: AssetEvent);
}

impl AssetNotifier for std::sync::mpsc::Sender<AssetEvent> {
    fn notify(&self, event: AssetEvent) {
        if self.send(event).is_err() {
            log::debug!("Asset receiver dropped; discarding completion.");
        }
    }
}

pub struct AssetProvider<N: AssetNotifier> {
    notifier: N,
    root: PathBuf,
}

impl<N: AssetNotifier> AssetProvider<N> {
    pub fn new(notifier: N, root: impl Into<PathBuf>) -> Self {
        Self {
            notifier,
            root: root.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn load_mesh(&self, path: &str, ticket: LoadTicket) {
        let path = self.resolve(path);
        log::info!("Loading mesh {}", path.display());
        self.spawn("asset-mesh", move |notifier| {
            let result = load_mesh_file(&path);
            notifier.notify(AssetEvent::Mesh {
                ticket,
                path,
                result,
            });
        });
    }

    pub fn load_texture(
        &self,
        path: &str,
        slot: TextureSlot,
        options: TextureOptions,
        ticket: LoadTicket,
    ) {
        let path = self.resolve(path);
        log::info!("Loading {:?} texture {}", slot, path.display());
        self.spawn("asset-texture", move |notifier| {
            let result = load_texture_file(&path, options);
            notifier.notify(AssetEvent::Texture {
                ticket,
                slot,
                path,
                result,
            });
        });
    }

    fn spawn<F>(&self, name: &str, job: F)
    where
        F: FnOnce(&N) + Send + 'static,
    {
        let notifier = self.notifier.clone();
        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || job(&notifier));
        if let Err(err) = spawned {
            log::error!("{}", AssetError::Spawn(err));
        }
    }
}

pub fn load_mesh_file(path: &Path) -> Result<Vec<MeshPrimitive>, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.display().to_string(),
        source,
    })?;
    collect_primitives(&document, &buffers, &path.display().to_string())
}

#[cfg(test)]
pub fn load_mesh_from_slice(bytes: &[u8]) -> Result<Vec<MeshPrimitive>, AssetError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|source| AssetError::Gltf {
            path: "<memory>".to_string(),
            source,
        })?;
    collect_primitives(&document, &buffers, "<memory>")
}

fn collect_primitives(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    path: &str,
) -> Result<Vec<MeshPrimitive>, AssetError> {
    let mut primitives = Vec::new();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            process_node(&node, Mat4::IDENTITY, buffers, &mut primitives)?;
        }
    }
    if primitives.is_empty() {
        return Err(AssetError::NoPrimitives {
            path: path.to_string(),
        });
    }
    Ok(primitives)
}

fn process_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshPrimitive>,
) -> Result<(), AssetError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let base_name = mesh
            .name()
            .or_else(|| node.name())
            .unwrap_or("mesh")
            .to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive {} of '{}'",
                    primitive.index(),
                    base_name
                );
                continue;
            }
            let name = format!("{}#{}", base_name, primitive.index());
            let mesh = extract_primitive(&primitive, buffers, &name)?;
            out.push(MeshPrimitive {
                name,
                mesh,
                transform: world,
            });
        }
    }

    for child in node.children() {
        process_node(&child, world, buffers, out)?;
    }
    Ok(())
}

fn extract_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    name: &str,
) -> Result<MeshData, AssetError> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| AssetError::MissingPositions {
            name: name.to_string(),
        })?
        .collect();
    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|iter| iter.collect())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
    let indices: Vec<u32> = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, position)| MeshVertex {
            position: *position,
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect();

    Ok(MeshData { vertices, indices })
}

pub fn load_texture_file(path: &Path, options: TextureOptions) -> Result<TextureImage, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    decode_texture(&bytes, options).map_err(|source| AssetError::Image {
        path: path.display().to_string(),
        source,
    })
}

pub fn decode_texture(
    bytes: &[u8],
    options: TextureOptions,
) -> Result<TextureImage, image::ImageError> {
    let mut rgba = image::load_from_memory(bytes)?.to_rgba8();
    if options.flip_y {
        image::imageops::flip_vertical_in_place(&mut rgba);
    }
    Ok(TextureImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

/// Loaded geometry. Entries live for the whole session.
#[derive(Default)]
pub struct GeometryStore {
    meshes: Vec<Arc<MeshData>>,
}

impl GeometryStore {
    pub fn insert(&mut self, mesh: MeshData) -> GeometryId {
        self.meshes.push(Arc::new(mesh));
        GeometryId((self.meshes.len() - 1) as u32)
    }

    pub fn get(&self, id: GeometryId) -> Option<&Arc<MeshData>> {
        self.meshes.get(id.0 as usize)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }
}

/// Decoded textures shared with the GPU. Entries live for the whole session.
#[derive(Default)]
pub struct TextureStore {
    images: Vec<Arc<TextureImage>>,
}

impl TextureStore {
    pub fn insert(&mut self, image: TextureImage) -> TextureHandle {
        self.images.push(Arc::new(image));
        TextureHandle((self.images.len() - 1) as u32)
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&Arc<TextureImage>> {
        self.images.get(handle.0 as usize)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    /// A single textured triangle with an embedded buffer, translated by +2 on X.
    pub(crate) const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "mesh": 0, "name": "Tri", "translation": [2.0, 0.0, 0.0] }],
  "meshes": [{ "name": "Tri", "primitives": [{
    "attributes": { "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 },
    "indices": 3
  }] }],
  "buffers": [{ "byteLength": 104, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AAABAAIAAAA=" }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
    { "buffer": 0, "byteOffset": 72, "byteLength": 24 },
    { "buffer": 0, "byteOffset": 96, "byteLength": 6 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
    { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" },
    { "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;

    /// 1x2 PNG: red top row, blue bottom row.
    pub(crate) fn two_row_png() -> Vec<u8> {
        let mut image = image::RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn gltf_primitive_is_extracted_with_node_transform() {
        let primitives = load_mesh_from_slice(TRIANGLE_GLTF.as_bytes()).unwrap();
        assert_eq!(primitives.len(), 1);
        let primitive = &primitives[0];
        assert_eq!(primitive.name, "Tri#0");
        assert_eq!(primitive.mesh.vertices.len(), 3);
        assert_eq!(primitive.mesh.indices, vec![0, 1, 2]);
        assert_eq!(primitive.mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(primitive.mesh.vertices[2].uv, [0.0, 1.0]);
        assert_eq!(primitive.mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
        let origin = primitive.transform.transform_point3(glam::Vec3::ZERO);
        assert_eq!(origin, glam::Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn texture_rows_keep_file_order_without_flip() {
        let image = decode_texture(&two_row_png(), TextureOptions { flip_y: false }).unwrap();
        assert_eq!((image.width, image.height), (1, 2));
        assert_eq!(&image.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&image.pixels[4..8], &[0, 0, 255, 255]);
    }

    #[test]
    fn texture_flip_reverses_rows() {
        let image = decode_texture(&two_row_png(), TextureOptions { flip_y: true }).unwrap();
        assert_eq!(&image.pixels[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn missing_files_report_read_errors() {
        let err = load_texture_file(
            Path::new("definitely/not/here.png"),
            TextureOptions { flip_y: false },
        )
        .unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
        assert!(load_mesh_file(Path::new("definitely/not/here.gltf")).is_err());
    }

    #[test]
    fn ticket_only_matches_its_own_live_context() {
        let lifetime = Arc::new(());
        let other = Arc::new(());
        let ticket = LoadTicket::new(&lifetime);
        assert!(ticket.is_for(&lifetime));
        assert!(!ticket.is_for(&other));
        drop(lifetime);
        assert!(!ticket.is_for(&other));
    }

    #[test]
    fn provider_delivers_failures_through_notifier() {
        let (sender, receiver) = std::sync::mpsc::channel();
        let provider = AssetProvider::new(sender, "definitely/not/a/dir");
        let lifetime = Arc::new(());
        provider.load_texture(
            "diffuse.png",
            TextureSlot::Diffuse,
            TextureOptions { flip_y: false },
            LoadTicket::new(&lifetime),
        );
        let event = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
        match event {
            AssetEvent::Texture {
                slot, result, path, ..
            } => {
                assert_eq!(slot, TextureSlot::Diffuse);
                assert!(result.is_err());
                assert!(path.ends_with("diffuse.png"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
