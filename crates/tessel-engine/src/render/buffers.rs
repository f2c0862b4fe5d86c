use super::vertex::{DynamicVertex, StaticVertex};
use crate::device::{BufferId, BufferTarget, BufferUsage, GpuApi};
use crate::error::SetupError;

/// The three device buffers behind the sprite grid.
///
/// Static and index data are replaced occasionally; dynamic data every frame.
/// Released explicitly through [`GeometryBuffers::release`] by the render core.
#[derive(Debug)]
pub struct GeometryBuffers {
    static_vertices: BufferId,
    dynamic_vertices: BufferId,
    indices: BufferId,
}

impl GeometryBuffers {
    /// Allocates three empty buffers. On failure, whatever was allocated is
    /// deleted again.
    pub fn create<A: GpuApi>(api: &mut A) -> Result<Self, SetupError> {
        let mut made = Vec::with_capacity(3);
        for target in [BufferTarget::Vertex, BufferTarget::Vertex, BufferTarget::Index] {
            match api.create_buffer(target) {
                Ok(id) => made.push(id),
                Err(message) => {
                    for id in made.into_iter().rev() {
                        api.delete_buffer(id);
                    }
                    return Err(SetupError::device("create vertex buffers", message));
                }
            }
        }

        Ok(Self {
            static_vertices: made[0],
            dynamic_vertices: made[1],
            indices: made[2],
        })
    }

    pub fn static_vertices(&self) -> BufferId {
        self.static_vertices
    }

    pub fn dynamic_vertices(&self) -> BufferId {
        self.dynamic_vertices
    }

    pub fn indices(&self) -> BufferId {
        self.indices
    }

    pub fn upload_static<A: GpuApi>(&self, api: &mut A, vertices: &[StaticVertex]) {
        api.buffer_data(
            self.static_vertices,
            bytemuck::cast_slice(vertices),
            BufferUsage::Dynamic,
        );
    }

    pub fn upload_dynamic<A: GpuApi>(&self, api: &mut A, vertices: &[DynamicVertex]) {
        api.buffer_data(
            self.dynamic_vertices,
            bytemuck::cast_slice(vertices),
            BufferUsage::Stream,
        );
    }

    pub fn upload_indices<A: GpuApi>(&self, api: &mut A, indices: &[u16]) {
        api.buffer_data(self.indices, bytemuck::cast_slice(indices), BufferUsage::Dynamic);
    }

    /// Deletes all three buffers, index buffer first.
    pub fn release<A: GpuApi>(self, api: &mut A) {
        api.delete_buffer(self.indices);
        api.delete_buffer(self.dynamic_vertices);
        api.delete_buffer(self.static_vertices);
    }
}
