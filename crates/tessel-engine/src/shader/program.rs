use crate::device::{AttributeSlot, GpuApi, ProgramId, ShaderStage, UniformSlot};
use crate::error::ShaderError;

/// Slots resolved once at link time.
///
/// `None` is the "unused" sentinel: the program has no active slot with that
/// name. Writers must treat it as a no-op.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    pub camera_position: Option<UniformSlot>,
    pub camera_scale: Option<UniformSlot>,
    pub texture_unit: Option<UniformSlot>,

    // Static attributes: change only with the atlas layout or grid topology.
    pub corner: Option<AttributeSlot>,
    pub texcoord: Option<AttributeSlot>,

    // Dynamic attributes: rewritten every frame.
    pub position: Option<AttributeSlot>,
    pub rotation: Option<AttributeSlot>,
}

impl BindingTable {
    fn resolve<A: GpuApi>(api: &A, program: ProgramId) -> Self {
        let uniform = |name: &str| {
            let slot = api.uniform_location(program, name);
            if slot.is_none() {
                log::warn!("shader program has no active uniform `{name}`");
            }
            slot
        };
        let attribute = |name: &str| {
            let slot = api.attribute_location(program, name);
            if slot.is_none() {
                log::warn!("shader program has no active attribute `{name}`");
            }
            slot
        };

        Self {
            camera_position: uniform("camera_position"),
            camera_scale: uniform("camera_scale"),
            texture_unit: uniform("texture_unit"),
            corner: attribute("corner"),
            texcoord: attribute("texcoord"),
            position: attribute("position"),
            rotation: attribute("rotation"),
        }
    }

    /// The four attribute slots, in enable order.
    pub fn attributes(&self) -> [Option<AttributeSlot>; 4] {
        [self.corner, self.texcoord, self.position, self.rotation]
    }
}

/// A linked vertex + fragment program and its binding table.
///
/// Owned by the render core; [`ShaderProgram::release`] must run before the
/// context that created it is dropped.
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    bindings: BindingTable,
}

impl ShaderProgram {
    /// Compiles both stages, links them and resolves the binding table.
    ///
    /// Stage objects are deleted once linking has been attempted, whatever
    /// the outcome.
    pub fn create<A: GpuApi>(
        api: &mut A,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = api
            .compile_shader(ShaderStage::Vertex, vertex_source)
            .map_err(|log| ShaderError::Compile {
                stage: ShaderStage::Vertex,
                log,
            })?;

        let fragment = match api.compile_shader(ShaderStage::Fragment, fragment_source) {
            Ok(id) => id,
            Err(log) => {
                api.delete_shader(vertex);
                return Err(ShaderError::Compile {
                    stage: ShaderStage::Fragment,
                    log,
                });
            }
        };

        let linked = api.link_program(vertex, fragment);
        api.delete_shader(vertex);
        api.delete_shader(fragment);

        let id = linked.map_err(|log| ShaderError::Link { log })?;
        let bindings = BindingTable::resolve(api, id);

        log::debug!("linked shader program {}", id.raw());

        Ok(Self { id, bindings })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Deletes the GPU program.
    pub fn release<A: GpuApi>(self, api: &mut A) {
        api.delete_program(self.id);
    }
}
