use super::buffers::GeometryBuffers;
use super::cadence::UploadCadence;
use super::grid::GridTopology;
use super::vertex::{DynamicVertex, StaticVertex};
use crate::atlas::Atlas;
use crate::coords::Vec2;
use crate::device::{GpuApi, TextureId};
use crate::error::TransientGraphicsError;
use crate::shader::ShaderProgram;
use crate::time::AnimationClock;

/// Texture unit the atlas is bound to.
const ATLAS_UNIT: u32 = 0;

/// Host state read once at the start of a frame.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameInput {
    /// World-space point at the centre of the view.
    pub camera: Vec2,
    /// Base rotation added to every sprite, radians.
    pub rotation: f32,
    pub frame_index: u64,
}

/// What happened while drawing one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameResult {
    /// `false` when the frame was skipped (empty drawable, or no core).
    pub drawn: bool,
    pub static_uploaded: bool,
    /// GPU errors drained at checkpoints. Rendering continued past them.
    pub errors: Vec<TransientGraphicsError>,
}

impl FrameResult {
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// GPU objects a frame is drawn with; owned by the render core.
pub struct FrameTargets<'a> {
    pub program: &'a ShaderProgram,
    pub buffers: &'a GeometryBuffers,
    pub texture: TextureId,
    pub atlas: &'a Atlas,
}

/// Per-frame driver: fills vertex data, decides uploads, binds and draws.
///
/// Holds the CPU mirrors and the animation clock, both of which outlive any
/// one context.
#[derive(Debug)]
pub struct FrameComposer {
    grid: GridTopology,
    cadence: UploadCadence,
    clock: AnimationClock,
    clear_color: [f32; 4],

    static_vertices: Vec<StaticVertex>,
    dynamic_vertices: Vec<DynamicVertex>,
    indices: Vec<u16>,
}

impl FrameComposer {
    pub fn new(
        grid: GridTopology,
        cadence: UploadCadence,
        clock: AnimationClock,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            grid,
            cadence,
            clock,
            clear_color,
            static_vertices: Vec::with_capacity(grid.vertex_count()),
            dynamic_vertices: Vec::with_capacity(grid.vertex_count()),
            indices: Vec::with_capacity(grid.index_count()),
        }
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    /// Draws and presents one frame.
    ///
    /// `first_on_context` forces the static upload; buffers of a fresh
    /// context are empty.
    pub fn compose<A: GpuApi>(
        &mut self,
        api: &mut A,
        targets: &FrameTargets<'_>,
        input: &FrameInput,
        first_on_context: bool,
    ) -> FrameResult {
        let Some(scale) = api.drawable_size().camera_scale() else {
            log::trace!("frame {} skipped: empty drawable", input.frame_index);
            return FrameResult::skipped();
        };

        let mut result = FrameResult {
            drawn: true,
            ..FrameResult::default()
        };
        let bindings = targets.program.bindings();

        api.clear(self.clear_color);
        api.use_program(targets.program.id());
        checkpoint(api, "use program", &mut result.errors);

        if let Some(slot) = bindings.camera_position {
            api.uniform_vec2(slot, input.camera.to_array());
        }
        if let Some(slot) = bindings.camera_scale {
            api.uniform_vec2(slot, scale.to_array());
        }
        api.bind_texture(ATLAS_UNIT, targets.texture);
        if let Some(slot) = bindings.texture_unit {
            api.uniform_texture_unit(slot, ATLAS_UNIT);
        }
        checkpoint(api, "set uniforms", &mut result.errors);

        let t = self.clock.advance();
        self.grid
            .fill_dynamic(input.rotation, t, &mut self.dynamic_vertices);

        if self.cadence.static_due(input.frame_index, first_on_context) {
            match targets.atlas.location(0) {
                Some(sprite) => {
                    self.grid.fill_static(&sprite, &mut self.static_vertices);
                    self.grid.fill_indices(&mut self.indices);
                    targets.buffers.upload_static(api, &self.static_vertices);
                    targets.buffers.upload_indices(api, &self.indices);
                    result.static_uploaded = true;
                    log::debug!(
                        "frame {}: uploaded {} static vertices, {} indices",
                        input.frame_index,
                        self.static_vertices.len(),
                        self.indices.len()
                    );
                }
                None => log::warn!("atlas has no sprite 0; static data not refreshed"),
            }
        }

        targets
            .buffers
            .upload_dynamic(api, &self.dynamic_vertices);
        checkpoint(api, "upload vertex data", &mut result.errors);

        let static_buffer = targets.buffers.static_vertices();
        let dynamic_buffer = targets.buffers.dynamic_vertices();
        let pointers = [
            (bindings.corner, static_buffer, StaticVertex::CORNER),
            (bindings.texcoord, static_buffer, StaticVertex::TEXCOORD),
            (bindings.position, dynamic_buffer, DynamicVertex::POSITION),
            (bindings.rotation, dynamic_buffer, DynamicVertex::ROTATION),
        ];
        for (slot, buffer, pointer) in pointers {
            if let Some(slot) = slot {
                api.vertex_attrib_pointer(slot, buffer, pointer);
            }
        }
        checkpoint(api, "bind attributes", &mut result.errors);

        let slots = bindings.attributes();
        for slot in slots.iter().flatten() {
            api.enable_attribute(*slot);
        }
        api.draw_indexed(targets.buffers.indices(), self.indices.len() as u32);
        for slot in slots.iter().rev().flatten() {
            api.disable_attribute(*slot);
        }
        checkpoint(api, "draw", &mut result.errors);

        api.present();
        checkpoint(api, "present", &mut result.errors);

        result
    }
}

/// Drains the device error queue, logging each entry under `label`.
fn checkpoint<A: GpuApi>(api: &mut A, label: &'static str, out: &mut Vec<TransientGraphicsError>) {
    while let Some(message) = api.poll_error() {
        log::warn!("{label}: {message}");
        out.push(TransientGraphicsError { label, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::DrawableSize;
    use crate::device::recording::{Call, RecordingDevice};
    use crate::device::{AttributeSlot, BufferUsage};
    use crate::shader::source::{SPRITE_FRAGMENT, SPRITE_VERTEX};

    struct Fixture {
        api: RecordingDevice,
        program: ShaderProgram,
        buffers: GeometryBuffers,
        texture: TextureId,
        atlas: Atlas,
        composer: FrameComposer,
    }

    impl Fixture {
        fn new(side: u32) -> Self {
            Self::with_shaders(side, SPRITE_VERTEX, SPRITE_FRAGMENT)
        }

        fn with_shaders(side: u32, vertex: &str, fragment: &str) -> Self {
            let mut api = RecordingDevice::new();
            let program = ShaderProgram::create(&mut api, vertex, fragment).unwrap();
            let buffers = GeometryBuffers::create(&mut api).unwrap();
            let atlas = Atlas::placeholder(8);
            let texture = api.create_texture(atlas.image()).unwrap();
            let composer = FrameComposer::new(
                GridTopology::new(side).unwrap(),
                UploadCadence::default(),
                AnimationClock::default(),
                [1.0; 4],
            );
            Self {
                api,
                program,
                buffers,
                texture,
                atlas,
                composer,
            }
        }

        fn frame(&mut self, frame_index: u64, first: bool) -> FrameResult {
            let targets = FrameTargets {
                program: &self.program,
                buffers: &self.buffers,
                texture: self.texture,
                atlas: &self.atlas,
            };
            let input = FrameInput {
                camera: Vec2::new(0.25, -0.5),
                rotation: 0.0,
                frame_index,
            };
            self.composer.compose(&mut self.api, &targets, &input, first)
        }
    }

    #[test]
    fn steps_run_in_order() {
        let mut fx = Fixture::new(10);
        fx.frame(0, true);

        let l = fx.api.ledger();
        let at = |pred: fn(&Call) -> bool| l.position(pred).unwrap();
        let clear = at(|c| matches!(c, Call::Clear(_)));
        let use_program = at(|c| matches!(c, Call::UseProgram(_)));
        let uniform = at(|c| matches!(c, Call::UniformVec2 { .. }));
        let texture = at(|c| matches!(c, Call::BindTexture { .. }));
        let upload = at(|c| matches!(c, Call::BufferData { .. }));
        let pointer = at(|c| matches!(c, Call::VertexAttribPointer { .. }));
        let draw = at(|c| matches!(c, Call::DrawIndexed { .. }));
        let present = at(|c| matches!(c, Call::Present));

        assert!(clear < use_program);
        assert!(use_program < uniform);
        assert!(uniform < texture);
        assert!(texture < upload);
        assert!(upload < pointer);
        assert!(pointer < draw);
        assert!(draw < present);
        assert_eq!(l.calls.last(), Some(&Call::Present));
    }

    #[test]
    fn camera_uniforms_use_drawable_aspect() {
        let mut fx = Fixture::new(10);
        fx.frame(0, true);

        let l = fx.api.ledger();
        let values: Vec<[f32; 2]> = l
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UniformVec2 { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![[0.25, -0.5], [0.75, -1.0]]);
    }

    #[test]
    fn draw_sees_all_four_attributes_then_they_are_disabled() {
        let mut fx = Fixture::new(10);
        let result = fx.frame(0, true);
        assert!(result.drawn);
        assert!(result.errors.is_empty());

        let l = fx.api.ledger();
        let draw = l
            .calls
            .iter()
            .find(|c| matches!(c, Call::DrawIndexed { .. }))
            .cloned()
            .unwrap();
        assert_eq!(
            draw,
            Call::DrawIndexed {
                indices: fx.buffers.indices(),
                count: 600,
                enabled: (0..4).map(AttributeSlot).collect(),
            }
        );
        assert!(l.enabled.is_empty());
    }

    #[test]
    fn index_buffer_matches_grid() {
        let mut fx = Fixture::new(10);
        fx.frame(0, true);

        let l = fx.api.ledger();
        let bytes = &l.buffer_contents[&fx.buffers.indices()];
        let indices: &[u16] = bytemuck::cast_slice(bytes);
        assert_eq!(indices.len(), 600);
        assert_eq!(&indices[..6], &[0, 1, 2, 2, 1, 3]);
        assert_eq!(indices.iter().copied().max(), Some(399));
    }

    #[test]
    fn static_data_follows_cadence_dynamic_every_frame() {
        let mut fx = Fixture::new(4);
        let mut static_frames = 0;
        for f in 0..=999 {
            if fx.frame(f, f == 0).static_uploaded {
                static_frames += 1;
            }
        }
        assert_eq!(static_frames, 10);

        let l = fx.api.ledger();
        let dynamic = l.count(|c| {
            matches!(c, Call::BufferData { usage: BufferUsage::Stream, .. })
        });
        let index_uploads = l.count(|c| {
            matches!(c, Call::BufferData { buffer, .. } if *buffer == fx.buffers.indices())
        });
        assert_eq!(dynamic, 1000);
        assert_eq!(index_uploads, 10);
    }

    #[test]
    fn first_frame_on_context_uploads_off_cadence() {
        let mut fx = Fixture::new(4);
        assert!(fx.frame(457, true).static_uploaded);
        assert!(!fx.frame(458, false).static_uploaded);
    }

    #[test]
    fn empty_drawable_skips_without_touching_the_device() {
        let mut fx = Fixture::new(4);
        fx.api.ledger_mut().drawable = DrawableSize::new(800, 0);
        let before = fx.api.ledger().calls.len();

        let result = fx.frame(0, true);
        assert_eq!(result, FrameResult::skipped());
        assert_eq!(fx.api.ledger().calls.len(), before);
        assert_eq!(fx.composer.clock().now(), 0.0);
    }

    #[test]
    fn checkpoint_errors_are_labelled_and_rendering_continues() {
        let mut fx = Fixture::new(4);
        fx.api
            .ledger_mut()
            .queued_errors
            .push_back("invalid operation".to_owned());

        let result = fx.frame(0, true);
        assert_eq!(
            result.errors,
            vec![TransientGraphicsError {
                label: "use program",
                message: "invalid operation".to_owned(),
            }]
        );
        assert_eq!(fx.api.ledger().calls.last(), Some(&Call::Present));
    }

    #[test]
    fn unused_slots_are_skipped() {
        let vertex = r#"
            struct Camera {
                camera_position: vec2<f32>,
                camera_scale: vec2<f32>,
            }
            @group(0) @binding(0) var<uniform> camera: Camera;

            struct VertexOutput {
                @builtin(position) clip_position: vec4<f32>,
                @location(0) texcoord: vec2<f32>,
            }

            @vertex
            fn vs_main(
                @location(0) corner: vec2<f32>,
                @location(1) texcoord: vec2<f32>,
                @location(2) position: vec2<f32>,
            ) -> VertexOutput {
                var out: VertexOutput;
                out.clip_position = vec4<f32>((corner + position) * camera.camera_scale, 0.0, 1.0);
                out.texcoord = texcoord;
                return out;
            }
        "#;
        let mut fx = Fixture::with_shaders(4, vertex, SPRITE_FRAGMENT);
        assert_eq!(fx.program.bindings().rotation, None);

        let result = fx.frame(0, true);
        assert!(result.drawn);

        let l = fx.api.ledger();
        assert_eq!(l.count(|c| matches!(c, Call::VertexAttribPointer { .. })), 3);
        assert_eq!(l.count(|c| matches!(c, Call::EnableAttribute(_))), 3);
        assert!(l.enabled.is_empty());
    }
}
