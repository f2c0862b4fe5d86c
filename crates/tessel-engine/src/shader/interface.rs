//! Shader interface reflection.
//!
//! WGSL has no name-based slot queries at run time, so compilation and
//! linking are modeled on naga's IR: a stage "compiles" when it parses and
//! validates, and a program "links" when every fragment input is written by
//! the vertex stage and shared resource bindings agree. Slot lookups by name
//! are answered from the reflected interface.

use wgpu::naga;

use crate::device::{AttributeSlot, ShaderStage, UniformSlot};

/// A user-defined `@location` input or output of an entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Varying {
    pub name: String,
    pub location: u32,
    ty: naga::TypeInner,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    /// `var<uniform>`; `size` is the block size in bytes.
    UniformBlock { size: u32 },
    Texture,
    Sampler,
}

/// A bound global (`@group(g) @binding(b)`) declared by a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
    /// Block members as `(name, byte offset)`; empty unless a uniform block.
    pub members: Vec<(String, u32)>,
}

/// Reflected interface of one compiled stage.
#[derive(Debug, Clone)]
pub struct StageInterface {
    stage: ShaderStage,
    entry_point: String,
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    resources: Vec<Resource>,
}

impl StageInterface {
    /// Parses and validates `source`, then reflects its single entry point
    /// for `stage`.
    ///
    /// `Err` carries the rendered compiler diagnostic.
    pub fn compile(stage: ShaderStage, source: &str) -> Result<Self, String> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

        let wanted = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        let mut candidates = module.entry_points.iter().filter(|ep| ep.stage == wanted);
        let entry = candidates
            .next()
            .ok_or_else(|| format!("error: no @{stage} entry point"))?;
        if candidates.next().is_some() {
            return Err(format!("error: more than one @{stage} entry point"));
        }

        let mut inputs = Vec::new();
        for arg in &entry.function.arguments {
            collect_varyings(&module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut inputs);
        }

        let mut outputs = Vec::new();
        if let Some(result) = &entry.function.result {
            collect_varyings(&module, None, result.ty, result.binding.as_ref(), &mut outputs);
        }

        Ok(Self {
            stage,
            entry_point: entry.name.clone(),
            inputs,
            outputs,
            resources: collect_resources(&module),
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn inputs(&self) -> &[Varying] {
        &self.inputs
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}

/// A resource of a linked program together with the stages that declare it.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedResource {
    pub resource: Resource,
    pub vertex: bool,
    pub fragment: bool,
}

/// Reflected interface of a linked vertex + fragment pair.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    attributes: Vec<Varying>,
    resources: Vec<LinkedResource>,
    vertex_entry: String,
    fragment_entry: String,
}

impl ProgramInterface {
    /// Matches the vertex outputs against the fragment inputs and merges the
    /// resource declarations of both stages.
    ///
    /// `Err` carries the linker log, one line per problem.
    pub fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<Self, String> {
        let mut log = Vec::new();

        if vertex.stage != ShaderStage::Vertex {
            log.push(format!("error: {} shader attached as the vertex stage", vertex.stage));
        }
        if fragment.stage != ShaderStage::Fragment {
            log.push(format!("error: {} shader attached as the fragment stage", fragment.stage));
        }

        for input in &fragment.inputs {
            match vertex.outputs.iter().find(|o| o.location == input.location) {
                None => log.push(format!(
                    "error: fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )),
                Some(output) if output.ty != input.ty => log.push(format!(
                    "error: fragment input `{}` at location {} does not match the type of vertex output `{}`",
                    input.name, input.location, output.name
                )),
                Some(_) => {}
            }
        }

        let mut resources: Vec<LinkedResource> = Vec::new();
        for (res, is_vertex) in vertex
            .resources
            .iter()
            .map(|r| (r, true))
            .chain(fragment.resources.iter().map(|r| (r, false)))
        {
            let existing = resources
                .iter()
                .position(|l| l.resource.group == res.group && l.resource.binding == res.binding);
            match existing {
                Some(i) if resources[i].resource.kind != res.kind => log.push(format!(
                    "error: binding @group({}) @binding({}) is declared as `{}` and as `{}` with different types",
                    res.group, res.binding, resources[i].resource.name, res.name
                )),
                Some(i) => {
                    resources[i].vertex |= is_vertex;
                    resources[i].fragment |= !is_vertex;
                }
                None => resources.push(LinkedResource {
                    resource: res.clone(),
                    vertex: is_vertex,
                    fragment: !is_vertex,
                }),
            }
        }

        if !log.is_empty() {
            return Err(log.join("\n"));
        }

        resources.sort_by_key(|l| (l.resource.group, l.resource.binding));

        Ok(Self {
            attributes: vertex.inputs.clone(),
            resources,
            vertex_entry: vertex.entry_point.clone(),
            fragment_entry: fragment.entry_point.clone(),
        })
    }

    pub fn attribute_location(&self, name: &str) -> Option<AttributeSlot> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| AttributeSlot(a.location))
    }

    /// Resolves a uniform block member, or a whole resource, by name.
    pub fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        self.resources.iter().find_map(|l| {
            let res = &l.resource;
            let offset = if res.name == name {
                Some(0)
            } else {
                res.members
                    .iter()
                    .find(|(member, _)| member == name)
                    .map(|&(_, offset)| offset)
            };
            offset.map(|offset| UniformSlot {
                group: res.group,
                binding: res.binding,
                offset,
            })
        })
    }

    pub fn resources(&self) -> &[LinkedResource] {
        &self.resources
    }

    pub fn attributes(&self) -> &[Varying] {
        &self.attributes
    }

    pub fn vertex_entry(&self) -> &str {
        &self.vertex_entry
    }

    pub fn fragment_entry(&self) -> &str {
        &self.fragment_entry
    }
}

fn collect_varyings(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(Varying {
            name: name.unwrap_or_default().to_owned(),
            location: *location,
            ty: module.types[ty].inner.clone(),
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_varyings(module, m.name.as_deref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn collect_resources(module: &naga::Module) -> Vec<Resource> {
    let mut out = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else { continue };
        let name = var.name.clone().unwrap_or_default();
        let inner = &module.types[var.ty].inner;

        let (kind, members) = match (var.space, inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => (
                ResourceKind::UniformBlock { size: *span },
                members
                    .iter()
                    .map(|m| (m.name.clone().unwrap_or_default(), m.offset))
                    .collect(),
            ),
            (naga::AddressSpace::Uniform, other) => (
                ResourceKind::UniformBlock {
                    size: plain_size(other),
                },
                Vec::new(),
            ),
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => {
                (ResourceKind::Texture, Vec::new())
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => {
                (ResourceKind::Sampler, Vec::new())
            }
            _ => continue,
        };

        out.push(Resource {
            name,
            group: rb.group,
            binding: rb.binding,
            kind,
            members,
        });
    }

    out
}

/// Byte size of a non-struct uniform. Padded to 16 as uniform blocks are.
fn plain_size(inner: &naga::TypeInner) -> u32 {
    let raw = match inner {
        naga::TypeInner::Scalar(s) => s.width as u32,
        naga::TypeInner::Vector { size, scalar } => *size as u32 * scalar.width as u32,
        naga::TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => {
            let column = if *rows as u32 == 2 { 2 } else { 4 };
            *columns as u32 * column * scalar.width as u32
        }
        _ => 16,
    };
    raw.div_ceil(16) * 16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::source::{SPRITE_FRAGMENT, SPRITE_VERTEX};

    fn sprite_program() -> ProgramInterface {
        let vs = StageInterface::compile(ShaderStage::Vertex, SPRITE_VERTEX).unwrap();
        let fs = StageInterface::compile(ShaderStage::Fragment, SPRITE_FRAGMENT).unwrap();
        ProgramInterface::link(&vs, &fs).unwrap()
    }

    #[test]
    fn sprite_vertex_inputs_are_reflected() {
        let vs = StageInterface::compile(ShaderStage::Vertex, SPRITE_VERTEX).unwrap();
        let names: Vec<_> = vs.inputs().iter().map(|v| (v.name.as_str(), v.location)).collect();
        assert_eq!(
            names,
            [("corner", 0), ("texcoord", 1), ("position", 2), ("rotation", 3)]
        );
        assert_eq!(vs.entry_point(), "vs_main");
    }

    #[test]
    fn attribute_locations_resolve_by_name() {
        let program = sprite_program();
        assert_eq!(program.attribute_location("corner"), Some(AttributeSlot(0)));
        assert_eq!(program.attribute_location("rotation"), Some(AttributeSlot(3)));
        assert_eq!(program.attribute_location("color"), None);
    }

    #[test]
    fn uniform_block_members_resolve_to_offsets() {
        let program = sprite_program();
        let pos = program.uniform_location("camera_position").unwrap();
        let scale = program.uniform_location("camera_scale").unwrap();
        assert_eq!((pos.group, pos.binding, pos.offset), (0, 0, 0));
        assert_eq!((scale.group, scale.binding, scale.offset), (0, 0, 8));
    }

    #[test]
    fn texture_uniform_resolves_to_its_binding() {
        let program = sprite_program();
        let tex = program.uniform_location("texture_unit").unwrap();
        assert_eq!((tex.group, tex.binding, tex.offset), (0, 1, 0));
    }

    #[test]
    fn resources_record_visibility() {
        let program = sprite_program();
        let kinds: Vec<_> = program
            .resources()
            .iter()
            .map(|l| (l.resource.binding, l.resource.kind, l.vertex, l.fragment))
            .collect();
        assert_eq!(
            kinds,
            [
                (0, ResourceKind::UniformBlock { size: 16 }, true, false),
                (1, ResourceKind::Texture, false, true),
                (2, ResourceKind::Sampler, false, true),
            ]
        );
    }

    #[test]
    fn syntax_error_reports_compiler_log() {
        let err = StageInterface::compile(ShaderStage::Vertex, "fn vs_main( {").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let err = StageInterface::compile(ShaderStage::Fragment, SPRITE_VERTEX).unwrap_err();
        assert!(err.contains("no @fragment entry point"), "{err}");
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fragment = r#"
            struct FragmentInput {
                @location(0) texcoord: vec2<f32>,
                @location(1) tint: vec4<f32>,
            }

            @fragment
            fn fs_main(input: FragmentInput) -> @location(0) vec4<f32> {
                return input.tint * vec4<f32>(input.texcoord, 0.0, 1.0);
            }
        "#;
        let vs = StageInterface::compile(ShaderStage::Vertex, SPRITE_VERTEX).unwrap();
        let fs = StageInterface::compile(ShaderStage::Fragment, fragment).unwrap();
        let log = ProgramInterface::link(&vs, &fs).unwrap_err();
        assert_eq!(
            log,
            "error: fragment input `tint` at location 1 is not written by the vertex stage"
        );
    }

    #[test]
    fn mismatched_varying_type_fails_to_link() {
        let fragment = r#"
            @fragment
            fn fs_main(@location(0) texcoord: vec4<f32>) -> @location(0) vec4<f32> {
                return texcoord;
            }
        "#;
        let vs = StageInterface::compile(ShaderStage::Vertex, SPRITE_VERTEX).unwrap();
        let fs = StageInterface::compile(ShaderStage::Fragment, fragment).unwrap();
        let log = ProgramInterface::link(&vs, &fs).unwrap_err();
        assert!(log.contains("does not match the type"), "{log}");
    }
}
