use std::path::Path;
use std::path::PathBuf;

use eyre::eyre;
use tracing::info;
use tracing::warn;
use windows::core::s;
use windows::core::HSTRING;
use windows::core::PCSTR;
use windows::Win32::Foundation::FALSE;
use windows::Win32::Foundation::TRUE;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::swapchain::BACK_BUFFER_FORMAT;
use super::swapchain::DEPTH_STENCIL_FORMAT;
use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::scene::FillMode;

const SHADER_FILE: &str = "shaders.hlsl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub fill_mode: FillMode,
    pub depth: bool,
}

/// Root signature and pipeline state for the lit mesh shader.
pub struct MeshPipeline {
    pub root_signature: ID3D12RootSignature,
    pub state: ID3D12PipelineState,
    pub options: PipelineOptions,
    vertex_shader: ID3DBlob,
    pixel_shader: ID3DBlob,
}

impl MeshPipeline {
    pub fn new(device: &ID3D12Device, options: PipelineOptions) -> FrameResult<Self> {
        let path = shader_path()?;
        let flags = if cfg!(debug_assertions) {
            D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
        } else {
            0
        };
        let vertex_shader = compile_shader(&path, s!("VSMain"), s!("vs_5_0"), flags)?;
        let pixel_shader = compile_shader(&path, s!("PSMain"), s!("ps_5_0"), flags)?;
        let root_signature = create_root_signature(device)?;
        let state =
            create_pipeline_state(device, &root_signature, &vertex_shader, &pixel_shader, options)?;
        info!(?options, "pipeline built");
        Ok(Self {
            root_signature,
            state,
            options,
            vertex_shader,
            pixel_shader,
        })
    }

    /// Replaces the pipeline state, reusing the compiled shaders. The caller
    /// must have drained the GPU, since the old state may still be referenced.
    pub fn rebuild(&mut self, device: &ID3D12Device, options: PipelineOptions) -> FrameResult<()> {
        self.state = create_pipeline_state(
            device,
            &self.root_signature,
            &self.vertex_shader,
            &self.pixel_shader,
            options,
        )?;
        self.options = options;
        info!(?options, "pipeline rebuilt");
        Ok(())
    }
}

/// `shaders.hlsl` next to the executable, falling back to the crate sources
/// during development.
fn shader_path() -> FrameResult<PathBuf> {
    let exe = std::env::current_exe()?;
    let beside_exe = exe.parent().map(|dir| dir.join(SHADER_FILE));
    if let Some(path) = beside_exe.as_ref().filter(|path| path.exists()) {
        return Ok(path.clone());
    }
    let fallback = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(SHADER_FILE);
    if fallback.exists() {
        warn!(path = %fallback.display(), "{SHADER_FILE} not found next to executable, using source copy");
        return Ok(fallback);
    }
    Err(eyre!(
        "{SHADER_FILE} not found next to executable ({}) or in {}",
        beside_exe.unwrap_or_default().display(),
        fallback.display()
    )
    .into())
}

fn blob_text(blob: &ID3DBlob) -> String {
    let bytes = unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
    };
    String::from_utf8_lossy(bytes).trim_end_matches('\0').trim().to_owned()
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

/// Compiles one entry point. Failures carry the compiler's diagnostic text.
pub fn compile_shader(path: &Path, entry_point: PCSTR, target: PCSTR, flags: u32) -> FrameResult<ID3DBlob> {
    let hlsl_path = HSTRING::from(path.as_os_str());
    let mut shader = None;
    let mut errors = None;
    let result = unsafe {
        D3DCompileFromFile(
            &hlsl_path,
            None,
            None,
            entry_point,
            target,
            flags,
            0,
            &mut shader,
            Some(&mut errors),
        )
    };
    let entry = unsafe { String::from_utf8_lossy(entry_point.as_bytes()).into_owned() };
    if let Err(error) = result {
        let diagnostics = errors.as_ref().map(blob_text).unwrap_or_default();
        return Err(eyre!(
            "shader {entry} in {} failed to compile ({}): {diagnostics}",
            path.display(),
            error.message()
        )
        .into());
    }
    shader.ok_or_else(|| eyre!("D3DCompileFromFile produced no bytecode for {entry}").into())
}

/// One root constant buffer view at `b0`, visible to every stage.
fn create_root_signature(device: &ID3D12Device) -> FrameResult<ID3D12RootSignature> {
    let parameters = [D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            Descriptor: D3D12_ROOT_DESCRIPTOR {
                ShaderRegister: 0,
                RegisterSpace: 0,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }];
    let desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        ..Default::default()
    };

    let mut signature = None;
    let mut errors = None;
    let result = unsafe {
        D3D12SerializeRootSignature(&desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, Some(&mut errors))
    };
    if let Err(error) = result {
        let diagnostics = errors.as_ref().map(blob_text).unwrap_or_default();
        return Err(eyre!("root signature serialization failed ({}): {diagnostics}", error.message()).into());
    }
    let signature = signature.ok_or_else(|| eyre!("D3D12SerializeRootSignature produced no blob"))?;
    unsafe { device.CreateRootSignature(0, blob_bytes(&signature)) }.during("CreateRootSignature")
}

fn create_pipeline_state(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
    vertex_shader: &ID3DBlob,
    pixel_shader: &ID3DBlob,
    options: PipelineOptions,
) -> FrameResult<ID3D12PipelineState> {
    let input_element_descs = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("POSITION"),
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            ..Default::default()
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: s!("NORMAL"),
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            AlignedByteOffset: 12,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            ..Default::default()
        },
    ];

    let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
    rtv_formats[0] = BACK_BUFFER_FORMAT;

    let desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: unsafe { std::mem::transmute_copy(root_signature) },
        VS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { vertex_shader.GetBufferPointer() },
            BytecodeLength: unsafe { vertex_shader.GetBufferSize() },
        },
        PS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { pixel_shader.GetBufferPointer() },
            BytecodeLength: unsafe { pixel_shader.GetBufferSize() },
        },
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: input_element_descs.as_ptr(),
            NumElements: input_element_descs.len() as u32,
        },
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: match options.fill_mode {
                FillMode::Solid => D3D12_FILL_MODE_SOLID,
                FillMode::Wireframe => D3D12_FILL_MODE_WIREFRAME,
            },
            CullMode: match options.fill_mode {
                FillMode::Solid => D3D12_CULL_MODE_BACK,
                FillMode::Wireframe => D3D12_CULL_MODE_NONE,
            },
            FrontCounterClockwise: FALSE,
            DepthClipEnable: TRUE,
            ..Default::default()
        },
        BlendState: D3D12_BLEND_DESC {
            AlphaToCoverageEnable: FALSE,
            IndependentBlendEnable: FALSE,
            RenderTarget: [D3D12_RENDER_TARGET_BLEND_DESC {
                BlendEnable: FALSE,
                RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
                ..Default::default()
            }; 8],
        },
        DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: if options.depth { TRUE } else { FALSE },
            DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            StencilEnable: FALSE,
            ..Default::default()
        },
        SampleMask: u32::MAX,
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        RTVFormats: rtv_formats,
        DSVFormat: if options.depth {
            DEPTH_STENCIL_FORMAT
        } else {
            DXGI_FORMAT_UNKNOWN
        },
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        ..Default::default()
    };

    unsafe { device.CreateGraphicsPipelineState(&desc) }.during("CreateGraphicsPipelineState")
}
