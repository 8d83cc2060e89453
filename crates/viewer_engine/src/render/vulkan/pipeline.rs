//! Fixed graphics pipeline objects
//!
//! Pipeline layout, render pass and graphics pipeline for the viewer's
//! single color subpass. Shader bytecode is precompiled SPIR-V loaded from
//! disk; the shader modules only live for the duration of the pipeline
//! create call.

use std::ffi::CStr;
use std::fs::File;
use std::path::Path;

use ash::util::read_spv;
use ash::vk;

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Location of the precompiled vertex shader, relative to the working
/// directory of the running executable.
pub const VERTEX_SHADER_PATH: &str = "../shaders/vert.spv";
/// Location of the precompiled fragment shader.
pub const FRAGMENT_SHADER_PATH: &str = "../shaders/frag.spv";

/// Read a SPIR-V binary whole and wrap it in a shader module.
fn create_shader_module(device: &ash::Device, path: &Path) -> VulkanResult<vk::ShaderModule> {
    let mut file = File::open(path).map_err(|source| VulkanError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let code = read_spv(&mut file).map_err(|source| VulkanError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(VulkanError::driver("vkCreateShaderModule"))
}

/// Create the empty pipeline layout.
///
/// The viewer pipeline takes no descriptor sets and no push constants.
pub(crate) fn create_pipeline_layout(device: &ash::Device) -> VulkanResult<vk::PipelineLayout> {
    let create_info = vk::PipelineLayoutCreateInfo::builder();
    unsafe { device.create_pipeline_layout(&create_info, None) }
        .map_err(VulkanError::driver("vkCreatePipelineLayout"))
}

/// Create the render pass: one color attachment in the swapchain format,
/// cleared on load, stored on save, left in present-ready layout.
pub(crate) fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
) -> VulkanResult<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .build()];

    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses);

    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(VulkanError::driver("vkCreateRenderPass"))
}

/// Create the graphics pipeline with the viewer's fixed state block.
///
/// No vertex input, triangle-list topology, one dynamic viewport and one
/// dynamic scissor (values supplied at draw time), back-face culling with
/// clockwise front face, no multisampling, alpha blending on the single
/// color attachment.
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> VulkanResult<vk::Pipeline> {
    let vert_module = create_shader_module(device, Path::new(VERTEX_SHADER_PATH))?;
    let frag_module = match create_shader_module(device, Path::new(FRAGMENT_SHADER_PATH)) {
        Ok(module) => module,
        Err(err) => {
            unsafe { device.destroy_shader_module(vert_module, None) };
            return Err(err);
        }
    };

    let entry_point = CStr::from_bytes_with_nul(b"main\0").unwrap();
    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(entry_point)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(entry_point)
            .build(),
    ];

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder();
    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

    // Viewport and scissor are dynamic; only the counts are baked in.
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .line_width(1.0);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .build()];
    let color_blend_state =
        vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let result = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    };

    // The modules are only needed for the create call.
    unsafe {
        device.destroy_shader_module(frag_module, None);
        device.destroy_shader_module(vert_module, None);
    }

    match result {
        Ok(pipelines) => Ok(pipelines[0]),
        Err((_, result)) => Err(VulkanError::Driver {
            call: "vkCreateGraphicsPipelines",
            result,
        }),
    }
}
