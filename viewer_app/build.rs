// Compiles the viewer's GLSL shaders to SPIR-V with glslc from the
// Vulkan SDK. Output lands in the workspace shaders/ directory under the
// stage name (vert.spv, frag.spv), which is where the pipeline loader
// looks at run time.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };
    if !Path::new(&glslc).exists() {
        eprintln!("error: glslc not found at: {}", glslc);
        panic!("Shader compiler not found");
    }

    let shader_dir = PathBuf::from("../shaders");
    for stage in ["vert", "frag"] {
        let source = shader_dir.join(format!("shader.{}", stage));
        let output = shader_dir.join(format!("{}.spv", stage));

        let status = Command::new(&glslc)
            .arg(&source)
            .arg("-o")
            .arg(&output)
            .status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?} -> {:?}", source, output);
            }
            Ok(s) => {
                eprintln!(
                    "error: glslc failed for {:?} with exit code: {}",
                    source,
                    s.code().unwrap_or(-1)
                );
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", source, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }
}
