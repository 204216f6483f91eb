/// Name of the foreign entry point every shader must define.
pub const ENTRY_POINT: &str = "mainImage";

/// Canonical prologue emitted ahead of user code.
///
/// The uniform block layout must match `FrameUniforms` in the renderer. The
/// fourth slot after `_iResolution` is packed by std140 into the same vec4
/// as `_iTime`.
const HEADER: &str = r"#version 450
precision highp float;

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 fragscope_color;

layout(std140, set = 0, binding = 0) uniform FrameUniforms {
    vec3 _iResolution;
    float _iTime;
    float _iTimeDelta;
    int _iFrame;
    vec2 _padding0;
    vec4 _iMouse;
    vec4 _iDate;
} fragscope_frame;

#define iResolution fragscope_frame._iResolution
#define iTime fragscope_frame._iTime
#define iTimeDelta fragscope_frame._iTimeDelta
#define iFrame fragscope_frame._iFrame
#define iMouse fragscope_frame._iMouse
#define iDate fragscope_frame._iDate

vec4 fragscope_FragCoord;
#define gl_FragCoord fragscope_FragCoord
";

/// Generated `main` that adapts the native fragment coordinate (top-left
/// origin) to the bottom-left origin the entry point expects.
const DISPATCHER: &str = r"void main() {
    #undef gl_FragCoord
    vec2 fragscope_native = gl_FragCoord.xy;
    #define gl_FragCoord fragscope_FragCoord

    vec2 fragscope_coord = vec2(fragscope_native.x, iResolution.y - fragscope_native.y);
    fragscope_FragCoord = vec4(fragscope_coord, 0.0, 1.0);

    vec4 fragscope_result = vec4(0.0);
    mainImage(fragscope_result, fragscope_coord);
    fragscope_color = fragscope_result;
}
";

/// Standard uniforms the dispatcher itself reads.
pub(crate) const DISPATCHER_USES: &str = "iResolution";

pub(crate) fn assemble(defines: &[String], body: &str, entry: &str) -> String {
    let mut program = String::with_capacity(
        HEADER.len() + DISPATCHER.len() + body.len() + entry.len() + defines.len() * 32,
    );
    program.push_str(HEADER);
    program.push('\n');
    for define in defines {
        program.push_str(define);
        program.push('\n');
    }
    push_block(&mut program, body);
    push_block(&mut program, entry);
    program.push('\n');
    program.push_str(DISPATCHER);
    program
}

fn push_block(program: &mut String, block: &str) {
    let trimmed = block.trim_matches('\n');
    if trimmed.trim().is_empty() {
        return;
    }
    program.push_str(trimmed);
    program.push('\n');
}
