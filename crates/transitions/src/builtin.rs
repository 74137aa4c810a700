use crate::descriptor::TransitionDescriptor;

/// Passes the quad through and hands texture coordinates to the fragment
/// stage. Attribute names match the bindings the renderer resolves.
pub const QUAD_VERTEX_SHADER: &str = r#"
attribute vec4 a_Position;
attribute vec2 a_TexCoord;
varying vec2 v_TexCoord;

void main() {
    gl_Position = a_Position;
    v_TexCoord = a_TexCoord;
}
"#;

const FADE_FRAGMENT_SHADER: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif
uniform sampler2D u_Sampler;
uniform sampler2D u_Sampler1;
uniform vec4 u_color;
uniform float progress;
varying vec2 v_TexCoord;

void main() {
    vec4 from = texture2D(u_Sampler1, v_TexCoord);
    vec4 to = texture2D(u_Sampler, v_TexCoord);
    gl_FragColor = mix(from, to, progress) * u_color;
}
"#;

/// Plain linear crossfade.
pub fn crossfade() -> TransitionDescriptor {
    TransitionDescriptor::new(QUAD_VERTEX_SHADER, FADE_FRAGMENT_SHADER).with_name("crossfade")
}
