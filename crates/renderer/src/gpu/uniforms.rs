use transitions::UniformAssignment;

use super::api::{GraphicsApi, UniformValue};

pub const PROGRESS_UNIFORM: &str = "progress";

/// Writes `progress` and the effect's own uniforms into the current program.
///
/// Locations are looked up on every call. Assignments whose value count has
/// no matching uniform call, or whose name the program does not declare, are
/// skipped.
pub fn bind_frame_uniforms<A: GraphicsApi>(
    api: &A,
    program: A::Program,
    progress: f32,
    assignments: &[UniformAssignment],
) {
    if let Some(location) = api.uniform_location(program, PROGRESS_UNIFORM) {
        api.set_uniform(&location, UniformValue::Float(progress));
    }

    for assignment in assignments {
        let Some(value) = UniformValue::from_slice(&assignment.values) else {
            continue;
        };
        if let Some(location) = api.uniform_location(program, &assignment.name) {
            api.set_uniform(&location, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::RecordingApi;

    #[test]
    fn dispatches_by_arity_and_skips_unknown() {
        let api = RecordingApi::new();
        let program = api.create_program().unwrap();
        let assignments = vec![
            UniformAssignment::new("count", [20.0]),
            UniformAssignment::new("direction", [0.0, 1.0]),
            UniformAssignment::new("tint", [0.1, 0.2, 0.3]),
            UniformAssignment::new("shadow", [0.0, 0.0, 0.0, 0.6]),
            UniformAssignment::new("matrix", [1.0; 9]),
            UniformAssignment::new("empty", Vec::new()),
        ];
        bind_frame_uniforms(&api, program, 0.25, &assignments);

        let writes = api.log().float_writes.clone();
        assert_eq!(
            writes,
            vec![
                ("progress".to_string(), UniformValue::Float(0.25)),
                ("count".to_string(), UniformValue::Float(20.0)),
                ("direction".to_string(), UniformValue::Vec2([0.0, 1.0])),
                ("tint".to_string(), UniformValue::Vec3([0.1, 0.2, 0.3])),
                ("shadow".to_string(), UniformValue::Vec4([0.0, 0.0, 0.0, 0.6])),
            ]
        );
    }

    #[test]
    fn looks_up_locations_every_frame() {
        let api = RecordingApi::new();
        let program = api.create_program().unwrap();
        let assignments = vec![UniformAssignment::new("amplitude", [100.0])];
        bind_frame_uniforms(&api, program, 0.0, &assignments);
        bind_frame_uniforms(&api, program, 0.02, &assignments);
        assert_eq!(api.log().uniform_lookups, 4);
    }
}
