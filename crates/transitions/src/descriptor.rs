use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::{self, Deserializer, MapAccess, SeqAccess};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// One named custom uniform and the floats written to it every frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UniformAssignment {
    #[serde(alias = "key")]
    pub name: String,
    #[serde(alias = "value")]
    pub values: Vec<f32>,
}

impl UniformAssignment {
    pub fn new(name: impl Into<String>, values: impl Into<Vec<f32>>) -> Self {
        Self {
            name: name.into(),
            values: values.into(),
        }
    }

    /// Whether the value list maps onto a `uniform{1,2,3,4}f` call.
    pub fn has_supported_arity(&self) -> bool {
        (1..=4).contains(&self.values.len())
    }
}

/// Shader pair plus the parameters that define one transition style.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitionDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "vsSource")]
    pub vertex_source: String,
    #[serde(alias = "fsSource")]
    pub fragment_source: String,
    #[serde(default, alias = "assignmentList")]
    pub uniforms: Vec<UniformAssignment>,
    #[serde(
        default,
        alias = "intervalTime",
        deserialize_with = "deserialize_interval_opt"
    )]
    pub frame_interval_hint: Option<Duration>,
}

impl TransitionDescriptor {
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            name: None,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            uniforms: Vec::new(),
            frame_interval_hint: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_uniform(mut self, name: impl Into<String>, values: impl Into<Vec<f32>>) -> Self {
        self.uniforms.push(UniformAssignment::new(name, values));
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_hint = Some(interval);
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.vertex_source.trim().is_empty() {
            issues.push("vertex source is empty".to_string());
        }
        if self.fragment_source.trim().is_empty() {
            issues.push("fragment source is empty".to_string());
        }
        for uniform in &self.uniforms {
            if uniform.name.trim().is_empty() {
                issues.push("uniform assignment without a name".to_string());
            }
        }
        issues
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse effect catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("effect catalog is empty")]
    Empty,

    #[error("effect '{name}' is invalid: {issues:?}")]
    Invalid { name: String, issues: Vec<String> },
}

/// Parses a JSON effect catalog.
///
/// Accepts either an array of descriptors or an object keyed by effect name;
/// object keys become descriptor names and document order is kept.
pub fn parse_catalog(json: &str) -> Result<Vec<Arc<TransitionDescriptor>>, CatalogError> {
    let Catalog(entries) = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(CatalogError::Empty);
    }

    let mut descriptors = Vec::with_capacity(entries.len());
    for (position, descriptor) in entries.into_iter().enumerate() {
        let issues = descriptor.validate();
        if !issues.is_empty() {
            let name = descriptor
                .name
                .clone()
                .unwrap_or_else(|| format!("#{position}"));
            return Err(CatalogError::Invalid { name, issues });
        }
        for uniform in descriptor
            .uniforms
            .iter()
            .filter(|uniform| !uniform.has_supported_arity())
        {
            warn!(
                effect = descriptor.label(),
                uniform = %uniform.name,
                arity = uniform.values.len(),
                "uniform arity is not 1-4; it will not be bound"
            );
        }
        descriptors.push(Arc::new(descriptor));
    }
    Ok(descriptors)
}

struct Catalog(Vec<TransitionDescriptor>);

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = Catalog;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a list of effects or a map of named effects")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(descriptor) = seq.next_element::<TransitionDescriptor>()? {
                    entries.push(descriptor);
                }
                Ok(Catalog(entries))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, mut descriptor)) =
                    map.next_entry::<String, TransitionDescriptor>()?
                {
                    descriptor.name.get_or_insert(name);
                    entries.push(descriptor);
                }
                Ok(Catalog(entries))
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Step interval: bare numbers are milliseconds, strings are humantime.
pub(crate) fn deserialize_interval_opt<'de, D>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an interval in milliseconds or a human-readable duration")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(Visitor)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid interval '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_millis(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("interval must be non-negative"));
            }
            Ok(Some(Duration::from_millis(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("interval must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v / 1000.0)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMED: &str = r#"{
        "directional": {
            "vsSource": "void main() {}",
            "fsSource": "void main() { gl_FragColor = vec4(1.0); }",
            "assignmentList": [{ "key": "direction", "value": [0.0, 1.0] }],
            "intervalTime": 30
        },
        "fade": {
            "vertex_source": "void main() {}",
            "fragment_source": "void main() {}"
        }
    }"#;

    #[test]
    fn parses_named_catalog_in_document_order() {
        let catalog = parse_catalog(NAMED).expect("parse catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].label(), "directional");
        assert_eq!(catalog[1].label(), "fade");
        assert_eq!(
            catalog[0].uniforms,
            vec![UniformAssignment::new("direction", [0.0, 1.0])]
        );
        assert_eq!(
            catalog[0].frame_interval_hint,
            Some(Duration::from_millis(30))
        );
        assert_eq!(catalog[1].frame_interval_hint, None);
        assert!(catalog[1].uniforms.is_empty());
    }

    #[test]
    fn parses_list_catalog() {
        let catalog = parse_catalog(
            r#"[{
                "name": "slices",
                "vsSource": "void main() {}",
                "fsSource": "void main() {}",
                "assignmentList": [
                    { "key": "count", "value": [20.0] },
                    { "key": "smoothness", "value": [0.5] }
                ],
                "intervalTime": "100ms"
            }]"#,
        )
        .expect("parse catalog");
        assert_eq!(catalog[0].label(), "slices");
        assert_eq!(catalog[0].uniforms.len(), 2);
        assert_eq!(
            catalog[0].frame_interval_hint,
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn null_interval_means_no_hint() {
        let catalog = parse_catalog(
            r#"[{ "vsSource": "a", "fsSource": "b", "intervalTime": null }]"#,
        )
        .unwrap();
        assert_eq!(catalog[0].frame_interval_hint, None);
    }

    #[test]
    fn rejects_empty_catalog() {
        assert!(matches!(parse_catalog("[]"), Err(CatalogError::Empty)));
        assert!(matches!(parse_catalog("{}"), Err(CatalogError::Empty)));
    }

    #[test]
    fn rejects_blank_sources() {
        let err = parse_catalog(r#"[{ "vsSource": "  ", "fsSource": "void main() {}" }]"#)
            .unwrap_err();
        match err {
            CatalogError::Invalid { name, issues } => {
                assert_eq!(name, "#0");
                assert_eq!(issues, vec!["vertex source is empty".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn keeps_uniforms_with_unsupported_arity() {
        let catalog = parse_catalog(
            r#"[{ "vsSource": "a", "fsSource": "b",
                  "assignmentList": [{ "key": "matrix", "value": [1, 2, 3, 4, 5] }] }]"#,
        )
        .unwrap();
        assert!(!catalog[0].uniforms[0].has_supported_arity());
    }
}
