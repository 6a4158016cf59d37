//! Turning normalized targets into client-facing addressing.

use serde_json::{json, Value};

use crate::normalize::Target;

/// Output shape for extracted targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// A single fragment-qualified URI string (`source#xywh=...`), as
    /// consumed by Mirador-style `on` fields.
    Simple,
    /// A list of structured `oa:SpecificResource` objects, one per target.
    SpecificResource,
}

/// Extracts the `on` value of an output record from normalized targets.
#[derive(Debug, Clone)]
pub struct TargetExtractor {
    mode: TargetMode,
    fake_selector: Option<String>,
}

impl TargetExtractor {
    pub fn new(mode: TargetMode, fake_selector: Option<String>) -> Self {
        Self {
            mode,
            fake_selector,
        }
    }

    /// Extract the `on` value for a record, or `None` when no target is
    /// addressable.
    ///
    /// Known quirk, preserved deliberately: simple mode looks at the
    /// *first* target only when several are present, while
    /// specific-resource mode processes all of them.
    pub fn extract(&self, targets: &[Target]) -> Option<Value> {
        match self.mode {
            TargetMode::Simple => targets
                .first()
                .and_then(|target| self.simple_uri(target))
                .map(Value::String),
            TargetMode::SpecificResource => {
                if targets.is_empty() {
                    return None;
                }
                let resources: Vec<Value> = targets
                    .iter()
                    .map(|target| self.specific_resource(target))
                    .collect();
                Some(Value::Array(resources))
            }
        }
    }

    /// `source#selectorValue`, with the fake selector substituted for
    /// selector-less targets when one is configured.
    fn simple_uri(&self, target: &Target) -> Option<String> {
        match target {
            Target::Fragment {
                source,
                selector: Some(selector),
            } => Some(format!("{}#{}", source, selector)),
            Target::Fragment {
                source,
                selector: None,
            } => Some(self.with_fake_selector(source)),
            Target::Uri(uri) => Some(self.with_fake_selector(uri)),
            Target::Opaque(_) => None,
        }
    }

    fn with_fake_selector(&self, source: &str) -> String {
        match &self.fake_selector {
            Some(fake) => format!("{}#{}", source, fake),
            None => source.to_string(),
        }
    }

    /// One `oa:SpecificResource` object. Targets without a `source` pass
    /// through unchanged rather than being rebuilt.
    fn specific_resource(&self, target: &Target) -> Value {
        match target {
            Target::Opaque(raw) => raw.clone(),
            Target::Uri(uri) => self.resource_object(uri, None),
            Target::Fragment { source, selector } => {
                self.resource_object(source, selector.as_deref())
            }
        }
    }

    fn resource_object(&self, source: &str, selector: Option<&str>) -> Value {
        let mut resource = json!({
            "type": "oa:SpecificResource",
            "full": source,
        });
        let selector = selector
            .map(|value| value.to_string())
            .or_else(|| self.fake_selector.clone());
        if let Some(value) = selector {
            resource["selector"] = json!({
                "type": "oa:FragmentSelector",
                "value": value,
            });
        }
        resource
    }
}
