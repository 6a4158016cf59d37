//! Output profiles and the per-annotation transform pipeline.
//!
//! A profile is a per-body reshaping strategy plus a target-extraction
//! mode; the pipeline runs normalization, applies the strategy to every
//! body, and assembles the final record. Finished records are wrapped in
//! a IIIF Presentation 2 annotation list whose `@id` is the original
//! caller-supplied request URI - the contract Mirador-style clients
//! depend on.

use serde_json::{json, Map, Value};

use crate::normalize::{normalize, NormalizeOptions};
use crate::target::{TargetExtractor, TargetMode};

/// `@context` of the output envelope.
pub const IIIF_PRESENTATION_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";

/// `@type` of the output envelope.
pub const ANNOTATION_LIST_TYPE: &str = "sc:AnnotationList";

/// Per-body reshaping. One implementation per output profile.
pub trait BodyTransform: Send + Sync {
    fn transform(&self, body: Value) -> Value;
}

/// Pass-through profile: bodies are emitted as stored.
pub struct IdentityBody;

impl BodyTransform for IdentityBody {
    fn transform(&self, body: Value) -> Value {
        body
    }
}

/// Mirador legacy shape: `source` becomes an HTML anchor in `chars`,
/// `value` becomes an `oa:Tag` with the text in `chars`. Provenance keys
/// (`value`, `type`, `generator`, `source`, `purpose`) are stripped.
pub struct MiradorBody;

impl BodyTransform for MiradorBody {
    fn transform(&self, body: Value) -> Value {
        let object = match body.as_object() {
            Some(object) => object,
            None => return body,
        };

        let mut reshaped = Map::new();
        if let Some(source) = object.get("source").and_then(Value::as_str) {
            reshaped.insert(
                "chars".to_string(),
                json!(format!("<a href=\"{}\">{}</a>", source, source)),
            );
            reshaped.insert("format".to_string(), json!("application/html"));
        }
        if let Some(value) = object.get("value").and_then(Value::as_str) {
            reshaped.insert("@type".to_string(), json!("oa:Tag"));
            reshaped.insert("chars".to_string(), json!(value));
        }
        Value::Object(reshaped)
    }
}

/// Normalize-transform-assemble pipeline for one output profile.
pub struct TransformPipeline {
    transform: Box<dyn BodyTransform>,
    extractor: TargetExtractor,
    options: NormalizeOptions,
}

impl TransformPipeline {
    pub fn new(
        transform: Box<dyn BodyTransform>,
        extractor: TargetExtractor,
        options: NormalizeOptions,
    ) -> Self {
        Self {
            transform,
            extractor,
            options,
        }
    }

    /// The Mirador tag profile: flattened ids, motivation forced to
    /// `oa:tagging`, simple-mode targets.
    pub fn mirador(fake_selector: Option<String>) -> Self {
        Self::new(
            Box::new(MiradorBody),
            TargetExtractor::new(TargetMode::Simple, fake_selector),
            NormalizeOptions {
                flatten_ids: true,
                force_motivation: Some("oa:tagging".to_string()),
            },
        )
    }

    /// Specific-resource variant of the Mirador profile: all targets,
    /// structured selectors.
    pub fn specific_resource(fake_selector: Option<String>) -> Self {
        Self::new(
            Box::new(MiradorBody),
            TargetExtractor::new(TargetMode::SpecificResource, fake_selector),
            NormalizeOptions {
                flatten_ids: true,
                force_motivation: Some("oa:tagging".to_string()),
            },
        )
    }

    /// One raw annotation in, one output record out.
    ///
    /// `None` means the annotation is not transformable (missing body,
    /// target, id, or addressable target) and is skipped, not an error.
    /// The record is built fresh: `generator`, `label`, `creator`,
    /// `type`, `id`, `body` and `target` never leak into the output.
    pub fn transform_annotation(&self, item: &Value) -> Option<Value> {
        let anno = normalize(item, &self.options)?;
        let on = self.extractor.extract(&anno.targets)?;

        let mut bodies: Vec<Value> = anno
            .bodies
            .into_iter()
            .map(|body| self.transform.transform(body))
            .collect();
        let resource = if anno.single_body {
            bodies.pop()?
        } else {
            Value::Array(bodies)
        };

        let mut record = Map::new();
        record.insert("@id".to_string(), json!(anno.id));
        record.insert("@type".to_string(), json!("oa:Annotation"));
        if let Some(motivation) = anno.motivation {
            record.insert("motivation".to_string(), json!(motivation));
        }
        record.insert("on".to_string(), on);
        record.insert("resource".to_string(), resource);
        Some(Value::Object(record))
    }

    /// Transform a whole result set and wrap it into an annotation list
    /// with `@id` set to `request_uri`.
    ///
    /// Returns `None` when nothing was transformable - the boundary maps
    /// that to 404 rather than serving an empty envelope.
    pub fn annotation_list<'a, I>(&self, items: I, request_uri: &str) -> Option<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let resources: Vec<Value> = items
            .into_iter()
            .filter_map(|item| self.transform_annotation(item))
            .collect();
        annotation_list(request_uri, resources)
    }
}

/// Wrap finished records into the output envelope.
///
/// An empty record list yields `None` ("no content"), never an
/// empty-but-present envelope.
pub fn annotation_list(request_uri: &str, resources: Vec<Value>) -> Option<Value> {
    if resources.is_empty() {
        return None;
    }
    Some(json!({
        "@context": IIIF_PRESENTATION_CONTEXT,
        "@type": ANNOTATION_LIST_TYPE,
        "@id": request_uri,
        "resources": resources,
    }))
}

/// Field key of the autocomplete input in linking capture models.
const AUTOCOMPLETE_FIELD: &str = "https://annotation-studio.netlify.com/fields/linking/autocomplete";

/// Flattened linking record, as consumed by the PMC/Galway viewer.
///
/// The annotation body carries a JSON-encoded capture-model draft in
/// `body.value`; the record links the drawn box on the target canvas to
/// the autocompleted entity. Annotations whose `body.value` is absent or
/// unparsable yield no record.
pub fn linking_record(item: &Value, record_id: &str) -> Option<Value> {
    let raw = item.get("body")?.get("value")?.as_str()?;
    let values: Value = serde_json::from_str(raw).ok()?;

    let input = values.get("input")?.get(AUTOCOMPLETE_FIELD)?;
    let label = input.get("label").cloned().unwrap_or(Value::Null);
    let url = input.get("url").cloned().unwrap_or(Value::Null);

    let target = item.get("target")?.as_str()?;
    let on = match selector_box(values.get("selector")) {
        Some(xywh) => format!("{}#{}", target, xywh),
        None => target.to_string(),
    };

    Some(json!({
        "@id": record_id,
        "@type": "oa:Annotation",
        "motivation": "oa:linking",
        "on": on,
        "resource": { "@id": url, "label": label },
    }))
}

/// Build an annotation list of linking records, with synthetic per-record
/// ids `request_uri + index`.
pub fn linking_list<'a, I>(items: I, request_uri: &str) -> Option<Value>
where
    I: IntoIterator<Item = &'a Value>,
{
    let resources: Vec<Value> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            linking_record(item, &format!("{}{}", request_uri, index))
        })
        .collect();
    annotation_list(request_uri, resources)
}

/// `xywh=x,y,w,h` fragment from a capture-model selector box, if complete.
fn selector_box(selector: Option<&Value>) -> Option<String> {
    let selector = selector?;
    let x = selector.get("x").and_then(Value::as_i64)?;
    let y = selector.get("y").and_then(Value::as_i64)?;
    let width = selector.get("width").and_then(Value::as_i64)?;
    let height = selector.get("height").and_then(Value::as_i64)?;
    Some(format!("xywh={},{},{},{}", x, y, width, height))
}
