//! Reference inlining.
//!
//! Replaces every `{"$ref": "..."}` object with the document fragment it
//! points to, fetching other documents through a [`SchemaLoader`]. The input
//! tree is never modified; a new tree is returned.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use url::Url;

use crate::error::ResolveError;
use crate::loader::{navigate_fragment, SchemaLoader};
use crate::types::REF_KEY;

/// Inline all references of `schema`, resolving relative ones against `base_url`.
///
/// A reference whose target (document URL plus fragment) is already being
/// expanded higher up the current chain is left in place as a `$ref`
/// object, so cyclic schemas terminate. The document itself counts as being
/// expanded: `{"$ref": "#"}` is always kept.
///
/// # Errors
///
/// Returns `ResolveError` if `base_url` or a reference is not a valid URL, a
/// referenced document cannot be loaded, or a fragment does not exist.
pub fn inline_refs(
    schema: &Value,
    base_url: &str,
    loader: &dyn SchemaLoader,
) -> Result<Value, ResolveError> {
    let mut base = Url::parse(base_url).map_err(|e| ResolveError::InvalidReference {
        reference: base_url.to_string(),
        message: e.to_string(),
    })?;
    base.set_fragment(None);

    let mut inliner = Inliner {
        loader,
        top_url: base.as_str().to_string(),
        top_root: schema,
        documents: HashMap::new(),
        active: vec![target_key(&base, "")],
    };
    let document = Document {
        url: base,
        root: schema,
    };
    inliner.expand(schema, &document)
}

/// Returns true if the tree still contains a `$ref` object.
pub fn has_refs(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            matches!(map.get(REF_KEY), Some(Value::String(_))) || map.values().any(has_refs)
        }
        Value::Array(arr) => arr.iter().any(has_refs),
        _ => false,
    }
}

/// A document being walked: its URL (no fragment) and its root value.
struct Document<'d> {
    url: Url,
    root: &'d Value,
}

struct Inliner<'a> {
    loader: &'a dyn SchemaLoader,
    top_url: String,
    top_root: &'a Value,
    /// Documents fetched during this call, keyed by URL.
    documents: HashMap<String, Rc<Value>>,
    /// Targets currently being expanded, outermost first.
    active: Vec<String>,
}

impl Inliner<'_> {
    fn expand(&mut self, value: &Value, document: &Document<'_>) -> Result<Value, ResolveError> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get(REF_KEY) {
                    return self.expand_ref(value, reference, document);
                }
                let mut result = Map::new();
                for (key, child) in map {
                    result.insert(key.clone(), self.expand(child, document)?);
                }
                Ok(Value::Object(result))
            }
            Value::Array(arr) => arr
                .iter()
                .map(|item| self.expand(item, document))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            // Primitives pass through unchanged
            other => Ok(other.clone()),
        }
    }

    fn expand_ref(
        &mut self,
        node: &Value,
        reference: &str,
        document: &Document<'_>,
    ) -> Result<Value, ResolveError> {
        let (doc_part, fragment) = reference.split_once('#').unwrap_or((reference, ""));

        let target_url = if doc_part.is_empty() {
            document.url.clone()
        } else {
            let mut url =
                document
                    .url
                    .join(doc_part)
                    .map_err(|e| ResolveError::InvalidReference {
                        reference: reference.to_string(),
                        message: e.to_string(),
                    })?;
            url.set_fragment(None);
            url
        };

        let key = target_key(&target_url, fragment);
        if self.active.contains(&key) {
            tracing::debug!(reference, target = %key, "leaving cyclic reference in place");
            return Ok(node.clone());
        }

        let top_root = self.top_root;
        let loaded: Rc<Value>;
        let root = if target_url == document.url {
            document.root
        } else if target_url.as_str() == self.top_url {
            top_root
        } else {
            loaded = self.fetch(&target_url, reference)?;
            &loaded
        };

        let target = navigate_fragment(root, fragment).map_err(|_| {
            ResolveError::FragmentNotFound {
                reference: reference.to_string(),
            }
        })?;

        self.active.push(key);
        let result = self.expand(
            target,
            &Document {
                url: target_url,
                root,
            },
        );
        self.active.pop();
        result
    }

    fn fetch(&mut self, url: &Url, reference: &str) -> Result<Rc<Value>, ResolveError> {
        if let Some(doc) = self.documents.get(url.as_str()) {
            return Ok(Rc::clone(doc));
        }
        tracing::debug!(url = %url, reference, "loading referenced document");
        let doc = self
            .loader
            .load(url.as_str())
            .map_err(|source| ResolveError::Load {
                reference: reference.to_string(),
                source,
            })?;
        let doc = Rc::new(doc);
        self.documents
            .insert(url.as_str().to_string(), Rc::clone(&doc));
        Ok(doc)
    }
}

fn target_key(url: &Url, fragment: &str) -> String {
    format!("{}#{}", url, fragment)
}
