//! Builder API for configuring a [`Decoder`].
//!
//! # Example
//!
//! ```rust
//! use facet_kv::builder;
//!
//! let decoder = builder()
//!     .case_sensitive(true)
//!     .name_resolver(|field, tag| {
//!         if tag.is_empty() { field.replace('_', "-") } else { tag.to_owned() }
//!     })
//!     .build();
//! # let _ = decoder;
//! ```

use alloc::string::String;
use alloc::sync::Arc;

use crate::decode::Decoder;
use crate::schema::TypeCache;

/// Maps a field to the key it answers to.
///
/// Called with the field name as declared on the struct and the primary tag value
/// (empty when the field has none). Returning `-` or an empty string skips the field.
pub type NameResolver = fn(field: &str, tag: &str) -> String;

/// The tag value when there is one, otherwise the field name.
pub fn default_name_resolver(field: &str, tag: &str) -> String {
    if tag.is_empty() {
        field.into()
    } else {
        tag.into()
    }
}

/// Create a new decoder builder.
pub fn builder() -> DecoderBuilder {
    DecoderBuilder::new()
}

/// Options that change how a record type compiles and how keys match.
#[derive(Debug, Clone)]
pub(crate) struct DecoderOptions {
    pub case_sensitive: bool,
    pub name_resolver: NameResolver,
    pub tag_label: String,
}

/// Identifies an option set inside the type cache.
///
/// Two decoders with equal keys produce identical schemas for the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct OptionsKey {
    case_sensitive: bool,
    resolver: usize,
    tag_label: String,
}

impl DecoderOptions {
    pub(crate) fn key(&self) -> OptionsKey {
        OptionsKey {
            case_sensitive: self.case_sensitive,
            resolver: self.name_resolver as usize,
            tag_label: self.tag_label.clone(),
        }
    }

    /// Lowercases `s` unless matching is case-sensitive.
    pub(crate) fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.into()
        } else {
            s.to_lowercase()
        }
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            name_resolver: default_name_resolver,
            tag_label: String::from("kv"),
        }
    }
}

/// Builder for a [`Decoder`].
#[derive(Debug, Clone, Default)]
pub struct DecoderBuilder {
    options: DecoderOptions,
    cache: Option<Arc<TypeCache>>,
}

impl DecoderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match keys exactly instead of lowercasing both sides (default: `false`).
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.options.case_sensitive = case_sensitive;
        self
    }

    /// Replace the field-to-key name resolution policy.
    pub fn name_resolver(mut self, resolver: NameResolver) -> Self {
        self.options.name_resolver = resolver;
        self
    }

    /// Read field attributes from another facet attribute namespace (default: `kv`).
    ///
    /// The namespace must understand the same keys as this crate's grammar:
    /// `tag` and `rename` carrying a string, and the `json`, `csv`, `ssv`
    /// and `skip` markers.
    pub fn tag_label(mut self, label: impl Into<String>) -> Self {
        self.options.tag_label = label.into();
        self
    }

    /// Share a type cache instead of using the process-wide one.
    pub fn cache(mut self, cache: Arc<TypeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the decoder.
    pub fn build(self) -> Decoder {
        let cache = self.cache.unwrap_or_else(TypeCache::global);
        Decoder::from_parts(self.options, cache)
    }
}
