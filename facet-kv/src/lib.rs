#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![warn(clippy::std_instead_of_alloc)]
#![deny(unsafe_code)]
#![doc = include_str!("../README.md")]

extern crate alloc;
extern crate self as facet_kv;

mod builder;
mod decode;
mod draft;
mod error;
mod ip;
mod pair;
mod scalar;
mod schema;

pub use builder::{DecoderBuilder, NameResolver, builder, default_name_resolver};
pub use decode::Decoder;
pub use error::{DecodeError, DecodeErrorKind};
pub use ip::IpMask;
pub use pair::{KvPair, KvSource, MemoryStore};
pub use schema::{
    FieldKind, FieldLocator, FieldMeta, FloatWidth, IntWidth, IpFamily, TypeCache, TypeMeta,
    ValueStyle,
};

use facet_core::Facet;

/// Decode `pairs` found under `prefix` into a fresh `T` using the default decoder.
///
/// ```
/// use facet::Facet;
/// use facet_kv as kv;
///
/// #[derive(Facet, Debug)]
/// struct Service {
///     name: String,
///     #[facet(kv::rename = "max-conns")]
///     max_conns: u32,
/// }
///
/// let pairs = [
///     kv::KvPair::new("svc/web/name", "frontend"),
///     kv::KvPair::new("svc/web/max-conns", "128"),
/// ];
/// let service: Service = kv::from_pairs("svc/web", &pairs).unwrap();
/// assert_eq!(service.name, "frontend");
/// assert_eq!(service.max_conns, 128);
/// ```
pub fn from_pairs<T>(prefix: &str, pairs: &[KvPair]) -> Result<T, DecodeError>
where
    T: Facet<'static>,
{
    Decoder::default().decode(prefix, pairs)
}

/// Decode `pairs` found under `prefix` into the existing `target` using the default
/// decoder.
///
/// Fields no key names keep their current value and sequences are appended to.
/// On failure `target` is left untouched.
///
/// ```
/// use facet::Facet;
/// use facet_kv as kv;
///
/// #[derive(Facet, Debug, Clone)]
/// struct Agent {
///     datacenter: String,
///     port: u16,
///     tags: Vec<String>,
/// }
///
/// let mut agent = Agent {
///     datacenter: "dc1".into(),
///     port: 8500,
///     tags: vec!["primary".into()],
/// };
/// let pairs = [
///     kv::KvPair::new("agent/datacenter", "dc2"),
///     kv::KvPair::new("agent/tags/0", "canary"),
/// ];
/// kv::unmarshal("agent", &pairs, &mut agent).unwrap();
/// assert_eq!(agent.datacenter, "dc2");
/// assert_eq!(agent.port, 8500);
/// assert_eq!(agent.tags, ["primary", "canary"]);
/// ```
pub fn unmarshal<T>(prefix: &str, pairs: &[KvPair], target: &mut T) -> Result<(), DecodeError>
where
    T: Facet<'static> + Clone,
{
    Decoder::default().unmarshal(prefix, pairs, target)
}

// Extension attributes for use with #[facet(kv::attr)] syntax.
//
// After importing `use facet_kv as kv;`, users can write:
//   #[facet(kv::rename = "name")]
//   #[facet(kv::tag = "name,json")]
//   #[facet(kv::json)]
//   #[facet(kv::csv)]
//   #[facet(kv::ssv)]
//   #[facet(kv::skip)]
facet::define_attr_grammar! {
    ns "kv";
    crate_path ::facet_kv;

    /// Key/value decoding attributes for struct fields.
    pub enum Attr {
        /// Full tag in `name,modifier,...` form.
        ///
        /// Usage: `#[facet(kv::tag = "limits,json")]`
        ///
        /// The first segment is the key name (empty keeps the field name, `-`
        /// skips the field unless a custom name resolver maps it). Recognized modifiers are `json`, `csv` and `ssv`;
        /// anything else is ignored.
        Tag(&'static str),
        /// Key name this field answers to. May contain `/` to reach deeper keys.
        ///
        /// Usage: `#[facet(kv::rename = "listen/addr")]`
        Rename(&'static str),
        /// Decode the raw value of this key as a JSON document.
        Json,
        /// Decode the raw value as a comma-separated list (sequence fields only).
        Csv,
        /// Decode the raw value as a whitespace-separated list (sequence fields only).
        Ssv,
        /// Never decode this field.
        Skip,
    }
}
