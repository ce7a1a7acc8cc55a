//! Type analysis: compiling a record [`Shape`] into a [`TypeMeta`].
//!
//! A `TypeMeta` is a flat table from resolved key names to the fields they
//! populate. Nested records are flattened into `outer/inner` names, and every
//! entry carries the chain of [`FieldLocator`]s needed to reach its field from
//! the root record.

mod cache;
mod tag;


pub use cache::TypeCache;

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use core::time::Duration;

use facet_core::{
    ConstTypeId, Def, Field, KnownPointer, ScalarType, Shape, StructType, Type, UserType,
};
use indexmap::IndexMap;

use crate::builder::DecoderOptions;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::ip::IpMask;
use cache::CacheMap;
use tag::FieldTag;

/// One hop from a record to one of its fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldLocator {
    /// Position of the field within its enclosing struct.
    pub index: usize,
    /// `Option`/`Box`/`Arc`/`Rc` layers wrapped around the field's type.
    pub pointer_depth: u8,
    /// Indirection layers wrapped around each element of a sequence or mapping.
    pub container_pointer_depth: u8,
    /// The field is a sequence (`Vec<T>`).
    pub is_sequence: bool,
    /// The field is a mapping keyed by path segment (`HashMap<String, T>` and friends).
    pub is_mapping: bool,
    /// The raw value is an embedded JSON document.
    pub is_blob: bool,
    /// Shape left once indirection and container wrapping are stripped.
    ///
    /// For a blob this is the shape the JSON document decodes into.
    pub element_shape: &'static Shape,
}

impl FieldLocator {
    fn new(index: usize, shape: &'static Shape) -> Self {
        Self {
            index,
            pointer_depth: 0,
            container_pointer_depth: 0,
            is_sequence: false,
            is_mapping: false,
            is_blob: false,
            element_shape: shape,
        }
    }

    /// Returns `true` if the field holds a sequence or a mapping.
    pub fn is_container(&self) -> bool {
        self.is_sequence || self.is_mapping
    }
}

/// A decodable key of a record type.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    /// Resolved key name, relative to the record. Flattened fields carry `outer/inner`.
    pub name: String,
    /// Path from the root record to the field. Never empty.
    pub locators: Vec<FieldLocator>,
    /// How the terminal value is produced.
    pub kind: FieldKind,
    /// How the raw value is split before parsing.
    pub style: ValueStyle,
}

impl FieldMeta {
    /// The locator of the field that receives the value.
    pub fn terminal(&self) -> &FieldLocator {
        // Compilation never produces an empty chain.
        &self.locators[self.locators.len() - 1]
    }
}

/// Width of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    /// 8 bits.
    W8,
    /// 16 bits.
    W16,
    /// 32 bits.
    W32,
    /// 64 bits.
    W64,
    /// 128 bits.
    W128,
    /// Pointer-sized.
    Size,
}

impl IntWidth {
    fn suffix(self) -> &'static str {
        match self {
            IntWidth::W8 => "8",
            IntWidth::W16 => "16",
            IntWidth::W32 => "32",
            IntWidth::W64 => "64",
            IntWidth::W128 => "128",
            IntWidth::Size => "size",
        }
    }
}

/// Width of a floating point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    /// `f32`
    F32,
    /// `f64`
    F64,
}

/// Which std address type an IP field targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    /// `IpAddr`
    Any,
    /// `Ipv4Addr`
    V4,
    /// `Ipv6Addr`
    V6,
}

/// What a field's terminal value is and how it gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Signed integer.
    Signed(IntWidth),
    /// Unsigned integer.
    Unsigned(IntWidth),
    /// Floating point number.
    Float(FloatWidth),
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Raw bytes (`Vec<u8>`).
    Bytes,
    /// `core::time::Duration`.
    Duration,
    /// IP address.
    IpAddr(IpFamily),
    /// [`IpMask`].
    IpMask,
    /// A nested record, decoded recursively from the keys below it.
    Record,
    /// A type parsed through its own `FromStr`.
    Text,
}

impl FieldKind {
    /// Returns `true` for kinds with an intrinsic parser.
    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldKind::Record | FieldKind::Text)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Signed(width) => write!(f, "i{}", width.suffix()),
            FieldKind::Unsigned(width) => write!(f, "u{}", width.suffix()),
            FieldKind::Float(FloatWidth::F32) => write!(f, "f32"),
            FieldKind::Float(FloatWidth::F64) => write!(f, "f64"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::Duration => write!(f, "duration"),
            FieldKind::IpAddr(IpFamily::Any) => write!(f, "IP address"),
            FieldKind::IpAddr(IpFamily::V4) => write!(f, "IPv4 address"),
            FieldKind::IpAddr(IpFamily::V6) => write!(f, "IPv6 address"),
            FieldKind::IpMask => write!(f, "IP mask"),
            FieldKind::Record => write!(f, "record"),
            FieldKind::Text => write!(f, "text"),
        }
    }
}

/// How a raw value is split before its parts are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueStyle {
    /// The whole value is one element.
    #[default]
    Plain,
    /// The value is a JSON document.
    Json,
    /// Comma-separated, with RFC 4180 quoting.
    Csv,
    /// Whitespace-separated.
    Ssv,
}

/// The compiled key table of one record type.
#[derive(Debug)]
pub struct TypeMeta {
    shape: &'static Shape,
    fields: IndexMap<String, FieldMeta>,
}

impl TypeMeta {
    /// Shape of the record this table was compiled from.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// Look up a field by resolved name.
    pub fn get(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.get(name)
    }

    /// Number of decodable keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field of the record can be decoded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the entries in declaration order, flattened fields in place.
    pub fn iter(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.values()
    }

    /// Iterate over the resolved names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Compile `shape` into `entries`, reusing anything already there.
///
/// `in_progress` holds the records currently being compiled further up the
/// stack, so self-referential types fail instead of recursing forever.
pub(crate) fn compile(
    shape: &'static Shape,
    options: &DecoderOptions,
    entries: &mut CacheMap,
    in_progress: &mut Vec<ConstTypeId>,
) -> Result<Arc<TypeMeta>, DecodeError> {
    let key = (shape.id, options.key());
    if let Some(meta) = entries.get(&key) {
        return Ok(Arc::clone(meta));
    }

    let Type::User(UserType::Struct(struct_type)) = &shape.ty else {
        return Err(DecodeErrorKind::InvalidTarget { shape }.into());
    };
    if in_progress.contains(&shape.id) {
        return Err(DecodeError::unsupported(
            shape.type_identifier,
            "record type contains itself",
        ));
    }

    tracing::debug!(shape = shape.type_identifier, "compiling record type");
    in_progress.push(shape.id);
    let fields = compile_fields(struct_type, options, entries, in_progress);
    in_progress.pop();

    let meta = Arc::new(TypeMeta {
        shape,
        fields: fields?,
    });
    tracing::debug!(
        shape = shape.type_identifier,
        fields = meta.len(),
        "compiled record type"
    );
    entries.insert(key, Arc::clone(&meta));
    Ok(meta)
}

fn compile_fields(
    struct_type: &StructType,
    options: &DecoderOptions,
    entries: &mut CacheMap,
    in_progress: &mut Vec<ConstTypeId>,
) -> Result<IndexMap<String, FieldMeta>, DecodeError> {
    let mut fields = IndexMap::new();

    for (index, field) in struct_type.fields.iter().enumerate() {
        let tag = FieldTag::read(field, &options.tag_label);
        if tag.skip {
            tracing::trace!(field = field.name, "skipping field");
            continue;
        }

        let name = (options.name_resolver)(field.name, tag.primary);
        if name.is_empty() || name == "-" {
            tracing::trace!(field = field.name, "name resolver skipped field");
            continue;
        }
        let name = options.fold(&name);

        for meta in compile_field(index, field, &name, &tag, options, entries, in_progress)? {
            if fields.contains_key(&meta.name) {
                return Err(DecodeError::unsupported(&meta.name, "duplicate key name"));
            }
            fields.insert(meta.name.clone(), meta);
        }
    }

    Ok(fields)
}

/// Classify one field. Returns no entries when the field's type cannot be decoded,
/// one entry for a terminal field, and the flattened entries of a nested record.
fn compile_field(
    index: usize,
    field: &Field,
    name: &str,
    tag: &FieldTag,
    options: &DecoderOptions,
    entries: &mut CacheMap,
    in_progress: &mut Vec<ConstTypeId>,
) -> Result<Vec<FieldMeta>, DecodeError> {
    let style = tag.style(name)?;
    let mut shape = field.shape();
    let mut locator = FieldLocator::new(index, shape);
    let mut text = false;

    let terminal = |mut locator: FieldLocator,
                    shape: &'static Shape,
                    kind: FieldKind|
     -> Result<Vec<FieldMeta>, DecodeError> {
        locator.element_shape = shape;
        Ok(vec![FieldMeta {
            name: name.into(),
            locators: vec![locator],
            kind,
            style,
        }])
    };

    loop {
        if let Some(inner) = peel_indirection(shape) {
            let counter = if locator.is_container() {
                &mut locator.container_pointer_depth
            } else {
                &mut locator.pointer_depth
            };
            *counter = counter
                .checked_add(1)
                .ok_or_else(|| DecodeErrorKind::CounterOverflow { field: name.into() })?;
            shape = inner;
            continue;
        }

        text |= has_text_capability(shape);

        if style == ValueStyle::Json {
            locator.is_blob = true;
            let kind = intrinsic_kind(shape).unwrap_or(FieldKind::Record);
            return terminal(locator, shape, kind);
        }

        if let Some(kind) = intrinsic_kind(shape) {
            require_sequence_for_delimited(name, style, &locator)?;
            return terminal(locator, shape, kind);
        }

        match shape.def {
            Def::List(list) => {
                if locator.is_sequence {
                    return Err(DecodeError::unsupported(name, "sequence of sequences"));
                }
                if locator.is_mapping {
                    return Err(DecodeError::unsupported(name, "sequence inside a mapping"));
                }
                locator.is_sequence = true;
                shape = list.t();
                continue;
            }
            Def::Map(map) => {
                if locator.is_mapping {
                    return Err(DecodeError::unsupported(name, "mapping of mappings"));
                }
                if locator.is_sequence {
                    return Err(DecodeError::unsupported(name, "mapping inside a sequence"));
                }
                if map.k().scalar_type() != Some(ScalarType::String) {
                    return Err(DecodeError::unsupported(name, "mapping key must be String"));
                }
                if matches!(style, ValueStyle::Csv | ValueStyle::Ssv) {
                    return Err(DecodeError::unsupported(
                        name,
                        "csv and ssv apply to sequences only",
                    ));
                }
                locator.is_mapping = true;
                shape = map.v();
                continue;
            }
            _ => {}
        }

        if let Type::User(UserType::Struct(_)) = &shape.ty {
            if matches!(style, ValueStyle::Csv | ValueStyle::Ssv) {
                return Err(DecodeError::unsupported(
                    name,
                    "csv and ssv cannot decode a record",
                ));
            }
            if text {
                return terminal(locator, shape, FieldKind::Text);
            }
            if locator.is_container() {
                return terminal(locator, shape, FieldKind::Record);
            }

            let nested = compile(shape, options, entries, in_progress)?;
            locator.element_shape = shape;
            return Ok(nested
                .iter()
                .map(|inner| {
                    let mut locators = Vec::with_capacity(inner.locators.len() + 1);
                    locators.push(locator);
                    locators.extend_from_slice(&inner.locators);
                    FieldMeta {
                        name: format!("{name}/{}", inner.name),
                        locators,
                        kind: inner.kind,
                        style: inner.style,
                    }
                })
                .collect());
        }

        if text {
            require_sequence_for_delimited(name, style, &locator)?;
            return terminal(locator, shape, FieldKind::Text);
        }

        tracing::debug!(
            field = name,
            shape = shape.type_identifier,
            "excluding field: type has no key/value decoding"
        );
        return Ok(Vec::new());
    }
}

/// The shape behind one `Option`, `Box`, `Arc` or `Rc` layer.
pub(crate) fn peel_indirection(shape: &'static Shape) -> Option<&'static Shape> {
    match shape.def {
        Def::Option(option) => Some(option.t()),
        Def::Pointer(pointer)
            if matches!(
                pointer.known,
                Some(KnownPointer::Box | KnownPointer::Arc | KnownPointer::Rc)
            ) =>
        {
            pointer.pointee()
        }
        _ => None,
    }
}

/// Kinds parsed by this crate rather than by the type itself.
pub(crate) fn intrinsic_kind(shape: &'static Shape) -> Option<FieldKind> {
    if shape.is_type::<Vec<u8>>() {
        return Some(FieldKind::Bytes);
    }
    if shape.is_type::<Duration>() {
        return Some(FieldKind::Duration);
    }
    if shape.is_type::<IpMask>() {
        return Some(FieldKind::IpMask);
    }
    if shape.is_type::<IpAddr>() {
        return Some(FieldKind::IpAddr(IpFamily::Any));
    }
    if shape.is_type::<Ipv4Addr>() {
        return Some(FieldKind::IpAddr(IpFamily::V4));
    }
    if shape.is_type::<Ipv6Addr>() {
        return Some(FieldKind::IpAddr(IpFamily::V6));
    }

    let kind = match shape.scalar_type()? {
        ScalarType::Bool => FieldKind::Bool,
        ScalarType::String => FieldKind::String,
        ScalarType::F32 => FieldKind::Float(FloatWidth::F32),
        ScalarType::F64 => FieldKind::Float(FloatWidth::F64),
        ScalarType::I8 => FieldKind::Signed(IntWidth::W8),
        ScalarType::I16 => FieldKind::Signed(IntWidth::W16),
        ScalarType::I32 => FieldKind::Signed(IntWidth::W32),
        ScalarType::I64 => FieldKind::Signed(IntWidth::W64),
        ScalarType::I128 => FieldKind::Signed(IntWidth::W128),
        ScalarType::ISize => FieldKind::Signed(IntWidth::Size),
        ScalarType::U8 => FieldKind::Unsigned(IntWidth::W8),
        ScalarType::U16 => FieldKind::Unsigned(IntWidth::W16),
        ScalarType::U32 => FieldKind::Unsigned(IntWidth::W32),
        ScalarType::U64 => FieldKind::Unsigned(IntWidth::W64),
        ScalarType::U128 => FieldKind::Unsigned(IntWidth::W128),
        ScalarType::USize => FieldKind::Unsigned(IntWidth::Size),
        _ => return None,
    };
    Some(kind)
}

fn has_text_capability(shape: &'static Shape) -> bool {
    shape.vtable.has_parse() && intrinsic_kind(shape).is_none()
}

fn require_sequence_for_delimited(
    name: &str,
    style: ValueStyle,
    locator: &FieldLocator,
) -> Result<(), DecodeError> {
    match style {
        ValueStyle::Csv | ValueStyle::Ssv if !locator.is_sequence => Err(
            DecodeError::unsupported(name, "csv and ssv apply to sequences only"),
        ),
        _ => Ok(()),
    }
}
