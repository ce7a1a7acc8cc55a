//! Staging tree for a record under construction.
//!
//! Pairs arrive in any order and may address the same field several times, but a
//! `Partial` is filled front to back. The engine records every assignment in a
//! [`RecordDraft`] first, then [`build_record`] walks the draft once and writes the
//! value, allocating `Option` and pointer layers only where something was set.
//!
//! When the record already holds a value, [`build_record`] is given a [`Peek`] of it
//! and only writes the slots the draft touched: absent fields keep their value,
//! sequences are appended to and mappings gain entries.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use facet_core::{Def, Field, Shape, Type, UserType};
use facet_reflect::{Partial, Peek};
use indexmap::IndexMap;

use crate::error::{DecodeError, DecodeErrorKind};
use crate::scalar::{ScalarValue, value_error};
use crate::schema::{FieldKind, FieldLocator, intrinsic_kind};

pub(crate) type Wip = Partial<'static, false>;

/// The assigned fields of one record, by field index.
#[derive(Debug, Default)]
pub(crate) struct RecordDraft {
    slots: BTreeMap<usize, Slot>,
}

#[derive(Debug)]
struct Slot {
    locator: FieldLocator,
    draft: Draft,
}

#[derive(Debug)]
pub(crate) enum Draft {
    Record(RecordDraft),
    Seq(Vec<Draft>),
    Map(IndexMap<String, Draft>),
    Leaf(Leaf),
}

/// A terminal value. Text and blobs are parsed while building, so they keep the
/// key they came from for error reporting.
#[derive(Debug)]
pub(crate) enum Leaf {
    Scalar(ScalarValue),
    Text { text: String, key: String },
    Blob { bytes: Vec<u8>, key: String },
}

impl RecordDraft {
    fn slot(&mut self, locator: &FieldLocator, empty: fn() -> Draft) -> &mut Draft {
        &mut self
            .slots
            .entry(locator.index)
            .or_insert_with(|| Slot {
                locator: *locator,
                draft: empty(),
            })
            .draft
    }

    /// The nested record reached through `locator`, created on first use.
    pub(crate) fn nested(&mut self, locator: &FieldLocator) -> &mut RecordDraft {
        let draft = self.slot(locator, || Draft::Record(RecordDraft::default()));
        if !matches!(draft, Draft::Record(_)) {
            *draft = Draft::Record(RecordDraft::default());
        }
        match draft {
            Draft::Record(record) => record,
            _ => unreachable!("slot was just made a record"),
        }
    }

    /// Replace the value of a non-container field.
    pub(crate) fn set(&mut self, locator: &FieldLocator, draft: Draft) {
        self.slots.insert(
            locator.index,
            Slot {
                locator: *locator,
                draft,
            },
        );
    }

    /// The element list of a sequence field, created on first use.
    pub(crate) fn seq(&mut self, locator: &FieldLocator) -> &mut Vec<Draft> {
        let draft = self.slot(locator, || Draft::Seq(Vec::new()));
        if !matches!(draft, Draft::Seq(_)) {
            *draft = Draft::Seq(Vec::new());
        }
        match draft {
            Draft::Seq(items) => items,
            _ => unreachable!("slot was just made a sequence"),
        }
    }

    /// The entries of a mapping field, created on first use.
    pub(crate) fn map(&mut self, locator: &FieldLocator) -> &mut IndexMap<String, Draft> {
        let draft = self.slot(locator, || Draft::Map(IndexMap::new()));
        if !matches!(draft, Draft::Map(_)) {
            *draft = Draft::Map(IndexMap::new());
        }
        match draft {
            Draft::Map(entries) => entries,
            _ => unreachable!("slot was just made a mapping"),
        }
    }
}

/// Write `record` into `wip`, which must sit on a struct frame.
///
/// With no `prior` value, fields with no draft take their zero value. A record with
/// an absent field that has no zero value starts from its own `Default` instead.
/// With a `prior` value the frame already holds it and absent fields are left alone.
pub(crate) fn build_record(
    mut wip: Wip,
    record: RecordDraft,
    prior: Option<Peek<'_, 'static>>,
) -> Result<Wip, DecodeError> {
    let shape = wip.shape();
    let Type::User(UserType::Struct(struct_type)) = &shape.ty else {
        return Err(DecodeErrorKind::InvalidTarget { shape }.into());
    };
    let prior = match prior {
        Some(peek) => Some(peek.into_struct()?),
        None => None,
    };

    let mut slots = record.slots;
    let mut keep_absent = prior.is_some();
    if !keep_absent
        && shape.is_default()
        && struct_type
            .fields
            .iter()
            .enumerate()
            .any(|(index, field)| !slots.contains_key(&index) && !has_zero(field))
    {
        tracing::trace!(shape = shape.type_identifier, "starting record from its default");
        wip = wip.set_default()?;
        keep_absent = true;
    }

    for (index, field) in struct_type.fields.iter().enumerate() {
        wip = match slots.remove(&index) {
            Some(slot) => {
                let current = prior.as_ref().and_then(|record| record.field(index).ok());
                wip = wip.begin_nth_field(index)?;
                wip = build_field(wip, &slot.locator, slot.draft, current)?;
                wip.end()?
            }
            None if keep_absent => wip,
            None => fill_absent(wip, index, field)?,
        };
    }
    Ok(wip)
}

fn build_field(
    wip: Wip,
    locator: &FieldLocator,
    draft: Draft,
    current: Option<Peek<'_, 'static>>,
) -> Result<Wip, DecodeError> {
    let (mut wip, depth) = open_layers(wip, locator.pointer_depth)?;
    let current = current.and_then(|peek| inside_layers(peek, locator.pointer_depth));

    wip = match draft {
        // `init_list` and `init_map` keep the entries of an existing container.
        Draft::Seq(items) => {
            wip = wip.init_list()?;
            for item in items {
                wip = wip.begin_list_item()?;
                wip = build_element(wip, locator.container_pointer_depth, item)?;
                wip = wip.end()?;
            }
            wip
        }
        Draft::Map(entries) => {
            wip = wip.init_map()?;
            for (key, item) in entries {
                wip = wip.begin_key()?;
                wip = wip.set(key)?;
                wip = wip.end()?;
                wip = wip.begin_value()?;
                wip = build_element(wip, locator.container_pointer_depth, item)?;
                wip = wip.end()?;
            }
            wip
        }
        Draft::Record(record) => {
            // Opening a layer allocates a fresh value, so an existing record behind it
            // is carried over before the draft is merged in.
            if depth > 0
                && let Some(existing) = current
            {
                wip = carry(wip, existing)?;
            }
            build_record(wip, record, current)?
        }
        Draft::Leaf(leaf) => build_leaf(wip, leaf)?,
    };

    close_layers(wip, depth)
}

fn build_element(wip: Wip, pointer_depth: u8, draft: Draft) -> Result<Wip, DecodeError> {
    let (wip, depth) = open_layers(wip, pointer_depth)?;
    let wip = match draft {
        Draft::Record(record) => build_record(wip, record, None)?,
        Draft::Leaf(leaf) => build_leaf(wip, leaf)?,
        // Containers never nest; compilation rejects it.
        Draft::Seq(_) | Draft::Map(_) => {
            return Err(DecodeError::unsupported(
                wip.shape().type_identifier,
                "nested containers",
            ));
        }
    };
    close_layers(wip, depth)
}

/// Seed a freshly opened frame with a copy of the value it replaces.
fn carry(wip: Wip, existing: Peek<'_, 'static>) -> Result<Wip, DecodeError> {
    let shape = existing.shape();
    let carry_error = |message: String| DecodeError::new(DecodeErrorKind::Carry { shape, message });
    let json = facet_json::peek_to_string(existing).map_err(|err| carry_error(err.to_string()))?;
    facet_json::from_str_into(&json, wip).map_err(|err| carry_error(err.to_string()))
}

fn build_leaf(wip: Wip, leaf: Leaf) -> Result<Wip, DecodeError> {
    match leaf {
        Leaf::Scalar(value) => set_scalar(wip, value),
        Leaf::Text { text, key } => wip.parse_from_str(&text).map_err(|err| {
            value_error(text.as_bytes(), FieldKind::Text, err.to_string()).with_key(&key)
        }),
        Leaf::Blob { bytes, key } => facet_json::from_slice_into(&bytes, wip).map_err(|err| {
            DecodeError::new(DecodeErrorKind::BlobDecode {
                message: err.to_string(),
            })
            .with_key(&key)
        }),
    }
}

pub(crate) fn set_scalar(wip: Wip, value: ScalarValue) -> Result<Wip, DecodeError> {
    let wip = match value {
        ScalarValue::I8(v) => wip.set(v)?,
        ScalarValue::I16(v) => wip.set(v)?,
        ScalarValue::I32(v) => wip.set(v)?,
        ScalarValue::I64(v) => wip.set(v)?,
        ScalarValue::I128(v) => wip.set(v)?,
        ScalarValue::ISize(v) => wip.set(v)?,
        ScalarValue::U8(v) => wip.set(v)?,
        ScalarValue::U16(v) => wip.set(v)?,
        ScalarValue::U32(v) => wip.set(v)?,
        ScalarValue::U64(v) => wip.set(v)?,
        ScalarValue::U128(v) => wip.set(v)?,
        ScalarValue::USize(v) => wip.set(v)?,
        ScalarValue::F32(v) => wip.set(v)?,
        ScalarValue::F64(v) => wip.set(v)?,
        ScalarValue::Bool(v) => wip.set(v)?,
        ScalarValue::String(v) => wip.set(v)?,
        ScalarValue::Bytes(v) => wip.set(v)?,
        ScalarValue::Duration(v) => wip.set(v)?,
        ScalarValue::IpAddr(v) => wip.set(v)?,
        ScalarValue::Ipv4Addr(v) => wip.set(v)?,
        ScalarValue::Ipv6Addr(v) => wip.set(v)?,
        ScalarValue::IpMask(v) => wip.set(v)?,
    };
    Ok(wip)
}

/// Step through `depth` `Option` or smart pointer layers.
///
/// Returns how many frames were pushed so they can be closed again.
fn open_layers(mut wip: Wip, depth: u8) -> Result<(Wip, u8), DecodeError> {
    for _ in 0..depth {
        wip = match wip.shape().def {
            Def::Option(_) => wip.begin_some()?,
            _ => wip.begin_smart_ptr()?,
        };
    }
    Ok((wip, depth))
}

fn close_layers(mut wip: Wip, depth: u8) -> Result<Wip, DecodeError> {
    for _ in 0..depth {
        wip = wip.end()?;
    }
    Ok(wip)
}

/// The value `depth` `Option` or smart pointer layers below `peek`, if every
/// layer is set.
fn inside_layers<'a>(mut peek: Peek<'a, 'static>, depth: u8) -> Option<Peek<'a, 'static>> {
    for _ in 0..depth {
        peek = match peek.shape().def {
            Def::Option(_) => peek.into_option().ok()?.value()?,
            _ => peek.into_pointer().ok()?.borrow_inner()?,
        };
    }
    Some(peek)
}

/// Give a field that received no value its zero value.
fn fill_absent(wip: Wip, index: usize, field: &Field) -> Result<Wip, DecodeError> {
    if field.has_default() {
        return Ok(wip.set_nth_field_to_default(index)?);
    }
    let wip = wip.begin_nth_field(index)?;
    let wip = zero_value(wip, field)?;
    Ok(wip.end()?)
}

fn zero_value(wip: Wip, field: &Field) -> Result<Wip, DecodeError> {
    let shape: &'static Shape = wip.shape();
    if shape.is_default() {
        return Ok(wip.set_default()?);
    }
    if let Some(value) = intrinsic_kind(shape).and_then(ScalarValue::zero) {
        return set_scalar(wip, value);
    }
    if let Type::User(UserType::Struct(_)) = &shape.ty {
        return build_record(wip, RecordDraft::default(), None);
    }
    Err(DecodeErrorKind::MissingValue {
        field: field.name,
        shape,
    }
    .into())
}

/// Whether an absent field can be given a value without help from its record.
fn has_zero(field: &Field) -> bool {
    field.has_default() || zeroable(field.shape())
}

fn zeroable(shape: &'static Shape) -> bool {
    if shape.is_default() || intrinsic_kind(shape).and_then(ScalarValue::zero).is_some() {
        return true;
    }
    match &shape.ty {
        Type::User(UserType::Struct(struct_type)) => struct_type.fields.iter().all(has_zero),
        _ => false,
    }
}
