//! The assignment engine: matching pairs to fields and building the record.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use facet_core::{Facet, Shape};
use facet_reflect::{Partial, Peek, ReflectError};

use crate::builder::DecoderOptions;
use crate::draft::{Draft, Leaf, RecordDraft, build_record};
use crate::error::DecodeError;
use crate::pair::{KvPair, KvSource};
use crate::scalar::{parse_scalar, split_csv, split_ssv, value_error};
use crate::schema::{FieldKind, FieldMeta, TypeCache, TypeMeta, ValueStyle};

/// Decodes path-keyed pairs into records.
///
/// Cloning is cheap: clones share the same [`TypeCache`].
#[derive(Debug, Clone)]
pub struct Decoder {
    options: DecoderOptions,
    cache: Arc<TypeCache>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::from_parts(DecoderOptions::default(), TypeCache::global())
    }
}

impl Decoder {
    pub(crate) fn from_parts(options: DecoderOptions, cache: Arc<TypeCache>) -> Self {
        Self { options, cache }
    }

    /// The cache this decoder compiles into.
    pub fn cache(&self) -> &Arc<TypeCache> {
        &self.cache
    }

    /// Compile (or fetch) the key table for `T` under this decoder's options.
    pub fn type_meta<T: Facet<'static>>(&self) -> Result<Arc<TypeMeta>, DecodeError> {
        self.meta_for(T::SHAPE)
    }

    fn meta_for(&self, shape: &'static Shape) -> Result<Arc<TypeMeta>, DecodeError> {
        self.cache.get_or_compile(shape, &self.options)
    }

    /// Decode the pairs found under `prefix` into a new `T`.
    ///
    /// Pairs are processed in order. Keys outside `prefix`, keys ending in `/`
    /// and keys that match no field are ignored. Fields that receive no value
    /// take their zero value. A field without one (a skipped enum, for instance)
    /// is taken from its record's `Default`, so such records must implement it.
    pub fn decode<T: Facet<'static>>(
        &self,
        prefix: &str,
        pairs: &[KvPair],
    ) -> Result<T, DecodeError> {
        let record = self.draft::<T>(prefix, pairs)?;
        let wip = Partial::alloc_owned::<T>().map_err(ReflectError::from)?;
        let wip = build_record(wip, record, None)?;
        Ok(wip.build()?.materialize::<T>()?)
    }

    /// Decode the pairs found under `prefix` into the existing `target`.
    ///
    /// Only the fields named by a key are written. Other fields keep their value,
    /// sequences are appended to, mappings gain or replace entries, and a record
    /// already present behind an `Option` or pointer is updated rather than reset.
    /// The update is applied to a copy, so on failure `target` is left untouched.
    pub fn unmarshal<T: Facet<'static> + Clone>(
        &self,
        prefix: &str,
        pairs: &[KvPair],
        target: &mut T,
    ) -> Result<(), DecodeError> {
        let record = self.draft::<T>(prefix, pairs)?;
        let wip = Partial::alloc_owned::<T>().map_err(ReflectError::from)?;
        let wip = wip.set(target.clone())?;
        let wip = build_record(wip, record, Some(Peek::new(&*target)))?;
        *target = wip.build()?.materialize::<T>()?;
        Ok(())
    }

    /// List `prefix` from `source` and decode the result into a new `T`.
    pub fn decode_source<T, S>(&self, source: &S, prefix: &str) -> Result<T, DecodeError>
    where
        T: Facet<'static>,
        S: KvSource + ?Sized,
    {
        let pairs = source.list(prefix);
        self.decode(prefix, &pairs)
    }

    fn draft<T: Facet<'static>>(
        &self,
        prefix: &str,
        pairs: &[KvPair],
    ) -> Result<RecordDraft, DecodeError> {
        let meta = self.type_meta::<T>()?;
        let prefix = self.normalize_prefix(prefix);
        tracing::debug!(
            shape = T::SHAPE.type_identifier,
            prefix = %prefix,
            pairs = pairs.len(),
            "decoding"
        );
        self.assemble(&meta, &prefix, pairs)
    }

    /// Folded prefix ending in `/`, or empty for the whole key space.
    fn normalize_prefix(&self, prefix: &str) -> String {
        let prefix = self.options.fold(prefix);
        if prefix.is_empty() || prefix.ends_with('/') {
            prefix
        } else {
            format!("{prefix}/")
        }
    }

    /// Collect every pair under `prefix` into a draft of the record described by `meta`.
    ///
    /// `prefix` is already folded and normalized.
    fn assemble(
        &self,
        meta: &TypeMeta,
        prefix: &str,
        pairs: &[KvPair],
    ) -> Result<RecordDraft, DecodeError> {
        let mut record = RecordDraft::default();
        let mut cursor = 0;

        while cursor < pairs.len() {
            let pair = &pairs[cursor];
            cursor += 1;

            if pair.is_directory() {
                continue;
            }
            let key = self.options.fold(&pair.key);
            let Some(rest) = key.strip_prefix(prefix) else {
                tracing::trace!(key = %pair.key, prefix, "key outside prefix");
                continue;
            };

            let Some(field) = lookup(meta, rest) else {
                tracing::trace!(key = %pair.key, "no field for key");
                continue;
            };
            tracing::trace!(key = %pair.key, field = %field.name, "matched key");

            let matched = Match {
                field,
                pair,
                child: child_segment(rest, &field.name),
                exact: rest == field.name,
            };
            cursor = self
                .assign(&mut record, matched, prefix, pairs, cursor)
                .map_err(|err| err.with_key(&pair.key))?;
        }

        Ok(record)
    }

    /// Record one matched pair in `record`. Returns the cursor past every pair consumed.
    fn assign(
        &self,
        record: &mut RecordDraft,
        matched: Match<'_>,
        prefix: &str,
        pairs: &[KvPair],
        cursor: usize,
    ) -> Result<usize, DecodeError> {
        let Match {
            field,
            pair,
            child,
            exact,
        } = matched;
        let Some((terminal, path)) = field.locators.split_last() else {
            return Ok(cursor);
        };

        let mut target = record;
        for locator in path {
            target = target.nested(locator);
        }

        if !terminal.is_container() {
            if !exact {
                tracing::trace!(key = %pair.key, field = %field.name, "ignoring key below a scalar field");
                return Ok(cursor);
            }
            target.set(terminal, Draft::Leaf(self.leaf(field, pair)?));
            return Ok(cursor);
        }

        if matches!(field.style, ValueStyle::Csv | ValueStyle::Ssv) {
            let text = core::str::from_utf8(&pair.value)
                .map_err(|err| value_error(&pair.value, field.kind, err.to_string()))?;
            let tokens: Vec<String> = match field.style {
                ValueStyle::Csv => split_csv(text)
                    .map_err(|reason| value_error(&pair.value, field.kind, reason))?,
                _ => split_ssv(text).into_iter().map(String::from).collect(),
            };
            let items = target.seq(terminal);
            for token in tokens {
                items.push(Draft::Leaf(self.token_leaf(field, token, &pair.key)?));
            }
            return Ok(cursor);
        }

        if field.kind == FieldKind::Record {
            let Some(segment) = child else {
                tracing::trace!(key = %pair.key, "record container key without element segment");
                return Ok(cursor);
            };
            let group_prefix = format!("{prefix}{}/{segment}/", field.name);
            let end = cursor
                + pairs[cursor..]
                    .iter()
                    .take_while(|next| self.options.fold(&next.key).starts_with(&group_prefix))
                    .count();
            tracing::trace!(
                field = %field.name,
                segment,
                pairs = end - cursor + 1,
                "decoding container element"
            );

            let element_meta = self.meta_for(terminal.element_shape)?;
            let element = self.assemble(&element_meta, &group_prefix, &pairs[cursor - 1..end])?;
            let element = Draft::Record(element);
            if terminal.is_mapping {
                target.map(terminal).insert(segment.into(), element);
            } else {
                target.seq(terminal).push(element);
            }
            return Ok(end);
        }

        if terminal.is_mapping {
            let Some(segment) = child else {
                tracing::trace!(key = %pair.key, "mapping key without entry segment");
                return Ok(cursor);
            };
            let leaf = Draft::Leaf(self.leaf(field, pair)?);
            target.map(terminal).insert(segment.into(), leaf);
        } else {
            let leaf = Draft::Leaf(self.leaf(field, pair)?);
            target.seq(terminal).push(leaf);
        }
        Ok(cursor)
    }

    /// The terminal value of a non-delimited pair.
    fn leaf(&self, field: &FieldMeta, pair: &KvPair) -> Result<Leaf, DecodeError> {
        if field.terminal().is_blob {
            return Ok(Leaf::Blob {
                bytes: pair.value.clone(),
                key: pair.key.clone(),
            });
        }
        if field.kind == FieldKind::Text {
            let text = String::from_utf8(pair.value.clone())
                .map_err(|err| value_error(&pair.value, field.kind, err.to_string()))?;
            return Ok(Leaf::Text {
                text,
                key: pair.key.clone(),
            });
        }
        Ok(Leaf::Scalar(parse_scalar(&pair.value, field.kind)?))
    }

    fn token_leaf(&self, field: &FieldMeta, token: String, key: &str) -> Result<Leaf, DecodeError> {
        if field.kind == FieldKind::Text {
            return Ok(Leaf::Text {
                text: token,
                key: key.into(),
            });
        }
        Ok(Leaf::Scalar(parse_scalar(token.as_bytes(), field.kind)?))
    }
}

/// A pair matched to the field it populates.
struct Match<'a> {
    field: &'a FieldMeta,
    pair: &'a KvPair,
    /// Path segment right below the field's own name, folded like the rest of the key.
    child: Option<&'a str>,
    /// The key names the field itself rather than something below it.
    exact: bool,
}

/// Find the field named by `rest` or by its nearest ancestor path.
fn lookup<'m>(meta: &'m TypeMeta, rest: &str) -> Option<&'m FieldMeta> {
    let mut candidate = rest;
    loop {
        if let Some(field) = meta.get(candidate) {
            return Some(field);
        }
        candidate = candidate.rsplit_once('/')?.0;
    }
}

/// The segment of `rest` right after `name` + `/`.
///
/// `rest` is the folded key below the prefix, and `name` one of its ancestor paths.
fn child_segment<'k>(rest: &'k str, name: &str) -> Option<&'k str> {
    rest.get(name.len()..)?
        .strip_prefix('/')?
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
}
