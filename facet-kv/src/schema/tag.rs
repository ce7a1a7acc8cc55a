use facet_core::Field;

use super::ValueStyle;
use crate::error::DecodeError;

/// Attributes of one field, read from the configured namespace.
#[derive(Debug, Default)]
pub(super) struct FieldTag {
    /// Key name from the tag, empty when the field has none.
    pub primary: &'static str,
    pub skip: bool,
    pub json: bool,
    pub csv: bool,
    pub ssv: bool,
}

impl FieldTag {
    /// `tag = "name,mod,..."` is read first, then `rename` and the marker
    /// attributes refine it.
    pub fn read(field: &Field, ns: &str) -> Self {
        let ns = Some(ns);
        let mut tag = FieldTag::default();

        if let Some(raw) = str_attr(field, ns, "tag") {
            let mut parts = raw.split(',');
            tag.primary = parts.next().unwrap_or_default().trim();
            for modifier in parts {
                match modifier.trim() {
                    "json" => tag.json = true,
                    "csv" => tag.csv = true,
                    "ssv" => tag.ssv = true,
                    other => {
                        tracing::trace!(field = field.name, modifier = other, "unknown tag modifier")
                    }
                }
            }
        }

        if let Some(rename) = str_attr(field, ns, "rename") {
            tag.primary = rename;
        }

        tag.json |= field.has_attr(ns, "json");
        tag.csv |= field.has_attr(ns, "csv");
        tag.ssv |= field.has_attr(ns, "ssv");
        // A primary of `-` is left to the name resolver.
        tag.skip = field.has_attr(ns, "skip") || field.should_skip_deserializing();

        tag
    }

    pub fn style(&self, name: &str) -> Result<ValueStyle, DecodeError> {
        match (self.json, self.csv, self.ssv) {
            (false, false, false) => Ok(ValueStyle::Plain),
            (true, false, false) => Ok(ValueStyle::Json),
            (false, true, false) => Ok(ValueStyle::Csv),
            (false, false, true) => Ok(ValueStyle::Ssv),
            _ => Err(DecodeError::unsupported(
                name,
                "json, csv and ssv are mutually exclusive",
            )),
        }
    }
}

fn str_attr(field: &Field, ns: Option<&str>, key: &str) -> Option<&'static str> {
    field
        .get_attr(ns, key)
        .and_then(|attr| attr.get_as::<&str>().copied())
}
