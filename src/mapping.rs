use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const UNKNOWN_FAMILY: &str = "Unknown";
pub const DEFAULT_VARIANT: &str = "regular";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRecord {
    pub family: String,
    pub variant: String,
}

impl FontRecord {
    pub fn new(family: impl Into<String>, variant: impl Into<String>) -> Self {
        FontRecord {
            family: family.into(),
            variant: variant.into(),
        }
    }

    /// Stands in for class indices the table does not know about.
    pub fn unknown() -> Self {
        FontRecord::new(UNKNOWN_FAMILY, DEFAULT_VARIANT)
    }
}

/// Class index to font lookup, keyed by the decimal form of the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FontMapping {
    fonts: HashMap<String, FontRecord>,
}

impl FontMapping {
    /// The two-entry placeholder table used when no mapping file is given.
    pub fn builtin() -> Self {
        [
            ("0", FontRecord::new("Roboto", DEFAULT_VARIANT)),
            ("1", FontRecord::new("Open Sans", DEFAULT_VARIANT)),
        ]
        .into_iter()
        .collect()
    }

    /// Read a tab-separated table of `index<TAB>family[<TAB>variant]` rows.
    ///
    /// Blank lines and `#` comments are skipped, as is a leading header row
    /// (a first row whose index column is not a number). A missing variant
    /// means `regular`.
    pub fn from_tsv_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut fonts = HashMap::new();
        let mut seen_row = false;

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = number + 1;
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
                continue;
            }

            let mut columns = trimmed.split('\t').map(str::trim);
            let index = columns.next().unwrap_or_default();
            if index.parse::<usize>().is_err() {
                if !seen_row {
                    seen_row = true;
                    debug!(line = line_no, "skipping header row");
                    continue;
                }
                return Err(Error::Mapping {
                    line: line_no,
                    reason: format!("invalid class index {index:?}"),
                });
            }
            seen_row = true;

            let family = match columns.next() {
                Some(family) if !family.is_empty() => family,
                _ => {
                    return Err(Error::Mapping {
                        line: line_no,
                        reason: "missing font family".to_string(),
                    })
                }
            };
            let variant = match columns.next() {
                Some(variant) if !variant.is_empty() => variant,
                _ => DEFAULT_VARIANT,
            };

            // normalize "007" to "7" so lookups by index hit
            let key = index.parse::<usize>().map(|i| i.to_string()).unwrap_or_default();
            if fonts.insert(key, FontRecord::new(family, variant)).is_some() {
                warn!(line = line_no, index, "duplicate class index, keeping the last one");
            }
        }

        debug!(fonts = fonts.len(), "font mapping loaded");
        Ok(FontMapping { fonts })
    }

    pub fn from_tsv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        FontMapping::from_tsv_reader(BufReader::new(file))
    }

    pub fn get(&self, key: &str) -> Option<&FontRecord> {
        self.fonts.get(key)
    }

    /// Record for a class index, [`FontRecord::unknown`] if there is none.
    pub fn lookup(&self, index: usize) -> FontRecord {
        match self.get(&index.to_string()) {
            Some(record) => record.clone(),
            None => {
                debug!(index, "class index missing from font mapping");
                FontRecord::unknown()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FontRecord)> for FontMapping {
    fn from_iter<T: IntoIterator<Item = (K, FontRecord)>>(iter: T) -> Self {
        FontMapping {
            fonts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
