//! CSV-W metadata reader
//!
//! Maps a CSV on the Web metadata document onto a [`MetadataBundle`]:
//!
//! | CSV-W                         | bundle                              |
//! |-------------------------------|-------------------------------------|
//! | `dct:title`                   | `metadata.title`                    |
//! | `dct:description`             | `metadata.description`              |
//! | `dct:nextRelease`             | `metadata.next_release`             |
//! | `dcat:contactPoint[0]`        | `metadata.contacts[0]`              |
//! | `dct:accrualPeriodicity`      | `metadata.release_frequency`        |
//! | `tableSchema.columns[0].name` | `metadata.unit_of_measure`          |
//! | `tableSchema.columns`         | `dimension_data`                    |
//! | `notes[].type` / `.body`      | `usage_notes[].title` / `.note`     |
//!
//! The first column is the observation column, titled `v4_N` where `N` is the
//! number of data-marking columns that follow it. After those, columns
//! alternate between a dimension's code column and its label column; the
//! label columns carry the dimension metadata.

use super::{Contact, DatasetMetadata, DimensionMetadata, MetadataBundle, UsageNote};
use crate::error::{CmdError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct CsvwDocument {
    #[serde(rename = "dct:title", default)]
    title: Option<String>,

    #[serde(rename = "dct:description", default)]
    description: Option<String>,

    #[serde(rename = "dct:nextRelease", default)]
    next_release: Option<String>,

    #[serde(rename = "dcat:contactPoint", default)]
    contact_points: Vec<CsvwContact>,

    #[serde(rename = "dct:accrualPeriodicity", default)]
    release_frequency: Option<String>,

    #[serde(rename = "tableSchema", default)]
    table_schema: Option<TableSchema>,

    #[serde(default)]
    notes: Vec<CsvwNote>,
}

#[derive(Debug, Deserialize)]
struct CsvwContact {
    #[serde(rename = "vcard:fn", default)]
    name: Option<String>,
    #[serde(rename = "vcard:tel", default)]
    telephone: Option<String>,
    #[serde(rename = "vcard:email", default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    columns: Vec<CsvwColumn>,
}

#[derive(Debug, Deserialize)]
struct CsvwColumn {
    #[serde(default)]
    titles: Option<Titles>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// `titles` may be a single string or a list of alternatives
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Titles {
    One(String),
    Many(Vec<String>),
}

impl CsvwColumn {
    fn title(&self) -> Option<&str> {
        match self.titles.as_ref()? {
            Titles::One(title) => Some(title),
            Titles::Many(titles) => titles.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvwNote {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Read a parsed CSV-W document into a bundle.
pub fn read_csvw(document: Value) -> Result<MetadataBundle> {
    let csvw: CsvwDocument = serde_json::from_value(document)
        .map_err(|e| CmdError::invalid_metadata(format!("CSV-W document: {}", e)))?;

    let mut metadata = DatasetMetadata {
        title: csvw.title,
        description: csvw.description,
        next_release: csvw.next_release,
        release_frequency: csvw.release_frequency,
        ..Default::default()
    };

    // Only the first contact point is carried over
    if let Some(contact) = csvw.contact_points.into_iter().next() {
        metadata.contacts = Some(vec![Contact {
            name: contact.name,
            telephone: contact.telephone,
            email: contact.email,
        }]);
    }

    let mut dimension_data = BTreeMap::new();
    if let Some(schema) = csvw.table_schema {
        let observation = observation_column(&schema.columns)?;
        metadata.unit_of_measure = Some(observation.name.clone().unwrap_or_default());
        dimension_data = dimensions_from_columns(&schema.columns)?;
    }

    let usage_notes = csvw
        .notes
        .into_iter()
        .map(|note| {
            serde_json::to_value(UsageNote {
                title: note.kind,
                note: note.body,
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(MetadataBundle {
        metadata,
        dimension_data,
        usage_notes,
    })
}

fn observation_column(columns: &[CsvwColumn]) -> Result<&CsvwColumn> {
    let first = columns
        .first()
        .ok_or_else(|| CmdError::invalid_metadata("tableSchema has no columns"))?;

    match first.title() {
        Some(title) if title.to_lowercase().starts_with("v4_") => Ok(first),
        other => Err(CmdError::invalid_metadata(format!(
            "first column '{}' is not the observation column (expected a v4_N title)",
            other.unwrap_or_default()
        ))),
    }
}

/// Number of data-marking columns encoded in the observation column title.
fn data_marking_count(observation: &CsvwColumn) -> Result<usize> {
    let title = observation.title().unwrap_or_default();
    title
        .rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| {
            CmdError::invalid_metadata(format!(
                "observation column title '{}' does not end in a data-marking count",
                title
            ))
        })
}

fn dimensions_from_columns(columns: &[CsvwColumn]) -> Result<BTreeMap<String, DimensionMetadata>> {
    let markings = data_marking_count(observation_column(columns)?)?;

    columns
        .iter()
        .skip(2 + markings)
        .step_by(2)
        .map(|column| {
            let name = column.title().ok_or_else(|| {
                CmdError::invalid_metadata("dimension column without a title")
            })?;
            Ok((
                name.to_string(),
                DimensionMetadata {
                    label: column.name.clone(),
                    description: column.description.clone(),
                },
            ))
        })
        .collect()
}
