//! Row to document mapping

use serde_json::Value;
use syzgy_client::{Document, Metadata};

use crate::config::{IdSource, MappingConfig, MetadataColumns};
use crate::error::{IngestError, IngestResult};
use crate::source::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdColumn {
    RowNumber(u64),
    Column(usize),
}

/// Mapping with every column reference resolved to a position
#[derive(Debug, Clone)]
pub struct RowMapper {
    id: IdColumn,
    text_column: usize,
    vector_column: Option<usize>,
    metadata: MetadataPlan,
    headers: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
enum MetadataPlan {
    /// Every column except these
    Excluding(Vec<usize>),
    /// Exactly these, with their keys
    Only(Vec<(usize, String)>),
    Omit,
}

impl RowMapper {
    /// Resolve `config` against the source's header row
    pub fn new(config: &MappingConfig, headers: Option<&[String]>) -> IngestResult<Self> {
        let id = match &config.id {
            IdSource::RowNumber { offset } => IdColumn::RowNumber(*offset),
            IdSource::Column(column) => IdColumn::Column(column.resolve(headers)?),
        };
        let text_column = config.text_column.resolve(headers)?;
        let vector_column = config
            .vector_column
            .as_ref()
            .map(|column| column.resolve(headers))
            .transpose()?;

        let metadata = match &config.metadata {
            MetadataColumns::Remaining => {
                let mut used = vec![text_column];
                if let IdColumn::Column(index) = id {
                    used.push(index);
                }
                used.extend(vector_column);
                MetadataPlan::Excluding(used)
            }
            MetadataColumns::Columns(columns) => MetadataPlan::Only(
                columns
                    .iter()
                    .map(|column| {
                        let index = column.resolve(headers)?;
                        Ok((index, metadata_key(headers, index)))
                    })
                    .collect::<IngestResult<Vec<_>>>()?,
            ),
            MetadataColumns::Omit => MetadataPlan::Omit,
        };

        Ok(Self {
            id,
            text_column,
            vector_column,
            metadata,
            headers: headers.map(<[String]>::to_vec),
        })
    }

    /// Build the document for one row
    pub fn map(&self, row: &Row) -> IngestResult<Document> {
        let id = match self.id {
            IdColumn::RowNumber(offset) => row.index.checked_add(offset).ok_or_else(|| {
                IngestError::row(row.index, format!("id offset {offset} overflows"))
            })?,
            IdColumn::Column(column) => {
                let raw = required(row, column)?;
                raw.trim().parse::<u64>().map_err(|_| {
                    IngestError::row(row.index, format!("`{raw}` is not a valid document id"))
                })?
            }
        };

        let text = required(row, self.text_column)?;
        let mut document = Document::new(id).with_text(text);

        if let Some(column) = self.vector_column {
            let raw = required(row, column)?;
            let vector: Vec<f32> = serde_json::from_str(raw).map_err(|err| {
                IngestError::row(row.index, format!("column {column} is not a vector: {err}"))
            })?;
            document = document.with_vector(vector);
        }

        if let Some(metadata) = self.metadata(row)? {
            document = document.with_metadata(metadata);
        }
        Ok(document)
    }

    fn metadata(&self, row: &Row) -> IngestResult<Option<Metadata>> {
        match &self.metadata {
            MetadataPlan::Omit => Ok(None),
            MetadataPlan::Excluding(used) => Ok(Some(
                row.fields
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !used.contains(index))
                    .map(|(index, value)| {
                        (
                            metadata_key(self.headers.as_deref(), index),
                            Value::String(value.clone()),
                        )
                    })
                    .collect(),
            )),
            MetadataPlan::Only(columns) => {
                let mut metadata = Metadata::new();
                for (index, key) in columns {
                    let value = required(row, *index)?;
                    metadata.insert(key.clone(), Value::String(value.to_string()));
                }
                Ok(Some(metadata))
            }
        }
    }
}

fn required(row: &Row, column: usize) -> IngestResult<&str> {
    row.field(column).ok_or_else(|| {
        IngestError::row(
            row.index,
            format!("missing column {column} (row has {} fields)", row.fields.len()),
        )
    })
}

fn metadata_key(headers: Option<&[String]>, index: usize) -> String {
    headers
        .and_then(|headers| headers.get(index))
        .filter(|header| !header.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("column_{index}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ColumnRef;

    fn headers() -> Vec<String> {
        ["sentiment", "id", "user", "text", "embedding"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn row(index: u64, fields: &[&str]) -> Row {
        Row {
            index,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn row_number_ids_and_remaining_metadata() {
        let headers = headers();
        let mut config = MappingConfig::new(ColumnRef::Name("text".into()));
        config.id = IdSource::RowNumber { offset: 100 };
        let mapper = RowMapper::new(&config, Some(headers.as_slice())).unwrap();

        let document = mapper
            .map(&row(7, &["4", "1467810672", "bob", "going to bed", "[0.5]"]))
            .unwrap();

        assert_eq!(document.id, 107);
        assert_eq!(document.text.as_deref(), Some("going to bed"));
        assert!(document.vector.is_none());
        assert_eq!(
            serde_json::to_value(document.metadata.unwrap()).unwrap(),
            json!({"sentiment": "4", "id": "1467810672", "user": "bob", "embedding": "[0.5]"})
        );
    }

    #[test]
    fn id_and_vector_columns_are_excluded_from_metadata() {
        let headers = headers();
        let config = MappingConfig {
            id: IdSource::Column(ColumnRef::Name("id".into())),
            text_column: ColumnRef::Index(3),
            vector_column: Some(ColumnRef::Name("embedding".into())),
            metadata: MetadataColumns::Remaining,
        };
        let mapper = RowMapper::new(&config, Some(headers.as_slice())).unwrap();

        let document = mapper
            .map(&row(0, &["0", "42", "alice", "hello", "[0.25, 0.5]"]))
            .unwrap();

        assert_eq!(document.id, 42);
        assert_eq!(document.vector, Some(vec![0.25, 0.5]));
        assert_eq!(
            serde_json::to_value(document.metadata.unwrap()).unwrap(),
            json!({"sentiment": "0", "user": "alice"})
        );
    }

    #[test]
    fn explicit_metadata_without_headers() {
        let mut config = MappingConfig::new(ColumnRef::Index(1));
        config.metadata = MetadataColumns::Columns(vec![ColumnRef::Index(0), ColumnRef::Index(2)]);
        let mapper = RowMapper::new(&config, None).unwrap();

        let document = mapper.map(&row(3, &["a", "text", "c", "d"])).unwrap();
        assert_eq!(document.id, 3);
        assert_eq!(
            serde_json::to_value(document.metadata.unwrap()).unwrap(),
            json!({"column_0": "a", "column_2": "c"})
        );
    }

    #[test]
    fn omitted_metadata_is_not_sent() {
        let mut config = MappingConfig::new(ColumnRef::Index(0));
        config.metadata = MetadataColumns::Omit;
        let mapper = RowMapper::new(&config, None).unwrap();

        let document = mapper.map(&row(0, &["only text", "extra"])).unwrap();
        assert!(document.metadata.is_none());
    }

    #[test]
    fn short_rows_and_bad_values_are_row_errors() {
        let headers = headers();
        let config = MappingConfig {
            id: IdSource::Column(ColumnRef::Index(1)),
            text_column: ColumnRef::Index(3),
            vector_column: Some(ColumnRef::Index(4)),
            metadata: MetadataColumns::Omit,
        };
        let mapper = RowMapper::new(&config, Some(headers.as_slice())).unwrap();

        let short = mapper.map(&row(5, &["0", "1"])).unwrap_err();
        assert!(matches!(short, IngestError::Row { row: 5, .. }));

        let bad_id = mapper
            .map(&row(6, &["0", "abc", "u", "t", "[1]"]))
            .unwrap_err();
        assert!(matches!(bad_id, IngestError::Row { row: 6, .. }));

        let bad_vector = mapper
            .map(&row(7, &["0", "1", "u", "t", "not json"]))
            .unwrap_err();
        assert!(matches!(bad_vector, IngestError::Row { row: 7, .. }));
    }

    #[test]
    fn unknown_column_names_fail_up_front() {
        let headers = headers();
        let config = MappingConfig::new(ColumnRef::Name("body".into()));
        assert!(matches!(
            RowMapper::new(&config, Some(headers.as_slice())),
            Err(IngestError::Config(_))
        ));
    }
}
