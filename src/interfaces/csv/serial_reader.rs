use crate::domain::product::SerialKey;
use crate::error::{PipelineError, Result};
use std::io::Read;
use uuid::Uuid;

/// Reads serial keys from a CSV source.
///
/// Each row is `serial[,variant_id]`. A leading `serial` header row is optional,
/// blank rows are skipped, and a row without a variant falls back to the variant
/// the import was started for.
pub struct SerialReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SerialReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one unclaimed [`SerialKey`] per non-blank row.
    pub fn serials(
        self,
        product_id: Uuid,
        default_variant: Option<Uuid>,
    ) -> impl Iterator<Item = Result<SerialKey>> {
        self.reader
            .into_records()
            .enumerate()
            .filter_map(move |(index, record)| {
                let record = match record {
                    Ok(record) => record,
                    Err(e) => return Some(Err(PipelineError::from(e))),
                };
                let content = record.get(0).unwrap_or_default();
                if content.is_empty() || (index == 0 && content.eq_ignore_ascii_case("serial")) {
                    return None;
                }
                let variant_id = match record.get(1).filter(|raw| !raw.is_empty()) {
                    Some(raw) => match Uuid::parse_str(raw) {
                        Ok(id) => Some(id),
                        Err(_) => {
                            return Some(Err(PipelineError::ValidationError(format!(
                                "invalid variant id '{}' on row {}",
                                raw,
                                index + 1
                            ))));
                        }
                    },
                    None => default_variant,
                };
                Some(Ok(SerialKey::new(product_id, variant_id, content)))
            })
    }
}
