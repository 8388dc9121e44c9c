//! One-pass, event-driven scan of a Health export document.
//!
//! Only the current event is held in memory, plus the stack of open element
//! names the tokenizer keeps for end-tag matching, so memory grows with
//! nesting depth and never with document size.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;

use crate::error::{ExtractError, Result};

use super::record::{STEP_COUNT_TYPE, StepRecord};

const RECORD_TAG: &[u8] = b"Record";

/// Stream `input` and invoke `on_record` for every step-count `Record`, in
/// document order.
///
/// Every other element is skipped without inspecting its attributes. Any
/// tokenizer failure, structural error, or unusable step record aborts the
/// scan immediately; records already delivered are the caller's to discard.
///
/// Returns the number of step records delivered.
pub fn parse<B: BufRead>(input: B, mut on_record: impl FnMut(StepRecord)) -> Result<u64> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().check_end_names = true;

    let mut buf = Vec::with_capacity(1024);
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut delivered = 0u64;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) => return Err(xml_error(err, reader.buffer_position())),
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if depth == 0 {
                    if seen_root {
                        return Err(invalid("content after the root element", &reader));
                    }
                    seen_root = true;
                }
                if let Some(record) = step_record(e)? {
                    on_record(record);
                    delivered += 1;
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| invalid("unmatched end tag", &reader))?;
            }
            Event::Text(ref t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(invalid("text outside the root element", &reader));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(invalid("CDATA outside the root element", &reader));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ExtractError::InvalidDocument(
            "document has no root element".to_string(),
        ));
    }
    if depth > 0 {
        return Err(ExtractError::InvalidDocument(format!(
            "document ended with {depth} unclosed element(s)"
        )));
    }

    Ok(delivered)
}

/// Extract a [`StepRecord`] when `e` is a step-count `Record`.
fn step_record(e: &BytesStart<'_>) -> Result<Option<StepRecord>> {
    if e.name().as_ref() != RECORD_TAG {
        return Ok(None);
    }

    let mut kind = None;
    let mut value = None;
    let mut start_date = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|err| ExtractError::InvalidDocument(err.to_string()))?;
        let slot = match attr.key.as_ref() {
            b"type" => &mut kind,
            b"value" => &mut value,
            b"startDate" => &mut start_date,
            _ => continue,
        };
        let text = attr
            .unescape_value()
            .map_err(|err| ExtractError::InvalidDocument(err.to_string()))?;
        *slot = Some(text.into_owned());
    }

    if kind.as_deref() != Some(STEP_COUNT_TYPE) {
        return Ok(None);
    }

    let value = value.ok_or_else(|| missing("value"))?;
    let start_date = start_date.ok_or_else(|| missing("startDate"))?;
    StepRecord::from_attributes(&value, &start_date).map(Some)
}

fn missing(attribute: &str) -> ExtractError {
    ExtractError::InvalidDocument(format!("step record is missing its '{attribute}' attribute"))
}

fn invalid<B>(what: &str, reader: &Reader<B>) -> ExtractError {
    ExtractError::InvalidDocument(format!("{what} at byte {}", reader.buffer_position()))
}

fn xml_error(err: quick_xml::Error, position: impl std::fmt::Display) -> ExtractError {
    match err {
        quick_xml::Error::Io(io) => ExtractError::stream(&io),
        other => ExtractError::InvalidDocument(format!("{other} at byte {position}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn scan(xml: &str) -> Result<Vec<StepRecord>> {
        let mut records = Vec::new();
        parse(xml.as_bytes(), |r| records.push(r))?;
        Ok(records)
    }

    fn kind_of(xml: &str) -> ErrorKind {
        scan(xml).unwrap_err().kind()
    }

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE HealthData [
<!ELEMENT HealthData (ExportDate,Me,(Record|Correlation|Workout)*)>
<!ATTLIST Record type CDATA #REQUIRED>
]>
<HealthData locale="en_NL">
 <ExportDate value="2024-02-01 10:00:00 +0100"/>
 <Me HKCharacteristicTypeIdentifierDateOfBirth=""/>
 <Record type="HKQuantityTypeIdentifierStepCount" sourceName="Phone" unit="count" startDate="2024-01-02 09:00:00 +0100" endDate="2024-01-02 09:10:00 +0100" value="300"/>
 <Record type="HKQuantityTypeIdentifierHeartRate" unit="count/min" startDate="2024-01-01 09:00:00 +0100" value="61"/>
 <Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0100" value="100">
  <MetadataEntry key="HKWasUserEntered" value="1"/>
 </Record>
</HealthData>
"#;

    #[test]
    fn yields_step_records_in_document_order() {
        let records = scan(EXPORT).unwrap();
        let steps: Vec<u64> = records.iter().map(|r| r.steps).collect();
        assert_eq!(steps, vec![300, 100]);
    }

    #[test]
    fn ignores_other_record_types() {
        let records = scan(EXPORT).unwrap();
        assert!(records.iter().all(|r| r.steps != 61));
    }

    #[test]
    fn document_without_step_records_is_valid() {
        let records = scan("<HealthData><Workout/></HealthData>").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn truncated_record_is_invalid() {
        assert_eq!(kind_of("<Record "), ErrorKind::InvalidDocument);
    }

    #[test]
    fn empty_input_is_invalid() {
        assert_eq!(kind_of(""), ErrorKind::InvalidDocument);
        assert_eq!(kind_of("  \n"), ErrorKind::InvalidDocument);
    }

    #[test]
    fn unclosed_root_is_invalid() {
        assert_eq!(kind_of("<HealthData><Record/>"), ErrorKind::InvalidDocument);
    }

    #[test]
    fn mismatched_end_tag_is_invalid() {
        assert_eq!(kind_of("<HealthData><Me></Record></HealthData>"), ErrorKind::InvalidDocument);
    }

    #[test]
    fn second_root_is_invalid() {
        assert_eq!(kind_of("<HealthData/><HealthData/>"), ErrorKind::InvalidDocument);
    }

    #[test]
    fn trailing_text_is_invalid() {
        assert_eq!(kind_of("<HealthData/>junk"), ErrorKind::InvalidDocument);
    }

    #[test]
    fn step_record_without_value_is_invalid() {
        let xml = r#"<HealthData><Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000"/></HealthData>"#;
        assert_eq!(kind_of(xml), ErrorKind::InvalidDocument);
    }

    #[test]
    fn error_after_valid_records_still_fails() {
        let xml = r#"<HealthData><Record type="HKQuantityTypeIdentifierStepCount" startDate="2024-01-01 08:00:00 +0000" value="5"/><Broken"#;
        let mut seen = 0;
        let result = parse(xml.as_bytes(), |_| seen += 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidDocument);
        assert_eq!(seen, 1);
    }

    #[test]
    fn unescapes_attribute_values() {
        let xml = r#"<HealthData><Record type="HKQuantityTypeIdentifierStep&#67;ount" startDate="2024-01-01 08:00:00 +0000" value="7"/></HealthData>"#;
        let records = scan(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].steps, 7);
    }
}
