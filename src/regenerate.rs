//! Identifier regeneration
//!
//! Derives a new submission from an existing device document: a fresh Basic
//! UDI-DI (GMN check characters), a fresh GTIN-14 UDI-DI per UDI-DI entry, the
//! matching model label, reference number and cross-link, and new envelope
//! tracking identifiers. The input document is never modified in place.

use crate::checksum::{gmn_check_characters, gtin_check_digit, GTIN14_BASE_LENGTH};
use crate::documents::{Document, Element, WriteOptions};
use crate::envelope::format_timestamp;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{eudamed, QName};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of a regeneration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerateOptions {
    /// Manufacturer prefix of the Basic UDI-DI
    pub manufacturer_prefix: String,
    /// Leading digits of the GTIN-14; the rest of the 13-digit base is random
    pub gtin_prefix: String,
    /// Model reference used when no suffix can be extracted
    pub fallback_suffix: String,
    /// Prefix of the regenerated model label
    pub model_label_prefix: String,
    /// Older document to take the model reference from
    pub reference: Option<PathBuf>,
}

impl Default for RegenerateOptions {
    fn default() -> Self {
        Self {
            manufacturer_prefix: "599302".to_string(),
            gtin_prefix: "0599302".to_string(),
            fallback_suffix: "877PAY".to_string(),
            model_label_prefix: "Test-".to_string(),
            reference: None,
        }
    }
}

/// Where the model reference suffix was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixSource {
    /// Basic UDI-DI of the input document
    Current,
    /// Basic UDI-DI of the reference document
    Reference,
    /// Configured fallback
    Fallback,
}

/// Identifiers written by a regeneration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regenerated {
    /// Model reference suffix
    pub suffix: String,
    /// Origin of the suffix
    pub suffix_source: SuffixSource,
    /// New Basic UDI-DI
    pub basic_udi: String,
    /// New UDI-DI per UDI-DI entry, in document order
    pub udi_dis: Vec<String>,
    /// New message identifier, if the document has an envelope
    pub message_id: Option<String>,
}

/// Model reference suffix from the Basic UDI-DI of the document being regenerated.
///
/// The last two characters are check characters. The suffix is what follows the
/// manufacturer prefix; identifiers with a different prefix but at least twelve
/// characters yield the characters between position 6 and the check characters.
pub fn extract_suffix(basic_udi: &str, manufacturer_prefix: &str) -> Option<String> {
    let chars: Vec<char> = basic_udi.trim().chars().collect();
    if chars.len() <= 8 {
        return None;
    }
    let base: String = chars[..chars.len() - 2].iter().collect();
    if let Some(rest) = base.strip_prefix(manufacturer_prefix) {
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
    }
    if chars.len() >= 12 {
        return Some(chars[6..chars.len() - 2].iter().collect());
    }
    None
}

/// Model reference suffix from a reference document: the last six characters
/// before the check characters
pub fn extract_reference_suffix(basic_udi: &str) -> Option<String> {
    let chars: Vec<char> = basic_udi.trim().chars().collect();
    if chars.len() <= 8 {
        return None;
    }
    let base = &chars[..chars.len() - 2];
    Some(base[base.len().saturating_sub(6)..].iter().collect())
}

/// Basic UDI-DI from manufacturer prefix and model reference
pub fn new_basic_udi(manufacturer_prefix: &str, suffix: &str) -> Result<String> {
    let base = format!("{}{}", manufacturer_prefix, suffix);
    let check = gmn_check_characters(&base)?;
    Ok(base + &check)
}

/// GTIN-14 with random digits after `gtin_prefix`
pub fn new_gtin<R: Rng + ?Sized>(gtin_prefix: &str, rng: &mut R) -> Result<String> {
    let mut base = gtin_prefix.to_string();
    while base.len() < GTIN14_BASE_LENGTH {
        base.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    let check = gtin_check_digit(&base)?;
    Ok(base + &check)
}

fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

fn device(local: &str) -> QName {
    QName::namespaced(eudamed::DEVICE, local)
}

fn basic(local: &str) -> QName {
    QName::namespaced(eudamed::BASIC_UDI, local)
}

fn udidi(local: &str) -> QName {
    QName::namespaced(eudamed::UDI_DI, local)
}

fn common(local: &str) -> QName {
    QName::namespaced(eudamed::COMMON_DI, local)
}

fn message(local: &str) -> QName {
    QName::namespaced(eudamed::MESSAGE, local)
}

/// Rewrites the identifiers of a device document
#[derive(Debug, Clone, Default)]
pub struct Regenerator {
    options: RegenerateOptions,
    reference: Option<Document>,
}

impl Regenerator {
    /// Create a regenerator
    pub fn new(options: RegenerateOptions) -> Self {
        Self {
            options,
            reference: None,
        }
    }

    /// Use an older document as second source of the model reference
    pub fn with_reference(mut self, reference: Document) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Rewrite the identifiers of `doc`
    pub fn run<R: Rng + ?Sized>(&self, doc: &mut Document, rng: &mut R) -> Result<Regenerated> {
        let root = doc
            .root_mut()
            .ok_or_else(|| Error::StructureMismatch("Document has no root element".to_string()))?;
        let basic_code = [device("MDRBasicUDI"), basic("identifier"), common("DICode")];

        let (suffix, suffix_source) = self.find_suffix(root, &basic_code);
        log::info!("Model reference '{}' ({:?})", suffix, suffix_source);

        let basic_udi = new_basic_udi(&self.options.manufacturer_prefix, &suffix)?;
        if !root.replace_text(&basic_code, basic_udi.as_str()) {
            log::warn!("Document has no Basic UDI-DI code");
        }
        root.replace_text(
            &[device("MDRBasicUDI"), basic("model")],
            format!("{}{}", self.options.model_label_prefix, suffix),
        );

        let udi_data = device("MDRUDIDIData");
        let entries = root.descendants_named(&udi_data).len();
        if entries == 0 {
            log::warn!("Document has no UDI-DI entries");
        }
        let udi_dis = (0..entries)
            .map(|_| new_gtin(&self.options.gtin_prefix, rng))
            .collect::<Result<Vec<_>>>()?;

        let mut next = udi_dis.iter();
        root.visit_mut(&mut |element| {
            if element.qname != udi_data {
                return;
            }
            if let Some(gtin) = next.next() {
                element.replace_text(&[udidi("identifier"), common("DICode")], gtin.as_str());
                element.replace_text(&[udidi("referenceNumber")], gtin.as_str());
                element.replace_text(
                    &[udidi("basicUDIIdentifier"), common("DICode")],
                    basic_udi.as_str(),
                );
            }
        });

        let message_id = random_uuid(rng);
        let correlation_id = random_uuid(rng);
        let has_envelope = root.replace_text(&[message("messageID")], message_id.as_str());
        root.replace_text(&[message("correlationID")], correlation_id);
        root.replace_text(
            &[message("creationDateTime")],
            format_timestamp(Utc::now()),
        );

        log::info!("New Basic UDI-DI {}, UDI-DI {}", basic_udi, udi_dis.join(", "));
        Ok(Regenerated {
            suffix,
            suffix_source,
            basic_udi,
            udi_dis,
            message_id: has_envelope.then_some(message_id),
        })
    }

    fn find_suffix(&self, root: &Element, basic_code: &[QName]) -> (String, SuffixSource) {
        if let Some(suffix) = root
            .find_text(basic_code)
            .and_then(|code| extract_suffix(code, &self.options.manufacturer_prefix))
        {
            return (suffix, SuffixSource::Current);
        }
        if let Some(suffix) = self
            .reference
            .as_ref()
            .and_then(Document::root)
            .and_then(|reference| reference.find_text(basic_code))
            .and_then(extract_reference_suffix)
        {
            return (suffix, SuffixSource::Reference);
        }
        (self.options.fallback_suffix.clone(), SuffixSource::Fallback)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!(
        (fs::canonicalize(a), fs::canonicalize(b)),
        (Ok(x), Ok(y)) if x == y
    )
}

/// Regenerate `input` into a new file `output`
pub fn regenerate_file<R: Rng + ?Sized>(
    input: &Path,
    output: &Path,
    options: &RegenerateOptions,
    limits: &Limits,
    rng: &mut R,
) -> Result<Regenerated> {
    if same_file(input, output) {
        return Err(Error::Config(format!(
            "output {} would overwrite the input document",
            output.display()
        )));
    }

    let mut doc = Document::from_file(input, limits)?;
    let mut regenerator = Regenerator::new(options.clone());
    if let Some(reference) = &options.reference {
        match Document::from_file(reference, limits) {
            Ok(reference) => regenerator = regenerator.with_reference(reference),
            Err(e) => log::warn!("Could not read reference {}: {}", reference.display(), e),
        }
    }

    let result = regenerator.run(&mut doc, rng)?;
    doc.write_to_file(output, &WriteOptions::default())?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{is_valid_gmn, is_valid_gtin14};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PUSH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<m:Push xmlns:m="https://ec.europa.eu/tools/eudamed/dtx/servicemodel/Message/v1"
        xmlns:device="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/v1"
        xmlns:basicudi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1"
        xmlns:udidi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1"
        xmlns:commondi="https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1">
  <m:correlationID>old-corr</m:correlationID>
  <m:creationDateTime>2020-01-01T00:00:00.000000Z</m:creationDateTime>
  <m:messageID>old-msg</m:messageID>
  <m:payload>
    <device:MDRDevice>
      <device:MDRBasicUDI>
        <basicudi:identifier><commondi:DICode>599302677TAYU3</commondi:DICode></basicudi:identifier>
        <basicudi:model>Old</basicudi:model>
      </device:MDRBasicUDI>
      <device:MDRUDIDIData>
        <udidi:identifier><commondi:DICode>05993020000004</commondi:DICode></udidi:identifier>
        <udidi:basicUDIIdentifier><commondi:DICode>old</commondi:DICode></udidi:basicUDIIdentifier>
        <udidi:referenceNumber>old-ref</udidi:referenceNumber>
      </device:MDRUDIDIData>
      <device:MDRUDIDIData>
        <udidi:identifier><commondi:DICode>05993020000011</commondi:DICode></udidi:identifier>
        <udidi:referenceNumber>old-ref</udidi:referenceNumber>
      </device:MDRUDIDIData>
    </device:MDRDevice>
  </m:payload>
</m:Push>
"#;

    #[test]
    fn test_extract_suffix_from_current() {
        assert_eq!(extract_suffix("599302877PAYU9", "599302").as_deref(), Some("877PAY"));
        assert_eq!(extract_suffix(" 599302677TAYU3 ", "599302").as_deref(), Some("677TAY"));
        assert_eq!(extract_suffix("123456ABCDEF99", "599302").as_deref(), Some("ABCDEF"));
        assert_eq!(extract_suffix("5993021234", "599302").as_deref(), Some("12"));
        assert_eq!(extract_suffix("1234567890", "599302"), None);
        assert_eq!(extract_suffix("59930212", "599302"), None);
    }

    #[test]
    fn test_extract_reference_suffix() {
        assert_eq!(extract_reference_suffix("599302677TAYU3").as_deref(), Some("677TAY"));
        assert_eq!(extract_reference_suffix("ABCDEFGHI").as_deref(), Some("BCDEFG"));
        assert_eq!(extract_reference_suffix("SHORT"), None);
    }

    #[test]
    fn test_new_basic_udi() {
        assert_eq!(new_basic_udi("599302", "877PAY").unwrap(), "599302877PAYU9");
        assert!(matches!(
            new_basic_udi("59", "877"),
            Err(Error::InvalidLength { .. })
        ));
        assert!(matches!(
            new_basic_udi("599302", "87 PAY"),
            Err(Error::InvalidCharacter { .. })
        ));
    }

    #[test]
    fn test_new_gtin() {
        let mut rng = StdRng::seed_from_u64(7);
        let gtin = new_gtin("0599302", &mut rng).unwrap();
        assert_eq!(gtin.len(), 14);
        assert!(gtin.starts_with("0599302"));
        assert!(is_valid_gtin14(&gtin));

        assert!(matches!(
            new_gtin("05993020000000", &mut rng),
            Err(Error::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_run_rewrites_identifiers() {
        let mut doc = Document::from_string(PUSH_XML).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let result = Regenerator::new(RegenerateOptions::default())
            .run(&mut doc, &mut rng)
            .unwrap();

        assert_eq!(result.suffix, "677TAY");
        assert_eq!(result.suffix_source, SuffixSource::Current);
        assert_eq!(result.basic_udi, "599302677TAYU3");
        assert!(is_valid_gmn(&result.basic_udi));
        assert_eq!(result.udi_dis.len(), 2);
        assert!(result.udi_dis.iter().all(|g| is_valid_gtin14(g)));

        let root = doc.root().unwrap();
        assert_eq!(
            root.find_text(&[device("MDRBasicUDI"), basic("model")]),
            Some("Test-677TAY")
        );

        let entries = root.descendants_named(&device("MDRUDIDIData"));
        for (entry, gtin) in entries.iter().zip(&result.udi_dis) {
            assert_eq!(
                entry.find_text(&[udidi("identifier"), common("DICode")]),
                Some(gtin.as_str())
            );
            assert_eq!(entry.find_text(&[udidi("referenceNumber")]), Some(gtin.as_str()));
        }
        assert_eq!(
            entries[0].find_text(&[udidi("basicUDIIdentifier"), common("DICode")]),
            Some("599302677TAYU3")
        );

        let message_id = root.find_text(&[message("messageID")]).unwrap();
        assert_eq!(Some(message_id), result.message_id.as_deref());
        assert!(uuid::Uuid::parse_str(message_id).is_ok());
        assert_ne!(root.find_text(&[message("correlationID")]), Some("old-corr"));
        assert_ne!(
            root.find_text(&[message("creationDateTime")]),
            Some("2020-01-01T00:00:00.000000Z")
        );
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut doc = Document::from_string(PUSH_XML).unwrap();
            let mut rng = StdRng::seed_from_u64(1);
            Regenerator::new(RegenerateOptions::default())
                .run(&mut doc, &mut rng)
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_suffix_from_reference_then_fallback() {
        let short = PUSH_XML.replace("599302677TAYU3", "SHORT");
        let reference = Document::from_string(PUSH_XML).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let mut doc = Document::from_string(&short).unwrap();
        let result = Regenerator::new(RegenerateOptions::default())
            .with_reference(reference)
            .run(&mut doc, &mut rng)
            .unwrap();
        assert_eq!(result.suffix, "677TAY");
        assert_eq!(result.suffix_source, SuffixSource::Reference);

        let mut doc = Document::from_string(&short).unwrap();
        let result = Regenerator::new(RegenerateOptions::default())
            .run(&mut doc, &mut rng)
            .unwrap();
        assert_eq!(result.suffix, "877PAY");
        assert_eq!(result.suffix_source, SuffixSource::Fallback);
        assert_eq!(result.basic_udi, "599302877PAYU9");
    }

    #[test]
    fn test_regenerate_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("device.xml");
        let output = dir.path().join("out").join("device_new.xml");
        fs::write(&input, PUSH_XML).unwrap();

        let mut rng = StdRng::seed_from_u64(9);
        let options = RegenerateOptions::default();
        let result =
            regenerate_file(&input, &output, &options, &Limits::default(), &mut rng).unwrap();

        assert_eq!(fs::read_to_string(&input).unwrap(), PUSH_XML);
        let written = Document::from_file(&output, &Limits::default()).unwrap();
        assert_eq!(
            written
                .root()
                .unwrap()
                .find_text(&[device("MDRBasicUDI"), basic("identifier"), common("DICode")]),
            Some(result.basic_udi.as_str())
        );

        let same = regenerate_file(&input, &input, &options, &Limits::default(), &mut rng);
        assert!(matches!(same, Err(Error::Config(_))));
    }
}
