//! The conversion pipeline: one linear pass per notice.
//!
//! `Detect → Lookup → [Extract → Merge]* → Freeze`. No retries, no
//! backtracking; a failing extractor is isolated with a warning and the
//! pipeline continues, so one faulty business term never costs the notice
//! its whole release. Only an unparsable document aborts the conversion.
//!
//! A converter is immutable once built and holds no per-notice state, so
//! callers may convert many notices in parallel against one instance; every
//! call gets its own release and parsed tree.

use tracing::{info, warn};

use crate::assembler::Assembler;
use crate::detect::{FormClassification, FormTable};
use crate::document::Notice;
use crate::error::{ConvertError, Warning};
use crate::registry::ExtractorRegistry;
use crate::release::Release;
use crate::schema::MergeSchema;

/// Result of converting one notice: the frozen release plus everything that
/// was recovered from along the way.
pub struct Conversion {
    pub release: Release,
    pub classification: FormClassification,
    pub warnings: Vec<Warning>,
}

impl Conversion {
    /// True when the conversion produced no warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// The notice converter: registry, merge schema, and forms table wired
/// together.
pub struct Converter {
    registry: ExtractorRegistry,
    schema: MergeSchema,
    forms: FormTable,
}

impl Converter {
    /// Converter with the built-in extractors and embedded tables.
    pub fn new() -> Result<Self, ConvertError> {
        let registry = ExtractorRegistry::builtin().map_err(ConvertError::Config)?;
        Self::with_parts(registry, MergeSchema::embedded().map_err(ConvertError::Config)?, None)
    }

    /// Built-in converter with a custom ocid prefix.
    pub fn with_ocid_prefix(prefix: &str) -> Result<Self, ConvertError> {
        let registry =
            ExtractorRegistry::from_extractors(crate::extractors::builtin_with_prefix(prefix))
                .map_err(ConvertError::Config)?;
        Self::with_parts(registry, MergeSchema::embedded().map_err(ConvertError::Config)?, None)
    }

    /// Assemble a converter from explicit parts. A `None` forms table falls
    /// back to the embedded one.
    pub fn with_parts(
        registry: ExtractorRegistry,
        schema: MergeSchema,
        forms: Option<FormTable>,
    ) -> Result<Self, ConvertError> {
        let forms = match forms {
            Some(forms) => forms,
            None => FormTable::embedded().map_err(ConvertError::Config)?,
        };
        Ok(Self {
            registry,
            schema,
            forms,
        })
    }

    /// Convert one notice from raw bytes.
    pub fn convert_bytes(&self, bytes: &[u8]) -> Result<Conversion, ConvertError> {
        let text = std::str::from_utf8(bytes)?;
        self.convert_str(text)
    }

    /// Convert one notice from XML text.
    ///
    /// # Errors
    /// Only an unparsable document fails; everything else degrades to
    /// warnings on the returned conversion.
    pub fn convert_str(&self, xml: &str) -> Result<Conversion, ConvertError> {
        let doc = roxmltree::Document::parse(xml)?;
        let classification = self.forms.classify(&doc);

        let mut warnings = Vec::new();
        if !classification.is_known() {
            warn!("document form family could not be determined");
            warnings.push(Warning::Unclassified);
        }

        let notice = Notice::new(&doc, classification.clone());
        let assembler = Assembler::new(&self.schema);
        let mut release = Release::new();

        for extractor in self.registry.applicable(&classification) {
            match extractor.extract(&notice) {
                Ok(Some(fragment)) => {
                    assembler.merge_fragment(&mut release, &fragment, &mut warnings);
                }
                Ok(None) => {}
                Err(message) => {
                    warn!(extractor = extractor.id(), %message, "extractor failed");
                    warnings.push(Warning::ExtractorFailed {
                        extractor: extractor.id().to_string(),
                        message,
                    });
                }
            }
        }

        release.freeze();
        info!(
            family = %classification.family,
            warnings = warnings.len(),
            "notice converted"
        );

        Ok(Conversion {
            release,
            classification,
            warnings,
        })
    }
}
