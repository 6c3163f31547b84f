//! imzML document rendering.
//!
//! Streams the metadata document from a finished session's record sequence.
//! The element layout follows the imzML 1.1 schema: a fixed header (cvList,
//! fileDescription, referenceable param groups, software, scan settings,
//! instrument and data processing), then one `<spectrum>` per record with
//! external offset/length cvParams pointing into the ibd sidecar.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::config::{WriteMode, WriterConfig};
use crate::cv::{ims, ms, CvParam};
use crate::ibd::ArrayLocation;
use crate::spectrum::SpectrumRecord;

/// Isolation window offset written when the caller supplied none
const DEFAULT_ISOLATION_OFFSET: f64 = 0.5;

/// Errors raised while rendering the document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

type Result<T> = std::result::Result<T, DocumentError>;

/// Everything the renderer needs from a finished session
pub(crate) struct DocumentContext<'a> {
    pub config: &'a WriterConfig,
    pub run_id: &'a str,
    /// Braced uppercase UUID, e.g. `{1A2B...}`
    pub uuid: String,
    /// Uppercase hex SHA-1 over the full ibd content
    pub sha1: String,
    /// Resolved mode label (never `Auto`)
    pub mode: WriteMode,
    pub records: &'a [SpectrumRecord],
    /// Distinct MS levels in first-seen order
    pub ms_levels: &'a [u8],
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_size_x: Option<f64>,
    pub pixel_size_y: Option<f64>,
}

pub(crate) fn render<W: Write>(sink: W, ctx: &DocumentContext) -> Result<()> {
    let mut w = Writer::new_with_indent(sink, b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("ISO-8859-1"), None)))?;

    start(
        &mut w,
        "mzML",
        &[
            ("xmlns", "http://psi.hupo.org/ms/mzml"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            (
                "xsi:schemaLocation",
                "http://psi.hupo.org/ms/mzml http://psidev.info/files/ms/mzML/xsd/mzML1.1.0_idx.xsd",
            ),
            ("version", "1.1"),
        ],
    )?;

    write_cv_list(&mut w)?;
    write_file_description(&mut w, ctx)?;
    write_referenceable_param_groups(&mut w, ctx)?;
    write_software_list(&mut w)?;
    write_scan_settings(&mut w, ctx)?;
    write_instrument_configuration(&mut w)?;
    write_data_processing(&mut w)?;
    write_run(&mut w, ctx)?;

    end(&mut w, "mzML")
}

fn write_cv_list<W: Write>(w: &mut Writer<W>) -> Result<()> {
    start(w, "cvList", &[("count", "3")])?;
    empty(
        w,
        "cv",
        &[
            ("URI", "http://psidev.cvs.sourceforge.net/*checkout*/psidev/psi/psi-ms/mzML/controlledVocabulary/psi-ms.obo"),
            ("fullName", "Proteomics Standards Initiative Mass Spectrometry Ontology"),
            ("id", "MS"),
            ("version", "3.65.0"),
        ],
    )?;
    empty(
        w,
        "cv",
        &[
            ("URI", "http://obo.cvs.sourceforge.net/*checkout*/obo/obo/ontology/phenotype/unit.obo"),
            ("fullName", "Unit Ontology"),
            ("id", "UO"),
            ("version", "12:10:2011"),
        ],
    )?;
    empty(
        w,
        "cv",
        &[
            ("URI", "http://www.maldi-msi.org/download/imzml/imagingMS.obo"),
            ("fullName", "Imaging MS Ontology"),
            ("id", "IMS"),
            ("version", "0.9.1"),
        ],
    )?;
    end(w, "cvList")
}

fn write_file_description<W: Write>(w: &mut Writer<W>, ctx: &DocumentContext) -> Result<()> {
    start(w, "fileDescription", &[])?;
    start(w, "fileContent", &[])?;
    for &level in ctx.ms_levels {
        cv_param(w, &ms::spectrum_kind(level))?;
    }
    cv_param(w, &ms::spectrum_type(ctx.config.spectrum_type))?;
    cv_param(w, &ims::mode(ctx.mode))?;
    cv_param(w, &ims::uuid(&ctx.uuid))?;
    cv_param(w, &ims::ibd_sha1(&ctx.sha1))?;
    end(w, "fileContent")?;
    end(w, "fileDescription")
}

fn write_referenceable_param_groups<W: Write>(
    w: &mut Writer<W>,
    ctx: &DocumentContext,
) -> Result<()> {
    let count = if ctx.config.include_mobility { "5" } else { "4" };
    start(w, "referenceableParamGroupList", &[("count", count)])?;

    start(w, "referenceableParamGroup", &[("id", "mzArray")])?;
    cv_param(w, &ms::codec(ctx.config.mz_codec))?;
    cv_param(w, &ms::mz_array())?;
    cv_param(w, &ms::data_type(ctx.config.mz_dtype))?;
    cv_param(w, &ims::external_data())?;
    end(w, "referenceableParamGroup")?;

    start(w, "referenceableParamGroup", &[("id", "intensityArray")])?;
    cv_param(w, &ms::data_type(ctx.config.intensity_dtype))?;
    cv_param(w, &ms::intensity_array())?;
    cv_param(w, &ms::codec(ctx.config.intensity_codec))?;
    cv_param(w, &ims::external_data())?;
    end(w, "referenceableParamGroup")?;

    if ctx.config.include_mobility {
        let info = &ctx.config.mobility_info;
        start(w, "referenceableParamGroup", &[("id", "mobilityArray")])?;
        cv_param(w, &ms::codec(ctx.config.mobility_codec))?;
        // The mobility identity is caller-configured, not a fixed term.
        empty(
            w,
            "cvParam",
            &[
                ("cvRef", "MS"),
                ("accession", info.accession.as_str()),
                ("name", info.name.as_str()),
                ("unitCvRef", "MS"),
                ("unitAccession", info.unit_accession.as_str()),
                ("unitName", info.unit_name.as_str()),
            ],
        )?;
        cv_param(w, &ms::data_type(ctx.config.mobility_dtype))?;
        cv_param(w, &ims::external_data())?;
        end(w, "referenceableParamGroup")?;
    }

    start(w, "referenceableParamGroup", &[("id", "scan1")])?;
    cv_param(w, &ms::increasing_mz_scan())?;
    end(w, "referenceableParamGroup")?;

    start(w, "referenceableParamGroup", &[("id", "spectrum1")])?;
    cv_param(w, &ms::spectrum_type(ctx.config.spectrum_type))?;
    if let Some(polarity) = ctx.config.polarity {
        cv_param(w, &ms::polarity(polarity))?;
    }
    end(w, "referenceableParamGroup")?;

    end(w, "referenceableParamGroupList")
}

fn write_software_list<W: Write>(w: &mut Writer<W>) -> Result<()> {
    start(w, "softwareList", &[("count", "1")])?;
    start(
        w,
        "software",
        &[("id", "imzml"), ("version", env!("CARGO_PKG_VERSION"))],
    )?;
    cv_param(w, &ms::custom_software())?;
    end(w, "software")?;
    end(w, "softwareList")
}

fn write_scan_settings<W: Write>(w: &mut Writer<W>, ctx: &DocumentContext) -> Result<()> {
    start(w, "scanSettingsList", &[("count", "1")])?;
    start(w, "scanSettings", &[("id", "scanSettings1")])?;
    cv_param(w, &ims::scan_direction(ctx.config.scan_direction))?;
    cv_param(w, &ims::scan_pattern(ctx.config.scan_pattern))?;
    cv_param(w, &ims::scan_type(ctx.config.scan_type))?;
    cv_param(w, &ims::line_scan_direction(ctx.config.line_scan_direction))?;
    cv_param(w, &ims::max_pixels_x(ctx.max_x))?;
    cv_param(w, &ims::max_pixels_y(ctx.max_y))?;
    if let (Some(dim), Some(px)) = (ctx.config.image_x_dimension, ctx.pixel_size_x) {
        cv_param(w, &ims::max_dimension_x(dim))?;
        cv_param(w, &ims::pixel_size_x(px))?;
    }
    if let (Some(dim), Some(px)) = (ctx.config.image_y_dimension, ctx.pixel_size_y) {
        cv_param(w, &ims::max_dimension_y(dim))?;
        cv_param(w, &ims::pixel_size_y(px))?;
    }
    end(w, "scanSettings")?;
    end(w, "scanSettingsList")
}

fn write_instrument_configuration<W: Write>(w: &mut Writer<W>) -> Result<()> {
    start(w, "instrumentConfigurationList", &[("count", "1")])?;
    empty(w, "instrumentConfiguration", &[("id", "IC1")])?;
    end(w, "instrumentConfigurationList")
}

fn write_data_processing<W: Write>(w: &mut Writer<W>) -> Result<()> {
    start(w, "dataProcessingList", &[("count", "1")])?;
    start(w, "dataProcessing", &[("id", "export_from_imzml")])?;
    start(
        w,
        "processingMethod",
        &[("order", "0"), ("softwareRef", "imzml")],
    )?;
    cv_param(w, &ims::conversion_to_imzml())?;
    end(w, "processingMethod")?;
    end(w, "dataProcessing")?;
    end(w, "dataProcessingList")
}

fn write_run<W: Write>(w: &mut Writer<W>, ctx: &DocumentContext) -> Result<()> {
    start(
        w,
        "run",
        &[
            ("defaultInstrumentConfigurationRef", "IC1"),
            ("id", ctx.run_id),
        ],
    )?;
    let count = ctx.records.len().to_string();
    start(
        w,
        "spectrumList",
        &[
            ("count", count.as_str()),
            ("defaultDataProcessingRef", "export_from_imzml"),
        ],
    )?;
    for (index, record) in ctx.records.iter().enumerate() {
        write_spectrum(w, ctx, index + 1, record)?;
    }
    end(w, "spectrumList")?;
    end(w, "run")
}

fn write_spectrum<W: Write>(
    w: &mut Writer<W>,
    ctx: &DocumentContext,
    index: usize,
    record: &SpectrumRecord,
) -> Result<()> {
    let id = format!("spectrum={index}");
    let index_str = index.to_string();
    start(
        w,
        "spectrum",
        &[
            ("defaultArrayLength", "0"),
            ("id", id.as_str()),
            ("index", index_str.as_str()),
        ],
    )?;
    empty(w, "referenceableParamGroupRef", &[("ref", "spectrum1")])?;
    cv_param(w, &ms::spectrum_kind(record.ms_level))?;
    cv_param(w, &ms::ms_level(record.ms_level))?;
    cv_param(w, &ms::lowest_observed_mz(record.mz_min))?;
    cv_param(w, &ms::highest_observed_mz(record.mz_max))?;
    cv_param(w, &ms::base_peak_mz(record.base_peak_mz))?;
    cv_param(w, &ms::base_peak_intensity(record.base_peak_intensity))?;
    cv_param(w, &ms::total_ion_current(record.total_ion_current))?;

    write_scan_list(w, record)?;

    if record.ms_level > 1 {
        if let Some(precursor) = &record.precursor {
            start(w, "precursorList", &[("count", "1")])?;
            start(w, "precursor", &[])?;
            start(w, "isolationWindow", &[])?;
            cv_param(w, &ms::isolation_window_target(precursor.mz))?;
            cv_param(
                w,
                &ms::isolation_window_lower(
                    precursor.lower_offset.unwrap_or(DEFAULT_ISOLATION_OFFSET),
                ),
            )?;
            cv_param(
                w,
                &ms::isolation_window_upper(
                    precursor.upper_offset.unwrap_or(DEFAULT_ISOLATION_OFFSET),
                ),
            )?;
            end(w, "isolationWindow")?;
            start(w, "selectedIonList", &[("count", "1")])?;
            start(w, "selectedIon", &[])?;
            cv_param(w, &ms::selected_ion_mz(precursor.mz))?;
            end(w, "selectedIon")?;
            end(w, "selectedIonList")?;
            if precursor.activation {
                start(w, "activation", &[])?;
                cv_param(w, &ms::beam_type_cid())?;
                cv_param(w, &ms::collision_energy())?;
                end(w, "activation")?;
            }
            end(w, "precursor")?;
            end(w, "precursorList")?;
        }
    }

    write_binary_arrays(w, ctx, record)?;
    end(w, "spectrum")
}

fn write_scan_list<W: Write>(w: &mut Writer<W>, record: &SpectrumRecord) -> Result<()> {
    start(w, "scanList", &[("count", "1")])?;
    cv_param(w, &ms::no_combination())?;
    start(w, "scan", &[("instrumentConfigurationRef", "IC1")])?;
    empty(w, "referenceableParamGroupRef", &[("ref", "scan1")])?;
    if let Some(minutes) = record.scan_start_time {
        cv_param(w, &ms::scan_start_time(minutes))?;
    }
    cv_param(w, &ms::filter_string(record.filter_string.as_deref()))?;
    cv_param(w, &ims::position_x(record.position.x))?;
    cv_param(w, &ims::position_y(record.position.y))?;
    if let Some(z) = record.position.z {
        cv_param(w, &ims::position_z(z))?;
    }
    for param in &record.user_params {
        empty(
            w,
            "userParam",
            &[
                ("name", param.name.as_str()),
                ("value", param.value.as_str()),
            ],
        )?;
    }
    start(w, "scanWindowList", &[("count", "1")])?;
    start(w, "scanWindow", &[])?;
    cv_param(w, &ms::scan_window_lower(record.mass_window.0))?;
    cv_param(w, &ms::scan_window_upper(record.mass_window.1))?;
    end(w, "scanWindow")?;
    end(w, "scanWindowList")?;
    end(w, "scan")?;
    end(w, "scanList")
}

fn write_binary_arrays<W: Write>(
    w: &mut Writer<W>,
    ctx: &DocumentContext,
    record: &SpectrumRecord,
) -> Result<()> {
    let count = if ctx.config.include_mobility { "3" } else { "2" };
    start(w, "binaryDataArrayList", &[("count", count)])?;
    write_binary_array(w, "mzArray", &record.mz)?;
    write_binary_array(w, "intensityArray", &record.intensity)?;
    if let Some(mobility) = &record.mobility {
        write_binary_array(w, "mobilityArray", mobility)?;
    }
    end(w, "binaryDataArrayList")
}

fn write_binary_array<W: Write>(
    w: &mut Writer<W>,
    group: &str,
    location: &ArrayLocation,
) -> Result<()> {
    start(w, "binaryDataArray", &[("encodedLength", "0")])?;
    empty(w, "referenceableParamGroupRef", &[("ref", group)])?;
    cv_param(w, &ims::external_array_length(location.element_count))?;
    cv_param(w, &ims::external_encoded_length(location.encoded_byte_length))?;
    cv_param(w, &ims::external_offset(location.offset))?;
    empty(w, "binary", &[])?;
    end(w, "binaryDataArray")
}

fn start<W: Write>(w: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for &(key, value) in attrs {
        el.push_attribute((key, value));
    }
    w.write_event(Event::Start(el))?;
    Ok(())
}

fn end<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty<W: Write>(w: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for &(key, value) in attrs {
        el.push_attribute((key, value));
    }
    w.write_event(Event::Empty(el))?;
    Ok(())
}

fn cv_param<W: Write>(w: &mut Writer<W>, param: &CvParam) -> Result<()> {
    let mut el = BytesStart::new("cvParam");
    el.push_attribute(("cvRef", param.cv_ref));
    el.push_attribute(("accession", param.accession.as_str()));
    el.push_attribute(("name", param.name.as_str()));
    if let Some(value) = &param.value {
        el.push_attribute(("value", value.as_str()));
    }
    if let Some(unit) = &param.unit {
        el.push_attribute(("unitCvRef", unit.cv_ref));
        el.push_attribute(("unitAccession", unit.accession));
        el.push_attribute(("unitName", unit.name));
    }
    w.write_event(Event::Empty(el))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibd::ArrayLocation;
    use crate::spectrum::{Position, Precursor, SpectrumRecord, UserParam};

    fn loc(offset: u64, count: u64, bytes: u64) -> ArrayLocation {
        ArrayLocation {
            offset,
            element_count: count,
            encoded_byte_length: bytes,
        }
    }

    fn record() -> SpectrumRecord {
        SpectrumRecord {
            position: Position::new(1, 2),
            mz: loc(16, 3, 24),
            intensity: loc(40, 3, 12),
            mobility: None,
            mz_min: 100.0,
            mz_max: 300.0,
            base_peak_mz: 200.0,
            base_peak_intensity: 5000.0,
            total_ion_current: 5600.0,
            ms_level: 1,
            precursor: None,
            scan_start_time: None,
            filter_string: None,
            mass_window: (100.0, 300.0),
            user_params: vec![UserParam {
                name: "tray".to_string(),
                value: "A1".to_string(),
            }],
        }
    }

    fn render_to_string(records: &[SpectrumRecord], config: &WriterConfig) -> String {
        let ctx = DocumentContext {
            config,
            run_id: "test_run",
            uuid: "{00000000-0000-0000-0000-000000000000}".to_string(),
            sha1: "ABCDEF".to_string(),
            mode: WriteMode::Continuous,
            records,
            ms_levels: &[1, 2],
            max_x: 4,
            max_y: 5,
            pixel_size_x: None,
            pixel_size_y: None,
        };
        let mut out = Vec::new();
        render(&mut out, &ctx).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn document_references_the_external_binary_data() {
        let xml = render_to_string(&[record()], &WriterConfig::default());
        assert!(xml.contains("IMS:1000102"));
        assert!(xml.contains(r#"name="external offset" value="16""#));
        assert!(xml.contains(r#"name="external array length" value="3""#));
        assert!(xml.contains(r#"name="external encoded length" value="24""#));
        assert!(xml.contains(r#"name="ibd SHA-1" value="ABCDEF""#));
    }

    #[test]
    fn spectrum_index_is_one_based() {
        let xml = render_to_string(&[record(), record()], &WriterConfig::default());
        assert!(xml.contains(r#"id="spectrum=1" index="1""#));
        assert!(xml.contains(r#"id="spectrum=2" index="2""#));
        assert!(!xml.contains(r#"index="0""#));
    }

    #[test]
    fn precursor_block_uses_default_isolation_offsets() {
        let mut rec = record();
        rec.ms_level = 2;
        rec.precursor = Some(Precursor {
            mz: 450.5,
            lower_offset: None,
            upper_offset: Some(0.7),
            activation: true,
        });
        let xml = render_to_string(&[rec], &WriterConfig::default());
        assert!(xml.contains(r#"name="isolation window target m/z" value="450.5""#));
        assert!(xml.contains(r#"name="isolation window lower offset" value="0.5""#));
        assert!(xml.contains(r#"name="isolation window upper offset" value="0.7""#));
        assert!(xml.contains("beam-type collision-induced dissociation"));
    }

    #[test]
    fn mobility_schema_adds_a_third_array_group() {
        let mut config = WriterConfig::default();
        config.include_mobility = true;
        let mut rec = record();
        rec.mobility = Some(loc(60, 3, 24));
        let xml = render_to_string(&[rec], &config);
        assert!(xml.contains(r#"referenceableParamGroupList count="5""#));
        assert!(xml.contains(r#"referenceableParamGroup id="mobilityArray""#));
        assert!(xml.contains(r#"binaryDataArrayList count="3""#));
        assert!(xml.contains("inverse reduced ion mobility array"));
    }

    #[test]
    fn user_params_and_positions_land_in_the_scan() {
        let xml = render_to_string(&[record()], &WriterConfig::default());
        assert!(xml.contains(r#"userParam name="tray" value="A1""#));
        assert!(xml.contains(r#"name="position x" value="1""#));
        assert!(xml.contains(r#"name="position y" value="2""#));
    }
}
