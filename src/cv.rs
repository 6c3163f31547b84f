//! Controlled-vocabulary terms used by the imzML document.
//!
//! Accessions come from the HUPO-PSI MS ontology (`MS:`), the Imaging MS
//! ontology (`IMS:`) and the Unit Ontology (`UO:`). Only the terms this
//! writer actually emits are modeled; this is pure data, no logic.

use std::fmt;

use crate::codec::{Codec, DataType};
use crate::config::{
    LineScanDirection, Polarity, ScanDirection, ScanPattern, ScanType, SpectrumType, WriteMode,
};

/// A unit annotation on a cvParam value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Ontology the unit comes from (`unitCvRef`)
    pub cv_ref: &'static str,
    /// Unit accession (`unitAccession`)
    pub accession: &'static str,
    /// Unit name (`unitName`)
    pub name: &'static str,
}

/// MS:1000040 m/z
pub const UNIT_MZ: Unit = Unit {
    cv_ref: "MS",
    accession: "MS:1000040",
    name: "m/z",
};

/// MS:1000131 number of counts
pub const UNIT_COUNTS: Unit = Unit {
    cv_ref: "MS",
    accession: "MS:1000131",
    name: "number of counts",
};

/// MS:1000131 as used on the intensity array group
pub const UNIT_DETECTOR_COUNTS: Unit = Unit {
    cv_ref: "MS",
    accession: "MS:1000131",
    name: "number of detector counts",
};

/// UO:0000017 micrometer
pub const UNIT_MICROMETER: Unit = Unit {
    cv_ref: "UO",
    accession: "UO:0000017",
    name: "micrometer",
};

/// UO minute, with the reference spelling established imzML readers expect
pub const UNIT_MINUTE: Unit = Unit {
    cv_ref: "unit.ontology",
    accession: "UO:000031",
    name: "minute",
};

/// UO:0000266 electronvolt
pub const UNIT_ELECTRONVOLT: Unit = Unit {
    cv_ref: "unit.ontology",
    accession: "UO:0000266",
    name: "electronvolt",
};

/// One `<cvParam>` element
#[derive(Debug, Clone, PartialEq)]
pub struct CvParam {
    /// Ontology the term comes from (`cvRef`)
    pub cv_ref: &'static str,
    /// Term accession, e.g. `IMS:1000102`
    pub accession: String,
    /// Term name as spelled in the ontology
    pub name: String,
    /// Value attribute; `Some("")` renders an explicit empty value
    pub value: Option<String>,
    /// Unit annotation on the value
    pub unit: Option<Unit>,
}

impl CvParam {
    /// MS-ontology term
    pub fn ms(accession: &str, name: &str) -> Self {
        Self {
            cv_ref: "MS",
            accession: accession.to_string(),
            name: name.to_string(),
            value: None,
            unit: None,
        }
    }

    /// IMS-ontology term
    pub fn ims(accession: &str, name: &str) -> Self {
        Self {
            cv_ref: "IMS",
            accession: accession.to_string(),
            name: name.to_string(),
            value: None,
            unit: None,
        }
    }

    /// Attach a value attribute
    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Attach a unit annotation
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }
}

impl fmt::Display for CvParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "[{}: {}={}]", self.accession, self.name, v),
            None => write!(f, "[{}: {}]", self.accession, self.name),
        }
    }
}

/// MS-ontology term constructors
pub mod ms {
    use super::*;

    /// MS:1000579 / MS:1000580 - spectrum kind by level
    pub fn spectrum_kind(ms_level: u8) -> CvParam {
        if ms_level == 1 {
            CvParam::ms("MS:1000579", "MS1 spectrum").with_value("")
        } else {
            CvParam::ms("MS:1000580", "MSn spectrum").with_value("")
        }
    }

    /// MS:1000511 - ms level
    pub fn ms_level(level: u8) -> CvParam {
        CvParam::ms("MS:1000511", "ms level").with_value(level)
    }

    /// MS:1000127 / MS:1000128 - centroid or profile spectrum
    pub fn spectrum_type(st: SpectrumType) -> CvParam {
        match st {
            SpectrumType::Centroid => CvParam::ms("MS:1000127", "centroid spectrum").with_value(""),
            SpectrumType::Profile => CvParam::ms("MS:1000128", "profile spectrum").with_value(""),
        }
    }

    /// MS:1000130 / MS:1000129 - scan polarity
    pub fn polarity(p: Polarity) -> CvParam {
        match p {
            Polarity::Positive => CvParam::ms("MS:1000130", "positive scan").with_value(""),
            Polarity::Negative => CvParam::ms("MS:1000129", "negative scan").with_value(""),
        }
    }

    /// MS:1000514 - m/z array
    pub fn mz_array() -> CvParam {
        CvParam::ms("MS:1000514", "m/z array").with_unit(UNIT_MZ)
    }

    /// MS:1000515 - intensity array
    pub fn intensity_array() -> CvParam {
        CvParam::ms("MS:1000515", "intensity array").with_unit(UNIT_DETECTOR_COUNTS)
    }

    /// Binary data type of one array kind
    pub fn data_type(dtype: DataType) -> CvParam {
        let accession = match dtype {
            DataType::I32 => "MS:1000519",
            DataType::F32 => "MS:1000521",
            DataType::I64 => "MS:1000522",
            DataType::F64 => "MS:1000523",
        };
        CvParam::ms(accession, dtype.cv_name()).with_value("")
    }

    /// MS:1000574 / MS:1000576 - payload codec
    pub fn codec(codec: Codec) -> CvParam {
        let accession = match codec {
            Codec::Zlib { .. } => "MS:1000574",
            Codec::None => "MS:1000576",
        };
        CvParam::ms(accession, codec.cv_name()).with_value("")
    }

    /// MS:1000528 - lowest observed m/z
    pub fn lowest_observed_mz(mz: f64) -> CvParam {
        CvParam::ms("MS:1000528", "lowest observed m/z")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000527 - highest observed m/z
    pub fn highest_observed_mz(mz: f64) -> CvParam {
        CvParam::ms("MS:1000527", "highest observed m/z")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000504 - base peak m/z
    pub fn base_peak_mz(mz: f64) -> CvParam {
        CvParam::ms("MS:1000504", "base peak m/z")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000505 - base peak intensity
    pub fn base_peak_intensity(intensity: f64) -> CvParam {
        CvParam::ms("MS:1000505", "base peak intensity")
            .with_value(intensity)
            .with_unit(UNIT_COUNTS)
    }

    /// MS:1000285 - total ion current
    pub fn total_ion_current(tic: f64) -> CvParam {
        CvParam::ms("MS:1000285", "total ion current").with_value(tic)
    }

    /// MS:1000795 - no combination
    pub fn no_combination() -> CvParam {
        CvParam::ms("MS:1000795", "no combination").with_value("")
    }

    /// MS:1000016 - scan start time, in minutes
    pub fn scan_start_time(minutes: f64) -> CvParam {
        CvParam::ms("MS:1000016", "scan start time")
            .with_value(minutes)
            .with_unit(UNIT_MINUTE)
    }

    /// MS:1000512 - filter string; always present, empty when unknown
    pub fn filter_string(filter: Option<&str>) -> CvParam {
        CvParam::ms("MS:1000512", "filter string").with_value(filter.unwrap_or(""))
    }

    /// MS:1000501 - scan window lower limit
    pub fn scan_window_lower(mz: f64) -> CvParam {
        CvParam::ms("MS:1000501", "scan window lower limit")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000500 - scan window upper limit
    pub fn scan_window_upper(mz: f64) -> CvParam {
        CvParam::ms("MS:1000500", "scan window upper limit")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000827 - isolation window target m/z
    pub fn isolation_window_target(mz: f64) -> CvParam {
        CvParam::ms("MS:1000827", "isolation window target m/z")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000828 - isolation window lower offset
    pub fn isolation_window_lower(offset: f64) -> CvParam {
        CvParam::ms("MS:1000828", "isolation window lower offset")
            .with_value(offset)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000829 - isolation window upper offset
    pub fn isolation_window_upper(offset: f64) -> CvParam {
        CvParam::ms("MS:1000829", "isolation window upper offset")
            .with_value(offset)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000744 - selected ion m/z
    pub fn selected_ion_mz(mz: f64) -> CvParam {
        CvParam::ms("MS:1000744", "selected ion m/z")
            .with_value(mz)
            .with_unit(UNIT_MZ)
    }

    /// MS:1000422 - beam-type collision-induced dissociation
    pub fn beam_type_cid() -> CvParam {
        CvParam::ms("MS:1000422", "beam-type collision-induced dissociation").with_value("")
    }

    /// MS:1000045 - collision energy, fixed at the conventional 35 eV
    pub fn collision_energy() -> CvParam {
        CvParam::ms("MS:1000045", "collision energy")
            .with_value("35.0")
            .with_unit(UNIT_ELECTRONVOLT)
    }

    /// MS:1000093 - increasing m/z scan
    pub fn increasing_mz_scan() -> CvParam {
        CvParam::ms("MS:1000093", "increasing m/z scan")
    }

    /// MS:1000799 - custom unreleased software tool
    pub fn custom_software() -> CvParam {
        CvParam::ms("MS:1000799", "custom unreleased software tool").with_value("")
    }
}

/// IMS-ontology term constructors
pub mod ims {
    use super::*;

    /// IMS:1000030 / IMS:1000031 - continuous or processed binary mode.
    ///
    /// Auto sessions resolve their label before rendering; an auto value
    /// reaching this point is reported as processed.
    pub fn mode(mode: WriteMode) -> CvParam {
        match mode {
            WriteMode::Continuous => CvParam::ims("IMS:1000030", "continuous").with_value(""),
            _ => CvParam::ims("IMS:1000031", "processed").with_value(""),
        }
    }

    /// IMS:1000080 - universally unique identifier
    pub fn uuid(formatted: &str) -> CvParam {
        CvParam::ims("IMS:1000080", "universally unique identifier").with_value(formatted)
    }

    /// IMS:1000091 - ibd SHA-1
    pub fn ibd_sha1(hex: &str) -> CvParam {
        CvParam::ims("IMS:1000091", "ibd SHA-1").with_value(hex)
    }

    /// IMS:1000101 - external data
    pub fn external_data() -> CvParam {
        CvParam::ims("IMS:1000101", "external data").with_value("true")
    }

    /// IMS:1000103 - external array length
    pub fn external_array_length(count: u64) -> CvParam {
        CvParam::ims("IMS:1000103", "external array length").with_value(count)
    }

    /// IMS:1000104 - external encoded length
    pub fn external_encoded_length(bytes: u64) -> CvParam {
        CvParam::ims("IMS:1000104", "external encoded length").with_value(bytes)
    }

    /// IMS:1000102 - external offset
    pub fn external_offset(offset: u64) -> CvParam {
        CvParam::ims("IMS:1000102", "external offset").with_value(offset)
    }

    /// IMS:1000050 - position x
    pub fn position_x(x: u32) -> CvParam {
        CvParam::ims("IMS:1000050", "position x").with_value(x)
    }

    /// IMS:1000051 - position y
    pub fn position_y(y: u32) -> CvParam {
        CvParam::ims("IMS:1000051", "position y").with_value(y)
    }

    /// IMS:1000052 - position z
    pub fn position_z(z: u32) -> CvParam {
        CvParam::ims("IMS:1000052", "position z").with_value(z)
    }

    /// IMS:1000042 - max count of pixels x
    pub fn max_pixels_x(x: u32) -> CvParam {
        CvParam::ims("IMS:1000042", "max count of pixels x").with_value(x)
    }

    /// IMS:1000043 - max count of pixels y
    pub fn max_pixels_y(y: u32) -> CvParam {
        CvParam::ims("IMS:1000043", "max count of pixels y").with_value(y)
    }

    /// IMS:1000044 - max dimension x, in micrometers
    pub fn max_dimension_x(um: f64) -> CvParam {
        CvParam::ims("IMS:1000044", "max dimension x")
            .with_value(um)
            .with_unit(UNIT_MICROMETER)
    }

    /// IMS:1000045 - max dimension y, in micrometers
    pub fn max_dimension_y(um: f64) -> CvParam {
        CvParam::ims("IMS:1000045", "max dimension y")
            .with_value(um)
            .with_unit(UNIT_MICROMETER)
    }

    /// IMS:1000046 - pixel size (x)
    pub fn pixel_size_x(um: f64) -> CvParam {
        CvParam::ims("IMS:1000046", "pixel size (x)")
            .with_value(um)
            .with_unit(UNIT_MICROMETER)
    }

    /// IMS:1000047 - pixel size y
    pub fn pixel_size_y(um: f64) -> CvParam {
        CvParam::ims("IMS:1000047", "pixel size y")
            .with_value(um)
            .with_unit(UNIT_MICROMETER)
    }

    /// Scan direction term
    pub fn scan_direction(d: ScanDirection) -> CvParam {
        let (accession, name) = match d {
            ScanDirection::BottomUp => ("IMS:1000400", "bottom up"),
            ScanDirection::TopDown => ("IMS:1000401", "top down"),
            ScanDirection::LeftRight => ("IMS:1000402", "left right"),
            ScanDirection::RightLeft => ("IMS:1000403", "right left"),
        };
        CvParam::ims(accession, name)
    }

    /// Scan pattern term
    pub fn scan_pattern(p: ScanPattern) -> CvParam {
        let (accession, name) = match p {
            ScanPattern::Meandering => ("IMS:1000410", "meandering"),
            ScanPattern::RandomAccess => ("IMS:1000412", "random access"),
            ScanPattern::Flyback => ("IMS:1000413", "flyback"),
        };
        CvParam::ims(accession, name)
    }

    /// Scan type term
    pub fn scan_type(t: ScanType) -> CvParam {
        let (accession, name) = match t {
            ScanType::HorizontalLine => ("IMS:1000480", "horizontal line scan"),
            ScanType::VerticalLine => ("IMS:1000481", "vertical line scan"),
        };
        CvParam::ims(accession, name)
    }

    /// Line scan direction term
    pub fn line_scan_direction(d: LineScanDirection) -> CvParam {
        let (accession, name) = match d {
            LineScanDirection::LineRightLeft => ("IMS:1000490", "linescan right left"),
            LineScanDirection::LineLeftRight => ("IMS:1000491", "linescan left right"),
            LineScanDirection::LineBottomUp => ("IMS:1000492", "linescan bottom up"),
            LineScanDirection::LineTopDown => ("IMS:1000493", "linescan top down"),
        };
        CvParam::ims(accession, name)
    }

    /// IMS:1000500 - conversion to imzML
    pub fn conversion_to_imzml() -> CvParam {
        CvParam::ims("IMS:1000500", "conversion to imzML")
    }
}
