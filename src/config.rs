//! Session configuration and its closed option vocabularies.
//!
//! Every stringly-typed option a caller can supply (write mode, codec name,
//! polarity, scan geometry, storage types) is validated once, at session
//! construction, against an explicit enum. Unrecognized labels are a
//! [`ConfigError`]; nothing is validated lazily during accumulation.

use std::str::FromStr;

use crate::codec::{Codec, DataType};
use crate::dedup::DEFAULT_CACHE_CAPACITY;

/// Errors raised by invalid session configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The write-mode label is not in the vocabulary
    #[error("unknown write mode {0:?}: expected \"continuous\", \"processed\" or \"auto\"")]
    UnknownMode(String),

    /// The codec label is not in the vocabulary
    #[error("unknown codec {0:?}: expected \"none\" or \"zlib\"")]
    UnknownCodec(String),

    /// The polarity label is not in the vocabulary
    #[error("unknown polarity {0:?}: expected \"positive\" or \"negative\"")]
    UnknownPolarity(String),

    /// The data-type label is not in the vocabulary
    #[error("unknown data type {0:?}: expected one of \"f32\", \"f64\", \"i32\", \"i64\"")]
    UnknownDataType(String),

    /// The spectrum-type label is not in the vocabulary
    #[error("unknown spectrum type {0:?}: expected \"centroid\" or \"profile\"")]
    UnknownSpectrumType(String),

    /// A scan direction, pattern, type or line-scan label is not in the
    /// vocabulary
    #[error("unknown scan geometry descriptor {0:?}")]
    UnknownScanGeometry(String),
}

/// How the m/z axis array is persisted across spectra.
///
/// The mode is fixed at session open. For [`WriteMode::Auto`] the label that
/// ends up in the document is resolved at finalize time from what was
/// actually written: "processed" if more than one distinct m/z array hit the
/// ibd, "continuous" otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write the first m/z array only; every later spectrum reuses its
    /// location unconditionally, without checking that the submitted array
    /// matches the stored one.
    Continuous,
    /// Write every m/z array as an independent copy, never reusing.
    Processed,
    /// Deduplicate: reuse a previously written m/z array whenever the
    /// submitted content is byte-identical to one already on disk.
    Auto,
}

impl WriteMode {
    /// The imzML label for this mode
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Continuous => "continuous",
            WriteMode::Processed => "processed",
            WriteMode::Auto => "auto",
        }
    }
}

impl FromStr for WriteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continuous" => Ok(WriteMode::Continuous),
            "processed" => Ok(WriteMode::Processed),
            "auto" => Ok(WriteMode::Auto),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl FromStr for Codec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codec::from_name(s).ok_or_else(|| ConfigError::UnknownCodec(s.to_string()))
    }
}

impl FromStr for DataType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::from_name(s).ok_or_else(|| ConfigError::UnknownDataType(s.to_string()))
    }
}

/// Scan polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Positive ion mode
    Positive,
    /// Negative ion mode
    Negative,
}

impl Polarity {
    /// The configuration label for this polarity
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

impl FromStr for Polarity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            _ => Err(ConfigError::UnknownPolarity(s.to_string())),
        }
    }
}

/// Whether spectra are centroided or profile-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumType {
    /// Peak-picked spectra
    Centroid,
    /// Raw profile spectra
    Profile,
}

impl SpectrumType {
    /// The configuration label for this spectrum type
    pub fn as_str(self) -> &'static str {
        match self {
            SpectrumType::Centroid => "centroid",
            SpectrumType::Profile => "profile",
        }
    }
}

impl FromStr for SpectrumType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "centroid" => Ok(SpectrumType::Centroid),
            "profile" => Ok(SpectrumType::Profile),
            _ => Err(ConfigError::UnknownSpectrumType(s.to_string())),
        }
    }
}

/// Stage-motion direction across the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Raster from the bottom edge upward
    BottomUp,
    /// Raster from the left edge rightward
    LeftRight,
    /// Raster from the right edge leftward
    RightLeft,
    /// Raster from the top edge downward
    TopDown,
}

impl FromStr for ScanDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bottom_up" => Ok(ScanDirection::BottomUp),
            "left_right" => Ok(ScanDirection::LeftRight),
            "right_left" => Ok(ScanDirection::RightLeft),
            "top_down" => Ok(ScanDirection::TopDown),
            _ => Err(ConfigError::UnknownScanGeometry(s.to_string())),
        }
    }
}

/// Raster pattern between consecutive scan lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPattern {
    /// Alternate direction on every line
    Meandering,
    /// Return to the same edge before each line
    Flyback,
    /// No fixed line order
    RandomAccess,
}

impl FromStr for ScanPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "meandering" => Ok(ScanPattern::Meandering),
            "flyback" => Ok(ScanPattern::Flyback),
            "random_access" => Ok(ScanPattern::RandomAccess),
            _ => Err(ConfigError::UnknownScanGeometry(s.to_string())),
        }
    }
}

/// Orientation of individual scan lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Lines run along the x axis
    HorizontalLine,
    /// Lines run along the y axis
    VerticalLine,
}

impl FromStr for ScanType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal_line" => Ok(ScanType::HorizontalLine),
            "vertical_line" => Ok(ScanType::VerticalLine),
            _ => Err(ConfigError::UnknownScanGeometry(s.to_string())),
        }
    }
}

/// Direction of travel within one scan line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineScanDirection {
    /// Travel upward within a line
    LineBottomUp,
    /// Travel rightward within a line
    LineLeftRight,
    /// Travel leftward within a line
    LineRightLeft,
    /// Travel downward within a line
    LineTopDown,
}

impl FromStr for LineScanDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line_bottom_up" => Ok(LineScanDirection::LineBottomUp),
            "line_left_right" => Ok(LineScanDirection::LineLeftRight),
            "line_right_left" => Ok(LineScanDirection::LineRightLeft),
            "line_top_down" => Ok(LineScanDirection::LineTopDown),
            _ => Err(ConfigError::UnknownScanGeometry(s.to_string())),
        }
    }
}

/// Controlled-vocabulary identity of the ion mobility array.
///
/// The defaults describe Bruker TIMS inverse reduced ion mobility; other
/// instruments can substitute their own accession and unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobilityInfo {
    /// cvParam name of the mobility array
    pub name: String,
    /// MS-ontology accession of the mobility array
    pub accession: String,
    /// Name of the unit the values are expressed in
    pub unit_name: String,
    /// Accession of that unit
    pub unit_accession: String,
}

impl Default for MobilityInfo {
    fn default() -> Self {
        Self {
            name: "inverse reduced ion mobility array".to_string(),
            accession: "MS:1003006".to_string(),
            unit_name: "volt-second per square centimeter".to_string(),
            unit_accession: "MS:1002814".to_string(),
        }
    }
}

/// Configuration for one write session
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Storage width for m/z arrays
    pub mz_dtype: DataType,
    /// Storage width for intensity arrays
    pub intensity_dtype: DataType,
    /// Storage width for mobility arrays
    pub mobility_dtype: DataType,

    /// Payload codec for m/z arrays
    pub mz_codec: Codec,
    /// Payload codec for intensity arrays
    pub intensity_codec: Codec,
    /// Payload codec for mobility arrays
    pub mobility_codec: Codec,

    /// m/z axis persistence policy
    pub mode: WriteMode,
    /// Centroid or profile spectra
    pub spectrum_type: SpectrumType,
    /// Scan polarity, left out of the document when unset
    pub polarity: Option<Polarity>,

    /// Stage-motion direction across the sample
    pub scan_direction: ScanDirection,
    /// Raster pattern between consecutive scan lines
    pub scan_pattern: ScanPattern,
    /// Orientation of individual scan lines
    pub scan_type: ScanType,
    /// Direction of travel within one scan line
    pub line_scan_direction: LineScanDirection,

    /// Whether every spectrum carries an ion mobility array
    pub include_mobility: bool,
    /// CV identity for the mobility array (only consulted when mobility
    /// is enabled)
    pub mobility_info: MobilityInfo,

    /// Physical image width in micrometers; enables pixel-size metadata
    pub image_x_dimension: Option<f64>,
    /// Physical image height in micrometers
    pub image_y_dimension: Option<f64>,

    /// Capacity of the m/z dedup recency cache. Bounds memory only: arrays
    /// evicted from the recency cache remain discoverable through the
    /// fingerprint index for the whole session.
    pub dedup_cache_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mz_dtype: DataType::F64,
            intensity_dtype: DataType::F32,
            mobility_dtype: DataType::F64,
            mz_codec: Codec::None,
            intensity_codec: Codec::None,
            mobility_codec: Codec::None,
            mode: WriteMode::Auto,
            spectrum_type: SpectrumType::Centroid,
            polarity: None,
            scan_direction: ScanDirection::TopDown,
            scan_pattern: ScanPattern::Flyback,
            scan_type: ScanType::HorizontalLine,
            line_scan_direction: LineScanDirection::LineLeftRight,
            include_mobility: false,
            mobility_info: MobilityInfo::default(),
            image_x_dimension: None,
            image_y_dimension: None,
            dedup_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_labels_parse_case_insensitively() {
        assert_eq!("continuous".parse::<WriteMode>().unwrap(), WriteMode::Continuous);
        assert_eq!("Processed".parse::<WriteMode>().unwrap(), WriteMode::Processed);
        assert_eq!("AUTO".parse::<WriteMode>().unwrap(), WriteMode::Auto);
    }

    #[test]
    fn unknown_mode_is_a_config_error() {
        let err = "sequential".parse::<WriteMode>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(ref s) if s == "sequential"));
    }

    #[test]
    fn polarity_rejects_anything_but_positive_or_negative() {
        assert_eq!("positive".parse::<Polarity>().unwrap(), Polarity::Positive);
        assert_eq!("Negative".parse::<Polarity>().unwrap(), Polarity::Negative);
        assert!("neutral".parse::<Polarity>().is_err());
    }

    #[test]
    fn codec_and_dtype_parse_through_fromstr() {
        assert_eq!("zlib".parse::<Codec>().unwrap(), Codec::zlib());
        assert!("lzma".parse::<Codec>().is_err());
        assert_eq!("f32".parse::<DataType>().unwrap(), DataType::F32);
        assert!("f16".parse::<DataType>().is_err());
    }

    #[test]
    fn scan_geometry_vocabulary_is_closed() {
        assert_eq!(
            "top_down".parse::<ScanDirection>().unwrap(),
            ScanDirection::TopDown
        );
        assert!("diagonal".parse::<ScanDirection>().is_err());
        assert_eq!(
            "line_left_right".parse::<LineScanDirection>().unwrap(),
            LineScanDirection::LineLeftRight
        );
        assert!("spiral".parse::<ScanPattern>().is_err());
        assert!("curve".parse::<ScanType>().is_err());
    }

    #[test]
    fn default_config_matches_the_conventional_setup() {
        let config = WriterConfig::default();
        assert_eq!(config.mz_dtype, DataType::F64);
        assert_eq!(config.intensity_dtype, DataType::F32);
        assert_eq!(config.mode, WriteMode::Auto);
        assert_eq!(config.polarity, None);
        assert!(!config.include_mobility);
    }
}
