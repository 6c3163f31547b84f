//! Per-spectrum records and the optional-argument builder.
//!
//! A [`SpectrumRecord`] is created once per accepted spectrum and never
//! mutated afterwards; its position in the session's record sequence is the
//! 1-based spectrum index of the final document.

use crate::ibd::ArrayLocation;

/// Pixel position of one spectrum. Coordinates are conventionally 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Column index
    pub x: u32,
    /// Row index
    pub y: u32,
    /// Depth index for volumetric datasets
    pub z: Option<u32>,
}

impl Position {
    /// 2-D position
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y, z: None }
    }

    /// 3-D position for volumetric datasets
    pub fn new_3d(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// Free-form `<userParam>` annotation attached to a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserParam {
    /// Attribute name
    pub name: String,
    /// Attribute value, verbatim
    pub value: String,
}

/// Isolation window offsets around the precursor target m/z
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IsolationOffset {
    /// One offset used for both the lower and upper bound
    Symmetric(f64),
    /// Distinct lower and upper offsets
    Asymmetric {
        /// Lower isolation offset
        lower: f64,
        /// Upper isolation offset
        upper: f64,
    },
}

/// Precursor description for fragmentation spectra
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precursor {
    /// Isolation window target and selected ion m/z
    pub mz: f64,
    /// Lower isolation offset; the renderer falls back to the instrument
    /// default (0.5) when unset
    pub lower_offset: Option<f64>,
    /// Upper isolation offset
    pub upper_offset: Option<f64>,
    /// Whether to emit the fixed beam-type CID activation block
    pub activation: bool,
}

/// Optional arguments for one add-spectrum call
#[derive(Debug, Clone, Default)]
pub struct SpectrumParams {
    pub(crate) precursor_mz: Option<f64>,
    pub(crate) scan_start_time: Option<f64>,
    pub(crate) ms_level: Option<u8>,
    pub(crate) filter_string: Option<String>,
    pub(crate) isolation_offset: Option<IsolationOffset>,
    pub(crate) activation: bool,
    pub(crate) mass_window: Option<(f64, f64)>,
    pub(crate) user_params: Vec<UserParam>,
}

impl SpectrumParams {
    /// No optional arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Precursor m/z; implies MS level 2 unless a level is given explicitly
    pub fn precursor_mz(mut self, mz: f64) -> Self {
        self.precursor_mz = Some(mz);
        self
    }

    /// Scan start time in minutes
    pub fn scan_start_time(mut self, minutes: f64) -> Self {
        self.scan_start_time = Some(minutes);
        self
    }

    /// Explicit MS level, overriding the precursor-based default
    pub fn ms_level(mut self, level: u8) -> Self {
        self.ms_level = Some(level);
        self
    }

    /// Instrument filter string for the scan
    pub fn filter_string(mut self, filter: impl Into<String>) -> Self {
        self.filter_string = Some(filter.into());
        self
    }

    /// One offset applied to both isolation window bounds
    pub fn isolation_offset(mut self, offset: f64) -> Self {
        self.isolation_offset = Some(IsolationOffset::Symmetric(offset));
        self
    }

    /// Distinct lower and upper isolation window offsets
    pub fn isolation_offsets(mut self, lower: f64, upper: f64) -> Self {
        self.isolation_offset = Some(IsolationOffset::Asymmetric { lower, upper });
        self
    }

    /// Emit the activation block for this spectrum's precursor
    pub fn activation(mut self) -> Self {
        self.activation = true;
        self
    }

    /// Scan window bounds; defaults to the observed m/z range
    pub fn mass_window(mut self, lower: f64, upper: f64) -> Self {
        self.mass_window = Some((lower, upper));
        self
    }

    /// Attach a free-form `<userParam>` annotation to the scan
    pub fn user_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_params.push(UserParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Everything the document needs to describe one spectrum.
///
/// Array locations refer to bytes already flushed to the ibd at the moment
/// the record is created.
#[derive(Debug, Clone)]
pub struct SpectrumRecord {
    /// Pixel position of the spectrum
    pub position: Position,
    /// Where the m/z array lives in the ibd (possibly shared)
    pub mz: ArrayLocation,
    /// Where the intensity array lives in the ibd
    pub intensity: ArrayLocation,
    /// Where the mobility array lives, for mobility sessions
    pub mobility: Option<ArrayLocation>,
    /// Lowest observed m/z
    pub mz_min: f64,
    /// Highest observed m/z
    pub mz_max: f64,
    /// m/z at the index of maximum intensity
    pub base_peak_mz: f64,
    /// Maximum intensity
    pub base_peak_intensity: f64,
    /// Sum of all intensities
    pub total_ion_current: f64,
    /// MS level, explicit or defaulted from the precursor
    pub ms_level: u8,
    /// Precursor description for fragmentation spectra
    pub precursor: Option<Precursor>,
    /// Scan start time in minutes
    pub scan_start_time: Option<f64>,
    /// Instrument filter string
    pub filter_string: Option<String>,
    /// Scan window lower and upper m/z bounds
    pub mass_window: (f64, f64),
    /// Free-form scan annotations
    pub user_params: Vec<UserParam>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_builder_collects_optional_fields() {
        let params = SpectrumParams::new()
            .precursor_mz(450.5)
            .scan_start_time(1.25)
            .ms_level(2)
            .filter_string("FTMS + p NSI Full ms2")
            .isolation_offsets(0.4, 0.6)
            .activation()
            .mass_window(100.0, 1000.0)
            .user_param("tray", "A1");

        assert_eq!(params.precursor_mz, Some(450.5));
        assert_eq!(params.ms_level, Some(2));
        assert_eq!(
            params.isolation_offset,
            Some(IsolationOffset::Asymmetric { lower: 0.4, upper: 0.6 })
        );
        assert!(params.activation);
        assert_eq!(params.mass_window, Some((100.0, 1000.0)));
        assert_eq!(params.user_params.len(), 1);
    }

    #[test]
    fn symmetric_offset_is_a_single_scalar() {
        let params = SpectrumParams::new().isolation_offset(0.5);
        assert_eq!(
            params.isolation_offset,
            Some(IsolationOffset::Symmetric(0.5))
        );
    }

    #[test]
    fn positions_carry_an_optional_z() {
        assert_eq!(Position::new(3, 7).z, None);
        assert_eq!(Position::new_3d(3, 7, 2).z, Some(2));
    }
}
