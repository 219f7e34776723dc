//! Scope configuration loaded from a section of an INI file.
//!
//! ```ini
//! [ScopeConfig]
//! address = TCPIP0::192.168.1.20::inst0::INSTR
//! timeout_ms = 20000
//! segment_count = 1000
//! ch3_offset = 0
//! ch3_coupling = DC
//! ch3_trigger_mode = EDGE
//! ch3_trigger_slope = POSitive
//! ch3_trigger_level = 2
//! ch1_coupling = DC
//! ch1_impedance = FIFTy
//! ch1_scale = 0.05
//! tax_scale = 100e-9
//! sampling_rate = 5e9
//! ```
//!
//! Channel and trigger values are passed to the instrument verbatim.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use serde::{Serialize, Deserialize};

use crate::devices::dsox3000::preamble::{WaveformFormat, XAxisScale};
use crate::errors::{Error, Result};

pub const DEFAULT_SECTION:&str = "ScopeConfig";
pub const DEFAULT_TRIGGER_CHANNEL:u8 = 3;
pub const DEFAULT_DATA_CHANNEL:u8 = 1;
pub const NUM_CHANNELS:u8 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
	/// VISA resource string
	pub address: String,
	pub timeout_ms: u64,
	pub segment_count: u32,

	pub trigger_channel: u8,
	pub ch3_offset: String,
	pub ch3_coupling: String,
	pub ch3_trigger_mode: String,
	pub ch3_trigger_slope: String,
	pub ch3_trigger_level: String,

	pub data_channel: u8,
	pub ch1_coupling: String,
	pub ch1_impedance: String,
	pub ch1_scale: String,

	pub tax_scale: String,
	pub sampling_rate: String,

	pub waveform_format: WaveformFormat,
	pub x_axis_scale: XAxisScale,
}

fn required<'a>(props:&'a Properties, key:&str) -> Result<&'a str> {
	props.get(key)
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.ok_or_else(|| Error::Config(format!("missing key '{}'", key)))
}

fn parsed<T: FromStr>(key:&str, value:&str) -> Result<T> {
	value.parse::<T>().map_err(|_| Error::Config(format!("invalid value {:?} for '{}'", value, key)))
}

fn channel(props:&Properties, key:&str, default:u8) -> Result<u8> {
	let ch:u8 = match props.get(key) {
		Some(v) => parsed(key, v.trim())?,
		None    => default,
	};
	if ch < 1 || ch > NUM_CHANNELS {
		return Err(Error::Config(format!("'{}' must be between 1 and {}, got {}", key, NUM_CHANNELS, ch)));
	}
	Ok(ch)
}

impl ScopeConfig {

	pub fn from_file<P: AsRef<Path>>(path:P, section:&str) -> Result<Self> {
		let ini = Ini::load_from_file(path)?;
		Self::from_ini(&ini, section)
	}

	pub fn from_ini_str(s:&str, section:&str) -> Result<Self> {
		let ini = Ini::load_from_str(s).map_err(|e| Error::Config(e.to_string()))?;
		Self::from_ini(&ini, section)
	}

	pub fn from_ini(ini:&Ini, section:&str) -> Result<Self> {
		let props:&Properties = ini.section(Some(section))
			.ok_or_else(|| Error::Config(format!("no [{}] section", section)))?;

		let segment_count:u32 = parsed("segment_count", required(props, "segment_count")?)?;
		if segment_count == 0 {
			return Err(Error::Config("'segment_count' must be at least 1".to_owned()));
		}

		let timeout_ms:u64 = parsed("timeout_ms", required(props, "timeout_ms")?)?;
		if timeout_ms == 0 {
			return Err(Error::Config("'timeout_ms' must be at least 1".to_owned()));
		}

		let waveform_format:WaveformFormat = match props.get("waveform_format") {
			Some(v) => parsed("waveform_format", v.trim())?,
			None    => WaveformFormat::Word,
		};
		let x_axis_scale:XAxisScale = match props.get("x_axis_scale") {
			Some(v) => parsed("x_axis_scale", v.trim())?,
			None    => XAxisScale::default(),
		};

		Ok(ScopeConfig {
			address:           required(props, "address")?.to_owned(),
			timeout_ms,
			segment_count,

			trigger_channel:   channel(props, "trigger_channel", DEFAULT_TRIGGER_CHANNEL)?,
			ch3_offset:        required(props, "ch3_offset")?.to_owned(),
			ch3_coupling:      required(props, "ch3_coupling")?.to_owned(),
			ch3_trigger_mode:  required(props, "ch3_trigger_mode")?.to_owned(),
			ch3_trigger_slope: required(props, "ch3_trigger_slope")?.to_owned(),
			ch3_trigger_level: required(props, "ch3_trigger_level")?.to_owned(),

			data_channel:      channel(props, "data_channel", DEFAULT_DATA_CHANNEL)?,
			ch1_coupling:      required(props, "ch1_coupling")?.to_owned(),
			ch1_impedance:     required(props, "ch1_impedance")?.to_owned(),
			ch1_scale:         required(props, "ch1_scale")?.to_owned(),

			tax_scale:         required(props, "tax_scale")?.to_owned(),
			sampling_rate:     required(props, "sampling_rate")?.to_owned(),

			waveform_format,
			x_axis_scale,
		})
	}

	pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE:&str = "
[ScopeConfig]
address = TCPIP0::192.168.1.20::inst0::INSTR
timeout_ms = 20000
segment_count = 1000
ch3_offset = 0
ch3_coupling = DC
ch3_trigger_mode = EDGE
ch3_trigger_slope = POSitive
ch3_trigger_level = 2
ch1_coupling = AC
ch1_impedance = FIFTy
ch1_scale = 0.05
tax_scale = 100e-9
sampling_rate = 5e9
";

	#[test]
	fn sample_section_loads_with_defaults() {
		let conf = ScopeConfig::from_ini_str(SAMPLE, DEFAULT_SECTION).unwrap();
		assert_eq!(conf.address, "TCPIP0::192.168.1.20::inst0::INSTR");
		assert_eq!(conf.timeout(), Duration::from_secs(20));
		assert_eq!(conf.segment_count, 1000);
		assert_eq!(conf.trigger_channel, 3);
		assert_eq!(conf.data_channel, 1);
		assert_eq!(conf.ch1_coupling, "AC");
		assert_eq!(conf.tax_scale, "100e-9");
		assert_eq!(conf.waveform_format, WaveformFormat::Word);
		assert_eq!(conf.x_axis_scale, XAxisScale::YIncrement);
	}

	#[test]
	fn optional_keys_override_defaults() {
		let s = format!("{}trigger_channel = 2\ndata_channel = 4\nwaveform_format = byte\nx_axis_scale = x_increment\n", SAMPLE);
		let conf = ScopeConfig::from_ini_str(&s, DEFAULT_SECTION).unwrap();
		assert_eq!(conf.trigger_channel, 2);
		assert_eq!(conf.data_channel, 4);
		assert_eq!(conf.waveform_format, WaveformFormat::Byte);
		assert_eq!(conf.x_axis_scale, XAxisScale::XIncrement);
	}

	#[test]
	fn missing_key_is_reported() {
		let s = SAMPLE.replace("ch1_scale = 0.05\n", "");
		match ScopeConfig::from_ini_str(&s, DEFAULT_SECTION) {
			Err(Error::Config(msg)) => assert!(msg.contains("ch1_scale")),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn bad_numbers_and_ranges() {
		let s = SAMPLE.replace("segment_count = 1000", "segment_count = lots");
		assert!(matches!(ScopeConfig::from_ini_str(&s, DEFAULT_SECTION), Err(Error::Config(_))));

		let s = SAMPLE.replace("segment_count = 1000", "segment_count = 0");
		assert!(matches!(ScopeConfig::from_ini_str(&s, DEFAULT_SECTION), Err(Error::Config(_))));

		let s = SAMPLE.replace("timeout_ms = 20000", "timeout_ms = 0");
		assert!(matches!(ScopeConfig::from_ini_str(&s, DEFAULT_SECTION), Err(Error::Config(_))));

		let s = format!("{}data_channel = 5\n", SAMPLE);
		assert!(matches!(ScopeConfig::from_ini_str(&s, DEFAULT_SECTION), Err(Error::Config(_))));
	}

	#[test]
	fn missing_section() {
		assert!(matches!(ScopeConfig::from_ini_str(SAMPLE, "Other"), Err(Error::Config(_))));
	}
}
