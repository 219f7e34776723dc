
use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Serialize, Deserialize};

use crate::errors::{Error, Result};

pub const PREAMBLE_FIELDS:usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaveformFormat { Byte, Word, Ascii }

impl WaveformFormat {

	pub fn from_code(code:i64) -> Option<Self> {
		match code {
			0 => Some(WaveformFormat::Byte),
			1 => Some(WaveformFormat::Word),
			4 => Some(WaveformFormat::Ascii),
			_ => None,
		}
	}

	pub fn as_scpi(&self) -> &'static str {
		match self {
			WaveformFormat::Byte  => "BYTE",
			WaveformFormat::Word  => "WORD",
			WaveformFormat::Ascii => "ASCii",
		}
	}

	/// ASCII transfers already carry volts
	pub fn is_raw(&self) -> bool { *self != WaveformFormat::Ascii }

}

impl FromStr for WaveformFormat {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim().to_ascii_uppercase().as_str() {
			"BYTE"  => Ok(WaveformFormat::Byte),
			"WORD"  => Ok(WaveformFormat::Word),
			"ASCII" => Ok(WaveformFormat::Ascii),
			_       => Err(Error::Parse(s.to_owned())),
		}
	}
}

impl fmt::Display for WaveformFormat {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result { f.write_str(self.as_scpi()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AcquisitionType { Normal, Peak, Average, HResolution }

impl AcquisitionType {
	pub fn from_code(code:i64) -> Option<Self> {
		match code {
			0 => Some(AcquisitionType::Normal),
			1 => Some(AcquisitionType::Peak),
			2 => Some(AcquisitionType::Average),
			3 => Some(AcquisitionType::HResolution),
			_ => None,
		}
	}
}

/// Which preamble increment spaces the time axis.
///
/// `YIncrement` (the default) multiplies the sample index by the vertical increment;
/// `XIncrement` uses the sample interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxisScale { YIncrement, XIncrement }

impl Default for XAxisScale {
	fn default() -> Self { XAxisScale::YIncrement }
}

impl FromStr for XAxisScale {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"y_increment" => Ok(XAxisScale::YIncrement),
			"x_increment" => Ok(XAxisScale::XIncrement),
			_             => Err(Error::Parse(s.to_owned())),
		}
	}
}

/// Response to `:WAVeform:PREamble?`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
	pub format: WaveformFormat,
	pub acq_type: AcquisitionType,
	/// Points in each segment
	pub points: usize,
	pub count: u32,
	/// Time between data points
	pub x_increment: f64,
	/// Time of the first data point in memory
	pub x_origin: f64,
	/// Index of the data point associated with x_origin
	pub x_reference: f64,
	pub y_increment: f64,
	pub y_origin: f64,
	pub y_reference: f64,
}

fn pre_err(msg:String) -> Error { Error::Preamble(msg) }

fn int_field(name:&str, s:&str) -> Result<i64> {
	s.trim().parse::<i64>().map_err(|_| pre_err(format!("{} is not an integer: {:?}", name, s)))
}

fn float_field(name:&str, s:&str) -> Result<f64> {
	s.trim().parse::<f64>().map_err(|_| pre_err(format!("{} is not a number: {:?}", name, s)))
}

impl Preamble {

	pub fn parse(s:&str) -> Result<Self> {
		let pre:Vec<&str> = s.trim().split(',').collect();
		if pre.len() < PREAMBLE_FIELDS {
			return Err(pre_err(format!("expected {} fields, got {}", PREAMBLE_FIELDS, pre.len())));
		}

		let format_code = int_field("format", pre[0])?;
		let format = WaveformFormat::from_code(format_code)
			.ok_or_else(|| pre_err(format!("unknown format code {}", format_code)))?;

		let type_code = int_field("type", pre[1])?;
		let acq_type = AcquisitionType::from_code(type_code)
			.ok_or_else(|| pre_err(format!("unknown acquisition type {}", type_code)))?;

		let points = int_field("points", pre[2])?;
		if points < 0 { return Err(pre_err(format!("negative point count {}", points))); }
		let count = int_field("count", pre[3])?;
		if count < 0 { return Err(pre_err(format!("negative count {}", count))); }

		Ok(Preamble {
			format,
			acq_type,
			points: points as usize,
			count: count as u32,
			x_increment: float_field("x_increment", pre[4])?,
			x_origin:    float_field("x_origin", pre[5])?,
			x_reference: float_field("x_reference", pre[6])?,
			y_increment: float_field("y_increment", pre[7])?,
			y_origin:    float_field("y_origin", pre[8])?,
			y_reference: float_field("y_reference", pre[9])?,
		})
	}

	/// Sample times `(i - x_reference) * increment + x_origin` for `i` in `0..points`
	pub fn time_axis(&self, scale:XAxisScale) -> Vec<f64> {
		let inc:f64 = match scale {
			XAxisScale::YIncrement => self.y_increment,
			XAxisScale::XIncrement => self.x_increment,
		};
		(0..self.points).map(|i| (i as f64 - self.x_reference) * inc + self.x_origin).collect()
	}

	/// Converts raw codes to volts: `(raw - y_reference) * y_increment + y_origin`
	pub fn scale(&self, raw:&[f64]) -> Vec<f64> {
		raw.iter().map(|r| (r - self.y_reference) * self.y_increment + self.y_origin).collect()
	}

}

/// Decodes a block payload. BYTE is signed 8 bit, WORD signed 16 bit little endian,
/// ASCII comma separated values.
pub fn decode_samples(format:WaveformFormat, payload:&[u8]) -> Result<Vec<f64>> {
	match format {
		WaveformFormat::Byte => Ok(payload.iter().map(|b| *b as i8 as f64).collect()),
		WaveformFormat::Word => {
			if payload.len() % 2 != 0 {
				return Err(Error::Block(format!("odd byte count {} for WORD data", payload.len())));
			}
			let mut words:Vec<i16> = vec![0; payload.len() / 2];
			LittleEndian::read_i16_into(payload, &mut words);
			Ok(words.into_iter().map(f64::from).collect())
		},
		WaveformFormat::Ascii => {
			let text = std::str::from_utf8(payload).map_err(|_| Error::Block("ASCII data is not UTF-8".to_owned()))?;
			text.split(',')
				.map(str::trim)
				.filter(|v| !v.is_empty())
				.map(|v| v.parse::<f64>().map_err(|_| Error::Parse(v.to_owned())))
				.collect()
		},
	}
}

/// Splits a flat buffer into `count` equal segments
pub fn split_segments(data:Vec<f64>, count:usize) -> Result<Vec<Vec<f64>>> {
	if count == 0 || data.len() % count != 0 {
		return Err(Error::SegmentSplit{ len: data.len(), count });
	}
	if data.is_empty() {
		return Ok(vec![vec![]; count]);
	}
	let seg_len:usize = data.len() / count;
	Ok(data.chunks(seg_len).map(|c| c.to_vec()).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	const PRE:&str = "+1,+0,+4,+2,+2.00000000E-10,-4.00000000E-10,+0.00000000E+00,+1.50000000E-03,+1.00000000E-01,+0.00000000E+00\n";

	fn approx(a:&[f64], b:&[f64]) {
		assert_eq!(a.len(), b.len());
		for (x, y) in a.iter().zip(b) {
			assert!((x - y).abs() < 1e-12, "{:?} != {:?}", a, b);
		}
	}

	#[test]
	fn parses_instrument_preamble() {
		let pre = Preamble::parse(PRE).unwrap();
		assert_eq!(pre.format, WaveformFormat::Word);
		assert_eq!(pre.acq_type, AcquisitionType::Normal);
		assert_eq!(pre.points, 4);
		assert_eq!(pre.count, 2);
		assert_eq!(pre.x_increment, 2e-10);
		assert_eq!(pre.x_origin, -4e-10);
		assert_eq!(pre.y_increment, 1.5e-3);
		assert_eq!(pre.y_origin, 0.1);
	}

	#[test]
	fn rejects_malformed_preambles() {
		assert!(matches!(Preamble::parse("+1,+0,+4"), Err(Error::Preamble(_))));
		assert!(matches!(Preamble::parse(&PRE.replacen("+1,", "+2,", 1)), Err(Error::Preamble(_))));
		assert!(matches!(Preamble::parse(&PRE.replacen("+0,+4", "+9,+4", 1)), Err(Error::Preamble(_))));
		assert!(matches!(Preamble::parse(&PRE.replace("+1.50000000E-03", "abc")), Err(Error::Preamble(_))));
	}

	#[test]
	fn voltage_transform_is_elementwise() {
		let mut pre = Preamble::parse(PRE).unwrap();
		pre.y_reference = 10.0;
		let volts = pre.scale(&[10.0, 110.0, -90.0]);
		approx(&volts, &[0.1, 0.25, -0.05]);
	}

	#[test]
	fn time_axis_uses_y_increment_by_default() {
		let mut pre = Preamble::parse(PRE).unwrap();
		pre.x_reference = 1.0;
		approx(&pre.time_axis(XAxisScale::default()), &[
			-1.5e-3 - 4e-10,
			-4e-10,
			1.5e-3 - 4e-10,
			3.0e-3 - 4e-10,
		]);
		approx(&pre.time_axis(XAxisScale::XIncrement), &[-6e-10, -4e-10, -2e-10, 0.0]);
	}

	#[test]
	fn decodes_each_format() {
		approx(&decode_samples(WaveformFormat::Byte, &[0x00, 0x7f, 0x80, 0xff]).unwrap(), &[0.0, 127.0, -128.0, -1.0]);
		approx(&decode_samples(WaveformFormat::Word, &[0x01, 0x00, 0x00, 0x80, 0xff, 0xff]).unwrap(), &[1.0, -32768.0, -1.0]);
		approx(&decode_samples(WaveformFormat::Ascii, b"1.5e-3, -2.0e-3,\n").unwrap(), &[1.5e-3, -2.0e-3]);
		assert!(decode_samples(WaveformFormat::Word, &[1, 2, 3]).is_err());
		assert!(decode_samples(WaveformFormat::Ascii, b"1.0,volts").is_err());
	}

	#[test]
	fn splits_into_equal_segments() {
		let segs = split_segments((0..6).map(f64::from).collect(), 3).unwrap();
		assert_eq!(segs, vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]);

		assert!(matches!(split_segments(vec![0.0; 7], 3), Err(Error::SegmentSplit{ len: 7, count: 3 })));
		assert!(split_segments(vec![0.0; 4], 0).is_err());
	}

	#[test]
	fn format_names() {
		assert_eq!("word".parse::<WaveformFormat>().unwrap(), WaveformFormat::Word);
		assert_eq!(WaveformFormat::Ascii.as_scpi(), "ASCii");
		assert!("float".parse::<WaveformFormat>().is_err());
		assert_eq!("X_INCREMENT".parse::<XAxisScale>().unwrap(), XAxisScale::XIncrement);
	}
}
