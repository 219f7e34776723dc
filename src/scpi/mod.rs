
// SCPI sessions: the seam between the wire protocols and the device drivers

use std::io;
use std::str;
use std::time::Duration;

use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::errors::{Error, Result};
use crate::vxi11::CoreClient;

pub mod block;
pub mod resource;
pub mod socket;

pub use self::resource::Resource;
pub use self::socket::SocketClient;

lazy_static! {
    static ref IDN_RE: Regex = Regex::new("^([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
    static ref ERR_RE: Regex = Regex::new("^([+-]?\\d+)\\s*,\\s*\"?([^\"]*)\"?").unwrap();
}

/// Byte-level message exchange with an instrument
pub trait Transport {
	fn write(&mut self, data:&[u8]) -> io::Result<()>;
	fn read(&mut self) -> io::Result<Vec<u8>>;
	fn close(&mut self) -> io::Result<()>;

	fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		self.write(data)?;
		self.read()
	}
}

impl Transport for CoreClient {
	fn write(&mut self, data:&[u8]) -> io::Result<()> { CoreClient::write(self, data) }
	fn read(&mut self) -> io::Result<Vec<u8>>          { CoreClient::read(self) }
	fn close(&mut self) -> io::Result<()>              { self.destroy_link() }
}

impl Transport for SocketClient {
	fn write(&mut self, data:&[u8]) -> io::Result<()> { SocketClient::write(self, data) }
	fn read(&mut self) -> io::Result<Vec<u8>>          { SocketClient::read(self) }
	fn close(&mut self) -> io::Result<()>              { self.shutdown() }
}

/// Opens the transport a resource string asks for
pub fn open(resource:&Resource, timeout:Option<Duration>) -> Result<Box<dyn Transport>> {
	log::debug!("scpi: opening {}", resource);
	match resource {
		Resource::Vxi11{ host, device } => {
			let mut core = CoreClient::new(host, timeout)?;
			core.create_link(device)?;
			Ok(Box::new(core))
		},
		Resource::Socket{ host, port } => {
			Ok(Box::new(SocketClient::connect((host.as_str(), *port), timeout)?))
		},
	}
}

/// Decodes a text reply, dropping the terminator and surrounding whitespace
pub fn reply_str(data:&[u8]) -> io::Result<String> {
	str::from_utf8(data)
		.map(|s| s.trim().to_owned())
		.map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Unable to parse response as UTF-8"))
}

/// Response to `*IDN?`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

impl Identity {
	pub fn parse(s:&str) -> Result<Self> {
		let caps = IDN_RE.captures(s.trim()).ok_or_else(|| Error::Parse(s.to_owned()))?;
		Ok(Identity {
			manufacturer: caps[1].trim().to_owned(),
			model:        caps[2].trim().to_owned(),
			serial_num:   caps[3].trim().to_owned(),
			fw_version:   caps[4].trim().to_owned(),
		})
	}
}

/// One entry of the `:SYSTem:ERRor?` queue, e.g. `-113,"Undefined header"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentError {
	pub code: i32,
	pub message: String,
}

impl InstrumentError {
	pub fn parse(s:&str) -> Result<Self> {
		let caps = ERR_RE.captures(s.trim()).ok_or_else(|| Error::Parse(s.to_owned()))?;
		let code:i32 = caps[1].parse().map_err(|_| Error::Parse(s.to_owned()))?;
		Ok(InstrumentError{ code, message: caps[2].to_owned() })
	}

	/// The queue reports `+0,"No error"` once it's drained
	pub fn is_empty_marker(s:&str) -> bool { s.trim().starts_with("+0") }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idn_fields() {
		let idn = Identity::parse("KEYSIGHT TECHNOLOGIES,DSO-X 3034T,MY58101234,07.50.2021102830\n").unwrap();
		assert_eq!(idn.manufacturer, "KEYSIGHT TECHNOLOGIES");
		assert_eq!(idn.model, "DSO-X 3034T");
		assert_eq!(idn.serial_num, "MY58101234");
		assert_eq!(idn.fw_version, "07.50.2021102830");
		assert!(Identity::parse("garbage").is_err());
	}

	#[test]
	fn error_queue_entries() {
		assert_eq!(
			InstrumentError::parse("-113,\"Undefined header\"").unwrap(),
			InstrumentError{ code: -113, message: "Undefined header".to_owned() }
		);
		assert_eq!(InstrumentError::parse("+0,\"No error\"").unwrap().code, 0);
		assert!(InstrumentError::is_empty_marker("+0,\"No error\"\n"));
		assert!(!InstrumentError::is_empty_marker("-222,\"Data out of range\""));
		assert!(InstrumentError::parse("no comma here").is_err());
	}

	#[test]
	fn reply_is_trimmed() {
		assert_eq!(reply_str(b"+1000\n").unwrap(), "+1000");
		assert!(reply_str(&[0xff, 0xfe]).is_err());
	}
}
