
use std::fmt;

use regex::Regex;

use crate::errors::{Error, Result};
use crate::vxi11::DEFAULT_DEVICE;

lazy_static! {
    static ref INTF_RE: Regex = Regex::new("(?i)^(TCPIP|USB|GPIB|ASRL|VXI|PXI)(\\d*)$").unwrap();
}

/// A parsed VISA resource string
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
	/// `TCPIP[n]::host[::device][::INSTR]`, spoken over VXI-11
	Vxi11 { host: String, device: String },
	/// `TCPIP[n]::host::port::SOCKET`, newline-terminated SCPI over a raw socket
	Socket { host: String, port: u16 },
}

impl Resource {

	pub fn parse(s:&str) -> Result<Self> {
		let unsupported = || Error::UnsupportedResource(s.to_owned());

		let parts:Vec<&str> = s.trim().split("::").collect();
		let intf:&str = parts.first().copied().unwrap_or("");
		let caps = INTF_RE.captures(intf).ok_or_else(unsupported)?;

		if !caps[1].eq_ignore_ascii_case("TCPIP") {
			return Err(unsupported());
		}

		let rest:&[&str] = &parts[1..];
		let resource:Resource = match rest {
			[host, port, kind] if kind.eq_ignore_ascii_case("SOCKET") => {
				let port:u16 = port.parse().map_err(|_| unsupported())?;
				Ok(Resource::Socket{ host: host.to_string(), port })
			},
			[host] | [host, _] if rest.len() == 1 || rest[1].eq_ignore_ascii_case("INSTR") => {
				Ok(Resource::Vxi11{ host: host.to_string(), device: DEFAULT_DEVICE.to_owned() })
			},
			// HiSLIP is its own protocol, not a VXI-11 device name
			[_, device] | [_, device, _] if device.to_ascii_lowercase().starts_with("hislip") => Err(unsupported()),
			[host, device] | [host, device, _] if rest.len() == 2 || rest[2].eq_ignore_ascii_case("INSTR") => {
				Ok(Resource::Vxi11{ host: host.to_string(), device: device.to_string() })
			},
			_ => Err(unsupported()),
		}?;

		if resource.host().is_empty() { Err(unsupported()) }
		else { Ok(resource) }
	}

	pub fn host(&self) -> &str {
		match self {
			Resource::Vxi11{ host, .. }  => host,
			Resource::Socket{ host, .. } => host,
		}
	}

}

impl fmt::Display for Resource {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			Resource::Vxi11{ host, device } => write!(f, "TCPIP0::{}::{}::INSTR", host, device),
			Resource::Socket{ host, port }  => write!(f, "TCPIP0::{}::{}::SOCKET", host, port),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vxi11(host:&str, device:&str) -> Resource {
		Resource::Vxi11{ host: host.to_owned(), device: device.to_owned() }
	}

	#[test]
	fn instr_forms() {
		assert_eq!(Resource::parse("TCPIP0::192.168.1.5::INSTR").unwrap(), vxi11("192.168.1.5", "inst0"));
		assert_eq!(Resource::parse("TCPIP::scope.lab").unwrap(), vxi11("scope.lab", "inst0"));
		assert_eq!(Resource::parse("tcpip1::10.0.0.2::inst1::instr").unwrap(), vxi11("10.0.0.2", "inst1"));
	}

	#[test]
	fn socket_form() {
		assert_eq!(
			Resource::parse("TCPIP0::10.0.0.7::5025::SOCKET").unwrap(),
			Resource::Socket{ host: "10.0.0.7".to_owned(), port: 5025 }
		);
		assert!(Resource::parse("TCPIP0::10.0.0.7::fifty::SOCKET").is_err());
	}

	#[test]
	fn other_interfaces_are_rejected() {
		for s in &["USB0::0x2A8D::0x1770::MY1234::INSTR", "GPIB0::7::INSTR", "ASRL1::INSTR", "192.168.1.5", "TCPIP0::::INSTR",
				"TCPIP0::192.168.3.242::hislip0::INSTR", "TCPIP0::10.0.0.2::HiSLIP1"] {
			match Resource::parse(s) {
				Err(Error::UnsupportedResource(r)) => assert_eq!(&r, s),
				other => panic!("{} parsed as {:?}", s, other),
			}
		}
	}

	#[test]
	fn display_is_parseable() {
		let r = vxi11("scope", "inst0");
		assert_eq!(Resource::parse(&r.to_string()).unwrap(), r);
	}
}
