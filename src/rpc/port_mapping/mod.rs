
pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::xdr_pack;
use super::tcp_clients::TcpClient;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(&self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,				// XDR encodes it as a u32 for alignment
}

pub struct TcpPortMapperClient {
	pub host: String,
	pub tcp_client: TcpClient,
}

impl TcpPortMapperClient {

	pub fn new(host:&str, timeout:Option<Duration>) -> io::Result<Self> {
		Self::with_port(host, PMAP_PORT, timeout)
	}

	pub fn with_port(host:&str, port:u16, timeout:Option<Duration>) -> io::Result<Self> {
		let tcp_client = TcpClient::connect((host, port), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ host: host.to_owned(), tcp_client })
	}

	pub fn get_port(&mut self, m:&Mapping) -> io::Result<u32> {
        self.tcp_client.start_call(PMAPPROC_GETPORT)?;
        xdr_pack::pack_mapping(&mut self.tcp_client.packer, m.program, m.version, m.protocol.to_u32(), m.port)?;
        self.tcp_client.do_call()?;

       	let ans:u32 = self.tcp_client.unpacker.unpack_u32()?;

       	if !self.tcp_client.unpacker.all_data_consumed() {
       		return Err(Error::new(ErrorKind::Other, "Data unexpectedly left over in unpacker after unpacking port"));
       	}

       	// A zero port means the program isn't registered
       	if ans == 0 { Err(Error::new(ErrorKind::NotFound, format!("Program {:#x} v{} not registered with portmapper on {}", m.program, m.version, self.host))) }
       	else        { Ok(ans) }
	}

}
