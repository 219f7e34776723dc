
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DESTROY_LINK:u32      = 23;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_TIMEOUT_MS:u32 = 10000;
pub const DEFAULT_DEVICE:&str = "inst0";

pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a device_read response
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

// Some instruments advertise a receive size of zero or something tiny; never chunk below this
const MIN_WRITE_CHUNK:usize = 1024;

use std::convert::TryFrom;
use std::io::{self, Error, ErrorKind};
use std::ops::Drop;
use std::time::Duration;

use crate::rpc::port_mapping::{TcpPortMapperClient, Mapping, Protocol};
use crate::rpc::tcp_clients::TcpClient;

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

pub mod xdr_pack;

/// Maps a VXI-11 device error code to an `io::Error`
pub fn device_error(code:i32) -> io::Error {
    match code {
        1  => err("Syntax error"),
        3  => err("Device not accessible"),
        4  => err("Invalid link identifier"),
        5  => err("Parameter error"),
        6  => err("Channel not established"),
        8  => err("Operation not supported"),
        9  => err("Out of resources"),
        11 => err("Device locked by another link"),
        12 => err("No lock held by this link"),
        15 => Error::new(ErrorKind::TimedOut, "I/O timeout"),
        17 => err("I/O error"),
        21 => err("Invalid address"),
        23 => err("Abort"),
        29 => err("Channel already established"),
        _  => Error::new(ErrorKind::Other, format!("Unknown VXI-11 error {}", code)),
    }
}

/// Checks that a portmapper reply fits in a TCP port number
pub fn core_port(port:u32) -> io::Result<u16> {
    u16::try_from(port).map_err(|_| Error::new(ErrorKind::InvalidData, format!("Portmapper returned invalid port {}", port)))
}

pub struct CoreClient {
    client: TcpClient,
    opt_link: Option<Link>,
    io_timeout_ms: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub link_id: i32,
    pub abort_port: u32,
    pub max_recv_size: u32,
}

impl CoreClient {

    fn get_link(&self) -> io::Result<Link> {
        self.opt_link.ok_or_else(|| err("No link"))
    }

    /// Looks up the core channel through the portmapper on `host` and connects to it
    pub fn new(host:&str, timeout:Option<Duration>) -> io::Result<Self> {

        // Find the port to use for the core program
        let mut pmap_client = TcpPortMapperClient::new(host, timeout)?;

        let mapping = Mapping {
            program: DEVICE_CORE_PROG,
            version: DEVICE_CORE_VERS,
            protocol: Protocol::TCP,
            port: 0,
        };

        let port = pmap_client.get_port(&mapping)?;
        log::debug!("vxi11: core channel for {} on port {}", host, port);

        Self::with_port(host, core_port(port)?, timeout)
    }

    /// Connects straight to a known core channel port, skipping the portmapper
    pub fn with_port(host:&str, port:u16, timeout:Option<Duration>) -> io::Result<Self> {
        let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, timeout)?;

        let io_timeout_ms:u32 = match timeout {
            Some(t) => t.as_millis().min(u32::MAX as u128) as u32,
            None    => DEFAULT_TIMEOUT_MS,
        };

        Ok(CoreClient {client, opt_link: None, io_timeout_ms })
    }

    pub fn link(&self) -> Option<Link> { self.opt_link }

    pub fn create_link(&mut self, device:&str) -> io::Result<()> {
        if self.opt_link.is_some() {
            return Err(err("Already connected to a link"));
        }

        self.client.start_call(CREATE_LINK)?;
        xdr_pack::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, self.io_timeout_ms, device)?;

        self.client.do_call()?;

        let error:i32         = self.client.unpacker.unpack_i32()?;
        let link_id:i32       = self.client.unpacker.unpack_i32()?;
        let abort_port:u32    = self.client.unpacker.unpack_u32()?;
        let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

        if error != 0 {
            return Err(device_error(error));
        }

        log::debug!("vxi11: created link {} to {} (max_recv_size={})", link_id, device, max_recv_size);
        self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });
        Ok(())
    }

    pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
        self.write(data)?;
        self.read()
    }

    /// Sends `data`, split into chunks no larger than the instrument's receive size.
    /// Only the last chunk carries the END flag.
    pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
        let link:Link = self.get_link()?;
        let chunk_size:usize = (link.max_recv_size as usize).max(MIN_WRITE_CHUNK);

        let mut chunks = data.chunks(chunk_size).peekable();
        if chunks.peek().is_none() {
            return self.write_chunk(link.link_id, &[], OPERATION_FLAGS_END_ONLY);
        }
        while let Some(chunk) = chunks.next() {
            let flags:i32 = if chunks.peek().is_none() { OPERATION_FLAGS_END_ONLY } else { 0 };
            self.write_chunk(link.link_id, chunk, flags)?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, link_id:i32, data:&[u8], flags:i32) -> io::Result<()> {
        self.client.start_call(DEVICE_WRITE)?;
        xdr_pack::pack_device_write_parms(&mut self.client.packer, link_id, self.io_timeout_ms, self.io_timeout_ms, flags, data)?;

        self.client.do_call()?;

        let error:i32 = self.client.unpacker.unpack_i32()?;
        let size:u32  = self.client.unpacker.unpack_u32()?;

        if error != 0 {
            return Err(device_error(error));
        }

        if size as usize != data.len() {
            return Err(err("Number of bytes in confirmation doesn't match number of bytes sent"));
        }

        Ok(())
    }

    /// Reads one complete response, issuing further device_read calls until END is flagged
    pub fn read(&mut self) -> io::Result<Vec<u8>> {
        let link:Link = self.get_link()?;
        let mut ans:Vec<u8> = vec![];

        loop {
            self.client.start_call(DEVICE_READ)?;
            xdr_pack::pack_device_read_parms(&mut self.client.packer, link.link_id, u32::MAX, self.io_timeout_ms, self.io_timeout_ms, 0, 0)?;
            self.client.do_call()?;

            let error:i32    = self.client.unpacker.unpack_i32()?;
            let reason:i32   = self.client.unpacker.unpack_i32()?;
            let data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;

            if error != 0 {
                return Err(device_error(error));
            }

            ans.extend_from_slice(&data);

            if reason & !(REASON_REQCNT | REASON_CHR | REASON_END) != 0 {
                return Err(err("Bits in reason code that should be zero aren't zero"));
            } else if reason & (REASON_END | REASON_CHR) != 0 {
                return Ok(ans);
            } else if data.is_empty() {
                return Err(err("Empty device_read reply without END or CHR"));
            }

            log::trace!("vxi11: partial read of {} bytes, {} so far", data.len(), ans.len());
        }
    }

    pub fn destroy_link(&mut self) -> io::Result<()> {
        let link:Link = match self.opt_link.take() {
            Some(link) => link,
            None       => return Err(err("No link to destroy")),
        };

        self.client.start_call(DESTROY_LINK)?;
        xdr_pack::pack_device_link(&mut self.client.packer, link.link_id)?;
        self.client.do_call()?;

        match self.client.unpacker.unpack_i32()? {
            0    => Ok(()),
            code => Err(device_error(code)),
        }
    }

}

impl Drop for CoreClient {

    fn drop(&mut self) {
        if self.opt_link.is_some() {
            if let Err(e) = self.destroy_link() {
                log::warn!("vxi11: unable to destroy link: {}", e);
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_code_maps_to_timed_out() {
        assert_eq!(device_error(15).kind(), ErrorKind::TimedOut);
        assert_eq!(device_error(11).to_string(), "Device locked by another link");
        assert!(device_error(99).to_string().contains("99"));
    }

    #[test]
    fn portmapper_port_must_fit_u16() {
        assert_eq!(core_port(4321).unwrap(), 4321);
        assert_eq!(core_port(65535).unwrap(), 65535);
        assert_eq!(core_port(70000).unwrap_err().kind(), ErrorKind::InvalidData);
    }
}
