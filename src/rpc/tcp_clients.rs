
extern crate byteorder;

use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt, ReadBytesExt};

use crate::xdr;
use super::{xdr_pack, xdr_unpack, LAST_FRAGMENT};

pub struct TcpClient {
    pub stream: TcpStream,
    pub prog: u32,
    pub vers: u32,
    pub lastxid: u32,
    pub packer: xdr::Packer,
    pub unpacker: xdr::Unpacker,
}

/// Writes one call as a single-fragment record
pub fn write_record<W: Write>(w:&mut W, record:&[u8]) -> io::Result<()> {
	let mut send_bytes:Vec<u8> = Vec::with_capacity(record.len() + 4);
	send_bytes.write_u32::<BigEndian>(record.len() as u32 | LAST_FRAGMENT)?;
	send_bytes.extend_from_slice(record);
	w.write_all(&send_bytes)
}

/// Reads fragments until the one flagged as last and returns the reassembled record
pub fn read_record<R: Read>(r:&mut R) -> io::Result<Vec<u8>> {
	let mut reply:Vec<u8> = vec![];

	let mut last:bool = false;
	while !last {
		let x:u32 = r.read_u32::<BigEndian>()?;

		last = (x & LAST_FRAGMENT) != 0;
		let n:usize = (x & !LAST_FRAGMENT) as usize;

		let start = reply.len();
		reply.resize(start + n, 0);
		r.read_exact(&mut reply[start..])?;
	}

	Ok(reply)
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr: A, prog: u32, vers: u32, timeout: Option<Duration>) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;
		stream.set_read_timeout(timeout)?;
		stream.set_write_timeout(timeout)?;
		stream.set_nodelay(true)?;

		// Start from a random xid so a reconnecting client doesn't collide with stale replies
		let lastxid:u32 = rand::random::<u32>() >> 1;
		log::trace!("rpc: connected to {:?} prog={:#x} vers={} xid={}", stream.peer_addr(), prog, vers, lastxid);

		Ok(Self{ stream, prog, vers, lastxid, packer: xdr::Packer::new(), unpacker: xdr::Unpacker::new() })
	}

	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid = self.lastxid.wrapping_add(1);
		self.packer.reset();
		xdr_pack::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	pub fn do_call(&mut self) -> io::Result<()> {
		if !self.packer.get_buf().is_empty() {
			write_record(&mut self.stream, self.packer.get_buf())?;
		}

		loop {
			let reply:Vec<u8> = read_record(&mut self.stream)?;

	        // Load the response into the unpacker and make sure the xid matches
	        self.unpacker.reset(&reply);

	        let (xid, _) = xdr_unpack::unpack_replyheader(&mut self.unpacker)?;
	        if xid == self.lastxid {
				// Packet from the present
				return Ok(());
	        } else if xid.wrapping_sub(self.lastxid) > (u32::MAX >> 1) {
		        // Packet from the past
		        log::debug!("rpc: dropping stale reply xid={} (expected {})", xid, self.lastxid);
		        continue;
	        } else {
		        // Packet from the future?
	        	return Err(Error::new(ErrorKind::Other, "Somehow got a packet from the future"));
	        }
		}

	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn multi_fragment_record_is_reassembled() {
		let mut wire:Vec<u8> = vec![];
		wire.write_u32::<BigEndian>(4).unwrap();
		wire.extend_from_slice(&[1, 2, 3, 4]);
		wire.write_u32::<BigEndian>(LAST_FRAGMENT | 2).unwrap();
		wire.extend_from_slice(&[5, 6]);

		let record = read_record(&mut Cursor::new(wire)).unwrap();
		assert_eq!(record, vec![1, 2, 3, 4, 5, 6]);
	}

	#[test]
	fn written_record_reads_back() {
		let mut wire:Vec<u8> = vec![];
		write_record(&mut wire, &[9, 8, 7, 6]).unwrap();
		assert_eq!(&wire[..4], &[0x80, 0, 0, 4]);
		assert_eq!(read_record(&mut Cursor::new(wire)).unwrap(), vec![9, 8, 7, 6]);
	}

	#[test]
	fn truncated_fragment_is_an_error() {
		let mut wire:Vec<u8> = vec![];
		wire.write_u32::<BigEndian>(LAST_FRAGMENT | 8).unwrap();
		wire.extend_from_slice(&[1, 2, 3]);
		assert!(read_record(&mut Cursor::new(wire)).is_err());
	}
}
