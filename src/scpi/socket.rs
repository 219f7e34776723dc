
use std::io::{self, BufRead, BufReader, Error, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::block::parse_header;

/// SCPI over a raw TCP socket (port 5025 on Keysight scopes).
///
/// Messages are newline-terminated. A reply starting with `#` is read as a
/// binary block so that newlines inside the payload don't end it early.
pub struct SocketClient {
	reader: BufReader<TcpStream>,
	writer: TcpStream,
}

impl SocketClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, timeout:Option<Duration>) -> io::Result<Self> {
		let writer = TcpStream::connect(addr)?;
		writer.set_read_timeout(timeout)?;
		writer.set_write_timeout(timeout)?;
		writer.set_nodelay(true)?;

		let reader = BufReader::new(writer.try_clone()?);
		Ok(Self{ reader, writer })
	}

	pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
		let mut msg:Vec<u8> = Vec::with_capacity(data.len() + 1);
		msg.extend_from_slice(data);
		if !msg.ends_with(b"\n") { msg.push(b'\n'); }
		self.writer.write_all(&msg)
	}

	pub fn read(&mut self) -> io::Result<Vec<u8>> {
		let first:u8 = match self.reader.fill_buf()?.first() {
			Some(b) => *b,
			None    => return Err(Error::new(ErrorKind::UnexpectedEof, "Connection closed by instrument")),
		};

		if first != b'#' {
			let mut line:Vec<u8> = vec![];
			self.reader.read_until(b'\n', &mut line)?;
			return Ok(line);
		}

		// Pull in enough bytes to know the header, one byte at a time
		let mut ans:Vec<u8> = vec![];
		let header = loop {
			match parse_header(&ans).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))? {
				Some(header) => break header,
				None => {
					let mut b:[u8; 1] = [0];
					self.reader.read_exact(&mut b)?;
					ans.push(b[0]);
				}
			}
		};

		match header.payload_len {
			Some(n) => {
				let start = ans.len();
				ans.resize(start + n, 0);
				self.reader.read_exact(&mut ans[start..])?;
				// Swallow the terminator
				let mut nl:Vec<u8> = vec![];
				self.reader.read_until(b'\n', &mut nl)?;
			},
			None => { self.reader.read_until(b'\n', &mut ans)?; },
		}

		Ok(ans)
	}

	pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		self.write(data)?;
		self.read()
	}

	pub fn shutdown(&mut self) -> io::Result<()> {
		self.writer.shutdown(Shutdown::Both)
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;
	use std::thread;

	#[test]
	fn text_and_block_replies() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = thread::spawn(move || {
			let (stream, _) = listener.accept().unwrap();
			let mut reader = BufReader::new(stream.try_clone().unwrap());
			let mut writer = stream;

			let mut line = String::new();
			reader.read_line(&mut line).unwrap();
			assert_eq!(line, "*IDN?\n");
			writer.write_all(b"KEYSIGHT TECHNOLOGIES,DSOX3034T,MY1,07.50\n").unwrap();

			line.clear();
			reader.read_line(&mut line).unwrap();
			assert_eq!(line, ":WAVeform:DATA?\n");
			writer.write_all(b"#14\n\x01\n\x02\n").unwrap();
		});

		let mut client = SocketClient::connect(("127.0.0.1", port), Some(Duration::from_secs(5))).unwrap();
		assert_eq!(client.ask(b"*IDN?").unwrap(), b"KEYSIGHT TECHNOLOGIES,DSOX3034T,MY1,07.50\n".to_vec());
		assert_eq!(client.ask(b":WAVeform:DATA?").unwrap(), b"#14\n\x01\n\x02".to_vec());

		server.join().unwrap();
	}
}
