
use std::io::{self, Error, ErrorKind};

use crate::xdr::Unpacker;
use crate::rpc::{CALL, REPLY, RPCVERSION, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED, PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

#[derive(Debug, PartialEq)]
pub struct CallHeader {
	pub xid: u32,
	pub prog: u32,
	pub vers: u32,
	pub prc: u32,
}

pub fn unpack_auth(unpacker:&mut Unpacker) -> io::Result<(i32, Vec<u8>)> {
	let flavor:i32    = unpacker.unpack_enum()?;
	let stuff:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok((flavor, stuff))
}

pub fn unpack_callheader(unpacker:&mut Unpacker) -> io::Result<CallHeader> {
	let xid:u32 = unpacker.unpack_u32()?;
	if unpacker.unpack_enum()? != CALL { return Err(err("Expected CALL message type in unpack_callheader")); }
	if unpacker.unpack_u32()? != RPCVERSION { return Err(err("Unsupported RPC version in unpack_callheader")); }

	let prog:u32 = unpacker.unpack_u32()?;
	let vers:u32 = unpacker.unpack_u32()?;
	let prc:u32  = unpacker.unpack_u32()?;

	unpack_auth(unpacker)?;  // cred
	unpack_auth(unpacker)?;  // verf

	Ok(CallHeader{ xid, prog, vers, prc })
}

pub fn unpack_replyheader(unpacker:&mut Unpacker) -> io::Result<(u32, (i32, Vec<u8>))> {
    let xid:u32 = unpacker.unpack_u32()?;

    let mtype:i32 = unpacker.unpack_enum()?;
    if mtype != REPLY { return Err(err("Expected REPLY message type in unpack_replyheader")); }

    match unpacker.unpack_enum()? {
		MSG_DENIED => {
	    	match unpacker.unpack_enum()? {
	    		RPC_MISMATCH => {
	    			unpacker.unpack_u32()?;	// This u32 gives the low value
					unpacker.unpack_u32()?;	// This u32 gives the high value
					return Err(err("Message denied due to RPC_MISMATCH in unpack_replyheader"))
	    		},
	    		AUTH_ERROR => {
					unpacker.unpack_u32()?;	// This u32 gives us another status code that might have more detail if needed
					return Err(err("Message denied due to AUTH_ERROR in unpack_replyheader"))
	    		}
	    		_ => return Err(err("Message denied for an unknown reason in unpack_replyheader")),
	    	}
	    },
	    MSG_ACCEPTED => { },
	    _            => return Err(err("Neither MSG_DENIED nor MSG_ACCEPTED in unpack_replyheader")),
    }

    let verf = unpack_auth(unpacker)?;

    match unpacker.unpack_enum()? {
    	PROG_UNAVAIL  => return Err(err("Program unavailable in unpack_replyheader")),
    	PROG_MISMATCH => {
			unpacker.unpack_u32()?;	// This u32 gives the low value
			unpacker.unpack_u32()?;	// This u32 gives the high value
    		return Err(err("Program mismatch in unpack_replyheader"))
    	},
    	PROC_UNAVAIL  => return Err(err("Procedure unavailable in unpack_replyheader")),
    	GARBAGE_ARGS  => return Err(err("Garbage args in unpack_replyheader")),
    	SUCCESS => { },
    	_ => return Err(err("Call failed for unknown reason in unpack_replyheader")),
    }

	Ok((xid, verf))
}
