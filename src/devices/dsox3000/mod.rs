
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Serialize, Deserialize};

use crate::config::ScopeConfig;
use crate::errors::{Error, Result};
use crate::scpi::{self, block, Identity, InstrumentError, Resource, Transport};

pub mod preamble;

use self::preamble::{Preamble, XAxisScale, decode_samples, split_segments};

pub const RESET_SETTLE_SEC:f32 = 2.0;
pub const POLL_INTERVAL_SEC:f32 = 0.2;
pub const MAX_ERROR_QUEUE:usize = 30;

lazy_static! {
    static ref MODEL_RE: Regex = Regex::new("(?i)X\\s?3\\d{3}").unwrap();
}

/// True for InfiniiVision 3000 X/T model names such as `DSO-X 3034T` or `MSOX3104A`
pub fn is_3000_series(model:&str) -> bool { MODEL_RE.is_match(model) }

/// Delays the driver waits on the instrument
#[derive(Debug, Clone, Copy)]
pub struct Timing {
	pub reset_settle: Duration,
	pub poll_interval: Duration,
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			reset_settle: Duration::from_secs_f32(RESET_SETTLE_SEC),
			poll_interval: Duration::from_secs_f32(POLL_INTERVAL_SEC),
		}
	}
}

/// One segmented capture in physical units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acquisition {
	/// Sample times shared by every segment
	pub time: Vec<f64>,
	/// One voltage trace per segment; empty if the transfer failed
	pub segments: Vec<Vec<f64>>,
	pub preamble: Preamble,
}

/// Keysight InfiniiVision 3000 X/T series oscilloscope set up for segmented capture
pub struct DSOX3000 {
	transport: Box<dyn Transport>,
	conf: ScopeConfig,
	timing: Timing,
	identity: Identity,
	segment_count: u32,
}

impl DSOX3000 {

	pub fn connect(conf:&ScopeConfig) -> Result<Self> {
		let resource = Resource::parse(&conf.address)?;
		let transport = scpi::open(&resource, Some(conf.timeout()))?;
		Self::with_transport(transport, conf.clone(), Timing::default())
	}

	/// Resets the instrument behind `transport` and checks who it is
	pub fn with_transport(transport:Box<dyn Transport>, conf:ScopeConfig, timing:Timing) -> Result<Self> {
		let segment_count:u32 = conf.segment_count;
		let mut dev = DSOX3000{ transport, conf, timing, identity: Identity::default(), segment_count };

		dev.write("*RST")?;
		thread::sleep(dev.timing.reset_settle);

		let idn:String = dev.query("*IDN?")?;
		log::info!("Connected to: {}", idn);

		let identity = Identity::parse(&idn)?;
		let maker = identity.manufacturer.to_ascii_uppercase();
		if !maker.contains("KEYSIGHT") && !maker.contains("AGILENT") {
			return Err(Error::UnexpectedModel(idn));
		}
		if !is_3000_series(&identity.model) {
			log::warn!("{} is not a 3000 series scope, commands may be rejected", identity.model);
		}
		dev.identity = identity;

		Ok(dev)
	}

	pub fn identity(&self) -> &Identity { &self.identity }
	pub fn config(&self) -> &ScopeConfig { &self.conf }
	pub fn segment_count(&self) -> u32 { self.segment_count }

	/// Sends a command, then reports anything it left in the error queue.
	/// Instrument errors are logged, never returned.
	pub fn write(&mut self, cmd:&str) -> Result<()> {
		log::trace!("write: {}", cmd);
		self.transport.write(cmd.as_bytes())?;

		let errors = self.get_full_error_queue(false)?;
		if !errors.is_empty() {
			log::warn!("Errors while writing {} to instrument", cmd);
			for e in &errors {
				log::warn!("{}", e);
			}
		}
		Ok(())
	}

	pub fn query(&mut self, cmd:&str) -> Result<String> {
		let res = self.transport.ask(cmd.as_bytes()).and_then(|r| scpi::reply_str(&r));
		match res {
			Ok(reply) => {
				log::trace!("query: {} -> {}", cmd, reply);
				Ok(reply)
			},
			Err(e) => {
				log::error!("VisaError: {} when trying query '{}'", e, cmd);
				log::error!("Have you checked that the timeout (currently {} ms) is sufficiently long?", self.conf.timeout_ms);
				if let Err(queue_err) = self.get_full_error_queue(true) {
					log::error!("Could not retrieve errors from the oscilloscope: {}", queue_err);
				}
				Err(e.into())
			},
		}
	}

	/// Drains up to 30 entries from `:SYSTem:ERRor?`, oldest first
	pub fn get_full_error_queue(&mut self, verbose:bool) -> Result<Vec<String>> {
		let mut errors:Vec<String> = vec![];
		for _ in 0..MAX_ERROR_QUEUE {
			let err:String = scpi::reply_str(&self.transport.ask(b":SYSTem:ERRor?")?)?;
			if InstrumentError::is_empty_marker(&err) {
				break;
			}
			errors.push(err);
		}

		if verbose {
			if errors.is_empty() {
				log::info!("Error queue empty");
			} else {
				log::info!("Latest errors from the oscilloscope (FIFO queue, upto {} errors)", MAX_ERROR_QUEUE);
				for (i, err) in errors.iter().enumerate() {
					log::info!("{:>2}: {}", i, err);
				}
			}
		}

		Ok(errors)
	}

	/// Same as `get_full_error_queue`, with each entry split into code and message
	pub fn instrument_errors(&mut self) -> Result<Vec<InstrumentError>> {
		self.get_full_error_queue(false)?.iter().map(|e| InstrumentError::parse(e)).collect()
	}

	pub fn configure(&mut self) -> Result<()> {
		let trig:u8 = self.conf.trigger_channel;
		let data:u8 = self.conf.data_channel;
		let c = self.conf.clone();

		// Edge trigger on the trigger channel
		self.write(&format!(":CHANnel{}:DISPlay ON", trig))?;
		self.write(&format!(":TRIGger:EDGE:SOURce CHANnel{}", trig))?;
		self.write(&format!(":CHANnel{}:OFFSet {}", trig, c.ch3_offset))?;
		self.write(&format!(":TRIGger:MODE {}", c.ch3_trigger_mode))?;
		self.write(&format!(":TRIGger:EDGE:SLOPe {}", c.ch3_trigger_slope))?;
		self.write(&format!(":CHANnel{}:COUPling {}", trig, c.ch3_coupling))?;
		self.write(&format!(":TRIGger:EDGE:LEVel {}", c.ch3_trigger_level))?;
		self.write(":TRIGger:SWEep NORMal")?;

		// Data channel
		self.write(&format!(":WAVeform:SOURce CHANnel{}", data))?;
		self.write(&format!(":CHANnel{}:COUPling {}", data, c.ch1_coupling))?;
		self.write(&format!(":CHANnel{}:IMPedance {}", data, c.ch1_impedance))?;
		self.write(&format!(":CHANnel{}:SCALe {}", data, c.ch1_scale))?;

		self.write(&format!(":TIMebase:SCALe {}", c.tax_scale))?;

		self.write(":WAVeform:POINts MAX")?;
		self.write(&format!(":WAVeform:FORMat {}", c.waveform_format.as_scpi()))?;
		self.write(":WAVeform:BYTeorder LSBFirst")?;
		self.write(":WAVeform:UNSigned OFF")?;
		self.write(":WAVeform:POINts:MODE RAW")?;

		self.write(":ACQuire:TYPE NORMal")?;
		self.write(&format!(":ACQuire:SRATe:ANALog {}", c.sampling_rate))?;

		self.write(":ACQuire:MODE SEGMented")?;
		self.write(&format!(":ACQuire:SEGMented:COUNt {}", self.segment_count))?;
		self.write(":WAVeform:SEGMented:ALL ON")?;

		if c.x_axis_scale == XAxisScale::YIncrement {
			log::warn!("time axis is spaced by y_increment; set x_axis_scale = x_increment for the sample interval");
		}

		Ok(())
	}

	pub fn acquired_segments(&mut self) -> Result<i64> {
		let res:String = self.query(":WAVeform:SEGMented:COUNt?")?;
		res.parse::<i64>().map_err(|_| Error::Parse(res))
	}

	/// Blocks until the scope reports exactly `segment_count` captured segments
	pub fn wait_for_segments(&mut self) -> Result<()> {
		let target:i64 = self.segment_count as i64;
		let mut seg_count:i64 = self.acquired_segments()?;
		while seg_count != target {
			thread::sleep(self.timing.poll_interval);
			seg_count = self.acquired_segments()?;
			log::trace!("segments: {}/{}", seg_count, target);
		}
		Ok(())
	}

	pub fn read_preamble(&mut self) -> Result<Preamble> {
		let res:String = self.query(":WAVeform:PREamble?")?;
		Preamble::parse(&res)
	}

	fn transfer_raw(&mut self, pre:&Preamble) -> Result<Vec<f64>> {
		let reply:Vec<u8> = self.transport.ask(b":WAVeform:DATA?")?;
		let payload:&[u8] = block::parse_block(&reply)?;
		log::debug!("transferred {} bytes", payload.len());
		decode_samples(pre.format, payload)
	}

	/// Waits for the segmented capture to fill, then transfers and scales it.
	///
	/// A failed transfer is logged and yields an acquisition without segments.
	pub fn read_data(&mut self) -> Result<Acquisition> {
		log::info!("Acquiring triggers..");
		self.wait_for_segments()?;

		let t0 = Instant::now();
		let pre:Preamble = self.read_preamble()?;
		log::info!("Collected {} waveforms. Transfer to PC..", self.segment_count);

		let time:Vec<f64> = pre.time_axis(self.conf.x_axis_scale);

		let raw:Vec<f64> = match self.transfer_raw(&pre) {
			Ok(raw) => raw,
			Err(e) => {
				log::error!("VisaError: {} when trying to obtain the waveform", e);
				self.restart();
				return Ok(Acquisition{ time, segments: vec![], preamble: pre });
			},
		};

		let volts:Vec<f64> = if pre.format.is_raw() { pre.scale(&raw) } else { raw };
		let segments = match split_segments(volts, self.segment_count as usize) {
			Ok(segments) => segments,
			Err(e) => {
				self.restart();
				return Err(e);
			},
		};
		if segments.first().map(Vec::len) != Some(pre.points) {
			log::warn!("segment length {:?} differs from preamble point count {}", segments.first().map(Vec::len), pre.points);
		}

		log::info!("Transferred {} waveforms in {:.2} seconds.", self.segment_count, t0.elapsed().as_secs_f64());

		self.write(":RUN")?;
		Ok(Acquisition{ time, segments, preamble: pre })
	}

	/// Best-effort `:RUN` on the way out of a failed read
	fn restart(&mut self) {
		if let Err(e) = self.write(":RUN") {
			log::warn!("unable to restart acquisition: {}", e);
		}
	}

	pub fn close(mut self) -> Result<()> {
		self.transport.close()?;
		Ok(())
	}

}

// Implemented
// *RST                      *IDN?
// :SYSTem:ERRor?            :RUN
// :CHANnel<n>:DISPlay       :CHANnel<n>:OFFSet       :CHANnel<n>:COUPling
// :CHANnel<n>:IMPedance     :CHANnel<n>:SCALe        :TIMebase:SCALe
// :TRIGger:MODE             :TRIGger:SWEep           :TRIGger:EDGE:SOURce
// :TRIGger:EDGE:SLOPe       :TRIGger:EDGE:LEVel
// :ACQuire:TYPE             :ACQuire:MODE            :ACQuire:SRATe:ANALog
// :ACQuire:SEGMented:COUNt
// :WAVeform:SOURce          :WAVeform:FORMat         :WAVeform:BYTeorder
// :WAVeform:UNSigned        :WAVeform:POINts         :WAVeform:POINts:MODE
// :WAVeform:SEGMented:ALL   :WAVeform:SEGMented:COUNt?
// :WAVeform:PREamble?       :WAVeform:DATA?

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn model_names() {
		assert!(is_3000_series("DSO-X 3034T"));
		assert!(is_3000_series("MSO-X 3104A"));
		assert!(is_3000_series("DSOX3024A"));
		assert!(!is_3000_series("MSO-X 4034A"));
		assert!(!is_3000_series("DSO-X 2024A"));
		assert!(!is_3000_series("SDS1202X-E"));
	}
}
