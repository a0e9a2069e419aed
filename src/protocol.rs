//! Types and codecs that precisely match the Ether Dream TCP protocol.
//!
//! All multi-byte fields on the wire are little-endian. Outgoing command
//! frames are appended whole into a caller-supplied byte buffer; partial
//! frames cannot be expressed. Incoming acknowledgements are 22 bytes:
//! a 2-byte header followed by a 20-byte device status.

use bitflags::bitflags;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io;

use crate::config;
use crate::error::{Error, Result};
use crate::types::LaserPoint;

pub use self::command::Command;

/// A trait for writing any of the protocol types to little-endian bytes.
pub trait WriteBytes {
    fn write_bytes<P: WriteToBytes>(&mut self, protocol: P) -> io::Result<()>;
}

/// A trait for reading any of the protocol types from little-endian bytes.
pub trait ReadBytes {
    fn read_bytes<P: ReadFromBytes>(&mut self) -> io::Result<P>;
}

/// Protocol types that may be written to little endian bytes.
pub trait WriteToBytes {
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()>;
}

/// Protocol types that may be read from little endian bytes.
pub trait ReadFromBytes: Sized {
    fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self>;
}

/// Types that have a constant size when written to or read from bytes.
pub trait SizeBytes {
    const SIZE_BYTES: usize;
}

/// Raw wire form of the status block the DAC attaches to every reply.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DacStatus {
    pub protocol: u8,
    pub light_engine_state: u8,
    pub playback_state: u8,
    pub source: u8,
    pub light_engine_flags: u16,
    pub playback_flags: u16,
    pub source_flags: u16,
    pub buffer_fullness: u16,
    pub point_rate: u32,
    pub point_count: u32,
}

/// One point in the DAC's native 16-bit representation.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DacPoint {
    pub control: u16,
    pub x: i16,
    pub y: i16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub i: u16,
    pub u1: u16,
    pub u2: u16,
}

/// Raw wire form of a reply from the DAC.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DacResponse {
    pub response: u8,
    pub command: u8,
    pub dac_status: DacStatus,
}

impl DacStatus {
    pub const LIGHT_ENGINE_READY: u8 = 0;
    pub const LIGHT_ENGINE_WARMUP: u8 = 1;
    pub const LIGHT_ENGINE_COOLDOWN: u8 = 2;
    pub const LIGHT_ENGINE_EMERGENCY_STOP: u8 = 3;

    pub const PLAYBACK_IDLE: u8 = 0;
    pub const PLAYBACK_PREPARED: u8 = 1;
    pub const PLAYBACK_PLAYING: u8 = 2;
    pub const PLAYBACK_PAUSED: u8 = 3;
}

impl DacResponse {
    /// The command was accepted.
    pub const ACK: u8 = 0x61;
    /// The write command could not be performed because there was not
    /// enough buffer space when it was received.
    pub const NAK_FULL: u8 = 0x46;
    /// The command contained an invalid `command` byte or parameters.
    pub const NAK_INVALID: u8 = 0x49;
    /// An emergency-stop condition still exists.
    pub const NAK_STOP_CONDITION: u8 = 0x21;
}

// Scale factors for converting normalized floats into wire words.
const COORD_SCALE: f32 = 32767.0;
const CHANNEL_SCALE: f32 = 65535.0;

/// Convert a normalized coordinate into the DAC's signed 16-bit range.
/// Input is clamped to [-1, 1], scaled, rounded half away from zero and
/// saturated into i16.
pub fn encode_coordinate(value: f32) -> i16 {
    let scaled = value.clamp(-1.0, 1.0) * COORD_SCALE;
    let rounded = if scaled >= 0.0 {
        scaled + 0.5
    } else {
        scaled - 0.5
    };
    (rounded as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Convert a normalized colour/intensity channel into the DAC's unsigned
/// 16-bit range. Input is clamped to [0, 1], scaled, rounded half up and
/// saturated into u16.
pub fn encode_channel(value: f32) -> u16 {
    let scaled = value.clamp(0.0, 1.0) * CHANNEL_SCALE;
    ((scaled + 0.5) as i32).clamp(0, u16::MAX as i32) as u16
}

impl DacPoint {
    /// Control-word bit that applies a queued rate change at this point.
    pub const RATE_CHANGE_BIT: u16 = 0x8000;

    /// Convert a normalized point to the DAC's wire representation.
    ///
    /// `rate_change` sets the control bit that makes a previously queued
    /// point-rate change take effect at this point; it belongs on the
    /// first point of a batch only.
    pub fn from_laser(point: &LaserPoint, rate_change: bool) -> Self {
        DacPoint {
            control: if rate_change { Self::RATE_CHANGE_BIT } else { 0 },
            x: encode_coordinate(point.x),
            y: encode_coordinate(point.y),
            r: encode_channel(point.r),
            g: encode_channel(point.g),
            b: encode_channel(point.b),
            i: encode_channel(point.i),
            u1: encode_channel(point.u1),
            u2: encode_channel(point.u2),
        }
    }
}

impl WriteToBytes for DacStatus {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.protocol)?;
        writer.write_u8(self.light_engine_state)?;
        writer.write_u8(self.playback_state)?;
        writer.write_u8(self.source)?;
        writer.write_u16::<LE>(self.light_engine_flags)?;
        writer.write_u16::<LE>(self.playback_flags)?;
        writer.write_u16::<LE>(self.source_flags)?;
        writer.write_u16::<LE>(self.buffer_fullness)?;
        writer.write_u32::<LE>(self.point_rate)?;
        writer.write_u32::<LE>(self.point_count)?;
        Ok(())
    }
}

impl WriteToBytes for DacPoint {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u16::<LE>(self.control)?;
        writer.write_i16::<LE>(self.x)?;
        writer.write_i16::<LE>(self.y)?;
        writer.write_u16::<LE>(self.r)?;
        writer.write_u16::<LE>(self.g)?;
        writer.write_u16::<LE>(self.b)?;
        writer.write_u16::<LE>(self.i)?;
        writer.write_u16::<LE>(self.u1)?;
        writer.write_u16::<LE>(self.u2)?;
        Ok(())
    }
}

impl WriteToBytes for DacResponse {
    fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.response)?;
        writer.write_u8(self.command)?;
        writer.write_bytes(self.dac_status)?;
        Ok(())
    }
}

impl ReadFromBytes for DacStatus {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(DacStatus {
            protocol: reader.read_u8()?,
            light_engine_state: reader.read_u8()?,
            playback_state: reader.read_u8()?,
            source: reader.read_u8()?,
            light_engine_flags: reader.read_u16::<LE>()?,
            playback_flags: reader.read_u16::<LE>()?,
            source_flags: reader.read_u16::<LE>()?,
            buffer_fullness: reader.read_u16::<LE>()?,
            point_rate: reader.read_u32::<LE>()?,
            point_count: reader.read_u32::<LE>()?,
        })
    }
}

impl ReadFromBytes for DacPoint {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(DacPoint {
            control: reader.read_u16::<LE>()?,
            x: reader.read_i16::<LE>()?,
            y: reader.read_i16::<LE>()?,
            r: reader.read_u16::<LE>()?,
            g: reader.read_u16::<LE>()?,
            b: reader.read_u16::<LE>()?,
            i: reader.read_u16::<LE>()?,
            u1: reader.read_u16::<LE>()?,
            u2: reader.read_u16::<LE>()?,
        })
    }
}

impl ReadFromBytes for DacResponse {
    fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
        Ok(DacResponse {
            response: reader.read_u8()?,
            command: reader.read_u8()?,
            dac_status: reader.read_bytes::<DacStatus>()?,
        })
    }
}

impl SizeBytes for DacStatus {
    const SIZE_BYTES: usize = 20;
}

impl SizeBytes for DacPoint {
    const SIZE_BYTES: usize = 18;
}

impl SizeBytes for DacResponse {
    const SIZE_BYTES: usize = DacStatus::SIZE_BYTES + 2;
}

impl<P> WriteToBytes for &P
where
    P: WriteToBytes,
{
    fn write_to_bytes<W: WriteBytesExt>(&self, writer: W) -> io::Result<()> {
        (*self).write_to_bytes(writer)
    }
}

impl<W> WriteBytes for W
where
    W: WriteBytesExt,
{
    fn write_bytes<P: WriteToBytes>(&mut self, protocol: P) -> io::Result<()> {
        protocol.write_to_bytes(self)
    }
}

impl<R> ReadBytes for R
where
    R: ReadBytesExt,
{
    fn read_bytes<P: ReadFromBytes>(&mut self) -> io::Result<P> {
        P::read_from_bytes(self)
    }
}

// =============================================================================
// Typed status layer
// =============================================================================

/// State of the light engine.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LightEngine {
    Ready,
    Warmup,
    Cooldown,
    EmergencyStop,
}

/// Playback state of the point FIFO.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Playback {
    Idle,
    Prepared,
    Playing,
    Paused,
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
    pub struct LightEngineFlags: u16 {
        const EMERGENCY_STOP_PACKET_OR_INVALID_COMMAND = 0b00000001;
        const EMERGENCY_STOP_PROJECTOR_INPUT = 0b00000010;
        const EMERGENCY_STOP_PROJECTOR_INPUT_ACTIVE = 0b00000100;
        const EMERGENCY_STOP_OVER_TEMPERATURE = 0b00001000;
        const EMERGENCY_STOP_OVER_TEMPERATURE_ACTIVE = 0b00010000;
        const EMERGENCY_STOP_LOST_ETHERNET_LINK = 0b00100000;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
    pub struct PlaybackFlags: u16 {
        const SHUTTER_OPEN = 0b00000001;
        const UNDERFLOWED = 0b00000010;
        const EMERGENCY_STOP = 0b00000100;
    }
}

/// Decoded device status.
///
/// State bytes are validated into enums; flag words are truncated to their
/// known bits. Everything else passes through as reported.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct DeviceStatus {
    pub protocol: u8,
    pub light_engine: LightEngine,
    pub playback: Playback,
    pub source: u8,
    pub light_engine_flags: LightEngineFlags,
    pub playback_flags: PlaybackFlags,
    pub source_flags: u16,
    pub buffer_fullness: u16,
    pub point_rate: u32,
    pub point_count: u32,
}

/// A decoded acknowledgement frame.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Ack {
    /// Response code; [`DacResponse::ACK`] means accepted.
    pub response: u8,
    /// The command byte this reply acknowledges.
    pub command: u8,
    /// Status snapshot carried by the reply.
    pub status: DeviceStatus,
}

impl LightEngine {
    pub fn from_protocol(state: u8) -> Option<Self> {
        Some(match state {
            DacStatus::LIGHT_ENGINE_READY => LightEngine::Ready,
            DacStatus::LIGHT_ENGINE_WARMUP => LightEngine::Warmup,
            DacStatus::LIGHT_ENGINE_COOLDOWN => LightEngine::Cooldown,
            DacStatus::LIGHT_ENGINE_EMERGENCY_STOP => LightEngine::EmergencyStop,
            _ => return None,
        })
    }

    pub fn to_protocol(self) -> u8 {
        match self {
            LightEngine::Ready => DacStatus::LIGHT_ENGINE_READY,
            LightEngine::Warmup => DacStatus::LIGHT_ENGINE_WARMUP,
            LightEngine::Cooldown => DacStatus::LIGHT_ENGINE_COOLDOWN,
            LightEngine::EmergencyStop => DacStatus::LIGHT_ENGINE_EMERGENCY_STOP,
        }
    }
}

impl Playback {
    pub fn from_protocol(state: u8) -> Option<Self> {
        Some(match state {
            DacStatus::PLAYBACK_IDLE => Playback::Idle,
            DacStatus::PLAYBACK_PREPARED => Playback::Prepared,
            DacStatus::PLAYBACK_PLAYING => Playback::Playing,
            DacStatus::PLAYBACK_PAUSED => Playback::Paused,
            _ => return None,
        })
    }

    pub fn to_protocol(self) -> u8 {
        match self {
            Playback::Idle => DacStatus::PLAYBACK_IDLE,
            Playback::Prepared => DacStatus::PLAYBACK_PREPARED,
            Playback::Playing => DacStatus::PLAYBACK_PLAYING,
            Playback::Paused => DacStatus::PLAYBACK_PAUSED,
        }
    }
}

impl DeviceStatus {
    /// Validate a raw status block into its typed form.
    pub fn from_raw(raw: &DacStatus) -> Result<Self> {
        let light_engine = LightEngine::from_protocol(raw.light_engine_state)
            .ok_or_else(|| Error::protocol("unknown light engine state"))?;
        let playback = Playback::from_protocol(raw.playback_state)
            .ok_or_else(|| Error::protocol("unknown playback state"))?;
        Ok(DeviceStatus {
            protocol: raw.protocol,
            light_engine,
            playback,
            source: raw.source,
            light_engine_flags: LightEngineFlags::from_bits_truncate(raw.light_engine_flags),
            playback_flags: PlaybackFlags::from_bits_truncate(raw.playback_flags),
            source_flags: raw.source_flags,
            buffer_fullness: raw.buffer_fullness,
            point_rate: raw.point_rate,
            point_count: raw.point_count,
        })
    }

    /// The raw wire form of this status.
    pub fn to_raw(&self) -> DacStatus {
        DacStatus {
            protocol: self.protocol,
            light_engine_state: self.light_engine.to_protocol(),
            playback_state: self.playback.to_protocol(),
            source: self.source,
            light_engine_flags: self.light_engine_flags.bits(),
            playback_flags: self.playback_flags.bits(),
            source_flags: self.source_flags,
            buffer_fullness: self.buffer_fullness,
            point_rate: self.point_rate,
            point_count: self.point_count,
        }
    }
}

impl Ack {
    /// Decode one acknowledgement frame from exactly
    /// [`config::ACK_FRAME_SIZE`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != config::ACK_FRAME_SIZE {
            return Err(Error::protocol(format!(
                "ack frame must be {} bytes, got {}",
                config::ACK_FRAME_SIZE,
                bytes.len()
            )));
        }
        let raw = (&bytes[..])
            .read_bytes::<DacResponse>()
            .map_err(|e| Error::protocol(format!("malformed ack frame: {e}")))?;
        let status = DeviceStatus::from_raw(&raw.dac_status)?;
        Ok(Ack {
            response: raw.response,
            command: raw.command,
            status,
        })
    }

    /// Whether the DAC accepted the command this reply echoes.
    pub fn accepted(&self) -> bool {
        self.response == DacResponse::ACK
    }
}

/// Commands that can be sent to the DAC.
pub mod command {
    use super::{DacPoint, ReadBytes, ReadFromBytes, SizeBytes, WriteBytes, WriteToBytes};
    use byteorder::{ReadBytesExt, WriteBytesExt, LE};
    use std::borrow::Cow;
    use std::io;

    /// Types that may be submitted as commands to the DAC.
    pub trait Command {
        const START_BYTE: u8;
        fn start_byte(&self) -> u8 {
            Self::START_BYTE
        }
    }

    /// `'?'` — no-op; the DAC replies with its current status.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Ping;

    /// `'p'` — move an idle playback system into the prepared state.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct PrepareStream;

    /// `'b'` — start playback at the given rate.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Begin {
        /// Unused by current firmware; written as zero.
        pub low_water_mark: u16,
        pub point_rate: u32,
    }

    /// `'q'` — queue a point-rate change, applied at the next point whose
    /// control word carries the rate-change bit.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct QueueRateChange(pub u32);

    /// `'d'` — append points to the playback FIFO.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Data<'a> {
        pub points: Cow<'a, [DacPoint]>,
    }

    /// `'s'` — stop playback.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Stop;

    /// `'c'` — clear an e-stop or underflow condition back to idle.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Clear;

    impl Begin {
        pub fn read_fields<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            Ok(Begin {
                low_water_mark: reader.read_u16::<LE>()?,
                point_rate: reader.read_u32::<LE>()?,
            })
        }
    }

    impl QueueRateChange {
        pub fn read_fields<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            Ok(QueueRateChange(reader.read_u32::<LE>()?))
        }
    }

    impl<'a> Data<'a> {
        pub fn read_n_points<R: ReadBytesExt>(mut reader: R) -> io::Result<u16> {
            reader.read_u16::<LE>()
        }

        pub fn read_points<R: ReadBytesExt>(
            mut reader: R,
            mut n_points: u16,
            points: &mut Vec<DacPoint>,
        ) -> io::Result<()> {
            while n_points > 0 {
                let dac_point = reader.read_bytes::<DacPoint>()?;
                points.push(dac_point);
                n_points -= 1;
            }
            Ok(())
        }
    }

    impl Data<'static> {
        pub fn read_fields<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            let n_points = Self::read_n_points(&mut reader)?;
            let mut data = Vec::with_capacity(n_points as _);
            Self::read_points(reader, n_points, &mut data)?;
            Ok(Data {
                points: Cow::Owned(data),
            })
        }
    }

    impl<C> Command for &C
    where
        C: Command,
    {
        const START_BYTE: u8 = C::START_BYTE;
    }

    impl Command for Ping {
        const START_BYTE: u8 = b'?';
    }
    impl Command for PrepareStream {
        const START_BYTE: u8 = b'p';
    }
    impl Command for Begin {
        const START_BYTE: u8 = b'b';
    }
    impl Command for QueueRateChange {
        const START_BYTE: u8 = b'q';
    }
    impl<'a> Command for Data<'a> {
        const START_BYTE: u8 = b'd';
    }
    impl Command for Stop {
        const START_BYTE: u8 = b's';
    }
    impl Command for Clear {
        const START_BYTE: u8 = b'c';
    }

    impl SizeBytes for Ping {
        const SIZE_BYTES: usize = 1;
    }
    impl SizeBytes for PrepareStream {
        const SIZE_BYTES: usize = 1;
    }
    impl SizeBytes for Begin {
        const SIZE_BYTES: usize = 7;
    }
    impl SizeBytes for QueueRateChange {
        const SIZE_BYTES: usize = 5;
    }
    impl SizeBytes for Stop {
        const SIZE_BYTES: usize = 1;
    }
    impl SizeBytes for Clear {
        const SIZE_BYTES: usize = 1;
    }

    impl WriteToBytes for Ping {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)
        }
    }

    impl WriteToBytes for PrepareStream {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)
        }
    }

    impl WriteToBytes for Begin {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)?;
            writer.write_u16::<LE>(self.low_water_mark)?;
            writer.write_u32::<LE>(self.point_rate)?;
            Ok(())
        }
    }

    impl WriteToBytes for QueueRateChange {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)?;
            writer.write_u32::<LE>(self.0)?;
            Ok(())
        }
    }

    impl<'a> WriteToBytes for Data<'a> {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            if self.points.len() > u16::MAX as usize {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "too many points",
                ));
            }
            writer.write_u8(Self::START_BYTE)?;
            writer.write_u16::<LE>(self.points.len() as u16)?;
            for point in self.points.iter() {
                writer.write_bytes(point)?;
            }
            Ok(())
        }
    }

    impl WriteToBytes for Stop {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)
        }
    }

    impl WriteToBytes for Clear {
        fn write_to_bytes<W: WriteBytesExt>(&self, mut writer: W) -> io::Result<()> {
            writer.write_u8(Self::START_BYTE)
        }
    }

    fn expect_start_byte<R: ReadBytesExt>(mut reader: R, start_byte: u8) -> io::Result<()> {
        if reader.read_u8()? != start_byte {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid command",
            ));
        }
        Ok(())
    }

    impl ReadFromBytes for Ping {
        fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self> {
            expect_start_byte(reader, Self::START_BYTE)?;
            Ok(Ping)
        }
    }

    impl ReadFromBytes for PrepareStream {
        fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self> {
            expect_start_byte(reader, Self::START_BYTE)?;
            Ok(PrepareStream)
        }
    }

    impl ReadFromBytes for Begin {
        fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            expect_start_byte(&mut reader, Self::START_BYTE)?;
            Self::read_fields(reader)
        }
    }

    impl ReadFromBytes for QueueRateChange {
        fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            expect_start_byte(&mut reader, Self::START_BYTE)?;
            Self::read_fields(reader)
        }
    }

    impl ReadFromBytes for Data<'static> {
        fn read_from_bytes<R: ReadBytesExt>(mut reader: R) -> io::Result<Self> {
            expect_start_byte(&mut reader, Self::START_BYTE)?;
            Self::read_fields(reader)
        }
    }

    impl ReadFromBytes for Stop {
        fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self> {
            expect_start_byte(reader, Self::START_BYTE)?;
            Ok(Stop)
        }
    }

    impl ReadFromBytes for Clear {
        fn read_from_bytes<R: ReadBytesExt>(reader: R) -> io::Result<Self> {
            expect_start_byte(reader, Self::START_BYTE)?;
            Ok(Clear)
        }
    }
}
