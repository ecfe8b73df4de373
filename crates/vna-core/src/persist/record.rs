//! Binary layout of a saved properties record
//!
//! All fields are little-endian. The record ends with a 32-bit checksum over
//! every preceding word; decoding verifies the magic and the checksum before
//! reading any other field.

use std::io::{Cursor, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use num_complex::Complex32;

use crate::calibration::{CalStatus, ErrorTerms, RawStandards};
use crate::constants::{CAL_TERMS, MARKER_COUNT, POINT_COUNT, PROPERTIES_MAGIC, TRACE_COUNT};
use crate::delay::ElectricalDelay;
use crate::error::PersistError;
use crate::frequency::{FrequencySet, SweepRange};
use crate::measurement::Channel;
use crate::time_domain::DomainMode;
use crate::trace::{Marker, TraceConfig, TraceKind};

const HEADER_LEN: usize = 16;
const FREQUENCIES_LEN: usize = POINT_COUNT * 4;
const CAL_ARRAY_LEN: usize = CAL_TERMS * POINT_COUNT * 8;
const TRACE_LEN: usize = 12;
const MARKER_LEN: usize = 8;

/// Encoded size of a record in bytes, checksum included
pub const RECORD_LEN: usize = HEADER_LEN
    + FREQUENCIES_LEN
    + 2 * CAL_ARRAY_LEN
    + 4
    + TRACE_COUNT * TRACE_LEN
    + MARKER_COUNT * MARKER_LEN
    + 4
    + 4
    + 4;

/// Rotate-left-1-and-add over little-endian 32-bit words.
///
/// A trailing partial word is ignored.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes.chunks_exact(4).fold(0u32, |acc, word| {
        acc.rotate_left(1).wrapping_add(LittleEndian::read_u32(word))
    })
}

/// Snapshot of the sweep, calibration and display settings stored in a slot
#[derive(Debug, Clone, PartialEq)]
pub struct SavedProperties {
    pub range: SweepRange,
    pub points: usize,
    pub status: CalStatus,
    pub frequencies: FrequencySet,
    pub terms: ErrorTerms,
    pub raw: RawStandards,
    pub electrical_delay: ElectricalDelay,
    pub traces: [TraceConfig; TRACE_COUNT],
    pub markers: [Marker; MARKER_COUNT],
    pub active_marker: usize,
    pub domain: DomainMode,
    /// Percent
    pub velocity_factor: u8,
}

impl SavedProperties {
    /// Serialise to the fixed-size record, checksum included
    pub fn encode(&self) -> Result<Vec<u8>, PersistError> {
        let mut buf = Vec::with_capacity(RECORD_LEN);
        let (frequency0, frequency1) = self.range.to_raw();

        buf.write_u32::<LittleEndian>(PROPERTIES_MAGIC)?;
        buf.write_i32::<LittleEndian>(frequency0)?;
        buf.write_i32::<LittleEndian>(frequency1)?;
        buf.write_i16::<LittleEndian>(self.points as i16)?;
        buf.write_u16::<LittleEndian>(self.status.bits())?;

        for &f in self.frequencies.table() {
            buf.write_u32::<LittleEndian>(f)?;
        }
        write_complex_array(&mut buf, self.terms.data())?;
        write_complex_array(&mut buf, self.raw.data())?;
        buf.write_f32::<LittleEndian>(self.electrical_delay.picoseconds())?;

        for trace in &self.traces {
            buf.write_u8(trace.enabled as u8)?;
            buf.write_u8(trace.kind as u8)?;
            buf.write_u8(trace.channel.index() as u8)?;
            buf.write_u8(trace.polar as u8)?;
            buf.write_f32::<LittleEndian>(trace.scale)?;
            buf.write_f32::<LittleEndian>(trace.refpos)?;
        }
        for marker in &self.markers {
            buf.write_i8(marker.enabled as i8)?;
            buf.write_u8(0)?;
            buf.write_i16::<LittleEndian>(marker.index as i16)?;
            buf.write_u32::<LittleEndian>(marker.frequency)?;
        }
        buf.write_i32::<LittleEndian>(self.active_marker as i32)?;
        buf.write_u8(self.domain.to_bits())?;
        buf.write_u8(self.velocity_factor)?;
        buf.write_u16::<LittleEndian>(0)?;

        let sum = checksum(&buf);
        buf.write_u32::<LittleEndian>(sum)?;
        debug_assert_eq!(buf.len(), RECORD_LEN);
        Ok(buf)
    }

    /// Parse and validate a record
    pub fn decode(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() != RECORD_LEN {
            return Err(PersistError::Length {
                expected: RECORD_LEN,
                got: bytes.len(),
            });
        }
        let magic = LittleEndian::read_u32(bytes);
        if magic != PROPERTIES_MAGIC {
            return Err(PersistError::BadMagic {
                expected: PROPERTIES_MAGIC,
                got: magic,
            });
        }
        let body = &bytes[..RECORD_LEN - 4];
        let stored = LittleEndian::read_u32(&bytes[RECORD_LEN - 4..]);
        let computed = checksum(body);
        if stored != computed {
            return Err(PersistError::ChecksumMismatch { stored, computed });
        }

        let mut rdr = Cursor::new(&body[4..]);
        let frequency0 = rdr.read_i32::<LittleEndian>()?;
        let frequency1 = rdr.read_i32::<LittleEndian>()?;
        let points = rdr.read_i16::<LittleEndian>()?;
        if points < 1 || points as usize > POINT_COUNT {
            return Err(PersistError::InvalidField {
                field: "sweep_points",
                value: points as i64,
            });
        }
        let points = points as usize;
        let status = CalStatus::from_bits(rdr.read_u16::<LittleEndian>()?);

        let mut table = [0u32; POINT_COUNT];
        rdr.read_u32_into::<LittleEndian>(&mut table)?;
        let terms = read_complex_array(&mut rdr)?;
        let raw = read_complex_array(&mut rdr)?;
        let electrical_delay = ElectricalDelay(rdr.read_f32::<LittleEndian>()?);

        let mut traces = [crate::trace::DEFAULT_TRACES[0]; TRACE_COUNT];
        for trace in traces.iter_mut() {
            let enabled = rdr.read_u8()? != 0;
            let kind = TraceKind::try_from(rdr.read_u8()?)?;
            let channel = match rdr.read_u8()? {
                0 => Channel::Reflection,
                1 => Channel::Transmission,
                other => {
                    return Err(PersistError::InvalidField {
                        field: "trace.channel",
                        value: other as i64,
                    })
                }
            };
            let polar = rdr.read_u8()? != 0;
            let scale = rdr.read_f32::<LittleEndian>()?;
            let refpos = rdr.read_f32::<LittleEndian>()?;
            *trace = TraceConfig {
                enabled,
                kind,
                channel,
                polar,
                scale,
                refpos,
            };
        }

        let mut markers = [Marker::default(); MARKER_COUNT];
        for marker in markers.iter_mut() {
            let enabled = rdr.read_i8()? != 0;
            let _pad = rdr.read_u8()?;
            let index = rdr.read_i16::<LittleEndian>()?;
            if index < 0 || index as usize >= POINT_COUNT {
                return Err(PersistError::InvalidField {
                    field: "marker.index",
                    value: index as i64,
                });
            }
            *marker = Marker {
                enabled,
                index: index as u16,
                frequency: rdr.read_u32::<LittleEndian>()?,
            };
        }

        let active_marker = rdr.read_i32::<LittleEndian>()?;
        if active_marker < 0 || active_marker as usize >= MARKER_COUNT {
            return Err(PersistError::InvalidField {
                field: "active_marker",
                value: active_marker as i64,
            });
        }
        let domain_bits = rdr.read_u8()?;
        let domain = DomainMode::from_bits(domain_bits).ok_or(PersistError::InvalidField {
            field: "domain_mode",
            value: domain_bits as i64,
        })?;
        let velocity_factor = rdr.read_u8()?;

        Ok(Self {
            range: SweepRange::from_raw(frequency0, frequency1),
            points,
            status,
            frequencies: FrequencySet::from_table(table, points),
            terms: ErrorTerms::from_array(terms).ok_or(PersistError::Length {
                expected: RECORD_LEN,
                got: bytes.len(),
            })?,
            raw: RawStandards::from_array(raw).ok_or(PersistError::Length {
                expected: RECORD_LEN,
                got: bytes.len(),
            })?,
            electrical_delay,
            traces,
            markers,
            active_marker: active_marker as usize,
            domain,
            velocity_factor,
        })
    }
}

fn write_complex_array<W: Write>(w: &mut W, data: &Array2<Complex32>) -> std::io::Result<()> {
    for v in data.iter() {
        w.write_f32::<LittleEndian>(v.re)?;
        w.write_f32::<LittleEndian>(v.im)?;
    }
    Ok(())
}

fn read_complex_array<R: Read>(r: &mut R) -> std::io::Result<Array2<Complex32>> {
    let mut flat = vec![0f32; CAL_TERMS * POINT_COUNT * 2];
    r.read_f32_into::<LittleEndian>(&mut flat)?;
    Ok(Array2::from_shape_fn((CAL_TERMS, POINT_COUNT), |(t, i)| {
        let k = (t * POINT_COUNT + i) * 2;
        Complex32::new(flat[k], flat[k + 1])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{default_markers, DEFAULT_TRACES};

    fn sample() -> SavedProperties {
        let frequencies = FrequencySet::generate(1_000_000, 101_000_000, 51).unwrap();
        let mut terms = ErrorTerms::default();
        terms.data_mut()[[1, 3]] = Complex32::new(0.25, -0.5);
        SavedProperties {
            range: SweepRange::CenterSpan {
                center: 51_000_000,
                span: 100_000_000,
            },
            points: 51,
            status: CalStatus::LOAD | CalStatus::ES | CalStatus::APPLY,
            markers: default_markers(&frequencies),
            frequencies,
            terms,
            raw: RawStandards::default(),
            electrical_delay: ElectricalDelay(12.5),
            traces: DEFAULT_TRACES,
            active_marker: 0,
            domain: DomainMode::default(),
            velocity_factor: 70,
        }
    }

    #[test]
    fn test_record_length() {
        let bytes = sample().encode().unwrap();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(RECORD_LEN % 4, 0);
    }

    #[test]
    fn test_decode_restores_all_fields() {
        let props = sample();
        let decoded = SavedProperties::decode(&props.encode().unwrap()).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_checksum_detects_flip() {
        let mut bytes = sample().encode().unwrap();
        bytes[100] ^= 0x01;
        assert!(matches!(
            SavedProperties::decode(&bytes),
            Err(PersistError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic_and_length() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = 0;
        assert!(matches!(
            SavedProperties::decode(&bytes),
            Err(PersistError::BadMagic { .. })
        ));
        assert!(matches!(
            SavedProperties::decode(&bytes[..64]),
            Err(PersistError::Length { .. })
        ));
    }

    #[test]
    fn test_invalid_field_rejected_after_checksum() {
        let mut bytes = sample().encode().unwrap();
        // sweep_points lives at offset 12
        LittleEndian::write_i16(&mut bytes[12..14], 0);
        let sum = checksum(&bytes[..RECORD_LEN - 4]);
        LittleEndian::write_u32(&mut bytes[RECORD_LEN - 4..], sum);
        assert!(matches!(
            SavedProperties::decode(&bytes),
            Err(PersistError::InvalidField {
                field: "sweep_points",
                value: 0
            })
        ));
    }

    #[test]
    fn test_checksum_rotates() {
        let words = [1u8, 0, 0, 0, 1, 0, 0, 0];
        // ((0 rotl 1) + 1) rotl 1 + 1 = 3
        assert_eq!(checksum(&words), 3);
    }
}
