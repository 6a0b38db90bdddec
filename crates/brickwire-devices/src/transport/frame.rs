/*!
 * Serial framing of packets.
 *
 * Outbound frames are `[address, checksum, length, payload..]` with the
 * checksum being the wrapping sum of address, length and payload. Inbound
 * frames are `[checksum, length, payload..]` with the checksum covering
 * length and payload.
 */
use std::io;

use bytes::{BufMut, Bytes, BytesMut};

/// Bytes preceding the payload of an inbound frame
pub const RESPONSE_HEADER_LEN: usize = 2;

fn checksum<'a>(seed: u8, bytes: impl IntoIterator<Item = &'a u8>) -> u8 {
    bytes.into_iter().fold(seed, |sum, byte| sum.wrapping_add(*byte))
}

/// Frame a packet for the target at `address`
pub fn encode_frame(address: u8, packet: &[u8]) -> io::Result<Bytes> {
    let length = u8::try_from(packet.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("packet of {} bytes does not fit in a frame", packet.len()),
        )
    })?;

    let mut frame = BytesMut::with_capacity(packet.len() + 3);
    frame.put_u8(address);
    frame.put_u8(checksum(address.wrapping_add(length), packet));
    frame.put_u8(length);
    frame.put_slice(packet);
    Ok(frame.freeze())
}

/// Check an inbound frame and return its payload
pub fn decode_frame(frame: &[u8]) -> io::Result<Vec<u8>> {
    if frame.len() < RESPONSE_HEADER_LEN {
        return Err(invalid_data(format!(
            "frame of {} bytes is shorter than its header",
            frame.len()
        )));
    }

    let expected = frame[0];
    let length = usize::from(frame[1]);
    let payload = &frame[RESPONSE_HEADER_LEN..];
    if payload.len() < length {
        return Err(invalid_data(format!(
            "frame declares {} payload bytes but carries {}",
            length,
            payload.len()
        )));
    }

    let payload = &payload[..length];
    let actual = checksum(frame[1], payload);
    if actual != expected {
        return Err(invalid_data(format!(
            "checksum mismatch: expected {:#04x}, computed {:#04x}",
            expected, actual
        )));
    }

    Ok(payload.to_vec())
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}
