use nom::bytes::complete::{tag, take};
use nom::combinator::{all_consuming, consumed, map_res, verify};
use nom::number::complete::u8;
use nom::sequence::tuple;
use nom::IResult;

use crate::checksum::{control_sum, device_xor};
use crate::codec::{ControlFrame, DeviceFrame, CONTROL_END, DEVICE_END, DEVICE_START};
use crate::types::{CommandKey, Direction};

type Buf = [u8];

const CONTROL_END_TAG: &Buf = &CONTROL_END;
const DEVICE_START_TAG: &Buf = &DEVICE_START;
const DEVICE_END_TAG: &Buf = &[DEVICE_END];

/// Decode a complete control frame. Trailing bytes are rejected.
pub(crate) fn control_frame(buf: &Buf) -> Option<ControlFrame<'_>> {
    all_consuming(control)(buf).ok().map(|(_, frame)| frame)
}

/// Decode a complete device frame. Trailing bytes are rejected.
pub(crate) fn device_frame(buf: &Buf) -> Option<DeviceFrame<'_>> {
    all_consuming(device)(buf).ok().map(|(_, frame)| frame)
}

fn control(buf: &Buf) -> IResult<&Buf, ControlFrame<'_>> {
    let (buf, (summed, frame)) = consumed(control_header_payload)(buf)?;
    let (buf, _) = verify(u8, |cs: &u8| control_sum(summed) == *cs)(buf)?;
    let (buf, _) = tag(CONTROL_END_TAG)(buf)?;
    Ok((buf, frame))
}

fn control_header_payload(buf: &Buf) -> IResult<&Buf, ControlFrame<'_>> {
    let (buf, (direction, length, kb0, kb1)) = tuple((
        map_res(u8, Direction::from_start_byte),
        // LEN covers RESERVED, CMD, payload and checksum
        verify(u8, |len: &u8| *len >= 3),
        u8,
        u8,
    ))(buf)?;
    let (buf, payload) = take(usize::from(length) - 3)(buf)?;
    Ok((
        buf,
        ControlFrame {
            direction,
            length,
            key: CommandKey::new(kb0, kb1),
            payload,
        },
    ))
}

fn device(buf: &Buf) -> IResult<&Buf, DeviceFrame<'_>> {
    let (buf, _) = tag(DEVICE_START_TAG)(buf)?;
    let (buf, (xored, frame)) = consumed(device_length_body)(buf)?;
    let (buf, _) = verify(u8, |cs: &u8| device_xor(xored) == *cs)(buf)?;
    let (buf, _) = tag(DEVICE_END_TAG)(buf)?;
    Ok((buf, frame))
}

fn device_length_body(buf: &Buf) -> IResult<&Buf, DeviceFrame<'_>> {
    let (buf, length) = u8(buf)?;
    let (buf, body) = take(usize::from(length))(buf)?;
    Ok((buf, DeviceFrame { length, body }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::key;

    #[test]
    fn test_control_frame() {
        let frame = control_frame(&[0xAA, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA]).unwrap();
        assert_eq!(frame.direction, Direction::Request);
        assert_eq!(frame.length, 5);
        assert_eq!(frame.key, key(0x00, 0x16));
        assert_eq!(frame.payload, &[0x01, 0x00]);

        let frame = control_frame(&[0x55, 0x05, 0x00, 0x16, 0x33, 0x01, 0xA4, 0xEB, 0xAA]).unwrap();
        assert_eq!(frame.direction, Direction::Response);
    }

    #[test]
    fn test_control_frame_rejects() {
        // length field disagrees with the frame size
        assert!(control_frame(&[0xAA, 0x06, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA]).is_none());
        // length field too small to hold header and checksum
        assert!(control_frame(&[0xAA, 0x02, 0x00, 0x16, 0xC2, 0xEB, 0xAA]).is_none());
        // trailing garbage
        let trailing = [0xAA, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC6, 0xEB, 0xAA, 0x00];
        assert!(control_frame(&trailing).is_none());
        // bad start byte
        assert!(control_frame(&[0xAB, 0x05, 0x00, 0x16, 0x01, 0x00, 0xC7, 0xEB, 0xAA]).is_none());
        assert!(control_frame(&[]).is_none());
    }

    #[test]
    fn test_device_frame() {
        let frame = device_frame(&[
            0x55, 0xAA, 0x05, 0x00, 0x00, 0x00, 0x00, 0x09, 0x0C, 0xF0,
        ])
        .unwrap();
        assert_eq!(frame.length, 5);
        assert_eq!(frame.body, &[0x00, 0x00, 0x00, 0x00, 0x09]);
        assert_eq!(frame.status(), Some(0x00));
        assert_eq!(frame.response_payload(), &[0x00, 0x00, 0x00, 0x09]);
    }

    #[test]
    fn test_device_frame_rejects() {
        // wrong checksum
        assert!(device_frame(&[0x55, 0xAA, 0x01, 0x00, 0x02, 0xF0]).is_none());
        // missing end marker
        assert!(device_frame(&[0x55, 0xAA, 0x01, 0x00, 0x01, 0xF1]).is_none());
        // body shorter than announced
        assert!(device_frame(&[0x55, 0xAA, 0x03, 0x00, 0x03, 0xF0]).is_none());
    }
}
