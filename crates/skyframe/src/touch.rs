//! AXS15231B integrated touch controller.
//!
//! The controller sits on I2C at `0x3B`. Each poll writes an 11-byte read
//! command and reads back `6 * MAX_TOUCH_POINTS + 2` bytes. Only the first
//! point is used.

use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::canvas::{PANEL_HEIGHT, PANEL_WIDTH};
use crate::error::TouchError;

pub const TOUCH_ADDR: u8 = 0x3B;
pub const MAX_TOUCH_POINTS: usize = 2;
pub const RESPONSE_LEN: usize = 6 * MAX_TOUCH_POINTS + 2;

const CMD_MAGIC: [u8; 4] = [0xb5, 0xab, 0xa5, 0x5a];
const STATS_EVERY_POLLS: u32 = 50;

/// Read command: magic, two zero bytes, big-endian response length, three zero bytes.
pub const TOUCH_READ_CMD: [u8; 11] = read_command(RESPONSE_LEN as u16);

pub const fn read_command(len: u16) -> [u8; 11] {
    [
        CMD_MAGIC[0],
        CMD_MAGIC[1],
        CMD_MAGIC[2],
        CMD_MAGIC[3],
        0x00,
        0x00,
        (len >> 8) as u8,
        (len & 0xFF) as u8,
        0x00,
        0x00,
        0x00,
    ]
}

/// One poll's worth of touch state, in landscape screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchEvent {
    pub x: i16,
    pub y: i16,
    pub present: bool,
}

impl TouchEvent {
    pub const NONE: TouchEvent = TouchEvent { x: 0, y: 0, present: false };

    pub fn at(x: i16, y: i16) -> Self {
        Self { x, y, present: true }
    }
}

/// Anything that yields one touch reading per loop iteration.
pub trait TouchSource {
    fn read(&mut self) -> TouchEvent;
}

/// Decode a response frame into a raw panel point `(x, y)` in native portrait
/// coordinates. `Ok(None)` means no finger on the glass.
pub fn decode_frame(data: &[u8]) -> Result<Option<(u16, u16)>, TouchError> {
    if data.len() < 6 {
        return Err(TouchError::ShortFrame(data.len()));
    }

    // The controller reports 0xBC in every byte when idle.
    let num_points = data[1] as usize;
    if num_points == 0 || num_points > MAX_TOUCH_POINTS {
        return Ok(None);
    }

    let raw_x = (((data[2] & 0x0F) as u16) << 8) | data[3] as u16;
    let raw_y = (((data[4] & 0x0F) as u16) << 8) | data[5] as u16;
    if raw_x >= PANEL_WIDTH as u16 || raw_y >= PANEL_HEIGHT as u16 {
        return Err(TouchError::OutOfRange { x: raw_x, y: raw_y });
    }
    Ok(Some((raw_x, raw_y)))
}

/// Rotate a native portrait point (320x480) into landscape (480x320),
/// matching the canvas' landscape mapping.
pub fn to_landscape(raw_x: u16, raw_y: u16) -> (i16, i16) {
    let lx = raw_y as i16;
    let ly = (PANEL_WIDTH as i16 - 1) - raw_x as i16;
    (lx, ly)
}

pub struct Axs15231b<I2C> {
    i2c: I2C,
    poll_count: u32,
    err_count: u32,
    touch_count: u32,
    verbose: bool,
}

impl<I2C: I2c> Axs15231b<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            poll_count: 0,
            err_count: 0,
            touch_count: 0,
            verbose: false,
        }
    }

    /// Promote periodic stats and raw frame dumps to `info!`.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn error_count(&self) -> u32 {
        self.err_count
    }

    /// Read one frame and decode it. Errors are returned, not swallowed.
    pub fn read_point(&mut self) -> Result<Option<(i16, i16)>, TouchError> {
        let mut data = [0u8; RESPONSE_LEN];
        self.i2c
            .write_read(TOUCH_ADDR, &TOUCH_READ_CMD, &mut data)
            .map_err(|_| TouchError::Bus)?;

        if self.verbose && self.poll_count % STATS_EVERY_POLLS == 1 {
            info!("TOUCH raw: {:02X?}", &data[..8]);
        }

        Ok(decode_frame(&data)?.map(|(x, y)| to_landscape(x, y)))
    }

    /// Check the controller answers a read command.
    pub fn probe(&mut self) -> bool {
        match self.read_point() {
            Ok(_) => {
                info!("Touch controller at 0x{:02X} OK", TOUCH_ADDR);
                true
            }
            Err(e) => {
                log::warn!("Touch controller at 0x{:02X} not responding: {}", TOUCH_ADDR, e);
                false
            }
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> TouchSource for Axs15231b<I2C> {
    /// A failed poll counts as "no touch this cycle".
    fn read(&mut self) -> TouchEvent {
        self.poll_count = self.poll_count.wrapping_add(1);
        if self.poll_count % STATS_EVERY_POLLS == 0 {
            let msg = format!(
                "TOUCH stats: polls={} errs={} touches={}",
                self.poll_count, self.err_count, self.touch_count
            );
            if self.verbose {
                info!("{}", msg);
            } else {
                debug!("{}", msg);
            }
        }

        match self.read_point() {
            Ok(Some((x, y))) => {
                self.touch_count = self.touch_count.wrapping_add(1);
                TouchEvent::at(x, y)
            }
            Ok(None) => TouchEvent::NONE,
            Err(e) => {
                self.err_count = self.err_count.wrapping_add(1);
                debug!("TOUCH poll failed: {}", e);
                TouchEvent::NONE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[test]
    fn command_frame_matches_controller_protocol() {
        assert_eq!(
            TOUCH_READ_CMD,
            [0xb5, 0xab, 0xa5, 0x5a, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00]
        );
        assert_eq!(read_command(0x0102)[6..8], [0x01, 0x02]);
    }

    #[test]
    fn idle_frame_is_no_touch() {
        assert_eq!(decode_frame(&[0xBC; RESPONSE_LEN]), Ok(None));
        let mut zero = [0u8; RESPONSE_LEN];
        zero[1] = 0;
        assert_eq!(decode_frame(&zero), Ok(None));
    }

    #[test]
    fn high_nibble_is_masked() {
        let frame = [0x00, 0x01, 0xF1, 0x23, 0x70, 0x45, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_frame(&frame), Ok(Some((0x123, 0x045))));
    }

    #[test]
    fn out_of_panel_point_is_rejected() {
        // x = 0x140 = 320 is one past the last column.
        let frame = [0x00, 0x01, 0x01, 0x40, 0x00, 0x10, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_frame(&frame),
            Err(TouchError::OutOfRange { x: 320, y: 16 })
        );
    }

    #[test]
    fn short_frame_is_an_error() {
        assert_eq!(decode_frame(&[0, 1, 2]), Err(TouchError::ShortFrame(3)));
    }

    #[test]
    fn landscape_mapping_swaps_and_mirrors() {
        assert_eq!(to_landscape(0, 0), (0, 319));
        assert_eq!(to_landscape(319, 479), (479, 0));
    }

    struct ScriptedBus {
        frames: Vec<Result<[u8; RESPONSE_LEN], ()>>,
        last_write: Vec<u8>,
    }

    impl ErrorType for ScriptedBus {
        type Error = ErrorKind;
    }

    impl I2c for ScriptedBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, TOUCH_ADDR);
            let next = if self.frames.is_empty() {
                Ok([0xBC; RESPONSE_LEN])
            } else {
                self.frames.remove(0)
            };
            let frame = next.map_err(|_| ErrorKind::Other)?;
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.last_write = bytes.to_vec(),
                    Operation::Read(buf) => buf.copy_from_slice(&frame[..buf.len()]),
                }
            }
            Ok(())
        }
    }

    #[test]
    fn driver_maps_points_and_swallows_bus_errors() {
        let mut touched = [0u8; RESPONSE_LEN];
        touched[1] = 1;
        touched[3] = 10; // x
        touched[5] = 200; // y
        let bus = ScriptedBus {
            frames: vec![Ok(touched), Err(()), Ok([0xBC; RESPONSE_LEN])],
            last_write: Vec::new(),
        };
        let mut touch = Axs15231b::new(bus);

        assert_eq!(touch.read(), TouchEvent::at(200, 309));
        assert_eq!(touch.read(), TouchEvent::NONE);
        assert_eq!(touch.error_count(), 1);
        assert_eq!(touch.read(), TouchEvent::NONE);

        let bus = touch.release();
        assert_eq!(bus.last_write, TOUCH_READ_CMD.to_vec());
    }
}
