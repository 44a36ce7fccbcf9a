// Shared timing and geometry constants of the DMG model.
//
// The master clock runs at 4.194304 MHz. One scanline takes 456 clocks, a
// whole frame is 154 lines = 70224 clocks, which gives the ~59.73 Hz frame
// rate of the original hardware.
pub const CLOCK_FREQ: u32 = 4_194_304;
pub const LINE_CYCLES: u32 = 456;
pub const FRAME_CYCLES: u32 = 70224;
pub const SERIAL_CYCLES: u32 = 4096;

pub const SCREEN_W: usize = 160;
pub const SCREEN_H: usize = 144;
