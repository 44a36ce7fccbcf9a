// Communication between two Gameboys happens one byte at a time. One Gameboy
// acts as the master, uses its internal clock, and thus controls when the
// exchange happens. The other one uses an external clock (i.e., the one
// inside the other Gameboy) and has no control over when the transfer
// happens.
//
// The core models a single-byte exchange: the outgoing byte is offered to the
// link partner when bit 7 of SC goes high, and one transfer window
// (4096 clocks, 8 bits at 8192 Hz) later the incoming byte replaces SB.
use super::clock::Clock;
use super::convention::SERIAL_CYCLES;
use super::intf::{Flag, Intf};
use std::cell::RefCell;
use std::rc::Rc;

// A link cable partner. recv() returning None means nobody is connected.
pub trait SerialLink {
    fn send(&mut self, b: u8);

    fn recv(&mut self) -> Option<u8>;
}

pub struct Serial {
    intf: Rc<RefCell<Intf>>,
    link: Option<Box<dyn SerialLink>>,

    // Before a transfer, SB holds the next byte that will go out.
    sb: u8,
    // Bit 7 - Transfer Start Flag (1=Transfer in progress, or requested)
    // Bit 0 - Shift Clock (0=External Clock, 1=Internal Clock)
    sc: u8,

    clock: Clock,
    // The outgoing byte has been offered to the partner for the transfer in
    // flight.
    sent: bool,
}

impl Serial {
    pub fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self { intf, link: None, sb: 0x00, sc: 0x00, clock: Clock::power_up(SERIAL_CYCLES), sent: false }
    }

    pub fn set_link(&mut self, link: Box<dyn SerialLink>) {
        self.link = Some(link);
    }

    pub fn reset(&mut self) {
        self.sb = 0x00;
        self.sc = 0x00;
        self.clock.n = 0;
        self.sent = false;
    }

    pub fn get(&self, a: u16) -> u8 {
        match a {
            0xff01 => self.sb,
            0xff02 => self.sc | 0x7e,
            _ => panic!("Only supports addresses 0xff01, 0xff02"),
        }
    }

    pub fn set(&mut self, a: u16, v: u8) {
        match a {
            0xff01 => self.sb = v,
            0xff02 => {
                self.sc = v;
                if v & 0x80 != 0x00 {
                    self.clock.n = 0;
                    self.sent = false;
                }
            }
            _ => panic!("Only supports addresses 0xff01, 0xff02"),
        }
    }

    pub fn next(&mut self, cycles: u32) {
        if self.sc & 0x80 == 0x00 {
            return;
        }
        if !self.sent {
            self.sent = true;
            if let Some(link) = self.link.as_mut() {
                link.send(self.sb);
            }
        }
        if self.clock.next(cycles) == 0 {
            return;
        }
        match self.link.as_mut().and_then(|link| link.recv()) {
            Some(b) => self.sb = b,
            None => {
                if self.sc & 0x01 == 0x00 {
                    // External clock with no partner: keep waiting for one.
                    return;
                }
                self.sb = 0xff;
            }
        }
        self.sc &= 0x01;
        self.sent = false;
        self.intf.borrow_mut().hi(Flag::Serial);
    }

    // Clocks left until the transfer in flight completes, for the HALT
    // fast-forward.
    pub fn completion_horizon(&self) -> u32 {
        if self.sc & 0x80 == 0x00 {
            return u32::max_value();
        }
        SERIAL_CYCLES - self.clock.n
    }
}
