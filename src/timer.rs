// The timer in the GameBoy has a selectable frequency of 4096, 16384, 65536,
// or 262144 Hertz. This frequency increments the Timer Counter (TIMA). When
// it overflows, it generates an interrupt and is then loaded with the
// contents of Timer Modulo (TMA).
use super::clock::Clock;
use super::intf::{Flag, Intf};
use std::cell::RefCell;
use std::rc::Rc;

// TIMA period in clocks for each TAC clock-select value.
const TAC_CYCLES: [u32; 4] = [1024, 16, 64, 256];

pub struct Timer {
    intf: Rc<RefCell<Intf>>,

    // This register is incremented at a rate of 16384Hz. Writing any value to
    // it resets it to 00h.
    div: u8,
    // Incremented by the frequency specified in TAC. When the value overflows
    // it is reset to the value specified in TMA and an interrupt is
    // requested.
    tima: u8,
    tma: u8,
    //  Bit  2   - Timer Enable
    //  Bits 1-0 - Input Clock Select
    tac: u8,

    div_clock: Clock,
    tima_clock: Clock,
}

impl Timer {
    pub fn power_up(intf: Rc<RefCell<Intf>>) -> Self {
        Self {
            intf,
            div: 0x00,
            tima: 0x00,
            tma: 0x00,
            tac: 0x00,
            div_clock: Clock::power_up(256),
            tima_clock: Clock::power_up(TAC_CYCLES[0]),
        }
    }

    pub fn reset(&mut self, div: u8) {
        self.div = div;
        self.tima = 0x00;
        self.tma = 0x00;
        self.tac = 0x00;
        self.div_clock.n = 0;
        self.tima_clock.period = TAC_CYCLES[0];
        self.tima_clock.n = 0;
    }

    pub fn get(&self, a: u16) -> u8 {
        match a {
            0xff04 => self.div,
            0xff05 => self.tima,
            0xff06 => self.tma,
            0xff07 => self.tac | 0xf8,
            _ => panic!("Unsupported timer address"),
        }
    }

    pub fn set(&mut self, a: u16, v: u8) {
        match a {
            0xff04 => {
                self.div = 0x00;
                self.div_clock.n = 0;
            }
            0xff05 => self.tima = v,
            0xff06 => self.tma = v,
            0xff07 => {
                self.tac = v & 0x07;
                self.tima_clock.period = TAC_CYCLES[(v & 0x03) as usize];
            }
            _ => panic!("Unsupported timer address"),
        }
    }

    pub fn next(&mut self, cycles: u32) {
        self.div = self.div.wrapping_add((self.div_clock.next(cycles) & 0xff) as u8);

        if self.tac & 0x04 != 0x00 {
            let n = self.tima_clock.next(cycles);
            for _ in 0..n {
                self.tima = self.tima.wrapping_add(1);
                if self.tima == 0x00 {
                    self.tima = self.tma;
                    self.intf.borrow_mut().hi(Flag::Timer);
                }
            }
        }
    }

    // Clocks left until the next TIMA overflow, for the HALT fast-forward.
    pub fn overflow_horizon(&self) -> u32 {
        if self.tac & 0x04 == 0x00 {
            return u32::max_value();
        }
        (256 - u32::from(self.tima)) * self.tima_clock.period - self.tima_clock.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> (Timer, Rc<RefCell<Intf>>) {
        let intf = Rc::new(RefCell::new(Intf { data: 0x00 }));
        (Timer::power_up(intf.clone()), intf)
    }

    #[test]
    fn div_rate() {
        let (mut t, _) = timer();
        t.next(255);
        assert_eq!(t.get(0xff04), 0);
        t.next(1);
        assert_eq!(t.get(0xff04), 1);
        t.next(256 * 4);
        assert_eq!(t.get(0xff04), 5);
    }

    #[test]
    fn div_write_resets() {
        let (mut t, _) = timer();
        t.next(300);
        t.set(0xff04, 0xa5);
        assert_eq!(t.get(0xff04), 0);
        // The residue is cleared along with the register.
        t.next(255);
        assert_eq!(t.get(0xff04), 0);
    }

    #[test]
    fn tima_overflow_reloads_tma_and_interrupts() {
        let (mut t, intf) = timer();
        t.set(0xff06, 0xfe);
        t.set(0xff05, 0xff);
        t.set(0xff07, 0x05);
        t.next(15);
        assert_eq!(t.get(0xff05), 0xff);
        assert_eq!(intf.borrow().data & 0x04, 0x00);
        t.next(1);
        assert_eq!(t.get(0xff05), 0xfe);
        assert_eq!(intf.borrow().data & 0x04, 0x04);
    }

    #[test]
    fn tima_disabled_does_not_count() {
        let (mut t, intf) = timer();
        t.set(0xff07, 0x01);
        t.next(100_000);
        assert_eq!(t.get(0xff05), 0x00);
        assert_eq!(intf.borrow().data, 0x00);
    }

    #[test]
    fn tac_reads_with_or_mask() {
        let (mut t, _) = timer();
        t.set(0xff07, 0x05);
        assert_eq!(t.get(0xff07), 0xfd);
    }

    #[test]
    fn overflow_horizon_counts_down() {
        let (mut t, _) = timer();
        t.set(0xff05, 0xff);
        t.set(0xff07, 0x05);
        assert_eq!(t.overflow_horizon(), 16);
        t.next(6);
        assert_eq!(t.overflow_horizon(), 10);
        t.set(0xff07, 0x00);
        assert_eq!(t.overflow_horizon(), u32::max_value());
    }
}
