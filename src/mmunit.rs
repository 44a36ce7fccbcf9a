// The memory management unit: every bus access of the CPU passes through
// here and is routed to the cartridge, the video side, work RAM or the I/O
// registers by the top bits of the address.
use super::apu::{Apu, AudioHooks};
use super::cartridge::{self, Cartridge, CartridgeBacking, InitError};
use super::gpu::Gpu;
use super::intf::Intf;
use super::joypad::Joypad;
use super::memory::Memory;
use super::serial::Serial;
use super::timer::Timer;
use std::cell::RefCell;
use std::rc::Rc;

// The 256-byte program that runs before the cartridge entry point. Only ever
// read while the BOOT register is still zero.
pub trait BootRom {
    fn get(&self, a: u16) -> u8;
}

pub struct Mmunit {
    pub cartridge: Box<dyn Cartridge>,
    pub apu: Apu,
    pub audio: Option<Box<dyn AudioHooks>>,
    pub gpu: Gpu,
    pub joypad: Joypad,
    pub serial: Serial,
    pub timer: Timer,
    pub intf: Rc<RefCell<Intf>>,
    boot: Option<Box<dyn BootRom>>,
    // IO register BOOT (FF50). Once written the overlay is gone for good.
    boot_done: u8,
    inte: u8,
    dma: u8,
    hram: [u8; 0x7f],
    wram: [u8; 0x2000],
}

impl Mmunit {
    pub fn power_up(data: Box<dyn CartridgeBacking>) -> Result<Self, InitError> {
        let cart = cartridge::power_up(data)?;
        let intf = Rc::new(RefCell::new(Intf::power_up()));
        let mut r = Self {
            cartridge: cart,
            apu: Apu::power_up(),
            audio: None,
            gpu: Gpu::power_up(intf.clone()),
            joypad: Joypad::power_up(intf.clone()),
            serial: Serial::power_up(intf.clone()),
            timer: Timer::power_up(intf.clone()),
            intf,
            boot: None,
            boot_done: 1,
            inte: 0x00,
            dma: 0x00,
            hram: [0x00; 0x7f],
            wram: [0x00; 0x2000],
        };
        r.reset();
        Ok(r)
    }

    pub fn set_bootrom(&mut self, boot: Box<dyn BootRom>) {
        self.boot = Some(boot);
    }

    pub fn has_bootrom(&self) -> bool {
        self.boot.is_some()
    }

    pub fn reset(&mut self) {
        let bootrom = self.boot.is_some();
        self.boot_done = if bootrom { 0 } else { 1 };
        self.timer.reset(if bootrom { 0x00 } else { 0xab });
        self.serial.reset();
        self.joypad.reset();
        self.gpu.reset(bootrom);
        self.intf.borrow_mut().data = 0xe1;
        self.inte = 0x00;
        self.dma = 0x00;
        // Power-on palette and sound-enable values the boot code would leave
        // behind.
        self.set(0xff47, 0xfc);
        self.set(0xff48, 0xff);
        self.set(0xff49, 0xff);
        self.set(0xff26, 0xf1);
    }

    // Advance every cycle-counting peripheral by one instruction's clocks.
    // Interrupt bits raised here are picked up by the next CPU step.
    pub fn next(&mut self, cycles: u32) {
        self.timer.next(cycles);
        self.cartridge.next(cycles);
        self.serial.next(cycles);
        self.gpu.next(cycles);
    }

    // While the CPU sits in HALT nothing can change until a peripheral hits
    // its next edge; jump straight to the earliest one.
    pub fn idle_horizon(&self) -> u32 {
        let mut n = self.gpu.event_horizon();
        n = n.min(self.timer.overflow_horizon());
        n = n.min(self.serial.completion_horizon());
        n.max(4)
    }

    fn run_dma(&mut self, v: u8) {
        self.dma = v;
        let base = u16::from(v) << 8;
        for i in 0..0xa0 {
            let b = self.get(base + i);
            self.set(0xfe00 + i, b);
        }
    }
}

impl Memory for Mmunit {
    fn get(&self, a: u16) -> u8 {
        match a {
            0x0000..=0x00ff if self.boot_done == 0 => match self.boot.as_ref() {
                Some(boot) => boot.get(a),
                None => self.cartridge.get(a),
            },
            0x0000..=0x7fff => self.cartridge.get(a),
            0x8000..=0x9fff => self.gpu.get(a),
            0xa000..=0xbfff => self.cartridge.get(a),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000],
            0xe000..=0xfdff => self.wram[a as usize - 0xe000],
            0xfe00..=0xfe9f => self.gpu.get(a),
            0xfea0..=0xfeff => 0xff,
            0xff00 => self.joypad.get(a),
            0xff01..=0xff02 => self.serial.get(a),
            0xff04..=0xff07 => self.timer.get(a),
            0xff0f => self.intf.borrow().data | 0xe0,
            0xff10..=0xff3f => match self.audio.as_ref() {
                Some(hooks) => hooks.read(a),
                None => self.apu.get(a),
            },
            0xff46 => self.dma,
            0xff40..=0xff45 | 0xff47..=0xff4b => self.gpu.get(a),
            0xff50 => 0xfe | self.boot_done,
            0xff80..=0xfffe => self.hram[a as usize - 0xff80],
            0xffff => self.inte,
            _ => 0xff,
        }
    }

    fn set(&mut self, a: u16, v: u8) {
        match a {
            0x0000..=0x7fff => self.cartridge.set(a, v),
            0x8000..=0x9fff => self.gpu.set(a, v),
            0xa000..=0xbfff => self.cartridge.set(a, v),
            0xc000..=0xdfff => self.wram[a as usize - 0xc000] = v,
            0xe000..=0xfdff => self.wram[a as usize - 0xe000] = v,
            0xfe00..=0xfe9f => self.gpu.set(a, v),
            0xfea0..=0xfeff => {}
            0xff00 => self.joypad.set(a, v),
            0xff01..=0xff02 => self.serial.set(a, v),
            0xff04..=0xff07 => self.timer.set(a, v),
            0xff0f => self.intf.borrow_mut().data = v | 0xe0,
            0xff10..=0xff3f => match self.audio.as_mut() {
                Some(hooks) => hooks.write(a, v),
                None => self.apu.set(a, v),
            },
            // Writing here launches a DMA transfer from ROM or RAM to OAM.
            0xff46 => self.run_dma(v),
            0xff40..=0xff45 | 0xff47..=0xff4b => self.gpu.set(a, v),
            0xff50 => self.boot_done = 1,
            0xff80..=0xfffe => self.hram[a as usize - 0xff80] = v,
            0xffff => self.inte = v,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{test_rom, VecBacking};

    fn mmu() -> Mmunit {
        Mmunit::power_up(Box::new(VecBacking::from_rom(test_rom(0x00, 0x00, 0x00)))).unwrap()
    }

    #[test]
    fn wram_and_hram_are_identity() {
        let mut mmu = mmu();
        mmu.set(0xc000, 0x11);
        mmu.set(0xdfff, 0x22);
        mmu.set(0xff80, 0x33);
        mmu.set(0xfffe, 0x44);
        assert_eq!(mmu.get(0xc000), 0x11);
        assert_eq!(mmu.get(0xdfff), 0x22);
        assert_eq!(mmu.get(0xff80), 0x33);
        assert_eq!(mmu.get(0xfffe), 0x44);
    }

    #[test]
    fn echo_ram_aliases_wram() {
        let mut mmu = mmu();
        mmu.set(0xc123, 0x5a);
        assert_eq!(mmu.get(0xe123), 0x5a);
        mmu.set(0xfdff, 0xa5);
        assert_eq!(mmu.get(0xddff), 0xa5);
    }

    #[test]
    fn unusable_region_reads_ff_and_drops_writes() {
        let mut mmu = mmu();
        mmu.set(0xfea0, 0x12);
        assert_eq!(mmu.get(0xfea0), 0xff);
        assert_eq!(mmu.get(0xfeff), 0xff);
    }

    #[test]
    fn interrupt_flag_upper_bits_read_high() {
        let mut mmu = mmu();
        mmu.set(0xff0f, 0xff);
        assert_eq!(mmu.get(0xff0f), 0xff);
        mmu.set(0xff0f, 0x00);
        assert_eq!(mmu.get(0xff0f), 0xe0);
    }

    #[test]
    fn dma_copies_into_oam() {
        let mut mmu = mmu();
        for i in 0..0xa0 {
            mmu.set(0xc000 + i, i as u8);
        }
        mmu.set(0xff46, 0xc0);
        for i in 0..0xa0 {
            assert_eq!(mmu.get(0xfe00 + i), i as u8);
        }
        assert_eq!(mmu.get(0xff46), 0xc0);
    }

    #[test]
    fn stat_write_preserves_read_only_bits() {
        let mut mmu = mmu();
        let before = mmu.get(0xff41) & 0x07;
        mmu.set(0xff41, 0xff);
        assert_eq!(mmu.get(0xff41) & 0x07, before);
        assert_eq!(mmu.get(0xff41) & 0x78, 0x78);
        mmu.set(0xff41, 0x00);
        assert_eq!(mmu.get(0xff41) & 0x80, 0x80);
    }

    #[test]
    fn post_boot_io_state() {
        let mut mmu = mmu();
        assert_eq!(mmu.get(0xff40), 0x91);
        assert_eq!(mmu.get(0xff41), 0x85);
        assert_eq!(mmu.get(0xff47), 0xfc);
        assert_eq!(mmu.get(0xff48), 0xff);
        assert_eq!(mmu.get(0xff49), 0xff);
        assert_eq!(mmu.get(0xff26), 0xf1);
        assert_eq!(mmu.get(0xff04), 0xab);
        assert_eq!(mmu.get(0xff50), 0xff);
        // DIV resets on write no matter the value.
        mmu.set(0xff04, 0x5a);
        assert_eq!(mmu.get(0xff04), 0x00);
    }

    struct FixedBoot;

    impl BootRom for FixedBoot {
        fn get(&self, a: u16) -> u8 {
            (a & 0xff) as u8 ^ 0xaa
        }
    }

    #[test]
    fn bootrom_overlay_unmaps_once() {
        let mut mmu = mmu();
        mmu.set_bootrom(Box::new(FixedBoot));
        mmu.reset();
        assert_eq!(mmu.get(0x0000), 0xaa);
        assert_eq!(mmu.get(0x00ff), 0xff ^ 0xaa);
        // Past the overlay the cartridge shows through.
        assert_eq!(mmu.get(0x0147), 0x00);
        assert_eq!(mmu.get(0xff50), 0xfe);
        mmu.set(0xff50, 0x01);
        assert_eq!(mmu.get(0x0000), 0x00);
        assert_eq!(mmu.get(0xff50), 0xff);
    }

    #[test]
    fn unmapped_io_reads_ff() {
        let mmu = mmu();
        assert_eq!(mmu.get(0xff03), 0xff);
        assert_eq!(mmu.get(0xff4d), 0xff);
        assert_eq!(mmu.get(0xff7f), 0xff);
    }
}
