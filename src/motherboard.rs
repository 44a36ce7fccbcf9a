use super::apu::AudioHooks;
use super::cartridge::{CartridgeBacking, InitError};
use super::cpu::{Cpu, FaultHandler};
use super::gpu::VideoSink;
use super::joypad::JoypadKey;
use super::memory::Memory;
use super::mmunit::{BootRom, Mmunit};
use super::serial::SerialLink;

pub struct MotherBoard {
    pub mmu: Mmunit,
    pub cpu: Cpu,
}

impl MotherBoard {
    pub fn power_up(data: Box<dyn CartridgeBacking>) -> Result<Self, InitError> {
        let mmu = Mmunit::power_up(data)?;
        let mut r = Self { mmu, cpu: Cpu::power_up() };
        r.reset_cpu();
        Ok(r)
    }

    // Back to the power-on state. With a boot ROM installed execution starts
    // inside it at address zero, otherwise straight at the cartridge entry
    // point with the documented post-boot register file.
    pub fn reset(&mut self) {
        self.mmu.reset();
        self.reset_cpu();
    }

    fn reset_cpu(&mut self) {
        let hdr_checksum = self.mmu.cartridge.get(0x014d);
        self.cpu.reset(self.mmu.has_bootrom(), hdr_checksum);
    }

    // One instruction (or interrupt dispatch), then the peripherals catch
    // up. Returns the consumed clocks. A halted CPU fast-forwards to the next
    // peripheral edge so interrupts can be sampled without spinning.
    pub fn do_cycle(&mut self) -> u32 {
        let mut cycles = self.cpu.next(&mut self.mmu) * 4;
        if self.cpu.halted {
            cycles = cycles.max(self.mmu.idle_horizon());
        }
        self.mmu.next(cycles);
        cycles
    }

    // Emulate until the PPU crosses into VBlank (or, with the LCD off, a
    // frame's worth of clocks has passed). Exactly one frame per call.
    pub fn run_frame(&mut self) -> u32 {
        self.mmu.gpu.frame_ready = false;
        let mut cycles = 0;
        while !self.mmu.gpu.frame_ready {
            cycles += self.do_cycle();
        }
        cycles
    }

    pub fn set_bootrom(&mut self, boot: Box<dyn BootRom>) {
        self.mmu.set_bootrom(boot);
    }

    pub fn set_serial(&mut self, link: Box<dyn SerialLink>) {
        self.mmu.serial.set_link(link);
    }

    pub fn set_lcd(&mut self, lcd: Box<dyn VideoSink>) {
        self.mmu.gpu.set_lcd(lcd);
    }

    pub fn enable_audio(&mut self, hooks: Box<dyn AudioHooks>) {
        self.mmu.audio = Some(hooks);
    }

    pub fn set_fault_handler(&mut self, fault: Box<dyn FaultHandler>) {
        self.cpu.set_fault_handler(fault);
    }

    pub fn set_frame_skip(&mut self, enabled: bool) {
        self.mmu.gpu.frame_skip = enabled;
    }

    pub fn set_interlace(&mut self, enabled: bool) {
        self.mmu.gpu.interlace = enabled;
    }

    pub fn keydown(&mut self, key: JoypadKey) {
        self.mmu.joypad.keydown(key);
    }

    pub fn keyup(&mut self, key: JoypadKey) {
        self.mmu.joypad.keyup(key);
    }

    pub fn save_size(&self) -> usize {
        self.mmu.cartridge.save_size()
    }

    pub fn sav(&self) {
        self.mmu.cartridge.sav();
    }

    pub fn set_rtc(&mut self, sec: u8, min: u8, hour: u8, days: u16) {
        self.mmu.cartridge.set_rtc(sec, min, hour, days);
    }

    pub fn romname(&self) -> String {
        self.mmu.cartridge.rom_name()
    }

    pub fn colour_hash(&self) -> u8 {
        self.mmu.cartridge.colour_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{test_rom, VecBacking};
    use crate::convention::FRAME_CYCLES;

    fn board(patches: &[(usize, &[u8])]) -> MotherBoard {
        let mut rom = test_rom(0x00, 0x00, 0x00);
        for (at, bytes) in patches {
            rom[*at..*at + bytes.len()].copy_from_slice(bytes);
        }
        MotherBoard::power_up(Box::new(VecBacking::from_rom(rom))).unwrap()
    }

    #[test]
    fn minimal_program_reaches_hram() {
        // LD A,0x42; LDH (0x80),A; JR -2
        let mut mb = board(&[(0x0100, &[0x3e, 0x42, 0xe0, 0x80, 0x18, 0xfe])]);
        mb.run_frame();
        assert_eq!(mb.mmu.get(0xff80), 0x42);
    }

    #[test]
    fn timer_overflow_dispatches_to_0x50() {
        let program: &[u8] = &[
            0x31, 0xfe, 0xff, // LD SP,0xFFFE
            0x3e, 0xfe, 0xe0, 0x06, // TMA = 0xFE
            0x3e, 0x05, 0xe0, 0x07, // TAC = enabled, /16
            0x3e, 0x04, 0xe0, 0xff, // IE = timer
            0x3e, 0xff, 0xe0, 0x05, // TIMA = 0xFF
            0xfb, // EI
            0x18, 0xfe, // JR -2
        ];
        // Vector: mark HRAM and return.
        let vector: &[u8] = &[0x3e, 0xaa, 0xe0, 0x81, 0xd9];
        let mut mb = board(&[(0x0100, program), (0x0050, vector)]);
        let mut steps = 0;
        while mb.mmu.get(0xff81) != 0xaa {
            mb.do_cycle();
            steps += 1;
            assert!(steps < 200, "timer interrupt never arrived");
        }
        // The serviced bit is gone until the next overflow.
        assert_eq!(mb.mmu.get(0xff81), 0xaa);
    }

    #[test]
    fn vblank_cadence() {
        let program: &[u8] = &[
            0x31, 0xfe, 0xff, // LD SP,0xFFFE
            0x3e, 0x01, 0xe0, 0xff, // IE = vblank
            0xfb, // EI
            0x00, // NOP
            0x18, 0xfd, // JR -3
        ];
        // Vector: count frames in HRAM.
        let vector: &[u8] = &[0xf0, 0x80, 0x3c, 0xe0, 0x80, 0xd9];
        let mut mb = board(&[(0x0100, program), (0x0040, vector)]);
        mb.run_frame();
        for _ in 0..2 {
            let cycles = mb.run_frame();
            let drift = cycles as i64 - i64::from(FRAME_CYCLES);
            assert!(drift.abs() <= 48, "frame took {} cycles", cycles);
        }
        // The VBlank raised at the end of each frame is serviced at the top
        // of the next one.
        assert_eq!(mb.mmu.get(0xff80), 0x02);
        // The third frame's VBlank is still pending; dispatch consumes it.
        assert_eq!(mb.mmu.get(0xff0f) & 0x01, 0x01);
        mb.do_cycle();
        assert_eq!(mb.mmu.get(0xff0f) & 0x01, 0x00);
        assert_eq!(mb.cpu.reg.pc, 0x0040);
    }

    #[test]
    fn halt_fast_forwards_to_the_next_event() {
        let program: &[u8] = &[
            0x31, 0xfe, 0xff, // LD SP,0xFFFE
            0x3e, 0x01, 0xe0, 0xff, // IE = vblank
            0xfb, // EI
            0x76, // HALT
            0x18, 0xfd, // JR -3
        ];
        let vector: &[u8] = &[0xf0, 0x80, 0x3c, 0xe0, 0x80, 0xd9];
        let mut mb = board(&[(0x0100, program), (0x0040, vector)]);
        mb.run_frame();
        let mut steps = 0u32;
        mb.mmu.gpu.frame_ready = false;
        let mut cycles = 0;
        while !mb.mmu.gpu.frame_ready {
            cycles += mb.do_cycle();
            steps += 1;
        }
        let drift = cycles as i64 - i64::from(FRAME_CYCLES);
        assert!(drift.abs() <= 48);
        // A halted frame collapses into a few hundred line-edge steps rather
        // than tens of thousands of instruction steps.
        assert!(steps < 1200, "took {} steps", steps);
        assert!(mb.mmu.get(0xff80) >= 1);
    }

    #[test]
    fn frames_keep_coming_with_the_lcd_off() {
        // LD A,0x00; LDH (0x40),A; JR -2
        let mut mb = board(&[(0x0100, &[0x3e, 0x00, 0xe0, 0x40, 0x18, 0xfe])]);
        for _ in 0..3 {
            let cycles = mb.run_frame();
            assert!(cycles >= FRAME_CYCLES - 48 && cycles <= FRAME_CYCLES + 48);
            assert_eq!(mb.mmu.get(0xff44), 0x00);
        }
    }

    #[test]
    fn rom_identity_helpers() {
        let mut name = test_rom(0x00, 0x00, 0x00);
        for (i, b) in b"TETRIS".iter().enumerate() {
            name[0x0134 + i] = *b;
        }
        let mut chk: u8 = 0;
        for i in 0x0134..0x014d {
            chk = chk.wrapping_sub(name[i]).wrapping_sub(1);
        }
        name[0x014d] = chk;
        let mb = MotherBoard::power_up(Box::new(VecBacking::from_rom(name))).unwrap();
        assert_eq!(mb.romname(), "TETRIS");
        assert_eq!(mb.save_size(), 0);
        // H and C come up set because the header checksum byte is nonzero.
        assert_eq!(mb.cpu.reg.a, 0x01);
        assert_eq!(mb.cpu.reg.f, 0xb0);
        assert_eq!(mb.cpu.reg.pc, 0x0100);
    }
}
