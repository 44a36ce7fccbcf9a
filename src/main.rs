// Note: Game BoyTM, Game Boy PocketTM, Super Game BoyTM and Game Boy ColorTM
// are registered trademarks of Nintendo CO., LTD. © 1989 to 1999 by Nintendo
// CO., LTD.
use dotmatrix::cartridge::CartridgeBacking;
use dotmatrix::convention::{SCREEN_H, SCREEN_W};
use dotmatrix::gpu::{VideoSink, SHADE_MASK};
use dotmatrix::joypad::JoypadKey;
use dotmatrix::motherboard::MotherBoard;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::rc::Rc;

// Cartridge storage backed by the ROM file and a sibling .sav file.
struct FileBacking {
    rom: Vec<u8>,
    ram: Vec<u8>,
    sav_path: PathBuf,
}

impl FileBacking {
    fn open(path: &str) -> Self {
        let mut f = File::open(path).unwrap();
        let mut rom = Vec::new();
        f.read_to_end(&mut rom).unwrap();
        if rom.len() < 0x0150 {
            panic!("Missing required information area which located at 0100-014F");
        }
        let ram_len = match rom[0x0147] {
            0x05 | 0x06 => 0x200,
            _ => match rom[0x0149] {
                0x01 => 0x800,
                0x02 => 0x2000,
                0x03 => 0x8000,
                0x04 => 0x20000,
                0x05 => 0x10000,
                _ => 0,
            },
        };
        let sav_path = PathBuf::from(path).with_extension("sav");
        let ram = match File::open(&sav_path) {
            Ok(mut f) => {
                let mut ram = Vec::new();
                f.read_to_end(&mut ram).unwrap();
                ram.resize(ram_len, 0x00);
                ram
            }
            Err(_) => vec![0x00; ram_len],
        };
        Self { rom, ram, sav_path }
    }
}

impl CartridgeBacking for FileBacking {
    fn rom_read(&self, offset: u32) -> u8 {
        self.rom.get(offset as usize).copied().unwrap_or(0xff)
    }

    fn cart_ram_read(&self, offset: u32) -> u8 {
        self.ram.get(offset as usize).copied().unwrap_or(0xff)
    }

    fn cart_ram_write(&mut self, offset: u32, v: u8) {
        if let Some(b) = self.ram.get_mut(offset as usize) {
            *b = v;
        }
    }

    fn sav(&self) {
        if self.ram.is_empty() {
            return;
        }
        rog::debugln!("Ram is being persisted");
        File::create(&self.sav_path).and_then(|mut f| f.write_all(&self.ram)).unwrap()
    }
}

const GRAYS: [u32; 4] = [0x00ff_ffff, 0x00aa_aaaa, 0x0055_5555, 0x0000_0000];

// Turns the 2-bit shades into grayscale pixels of a shared frame buffer.
struct Lcd {
    buffer: Rc<RefCell<Vec<u32>>>,
}

impl VideoSink for Lcd {
    fn draw_line(&mut self, line: u8, pixels: &[u8; SCREEN_W]) {
        let mut buffer = self.buffer.borrow_mut();
        for (x, p) in pixels.iter().enumerate() {
            let g = GRAYS[usize::from(p & SHADE_MASK)];
            buffer[usize::from(line) * SCREEN_W + x] = 0xff00_0000 | g;
        }
    }
}

fn main() {
    rog::reg("dotmatrix");
    rog::reg("dotmatrix::cartridge");

    let mut rom = String::from("");
    let mut c_scale = 2;
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("DMG emulator");
        ap.refer(&mut c_scale).add_option(
            &["-x", "--scale-factor"],
            argparse::Store,
            "Scale the video by a factor of 1, 2, 4, or 8",
        );
        ap.refer(&mut rom).add_argument("rom", argparse::Store, "Rom name");
        ap.parse_args_or_exit();
    }

    let mut mbrd = match MotherBoard::power_up(Box::new(FileBacking::open(&rom))) {
        Ok(mbrd) => mbrd,
        Err(e) => {
            rog::println!("{}: {}", rom, e);
            std::process::exit(1);
        }
    };
    let buffer = Rc::new(RefCell::new(vec![0x00u32; SCREEN_W * SCREEN_H]));
    mbrd.set_lcd(Box::new(Lcd { buffer: buffer.clone() }));

    let mut option = minifb::WindowOptions::default();
    option.resize = true;
    option.scale = match c_scale {
        1 => minifb::Scale::X1,
        2 => minifb::Scale::X2,
        4 => minifb::Scale::X4,
        8 => minifb::Scale::X8,
        _ => panic!("Supported scale: 1, 2, 4 or 8"),
    };
    let rom_name = mbrd.romname();
    let mut window =
        minifb::Window::new(format!("dotmatrix - {}", rom_name).as_str(), SCREEN_W, SCREEN_H, option).unwrap();

    let keys = [
        (minifb::Key::Right, JoypadKey::Right),
        (minifb::Key::Up, JoypadKey::Up),
        (minifb::Key::Left, JoypadKey::Left),
        (minifb::Key::Down, JoypadKey::Down),
        (minifb::Key::Z, JoypadKey::A),
        (minifb::Key::X, JoypadKey::B),
        (minifb::Key::Space, JoypadKey::Select),
        (minifb::Key::Enter, JoypadKey::Start),
    ];

    while window.is_open() && !window.is_key_down(minifb::Key::Escape) {
        let frame_start = std::time::Instant::now();
        mbrd.run_frame();
        window.update_with_buffer(buffer.borrow().as_slice()).unwrap();

        for (rk, vk) in &keys {
            if window.is_key_down(*rk) {
                mbrd.keydown(*vk);
            } else {
                mbrd.keyup(*vk);
            }
        }

        // ~59.73 Hz pacing; the core itself runs as fast as it can.
        let budget = std::time::Duration::from_micros(16742);
        if let Some(rest) = budget.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    mbrd.sav();
}
