//! A register level NAU7802 stand-in for host tests.

use std::cell::{Cell, RefCell, RefMut};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::{delay::DelayMs, i2c};

use crate::consts::{ctrl2, pu_ctrl, Register, ADDRESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    Success,
    Error,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(Vec<u8>),
    WriteRead { reg: u8, len: usize },
}

pub struct Chip {
    regs: [u8; 32],
    pointer: u8,
    /// Upper nibble is free, the low nibble is what `revision_code` checks.
    pub revision: u8,
    pub present: bool,
    pub fail_transfers: bool,
    pub power_up_ready: bool,
    pub calibration: CalibrationOutcome,
    pub log: Vec<Op>,
}

const READ_ONLY_PU_CTRL: u8 = 1 << pu_ctrl::PUR | 1 << pu_ctrl::CR;

impl Chip {
    /// Power on register contents.
    pub fn defaults(&self) -> [u8; 32] {
        let mut regs = [0; 32];
        // Both gain calibration registers start at 1.0 (0x00800000).
        regs[Register::Gcal1B2 as usize] = 0x80;
        regs[Register::Gcal2B2 as usize] = 0x80;
        regs[Register::DeviceRev as usize] = self.revision;
        regs
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    /// Poke a register directly, bypassing the write side effects.
    pub fn poke(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
    }

    pub fn set_cycle_ready(&mut self, ready: bool) {
        let pu = &mut self.regs[Register::PuCtrl as usize];
        if ready {
            *pu |= 1 << pu_ctrl::CR;
        } else {
            *pu &= !(1 << pu_ctrl::CR);
        }
    }

    /// Finish a conversion: load ADCO and raise CR.
    pub fn convert(&mut self, result: [u8; 3]) {
        self.regs[Register::AdcoB2 as usize..=Register::AdcoB0 as usize].copy_from_slice(&result);
        self.set_cycle_ready(true);
    }

    fn store(&mut self, addr: u8, value: u8) {
        match addr {
            a if a == Register::PuCtrl as u8 => self.store_pu_ctrl(value),
            a if a == Register::Ctrl2 as u8 => self.store_ctrl2(value),
            a if (Register::AdcoB2 as u8..=Register::AdcoB0 as u8).contains(&a) => {}
            a if a == Register::DeviceRev as u8 => {}
            a => self.regs[a as usize & 0x1F] = value,
        }
    }

    fn store_pu_ctrl(&mut self, value: u8) {
        if value & 1 << pu_ctrl::RR != 0 {
            self.regs = self.defaults();
            self.regs[Register::PuCtrl as usize] = 1 << pu_ctrl::RR;
            return;
        }

        let current = self.regs[Register::PuCtrl as usize];
        let mut next = (value & !READ_ONLY_PU_CTRL) | (current & READ_ONLY_PU_CTRL);

        let powered = value & (1 << pu_ctrl::PUD | 1 << pu_ctrl::PUA)
            == (1 << pu_ctrl::PUD | 1 << pu_ctrl::PUA);
        if powered && self.power_up_ready {
            next |= 1 << pu_ctrl::PUR;
        } else {
            next &= !(1 << pu_ctrl::PUR);
        }

        self.regs[Register::PuCtrl as usize] = next;
    }

    fn store_ctrl2(&mut self, value: u8) {
        let mut next = value;
        if value & 1 << ctrl2::CALS != 0 {
            match self.calibration {
                CalibrationOutcome::Success => {
                    next &= !(1 << ctrl2::CALS | 1 << ctrl2::CAL_ERR);
                }
                CalibrationOutcome::Error => {
                    next &= !(1 << ctrl2::CALS);
                    next |= 1 << ctrl2::CAL_ERR;
                }
                CalibrationOutcome::Never => {}
            }
        }

        self.regs[Register::Ctrl2 as usize] = next;
    }

    fn load(&mut self, addr: u8) -> u8 {
        let value = self.regs[addr as usize & 0x1F];
        if (Register::AdcoB2 as u8..=Register::AdcoB0 as u8).contains(&addr) {
            self.set_cycle_ready(false);
        }
        value
    }
}

/// Cloneable handle onto one simulated chip, so a test can keep poking at the
/// registers while the driver owns the bus.
#[derive(Clone)]
pub struct SimBus(Rc<RefCell<Chip>>);

impl SimBus {
    pub fn new() -> Self {
        let mut chip = Chip {
            regs: [0; 32],
            pointer: 0,
            revision: 0x0F,
            present: true,
            fail_transfers: false,
            power_up_ready: true,
            calibration: CalibrationOutcome::Success,
            log: Vec::new(),
        };
        chip.regs = chip.defaults();

        SimBus(Rc::new(RefCell::new(chip)))
    }

    pub fn chip(&self) -> RefMut<'_, Chip> {
        self.0.borrow_mut()
    }

    fn check(chip: &Chip, address: u8) -> Result<(), BusFault> {
        if address != ADDRESS || !chip.present || chip.fail_transfers {
            return Err(BusFault);
        }
        Ok(())
    }
}

impl i2c::Write<u8> for SimBus {
    type Error = BusFault;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.chip();
        Self::check(&chip, address)?;
        chip.log.push(Op::Write(bytes.to_vec()));

        if let Some((&reg, data)) = bytes.split_first() {
            chip.pointer = reg;
            for &byte in data {
                let pointer = chip.pointer;
                chip.store(pointer, byte);
                chip.pointer = pointer.wrapping_add(1);
            }
        }

        Ok(())
    }
}

impl i2c::WriteRead<u8> for SimBus {
    type Error = BusFault;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        let mut chip = self.chip();
        Self::check(&chip, address)?;

        if let Some(&reg) = bytes.first() {
            chip.pointer = reg;
        }
        let reg = chip.pointer;
        chip.log.push(Op::WriteRead { reg, len: buffer.len() });

        for slot in buffer.iter_mut() {
            let pointer = chip.pointer;
            *slot = chip.load(pointer);
            chip.pointer = pointer.wrapping_add(1);
        }

        Ok(())
    }
}

/// Delay that only counts.
#[derive(Clone, Default)]
pub struct SimDelay(Rc<Cell<u32>>);

impl SimDelay {
    pub fn elapsed_ms(&self) -> u32 {
        self.0.get()
    }
}

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.0.set(self.0.get() + ms as u32);
    }
}
