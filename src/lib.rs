//! Driver for the Nuvoton NAU7802 24-bit load cell ADC over I²C.
//!
//! Every setter is a read-modify-write of the register that holds the field,
//! so fields sharing a register never clobber each other. Nothing is cached;
//! each call goes to the chip.
//!
//! ```ignore
//! let mut scale = Nau7802::new(i2c, delay, Config::default());
//! scale.begin()?;
//!
//! loop {
//!     if scale.available()? {
//!         let raw = scale.reading_signed()?;
//!     }
//! }
//! ```
//!
//! The driver takes the bus by value. To share it with other devices hand it a
//! bus proxy (e.g. from `shared-bus`) instead.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

mod consts;
mod regs;

#[cfg(test)]
mod sim;

use core::slice;

use embedded_hal::blocking::{delay::DelayMs, i2c};
use modular_bitfield::prelude::*;
use modular_bitfield::error::InvalidBitPattern;

pub use self::consts::{Register, ADDRESS, REVISION_ID};
use self::consts::*;
use self::regs::{Ctrl1, Ctrl2, RegisterView};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus transaction failed or was not acknowledged.
    I2C(E),
    /// Nothing acknowledged the device address.
    NotConnected,
    /// The revision code read back was not [`REVISION_ID`].
    InvalidDevice(u8),
    PowerUpTimeout,
    CalibrationTimeout,
    /// The chip finished calibrating with CAL_ERR set.
    CalibrationFailed,
    /// Bit index past 7.
    InvalidBit(u8),
    /// A multi-bit field holds a code with no meaning.
    InvalidField(u8),
    OutOfRange,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::I2C(e)
    }
}

/// Programmable gain amplifier setting.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum Gain {
    X1 = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
    X32 = 0b101,
    X64 = 0b110,
    X128 = 0b111,
}

/// Internal LDO output voltage.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum Ldo {
    V4_5 = 0b000,
    V4_2 = 0b001,
    V3_9 = 0b010,
    V3_6 = 0b011,
    V3_3 = 0b100,
    V3_0 = 0b101,
    V2_7 = 0b110,
    V2_4 = 0b111,
}

/// Conversion rate in samples per second. The codes are not contiguous.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum SampleRate {
    Sps10 = 0b000,
    Sps20 = 0b001,
    Sps40 = 0b010,
    Sps80 = 0b011,
    Sps320 = 0b111,
}

#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 1]
pub enum Channel {
    One = 0,
    Two = 1,
}

#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum CalibrationMode {
    /// Internal offset calibration.
    Internal = 0b00,
    /// System offset calibration, inputs shorted externally.
    OffsetExternal = 0b10,
    /// System gain calibration, full scale applied externally.
    GainExternal = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStatus {
    InProgress,
    Failure,
    Success,
}

/// LDO compensation, PGA register bit 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LdoMode {
    /// Higher DC gain, needs an output capacitor ESR below 1 ohm.
    Accuracy,
    /// Lower DC gain, tolerates ESR up to 5 ohms.
    Stability,
}

/// Settings applied by [`Nau7802::begin`] and the polling budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub ldo: Ldo,
    pub gain: Gain,
    pub sample_rate: SampleRate,
    /// Enable the bypass capacitor on the PGA output.
    pub pga_capacitor: bool,
    pub calibrate_on_begin: bool,
    /// How long [`Nau7802::power_up`] waits for PUR, in milliseconds.
    pub power_up_timeout_ms: u16,
    /// How long [`Nau7802::calibrate`] waits for CALS to clear, in milliseconds.
    pub calibration_timeout_ms: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ldo: Ldo::V3_3,
            gain: Gain::X128,
            sample_rate: SampleRate::Sps80,
            pga_capacitor: true,
            calibrate_on_begin: true,
            power_up_timeout_ms: 200,
            calibration_timeout_ms: 1000,
        }
    }
}

impl Config {
    pub fn with_ldo(self, ldo: Ldo) -> Self {
        Self { ldo, ..self }
    }

    pub fn with_gain(self, gain: Gain) -> Self {
        Self { gain, ..self }
    }

    pub fn with_sample_rate(self, sample_rate: SampleRate) -> Self {
        Self { sample_rate, ..self }
    }

    pub fn with_pga_capacitor(self, pga_capacitor: bool) -> Self {
        Self { pga_capacitor, ..self }
    }

    pub fn with_calibrate_on_begin(self, calibrate_on_begin: bool) -> Self {
        Self { calibrate_on_begin, ..self }
    }

    pub fn with_power_up_timeout_ms(self, power_up_timeout_ms: u16) -> Self {
        Self { power_up_timeout_ms, ..self }
    }

    pub fn with_calibration_timeout_ms(self, calibration_timeout_ms: u16) -> Self {
        Self { calibration_timeout_ms, ..self }
    }
}

pub struct Nau7802<I2C, DELAY> {
    i2c: I2C,
    delay: DELAY,
    config: Config,
}

impl<I2C, DELAY, E> Nau7802<I2C, DELAY>
where
    I2C: i2c::Write<u8, Error = E> + i2c::WriteRead<u8, Error = E>,
    DELAY: DelayMs<u8>,
{
    /// Wrap the bus. Nothing is sent until [`begin`](Self::begin).
    pub fn new(i2c: I2C, delay: DELAY, config: Config) -> Self {
        Self { i2c, delay, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Give back the bus and the delay provider.
    pub fn release(self) -> (I2C, DELAY) {
        (self.i2c, self.delay)
    }

    /// Reset, power up and configure the chip, then optionally calibrate.
    ///
    /// Stops at the first step that fails. The driver stays usable, so this
    /// can simply be called again.
    pub fn begin(&mut self) -> Result<(), Error<E>> {
        // The first transaction after power on is sometimes not acknowledged.
        if !self.is_connected() && !self.is_connected() {
            warn!("nau7802: no ack at {=u8:#x}", ADDRESS);
            return Err(Error::NotConnected);
        }

        self.reset()?;
        self.power_up()?;

        let revision = self.revision_code()?;
        if revision != REVISION_ID {
            warn!("nau7802: unexpected revision {=u8:#x}", revision);
            return Err(Error::InvalidDevice(revision));
        }

        let config = self.config;
        self.set_ldo(config.ldo)?;
        self.set_gain(config.gain)?;
        self.set_sample_rate(config.sample_rate)?;

        // Power on sequencing: the clock chopper has to be off.
        self.set_register(Register::Adc, CLK_CHP_OFF)?;
        self.set_pga_capacitor(config.pga_capacitor)?;

        if config.calibrate_on_begin {
            self.calibrate()?;
        }

        info!("nau7802: ready");
        Ok(())
    }

    /// Probe the device address with an empty write.
    pub fn is_connected(&mut self) -> bool {
        self.i2c.write(ADDRESS, &[]).is_ok()
    }

    /// Whether a conversion has finished since the result was last read.
    pub fn available(&mut self) -> Result<bool, Error<E>> {
        self.bit(Register::PuCtrl, pu_ctrl::CR)
    }

    /// Read the last 24-bit conversion result as it sits in ADCO_B2..B0.
    ///
    /// Check [`available`](Self::available) first, otherwise this returns
    /// whatever the previous conversion left behind.
    pub fn reading(&mut self) -> Result<u32, Error<E>> {
        let mut buf = [0; 3];
        self.i2c
            .write_read(ADDRESS, &[Register::AdcoB2.addr()], &mut buf)?;

        Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]))
    }

    /// Like [`reading`](Self::reading), but interpreted as two's complement.
    pub fn reading_signed(&mut self) -> Result<i32, Error<E>> {
        self.reading().map(sign_extend_24)
    }

    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.update(|ctrl1: Ctrl1| ctrl1.with_gain(gain))
    }

    pub fn gain(&mut self) -> Result<Gain, Error<E>> {
        self.view::<Ctrl1>()?.gain_or_err().map_err(invalid_field)
    }

    /// Set the LDO voltage and switch AVDD over to the internal LDO.
    pub fn set_ldo(&mut self, ldo: Ldo) -> Result<(), Error<E>> {
        self.update(|ctrl1: Ctrl1| ctrl1.with_vldo(ldo))?;
        self.set_bit(Register::PuCtrl, pu_ctrl::AVDDS)
    }

    pub fn ldo(&mut self) -> Result<Ldo, Error<E>> {
        self.view::<Ctrl1>()?.vldo_or_err().map_err(invalid_field)
    }

    pub fn set_sample_rate(&mut self, rate: SampleRate) -> Result<(), Error<E>> {
        self.update(|ctrl2: Ctrl2| ctrl2.with_crs(rate))
    }

    pub fn sample_rate(&mut self) -> Result<SampleRate, Error<E>> {
        self.view::<Ctrl2>()?.crs_or_err().map_err(invalid_field)
    }

    pub fn set_channel(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.update(|ctrl2: Ctrl2| ctrl2.with_chs(channel))
    }

    pub fn channel(&mut self) -> Result<Channel, Error<E>> {
        self.view::<Ctrl2>()?.chs_or_err().map_err(invalid_field)
    }

    /// Run the internal offset calibration and wait for it to finish.
    pub fn calibrate(&mut self) -> Result<(), Error<E>> {
        self.begin_calibration(CalibrationMode::Internal)?;
        self.wait_for_calibration(self.config.calibration_timeout_ms)
    }

    /// Start a calibration without waiting for it.
    pub fn begin_calibration(&mut self, mode: CalibrationMode) -> Result<(), Error<E>> {
        debug!("nau7802: calibrating ({})", mode);
        self.update(|ctrl2: Ctrl2| ctrl2.with_calmod(mode).with_cals(true))
    }

    pub fn calibration_status(&mut self) -> Result<CalibrationStatus, Error<E>> {
        let ctrl2 = self.view::<Ctrl2>()?;

        Ok(if ctrl2.cals() {
            CalibrationStatus::InProgress
        } else if ctrl2.cal_err() {
            CalibrationStatus::Failure
        } else {
            CalibrationStatus::Success
        })
    }

    /// Poll the calibration status once per millisecond for up to `timeout_ms`.
    pub fn wait_for_calibration(&mut self, timeout_ms: u16) -> Result<(), Error<E>> {
        let mut waited = 0;
        loop {
            match self.calibration_status()? {
                CalibrationStatus::Success => return Ok(()),
                CalibrationStatus::Failure => {
                    warn!("nau7802: calibration error");
                    return Err(Error::CalibrationFailed);
                }
                CalibrationStatus::InProgress if waited >= timeout_ms => {
                    warn!("nau7802: calibration timed out after {=u16} ms", waited);
                    return Err(Error::CalibrationTimeout);
                }
                CalibrationStatus::InProgress => {
                    self.delay.delay_ms(1);
                    waited += 1;
                }
            }
        }
    }

    /// Return every register to its power on default. Blocks for 1ms.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.set_bit(Register::PuCtrl, pu_ctrl::RR)?;
        self.delay.delay_ms(1);
        self.clear_bit(Register::PuCtrl, pu_ctrl::RR)
    }

    /// Power up the digital and analog sections and wait for PUR.
    pub fn power_up(&mut self) -> Result<(), Error<E>> {
        self.set_bit(Register::PuCtrl, pu_ctrl::PUD)?;
        self.set_bit(Register::PuCtrl, pu_ctrl::PUA)?;

        let mut waited = 0;
        while !self.bit(Register::PuCtrl, pu_ctrl::PUR)? {
            if waited >= self.config.power_up_timeout_ms {
                warn!("nau7802: not powered up after {=u16} ms", waited);
                return Err(Error::PowerUpTimeout);
            }
            self.delay.delay_ms(1);
            waited += 1;
        }

        debug!("nau7802: powered up after {=u16} ms", waited);
        Ok(())
    }

    /// Drop into the ~200nA power down state.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.clear_bit(Register::PuCtrl, pu_ctrl::PUD)?;
        self.clear_bit(Register::PuCtrl, pu_ctrl::PUA)
    }

    /// DRDY goes high when a conversion is ready. This is the default.
    pub fn set_int_polarity_high(&mut self) -> Result<(), Error<E>> {
        self.clear_bit(Register::Ctrl1, ctrl1::CRP)
    }

    pub fn set_int_polarity_low(&mut self) -> Result<(), Error<E>> {
        self.set_bit(Register::Ctrl1, ctrl1::CRP)
    }

    /// Low nibble of DEVICE_REV. Always [`REVISION_ID`] on a real part.
    pub fn revision_code(&mut self) -> Result<u8, Error<E>> {
        Ok(self.register(Register::DeviceRev)? & 0x0F)
    }

    pub fn set_pga_capacitor(&mut self, enabled: bool) -> Result<(), Error<E>> {
        if enabled {
            self.set_bit(Register::PgaPwr, pga_pwr::PGA_CAP_EN)
        } else {
            self.clear_bit(Register::PgaPwr, pga_pwr::PGA_CAP_EN)
        }
    }

    pub fn set_ldo_mode(&mut self, mode: LdoMode) -> Result<(), Error<E>> {
        match mode {
            LdoMode::Accuracy => self.clear_bit(Register::Pga, pga::LDO_MODE),
            LdoMode::Stability => self.set_bit(Register::Pga, pga::LDO_MODE),
        }
    }

    /// Channel 1 offset calibration value, 24-bit two's complement.
    pub fn channel1_offset(&mut self) -> Result<i32, Error<E>> {
        let mut buf = [0; 3];
        self.i2c
            .write_read(ADDRESS, &[Register::Ocal1B2.addr()], &mut buf)?;

        Ok(sign_extend_24(u32::from_be_bytes([0, buf[0], buf[1], buf[2]])))
    }

    pub fn set_channel1_offset(&mut self, offset: i32) -> Result<(), Error<E>> {
        if !(-0x80_0000..=0x7F_FFFF).contains(&offset) {
            return Err(Error::OutOfRange);
        }

        let [_, b2, b1, b0] = offset.to_be_bytes();
        self.i2c
            .write(ADDRESS, &[Register::Ocal1B2.addr(), b2, b1, b0])?;
        Ok(())
    }

    /// Channel 1 gain calibration value, 1.23 fixed point as stored on chip.
    pub fn channel1_gain(&mut self) -> Result<u32, Error<E>> {
        let mut buf = [0; 4];
        self.i2c
            .write_read(ADDRESS, &[Register::Gcal1B3.addr()], &mut buf)?;

        Ok(u32::from_be_bytes(buf))
    }

    pub fn set_channel1_gain(&mut self, gain: u32) -> Result<(), Error<E>> {
        let [b3, b2, b1, b0] = gain.to_be_bytes();
        self.i2c
            .write(ADDRESS, &[Register::Gcal1B3.addr(), b3, b2, b1, b0])?;
        Ok(())
    }

    pub fn set_bit(&mut self, reg: Register, bit: u8) -> Result<(), Error<E>> {
        let mask = bit_mask(bit)?;
        let value = self.register(reg)?;
        self.set_register(reg, value | mask)
    }

    pub fn clear_bit(&mut self, reg: Register, bit: u8) -> Result<(), Error<E>> {
        let mask = bit_mask(bit)?;
        let value = self.register(reg)?;
        self.set_register(reg, value & !mask)
    }

    pub fn bit(&mut self, reg: Register, bit: u8) -> Result<bool, Error<E>> {
        let mask = bit_mask(bit)?;
        Ok(self.register(reg)? & mask != 0)
    }

    pub fn register(&mut self, reg: Register) -> Result<u8, Error<E>> {
        let mut value = 0;
        self.i2c
            .write_read(ADDRESS, &[reg.addr()], slice::from_mut(&mut value))?;

        Ok(value)
    }

    pub fn set_register(&mut self, reg: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c.write(ADDRESS, &[reg.addr(), value])?;
        Ok(())
    }

    fn view<V: RegisterView>(&mut self) -> Result<V, Error<E>> {
        Ok(V::from_byte(self.register(V::REGISTER)?))
    }

    fn update<V: RegisterView>(&mut self, f: impl FnOnce(V) -> V) -> Result<(), Error<E>> {
        let view = self.view::<V>()?;
        self.set_register(V::REGISTER, f(view).into_byte())
    }
}

fn bit_mask<E>(bit: u8) -> Result<u8, Error<E>> {
    if bit > 7 {
        return Err(Error::InvalidBit(bit));
    }

    Ok(1 << bit)
}

fn invalid_field<E>(e: InvalidBitPattern<u8>) -> Error<E> {
    Error::InvalidField(e.invalid_bytes())
}

fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
