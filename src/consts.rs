#![allow(dead_code)]

/// Unshifted 7-bit bus address. The NAU7802 has no address select pins.
pub const ADDRESS: u8 = 0x2A;

/// Low nibble of `DEVICE_REV` on every NAU7802.
pub const REVISION_ID: u8 = 0x0F;

/// `ADC` register value with both CHPS bits set, which turns the clock chopper off.
pub const CLK_CHP_OFF: u8 = 0x30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    PuCtrl = 0x00,
    Ctrl1 = 0x01,
    Ctrl2 = 0x02,
    Ocal1B2 = 0x03,
    Ocal1B1 = 0x04,
    Ocal1B0 = 0x05,
    Gcal1B3 = 0x06,
    Gcal1B2 = 0x07,
    Gcal1B1 = 0x08,
    Gcal1B0 = 0x09,
    Ocal2B2 = 0x0A,
    Ocal2B1 = 0x0B,
    Ocal2B0 = 0x0C,
    Gcal2B3 = 0x0D,
    Gcal2B2 = 0x0E,
    Gcal2B1 = 0x0F,
    Gcal2B0 = 0x10,
    I2cControl = 0x11,
    AdcoB2 = 0x12,
    AdcoB1 = 0x13,
    AdcoB0 = 0x14,
    /// Shared between ADC control and OTP bits 32:24.
    Adc = 0x15,
    OtpB1 = 0x16,
    OtpB0 = 0x17,
    Pga = 0x1B,
    PgaPwr = 0x1C,
    DeviceRev = 0x1F,
}

impl Register {
    pub const ALL: [Register; 27] = [
        Register::PuCtrl,
        Register::Ctrl1,
        Register::Ctrl2,
        Register::Ocal1B2,
        Register::Ocal1B1,
        Register::Ocal1B0,
        Register::Gcal1B3,
        Register::Gcal1B2,
        Register::Gcal1B1,
        Register::Gcal1B0,
        Register::Ocal2B2,
        Register::Ocal2B1,
        Register::Ocal2B0,
        Register::Gcal2B3,
        Register::Gcal2B2,
        Register::Gcal2B1,
        Register::Gcal2B0,
        Register::I2cControl,
        Register::AdcoB2,
        Register::AdcoB1,
        Register::AdcoB0,
        Register::Adc,
        Register::OtpB1,
        Register::OtpB0,
        Register::Pga,
        Register::PgaPwr,
        Register::DeviceRev,
    ];

    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Bits within `PU_CTRL`.
pub mod pu_ctrl {
    /// Register reset
    pub const RR: u8 = 0;
    /// Power up digital
    pub const PUD: u8 = 1;
    /// Power up analog
    pub const PUA: u8 = 2;
    /// Power up ready (read only)
    pub const PUR: u8 = 3;
    /// Cycle start
    pub const CS: u8 = 4;
    /// Cycle ready (read only)
    pub const CR: u8 = 5;
    pub const OSCS: u8 = 6;
    /// Internal LDO select
    pub const AVDDS: u8 = 7;
}

/// Bits within `CTRL1`. GAINS is bits 2:0 and VLDO bits 5:3.
pub mod ctrl1 {
    pub const DRDY_SEL: u8 = 6;
    /// Conversion ready pin polarity, 1 = active low.
    pub const CRP: u8 = 7;
}

/// Bits within `CTRL2`. CALMOD is bits 1:0 and CRS bits 6:4.
pub mod ctrl2 {
    /// Calibration start, cleared by the chip when done.
    pub const CALS: u8 = 2;
    pub const CAL_ERR: u8 = 3;
    /// Analog input channel select
    pub const CHS: u8 = 7;
}

pub mod pga {
    pub const CHP_DIS: u8 = 0;
    pub const INV: u8 = 3;
    pub const BYPASS_EN: u8 = 4;
    pub const OUT_EN: u8 = 5;
    pub const LDO_MODE: u8 = 6;
    pub const RD_OTP_SEL: u8 = 7;
}

pub mod pga_pwr {
    /// Enables the PGA output bypass capacitor across VIN2P/VIN2N.
    pub const PGA_CAP_EN: u8 = 7;
}
