//! Typed views over the multi-field control registers.
//!
//! A view is built from the byte just read off the chip, edited field by field
//! and turned back into a byte, so bits belonging to other fields are carried
//! through untouched.

#![allow(dead_code)]

use modular_bitfield::prelude::*;

use crate::consts::Register;
use crate::{CalibrationMode, Channel, Gain, Ldo, SampleRate};

pub(crate) trait RegisterView: Copy {
    const REGISTER: Register;

    fn from_byte(byte: u8) -> Self;
    fn into_byte(self) -> u8;
}

macro_rules! impl_register_view {
    ($($view:ident => $reg:ident),*) => {
        $(
            impl RegisterView for $view {
                const REGISTER: Register = Register::$reg;

                fn from_byte(byte: u8) -> Self {
                    Self::from_bytes([byte])
                }

                fn into_byte(self) -> u8 {
                    self.into_bytes()[0]
                }
            }
        )*
    }
}

#[bitfield]
#[derive(Clone, Copy)]
pub(crate) struct Ctrl1 {
    pub gain: Gain,
    pub vldo: Ldo,
    pub drdy_sel: bool,
    pub crp: bool,
}

#[bitfield]
#[derive(Clone, Copy)]
pub(crate) struct Ctrl2 {
    pub calmod: CalibrationMode,
    pub cals: bool,
    pub cal_err: bool,
    pub crs: SampleRate,
    pub chs: Channel,
}

impl_register_view!(Ctrl1 => Ctrl1, Ctrl2 => Ctrl2);
