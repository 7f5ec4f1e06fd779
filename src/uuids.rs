//! Service and characteristic UUIDs for the micro:bit and Nordic Thingy bases.
//!
//! Both vendors derive every UUID from a fixed 128-bit base by placing a
//! 16-bit code in bits 96..112, i.e. the last four hex digits of the first
//! dashed group.

use uuid::Uuid;

const NORDIC_BASE: u128 = 0xEF68_0000_9B35_4933_9B10_52FF_A974_0042;
const MICROBIT_BASE: u128 = 0xE95D_0000_251D_470A_A062_FA19_22DF_A9A8;

const fn with_code(base: u128, code: u16) -> Uuid {
    Uuid::from_u128(base | ((code as u128) << 96))
}

/// `EF68xxxx-9B35-4933-9B10-52FFA9740042`
pub const fn nordic_uuid(code: u16) -> Uuid {
    with_code(NORDIC_BASE, code)
}

/// `E95Dxxxx-251D-470A-A062-FA1922DFA9A8`
pub const fn microbit_uuid(code: u16) -> Uuid {
    with_code(MICROBIT_BASE, code)
}

/// Uppercase dashed form, e.g. `E95D6100-251D-470A-A062-FA1922DFA9A8`.
pub fn canonical(uuid: Uuid) -> String {
    uuid.hyphenated()
        .encode_upper(&mut Uuid::encode_buffer())
        .to_owned()
}

pub const CCCD: u16 = 0x2902;

pub const ACCEL_SERVICE: u16 = 0x0753;
pub const ACCEL_DATA: u16 = 0xCA4B;
pub const ACCEL_PERIOD: u16 = 0xFB24;
pub const MAGNETO_SERVICE: u16 = 0xF2D8;
pub const MAGNETO_DATA: u16 = 0xFB11;
pub const MAGNETO_PERIOD: u16 = 0x386C;
pub const MAGNETO_BEARING: u16 = 0x9715;
pub const BTN_SERVICE: u16 = 0x9882;
pub const BTN_A_STATE: u16 = 0xDA90;
pub const BTN_B_STATE: u16 = 0xDA91;
pub const IO_PIN_SERVICE: u16 = 0x127B;
pub const IO_PIN_DATA: u16 = 0x8D00;
pub const IO_AD_CONFIG: u16 = 0x5899;
pub const IO_PIN_CONFIG: u16 = 0xB9FE;
pub const IO_PIN_PWM: u16 = 0xD822;
pub const LED_SERVICE: u16 = 0xD91D;
pub const LED_STATE: u16 = 0x7B77;
pub const LED_TEXT: u16 = 0x93EE;
pub const LED_SCROLL: u16 = 0x0D2D;
pub const TEMP_SERVICE: u16 = 0x6100;
pub const TEMP_DATA: u16 = 0x9250;
pub const TEMP_PERIOD: u16 = 0x1B25;
