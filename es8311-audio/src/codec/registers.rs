//! ES8311 register addresses and bitfield definitions.
//!
//! Register addresses and values are single bytes. Values listed here are the
//! bit patterns the bring-up sequence writes; they are the compatibility
//! contract with the physical device.

// ── I2C addresses ──────────────────────────────────────────────────────────

/// I2C address with the CE/A0 pin tied low.
pub const I2C_ADDR_A0_LOW: u8 = 0x18;

/// I2C address with the CE/A0 pin tied high.
pub const I2C_ADDR_A0_HIGH: u8 = 0x19;

// ── Reset ──────────────────────────────────────────────────────────────────

/// Reset control.
/// - Bit 7 — CSM_ON (clock state machine power-on)
/// - Bit 6 — MSC (master/slave select)
/// - Bit 5 — SEQ_DIS
/// - Bit 4 — RST_DIG
/// - Bit 3 — RST_CMG (clock manager)
/// - Bit 2 — RST_MST
/// - Bit 1 — RST_ADC_DIG
/// - Bit 0 — RST_DAC_DIG
pub const RESET: u8 = 0x00;

pub const CSM_ON: u8 = 0x80;
pub const RST_DIG: u8 = 0x10;
pub const RST_CMG: u8 = 0x08;
pub const RST_MST: u8 = 0x04;
pub const RST_ADC_DIG: u8 = 0x02;
pub const RST_DAC_DIG: u8 = 0x01;

/// All five reset lines asserted (`0x1F`). Used by bring-up and tear-down.
pub const RESET_ASSERT_ALL: u8 = RST_DIG | RST_CMG | RST_MST | RST_ADC_DIG | RST_DAC_DIG;

/// All reset lines released, CSM off.
pub const RESET_CLEAR: u8 = 0x00;

// ── Clock manager ──────────────────────────────────────────────────────────

/// Clock manager 1: MCLK source and clock enables.
/// - Bit 7 — MCLK_SEL (1 = derive MCLK from BCLK)
/// - Bit 6 — MCLK_INV
/// - Bit 5 — MCLK_ON
/// - Bit 4 — BCLK_ON
/// - Bit 3 — CLKADC_ON
/// - Bit 2 — CLKDAC_ON
/// - Bit 1 — ANACLKADC_ON
/// - Bit 0 — ANACLKDAC_ON
pub const CLK_MANAGER1: u8 = 0x01;

pub const MCLK_SEL: u8 = 0x80;
pub const MCLK_ON: u8 = 0x20;
pub const BCLK_ON: u8 = 0x10;
pub const CLKADC_ON: u8 = 0x08;
pub const CLKDAC_ON: u8 = 0x04;
pub const ANACLKADC_ON: u8 = 0x02;
pub const ANACLKDAC_ON: u8 = 0x01;

/// BCLK-derived master clock with every ADC/DAC clock enabled (`0x9F`).
pub const CLK_MANAGER1_BCLK_SOURCE: u8 =
    MCLK_SEL | BCLK_ON | CLKADC_ON | CLKDAC_ON | ANACLKADC_ON | ANACLKDAC_ON;

/// Clock manager 2: pre-divider and multiplier.
/// - Bits 7:5 — DIV_PRE
/// - Bits 4:3 — MULT_PRE (3 = ×8)
pub const CLK_MANAGER2: u8 = 0x02;

/// Internal MCLK = 8 × BCLK.
pub const MULT_PRE_X8: u8 = 0x18;
pub const DIV_PRE_1: u8 = 0x00;

/// Clock manager 3: ADC FS mode and oversampling ratio.
pub const CLK_MANAGER3: u8 = 0x03;

/// Clock manager 4: DAC oversampling ratio.
pub const CLK_MANAGER4: u8 = 0x04;

/// Single speed, OSR = 32.
pub const ADC_OSR_32: u8 = 0x20;
pub const DAC_OSR_32: u8 = 0x20;

/// Clock manager 5: ADC/DAC clock dividers.
/// - Bits 7:4 — DIV_CLKADC
/// - Bits 3:0 — DIV_CLKDAC
pub const CLK_MANAGER5: u8 = 0x05;

pub const DIV_CLKADC_1: u8 = 0x00;
pub const DIV_CLKDAC_1: u8 = 0x00;

// ── Serial data port ───────────────────────────────────────────────────────

/// Serial data port in (DAC side).
/// - Bit 6   — SDP_IN_MUTE
/// - Bits 4:2 — SDP_IN_WL (3 = 16-bit)
/// - Bits 1:0 — SDP_IN_FMT (0 = I2S, 1 = left justified)
pub const SDP_IN: u8 = 0x09;

/// Serial data port out (ADC side). Same layout as [`SDP_IN`].
pub const SDP_OUT: u8 = 0x0A;

pub const SDP_MUTE: u8 = 0x40;
pub const SDP_WL_16BIT: u8 = 0x0C;
pub const SDP_FMT_LEFT_JUSTIFIED: u8 = 0x01;

/// 16-bit words, left-justified framing (`0x0D`).
pub const SDP_16BIT_LEFT_JUSTIFIED: u8 = SDP_WL_16BIT | SDP_FMT_LEFT_JUSTIFIED;

// ── System ─────────────────────────────────────────────────────────────────

/// Analog circuitry power. `0x01` = normal start-up.
pub const SYSTEM_0D: u8 = 0x0D;
pub const SYSTEM_0D_ANALOG_POWER_UP: u8 = 0x01;

/// PGA and ADC modulator power. `0x02` = both enabled.
pub const SYSTEM_0E: u8 = 0x0E;
pub const SYSTEM_0E_PGA_ADC_POWER_UP: u8 = 0x02;

/// DAC power. `0x00` = DAC powered.
pub const SYSTEM_12: u8 = 0x12;
pub const SYSTEM_12_DAC_POWER_UP: u8 = 0x00;

/// Output drive.
/// - Bit 4 — HPSW (headphone drive enable)
pub const SYSTEM_13: u8 = 0x13;
pub const HPSW: u8 = 0x10;

/// Input selection and analog PGA gain.
/// - Bit 6   — DMIC_ON
/// - Bits 5:4 — LINSEL (1 = MIC1P/MIC1N)
/// - Bits 3:0 — PGAGAIN (3 dB steps, 0..=10)
pub const SYSTEM_14: u8 = 0x14;
pub const LINSEL: u8 = 0x10;
pub const PGAGAIN_MASK: u8 = 0x0F;

// ── ADC ────────────────────────────────────────────────────────────────────

/// ADC analog scale.
/// - Bits 2:0 — ADC_SCALE (0 = 0 dB)
pub const ADC_16: u8 = 0x16;
pub const ADC_SCALE_MASK: u8 = 0x07;

/// ADC digital volume. `0x00` = mute, `0xFF` = +32 dB, 0.5 dB steps.
pub const ADC_VOLUME: u8 = 0x17;

/// ADC equalizer and HPF stage 2. `0x6A` = EQ bypass, DC offset cancel.
pub const ADC_1C: u8 = 0x1C;
pub const ADC_1C_EQ_BYPASS_DC_CANCEL: u8 = 0x6A;

// ── DAC ────────────────────────────────────────────────────────────────────

/// DAC digital volume. 0.5 dB steps from −95.5 dB (`0x00`) to +32 dB (`0xFF`).
pub const DAC_VOLUME: u8 = 0x32;

/// DAC ramp rate and equalizer bypass.
/// - Bits 7:4 — DAC_RAMPRATE (4 = 0.25 dB / 32 LRCK)
/// - Bit 3   — DAC_EQBYPASS
pub const DAC_37: u8 = 0x37;
pub const DAC_RAMPRATE_DEFAULT: u8 = 0x40;
pub const DAC_EQBYPASS: u8 = 0x08;

// ── Identification ─────────────────────────────────────────────────────────

pub const CHIP_ID1: u8 = 0xFD;
pub const CHIP_ID2: u8 = 0xFE;
pub const CHIP_VERSION: u8 = 0xFF;

/// Expected `CHIP_ID1` content.
pub const EXPECTED_ID1: u8 = 0x83;
/// Expected `CHIP_ID2` content.
pub const EXPECTED_ID2: u8 = 0x11;
