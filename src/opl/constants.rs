//! OPL3 lookup tables and timing constants

/// Native chip output rate (14.31818 MHz / 288)
pub const CHIP_RATE_HZ: f32 = 49_716.0;

/// Default host sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Envelope floor in dB; anything at or above is silent
pub const MAX_ATTENUATION_DB: f32 = 96.0;

/// Total level step (6-bit field)
pub const TOTAL_LEVEL_STEP_DB: f32 = 0.75;

/// Frequency multiplier per 4-bit `MULT` value
pub const MULTIPLIERS: [f32; 16] = [
    0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 10.0, 12.0, 12.0, 15.0, 15.0,
];

/// Key scale level attenuation (0.75 dB units at 6 dB/oct) by the top 4 f-number bits
pub const KSL_ROM: [u8; 16] = [0, 32, 40, 45, 48, 51, 53, 55, 56, 58, 59, 60, 61, 62, 63, 64];

/// Scale applied to the KSL attenuation for each 2-bit KSL setting
/// (off, 3 dB/oct, 1.5 dB/oct, 6 dB/oct)
pub const KSL_SHIFT: [f32; 4] = [0.0, 0.5, 0.25, 1.0];

/// Attack time (0 to full level) at effective rate 4, in milliseconds
pub const ATTACK_TIME_MS: f32 = 2826.24;

/// Decay/release time (full level to 96 dB) at effective rate 4, in milliseconds
pub const DECAY_TIME_MS: f32 = 39_280.64;

/// Effective rates at or above this value run at the fastest speed
pub const FASTEST_RATE: u8 = 60;

/// Tremolo LFO frequency
pub const TREMOLO_HZ: f32 = 3.7;

/// Tremolo depth for `0xBD` bit 7 clear / set
pub const TREMOLO_DEPTH_DB: [f32; 2] = [1.0, 4.8];

/// Vibrato LFO frequency
pub const VIBRATO_HZ: f32 = 6.07;

/// Vibrato depth in cents for `0xBD` bit 6 clear / set
pub const VIBRATO_DEPTH_CENTS: [f32; 2] = [7.0, 14.0];

/// Peak phase offset, in cycles, a full-level modulator applies to its carrier
pub const MODULATION_DEPTH: f32 = 2.0;

/// Output amplitude of a single full-level channel before saturation
pub const CHANNEL_GAIN: f32 = 8_192.0;

/// Convert an attenuation in dB to a linear gain
#[inline]
pub fn attenuation_to_gain(db: f32) -> f32 {
    if db >= MAX_ATTENUATION_DB {
        0.0
    } else {
        10f32.powf(-db / 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_attenuation_to_gain() {
        assert_relative_eq!(attenuation_to_gain(0.0), 1.0);
        assert_relative_eq!(attenuation_to_gain(6.0), 0.501, epsilon = 1e-3);
        assert_eq!(attenuation_to_gain(MAX_ATTENUATION_DB), 0.0);
    }

    #[test]
    fn test_multiplier_table_shape() {
        assert_eq!(MULTIPLIERS[0], 0.5);
        assert_eq!(MULTIPLIERS[3], 3.0);
        assert_eq!(MULTIPLIERS[11], MULTIPLIERS[10]);
        assert_eq!(MULTIPLIERS[15], 15.0);
    }
}
