//! Property-code vocabulary
//!
//! Each device attribute is addressed by a short code string in status
//! columns and command options. The codes are firmware-defined; the typed
//! enums here only cover values the units actually accept.

/// Power: 0 off, 1 on
pub const POWER: &str = "Pow";
/// Operating mode, see [`Mode`]
pub const MODE: &str = "Mod";
/// Target temperature in °C
pub const TARGET_TEMP: &str = "SetTem";
/// Fan speed, see [`FanSpeed`]
pub const FAN_SPEED: &str = "WdSpd";
/// Fresh-air valve: 0 off, 1 on
pub const AIR: &str = "Air";
/// X-fan (dry the coil after stop): 0 off, 1 on
pub const XFAN: &str = "Blo";
/// Health (ion) mode: 0 off, 1 on
pub const HEALTH: &str = "Health";
/// Sleep curve: 0 off, 1 on
pub const SLEEP: &str = "SwhSlp";
/// Display panel light: 0 off, 1 on
pub const LIGHTS: &str = "Lig";
/// Horizontal louver position
pub const SWING_HORIZONTAL: &str = "SwingLfRig";
/// Vertical louver position, see [`VerticalSwing`]
pub const SWING_VERTICAL: &str = "SwUpDn";
/// Quiet mode: 0 off, 1 on
pub const QUIET: &str = "Quiet";
/// Turbo mode: 0 off, 1 on
pub const TURBO: &str = "Tur";
/// Room temperature sensor (reported shifted, see constants)
pub const ROOM_TEMP: &str = "TemSen";
/// Energy-saving mode: 0 off, 1 on
pub const ENERGY_SAVE: &str = "SvSt";
/// Temperature unit: 0 Celsius, 1 Fahrenheit
pub const TEMP_UNIT: &str = "TemUn";

/// Full set of codes requested by every status poll.
pub const POLL_COLS: &[&str] = &[
    POWER,
    MODE,
    TARGET_TEMP,
    FAN_SPEED,
    AIR,
    XFAN,
    HEALTH,
    SLEEP,
    LIGHTS,
    SWING_HORIZONTAL,
    SWING_VERTICAL,
    QUIET,
    TURBO,
    ROOM_TEMP,
    ENERGY_SAVE,
    TEMP_UNIT,
];

/// Operating mode values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto = 0,
    Cool = 1,
    Dry = 2,
    Fan = 3,
    Heat = 4,
}

impl Mode {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Auto),
            1 => Some(Self::Cool),
            2 => Some(Self::Dry),
            3 => Some(Self::Fan),
            4 => Some(Self::Heat),
            _ => None,
        }
    }
}

/// Fan speed values; Auto lets the unit pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Auto = 0,
    Low = 1,
    MediumLow = 2,
    Medium = 3,
    MediumHigh = 4,
    High = 5,
}

impl FanSpeed {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Auto),
            1 => Some(Self::Low),
            2 => Some(Self::MediumLow),
            3 => Some(Self::Medium),
            4 => Some(Self::MediumHigh),
            5 => Some(Self::High),
            _ => None,
        }
    }
}

/// Vertical louver positions. 0/1 are the two the accessory layer uses;
/// the fixed stops exist on most firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalSwing {
    Default = 0,
    Full = 1,
    FixedTop = 2,
    FixedUpper = 3,
    FixedMiddle = 4,
    FixedLower = 5,
    FixedBottom = 6,
}

impl VerticalSwing {
    /// Positions where the louver is not moving
    pub fn is_fixed(value: i64) -> bool {
        (0..=6).contains(&value) && value != 1
    }
}

/// A partial desired-state write.
///
/// Only the fields that are set become code/value pairs; everything else is
/// left untouched on the device.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub power: Option<bool>,
    pub mode: Option<Mode>,
    pub target_temp: Option<i64>,
    pub fan_speed: Option<FanSpeed>,
    pub swing: Option<VerticalSwing>,
    pub lights: Option<bool>,
    pub turbo: Option<bool>,
    pub quiet: Option<bool>,
    pub health: Option<bool>,
    pub sleep: Option<bool>,
    pub xfan: Option<bool>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }

    /// Flatten into ordered code/value pairs. Pairing order is what goes on
    /// the wire; the arrays must stay position-aligned.
    pub fn pairs(&self) -> Vec<(String, i64)> {
        let mut pairs: Vec<(String, i64)> = Vec::new();
        let fields: [(&str, Option<i64>); 11] = [
            (POWER, self.power.map(i64::from)),
            (MODE, self.mode.map(|m| m as i64)),
            (TARGET_TEMP, self.target_temp),
            (FAN_SPEED, self.fan_speed.map(|s| s as i64)),
            (SWING_VERTICAL, self.swing.map(|s| s as i64)),
            (LIGHTS, self.lights.map(i64::from)),
            (TURBO, self.turbo.map(i64::from)),
            (QUIET, self.quiet.map(i64::from)),
            (HEALTH, self.health.map(i64::from)),
            (SLEEP, self.sleep.map(i64::from)),
            (XFAN, self.xfan.map(i64::from)),
        ];
        for (code, value) in fields {
            if let Some(value) = value {
                pairs.push((code.to_string(), value));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_carries_set_fields() {
        let patch = StatePatch {
            mode: Some(Mode::Cool),
            ..Default::default()
        };
        assert_eq!(patch.pairs(), vec![("Mod".to_string(), 1)]);
    }

    #[test]
    fn test_patch_pairing_order_is_stable() {
        let patch = StatePatch {
            power: Some(true),
            target_temp: Some(24),
            fan_speed: Some(FanSpeed::High),
            ..Default::default()
        };
        assert_eq!(
            patch.pairs(),
            vec![
                ("Pow".to_string(), 1),
                ("SetTem".to_string(), 24),
                ("WdSpd".to_string(), 5),
            ]
        );
    }

    #[test]
    fn test_empty_patch() {
        assert!(StatePatch::default().is_empty());
    }

    #[test]
    fn test_swing_fixed_positions() {
        assert!(VerticalSwing::is_fixed(0));
        assert!(!VerticalSwing::is_fixed(1));
        assert!(VerticalSwing::is_fixed(4));
        assert!(!VerticalSwing::is_fixed(9));
    }

    #[test]
    fn test_poll_cols_contain_core_codes() {
        for code in [POWER, MODE, TARGET_TEMP, FAN_SPEED, SWING_VERTICAL, ROOM_TEMP] {
            assert!(POLL_COLS.contains(&code));
        }
    }
}
