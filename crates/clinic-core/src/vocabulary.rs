//! 处方用药的受控词表
//!
//! 频次、疗程、服药时机均为临床可识别的固定字符串，序列化时保持原文。

use crate::error::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// 词表中的全部取值，按界面展示顺序排列
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ClinicError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        ClinicError::Validation(format!(
                            "unknown {} value: {}",
                            stringify!($name),
                            s
                        ))
                    })
            }
        }
    };
}

vocabulary! {
    /// 用药频次
    Frequency {
        OnceDaily => "Once daily",
        TwiceDaily => "Twice daily",
        ThreeTimesDaily => "Three times daily",
        FourTimesDaily => "Four times daily",
        AsNeeded => "As needed",
        Every8Hours => "Every 8 hours",
        Every12Hours => "Every 12 hours",
        BeforeMeals => "Before meals",
        AfterMeals => "After meals",
        AtBedtime => "At bedtime",
        MorningOnly => "Morning only",
        NightOnly => "Night only",
    }
}

vocabulary! {
    /// 疗程
    CourseDuration {
        OneDay => "1 day",
        TwoDays => "2 days",
        ThreeDays => "3 days",
        FiveDays => "5 days",
        SevenDays => "7 days",
        TenDays => "10 days",
        FourteenDays => "14 days",
        TwentyOneDays => "21 days",
        ThirtyDays => "30 days",
        SixtyDays => "60 days",
        NinetyDays => "90 days",
        Ongoing => "Ongoing",
    }
}

vocabulary! {
    /// 服药时机（相对进食）
    FoodTiming {
        BeforeFood => "Before food",
        AfterFood => "After food",
        WithFood => "With food",
        EmptyStomach => "Empty stomach",
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::TwiceDaily
    }
}

impl Default for CourseDuration {
    fn default() -> Self {
        CourseDuration::FiveDays
    }
}

impl Default for FoodTiming {
    fn default() -> Self {
        FoodTiming::AfterFood
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("twice DAILY".parse::<Frequency>().unwrap(), Frequency::TwiceDaily);
        assert_eq!(" Ongoing ".parse::<CourseDuration>().unwrap(), CourseDuration::Ongoing);
        assert!("fortnightly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_serde_uses_clinical_text() {
        let json = serde_json::to_string(&FoodTiming::AfterFood).unwrap();
        assert_eq!(json, "\"After food\"");

        let parsed: CourseDuration = serde_json::from_str("\"14 days\"").unwrap();
        assert_eq!(parsed, CourseDuration::FourteenDays);
    }
}
