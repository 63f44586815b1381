use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::format::ratio_line;

/// Which decision the predictor is trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Fast streak tap: tap right away or leave the decision for later.
    FastStreakTap,
    /// The pressed tap-hold key is released after the second key went down.
    PthUpAfterSecondDown,
    /// The pressed tap-hold key is released after the second key went up.
    PthUpAfterSecondUp,
    /// A third key is pressed while the tap-hold key is still down.
    ThirdDown,
    /// Predicts how long two keys must overlap to count as a hold.
    OverlapMsForHold,
}

impl Mode {
    pub fn all() -> [Mode; 5] {
        [
            Mode::FastStreakTap,
            Mode::PthUpAfterSecondDown,
            Mode::PthUpAfterSecondUp,
            Mode::ThirdDown,
            Mode::OverlapMsForHold,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::FastStreakTap => "fast_streak_tap",
            Mode::PthUpAfterSecondDown => "pth_up_after_second_down",
            Mode::PthUpAfterSecondUp => "pth_up_after_second_up",
            Mode::ThirdDown => "third_down",
            Mode::OverlapMsForHold => "overlap_ms_for_hold",
        }
    }

    /// The only mode whose output is a duration instead of a hold confidence.
    pub fn is_overlap_estimation(&self) -> bool {
        matches!(self, Mode::OverlapMsForHold)
    }

    /// Name of the firmware function a compiled predictor for this mode implements.
    pub fn prediction_function_name(&self) -> String {
        let mode = self
            .as_str()
            .replace("_up", "_release")
            .replace("_down", "_press");

        match self {
            Mode::PthUpAfterSecondDown | Mode::PthUpAfterSecondUp | Mode::ThirdDown => {
                format!("pth_default_get_hold_prediction_when_{}", mode)
            }
            Mode::FastStreakTap | Mode::OverlapMsForHold => {
                format!("pth_default_get_{}_prediction", mode)
            }
        }
    }

    /// Recall threshold for holds below which the imbalance penalty kicks in.
    pub fn default_min_positive_recall(&self) -> f64 {
        match self {
            Mode::FastStreakTap => 0.998,
            _ => 0.0,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::PthUpAfterSecondDown
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns of a training row. The discriminant is the column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrainCol {
    IsMod = 0,
    KeyReleasedBeforePthIsMod,
    KeyReleaseBeforePthToPthPressDur,
    PthPressToSecondPressDur,
    SecondPressTime,
    SecondReleaseTime,
    PthReleaseTime,
    OptNextDur,
    OptThDownNextUpDur,
    ThirdPressTime,
    PthSecondPressToThirdPressDur,
    PthPrevPrevPressToPrevPressDur,
    PthPrevPressToPthPressDur,
    PthPrevPrevOverlapDur,
    PthPrevOverlapDur,
    DownCount,
    PthPressToPressWAvg,
    PthOverlapWAvg,
}

impl TrainCol {
    pub const COUNT: usize = 18;

    pub const ALL: [TrainCol; TrainCol::COUNT] = [
        TrainCol::IsMod,
        TrainCol::KeyReleasedBeforePthIsMod,
        TrainCol::KeyReleaseBeforePthToPthPressDur,
        TrainCol::PthPressToSecondPressDur,
        TrainCol::SecondPressTime,
        TrainCol::SecondReleaseTime,
        TrainCol::PthReleaseTime,
        TrainCol::OptNextDur,
        TrainCol::OptThDownNextUpDur,
        TrainCol::ThirdPressTime,
        TrainCol::PthSecondPressToThirdPressDur,
        TrainCol::PthPrevPrevPressToPrevPressDur,
        TrainCol::PthPrevPressToPthPressDur,
        TrainCol::PthPrevPrevOverlapDur,
        TrainCol::PthPrevOverlapDur,
        TrainCol::DownCount,
        TrainCol::PthPressToPressWAvg,
        TrainCol::PthOverlapWAvg,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<TrainCol> {
        Self::ALL.get(index).copied()
    }

    /// Lower snake case name, as used in formulas and generated C code.
    pub fn name(self) -> &'static str {
        match self {
            TrainCol::IsMod => "is_mod",
            TrainCol::KeyReleasedBeforePthIsMod => "key_released_before_pth_is_mod",
            TrainCol::KeyReleaseBeforePthToPthPressDur => "key_release_before_pth_to_pth_press_dur",
            TrainCol::PthPressToSecondPressDur => "pth_press_to_second_press_dur",
            TrainCol::SecondPressTime => "second_press_time",
            TrainCol::SecondReleaseTime => "second_release_time",
            TrainCol::PthReleaseTime => "pth_release_time",
            TrainCol::OptNextDur => "opt_next_dur",
            TrainCol::OptThDownNextUpDur => "opt_th_down_next_up_dur",
            TrainCol::ThirdPressTime => "third_press_time",
            TrainCol::PthSecondPressToThirdPressDur => "pth_second_press_to_third_press_dur",
            TrainCol::PthPrevPrevPressToPrevPressDur => "pth_prev_prev_press_to_prev_press_dur",
            TrainCol::PthPrevPressToPthPressDur => "pth_prev_press_to_pth_press_dur",
            TrainCol::PthPrevPrevOverlapDur => "pth_prev_prev_overlap_dur",
            TrainCol::PthPrevOverlapDur => "pth_prev_overlap_dur",
            TrainCol::DownCount => "down_count",
            TrainCol::PthPressToPressWAvg => "pth_press_to_press_w_avg",
            TrainCol::PthOverlapWAvg => "pth_overlap_w_avg",
        }
    }

    pub fn from_name(name: &str) -> Option<TrainCol> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Whether a predictor for `mode` may read this column.
    pub fn may_use_in(self, mode: Mode) -> bool {
        match self {
            // label and raw timestamps are never inputs
            TrainCol::IsMod
            | TrainCol::SecondPressTime
            | TrainCol::SecondReleaseTime
            | TrainCol::PthReleaseTime
            | TrainCol::ThirdPressTime => false,
            TrainCol::PthPressToSecondPressDur => mode != Mode::FastStreakTap,
            // the next key may not have been released yet in THIRD_DOWN
            TrainCol::OptNextDur | TrainCol::OptThDownNextUpDur => {
                matches!(mode, Mode::PthUpAfterSecondUp | Mode::ThirdDown)
            }
            TrainCol::PthSecondPressToThirdPressDur => mode == Mode::ThirdDown,
            _ => true,
        }
    }

    pub fn is_duration(self) -> bool {
        matches!(
            self,
            TrainCol::KeyReleaseBeforePthToPthPressDur
                | TrainCol::PthPressToSecondPressDur
                | TrainCol::OptNextDur
                | TrainCol::OptThDownNextUpDur
                | TrainCol::PthSecondPressToThirdPressDur
                | TrainCol::PthPrevPrevPressToPrevPressDur
                | TrainCol::PthPrevPressToPthPressDur
                | TrainCol::PthPrevPrevOverlapDur
                | TrainCol::PthPrevOverlapDur
                | TrainCol::PthPressToPressWAvg
                | TrainCol::PthOverlapWAvg
        )
    }

    /// Generated (weighted average) columns. These are the only naturally
    /// fractional values; every other duration is a whole number of ms.
    pub fn is_fractional(self) -> bool {
        matches!(self, TrainCol::PthPressToPressWAvg | TrainCol::PthOverlapWAvg)
    }

    /// Columns a predictor for `mode` may read, in column order.
    pub fn enabled_for(mode: Mode) -> Vec<TrainCol> {
        Self::ALL.iter().copied().filter(|c| c.may_use_in(mode)).collect()
    }
}

impl fmt::Display for TrainCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type FeatureVector = [f64; TrainCol::COUNT];

/// Builds a row from `(column, value)` pairs, every other column is 0.
pub fn feature_vector(values: &[(TrainCol, f64)]) -> FeatureVector {
    let mut row = [0.0; TrainCol::COUNT];
    for (col, value) in values {
        row[col.index()] = *value;
    }
    row
}

pub fn is_mod(row: &[f64]) -> bool {
    row[TrainCol::IsMod.index()] > 0.0
}

/// Correctness counts per class. Holds ("mods") are the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub mods: usize,
    pub non_mods: usize,
    pub mods_correct: usize,
    pub non_mods_correct: usize,
}

impl ClassCounts {
    pub fn record(&mut self, is_mod: bool, correct: bool) {
        if is_mod {
            self.mods += 1;
            if correct {
                self.mods_correct += 1;
            }
        } else {
            self.non_mods += 1;
            if correct {
                self.non_mods_correct += 1;
            }
        }
    }

    pub fn merge(mut self, other: ClassCounts) -> ClassCounts {
        self.mods += other.mods;
        self.non_mods += other.non_mods;
        self.mods_correct += other.mods_correct;
        self.non_mods_correct += other.non_mods_correct;
        self
    }

    pub fn total(&self) -> usize {
        self.mods + self.non_mods
    }

    pub fn total_correct(&self) -> usize {
        self.mods_correct + self.non_mods_correct
    }

    /// Recall of the hold class; `None` without any hold samples.
    pub fn mod_recall(&self) -> Option<f64> {
        if self.mods == 0 {
            None
        } else {
            Some(self.mods_correct as f64 / self.mods as f64)
        }
    }
}

impl fmt::Display for ClassCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mod:              {}", ratio_line(self.mods_correct, self.mods))?;
        writeln!(f, "Non-mod:          {}", ratio_line(self.non_mods_correct, self.non_mods))?;
        write!(f, "Total:            {}", ratio_line(self.total_correct(), self.total()))
    }
}
