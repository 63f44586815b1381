use crate::error::{Result, TapholdError};
use crate::types::{FeatureVector, Mode, TrainCol};

/// Durations are clamped to this many ms before prediction (matches the firmware).
pub const MS_MAX_DUR_FOR_PREDICTION: f64 = 4_096.0;

/// One recorded key event sequence, before feature derivation.
///
/// Times are absolute ms timestamps. The field order is the order of the
/// recorded columns, see [`RawEvent::from_fields`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawEvent {
    pub is_mod: f64,
    pub second_is_mod: f64,
    pub key_pressed_before_pth_is_mod: f64,
    pub key_pressed_before_pth_release_time: f64,
    pub key_released_before_pth_is_mod: f64,
    pub key_released_before_pth_release_time: f64,
    pub pth_press_time: f64,
    pub second_press_time: f64,
    pub second_release_time: f64,
    pub pth_release_time: f64,
    pub third_press_time: f64,
    pub pth_prev_prev_press_to_prev_press_dur: f64,
    pub pth_prev_press_to_pth_press_dur: f64,
    pub pth_prev_prev_overlap_dur: f64,
    pub pth_prev_overlap_dur: f64,
    pub down_count: f64,
}

impl RawEvent {
    pub const FIELD_COUNT: usize = 16;

    pub fn from_fields(parts: &[f64]) -> Result<Self> {
        if parts.len() != Self::FIELD_COUNT {
            return Err(TapholdError::InvalidEvent(format!(
                "needs {} fields, got {}",
                Self::FIELD_COUNT,
                parts.len()
            )));
        }
        Ok(Self {
            is_mod: parts[0],
            second_is_mod: parts[1],
            key_pressed_before_pth_is_mod: parts[2],
            key_pressed_before_pth_release_time: parts[3],
            key_released_before_pth_is_mod: parts[4],
            key_released_before_pth_release_time: parts[5],
            pth_press_time: parts[6],
            second_press_time: parts[7],
            second_release_time: parts[8],
            pth_release_time: parts[9],
            third_press_time: parts[10],
            pth_prev_prev_press_to_prev_press_dur: parts[11],
            pth_prev_press_to_pth_press_dur: parts[12],
            pth_prev_prev_overlap_dur: parts[13],
            pth_prev_overlap_dur: parts[14],
            down_count: parts[15],
        })
    }
}

/// Weighted average of the two most recent values, weights `e^0` and `e^1`
/// normalised. A negative older value (no such event) is ignored.
pub fn e_exp_weighted_avg(older: f64, newer: f64) -> f64 {
    if older < 0.0 {
        return newer;
    }
    0.2689414213699951 * older + 0.7310585786300049 * newer
}

/// Turns raw events into training rows for one mode.
pub struct FeatureEngineer {
    mode: Mode,
}

impl FeatureEngineer {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    pub fn derive(&self, raw: &RawEvent) -> FeatureVector {
        let mut row = [0.0; TrainCol::COUNT];
        let mut set = |col: TrainCol, v: f64| row[col.index()] = v;

        set(TrainCol::IsMod, raw.is_mod);
        set(TrainCol::KeyReleasedBeforePthIsMod, raw.key_released_before_pth_is_mod);
        set(
            TrainCol::KeyReleaseBeforePthToPthPressDur,
            raw.pth_press_time - raw.key_released_before_pth_release_time,
        );
        set(
            TrainCol::PthPressToSecondPressDur,
            raw.second_press_time - raw.pth_press_time,
        );
        set(TrainCol::SecondPressTime, raw.second_press_time);
        set(TrainCol::SecondReleaseTime, raw.second_release_time);
        set(TrainCol::PthReleaseTime, raw.pth_release_time);
        set(TrainCol::ThirdPressTime, raw.third_press_time);

        // the next key's release is only known if it happened before the decision point
        let decision_time = if self.mode == Mode::ThirdDown {
            raw.third_press_time
        } else {
            raw.pth_release_time
        };
        if decision_time < raw.second_release_time {
            set(TrainCol::OptNextDur, -1.0);
            set(TrainCol::OptThDownNextUpDur, -1.0);
        } else {
            set(TrainCol::OptNextDur, raw.second_release_time - raw.second_press_time);
            set(TrainCol::OptThDownNextUpDur, raw.second_release_time - raw.pth_press_time);
        }

        set(
            TrainCol::PthSecondPressToThirdPressDur,
            raw.third_press_time - raw.second_press_time,
        );
        set(
            TrainCol::PthPrevPrevPressToPrevPressDur,
            raw.pth_prev_prev_press_to_prev_press_dur,
        );
        set(TrainCol::PthPrevPressToPthPressDur, raw.pth_prev_press_to_pth_press_dur);
        set(TrainCol::PthPrevPrevOverlapDur, raw.pth_prev_prev_overlap_dur);
        set(TrainCol::PthPrevOverlapDur, raw.pth_prev_overlap_dur);
        set(TrainCol::DownCount, raw.down_count);

        for col in TrainCol::ALL {
            if col.is_duration() {
                let v = &mut row[col.index()];
                *v = v.clamp(-MS_MAX_DUR_FOR_PREDICTION, MS_MAX_DUR_FOR_PREDICTION);
            }
        }

        // averages use the clamped inputs
        row[TrainCol::PthPressToPressWAvg.index()] = e_exp_weighted_avg(
            row[TrainCol::PthPrevPrevPressToPrevPressDur.index()],
            row[TrainCol::PthPrevPressToPthPressDur.index()],
        );
        row[TrainCol::PthOverlapWAvg.index()] = e_exp_weighted_avg(
            row[TrainCol::PthPrevPrevOverlapDur.index()],
            row[TrainCol::PthPrevOverlapDur.index()],
        );

        row
    }

    /// Whether a derived row belongs to the event situation of this mode.
    pub fn accepts(&self, row: &FeatureVector) -> bool {
        let second_release = row[TrainCol::SecondReleaseTime.index()];
        let pth_release = row[TrainCol::PthReleaseTime.index()];
        let third_press = row[TrainCol::ThirdPressTime.index()];

        match self.mode {
            Mode::PthUpAfterSecondDown => second_release >= pth_release && pth_release < third_press,
            Mode::PthUpAfterSecondUp => second_release <= pth_release && pth_release < third_press,
            Mode::ThirdDown => third_press < pth_release,
            Mode::FastStreakTap | Mode::OverlapMsForHold => true,
        }
    }

    /// Derives and filters in one pass.
    pub fn derive_all<'a, I>(&self, events: I) -> Vec<FeatureVector>
    where
        I: IntoIterator<Item = &'a RawEvent>,
    {
        events
            .into_iter()
            .map(|e| self.derive(e))
            .filter(|row| self.accepts(row))
            .collect()
    }
}
