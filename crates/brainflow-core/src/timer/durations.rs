use serde::{Deserialize, Serialize};

/// Configured interval lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub work: u32,
    #[serde(default = "default_short_break")]
    pub short_break: u32,
}

/// Names the field carried by a duration change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationField {
    Work,
    ShortBreak,
}

fn default_short_break() -> u32 {
    5 * 60
}

impl Durations {
    pub fn new(work: u32, short_break: u32) -> Self {
        Self { work, short_break }
    }

    pub fn get(&self, field: DurationField) -> u32 {
        match field {
            DurationField::Work => self.work,
            DurationField::ShortBreak => self.short_break,
        }
    }

    /// Copy with one field replaced.
    pub fn with(mut self, field: DurationField, secs: u32) -> Self {
        match field {
            DurationField::Work => self.work = secs,
            DurationField::ShortBreak => self.short_break = secs,
        }
        self
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            work: 25 * 60,
            short_break: default_short_break(),
        }
    }
}

impl DurationField {
    pub fn key(&self) -> &'static str {
        match self {
            DurationField::Work => "work",
            DurationField::ShortBreak => "short_break",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_classic_pomodoro() {
        let d = Durations::default();
        assert_eq!(d.work, 1500);
        assert_eq!(d.short_break, 300);
    }

    #[test]
    fn with_replaces_only_named_field() {
        let d = Durations::new(1500, 300).with(DurationField::Work, 600);
        assert_eq!(d, Durations::new(600, 300));
        assert_eq!(d.get(DurationField::ShortBreak), 300);
    }

    #[test]
    fn short_break_defaults_when_missing() {
        let d: Durations = serde_json::from_str(r#"{"work": 900}"#).unwrap();
        assert_eq!(d.short_break, 300);
    }
}
