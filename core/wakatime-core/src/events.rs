//! Editor events as the host adapter reports them.
//!
//! One JSON object per line, tagged by `event`:
//!
//! ```json
//! {"event":"save","file":"/src/main.go","lines":120,"lineno":4,"cursorpos":8}
//! {"event":"build_end"}
//! ```

use serde::Deserialize;

use crate::engine::ActivityInput;
use crate::error::{Result, TrackerError};
use crate::heartbeat::{LineStats, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    Save(EditorActivity),
    Edit(EditorActivity),
    MouseClick(EditorActivity),
    Scroll(EditorActivity),
    CaretMove(EditorActivity),
    BuildStart(EditorActivity),
    BuildEnd,
}

/// What the editor knows about the file being touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EditorActivity {
    pub file: String,
    #[serde(default)]
    pub time: Option<Timestamp>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub lines: Option<u32>,
    #[serde(default)]
    pub lineno: Option<u32>,
    #[serde(default)]
    pub cursorpos: Option<u32>,
    #[serde(default)]
    pub is_unsaved: Option<bool>,
}

impl EditorActivity {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn into_input(self, is_write: bool) -> ActivityInput {
        ActivityInput {
            entity: self.file,
            time: self.time,
            is_write,
            is_building: None,
            is_unsaved_entity: self.is_unsaved,
            line_stats: LineStats::from_parts(self.lines, self.lineno, self.cursorpos),
            project: self.project,
            language: self.language,
        }
    }
}

impl EditorEvent {
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(TrackerError::InvalidEvent)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, EditorEvent::Save(_))
    }

    pub fn activity(&self) -> Option<&EditorActivity> {
        match self {
            EditorEvent::Save(activity)
            | EditorEvent::Edit(activity)
            | EditorEvent::MouseClick(activity)
            | EditorEvent::Scroll(activity)
            | EditorEvent::CaretMove(activity)
            | EditorEvent::BuildStart(activity) => Some(activity),
            EditorEvent::BuildEnd => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_save_with_line_stats() {
        let event = EditorEvent::parse_line(
            r#"{"event":"save","file":"/src/a.go","time":"1700000000.5","lines":10,"lineno":2,"cursorpos":3}"#,
        )
        .unwrap();

        assert!(event.is_write());
        let input = match event {
            EditorEvent::Save(activity) => activity.into_input(true),
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(input.entity, "/src/a.go");
        assert_eq!(input.time.map(|t| t.to_string()).as_deref(), Some("1700000000.5000"));
        assert_eq!(
            input.line_stats,
            Some(LineStats {
                line_count: 10,
                line_number: 2,
                cursor_position: 3,
            })
        );
    }

    #[test]
    fn partial_line_stats_are_dropped() {
        let event =
            EditorEvent::parse_line(r#"{"event":"caret_move","file":"/a.rs","lines":10}"#).unwrap();
        let input = event.activity().cloned().unwrap().into_input(false);
        assert_eq!(input.line_stats, None);
    }

    #[test]
    fn build_end_has_no_file() {
        let event = EditorEvent::parse_line(r#"{"event":"build_end"}"#).unwrap();
        assert_eq!(event, EditorEvent::BuildEnd);
        assert!(event.activity().is_none());
    }

    #[test]
    fn numeric_time_is_accepted() {
        let event =
            EditorEvent::parse_line(r#"{"event":"edit","file":"/a.rs","time":1700000000.25}"#)
                .unwrap();
        let time = event.activity().and_then(|activity| activity.time);
        assert_eq!(time.map(|t| t.to_string()).as_deref(), Some("1700000000.2500"));
    }

    #[test]
    fn unknown_event_is_an_error() {
        let err = EditorEvent::parse_line(r#"{"event":"focus","file":"/a.rs"}"#).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidEvent(_)));
    }
}
