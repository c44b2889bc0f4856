use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error as ThisError;

use crate::model::store::StoreError;

pub const HELP_TEXT: &str = "\
 q         Quit
 j/k, ↑/↓  Move row
 h/l, ←/→  Move column
 g/G       First / last row
 s         Sort by current column (again to toggle)
 Enter     Reset counter (on the actions column)
 r         Reset selected counter
 /         Focus the filter
 Tab       Filter by name / by context
 u, F5     Reload counters
 c / C     Copy cell / row
 ?         This help
 Esc       Close popup, leave filter";

#[derive(Debug, ThisError)]
pub enum CTVError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    DecodeError(#[from] serde_json::Error),
    #[error("server responded {status}: {message}")]
    Http { status: u16, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("request was cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct CTVConfig {
    /// Base of the controller api, e.g. `http://localhost:8080/nifi-api`.
    #[setters(into)]
    pub base_url: String,
    #[setters(strip_option, into)]
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Forces the privileged role instead of asking the server.
    #[setters(strip_option)]
    pub privileged: Option<bool>,
    pub log_file: PathBuf,
}

impl Default for CTVConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/nifi-api".to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
            event_poll_time: 100,
            max_column_width: 60,
            privileged: None,
            log_file: PathBuf::from("ctv.log"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Sort,
    Enter,
    Reset,
    Reload,
    FocusFilter,
    ToggleFilterField,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
