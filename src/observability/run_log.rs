//! 実行ごとのマイルストーンを JSON Lines で記録する。
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{FixedOffset, Utc};
use serde::Serialize;
use serde_json::Value;

/// パイプラインのマイルストーン。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEvent {
    PipelineStart,
    ConfigLoaded,
    Normalized,
    Deduplicated,
    Classified,
    Selected,
    Summarized,
    OutputWritten,
    PipelineComplete,
    PipelineError,
}

#[derive(Serialize)]
struct LogLine<'a> {
    ts: String,
    event: RunEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

/// `run_log.jsonl` への追記ロガー。
#[derive(Debug, Clone)]
pub struct RunLogger {
    path: PathBuf,
    offset: FixedOffset,
}

impl RunLogger {
    /// 親ディレクトリを作成し、前回の実行ログを空にする。
    ///
    /// # Errors
    /// ディレクトリやファイルを作成できない場合は I/O エラーを返す。
    pub fn create(path: impl Into<PathBuf>, offset: FixedOffset) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        Ok(Self { path, offset })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// イベントを1行追記する。
    ///
    /// # Errors
    /// 書き込みに失敗した場合は I/O エラーを返す。
    pub fn log(&self, event: RunEvent, data: Option<&Value>) -> io::Result<()> {
        let line = LogLine {
            ts: Utc::now().with_timezone(&self.offset).to_rfc3339(),
            event,
            data,
        };
        let mut encoded = serde_json::to_string(&line).map_err(io::Error::other)?;
        encoded.push('\n');

        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        file.write_all(encoded.as_bytes())
    }
}
