//! Configuration loading and parsing.
//!
//! Parses `quill.toml` (or an override path provided by the binary). Every
//! section is optional; absent sections fall back to serde defaults, so an
//! empty or missing file yields a fully usable [`Config`]. Unknown fields are
//! ignored (TOML deserialization tolerance) to allow forward evolution
//! without immediate warnings.
//!
//! Loading never fails the application: an unreadable file means defaults,
//! and a file that does not parse means defaults plus a warning. The chord
//! strings under `[keybindings]` are carried verbatim; validation happens at
//! the point of installation, where unknown action ids and unparsable chords
//! are skipped with a warning.

use anyhow::Result;
use core_options::TextDirection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct EditorSection {
    /// Seed direction for newly opened editors.
    #[serde(default)]
    pub text_direction: TextDirection,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySection {
    #[serde(default = "TelemetrySection::default_enabled")]
    pub enabled: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

impl TelemetrySection {
    const fn default_enabled() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub editor: EditorSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    /// Action id to chord string, registered at `User` weight.
    #[serde(default)]
    pub keybindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed (or default) data.
    pub file: ConfigFile,
    /// Path the configuration was actually read from, when one was.
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn default_text_direction(&self) -> TextDirection {
        self.file.editor.text_direction
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.file.telemetry.enabled
    }

    pub fn user_keybindings(&self) -> &BTreeMap<String, String> {
        &self.file.keybindings
    }
}

/// Best-effort config path following platform conventions (XDG / AppData
/// Roaming). A `quill.toml` in the working directory wins over the platform
/// config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("quill.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("quill").join("quill.toml");
    }
    // Final fallback relative filename.
    PathBuf::from("quill.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                file,
                source: Some(path),
            }),
            Err(error) => {
                warn!(
                    target: "config",
                    path = %path.display(),
                    %error,
                    "config_parse_failed_using_defaults"
                );
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.default_text_direction(), TextDirection::Ltr);
        assert!(cfg.telemetry_enabled());
        assert!(cfg.user_keybindings().is_empty());
        assert!(cfg.source.is_none());
    }

    #[test]
    fn parses_editor_text_direction() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\ntext_direction = \"rtl\"\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.default_text_direction(), TextDirection::Rtl);
        assert_eq!(cfg.source.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn parses_telemetry_toggle() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[telemetry]\nenabled = false\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(!cfg.telemetry_enabled());
        // Sections not present keep their defaults.
        assert_eq!(cfg.default_text_direction(), TextDirection::Ltr);
    }

    #[test]
    fn parses_keybinding_overrides_verbatim() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[keybindings]\ntoggle_text_direction = \"ctrl+alt+d\"\nquit = \"ctrl+shift+q\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let bindings = cfg.user_keybindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings.get("toggle_text_direction").map(String::as_str),
            Some("ctrl+alt+d")
        );
        assert_eq!(bindings.get("quit").map(String::as_str), Some("ctrl+shift+q"));
    }

    #[test]
    fn invalid_direction_string_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor]\ntext_direction = \"sideways\"\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.default_text_direction(), TextDirection::Ltr);
        assert!(cfg.source.is_none(), "a rejected file is not a source");
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[editor]\ntext_direction = \"rtl\"\nfuture_knob = 3\n\n[future_section]\nx = 1\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.default_text_direction(), TextDirection::Rtl);
    }

    #[test]
    fn parse_failure_warns_with_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "this is not [valid toml\n").unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(tmp.path().to_path_buf())).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed_using_defaults"));
        assert_eq!(cfg.default_text_direction(), TextDirection::Ltr);
        assert!(cfg.telemetry_enabled());
    }
}
