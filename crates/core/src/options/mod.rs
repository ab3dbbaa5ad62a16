//! Engine options, stored in the key-value text format.
//!
//! Options are read from a defaults file shipped with the engine plus an
//! optional "changes" file holding the user's edits; changes override the
//! defaults key by key. Numeric values are clamped to their documented ranges
//! rather than rejected, so a hand-edited file can never leave the engine in
//! an unusable state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{keyvalue::KeyValueFile, keyvalue::Section, Result};

pub const DEFAULTS_FILENAME: &str = "options-default.txt";
pub const CHANGES_FILENAME: &str = "options-changes.txt";

pub const SECTION_GRAPHICS: &str = "Graphics";
pub const SECTION_AUDIO: &str = "Audio";
pub const SECTION_INPUT: &str = "Input";
pub const SECTION_MISC: &str = "Misc";

pub const MIN_FPS: i32 = 15;
pub const MIN_RESOLUTION_SCALE: f64 = 0.10;
pub const MAX_RESOLUTION_SCALE: f64 = 1.0;
pub const MIN_VERTICAL_FOV: f64 = 40.0;
pub const MAX_VERTICAL_FOV: f64 = 150.0;
pub const MIN_CURSOR_SCALE: f64 = 0.50;
pub const MAX_CURSOR_SCALE: f64 = 8.0;
pub const MIN_LETTERBOX_MODE: i32 = 0;
pub const MAX_LETTERBOX_MODE: i32 = 2;
pub const MIN_RENDER_THREADS_MODE: i32 = 0;
pub const MAX_RENDER_THREADS_MODE: i32 = 3;
pub const MIN_SENSITIVITY: f64 = 0.50;
pub const MAX_SENSITIVITY: f64 = 50.0;
pub const MIN_CAMERA_PITCH_LIMIT: f64 = 0.0;
pub const MAX_CAMERA_PITCH_LIMIT: f64 = 85.0;
pub const MIN_VOLUME: f64 = 0.0;
pub const MAX_VOLUME: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsOptions {
    pub screen_width: i32,
    pub screen_height: i32,
    pub fullscreen: bool,
    pub target_fps: i32,
    pub resolution_scale: f64,
    pub vertical_fov: f64,
    pub letterbox_mode: i32,
    pub cursor_scale: f64,
    pub modern_interface: bool,
    pub render_threads_mode: i32,
}

impl Default for GraphicsOptions {
    fn default() -> Self {
        Self {
            screen_width: 1280,
            screen_height: 720,
            fullscreen: false,
            target_fps: 60,
            resolution_scale: 1.0,
            vertical_fov: 60.0,
            letterbox_mode: 1,
            cursor_scale: 2.0,
            modern_interface: false,
            render_threads_mode: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOptions {
    pub music_volume: f64,
    pub sound_volume: f64,
    /// Path to the MIDI synthesis configuration used for XMI/MID playback.
    pub midi_config: String,
    pub sound_channels: i32,
    pub sound_resampling: i32,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            music_volume: 1.0,
            sound_volume: 1.0,
            midi_config: "data/eawpats/timidity.cfg".to_string(),
            sound_channels: 32,
            sound_resampling: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputOptions {
    pub horizontal_sensitivity: f64,
    pub vertical_sensitivity: f64,
    pub camera_pitch_limit: f64,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            horizontal_sensitivity: 2.5,
            vertical_sensitivity: 2.5,
            camera_pitch_limit: 85.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiscOptions {
    pub arena_path: String,
    pub arena_saves_path: String,
    pub collision: bool,
    pub skip_intro: bool,
    pub show_debug: bool,
    pub show_compass: bool,
    pub time_scale: f64,
}

impl Default for MiscOptions {
    fn default() -> Self {
        Self {
            arena_path: "data/ARENA".to_string(),
            arena_saves_path: String::new(),
            collision: true,
            skip_intro: false,
            show_debug: false,
            show_compass: true,
            time_scale: 1.0,
        }
    }
}

/// The full set of engine options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub graphics: GraphicsOptions,
    pub audio: AudioOptions,
    pub input: InputOptions,
    pub misc: MiscOptions,
}

impl Options {
    /// Loads options from a directory holding the defaults file and, if
    /// present, the changes file.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let changes = dir.join(CHANGES_FILENAME);
        Self::from_files(
            &dir.join(DEFAULTS_FILENAME),
            changes.is_file().then_some(changes.as_path()),
        )
    }

    /// Loads the defaults file, then overlays the changes file if given.
    pub fn from_files(defaults: &Path, changes: Option<&Path>) -> Result<Self> {
        let mut options = Self::default();
        options.apply(&KeyValueFile::open(defaults)?);
        if let Some(changes) = changes {
            options.apply(&KeyValueFile::open(changes)?);
        }
        Ok(options)
    }

    /// Applies every recognized key in the file on top of the current values.
    pub fn apply(&mut self, file: &KeyValueFile) {
        if let Some(section) = file.section(SECTION_GRAPHICS) {
            self.apply_graphics(section);
        }
        if let Some(section) = file.section(SECTION_AUDIO) {
            self.apply_audio(section);
        }
        if let Some(section) = file.section(SECTION_INPUT) {
            self.apply_input(section);
        }
        if let Some(section) = file.section(SECTION_MISC) {
            self.apply_misc(section);
        }
    }

    fn apply_graphics(&mut self, section: &Section) {
        let graphics = &mut self.graphics;
        for (key, _) in section.pairs() {
            match key {
                "ScreenWidth" => set_int(section, key, &mut graphics.screen_width),
                "ScreenHeight" => set_int(section, key, &mut graphics.screen_height),
                "Fullscreen" => set_bool(section, key, &mut graphics.fullscreen),
                "TargetFPS" => {
                    set_int(section, key, &mut graphics.target_fps);
                    graphics.target_fps = clamp_int(key, graphics.target_fps, MIN_FPS, i32::MAX);
                }
                "ResolutionScale" => {
                    set_f64(section, key, &mut graphics.resolution_scale);
                    graphics.resolution_scale = clamp_f64(
                        key,
                        graphics.resolution_scale,
                        MIN_RESOLUTION_SCALE,
                        MAX_RESOLUTION_SCALE,
                    );
                }
                "VerticalFOV" => {
                    set_f64(section, key, &mut graphics.vertical_fov);
                    graphics.vertical_fov =
                        clamp_f64(key, graphics.vertical_fov, MIN_VERTICAL_FOV, MAX_VERTICAL_FOV);
                }
                "LetterboxMode" => {
                    set_int(section, key, &mut graphics.letterbox_mode);
                    graphics.letterbox_mode = clamp_int(
                        key,
                        graphics.letterbox_mode,
                        MIN_LETTERBOX_MODE,
                        MAX_LETTERBOX_MODE,
                    );
                }
                "CursorScale" => {
                    set_f64(section, key, &mut graphics.cursor_scale);
                    graphics.cursor_scale =
                        clamp_f64(key, graphics.cursor_scale, MIN_CURSOR_SCALE, MAX_CURSOR_SCALE);
                }
                "ModernInterface" => set_bool(section, key, &mut graphics.modern_interface),
                "RenderThreadsMode" => {
                    set_int(section, key, &mut graphics.render_threads_mode);
                    graphics.render_threads_mode = clamp_int(
                        key,
                        graphics.render_threads_mode,
                        MIN_RENDER_THREADS_MODE,
                        MAX_RENDER_THREADS_MODE,
                    );
                }
                _ => warn_unknown(SECTION_GRAPHICS, key),
            }
        }
    }

    fn apply_audio(&mut self, section: &Section) {
        let audio = &mut self.audio;
        for (key, _) in section.pairs() {
            match key {
                "MusicVolume" => {
                    set_f64(section, key, &mut audio.music_volume);
                    audio.music_volume =
                        clamp_f64(key, audio.music_volume, MIN_VOLUME, MAX_VOLUME);
                }
                "SoundVolume" => {
                    set_f64(section, key, &mut audio.sound_volume);
                    audio.sound_volume =
                        clamp_f64(key, audio.sound_volume, MIN_VOLUME, MAX_VOLUME);
                }
                "MidiConfig" => set_string(section, key, &mut audio.midi_config),
                "SoundChannels" => set_int(section, key, &mut audio.sound_channels),
                "SoundResampling" => set_int(section, key, &mut audio.sound_resampling),
                _ => warn_unknown(SECTION_AUDIO, key),
            }
        }
    }

    fn apply_input(&mut self, section: &Section) {
        let input = &mut self.input;
        for (key, _) in section.pairs() {
            match key {
                "HorizontalSensitivity" => {
                    set_f64(section, key, &mut input.horizontal_sensitivity);
                    input.horizontal_sensitivity = clamp_f64(
                        key,
                        input.horizontal_sensitivity,
                        MIN_SENSITIVITY,
                        MAX_SENSITIVITY,
                    );
                }
                "VerticalSensitivity" => {
                    set_f64(section, key, &mut input.vertical_sensitivity);
                    input.vertical_sensitivity = clamp_f64(
                        key,
                        input.vertical_sensitivity,
                        MIN_SENSITIVITY,
                        MAX_SENSITIVITY,
                    );
                }
                "CameraPitchLimit" => {
                    set_f64(section, key, &mut input.camera_pitch_limit);
                    input.camera_pitch_limit = clamp_f64(
                        key,
                        input.camera_pitch_limit,
                        MIN_CAMERA_PITCH_LIMIT,
                        MAX_CAMERA_PITCH_LIMIT,
                    );
                }
                _ => warn_unknown(SECTION_INPUT, key),
            }
        }
    }

    fn apply_misc(&mut self, section: &Section) {
        let misc = &mut self.misc;
        for (key, _) in section.pairs() {
            match key {
                "ArenaPath" => set_string(section, key, &mut misc.arena_path),
                "ArenaSavesPath" => set_string(section, key, &mut misc.arena_saves_path),
                "Collision" => set_bool(section, key, &mut misc.collision),
                "SkipIntro" => set_bool(section, key, &mut misc.skip_intro),
                "ShowDebug" => set_bool(section, key, &mut misc.show_debug),
                "ShowCompass" => set_bool(section, key, &mut misc.show_compass),
                "TimeScale" => set_f64(section, key, &mut misc.time_scale),
                _ => warn_unknown(SECTION_MISC, key),
            }
        }
    }
}

fn set_int(section: &Section, key: &str, target: &mut i32) {
    match section.get_int(key) {
        Some(value) => *target = value,
        None => warn_bad_value(key),
    }
}

fn set_f64(section: &Section, key: &str, target: &mut f64) {
    match section.get_f64(key) {
        Some(value) => *target = value,
        None => warn_bad_value(key),
    }
}

fn set_bool(section: &Section, key: &str, target: &mut bool) {
    match section.get_bool(key) {
        Some(value) => *target = value,
        None => warn_bad_value(key),
    }
}

fn set_string(section: &Section, key: &str, target: &mut String) {
    if let Some(value) = section.get(key) {
        *target = value.to_string();
    }
}

fn clamp_int(key: &str, value: i32, min: i32, max: i32) -> i32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(key, value, clamped, "option out of range, clamping");
    }
    clamped
}

fn clamp_f64(key: &str, value: f64, min: f64, max: f64) -> f64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(key, value, clamped, "option out of range, clamping");
    }
    clamped
}

fn warn_unknown(section: &str, key: &str) {
    tracing::warn!(section, key, "unrecognized option key");
}

fn warn_bad_value(key: &str) {
    tracing::warn!(key, "option value has the wrong type, keeping previous");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Options {
        let file = KeyValueFile::parse(text, "test").unwrap();
        let mut options = Options::default();
        options.apply(&file);
        options
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let options = parse("[Graphics]\nScreenWidth=1920\n");
        assert_eq!(options.graphics.screen_width, 1920);
        assert_eq!(
            options.graphics.screen_height,
            GraphicsOptions::default().screen_height
        );
        assert_eq!(options.audio, AudioOptions::default());
    }

    #[test]
    fn numeric_values_are_clamped() {
        let options = parse(
            "[Graphics]\nTargetFPS=1\nResolutionScale=4.0\nVerticalFOV=10.0\n\
             [Audio]\nMusicVolume=1.5\n\
             [Input]\nCameraPitchLimit=200.0\n",
        );
        assert_eq!(options.graphics.target_fps, MIN_FPS);
        assert_eq!(options.graphics.resolution_scale, MAX_RESOLUTION_SCALE);
        assert_eq!(options.graphics.vertical_fov, MIN_VERTICAL_FOV);
        assert_eq!(options.audio.music_volume, MAX_VOLUME);
        assert_eq!(options.input.camera_pitch_limit, MAX_CAMERA_PITCH_LIMIT);
    }

    #[test]
    fn bad_values_keep_previous_setting() {
        let options = parse("[Graphics]\nScreenWidth=wide\nFullscreen=7\n");
        assert_eq!(options.graphics, GraphicsOptions::default());
    }

    #[test]
    fn changes_overlay_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULTS_FILENAME),
            "[Audio]\nMusicVolume=0.8\nSoundChannels=16\n[Misc]\nSkipIntro=False\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(CHANGES_FILENAME),
            "[Misc]\nSkipIntro=True\n",
        )
        .unwrap();

        let options = Options::load(dir.path()).unwrap();
        assert_eq!(options.audio.music_volume, 0.8);
        assert_eq!(options.audio.sound_channels, 16);
        assert!(options.misc.skip_intro);
    }

    #[test]
    fn missing_defaults_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Options::load(dir.path()).is_err());
    }

    #[test]
    fn midi_config_round_trips() {
        let options = parse("[Audio]\nMidiConfig=custom/midi.cfg\n");
        assert_eq!(options.audio.midi_config, "custom/midi.cfg");
    }
}
