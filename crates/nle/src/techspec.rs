//! Translation of human technical-spec labels into Resolve project settings.
//! 將技術規格標籤轉換為 Resolve 專案設定。

use nexus_project::TechnicalSpec;

use crate::bridge::{BridgeError, ProjectRef, ResolveBridge};

const RESOLUTIONS: &[(&str, u32, u32)] = &[
    ("4K UHD (3840×2160)", 3840, 2160),
    ("2K DCI (2048×1080)", 2048, 1080),
    ("FHD (1920×1080)", 1920, 1080),
    ("HD (1280×720)", 1280, 720),
    ("Vertical (1080×1920)", 1080, 1920),
];

/// Label → (colorScienceMode, colorSpaceTimeline).
const COLORSPACES: &[(&str, &str, &str)] = &[
    (
        "DaVinci Wide Gamut",
        "davinciYRGBColorManagedv2",
        "DaVinci WG/Intermediate",
    ),
    ("Rec. 709", "davinciYRGB", "Rec.709 Gamma 2.4"),
    ("Rec. 2020", "davinciYRGB", "Rec.2020"),
    ("S-Gamut3.Cine", "davinciYRGB", "S-Gamut3.Cine/S-Log3"),
    ("ARRI Wide Gamut 4", "davinciYRGB", "ARRI LogC4/LogC4"),
    ("P3-D65", "davinciYRGB", "P3-D65/ST.2084"),
];

const SAMPLE_RATES: &[(&str, u32)] = &[("48 kHz", 48000), ("44.1 kHz", 44100), ("96 kHz", 96000)];

/// A single project setting key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingPair {
    pub key: &'static str,
    pub value: String,
}

impl SettingPair {
    fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Settings derived from a spec, plus labels that had no mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub pairs: Vec<SettingPair>,
    pub unrecognized: Vec<String>,
}

/// Maps spec labels to setting pairs without touching any application.
/// 純函式：將規格標籤對應為設定值。
///
/// Empty labels are skipped silently; unknown labels are reported so the
/// caller can surface them.
pub fn resolve_settings(spec: &TechnicalSpec) -> ResolvedSettings {
    let mut resolved = ResolvedSettings::default();

    let resolution = spec.resolution.trim();
    if !resolution.is_empty() {
        match RESOLUTIONS.iter().find(|(label, ..)| *label == resolution) {
            Some((_, width, height)) => {
                resolved
                    .pairs
                    .push(SettingPair::new("timelineResolutionWidth", width.to_string()));
                resolved
                    .pairs
                    .push(SettingPair::new("timelineResolutionHeight", height.to_string()));
            }
            None => resolved.unrecognized.push(resolution.to_string()),
        }
    }

    let fps = spec.fps.trim();
    if !fps.is_empty() {
        resolved.pairs.push(SettingPair::new("timelineFrameRate", fps));
    }

    let colorspace = spec.colorspace.trim();
    if !colorspace.is_empty() {
        match COLORSPACES.iter().find(|(label, ..)| *label == colorspace) {
            Some((_, science, timeline)) => {
                resolved
                    .pairs
                    .push(SettingPair::new("colorScienceMode", *science));
                resolved
                    .pairs
                    .push(SettingPair::new("colorSpaceTimeline", *timeline));
            }
            None => resolved.unrecognized.push(colorspace.to_string()),
        }
    }

    let samplerate = spec.samplerate.trim();
    if !samplerate.is_empty() {
        match SAMPLE_RATES.iter().find(|(label, _)| *label == samplerate) {
            Some((_, rate)) => resolved
                .pairs
                .push(SettingPair::new("timelineAudioSampleRate", rate.to_string())),
            None => resolved.unrecognized.push(samplerate.to_string()),
        }
    }

    resolved
}

/// Per-key result of applying settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingOutcome {
    pub key: &'static str,
    pub value: String,
    pub error: Option<BridgeError>,
}

/// What happened to every derived setting.
/// 每項設定的套用結果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsReport {
    pub outcomes: Vec<SettingOutcome>,
    pub unrecognized: Vec<String>,
}

impl SettingsReport {
    pub fn failures(&self) -> impl Iterator<Item = &SettingOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }

    /// Every label mapped and every key accepted.
    pub fn is_complete(&self) -> bool {
        self.unrecognized.is_empty() && self.failures().next().is_none()
    }
}

/// Applies the derived settings one key at a time. A refused key is logged and
/// recorded, never fatal.
pub fn apply_settings<B: ResolveBridge + ?Sized>(
    bridge: &mut B,
    project: ProjectRef,
    spec: &TechnicalSpec,
) -> SettingsReport {
    let resolved = resolve_settings(spec);
    for label in &resolved.unrecognized {
        log::warn!("no project setting known for '{label}'");
    }
    let outcomes = resolved
        .pairs
        .into_iter()
        .map(|pair| {
            let error = bridge.set_setting(project, pair.key, &pair.value).err();
            if let Some(err) = &error {
                log::warn!("setting {}={} not applied: {err}", pair.key, pair.value);
            }
            SettingOutcome {
                key: pair.key,
                value: pair.value,
                error,
            }
        })
        .collect();
    SettingsReport {
        outcomes,
        unrecognized: resolved.unrecognized,
    }
}
