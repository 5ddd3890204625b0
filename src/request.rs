use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Field, ValidationError};
use crate::fit_mode::FitMode;
use crate::fstools::{classify_file, ensure_writable_dir, normalize, DirEntryCategory};
use crate::job::BatchJob;
use crate::media_kind::MediaKind;
use crate::profile::{DeviceProfile, Resolution, MAX_DIMENSION};

pub const MIN_GAIN_DB: f64 = -20.0;
pub const MAX_GAIN_DB: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OptionSet {
    Audio { gain_db: f64 },
    Video { target: Resolution, fit: FitMode },
}

impl OptionSet {
    pub fn kind(&self) -> MediaKind {
        match self {
            OptionSet::Audio { .. } => MediaKind::Audio,
            OptionSet::Video { .. } => MediaKind::Video,
        }
    }
}

/// One input file and everything needed to convert it.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: OptionSet,
    pub overwrite: bool,
}

impl ConversionRequest {
    pub fn new(input: PathBuf, output_dir: &Path, options: OptionSet, overwrite: bool) -> Self {
        let output = output_path(&input, output_dir, options.kind());
        ConversionRequest {
            input,
            output,
            options,
            overwrite,
        }
    }
}

/// Audio keeps only the stem (`song.mp3` -> `song.wav`); video keeps the whole
/// file name so that `clip.mp4` and `clip.mkv` land on different outputs
/// (`clip.mp4.avi`).
pub fn output_path(input: &Path, output_dir: &Path, kind: MediaKind) -> PathBuf {
    let name = match kind {
        MediaKind::Audio => input.file_stem(),
        MediaKind::Video => input.file_name(),
    };
    let name = name
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("output"));
    output_dir.join(format!("{}.{}", name, MediaKind::extension(kind)))
}

/// Raw front-end state, before any of it has been checked.
#[derive(Clone, Debug)]
pub struct Selection {
    pub files: Vec<PathBuf>,
    pub kind: String,
    pub output_dir: Option<PathBuf>,
    pub gain_db: f64,
    pub profile: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: String,
    pub overwrite: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            files: vec![],
            kind: String::from("audio"),
            output_dir: None,
            gain_db: 0.0,
            profile: DeviceProfile::default().to_string(),
            width: None,
            height: None,
            fit: FitMode::default().to_string(),
            overwrite: false,
        }
    }
}

/// Validates `selection` as a whole and turns it into a batch. Either every
/// file becomes a request or the first problem is returned.
pub fn build_batch(selection: &Selection) -> Result<BatchJob, ValidationError> {
    let kind = MediaKind::from_str(&selection.kind)
        .ok_or_else(|| ValidationError::for_field(Field::Kind, "expected \"audio\" or \"video\""))?;
    let options = build_options(selection, kind)?;

    let output_dir = match &selection.output_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
        _ => return Err(ValidationError::for_field(Field::OutputDir, "choose an output folder")),
    };

    if selection.files.is_empty() {
        return Err(ValidationError::for_field(Field::Files, &format!("add at least one {} file", kind)));
    }

    let mut seen = HashSet::new();
    let mut outputs: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut requests = vec![];
    for file in &selection.files {
        if !seen.insert(normalize(file)) {
            log::debug!("ignoring duplicate selection {:?}", file);
            continue;
        }
        match classify_file(file) {
            DirEntryCategory::RegularFile => (),
            DirEntryCategory::DoesNotExist => return Err(ValidationError::for_file(file, "does not exist")),
            DirEntryCategory::Directory => return Err(ValidationError::for_file(file, "is a directory")),
            DirEntryCategory::Unknown => return Err(ValidationError::for_file(file, "is not a regular file")),
        }
        if !kind.accepts(file) {
            return Err(ValidationError::for_file(file, &format!("is not a supported {} file", kind)));
        }

        let request = ConversionRequest::new(file.clone(), &output_dir, options, selection.overwrite);
        if normalize(&request.output) == normalize(file) {
            return Err(ValidationError::for_file(file, "would be overwritten by its own output"));
        }
        if let Some(other) = outputs.insert(normalize(&request.output), file.clone()) {
            return Err(ValidationError::for_file(
                file,
                &format!("would overwrite the output of {:?}", other),
            ));
        }
        requests.push(request);
    }

    ensure_writable_dir(&output_dir).map_err(|err| {
        ValidationError::for_field(Field::OutputDir, &format!("{:?} is not writable ({})", output_dir, err))
    })?;

    Ok(BatchJob::new(requests))
}

fn build_options(selection: &Selection, kind: MediaKind) -> Result<OptionSet, ValidationError> {
    match kind {
        MediaKind::Audio => {
            let gain_db = selection.gain_db;
            if !gain_db.is_finite() || !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
                return Err(ValidationError::for_field(
                    Field::Gain,
                    &format!("must be between {} and {} dB", MIN_GAIN_DB, MAX_GAIN_DB),
                ));
            }
            Ok(OptionSet::Audio { gain_db })
        },
        MediaKind::Video => {
            let profile = DeviceProfile::from_str(&selection.profile)
                .ok_or_else(|| ValidationError::for_field(Field::Profile, "expected full, map or player"))?;
            let fit = FitMode::from_str(&selection.fit)
                .ok_or_else(|| ValidationError::for_field(Field::Fit, "expected contain, cover or stretch"))?;
            let base = DeviceProfile::resolution(profile);
            let target = Resolution {
                width: even_dimension(selection.width.unwrap_or(base.width), Field::Width)?,
                height: even_dimension(selection.height.unwrap_or(base.height), Field::Height)?,
            };
            Ok(OptionSet::Video { target, fit })
        },
    }
}

// msrle/pal8 output wants even sizes; odd values round down
fn even_dimension(value: u32, field: Field) -> Result<u32, ValidationError> {
    if value > MAX_DIMENSION {
        return Err(ValidationError::for_field(field, &format!("must be at most {}", MAX_DIMENSION)));
    }
    match value - value % 2 {
        0 => Err(ValidationError::for_field(field, "must be at least 2")),
        even => Ok(even),
    }
}
