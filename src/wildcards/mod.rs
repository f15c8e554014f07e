//! Wildcard resolver for `${…}` tokens in commands and paths.
//!
//! The resolver is total: unknown tokens are left unchanged and lookup
//! failures substitute the empty string. All time-based tokens are derived
//! from a single instant sampled once per call.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{Datelike, Local};
use regex::Regex;

use crate::domain::Metadata;

static METADATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{METADATA_([^}]+)\}").expect("valid metadata regex"));

/// Substitute all recognized `${…}` tokens in `input`.
///
/// `encoder` is the resolved encoder binary path for `${FFMPEG}`; it is
/// passed explicitly rather than read from shared state.
pub fn resolve(
    input: &str,
    input_file: &str,
    output_file: &str,
    source: &str,
    metadata: Option<&Metadata>,
    encoder: &str,
) -> String {
    let now = Local::now();

    let mut out = input.to_string();

    out = out.replace("${INPUT_FILE}", &format!("\"{}\"", input_file));
    out = out.replace("${OUTPUT_FILE}", &format!("\"{}\"", output_file));

    out = out.replace("${INPUT_FILE_BASE}", &file_base(input_file));
    out = out.replace("${OUTPUT_FILE_BASE}", &file_base(output_file));
    out = out.replace("${INPUT_FILE_EXTENSION}", &file_extension(input_file));
    out = out.replace("${OUTPUT_FILE_EXTENSION}", &file_extension(output_file));
    out = out.replace("${INPUT_FILE_BASENAME}", &file_basename(input_file));
    out = out.replace("${OUTPUT_FILE_BASENAME}", &file_basename(output_file));
    out = out.replace("${INPUT_FILE_DIR}", &file_dir(input_file));
    out = out.replace("${OUTPUT_FILE_DIR}", &file_dir(output_file));

    out = out.replace("${DATE_YEAR}", &now.format("%Y").to_string());
    out = out.replace("${DATE_SHORTYEAR}", &now.format("%y").to_string());
    out = out.replace("${DATE_MONTH}", &now.format("%m").to_string());
    out = out.replace("${DATE_DAY}", &now.format("%d").to_string());
    out = out.replace("${DATE_WEEK}", &now.iso_week().week().to_string());

    out = out.replace("${TIME_HOUR}", &now.format("%H").to_string());
    out = out.replace("${TIME_MINUTE}", &now.format("%M").to_string());
    out = out.replace("${TIME_SECOND}", &now.format("%S").to_string());

    out = out.replace("${TIMESTAMP_SECONDS}", &now.timestamp().to_string());
    out = out.replace(
        "${TIMESTAMP_MILLISECONDS}",
        &now.timestamp_millis().to_string(),
    );
    out = out.replace(
        "${TIMESTAMP_MICROSECONDS}",
        &now.timestamp_micros().to_string(),
    );
    out = out.replace(
        "${TIMESTAMP_NANOSECONDS}",
        &now.timestamp_nanos_opt().unwrap_or_default().to_string(),
    );

    out = out.replace("${OS_NAME}", std::env::consts::OS);
    out = out.replace("${OS_ARCH}", std::env::consts::ARCH);

    out = out.replace("${SOURCE}", source);
    out = out.replace("${FFMPEG}", encoder);

    // A fresh uuid per occurrence.
    while let Some(pos) = out.find("${UUID}") {
        out.replace_range(pos..pos + "${UUID}".len(), &uuid::Uuid::new_v4().to_string());
    }

    if let Some(metadata) = metadata {
        out = METADATA_RE
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                lookup_metadata(metadata, &caps[1])
            })
            .into_owned();
    }

    out
}

/// File name component, e.g. `/x/y/movie.mp4` -> `movie.mp4`.
fn file_base(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension including the leading dot, e.g. `movie.mp4` -> `.mp4`.
fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// File name without its extension, e.g. `/x/y/movie.mp4` -> `movie`.
fn file_basename(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parent directory, `.` for bare file names.
fn file_dir(path: &str) -> String {
    match Path::new(path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}

/// Resolve a dotted metadata path with integer array indices.
///
/// Scalars render bare, composites render as JSON, missing paths render
/// empty.
fn lookup_metadata(metadata: &Metadata, path: &str) -> String {
    let mut current: &serde_json::Value = &serde_json::Value::Null;
    let mut first = true;

    for segment in path.split('.') {
        let next = if first {
            first = false;
            metadata.get(segment)
        } else if let Ok(index) = segment.parse::<usize>() {
            current.as_array().and_then(|a| a.get(index))
        } else {
            current.as_object().and_then(|o| o.get(segment))
        };
        match next {
            Some(v) => current = v,
            None => return String::new(),
        }
    }

    render_value(current)
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}
