//! Frame number detection and sequence grouping
//!
//! Splits file names into `(prefix, frame, padding, ext)` using a ranked list of
//! patterns, then groups files sharing `(prefix, padding, ext)` into sequences.
//!
//! # Pattern priority
//!
//! 1. 4+ digits before the extension: `plate_0001.exr`, `plate12345.exr`
//! 2. exactly 3 digits: `plate001.exr`
//! 3. exactly 2 digits: `plate01.exr`
//! 4. underscore + digits: `plate_1.exr`
//! 5. dot + digits: `plate.1.exr`
//!
//! A prefix never ends in a digit, so the whole trailing digit run is the frame
//! number. The first pattern that matches wins and the file is never offered to
//! a lower-priority pattern.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use log::trace;
use regex::Regex;

use crate::entities::ImageSequence;

/// One frame-number pattern
pub struct FramePattern {
    pub name: &'static str,
    regex: Regex,
}

/// Ranked patterns, most specific first
pub static FRAME_PATTERNS: LazyLock<Vec<FramePattern>> = LazyLock::new(|| {
    [
        ("padded4", r"^(|.*\D)(\d{4,})(\.[A-Za-z0-9]+)$"),
        ("padded3", r"^(|.*\D)(\d{3})(\.[A-Za-z0-9]+)$"),
        ("padded2", r"^(|.*\D)(\d{2})(\.[A-Za-z0-9]+)$"),
        ("underscore", r"^(.*_)(\d+)(\.[A-Za-z0-9]+)$"),
        ("dot", r"^(.*\.)(\d+)(\.[A-Za-z0-9]+)$"),
    ]
    .into_iter()
    .map(|(name, re)| FramePattern {
        name,
        // Literal patterns, checked by tests
        regex: Regex::new(re).unwrap_or_else(|e| panic!("bad frame pattern {name}: {e}")),
    })
    .collect()
});

/// Result of matching one file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMatch {
    pub prefix: String,
    pub frame: u64,
    pub padding: usize,
    pub extension: String,
    pub pattern: &'static str,
}

/// Grouping key: (prefix, padding, extension)
pub type GroupKey = (String, usize, String);

/// Match a file name against the ranked patterns
///
/// Returns None if no pattern matches or the digit run overflows u64.
pub fn match_frame(file_name: &str) -> Option<FrameMatch> {
    for pattern in FRAME_PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(file_name) else {
            continue;
        };
        let digits = &caps[2];
        // First match is final even if the number can't be represented
        let frame = digits.parse::<u64>().ok()?;
        return Some(FrameMatch {
            prefix: caps[1].to_string(),
            frame,
            padding: digits.len(),
            extension: caps[3].to_string(),
            pattern: pattern.name,
        });
    }
    None
}

/// A listed file with the size recorded at listing time
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
}

/// Files matched so far, grouped by key
#[derive(Debug, Default)]
pub struct SequenceGrouper {
    groups: BTreeMap<GroupKey, Vec<(u64, ListedFile)>>,
    standalone: Vec<ListedFile>,
}

impl SequenceGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign one file to exactly one group (or to the standalone list)
    pub fn push(&mut self, file: ListedFile) {
        match match_frame(&file.name) {
            Some(m) => {
                trace!("{} -> {} frame {} ({})", file.name, m.prefix, m.frame, m.pattern);
                self.groups
                    .entry((m.prefix, m.padding, m.extension))
                    .or_default()
                    .push((m.frame, file));
            }
            None => self.standalone.push(file),
        }
    }

    /// Number of groups plus standalone files
    pub fn len(&self) -> usize {
        self.groups.len() + self.standalone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build sequences group by group
    ///
    /// `keep_going` is polled before each group; when it returns false the
    /// groups built so far are returned. Result is sorted by
    /// (base_name, extension, padding).
    pub fn finish(
        self,
        directory: &Path,
        mut keep_going: impl FnMut() -> bool,
    ) -> Vec<ImageSequence> {
        let mut out = Vec::with_capacity(self.len());

        for ((prefix, padding, extension), mut members) in self.groups {
            if !keep_going() {
                return sorted(out);
            }
            members.sort_by_key(|(frame, _)| *frame);
            let total: u64 = members.iter().map(|(_, f)| f.size).sum();
            let (frames, file_list): (Vec<u64>, Vec<String>) =
                members.into_iter().map(|(frame, f)| (frame, f.name)).unzip();

            let mut seq = ImageSequence::new(
                prefix,
                padding,
                extension,
                frames,
                file_list,
                directory.to_path_buf(),
            );
            seq.total_size_bytes = Some(total);
            out.push(seq);
        }

        for file in self.standalone {
            if !keep_going() {
                return sorted(out);
            }
            let mut seq = ImageSequence::standalone(&file.name, directory.to_path_buf());
            seq.total_size_bytes = Some(file.size);
            out.push(seq);
        }

        sorted(out)
    }
}

fn sorted(mut seqs: Vec<ImageSequence>) -> Vec<ImageSequence> {
    seqs.sort_by(|a, b| {
        a.base_name
            .cmp(&b.base_name)
            .then_with(|| a.extension.cmp(&b.extension))
            .then_with(|| a.padding.cmp(&b.padding))
            .then_with(|| a.frames.first().cmp(&b.frames.first()))
    });
    seqs
}

/// Group a list of file names into sequences (no cancellation, sizes unknown)
pub fn group_files<I, S>(names: I, directory: &Path) -> Vec<ImageSequence>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut grouper = SequenceGrouper::new();
    for name in names {
        grouper.push(ListedFile { name: name.into(), size: 0 });
    }
    grouper.finish(directory, || true)
}
