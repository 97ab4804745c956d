//! Compiled classification rules.
//!
//! All patterns are compiled once per run from [`MirrorConfig`] and never
//! change afterwards. A malformed pattern is a [`ConfigError`] and stops the
//! run before anything on disk is touched.
//!
//! | Rule | Matched against | Empty config means |
//! |---|---|---|
//! | black list | full path | nothing is black-listed |
//! | white list | file stem | everything passes |
//! | extension lists | file name, case-insensitive | nothing matches |

use crate::config::{ConfigError, MirrorConfig};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct ClassificationRules {
    black_list: Option<Regex>,
    white_list: Option<Regex>,
    compress: Option<Regex>,
    copy: Option<Regex>,
    repair: Option<Regex>,
}

impl ClassificationRules {
    pub fn from_config(config: &MirrorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            black_list: compile_pattern("black_list", &config.black_list)?,
            white_list: compile_pattern("white_list", &config.white_list)?,
            compress: compile_extensions("compress_extensions", &config.compress_extensions)?,
            copy: compile_extensions("copy_extensions", &config.copy_extensions)?,
            repair: compile_extensions("repair_extensions", &config.repair_extensions)?,
        })
    }

    pub fn is_blacklisted(&self, path: &str) -> bool {
        self.black_list.as_ref().is_some_and(|re| re.is_match(path))
    }

    pub fn passes_white_list(&self, stem: &str) -> bool {
        self.white_list.as_ref().is_none_or(|re| re.is_match(stem))
    }

    pub fn is_compressible(&self, file_name: &str) -> bool {
        self.compress.as_ref().is_some_and(|re| re.is_match(file_name))
    }

    pub fn is_copyable(&self, file_name: &str) -> bool {
        self.copy.as_ref().is_some_and(|re| re.is_match(file_name))
    }

    pub fn is_repairable(&self, file_name: &str) -> bool {
        self.repair.as_ref().is_some_and(|re| re.is_match(file_name))
    }
}

fn compile_pattern(field: &'static str, pattern: &str) -> Result<Option<Regex>, ConfigError> {
    if pattern.trim().is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| ConfigError::Pattern { field, source })
}

/// Build `\.(ext1|ext2|…)$`, case-insensitive, from an extension list.
///
/// Entries may be given with or without a leading dot.
fn compile_extensions(
    field: &'static str,
    extensions: &[String],
) -> Result<Option<Regex>, ConfigError> {
    let alternatives: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&format!(r"\.({})$", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|source| ConfigError::Pattern { field, source })
}
