//! On-disk naming conventions for the working directory.
//!
//! `requests_<suffix>.jsonl` and `responses_<suffix>.jsonl` pair up via the
//! substring after the first underscore in their basename; the mapping is
//! total and bijective within a working directory.

use std::path::{Path, PathBuf};

pub fn request_file_name(index: usize) -> String {
    format!("requests_{index}.jsonl")
}

/// Extracts the `<suffix>` shared between a `requests_<suffix>.jsonl` and its
/// paired `responses_<suffix>.jsonl`.
pub fn suffix_of(path: &Path) -> Option<String> {
    let name = path.file_stem()?.to_str()?;
    let (_, suffix) = name.split_once('_')?;
    Some(suffix.to_string())
}

pub fn response_path_for(working_dir: &Path, request_file: &Path) -> Option<PathBuf> {
    let suffix = suffix_of(request_file)?;
    Some(working_dir.join(format!("responses_{suffix}.jsonl")))
}

pub fn request_path_for(working_dir: &Path, response_file: &Path) -> Option<PathBuf> {
    let suffix = suffix_of(response_file)?;
    Some(working_dir.join(format!("requests_{suffix}.jsonl")))
}

/// The journal suffix for a given credential: its last 4 characters, so
/// multiple provider accounts can share one working directory without their
/// journals colliding.
pub fn credential_suffix(api_key: &str) -> String {
    let len = api_key.len();
    if len <= 4 {
        api_key.to_string()
    } else {
        api_key[len - 4..].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_round_trips_between_requests_and_responses() {
        let req = PathBuf::from("/work/requests_7.jsonl");
        let resp = response_path_for(Path::new("/work"), &req).unwrap();
        assert_eq!(resp, PathBuf::from("/work/responses_7.jsonl"));
        assert_eq!(
            request_path_for(Path::new("/work"), &resp).unwrap(),
            req
        );
    }

    #[test]
    fn credential_suffix_takes_last_four_chars() {
        assert_eq!(credential_suffix("sk-abcdWXYZ"), "WXYZ");
        assert_eq!(credential_suffix("abc"), "abc");
    }
}
