use std::path::{Path, PathBuf};

use crate::batch::config::OutputNaming;

/// Compute the output path for the `image_index`-th embedded image (0-based)
/// of `input_path`, per `<outDir or inputDir>/<prefix><stem><_NN if
/// multi-image><postfix><ext or inputExt>`. `image_count` is the total
/// number of embedded images in the target; when 1, no numeric suffix is
/// appended.
pub fn output_path(input_path: &Path, naming: &OutputNaming, image_index: usize, image_count: usize) -> PathBuf {
    let stem = input_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = input_path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let dir = naming
        .out_dir
        .clone()
        .unwrap_or_else(|| input_path.parent().map(Path::to_path_buf).unwrap_or_default());

    let suffix = if image_count > 1 {
        format!("_{:02}", image_index + 1)
    } else {
        String::new()
    };

    let file_name = if ext.is_empty() {
        format!("{}{}{}{}", naming.prefix, stem, suffix, naming.postfix)
    } else {
        format!("{}{}{}{}.{}", naming.prefix, stem, suffix, naming.postfix, ext)
    };

    dir.join(file_name)
}

/// Resolve a unique path given a path-exists predicate: return `candidate`
/// unchanged if it doesn't exist or `overwrite` is set, otherwise append
/// `_<u>` (u >= 1) until a free name is found.
pub fn resolve_unique(candidate: PathBuf, overwrite: bool, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if overwrite || !exists(&candidate) {
        return candidate;
    }

    let stem = candidate.file_stem().and_then(|s| s.to_str()).unwrap_or("output").to_string();
    let ext = candidate.extension().and_then(|s| s.to_str()).map(str::to_string);
    let dir = candidate.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut u = 1usize;
    loop {
        let name = match &ext {
            Some(e) => format!("{stem}_{u}.{e}"),
            None => format!("{stem}_{u}"),
        };
        let candidate = dir.join(name);
        if !exists(&candidate) {
            return candidate;
        }
        u += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_image_gets_no_numeric_suffix() {
        let naming = OutputNaming::default();
        let path = output_path(Path::new("/data/frame.fits"), &naming, 0, 1);
        assert_eq!(path, PathBuf::from("/data/frame_c.fits"));
    }

    #[test]
    fn multi_image_targets_get_a_numeric_suffix_starting_at_01() {
        let naming = OutputNaming::default();
        let first = output_path(Path::new("/data/frame.fits"), &naming, 0, 3);
        let second = output_path(Path::new("/data/frame.fits"), &naming, 1, 3);
        assert_eq!(first, PathBuf::from("/data/frame_01_c.fits"));
        assert_eq!(second, PathBuf::from("/data/frame_02_c.fits"));
    }

    #[test]
    fn resolve_unique_appends_incrementing_suffix_until_free() {
        let taken = ["/data/frame_c.fits", "/data/frame_c_1.fits"];
        let resolved = resolve_unique(PathBuf::from("/data/frame_c.fits"), false, |p| {
            taken.contains(&p.to_str().unwrap())
        });
        assert_eq!(resolved, PathBuf::from("/data/frame_c_2.fits"));
    }

    #[test]
    fn overwrite_skips_uniqueness_resolution() {
        let resolved = resolve_unique(PathBuf::from("/data/frame_c.fits"), true, |_| true);
        assert_eq!(resolved, PathBuf::from("/data/frame_c.fits"));
    }
}
