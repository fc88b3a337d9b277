//! Content equality of files and directory trees, also across providers.

use std::io::{self, Read};
use std::path::Path;

use crate::fs::{FileSystem, is_same_provider};
use crate::spec::{SpecWalkOptions, TreeError};
use crate::visitor::{AccumulatingVisitor, CountingVisitor};
use crate::walk::walk_file_tree;

const N_BUFFER_SIZE: usize = 64 * 1024;

fn is_same_location(
    fs_a: &dyn FileSystem,
    path_a: &Path,
    fs_b: &dyn FileSystem,
    path_b: &Path,
) -> bool {
    is_same_provider(fs_a, fs_b) && path_a == path_b
}

fn exists(fs: &dyn FileSystem, path: &Path) -> Result<bool, TreeError> {
    fs.try_exists(path).map_err(|e| TreeError::io(path, e))
}

/// Fill `buf` as far as the reader allows; a short count means end of input.
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut n_filled = 0;
    while n_filled < buf.len() {
        match reader.read(&mut buf[n_filled..]) {
            Ok(0) => break,
            Ok(n) => n_filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n_filled)
}

fn stream_equals(
    fs_a: &dyn FileSystem,
    path_a: &Path,
    fs_b: &dyn FileSystem,
    path_b: &Path,
) -> Result<bool, TreeError> {
    let mut reader_a = fs_a.open_read(path_a).map_err(|e| TreeError::io(path_a, e))?;
    let mut reader_b = fs_b.open_read(path_b).map_err(|e| TreeError::io(path_b, e))?;
    let mut buf_a = vec![0u8; N_BUFFER_SIZE];
    let mut buf_b = vec![0u8; N_BUFFER_SIZE];
    loop {
        let n_a = read_chunk(&mut reader_a, &mut buf_a).map_err(|e| TreeError::io(path_a, e))?;
        let n_b = read_chunk(&mut reader_b, &mut buf_b).map_err(|e| TreeError::io(path_b, e))?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Whether two files hold the same bytes.
///
/// Two absent (`None`) or two nonexistent paths are equal; one of them alone
/// is not. A directory on either side fails with
/// [`TreeError::IsADirectory`]. Links are followed.
pub fn file_content_equals(
    fs_a: &dyn FileSystem,
    path_a: Option<&Path>,
    fs_b: &dyn FileSystem,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    let (path_a, path_b) = match (path_a, path_b) {
        (None, None) => return Ok(true),
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(false),
    };
    match (exists(fs_a, path_a)?, exists(fs_b, path_b)?) {
        (false, false) => return Ok(true),
        (true, true) => {}
        _ => return Ok(false),
    }

    let attrs_a = fs_a.metadata(path_a).map_err(|e| TreeError::io(path_a, e))?;
    if attrs_a.is_dir() {
        return Err(TreeError::IsADirectory {
            path: path_a.to_path_buf(),
        });
    }
    let attrs_b = fs_b.metadata(path_b).map_err(|e| TreeError::io(path_b, e))?;
    if attrs_b.is_dir() {
        return Err(TreeError::IsADirectory {
            path: path_b.to_path_buf(),
        });
    }

    if is_same_location(fs_a, path_a, fs_b, path_b) {
        return Ok(true);
    }
    if attrs_a.len != attrs_b.len {
        return Ok(false);
    }
    stream_equals(fs_a, path_a, fs_b, path_b)
}

////////////////////////////////////////////////////////////////////////////////
// #region DirectoryEquality

fn is_broken_link(fs: &dyn FileSystem, path: &Path) -> bool {
    fs.symlink_metadata(path).is_ok_and(|attrs| attrs.is_symlink())
        && fs
            .metadata(path)
            .is_err_and(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Compare two leaf entries found at the same relative location.
fn leaf_equals(
    fs_a: &dyn FileSystem,
    path_a: &Path,
    fs_b: &dyn FileSystem,
    path_b: &Path,
) -> Result<bool, TreeError> {
    match (is_broken_link(fs_a, path_a), is_broken_link(fs_b, path_b)) {
        (true, true) => {
            let path_target_a = fs_a.read_link(path_a).map_err(|e| TreeError::io(path_a, e))?;
            let path_target_b = fs_b.read_link(path_b).map_err(|e| TreeError::io(path_b, e))?;
            return Ok(path_target_a == path_target_b);
        }
        (false, false) => {}
        _ => return Ok(false),
    }

    let attrs_a = fs_a.metadata(path_a).map_err(|e| TreeError::io(path_a, e))?;
    let attrs_b = fs_b.metadata(path_b).map_err(|e| TreeError::io(path_b, e))?;
    if attrs_a.kind != attrs_b.kind {
        return Ok(false);
    }
    // Special files have no comparable content.
    if attrs_a.is_other() {
        return Ok(true);
    }
    file_content_equals(fs_a, Some(path_a), fs_b, Some(path_b))
}

fn accumulate(
    fs: &dyn FileSystem,
    path_root: &Path,
) -> Result<AccumulatingVisitor<'static>, TreeError> {
    let spec_walk = SpecWalkOptions {
        if_follow_links: true,
        ..SpecWalkOptions::default()
    };
    let mut visitor = AccumulatingVisitor::new(CountingVisitor::default());
    walk_file_tree(fs, path_root, &spec_walk, &mut visitor)?;
    Ok(visitor)
}

fn tree_equals(
    fs_a: &dyn FileSystem,
    path_a: Option<&Path>,
    fs_b: &dyn FileSystem,
    path_b: Option<&Path>,
    if_compare_content: bool,
) -> Result<bool, TreeError> {
    let (path_a, path_b) = match (path_a, path_b) {
        (None, None) => return Ok(true),
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(false),
    };
    match (exists(fs_a, path_a)?, exists(fs_b, path_b)?) {
        (false, false) => return Ok(true),
        (true, true) => {}
        _ => return Ok(false),
    }
    for (fs, path) in [(fs_a, path_a), (fs_b, path_b)] {
        let attrs = fs.metadata(path).map_err(|e| TreeError::io(path, e))?;
        if !attrs.is_dir() {
            return Err(TreeError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
    }
    if is_same_location(fs_a, path_a, fs_b, path_b) {
        return Ok(true);
    }

    let visitor_a = accumulate(fs_a, path_a)?;
    let visitor_b = accumulate(fs_b, path_b)?;
    let (counters_a, counters_b) = (visitor_a.path_counters(), visitor_b.path_counters());
    if counters_a.directory_counter() != counters_b.directory_counter()
        || counters_a.file_counter() != counters_b.file_counter()
    {
        return Ok(false);
    }
    if visitor_a.relativize_directories(path_a, true)
        != visitor_b.relativize_directories(path_b, true)
    {
        return Ok(false);
    }
    let l_files_a = visitor_a.relativize_files(path_a, true);
    let l_files_b = visitor_b.relativize_files(path_b, true);
    if l_files_a != l_files_b {
        return Ok(false);
    }
    if !if_compare_content {
        return Ok(true);
    }

    for path_rel in &l_files_a {
        let path_file_a = path_a.join(path_rel);
        let path_file_b = path_b.join(path_rel);
        if !leaf_equals(fs_a, &path_file_a, fs_b, &path_file_b)? {
            tracing::trace!(path = %path_rel.display(), "content differs");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether two directory trees hold the same relative directories and files
/// (names and structure only).
///
/// Nonexistence is handled as in [`file_content_equals`]; an existing root
/// that is not a directory fails with [`TreeError::NotADirectory`]. Links are
/// followed, and a link cycle fails with [`TreeError::SymlinkCycle`].
pub fn directory_content_equals(
    fs_a: &dyn FileSystem,
    path_a: Option<&Path>,
    fs_b: &dyn FileSystem,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    tree_equals(fs_a, path_a, fs_b, path_b, false)
}

/// Like [`directory_content_equals`], and every file pair holds the same
/// bytes. Broken links compare by their link text.
pub fn directory_and_file_content_equals(
    fs_a: &dyn FileSystem,
    path_a: Option<&Path>,
    fs_b: &dyn FileSystem,
    path_b: Option<&Path>,
) -> Result<bool, TreeError> {
    tree_equals(fs_a, path_a, fs_b, path_b, true)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::Path;

    use proptest::prelude::*;

    use super::{directory_and_file_content_equals, directory_content_equals, file_content_equals};
    use crate::fs::FileSystem;
    use crate::memory::MemoryFs;
    use crate::spec::TreeError;

    fn sample_tree(fs_mem: &MemoryFs, path_root: &str) {
        let path_root = Path::new(path_root);
        fs_mem.write(&path_root.join("a/1.txt"), b"one").expect("write");
        fs_mem.write(&path_root.join("b/2.txt"), b"two").expect("write");
        fs_mem.create_dir_all(&path_root.join("empty")).expect("mkdir");
    }

    #[test]
    fn file_equality_edge_cases() {
        let fs_mem = MemoryFs::new();
        fs_mem.write(Path::new("/x.txt"), b"abc").expect("write");
        fs_mem.write(Path::new("/y.txt"), b"abc").expect("write");
        fs_mem.write(Path::new("/z.txt"), b"abd").expect("write");

        let cmp = |a: Option<&str>, b: Option<&str>| {
            file_content_equals(&fs_mem, a.map(Path::new), &fs_mem, b.map(Path::new))
        };
        assert!(cmp(None, None).expect("cmp"));
        assert!(!cmp(Some("/x.txt"), None).expect("cmp"));
        assert!(cmp(Some("/nope"), Some("/gone")).expect("cmp"));
        assert!(!cmp(Some("/x.txt"), Some("/gone")).expect("cmp"));
        assert!(cmp(Some("/x.txt"), Some("/y.txt")).expect("cmp"));
        assert!(!cmp(Some("/x.txt"), Some("/z.txt")).expect("cmp"));

        let err = cmp(Some("/"), Some("/x.txt")).expect_err("directory");
        assert!(matches!(err, TreeError::IsADirectory { .. }));
    }

    #[test]
    fn trees_equal_across_providers() {
        let fs_a = MemoryFs::new();
        let fs_b = MemoryFs::new();
        sample_tree(&fs_a, "/left");
        sample_tree(&fs_b, "/right/nested");

        let path_a = Some(Path::new("/left"));
        let path_b = Some(Path::new("/right/nested"));
        assert!(directory_content_equals(&fs_a, path_a, &fs_b, path_b).expect("cmp"));
        assert!(directory_and_file_content_equals(&fs_a, path_a, &fs_b, path_b).expect("cmp"));

        fs_b.write(Path::new("/right/nested/a/1.txt"), b"ONE").expect("write");
        assert!(directory_content_equals(&fs_a, path_a, &fs_b, path_b).expect("cmp"));
        assert!(!directory_and_file_content_equals(&fs_a, path_a, &fs_b, path_b).expect("cmp"));

        fs_b.create_dir_all(Path::new("/right/nested/extra")).expect("mkdir");
        assert!(!directory_content_equals(&fs_a, path_a, &fs_b, path_b).expect("cmp"));
    }

    #[test]
    fn tree_equality_root_checks() {
        let fs_mem = MemoryFs::new();
        sample_tree(&fs_mem, "/t");

        assert!(directory_content_equals(&fs_mem, None, &fs_mem, None).expect("cmp"));
        let path_t = Some(Path::new("/t"));
        assert!(!directory_content_equals(&fs_mem, path_t, &fs_mem, None).expect("cmp"));
        let (path_no, path_ne) = (Some(Path::new("/no")), Some(Path::new("/ne")));
        assert!(directory_content_equals(&fs_mem, path_no, &fs_mem, path_ne).expect("cmp"));
        let err = directory_content_equals(
            &fs_mem,
            Some(Path::new("/t/a/1.txt")),
            &fs_mem,
            Some(Path::new("/t")),
        )
        .expect_err("file root");
        assert!(matches!(err, TreeError::NotADirectory { .. }));
    }

    #[test]
    fn broken_links_compare_by_target_text() {
        let fs_a = MemoryFs::new();
        let fs_b = MemoryFs::new();
        sample_tree(&fs_a, "/t");
        sample_tree(&fs_b, "/t");
        fs_a.symlink(Path::new("/missing"), Path::new("/t/dangling"), false)
            .expect("symlink");
        fs_b.symlink(Path::new("/missing"), Path::new("/t/dangling"), false)
            .expect("symlink");

        let path_t = Some(Path::new("/t"));
        assert!(directory_and_file_content_equals(&fs_a, path_t, &fs_b, path_t).expect("cmp"));

        fs_b.remove_file(Path::new("/t/dangling")).expect("rm");
        fs_b.symlink(Path::new("/elsewhere"), Path::new("/t/dangling"), false)
            .expect("symlink");
        assert!(!directory_and_file_content_equals(&fs_a, path_t, &fs_b, path_t).expect("cmp"));
    }

    #[test]
    fn link_cycle_is_reported() {
        let fs_mem = MemoryFs::new();
        sample_tree(&fs_mem, "/t");
        fs_mem
            .symlink(Path::new("/t"), Path::new("/t/a/loop"), true)
            .expect("symlink");
        let other = MemoryFs::new();
        sample_tree(&other, "/t");

        let path_t = Some(Path::new("/t"));
        let err = directory_content_equals(&fs_mem, path_t, &other, path_t).expect_err("cycle");
        assert!(err.is_symlink_cycle());
    }

    proptest! {
        #[test]
        fn file_equality_is_symmetric(
            data_a in proptest::collection::vec(any::<u8>(), 0..256),
            data_b in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let fs_a = MemoryFs::new();
            let fs_b = MemoryFs::new();
            fs_a.write(Path::new("/f"), &data_a).expect("write");
            fs_b.write(Path::new("/f"), &data_b).expect("write");
            let path_f = Some(Path::new("/f"));

            let b_ab = file_content_equals(&fs_a, path_f, &fs_b, path_f).expect("cmp");
            let b_ba = file_content_equals(&fs_b, path_f, &fs_a, path_f).expect("cmp");
            prop_assert_eq!(b_ab, b_ba);
            prop_assert_eq!(b_ab, data_a == data_b);
            prop_assert!(file_content_equals(&fs_a, path_f, &fs_a, path_f).expect("cmp"));
        }
    }
}
