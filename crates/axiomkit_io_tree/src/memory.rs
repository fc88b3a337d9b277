//! In-memory [`FileSystem`].
//!
//! Paths are interpreted as absolute (`/a/b`); relative paths resolve from
//! the root. Symbolic links are resolved in every intermediate component and,
//! for the following calls, in the last one. Read-only entries refuse to be
//! removed or rewritten, so write-protection handling can be exercised
//! regardless of the privileges of the running process.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::ffi::{OsStr, OsString};
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::fs::{EnumEntryKind, FileKey, FileSystem, SpecEntryAttributes};

const N_SYMLINK_HOPS_MAX: usize = 40;
const N_NODE_ROOT: usize = 0;

static N_DEVICE_NEXT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum MemoryNodeKind {
    Directory(BTreeMap<OsString, usize>),
    File(Vec<u8>),
    Symlink(PathBuf),
}

#[derive(Debug)]
struct MemoryNode {
    kind: MemoryNodeKind,
    if_read_only: bool,
    modified: SystemTime,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            if_read_only: false,
            modified: SystemTime::now(),
        }
    }
}

#[derive(Debug)]
enum EnumResolveStep {
    Root,
    Parent,
    Name(OsString),
}

#[derive(Debug)]
struct MemoryTree {
    l_nodes: Vec<Option<MemoryNode>>,
}

/// Filesystem kept entirely in process memory.
#[derive(Debug)]
pub struct MemoryFs {
    n_device: u64,
    tree: RefCell<MemoryTree>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn error_not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("No such file or directory: {}", path.display()),
    )
}

fn error_kind(kind: io::ErrorKind, message: &str, path: &Path) -> io::Error {
    io::Error::new(kind, format!("{message}: {}", path.display()))
}

fn derive_steps(path: &Path) -> VecDeque<EnumResolveStep> {
    let mut l_steps = VecDeque::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::CurDir => {}
            Component::RootDir => l_steps.push_back(EnumResolveStep::Root),
            Component::ParentDir => l_steps.push_back(EnumResolveStep::Parent),
            Component::Normal(name) => l_steps.push_back(EnumResolveStep::Name(name.to_owned())),
        }
    }
    l_steps
}

impl MemoryTree {
    fn node(&self, n_node: usize, path: &Path) -> io::Result<&MemoryNode> {
        self.l_nodes
            .get(n_node)
            .and_then(Option::as_ref)
            .ok_or_else(|| error_not_found(path))
    }

    fn node_mut(&mut self, n_node: usize, path: &Path) -> io::Result<&mut MemoryNode> {
        self.l_nodes
            .get_mut(n_node)
            .and_then(Option::as_mut)
            .ok_or_else(|| error_not_found(path))
    }

    fn children(&self, n_node: usize, path: &Path) -> io::Result<&BTreeMap<OsString, usize>> {
        match &self.node(n_node, path)?.kind {
            MemoryNodeKind::Directory(dict_children) => Ok(dict_children),
            _ => Err(error_kind(io::ErrorKind::NotADirectory, "Not a directory", path)),
        }
    }

    fn children_mut(
        &mut self,
        n_node: usize,
        path: &Path,
    ) -> io::Result<&mut BTreeMap<OsString, usize>> {
        match &mut self.node_mut(n_node, path)?.kind {
            MemoryNodeKind::Directory(dict_children) => Ok(dict_children),
            _ => Err(error_kind(io::ErrorKind::NotADirectory, "Not a directory", path)),
        }
    }

    /// Walk `path` component by component; returns the (node, name) chain
    /// from the root to the resolved entry.
    fn resolve(&self, path: &Path, if_follow_last: bool) -> io::Result<Vec<(usize, OsString)>> {
        let mut l_stack = vec![(N_NODE_ROOT, OsString::new())];
        let mut l_pending = derive_steps(path);
        let mut n_hops = 0;

        while let Some(step) = l_pending.pop_front() {
            match step {
                EnumResolveStep::Root => l_stack.truncate(1),
                EnumResolveStep::Parent => {
                    if l_stack.len() > 1 {
                        l_stack.pop();
                    }
                }
                EnumResolveStep::Name(name) => {
                    let n_parent = l_stack.last().map_or(N_NODE_ROOT, |(n, _)| *n);
                    let n_child = *self
                        .children(n_parent, path)?
                        .get(&name)
                        .ok_or_else(|| error_not_found(path))?;
                    let b_is_last = l_pending.is_empty();

                    if let MemoryNodeKind::Symlink(path_target) = &self.node(n_child, path)?.kind
                        && (!b_is_last || if_follow_last)
                    {
                        n_hops += 1;
                        if n_hops > N_SYMLINK_HOPS_MAX {
                            return Err(io::Error::other(format!(
                                "Too many levels of symbolic links: {}",
                                path.display()
                            )));
                        }
                        for step_target in derive_steps(path_target).into_iter().rev() {
                            l_pending.push_front(step_target);
                        }
                        continue;
                    }
                    l_stack.push((n_child, name));
                }
            }
        }
        Ok(l_stack)
    }

    fn resolve_node(&self, path: &Path, if_follow_last: bool) -> io::Result<usize> {
        let l_stack = self.resolve(path, if_follow_last)?;
        Ok(l_stack.last().map_or(N_NODE_ROOT, |(n, _)| *n))
    }

    /// Directory that holds the last component of `path`, plus that name.
    fn resolve_parent(&self, path: &Path) -> io::Result<(usize, OsString)> {
        let name = path
            .file_name()
            .ok_or_else(|| error_kind(io::ErrorKind::InvalidInput, "No file name", path))?;
        let path_parent = path.parent().unwrap_or(Path::new("/"));
        let n_parent = self.resolve_node(path_parent, true)?;
        self.children(n_parent, path)?;
        Ok((n_parent, name.to_owned()))
    }

    fn insert(
        &mut self,
        n_parent: usize,
        name: OsString,
        node: MemoryNode,
        path: &Path,
    ) -> io::Result<usize> {
        let n_node = self.l_nodes.len();
        self.l_nodes.push(Some(node));
        self.children_mut(n_parent, path)?.insert(name, n_node);
        if let Ok(node_parent) = self.node_mut(n_parent, path) {
            node_parent.modified = SystemTime::now();
        }
        Ok(n_node)
    }

    fn detach(&mut self, n_parent: usize, name: &OsStr, path: &Path) -> io::Result<()> {
        let n_node = self
            .children_mut(n_parent, path)?
            .remove(name)
            .ok_or_else(|| error_not_found(path))?;
        if let Some(slot) = self.l_nodes.get_mut(n_node) {
            *slot = None;
        }
        Ok(())
    }
}

impl MemoryFs {
    /// Empty filesystem holding only the root directory.
    pub fn new() -> Self {
        Self {
            n_device: N_DEVICE_NEXT.fetch_add(1, Ordering::Relaxed),
            tree: RefCell::new(MemoryTree {
                l_nodes: vec![Some(MemoryNode::new(MemoryNodeKind::Directory(
                    BTreeMap::new(),
                )))],
            }),
        }
    }

    /// Create `path` (and missing parents) holding `data`, replacing any file.
    pub fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(path_parent) = path.parent() {
            self.create_dir_all(path_parent)?;
        }
        let mut writer = self.create_file(path, true)?;
        writer.write_all(data)?;
        writer.flush()
    }

    /// Whole content of a file.
    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open_read(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn attributes_of(&self, n_node: usize, path: &Path) -> io::Result<SpecEntryAttributes> {
        let tree = self.tree.borrow();
        let node = tree.node(n_node, path)?;
        let (kind, len) = match &node.kind {
            MemoryNodeKind::Directory(_) => (EnumEntryKind::Directory, 0),
            MemoryNodeKind::File(content) => (EnumEntryKind::File, content.len() as u64),
            MemoryNodeKind::Symlink(path_target) => {
                (EnumEntryKind::Symlink, path_target.as_os_str().len() as u64)
            }
        };
        Ok(SpecEntryAttributes {
            kind,
            len,
            if_read_only: node.if_read_only,
            modified: Some(node.modified),
            file_key: Some(FileKey {
                device: self.n_device,
                node: n_node as u64,
            }),
        })
    }
}

/// Appends to one in-memory file node.
struct MemoryFileWriter<'a> {
    fs: &'a MemoryFs,
    n_node: usize,
    path: PathBuf,
}

impl Write for MemoryFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.fs.tree.borrow_mut();
        let node = tree.node_mut(self.n_node, &self.path)?;
        match &mut node.kind {
            MemoryNodeKind::File(content) => content.extend_from_slice(buf),
            _ => return Err(error_kind(io::ErrorKind::IsADirectory, "Not a file", &self.path)),
        }
        node.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for MemoryFs {
    fn provider_id(&self) -> u64 {
        self.n_device
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let tree = self.tree.borrow();
        let n_node = tree.resolve_node(path, true)?;
        Ok(tree.children(n_node, path)?.keys().cloned().collect())
    }

    fn metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes> {
        let n_node = self.tree.borrow().resolve_node(path, true)?;
        self.attributes_of(n_node, path)
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<SpecEntryAttributes> {
        let n_node = self.tree.borrow().resolve_node(path, false)?;
        self.attributes_of(n_node, path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let l_stack = self.tree.borrow().resolve(path, true)?;
        let mut path_canonical = PathBuf::from("/");
        for (_, name) in l_stack.into_iter().skip(1) {
            path_canonical.push(name);
        }
        Ok(path_canonical)
    }

    fn open_read<'a>(&'a self, path: &Path) -> io::Result<Box<dyn Read + 'a>> {
        let tree = self.tree.borrow();
        let n_node = tree.resolve_node(path, true)?;
        match &tree.node(n_node, path)?.kind {
            MemoryNodeKind::File(content) => Ok(Box::new(Cursor::new(content.clone()))),
            _ => Err(error_kind(io::ErrorKind::IsADirectory, "Is a directory", path)),
        }
    }

    fn create_file<'a>(&'a self, path: &Path, if_replace: bool) -> io::Result<Box<dyn Write + 'a>> {
        let mut tree = self.tree.borrow_mut();
        let (n_parent, name) = tree.resolve_parent(path)?;
        let n_existing = tree.children(n_parent, path)?.get(&name).copied();

        let n_node = match n_existing {
            None => tree.insert(
                n_parent,
                name,
                MemoryNode::new(MemoryNodeKind::File(Vec::new())),
                path,
            )?,
            Some(_) if !if_replace => {
                return Err(error_kind(io::ErrorKind::AlreadyExists, "File exists", path));
            }
            Some(n_child) => {
                let n_target = match tree.resolve_node(path, true) {
                    Ok(n_target) => n_target,
                    // Dangling link: replace the link itself.
                    Err(e) if e.kind() == io::ErrorKind::NotFound => n_child,
                    Err(e) => return Err(e),
                };
                let node = tree.node_mut(n_target, path)?;
                if node.if_read_only {
                    return Err(error_kind(io::ErrorKind::PermissionDenied, "Read-only file", path));
                }
                if matches!(node.kind, MemoryNodeKind::Directory(_)) {
                    return Err(error_kind(io::ErrorKind::IsADirectory, "Is a directory", path));
                }
                node.kind = MemoryNodeKind::File(Vec::new());
                node.modified = SystemTime::now();
                n_target
            }
        };

        Ok(Box::new(MemoryFileWriter {
            fs: self,
            n_node,
            path: path.to_path_buf(),
        }))
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let (n_parent, name) = tree.resolve_parent(path)?;
        if tree.children(n_parent, path)?.contains_key(&name) {
            return Err(error_kind(io::ErrorKind::AlreadyExists, "File exists", path));
        }
        tree.insert(
            n_parent,
            name,
            MemoryNode::new(MemoryNodeKind::Directory(BTreeMap::new())),
            path,
        )?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let (n_parent, name) = tree.resolve_parent(path)?;
        let n_node = *tree
            .children(n_parent, path)?
            .get(&name)
            .ok_or_else(|| error_not_found(path))?;
        let node = tree.node(n_node, path)?;
        if matches!(node.kind, MemoryNodeKind::Directory(_)) {
            return Err(error_kind(io::ErrorKind::IsADirectory, "Is a directory", path));
        }
        if node.if_read_only {
            return Err(error_kind(io::ErrorKind::PermissionDenied, "Read-only entry", path));
        }
        tree.detach(n_parent, &name, path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let (n_parent, name) = tree.resolve_parent(path)?;
        let n_node = *tree
            .children(n_parent, path)?
            .get(&name)
            .ok_or_else(|| error_not_found(path))?;
        let node = tree.node(n_node, path)?;
        match &node.kind {
            MemoryNodeKind::Directory(dict_children) if !dict_children.is_empty() => {
                return Err(error_kind(
                    io::ErrorKind::DirectoryNotEmpty,
                    "Directory not empty",
                    path,
                ));
            }
            MemoryNodeKind::Directory(_) => {}
            _ => return Err(error_kind(io::ErrorKind::NotADirectory, "Not a directory", path)),
        }
        if node.if_read_only {
            return Err(error_kind(io::ErrorKind::PermissionDenied, "Read-only entry", path));
        }
        tree.detach(n_parent, &name, path)
    }

    fn set_readonly(&self, path: &Path, if_read_only: bool) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let n_node = tree.resolve_node(path, true)?;
        tree.node_mut(n_node, path)?.if_read_only = if_read_only;
        Ok(())
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let n_node = tree.resolve_node(path, true)?;
        tree.node_mut(n_node, path)?.modified = modified;
        Ok(())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let tree = self.tree.borrow();
        let n_node = tree.resolve_node(path, false)?;
        match &tree.node(n_node, path)?.kind {
            MemoryNodeKind::Symlink(path_target) => Ok(path_target.clone()),
            _ => Err(error_kind(io::ErrorKind::InvalidInput, "Not a symbolic link", path)),
        }
    }

    fn symlink(&self, target: &Path, link: &Path, _if_target_is_dir: bool) -> io::Result<()> {
        let mut tree = self.tree.borrow_mut();
        let (n_parent, name) = tree.resolve_parent(link)?;
        if tree.children(n_parent, link)?.contains_key(&name) {
            return Err(error_kind(io::ErrorKind::AlreadyExists, "File exists", link));
        }
        tree.insert(
            n_parent,
            name,
            MemoryNode::new(MemoryNodeKind::Symlink(target.to_path_buf())),
            link,
        )?;
        Ok(())
    }
}
