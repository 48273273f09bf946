use std::io::Write;
use std::path::{Path, PathBuf};

use bx_domain::error::{Error, Result};
use bx_domain::{Block, Cid};

use super::BlockStore;

/// One file per block, named by the CID's text form.
///
/// Writes go through a temp file in the same directory and are renamed into
/// place, so readers never observe a partial block.
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(path = %root.display(), "block store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, cid: &Cid) -> PathBuf {
        self.root.join(cid.to_string())
    }
}

impl BlockStore for FsBlockStore {
    fn get(&self, cid: &Cid) -> Result<Option<Block>> {
        match std::fs::read(self.path_for(cid)) {
            Ok(data) => Ok(Some(Block::from_parts(*cid, data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.path_for(cid).is_file())
    }

    fn put(&self, block: Block) -> Result<()> {
        let path = self.path_for(block.cid());
        if path.is_file() {
            return Ok(());
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(block.data())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            // Skips in-flight temp files and anything else foreign.
            if name.to_str().is_some_and(|n| n.parse::<Cid>().is_ok()) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path()).unwrap();
        let block = Block::new(b"on disk".to_vec());

        store.put(block.clone()).unwrap();
        assert!(dir.path().join(block.cid().to_string()).is_file());
        assert_eq!(store.get(block.cid()).unwrap(), Some(block));
    }

    #[test]
    fn reopen_sees_previous_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let block = Block::new(b"persisted".to_vec());
        FsBlockStore::open(dir.path()).unwrap().put(block.clone()).unwrap();

        let reopened = FsBlockStore::open(dir.path()).unwrap();
        assert!(reopened.has(block.cid()).unwrap());
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn len_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("README"), "hi").unwrap();
        store.put(Block::new(b"a".to_vec())).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path().join("nested")).unwrap();
        assert!(store.get(&Cid::raw(b"missing")).unwrap().is_none());
    }
}
