//! Backing store selection.

use crate::cli::Cli;
use anyhow::{bail, Context, Result};
use overlay::{BackingStore, MappedFileStore};

/// The store chosen on the command line.
pub enum Store {
    Dump(MappedFileStore),
    #[cfg(target_os = "linux")]
    Process(overlay::ProcessMemory),
}

impl Store {
    pub fn backing(&self) -> &dyn BackingStore {
        match self {
            Store::Dump(store) => store,
            #[cfg(target_os = "linux")]
            Store::Process(store) => store,
        }
    }

    pub fn name(&self) -> &str {
        self.backing().name()
    }

    /// Persist writes to a dump file. Process writes are immediate.
    pub fn flush(&self) -> Result<()> {
        if let Store::Dump(store) = self {
            store.flush()?;
        }
        Ok(())
    }
}

/// Open the dump or process named by `cli`, writable only when assignments
/// were requested.
pub fn open(cli: &Cli) -> Result<Store> {
    let writable = !cli.set.is_empty();

    if let Some(path) = &cli.dump {
        let base = cli.base.context("--dump requires --base")?;
        let store = MappedFileStore::open("dump", path, base, writable)
            .with_context(|| format!("mapping {}", path.display()))?;
        return Ok(Store::Dump(store));
    }

    match cli.pid {
        #[cfg(target_os = "linux")]
        Some(pid) => {
            let store = overlay::ProcessMemory::open_pid(pid, writable)
                .with_context(|| format!("opening memory of pid {}", pid))?;
            Ok(Store::Process(store))
        }
        #[cfg(not(target_os = "linux"))]
        Some(_) => bail!("live process access is only supported on Linux"),
        None => bail!("either --pid or --dump is required"),
    }
}
