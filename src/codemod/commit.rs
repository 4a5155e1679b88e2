//! Write-back of modified modules.

use std::fs;

use tracing::{debug, info};

use crate::codemod::source::SourceModule;
use crate::error::{CodemodError, Result};

/// Write the module to its path if its text changed.
///
/// Returns whether the file was written.
pub fn commit(module: &SourceModule) -> Result<bool> {
    if !module.is_modified() {
        debug!(path = %module.display_path(), "unchanged, skipping write");
        return Ok(false);
    }
    let path = module
        .path()
        .ok_or_else(|| CodemodError::Io("module has no file path".to_string()))?;
    fs::write(path, module.print())?;
    info!(path = %path.display(), "wrote instrumented file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::{Edit, SourceLanguage};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_unchanged_module_is_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entry.js");
        fs::write(&path, "foo();\n").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let module = SourceModule::from_path(&path).unwrap();
        assert!(!commit(&module).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn test_modified_module_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entry.js");
        fs::write(&path, "foo();\n").unwrap();

        let mut module = SourceModule::from_path(&path).unwrap();
        module.apply(vec![Edit::insert(0, "bar();\n")]).unwrap();
        assert!(commit(&module).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "bar();\nfoo();\n");
    }

    #[test]
    fn test_in_memory_module_cannot_be_committed() {
        let mut module = SourceModule::parse("foo();\n", SourceLanguage::JavaScript).unwrap();
        module.apply(vec![Edit::insert(0, "bar();\n")]).unwrap();
        assert!(matches!(commit(&module), Err(CodemodError::Io(_))));
    }
}
