//! File utilities for ingestion.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Check if a file is likely a text file.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if matches!(ext.as_str(), "txt" | "md" | "markdown" | "text") {
            return true;
        }
    }

    // Fall back to sniffing the first bytes for null characters
    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            if n == 0 {
                return true;
            }
            return !buffer[..n].contains(&0);
        }
    }

    false
}

/// Read file content with size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_stable() {
        let a = calculate_checksum("hello");
        let b = calculate_checksum("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, calculate_checksum("world"));
    }

    #[test]
    fn test_is_text_file() {
        let dir = TempDir::new().unwrap();

        let text_path = dir.path().join("doc.md");
        fs::write(&text_path, "# heading\n").unwrap();
        assert!(is_text_file(&text_path));

        let binary_path = dir.path().join("blob.bin");
        let mut f = fs::File::create(&binary_path).unwrap();
        f.write_all(&[0u8, 159, 146, 150]).unwrap();
        assert!(!is_text_file(&binary_path));
    }

    #[test]
    fn test_read_file_content_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(read_file_content(&path, 50).is_err());
        assert_eq!(read_file_content(&path, 1000).unwrap().len(), 100);
    }
}
