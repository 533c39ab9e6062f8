use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::ContactRecord;

/// Excel only detects UTF-8 CSV with a byte-order mark.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// CSV bytes with a `key,name,address,phone,category` header.
pub fn to_csv(records: &[ContactRecord]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(UTF8_BOM.to_vec());
    wtr.write_record(["key", "name", "address", "phone", "category"])?;
    for r in records {
        wtr.write_record([&r.key, &r.name, &r.address, &r.phone, &r.category])?;
    }
    wtr.into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))
}

pub fn write_csv(records: &[ContactRecord], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, to_csv(records)?).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_quoting() {
        let records = vec![ContactRecord {
            key: "11912345678".into(),
            name: "Padaria São Jorge".into(),
            address: "Rua A, 123".into(),
            phone: "(11) 91234-5678".into(),
            category: "Padaria".into(),
        }];
        let bytes = to_csv(&records).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("key,name,address,phone,category"));
        assert_eq!(
            lines.next(),
            Some("11912345678,Padaria São Jorge,\"Rua A, 123\",(11) 91234-5678,Padaria")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_export_is_header_only() {
        let bytes = to_csv(&[]).unwrap();
        assert_eq!(&bytes[UTF8_BOM.len()..], b"key,name,address,phone,category\n");
    }
}
