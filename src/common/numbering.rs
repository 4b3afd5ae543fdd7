// src/common/numbering.rs

use uuid::Uuid;

/// Human facing document number, e.g. `ORD-7F3A9C21B4`. Uniqueness per tenant is
/// enforced by the database.
pub fn document_number(prefix: &str) -> String {
    let random = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{prefix}-{}", &random[..10])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_and_short() {
        let number = document_number("INV");
        assert!(number.starts_with("INV-"));
        assert_eq!(number.len(), 14);
        assert!(number[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
