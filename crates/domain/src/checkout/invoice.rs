use chrono::Utc;
use uuid::Uuid;

/// Source of invoice codes for new transactions.
pub trait InvoiceCodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

/// `INV-<UTC yyyymmddHHMMSS>-<8 uppercase hex chars>`.
///
/// The random suffix keeps codes distinct across checkouts that land in
/// the same second.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomInvoiceCode;

impl InvoiceCodeGenerator for RandomInvoiceCode {
    fn next_code(&self) -> String {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("INV-{timestamp}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_code_format() {
        let code = RandomInvoiceCode.next_code();
        let parts: Vec<_> = code.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_codes_within_same_second_differ() {
        let codes: HashSet<_> = (0..100).map(|_| RandomInvoiceCode.next_code()).collect();
        assert_eq!(codes.len(), 100);
    }
}
