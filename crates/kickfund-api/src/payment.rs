use uuid::Uuid;

/// Builds the checkout link handed back for a new transaction. No gateway is
/// contacted; without a configured base URL the link stays empty.
#[derive(Debug, Clone, Default)]
pub struct PaymentLinks {
    base_url: Option<String>,
}

impl PaymentLinks {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self { base_url }
    }

    pub fn link_for(&self, code: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}/{}", base, code))
    }
}

/// Reference code for a ledger entry: `TRX-` plus 12 uppercase hex chars.
pub fn new_transaction_code() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TRX-{}", &id[..12])
}
