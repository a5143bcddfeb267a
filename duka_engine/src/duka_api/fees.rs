use serde::{Deserialize, Serialize};

use crate::db_types::Money;

pub const DEFAULT_PROVIDER_FEE_BPS: u32 = 230;
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 100;

/// Fees are charged on top of the base amount, in basis points, each rounded up to the next whole franc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub provider_fee_bps: u32,
    pub platform_fee_bps: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { provider_fee_bps: DEFAULT_PROVIDER_FEE_BPS, platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub base_amount: Money,
    pub provider_fee: Money,
    pub platform_fee: Money,
    pub total: Money,
}

impl FeeSchedule {
    pub fn new(provider_fee_bps: u32, platform_fee_bps: u32) -> Self {
        Self { provider_fee_bps, platform_fee_bps }
    }

    /// `None` when the fees or the total cannot be represented.
    pub fn quote(&self, base_amount: Money) -> Option<FeeQuote> {
        let provider_fee = base_amount.fraction_bps_ceil(self.provider_fee_bps)?;
        let platform_fee = base_amount.fraction_bps_ceil(self.platform_fee_bps)?;
        let total = base_amount.checked_add(provider_fee)?.checked_add(platform_fee)?;
        Some(FeeQuote { base_amount, provider_fee, platform_fee, total })
    }
}
